//! Protobuf decoding for GTFS Realtime payloads.

use anyhow::Result;
use prost::Message;

use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded [`FeedMessage`] from raw feed bytes.
///
/// Decoding is all-or-nothing: a truncated or malformed payload yields an
/// error, never a partially populated message.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage> {
    Ok(FeedMessage::decode(bytes)?)
}
