//! Projection of decoded feeds into the minimal records consumers read.
//!
//! Trimming is purely syntactic: entity order is preserved, nothing is
//! deduplicated or validated across entities, and free-form alert text is
//! dropped on purpose. Field names on the record structs are the wire
//! contract with the downstream API tier and must not change.

use chrono::Utc;
use serde::Serialize;

use crate::config::FeedKind;
use crate::gtfs_rt::FeedMessage;

/// One vehicle position. `trip`/`route` are null when the vehicle reports no
/// trip descriptor at all; an empty string means the descriptor was present
/// with the id unset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleRecord {
    pub id: String,
    pub trip: Option<String>,
    pub route: Option<String>,
    pub lat: f32,
    pub lon: f32,
    pub ts: u64,
}

/// One trip update with its full ordered stop-time list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    pub trip: String,
    pub route: String,
    /// Schedule relationship as the raw enum integer.
    pub rel: i32,
    pub stops: Vec<StopTimeRecord>,
}

/// One stop-time event within a trip update. `delay` is present only when an
/// arrival exists and itself carries a delay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopTimeRecord {
    pub stop_id: String,
    pub seq: u32,
    pub arr: Option<i64>,
    pub dep: Option<i64>,
    pub delay: Option<i32>,
    pub rel: i32,
}

/// One service alert, reduced to its cause and effect enum integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    pub cause: i32,
    pub effect: i32,
}

/// Records of one feed kind. Serializes as the bare JSON array consumers
/// expect, with no kind tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrimmedRecords {
    Vehicles(Vec<VehicleRecord>),
    Trips(Vec<TripRecord>),
    Alerts(Vec<AlertRecord>),
}

impl TrimmedRecords {
    pub fn len(&self) -> usize {
        match self {
            TrimmedRecords::Vehicles(v) => v.len(),
            TrimmedRecords::Trips(t) => t.len(),
            TrimmedRecords::Alerts(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The output of one trim pass: a feed timestamp plus the projected records.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedFeed {
    pub ts: u64,
    pub records: TrimmedRecords,
}

/// Projects a decoded feed into the records for `kind`.
///
/// The feed timestamp is the header's, falling back to wall-clock time when
/// the header reports none (or a zero, which some producers emit for
/// "unknown").
pub fn trim(kind: FeedKind, feed: &FeedMessage) -> TrimmedFeed {
    let ts = feed
        .header
        .timestamp
        .filter(|&t| t != 0)
        .unwrap_or_else(|| Utc::now().timestamp() as u64);

    let records = match kind {
        FeedKind::Vehicles => TrimmedRecords::Vehicles(trim_vehicles(feed, ts)),
        FeedKind::Trips => TrimmedRecords::Trips(trim_trips(feed)),
        FeedKind::Alerts => TrimmedRecords::Alerts(trim_alerts(feed)),
    };

    TrimmedFeed { ts, records }
}

/// Entities without a position are invisible to the map and skipped outright.
fn trim_vehicles(feed: &FeedMessage, feed_ts: u64) -> Vec<VehicleRecord> {
    let mut out = Vec::new();

    for e in &feed.entity {
        if let Some(v) = &e.vehicle {
            if let Some(pos) = &v.position {
                out.push(VehicleRecord {
                    id: e.id.clone(),
                    trip: v.trip.as_ref().map(|t| t.trip_id().to_string()),
                    route: v.trip.as_ref().map(|t| t.route_id().to_string()),
                    lat: pos.latitude,
                    lon: pos.longitude,
                    ts: v.timestamp.filter(|&t| t != 0).unwrap_or(feed_ts),
                });
            }
        }
    }

    out
}

fn trim_trips(feed: &FeedMessage) -> Vec<TripRecord> {
    let mut out = Vec::new();

    for e in &feed.entity {
        if let Some(tu) = &e.trip_update {
            let stops = tu
                .stop_time_update
                .iter()
                .map(|stu| StopTimeRecord {
                    stop_id: stu.stop_id().to_string(),
                    seq: stu.stop_sequence(),
                    arr: stu.arrival.as_ref().map(|a| a.time()),
                    dep: stu.departure.as_ref().map(|d| d.time()),
                    delay: stu.arrival.as_ref().and_then(|a| a.delay),
                    rel: stu.schedule_relationship() as i32,
                })
                .collect();

            out.push(TripRecord {
                trip: tu.trip.trip_id().to_string(),
                route: tu.trip.route_id().to_string(),
                rel: tu.trip.schedule_relationship() as i32,
                stops,
            });
        }
    }

    out
}

/// Header and description text are deliberately not carried; the consumer
/// only maps cause/effect codes. Unset codes come out as the schema defaults
/// (cause 1, effect 8) via the generated accessors.
fn trim_alerts(feed: &FeedMessage) -> Vec<AlertRecord> {
    let mut out = Vec::new();

    for e in &feed.entity {
        if let Some(a) = &e.alert {
            out.push(AlertRecord {
                cause: a.cause() as i32,
                effect: a.effect() as i32,
            });
        }
    }

    out
}
