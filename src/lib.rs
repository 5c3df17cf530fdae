pub mod cache;
pub mod config;
pub mod fetch;
pub mod parser;
pub mod poller;
pub mod supervisor;
pub mod trim;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
