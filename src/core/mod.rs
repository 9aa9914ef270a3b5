pub mod config;
pub mod packet;

pub use config::StreamConfig;
pub use packet::{unix_timestamp, Packet};
