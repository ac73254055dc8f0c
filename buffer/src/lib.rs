#![warn(rust_2018_idioms)]

//! Buffer primitives, NTP-64 time conversion, and telemetry counters shared
//! by every reassembly and joining component in the atsc3-recv workspace.

pub mod block;
pub mod error;
pub mod ntp;
pub mod telemetry;

pub use block::Block;
pub use error::{Error, Result};
pub use ntp::{ntp64_to_sec_usec, Ntp64};
pub use telemetry::Telemetry;
