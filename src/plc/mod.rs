//! Parallel Load Compensation control core.

pub mod device;
pub mod guards;
pub mod policy;
pub mod ports;
pub mod sched;
pub mod table;
pub mod task;
pub mod track;
pub mod types;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use device::PlcCore;
pub use ports::{Capability, PlcSink, Telemetry, VotePorts, VoteResolver};
pub use task::plc_task;
pub use types::{Error, PlcSnapshot, PlcStatus, ProtocolKind};
