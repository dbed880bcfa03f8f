//! Collaborator seams: telemetry reads, vote arbitration handles and the
//! output sink. The core owns one implementation of each.

use super::types::{Error, PlcStatus};
use crate::shared_state::PlcItem;

/// Point-in-time battery and bus readings.
pub trait Telemetry {
    fn soc(&mut self) -> Result<i32, Error>;
    fn temperature(&mut self) -> Result<i32, Error>;
    fn min_cell_mv(&mut self) -> Result<i32, Error>;
    /// Signed; positive while the battery charges.
    fn battery_current_ma(&mut self) -> Result<i32, Error>;
    fn bus_current_ma(&mut self) -> Result<i32, Error>;
    fn cells_in_series(&mut self) -> u8;
}

/// Typed handles into the vote arbitration subsystem.
///
/// Reads return whether the named client's vote is currently asserted; an
/// absent vote counts as not asserted.
pub trait VotePorts {
    /// Effective protocol current request, if anyone voted one.
    fn protocol_current_ma(&mut self) -> Option<i32>;
    fn disable_retry(&mut self) -> bool;
    fn not_allow_plc(&mut self) -> bool;
    fn not_allow_soc(&mut self) -> bool;
    fn charger_suspend(&mut self) -> bool;

    fn output_suspend(&mut self, on: bool);
    fn wired_suspend(&mut self, on: bool);
    /// Cast this core's own enable vote. The arbiter answers with
    /// [`PlcEvent::EnableVote`](crate::shared_state::PlcEvent::EnableVote).
    fn cast_enable(&mut self, status: PlcStatus);
}

/// Result of resolving the vote handles.
pub enum Capability<V> {
    Ready(V),
    Unavailable,
}

impl<V> Capability<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Capability::Ready(_))
    }

    pub fn ready_mut(&mut self) -> Option<&mut V> {
        match self {
            Capability::Ready(v) => Some(v),
            Capability::Unavailable => None,
        }
    }
}

/// Produces the vote handles once the arbitration subsystem is up.
pub trait VoteResolver {
    type Votes: VotePorts;

    fn resolve(&mut self) -> Option<Self::Votes>;
}

/// A handle set that is available from the start.
impl<V: VotePorts> VoteResolver for Option<V> {
    type Votes = V;

    fn resolve(&mut self) -> Option<V> {
        self.take()
    }
}

/// Where published items and diagnostic records go.
pub trait PlcSink {
    fn publish(&mut self, item: PlcItem) -> Result<(), Error>;
    fn upload(&mut self, record: &str) -> Result<(), Error>;
}
