//! Compile-time knobs for the PLC control core, plus the attach-time
//! configuration read once per device.
use embassy_time::Duration;

use crate::plc::table::{InterpolationPoint, DEFAULT_DELTA_TABLE};
use crate::plc::types::ProtocolKind;

/// Control loop cadence. Each tick reschedules the next one after this delay.
pub const PLC_MONITOR_PERIOD: Duration = Duration::from_millis(1_000);

/// How long the state machine may sit in Wait before it votes itself out.
pub const PLC_DISABLE_WAIT: Duration = Duration::from_millis(1_000);

/// Hold time of the wired/output suspend recovery pulse.
pub const PLC_SUSPEND_HOLD: Duration = Duration::from_millis(1_000);

/// Diagnostic uploads admitted per window.
pub const PLC_TRACK_UPLOAD_MAX: u8 = 3;
pub const PLC_TRACK_UPLOAD_PERIOD: Duration = Duration::from_secs(24 * 3600);

/// Events held back while a suspend pulse is in flight. One slot per
/// `PlcEvent` variant.
pub const PLC_EVENT_BACKLOG: usize = 9;

/// Per-device configuration, read once at attach.
#[derive(Clone, Copy, Debug)]
pub struct PlcConfig {
    /// Which charging protocol the PLC path supports.
    pub support: ProtocolKind,
    /// Sharing is done by a separate buck converter; the control loop stays idle.
    pub buck: bool,
    /// UI SOC at or above which a session is not worth sharing.
    pub soc_ceiling: i32,
    /// Upload a session summary on every wired online change.
    pub debug_track: bool,
    pub delta_table: &'static [InterpolationPoint],
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            support: ProtocolKind::Disabled,
            buck: false,
            soc_ceiling: 90,
            debug_track: false,
            delta_table: &DEFAULT_DELTA_TABLE,
        }
    }
}
