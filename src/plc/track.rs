//! Session diagnostic record (`$$key@@value` fields) and upload throttling.

use core::fmt::Write;

use embassy_time::Instant;
use heapless::String;

use super::types::{ProtocolKind, SessionBaseline};
use crate::config::{PLC_TRACK_UPLOAD_MAX, PLC_TRACK_UPLOAD_PERIOD};

/// Maximum size of one uploaded record.
pub const PLC_INFO_LEN: usize = 1023;

pub type TrackRecord = String<PLC_INFO_LEN>;

const FIELD_LEN: usize = 48;

/// Why a mid-session entry was captured. The code suffixes each key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackKind {
    SocExit = 0,
    IbatExit = 1,
    IbusEnter = 2,
    SocAdd = 3,
}

impl TrackKind {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Readings taken when an exit/enter entry is captured.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExitSnapshot {
    pub smooth_soc: i32,
    pub soc_now: i32,
    pub min_cell_mv: i32,
    pub temp: i32,
    pub ibat_ma: i32,
    pub avg_bus_ma: i32,
    pub avg_battery_ma: i32,
    pub current_vote_ma: i32,
}

/// Readings appended when the session summary is uploaded.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionSummary {
    pub enable_cnts: u32,
    pub soc: i32,
    pub smooth_soc: i32,
    pub ui_soc: i32,
    pub temp: i32,
    pub min_cell_mv: i32,
    pub ibat_ma: i32,
}

/// Accumulates fields until the record is full; overflowing fields are dropped.
#[derive(Clone, Debug, Default)]
pub struct TrackLog {
    msg: TrackRecord,
}

impl TrackLog {
    pub const fn new() -> Self {
        Self { msg: String::new() }
    }

    pub fn as_str(&self) -> &str {
        self.msg.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.msg.is_empty()
    }

    pub fn clear(&mut self) {
        self.msg.clear();
    }

    /// Fields are staged first so a full record never ends in half a field.
    fn append(&mut self, key: &str, field: Result<String<FIELD_LEN>, core::fmt::Error>) {
        let pushed = field.map(|f| self.msg.push_str(&f).is_ok()).unwrap_or(false);
        if !pushed {
            debug!("PLC: track record full, dropping {}", key);
        }
    }

    fn field(&mut self, key: &str, value: i32) {
        let mut f = String::new();
        let staged = write!(f, "$${}@@{}", key, value).map(|_| f);
        self.append(key, staged);
    }

    fn tagged(&mut self, key: &str, kind: TrackKind, value: i32) {
        let mut f = String::new();
        let staged = write!(f, "$${}_{}@@{}", key, kind.code(), value).map(|_| f);
        self.append(key, staged);
    }

    pub fn record_session_start(&mut self, buck: bool, support: ProtocolKind, b: &SessionBaseline) {
        let support = match support {
            ProtocolKind::Disabled => 0,
            ProtocolKind::Ufcs => 1,
            ProtocolKind::Other(code) => code as i32,
        };
        self.field("plc_buck", buck as i32);
        self.field("plc_support", support);
        self.field("init_sm_soc", b.init_smoothed_soc);
        self.field("init_ui_soc", b.init_ui_soc);
        self.field("init_soc", b.init_soc);
        self.field("vbat_min", b.init_min_cell_mv);
        self.field("tbat", b.init_temp);
        self.field("ibat_ma", b.init_battery_current_ma);
    }

    pub fn record_exit(&mut self, kind: TrackKind, s: &ExitSnapshot) {
        self.field("exit_type", kind.code() as i32);
        self.tagged("smooth_soc", kind, s.smooth_soc);
        self.tagged("soc_now", kind, s.soc_now);
        self.tagged("vbat", kind, s.min_cell_mv);
        self.tagged("tbat", kind, s.temp);
        self.tagged("ibat", kind, s.ibat_ma);
        self.tagged("avg_ibus", kind, s.avg_bus_ma);
        self.tagged("avg_ibat", kind, s.avg_battery_ma);
        self.tagged("curr_vote", kind, s.current_vote_ma);
    }

    pub fn record_summary(&mut self, s: &SessionSummary) {
        self.field("enable_cnts", s.enable_cnts as i32);
        self.field("exit_soc", s.soc);
        self.field("exit_sm_soc", s.smooth_soc);
        self.field("exit_ui_soc", s.ui_soc);
        self.field("exit_temp", s.temp);
        self.field("exit_vbat", s.min_cell_mv);
        self.field("exit_ibat", s.ibat_ma);
    }
}

/// At most [`PLC_TRACK_UPLOAD_MAX`] uploads per window. The window restarts
/// when an upload is attempted more than one period after the last admitted one.
#[derive(Clone, Debug, Default)]
pub struct UploadThrottle {
    count: u8,
    last: Option<Instant>,
}

impl UploadThrottle {
    pub const fn new() -> Self {
        Self { count: 0, last: None }
    }

    pub fn admit(&mut self, now: Instant) -> bool {
        let window_over = self.last.map_or(false, |last| {
            now.checked_duration_since(last)
                .map_or(false, |elapsed| elapsed > PLC_TRACK_UPLOAD_PERIOD)
        });
        if window_over {
            self.count = 0;
        }
        if self.count >= PLC_TRACK_UPLOAD_MAX {
            return false;
        }
        self.last = Some(now);
        self.count += 1;
        true
    }

    pub fn remaining(&self) -> u8 {
        PLC_TRACK_UPLOAD_MAX.saturating_sub(self.count)
    }
}
