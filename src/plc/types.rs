//! Public enums, limits and the driver error type.

/// Upper bound of the published bus-current command.
pub const PLC_IBUS_MAX: i32 = 1500;
/// Lower bound of the published bus-current command.
pub const PLC_IBUS_MIN: i32 = 200;
/// Command published when a session starts or leaves on SOC.
pub const PLC_IBUS_DEFAULT: i32 = 500;

/// Average bus current above which the high-bus guard counts (not protocol-charging).
pub const PLC_IBUS_HIGH_MA: i32 = 600;
/// Consecutive qualifying cycles before a guard fires.
pub const PLC_GUARD_STREAK: u8 = 4;
/// Smoothed SOC drift (percent) that ends a sharing session.
pub const PLC_DELTA_SOC_MAX: i32 = 3;
/// Samples per averaging cycle.
pub const PLC_SAMPLE_WINDOW: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlcStatus {
    NotAllowed,
    Disable,
    Wait,
    Enable,
}

impl PlcStatus {
    /// Status in which the control loop keeps running.
    pub fn is_active(self) -> bool {
        matches!(self, PlcStatus::Enable | PlcStatus::Wait)
    }
}

/// Charging protocol the PLC path is wired for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolKind {
    Disabled,
    Ufcs,
    Other(u8),
}

/// Telemetry quantities the core reads.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reading {
    Soc,
    Temperature,
    MinCellVoltage,
    BatteryCurrent,
    BusCurrent,
}

/// Published item kinds, used to name publish failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ItemKind {
    Support,
    Status,
    Buck,
    Current,
    DischargeNormal,
    DischargeSoc,
    DischargeRetry,
    EnableCounts,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A telemetry read failed; callers substitute 0.
    Telemetry(Reading),
    /// Vote arbitration handles could not be resolved yet.
    PortsUnavailable,
    /// The item sink did not accept a value.
    Publish(ItemKind),
    /// Diagnostic upload budget for the current window is spent.
    UploadThrottled,
    /// The diagnostic sink rejected the record.
    UploadFailed,
    /// Interpolation table is empty or not ascending.
    InvalidTable,
}

/// Link and battery-view state fed by external events.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkState {
    pub ufcs_online: bool,
    pub ufcs_charging: bool,
    pub wired_online: bool,
    pub ui_soc: i32,
    pub smooth_soc: i32,
}

/// Values captured once when a sharing session starts.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionBaseline {
    pub init_soc: i32,
    pub init_smoothed_soc: i32,
    pub init_ui_soc: i32,
    pub init_temp: i32,
    pub init_min_cell_mv: i32,
    pub init_battery_current_ma: i32,
}

/// Point-in-time view of the core, for shells and status pages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlcSnapshot {
    pub status: PlcStatus,
    pub current_ma: i32,
    pub enable_cnts: u32,
    pub link: LinkState,
    pub avg_battery_ma: i32,
    pub avg_bus_ma: i32,
    pub low_battery_streak: u8,
    pub high_bus_streak: u8,
    pub session_active: bool,
    pub pulse_pending: bool,
    pub debug_track: bool,
}
