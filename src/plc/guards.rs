//! Consecutive-cycle fault detectors.

use super::types::PLC_GUARD_STREAK;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GuardCounters {
    pub low_battery_current_streak: u8,
    pub high_bus_current_streak: u8,
}

/// Two independent streak counters. Each reports a trigger only on the
/// observation where its streak reaches [`PLC_GUARD_STREAK`]; longer streaks
/// stay quiet until a non-qualifying observation resets them.
#[derive(Clone, Debug, Default)]
pub struct HysteresisGuards {
    counters: GuardCounters,
}

impl HysteresisGuards {
    pub const fn new() -> Self {
        Self {
            counters: GuardCounters {
                low_battery_current_streak: 0,
                high_bus_current_streak: 0,
            },
        }
    }

    /// Battery current flowing out while the command sits at its floor.
    pub fn observe_low_battery_current(&mut self, qualifies: bool) -> bool {
        Self::observe(&mut self.counters.low_battery_current_streak, qualifies)
    }

    /// Bus current above the sharing limit while not protocol-charging.
    pub fn observe_high_bus_current(&mut self, qualifies: bool) -> bool {
        Self::observe(&mut self.counters.high_bus_current_streak, qualifies)
    }

    fn observe(streak: &mut u8, qualifies: bool) -> bool {
        if qualifies {
            *streak = streak.saturating_add(1);
        } else {
            *streak = 0;
        }
        *streak == PLC_GUARD_STREAK
    }

    pub fn counters(&self) -> GuardCounters {
        self.counters
    }

    pub fn reset(&mut self) {
        self.counters = GuardCounters::default();
    }
}
