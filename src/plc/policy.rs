//! SOC-band decision: picks the bus-current command for one completed cycle.

use super::types::{PLC_DELTA_SOC_MAX, PLC_IBUS_DEFAULT, PLC_IBUS_MAX, PLC_IBUS_MIN};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PolicyInput {
    pub init_ui_soc: i32,
    pub init_smoothed_soc: i32,
    pub smoothed_soc: i32,
    pub soc_ceiling: i32,
    pub current_vote_ma: i32,
    pub delta_ma: i32,
    pub avg_battery_ma: i32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PolicyDecision {
    /// Command clamped into `[PLC_IBUS_MIN, PLC_IBUS_MAX]`.
    pub target_ma: i32,
    /// SOC left the sharing band: the session must be suspended.
    pub soc_exit: bool,
}

impl PolicyDecision {
    fn target(ma: i32) -> Self {
        Self { target_ma: ma, soc_exit: false }
    }

    fn exit() -> Self {
        Self { target_ma: PLC_IBUS_DEFAULT, soc_exit: true }
    }
}

pub fn evaluate(input: &PolicyInput) -> PolicyDecision {
    let init_ui = input.init_ui_soc;
    let soc_now = input.smoothed_soc;
    let delta_soc = soc_now - init_ui;

    let decision = if init_ui >= input.soc_ceiling {
        PolicyDecision::exit()
    } else if init_ui > input.init_smoothed_soc && init_ui > soc_now {
        PolicyDecision::target(PLC_IBUS_MAX)
    } else if init_ui < input.init_smoothed_soc && init_ui < soc_now {
        if delta_soc >= PLC_DELTA_SOC_MAX {
            PolicyDecision::exit()
        } else {
            PolicyDecision::target(PLC_IBUS_MIN)
        }
    } else if delta_soc < 0 {
        PolicyDecision::target(PLC_IBUS_MAX)
    } else if delta_soc == 0 {
        let ma = if input.avg_battery_ma > 0 {
            input.current_vote_ma.saturating_add(input.delta_ma)
        } else {
            input.current_vote_ma.saturating_sub(input.delta_ma)
        };
        PolicyDecision::target(ma)
    } else if delta_soc < PLC_DELTA_SOC_MAX {
        PolicyDecision::target(PLC_IBUS_MIN)
    } else {
        PolicyDecision::exit()
    };

    PolicyDecision {
        target_ma: decision.target_ma.clamp(PLC_IBUS_MIN, PLC_IBUS_MAX),
        ..decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(init_ui: i32, init_sm: i32, sm: i32) -> PolicyInput {
        PolicyInput {
            init_ui_soc: init_ui,
            init_smoothed_soc: init_sm,
            smoothed_soc: sm,
            soc_ceiling: 90,
            current_vote_ma: 500,
            delta_ma: 100,
            avg_battery_ma: 50,
        }
    }

    #[test]
    fn ceiling_exits_with_default() {
        let d = evaluate(&input(90, 90, 90));
        assert_eq!(d, PolicyDecision { target_ma: PLC_IBUS_DEFAULT, soc_exit: true });
    }

    #[test]
    fn ui_ahead_of_both_smoothed_views_goes_max() {
        let mut i = input(50, 40, 45);
        i.avg_battery_ma = -100;
        let d = evaluate(&i);
        assert_eq!(d.target_ma, PLC_IBUS_MAX);
        assert!(!d.soc_exit);
    }

    #[test]
    fn ui_behind_both_smoothed_views_goes_min_then_exits() {
        assert_eq!(evaluate(&input(50, 55, 52)).target_ma, PLC_IBUS_MIN);
        let d = evaluate(&input(50, 55, 53));
        assert!(d.soc_exit);
        assert_eq!(d.target_ma, PLC_IBUS_DEFAULT);
    }

    #[test]
    fn flat_soc_follows_vote_and_delta() {
        let mut i = input(50, 50, 50);
        assert_eq!(evaluate(&i).target_ma, 600);
        i.avg_battery_ma = -50;
        assert_eq!(evaluate(&i).target_ma, 400);
        i.avg_battery_ma = 0;
        assert_eq!(evaluate(&i).target_ma, 400);
    }

    #[test]
    fn flat_soc_result_is_clamped() {
        let mut i = input(50, 50, 50);
        i.current_vote_ma = 1450;
        i.delta_ma = 500;
        assert_eq!(evaluate(&i).target_ma, PLC_IBUS_MAX);
        i.avg_battery_ma = -1;
        i.current_vote_ma = 300;
        assert_eq!(evaluate(&i).target_ma, PLC_IBUS_MIN);
    }

    #[test]
    fn drift_bands_in_fallthrough_branch() {
        // init_ui == init_sm keeps the first three branches out of the way
        assert_eq!(evaluate(&input(50, 50, 48)).target_ma, PLC_IBUS_MAX);
        assert_eq!(evaluate(&input(50, 50, 51)).target_ma, PLC_IBUS_MIN);
        assert_eq!(evaluate(&input(50, 50, 52)).target_ma, PLC_IBUS_MIN);
        let d = evaluate(&input(50, 50, 53));
        assert!(d.soc_exit);
        assert_eq!(d.target_ma, PLC_IBUS_DEFAULT);
    }

    #[test]
    fn custom_ceiling() {
        let mut i = input(80, 80, 80);
        i.soc_ceiling = 80;
        assert!(evaluate(&i).soc_exit);
        i.soc_ceiling = 81;
        assert!(!evaluate(&i).soc_exit);
    }
}
