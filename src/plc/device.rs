//! High-level PLC core: one instance per device, driven by events and due tasks.
//!
//! The core is a plain synchronous state object. The caller keeps it inside a
//! `Mutex` and funnels every mutation through [`PlcCore::handle_event`] or
//! [`PlcCore::run_due`]; see [`plc_task`](crate::plc::task::plc_task).

use core::mem::discriminant;

use embassy_time::{Duration, Instant};
use heapless::Deque;

use crate::config::{
    PlcConfig, PLC_DISABLE_WAIT, PLC_EVENT_BACKLOG, PLC_MONITOR_PERIOD, PLC_SUSPEND_HOLD,
};
use crate::plc::guards::HysteresisGuards;
use crate::plc::policy::{self, PolicyInput};
use crate::plc::ports::{Capability, PlcSink, Telemetry, VotePorts, VoteResolver};
use crate::plc::sched::{Scheduler, Task};
use crate::plc::table::DeltaCurrentTable;
use crate::plc::track::{ExitSnapshot, SessionSummary, TrackKind, TrackLog, UploadThrottle};
use crate::plc::types::*;
use crate::plc::window::SampleWindow;
use crate::shared_state::{PlcEvent, PlcItem};

/// Delay for work that should run on the next `run_due`.
const NOW: Duration = Duration::from_ticks(0);

/// Suspend pulse waiting for its release half.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Pulse {
    /// High bus current recovery. Release finishes the interrupted tick.
    BusRecovery { target_ma: i32, wired: bool },
    /// Wired-suspend pulse on Disable entry.
    DisableRecovery,
}

pub struct PlcCore<T, R, S>
where
    T: Telemetry,
    R: VoteResolver,
    S: PlcSink,
{
    config: PlcConfig,
    table: DeltaCurrentTable<'static>,

    telemetry: T,
    resolver: R,
    votes: Capability<R::Votes>,
    sink: S,

    window: SampleWindow<PLC_SAMPLE_WINDOW>,
    baseline: Option<SessionBaseline>,
    guards: HysteresisGuards,

    status: PlcStatus,
    enable_cnts: u32,
    current_ma: i32,
    link: LinkState,
    support: ProtocolKind,
    buck: bool,
    debug_track: bool,

    sched: Scheduler,
    pulse: Option<Pulse>,
    backlog: Deque<PlcEvent, PLC_EVENT_BACKLOG>,

    track: TrackLog,
    throttle: UploadThrottle,
}

impl<T, R, S> PlcCore<T, R, S>
where
    T: Telemetry,
    R: VoteResolver,
    S: PlcSink,
{
    /// Build the core and try to resolve the vote handles once.
    ///
    /// An invalid delta table in `config` falls back to the default table.
    pub fn new(config: PlcConfig, telemetry: T, mut resolver: R, sink: S) -> Self {
        let table = DeltaCurrentTable::new(config.delta_table).unwrap_or_else(|e| {
            warn!("PLC: bad delta table ({:?}), using default", e);
            DeltaCurrentTable::default()
        });
        let votes = match resolver.resolve() {
            Some(v) => Capability::Ready(v),
            None => {
                warn!("PLC: vote ports not available yet");
                Capability::Unavailable
            }
        };

        Self {
            config,
            table,
            telemetry,
            resolver,
            votes,
            sink,
            window: SampleWindow::new(),
            baseline: None,
            guards: HysteresisGuards::new(),
            status: PlcStatus::NotAllowed,
            enable_cnts: 0,
            current_ma: 0,
            link: LinkState::default(),
            support: config.support,
            buck: config.buck,
            debug_track: config.debug_track,
            sched: Scheduler::new(),
            pulse: None,
            backlog: Deque::new(),
            track: TrackLog::new(),
            throttle: UploadThrottle::new(),
        }
    }

    /// Apply the link snapshot taken when the topics were subscribed.
    pub fn attach(&mut self, link: LinkState, now: Instant) {
        self.link = link;
        self.publish(PlcItem::Support(self.support));
        self.publish(PlcItem::Buck(self.buck));
        if self.support != ProtocolKind::Disabled {
            self.with_votes(|v| v.cast_enable(PlcStatus::NotAllowed));
        }

        self.window.reset_cursors();
        self.baseline = None;

        if link.ufcs_online && self.support == ProtocolKind::Ufcs && self.status.is_active() {
            self.publish_current(PLC_IBUS_DEFAULT);
            if !self.buck {
                self.sched.schedule(Task::Tick, now, NOW);
            }
        }
        info!(
            "PLC: attached, support={:?} buck={} online={}",
            self.support, self.buck, link.ufcs_online
        );
    }

    // ------------------ Accessors ------------------

    pub fn status(&self) -> PlcStatus {
        self.status
    }

    pub fn current_ma(&self) -> i32 {
        self.current_ma
    }

    pub fn enable_cnts(&self) -> u32 {
        self.enable_cnts
    }

    /// Diagnostic record collected for the running session.
    pub fn track_record(&self) -> &str {
        self.track.as_str()
    }

    pub fn snapshot(&self) -> PlcSnapshot {
        let counters = self.guards.counters();
        PlcSnapshot {
            status: self.status,
            current_ma: self.current_ma,
            enable_cnts: self.enable_cnts,
            link: self.link,
            avg_battery_ma: self.window.average_battery(),
            avg_bus_ma: self.window.average_bus(),
            low_battery_streak: counters.low_battery_current_streak,
            high_bus_streak: counters.high_bus_current_streak,
            session_active: self.baseline.is_some(),
            pulse_pending: self.pulse.is_some(),
            debug_track: self.debug_track,
        }
    }

    /// Next instant at which [`run_due`](Self::run_due) has work. While a
    /// suspend pulse is held only its release counts.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pulse.is_some() {
            self.sched.deadline(Task::PulseRelease)
        } else {
            self.sched.next_deadline()
        }
    }

    // ------------------ Event intake ------------------

    pub fn handle_event(&mut self, event: PlcEvent, now: Instant) {
        if self.pulse.is_some() {
            self.defer(event);
            return;
        }

        match event {
            PlcEvent::UfcsOnline(online) => {
                self.link.ufcs_online = online;
                if self.support == ProtocolKind::Ufcs {
                    self.sched.schedule(Task::EnableVote, now, NOW);
                    if !self.buck {
                        self.sched.schedule(Task::Tick, now, NOW);
                    }
                }
            }
            PlcEvent::UfcsCharging(charging) => self.link.ufcs_charging = charging,
            PlcEvent::WiredOnline(online) => {
                self.link.wired_online = online;
                if (!online && self.enable_cnts > 0) || self.debug_track {
                    self.sched.schedule(Task::Track, now, NOW);
                }
            }
            PlcEvent::UiSoc(soc) => self.link.ui_soc = soc,
            PlcEvent::SmoothSoc(soc) => {
                if self.status.is_active() && soc != self.link.smooth_soc {
                    self.capture_exit(TrackKind::SocAdd);
                }
                self.link.smooth_soc = soc;
            }
            PlcEvent::Support(kind) => {
                self.support = kind;
                self.publish(PlcItem::Support(kind));
            }
            PlcEvent::Buck(buck) => {
                self.buck = buck;
                self.publish(PlcItem::Buck(buck));
            }
            PlcEvent::EnableVote(status) => self.on_enable_vote(status, now),
            PlcEvent::DebugTrack(on) => self.debug_track = on,
        }
    }

    /// Queue an event until the pulse is released. A newer event of the same
    /// kind replaces the queued one and moves to the back.
    fn defer(&mut self, event: PlcEvent) {
        let kind = discriminant(&event);
        for _ in 0..self.backlog.len() {
            if let Some(queued) = self.backlog.pop_front() {
                if discriminant(&queued) != kind {
                    let _ = self.backlog.push_back(queued);
                }
            }
        }
        if self.backlog.push_back(event).is_err() {
            warn!("PLC: backlog full, dropping {:?}", event);
        }
    }

    /// Run every task due at `now`.
    pub fn run_due(&mut self, now: Instant) {
        loop {
            let task = if self.pulse.is_some() {
                match self.sched.deadline(Task::PulseRelease) {
                    Some(at) if at <= now => {
                        self.sched.cancel(Task::PulseRelease);
                        Task::PulseRelease
                    }
                    _ => return,
                }
            } else {
                match self.sched.pop_due(now) {
                    Some(task) => task,
                    None => return,
                }
            };
            self.run_task(task, now);
        }
    }

    fn run_task(&mut self, task: Task, now: Instant) {
        match task {
            Task::PulseRelease => self.release_pulse(now),
            Task::EnableVote => self.cast_online_vote(),
            Task::WaitTimeout => self.wait_timeout(),
            Task::Tick => self.monitor_tick(now),
            Task::Track => self.upload_session(now),
        }
    }

    // ------------------ State machine ------------------

    fn on_enable_vote(&mut self, target: PlcStatus, now: Instant) {
        if target == self.status {
            return;
        }
        if !self.votes.is_ready() {
            warn!("PLC: vote ports unavailable, ignoring {:?}", target);
            return;
        }
        if self.status == PlcStatus::Wait {
            self.sched.cancel(Task::WaitTimeout);
        }

        if target == PlcStatus::Wait {
            self.status = PlcStatus::Wait;
            self.sched.schedule(Task::WaitTimeout, now, PLC_DISABLE_WAIT);
        } else {
            if self.status == PlcStatus::Disable && target == PlcStatus::Enable {
                if self.link.wired_online && !self.link.ufcs_charging {
                    self.with_votes(|v| v.output_suspend(true));
                }
                self.reset_session();
                self.enable_cnts = self.enable_cnts.saturating_add(1);
                self.publish(PlcItem::EnableCounts(self.enable_cnts));
            }

            self.status = target;
            match target {
                PlcStatus::Disable => {
                    if self.enter_disable(now) {
                        info!("PLC: status -> Disable, holding wired suspend");
                        return;
                    }
                }
                PlcStatus::Enable => {
                    if self.link.ufcs_charging
                        && self.buck
                        && !self.with_votes(|v| v.not_allow_plc())
                    {
                        self.publish(PlcItem::DischargeNormal(true));
                        self.with_votes(|v| v.output_suspend(true));
                    }
                }
                _ => {}
            }
        }

        info!("PLC: status -> {:?}", target);
        self.publish_status(now);
    }

    /// Disable entry side effects. Returns true when a wired-suspend pulse was
    /// started; the rest of the sequence then runs on release.
    fn enter_disable(&mut self, now: Instant) -> bool {
        let inhibited = self.with_votes(|v| v.not_allow_plc() || v.not_allow_soc());
        if inhibited && !self.with_votes(|v| v.charger_suspend()) {
            if self.link.wired_online {
                self.with_votes(|v| v.wired_suspend(true));
                self.start_pulse(Pulse::DisableRecovery, now);
                return true;
            }
            self.clear_discharge_inhibits();
        } else if self.link.ufcs_charging && !self.with_votes(|v| v.disable_retry()) {
            self.publish(PlcItem::DischargeRetry(true));
        }
        self.with_votes(|v| v.output_suspend(false));
        false
    }

    fn clear_discharge_inhibits(&mut self) {
        self.with_votes(|v| v.output_suspend(false));
        self.publish(PlcItem::DischargeNormal(false));
        self.publish(PlcItem::DischargeSoc(false));
    }

    fn publish_status(&mut self, now: Instant) {
        self.publish(PlcItem::Status(self.status));
        self.sched.schedule(Task::Tick, now, PLC_MONITOR_PERIOD);
    }

    fn wait_timeout(&mut self) {
        if self.status != PlcStatus::Wait {
            return;
        }
        let next = if self.link.ufcs_online {
            PlcStatus::Disable
        } else {
            PlcStatus::NotAllowed
        };
        info!("PLC: wait expired, voting {:?}", next);
        self.with_votes(|v| v.cast_enable(next));
    }

    fn cast_online_vote(&mut self) {
        if let Err(e) = self.resolve_ports() {
            warn!("PLC: enable vote not cast: {:?}", e);
            return;
        }
        let status = if self.link.ufcs_online {
            PlcStatus::Disable
        } else {
            PlcStatus::NotAllowed
        };
        self.with_votes(|v| v.cast_enable(status));
    }

    // ------------------ Control loop ------------------

    fn monitor_tick(&mut self, now: Instant) {
        let eligible = self.status.is_active()
            && self.link.ufcs_online
            && self.support == ProtocolKind::Ufcs
            && !self.buck;
        if !eligible {
            debug!("PLC: idle, status={:?}", self.status);
            self.reset_session();
            self.publish_current(0);
            return;
        }
        if let Err(e) = self.resolve_ports() {
            warn!("PLC: {:?}, retrying", e);
            self.sched.schedule(Task::Tick, now, PLC_MONITOR_PERIOD);
            return;
        }

        if self.baseline.is_none() {
            self.capture_baseline();
        }

        let ibat = self.read(Reading::BatteryCurrent);
        let ibus = self.read(Reading::BusCurrent);
        self.window.push_battery_sample(ibat);
        self.window.push_bus_sample(ibus);
        debug!("PLC: sample ibat={} ibus={}", ibat, ibus);

        if self.window.cycle_complete() && self.check_cycle(now) {
            return;
        }
        self.sched.schedule(Task::Tick, now, PLC_MONITOR_PERIOD);
    }

    /// Policy and guards for one completed cycle. Returns true when a suspend
    /// pulse took over the rest of the tick.
    fn check_cycle(&mut self, now: Instant) -> bool {
        let avg_bus = self.window.average_bus();
        let avg_bat = self.window.average_battery();
        let cells = self.telemetry.cells_in_series();
        let delta_ma = self.table.delta_for(avg_bat, cells);
        let vote_ma = self.with_votes(|v| v.protocol_current_ma()).unwrap_or(0);
        let baseline = self.baseline.unwrap_or_default();

        let decision = policy::evaluate(&PolicyInput {
            init_ui_soc: baseline.init_ui_soc,
            init_smoothed_soc: baseline.init_smoothed_soc,
            smoothed_soc: self.link.smooth_soc,
            soc_ceiling: self.config.soc_ceiling,
            current_vote_ma: vote_ma,
            delta_ma,
            avg_battery_ma: avg_bat,
        });
        info!(
            "PLC: cycle avg_ibat={} avg_ibus={} delta={} vote={} -> {}",
            avg_bat, avg_bus, delta_ma, vote_ma, decision.target_ma
        );

        if decision.soc_exit {
            if !self.with_votes(|v| v.not_allow_soc()) {
                self.capture_exit(TrackKind::SocExit);
            }
            self.publish(PlcItem::DischargeSoc(true));
            self.with_votes(|v| v.output_suspend(true));
        }

        let charging = self.link.ufcs_charging;
        let low = self
            .guards
            .observe_low_battery_current(charging && decision.target_ma <= PLC_IBUS_MIN && avg_bat < 0);
        if low && self.status == PlcStatus::Enable && !self.with_votes(|v| v.not_allow_plc()) {
            warn!("PLC: battery discharging at minimum command, leaving");
            self.publish(PlcItem::DischargeNormal(true));
            self.with_votes(|v| v.output_suspend(true));
            self.capture_exit(TrackKind::IbatExit);
            return false;
        }

        let high = self
            .guards
            .observe_high_bus_current(!charging && avg_bus > PLC_IBUS_HIGH_MA);
        if high && self.status == PlcStatus::Enable && self.with_votes(|v| v.not_allow_plc()) {
            warn!("PLC: bus current {} mA over limit, suspend pulse", avg_bus);
            let wired = self.link.wired_online;
            self.publish_current(0);
            self.with_votes(|v| v.output_suspend(true));
            if wired {
                self.with_votes(|v| v.wired_suspend(true));
            }
            self.start_pulse(
                Pulse::BusRecovery {
                    target_ma: decision.target_ma,
                    wired,
                },
                now,
            );
            return true;
        }

        self.publish_target(decision.target_ma);
        false
    }

    fn publish_target(&mut self, target_ma: i32) {
        if self.link.ufcs_online && self.status.is_active() {
            self.publish_current(target_ma);
        }
    }

    fn capture_baseline(&mut self) {
        let baseline = SessionBaseline {
            init_ui_soc: self.link.ui_soc,
            init_soc: self.read(Reading::Soc),
            init_smoothed_soc: self.link.smooth_soc,
            init_temp: self.read(Reading::Temperature),
            init_min_cell_mv: self.read(Reading::MinCellVoltage),
            init_battery_current_ma: self.read(Reading::BatteryCurrent),
        };
        self.baseline = Some(baseline);
        self.publish_current(PLC_IBUS_DEFAULT);
        info!(
            "PLC: session start sm_soc={} ui_soc={}",
            baseline.init_smoothed_soc, baseline.init_ui_soc
        );
        self.track
            .record_session_start(self.buck, self.support, &baseline);
    }

    fn reset_session(&mut self) {
        self.baseline = None;
        self.guards.reset();
        self.window.reset_cursors();
    }

    // ------------------ Suspend pulses ------------------

    fn start_pulse(&mut self, pulse: Pulse, now: Instant) {
        self.pulse = Some(pulse);
        self.sched.cancel(Task::PulseRelease);
        self.sched.schedule(Task::PulseRelease, now, PLC_SUSPEND_HOLD);
    }

    fn release_pulse(&mut self, now: Instant) {
        let Some(pulse) = self.pulse.take() else {
            return;
        };
        match pulse {
            Pulse::BusRecovery { target_ma, wired } => {
                if wired {
                    self.with_votes(|v| v.wired_suspend(false));
                }
                self.with_votes(|v| v.output_suspend(false));
                self.publish(PlcItem::DischargeNormal(false));
                self.capture_exit(TrackKind::IbusEnter);
                self.publish_target(target_ma);
                self.sched.schedule(Task::Tick, now, PLC_MONITOR_PERIOD);
            }
            Pulse::DisableRecovery => {
                self.with_votes(|v| v.wired_suspend(false));
                self.clear_discharge_inhibits();
                self.with_votes(|v| v.output_suspend(false));
                self.publish_status(now);
            }
        }
        debug!("PLC: pulse released, {} queued events", self.backlog.len());

        while self.pulse.is_none() {
            match self.backlog.pop_front() {
                Some(event) => self.handle_event(event, now),
                None => break,
            }
        }
    }

    // ------------------ Diagnostics ------------------

    fn capture_exit(&mut self, kind: TrackKind) {
        let snapshot = ExitSnapshot {
            smooth_soc: self.link.smooth_soc,
            soc_now: self.read(Reading::Soc),
            min_cell_mv: self.read(Reading::MinCellVoltage),
            temp: self.read(Reading::Temperature),
            ibat_ma: self.read(Reading::BatteryCurrent),
            avg_bus_ma: self.window.average_bus(),
            avg_battery_ma: self.window.average_battery(),
            current_vote_ma: self.with_votes(|v| v.protocol_current_ma()).unwrap_or(0),
        };
        info!("PLC: track {:?} {:?}", kind, snapshot);
        self.track.record_exit(kind, &snapshot);
    }

    fn upload_session(&mut self, now: Instant) {
        let summary = SessionSummary {
            enable_cnts: self.enable_cnts,
            soc: self.read(Reading::Soc),
            smooth_soc: self.link.smooth_soc,
            ui_soc: self.link.ui_soc,
            temp: self.read(Reading::Temperature),
            min_cell_mv: self.read(Reading::MinCellVoltage),
            ibat_ma: self.read(Reading::BatteryCurrent),
        };
        self.track.record_summary(&summary);
        self.enable_cnts = 0;
        self.publish(PlcItem::EnableCounts(0));

        match self.upload(now) {
            Ok(()) => info!("PLC: session record uploaded"),
            Err(Error::UploadThrottled) => debug!("PLC: upload budget spent, record dropped"),
            Err(e) => warn!("PLC: upload failed: {:?}", e),
        }
        self.track.clear();
    }

    fn upload(&mut self, now: Instant) -> Result<(), Error> {
        if !self.throttle.admit(now) {
            return Err(Error::UploadThrottled);
        }
        self.sink.upload(self.track.as_str())
    }

    // ------------------ Helpers ------------------

    /// Resolve the vote handles if they were not available yet.
    fn resolve_ports(&mut self) -> Result<(), Error> {
        if !self.votes.is_ready() {
            let votes = self.resolver.resolve().ok_or(Error::PortsUnavailable)?;
            info!("PLC: vote ports resolved");
            self.votes = Capability::Ready(votes);
        }
        Ok(())
    }

    /// Run `f` against the vote handles. Without handles, reads see the
    /// default (not asserted) and writes are dropped.
    fn with_votes<O: Default>(&mut self, f: impl FnOnce(&mut R::Votes) -> O) -> O {
        match self.votes.ready_mut() {
            Some(votes) => f(votes),
            None => O::default(),
        }
    }

    fn read(&mut self, reading: Reading) -> i32 {
        let value = match reading {
            Reading::Soc => self.telemetry.soc(),
            Reading::Temperature => self.telemetry.temperature(),
            Reading::MinCellVoltage => self.telemetry.min_cell_mv(),
            Reading::BatteryCurrent => self.telemetry.battery_current_ma(),
            Reading::BusCurrent => self.telemetry.bus_current_ma(),
        };
        value.unwrap_or_else(|e| {
            warn!("PLC: can't read {:?}: {:?}", reading, e);
            0
        })
    }

    fn publish(&mut self, item: PlcItem) {
        if let Err(e) = self.sink.publish(item) {
            warn!("PLC: publish {:?} failed: {:?}", item, e);
        }
    }

    fn publish_current(&mut self, ma: i32) {
        self.current_ma = ma;
        self.publish(PlcItem::Current(ma));
    }
}
