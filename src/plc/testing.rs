//! Recording bench for host tests: fake telemetry, vote handles and sink that
//! share one state cell and log every outward call in order.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::PlcConfig;
use crate::plc::device::PlcCore;
use crate::plc::ports::{PlcSink, Telemetry, VotePorts, VoteResolver};
use crate::plc::types::{Error, PlcStatus, ProtocolKind, Reading};
use crate::shared_state::PlcItem;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Call {
    Output(bool),
    Wired(bool),
    CastEnable(PlcStatus),
    Publish(PlcItem),
}

#[derive(Debug)]
pub struct Bench {
    pub soc: i32,
    pub temp: i32,
    pub min_cell_mv: i32,
    pub ibat_ma: i32,
    pub ibus_ma: i32,
    pub cells: u8,
    pub failing: Option<Reading>,

    pub ports_ready: bool,
    pub vote_current: Option<i32>,
    pub disable_retry: bool,
    pub not_allow_plc: bool,
    pub not_allow_soc: bool,
    pub charger_suspend: bool,

    pub calls: Vec<Call>,
    pub uploads: Vec<String>,
}

impl Default for Bench {
    fn default() -> Self {
        Self {
            soc: 50,
            temp: 250,
            min_cell_mv: 3900,
            ibat_ma: 300,
            ibus_ma: 100,
            cells: 2,
            failing: None,
            ports_ready: true,
            vote_current: Some(500),
            disable_retry: false,
            not_allow_plc: false,
            not_allow_soc: false,
            charger_suspend: false,
            calls: Vec::new(),
            uploads: Vec::new(),
        }
    }
}

impl Bench {
    pub fn take_calls(&mut self) -> Vec<Call> {
        core::mem::take(&mut self.calls)
    }

    pub fn published(&self) -> impl Iterator<Item = PlcItem> + '_ {
        self.calls.iter().filter_map(|c| match c {
            Call::Publish(item) => Some(*item),
            _ => None,
        })
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    pub fn last_current(&self) -> Option<i32> {
        self.published()
            .filter_map(|item| match item {
                PlcItem::Current(ma) => Some(ma),
                _ => None,
            })
            .last()
    }

    fn reading(&self, which: Reading, value: i32) -> Result<i32, Error> {
        if self.failing == Some(which) {
            Err(Error::Telemetry(which))
        } else {
            Ok(value)
        }
    }
}

pub type Shared = Rc<RefCell<Bench>>;

pub struct FakeTelemetry(Shared);
pub struct FakeVotes(Shared);
pub struct FakeResolver(Shared);
pub struct FakeSink(Shared);

impl Telemetry for FakeTelemetry {
    fn soc(&mut self) -> Result<i32, Error> {
        let b = self.0.borrow();
        b.reading(Reading::Soc, b.soc)
    }

    fn temperature(&mut self) -> Result<i32, Error> {
        let b = self.0.borrow();
        b.reading(Reading::Temperature, b.temp)
    }

    fn min_cell_mv(&mut self) -> Result<i32, Error> {
        let b = self.0.borrow();
        b.reading(Reading::MinCellVoltage, b.min_cell_mv)
    }

    fn battery_current_ma(&mut self) -> Result<i32, Error> {
        let b = self.0.borrow();
        b.reading(Reading::BatteryCurrent, b.ibat_ma)
    }

    fn bus_current_ma(&mut self) -> Result<i32, Error> {
        let b = self.0.borrow();
        b.reading(Reading::BusCurrent, b.ibus_ma)
    }

    fn cells_in_series(&mut self) -> u8 {
        self.0.borrow().cells
    }
}

impl VotePorts for FakeVotes {
    fn protocol_current_ma(&mut self) -> Option<i32> {
        self.0.borrow().vote_current
    }

    fn disable_retry(&mut self) -> bool {
        self.0.borrow().disable_retry
    }

    fn not_allow_plc(&mut self) -> bool {
        self.0.borrow().not_allow_plc
    }

    fn not_allow_soc(&mut self) -> bool {
        self.0.borrow().not_allow_soc
    }

    fn charger_suspend(&mut self) -> bool {
        self.0.borrow().charger_suspend
    }

    fn output_suspend(&mut self, on: bool) {
        self.0.borrow_mut().calls.push(Call::Output(on));
    }

    fn wired_suspend(&mut self, on: bool) {
        self.0.borrow_mut().calls.push(Call::Wired(on));
    }

    fn cast_enable(&mut self, status: PlcStatus) {
        self.0.borrow_mut().calls.push(Call::CastEnable(status));
    }
}

impl VoteResolver for FakeResolver {
    type Votes = FakeVotes;

    fn resolve(&mut self) -> Option<FakeVotes> {
        if self.0.borrow().ports_ready {
            Some(FakeVotes(self.0.clone()))
        } else {
            None
        }
    }
}

impl PlcSink for FakeSink {
    fn publish(&mut self, item: PlcItem) -> Result<(), Error> {
        self.0.borrow_mut().calls.push(Call::Publish(item));
        Ok(())
    }

    fn upload(&mut self, record: &str) -> Result<(), Error> {
        self.0.borrow_mut().uploads.push(String::from(record));
        Ok(())
    }
}

pub type BenchCore = PlcCore<FakeTelemetry, FakeResolver, FakeSink>;

pub fn ufcs_config() -> PlcConfig {
    PlcConfig {
        support: ProtocolKind::Ufcs,
        ..PlcConfig::default()
    }
}

pub fn bench_core(config: PlcConfig, bench: Bench) -> (Shared, BenchCore) {
    let shared = Rc::new(RefCell::new(bench));
    let core = PlcCore::new(
        config,
        FakeTelemetry(shared.clone()),
        FakeResolver(shared.clone()),
        FakeSink(shared.clone()),
    );
    (shared, core)
}
