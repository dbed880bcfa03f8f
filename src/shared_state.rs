//! src/shared_state.rs
//!
//! Messages into and out of the PLC core, and the channel types that carry them.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::pubsub::{PubSubChannel, Publisher, Subscriber};
use embassy_sync::signal::Signal;

use crate::plc::ports::PlcSink;
use crate::plc::track::TrackRecord;
use crate::plc::types::{Error, ItemKind, PlcStatus, ProtocolKind};

/// Inputs the core reacts to. Producers publish these on the event channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlcEvent {
    UfcsOnline(bool),
    UfcsCharging(bool),
    WiredOnline(bool),
    UiSoc(i32),
    SmoothSoc(i32),
    Support(ProtocolKind),
    Buck(bool),
    /// Effective value of the enable vote changed.
    EnableVote(PlcStatus),
    DebugTrack(bool),
}

/// Items the core publishes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlcItem {
    Support(ProtocolKind),
    Status(PlcStatus),
    Buck(bool),
    /// Bus-current command in mA; 0 when idle.
    Current(i32),
    DischargeNormal(bool),
    DischargeSoc(bool),
    DischargeRetry(bool),
    EnableCounts(u32),
}

impl PlcItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            PlcItem::Support(_) => ItemKind::Support,
            PlcItem::Status(_) => ItemKind::Status,
            PlcItem::Buck(_) => ItemKind::Buck,
            PlcItem::Current(_) => ItemKind::Current,
            PlcItem::DischargeNormal(_) => ItemKind::DischargeNormal,
            PlcItem::DischargeSoc(_) => ItemKind::DischargeSoc,
            PlcItem::DischargeRetry(_) => ItemKind::DischargeRetry,
            PlcItem::EnableCounts(_) => ItemKind::EnableCounts,
        }
    }
}

/// Event channel: buffer 8 messages, one core subscriber plus a bench tap,
/// up to 4 producers (topics, arbiter, shell).
pub const PLC_EVENT_CAP: usize = 8;
pub const PLC_EVENT_SUBS: usize = 2;
pub const PLC_EVENT_PUBS: usize = 4;

/// Item channel: one publisher (the core), up to 3 consumers.
pub const PLC_ITEM_CAP: usize = 8;
pub const PLC_ITEM_SUBS: usize = 3;
pub const PLC_ITEM_PUBS: usize = 1;

pub type PlcEventChannel<M> =
    PubSubChannel<M, PlcEvent, PLC_EVENT_CAP, PLC_EVENT_SUBS, PLC_EVENT_PUBS>;
pub type PlcEventSubscriber<'a, M> =
    Subscriber<'a, M, PlcEvent, PLC_EVENT_CAP, PLC_EVENT_SUBS, PLC_EVENT_PUBS>;
pub type PlcEventPublisher<'a, M> =
    Publisher<'a, M, PlcEvent, PLC_EVENT_CAP, PLC_EVENT_SUBS, PLC_EVENT_PUBS>;

pub type PlcTopic<M> = PubSubChannel<M, PlcItem, PLC_ITEM_CAP, PLC_ITEM_SUBS, PLC_ITEM_PUBS>;
pub type PlcItemPublisher<'a, M> =
    Publisher<'a, M, PlcItem, PLC_ITEM_CAP, PLC_ITEM_SUBS, PLC_ITEM_PUBS>;

/// Latest diagnostic record handed to the error reporter.
pub type TrackSignal<M> = Signal<M, TrackRecord>;

/// [`PlcSink`] over embassy channels. Items that do not fit in the topic
/// buffer are rejected rather than awaited.
pub struct ChannelSink<'a, M: RawMutex> {
    items: PlcItemPublisher<'a, M>,
    track: &'a TrackSignal<M>,
}

impl<'a, M: RawMutex> ChannelSink<'a, M> {
    pub fn new(items: PlcItemPublisher<'a, M>, track: &'a TrackSignal<M>) -> Self {
        Self { items, track }
    }
}

impl<'a, M: RawMutex> PlcSink for ChannelSink<'a, M> {
    fn publish(&mut self, item: PlcItem) -> Result<(), Error> {
        self.items
            .try_publish(item)
            .map_err(|item| Error::Publish(item.kind()))
    }

    fn upload(&mut self, record: &str) -> Result<(), Error> {
        let record = TrackRecord::try_from(record).map_err(|_| Error::UploadFailed)?;
        self.track.signal(record);
        Ok(())
    }
}
