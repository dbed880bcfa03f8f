//! The single worker driving one [`PlcCore`]: waits for either the next event
//! or the next task deadline, then runs one step under the lock.

use core::future::pending;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Instant, Timer};

use crate::plc::device::PlcCore;
use crate::plc::ports::{PlcSink, Telemetry, VoteResolver};
use crate::shared_state::PlcEventSubscriber;

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => Timer::at(at).await,
        None => pending::<()>().await,
    }
}

/// Runs forever. The core lock is taken per step and never held across an await.
pub async fn plc_task<M, E, T, R, S>(
    core: &Mutex<M, PlcCore<T, R, S>>,
    mut events: PlcEventSubscriber<'_, E>,
) -> !
where
    M: RawMutex,
    E: RawMutex,
    T: Telemetry,
    R: VoteResolver,
    S: PlcSink,
{
    info!("PLC: task started");
    loop {
        let deadline = core.lock().await.next_deadline();

        match select(events.next_message_pure(), wait_until(deadline)).await {
            Either::First(event) => {
                debug!("PLC: event {:?}", event);
                let now = Instant::now();
                let mut core = core.lock().await;
                core.handle_event(event, now);
                core.run_due(now);
            }
            Either::Second(()) => {
                core.lock().await.run_due(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::pubsub::PubSubChannel;
    use embassy_time::Duration;

    use super::*;
    use crate::plc::testing::{bench_core, ufcs_config, Bench, Call};
    use crate::plc::types::{LinkState, PlcStatus};
    use crate::shared_state::{PlcEvent, PlcEventChannel, PlcItem};

    #[test]
    fn runner_applies_published_events() {
        let (b, core) = bench_core(ufcs_config(), Bench::default());
        let core: Mutex<NoopRawMutex, _> = Mutex::new(core);
        let events: PlcEventChannel<NoopRawMutex> = PubSubChannel::new();
        let sub = events.subscriber().unwrap();
        let publisher = events.publisher().unwrap();

        block_on(async {
            let link = LinkState { ufcs_online: true, ufcs_charging: true, ..LinkState::default() };
            core.lock().await.attach(link, Instant::now());

            let producer = async {
                publisher.publish(PlcEvent::EnableVote(PlcStatus::Disable)).await;
                publisher.publish(PlcEvent::EnableVote(PlcStatus::Enable)).await;
                Timer::after(Duration::from_millis(50)).await;
            };
            select(plc_task(&core, sub), producer).await;
        });

        let core = core.try_lock().unwrap();
        assert_eq!(core.status(), PlcStatus::Enable);
        assert_eq!(core.enable_cnts(), 1);
        assert_eq!(b.borrow().count(Call::Publish(PlcItem::Status(PlcStatus::Enable))), 1);
    }
}
