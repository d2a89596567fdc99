//! Trip expiry reaper
//!
//! Seats are cached per bus, not per schedule, so once a trip's grace window
//! has elapsed its seats must be handed back before the bus's next trip can
//! sell them. A sweep does that for every expired schedule not yet processed.
//!
//! The reset is fenced: a seat still held by a booking on a later schedule of
//! the same bus stays unavailable, and the bus's seat rows are locked before
//! the reset so it cannot interleave with a booking transaction.

use busline_core::{BookingPolicy, Clock, CoreResult, LedgerTx, SeatLedger, TripDirectory};
use busline_shared::{BusId, ScheduleId};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_schedules: usize,
    pub buses: usize,
    pub seats_released: u64,
    /// Buses whose transaction failed; their schedules are retried next sweep.
    pub failed_buses: Vec<BusId>,
}

pub struct TripReaper {
    ledger: Arc<dyn SeatLedger>,
    directory: Arc<dyn TripDirectory>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl TripReaper {
    pub fn new(
        ledger: Arc<dyn SeatLedger>,
        directory: Arc<dyn TripDirectory>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            ledger,
            directory,
            clock,
            policy,
        }
    }

    /// Runs one sweep now. Each bus is reset in its own transaction, so one
    /// failing bus does not hold back the others.
    pub async fn sweep(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let cutoff = self.policy.expiry_cutoff(now);

        let expired = self.directory.expired_schedules(cutoff).await?;
        if expired.is_empty() {
            debug!("No expired trips before {}", cutoff);
            return Ok(SweepReport::default());
        }

        let mut by_bus: BTreeMap<BusId, Vec<ScheduleId>> = BTreeMap::new();
        for trip in &expired {
            info!(
                "Trip {} on bus {} departed {} {}, releasing seats",
                trip.schedule_id, trip.bus_id, trip.departure.date, trip.departure.time
            );
            by_bus.entry(trip.bus_id).or_default().push(trip.schedule_id);
        }

        let mut report = SweepReport {
            expired_schedules: expired.len(),
            buses: by_bus.len(),
            ..Default::default()
        };

        for (bus_id, schedule_ids) in by_bus {
            match self.reap_bus(bus_id, &schedule_ids, cutoff, now).await {
                Ok(released) => {
                    info!("Bus {}: released {} seat(s)", bus_id, released);
                    report.seats_released += released;
                }
                Err(e) => {
                    error!("Bus {}: seat release failed: {}", bus_id, e);
                    report.failed_buses.push(bus_id);
                }
            }
        }

        Ok(report)
    }

    async fn reap_bus(
        &self,
        bus_id: BusId,
        schedule_ids: &[ScheduleId],
        cutoff: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        let mut tx = self.ledger.begin().await?;

        match Self::release(tx.as_mut(), bus_id, schedule_ids, cutoff, now).await {
            Ok(released) => match tx.commit().await {
                Ok(()) => Ok(released),
                Err(e) => {
                    warn!(kind = ?e.kind(), "Commit failed for bus {}: {}", bus_id, e);
                    Err(e)
                }
            },
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback failed for bus {}: {}", bus_id, rb);
                }
                Err(e)
            }
        }
    }

    async fn release(
        tx: &mut dyn LedgerTx,
        bus_id: BusId,
        schedule_ids: &[ScheduleId],
        cutoff: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        // Same lock order as a booking: schedule rows, then seats
        tx.mark_reaped(schedule_ids, now).await?;
        tx.lock_bus_seats(bus_id).await?;
        tx.release_stale_seats(bus_id, cutoff).await
    }

    /// Starts sweeping every `every` on a background task. The first sweep
    /// runs immediately.
    pub fn spawn(self: Arc<Self>, every: Duration) -> ReaperHandle {
        let shutdown = CancellationToken::new();
        let paused = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(self.run(every, shutdown.clone(), paused.clone()));

        ReaperHandle { shutdown, paused, task }
    }

    async fn run(self: Arc<Self>, every: Duration, shutdown: CancellationToken, paused: Arc<AtomicBool>) {
        info!("Trip reaper started, sweeping every {:?}", every);

        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if paused.load(Ordering::SeqCst) {
                        debug!("Trip reaper paused, skipping sweep");
                        continue;
                    }
                    match self.sweep().await {
                        Ok(report) if !report.failed_buses.is_empty() => {
                            warn!("Sweep left {} bus(es) for retry: {:?}", report.failed_buses.len(), report.failed_buses);
                        }
                        Ok(_) => {}
                        Err(e) => error!("Trip reaper sweep failed: {}", e),
                    }
                }
            }
        }

        info!("Trip reaper stopped");
    }
}

/// Control over a running reaper task.
pub struct ReaperHandle {
    shutdown: CancellationToken,
    paused: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Skips sweeps until `resume`. A sweep already running completes.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("Trip reaper paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("Trip reaper resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Cancels the task and waits for it to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!("Trip reaper task ended abnormally: {}", e);
        }
    }
}
