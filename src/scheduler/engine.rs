//! Trigger engine
//!
//! An in-memory priority queue of firing instants backed by the durable
//! trigger store. A single dispatcher task sleeps until the head of the queue
//! is due or a registration signals an earlier head, then hands due fires to
//! the worker pool over a bounded channel.
//!
//! Invariants the engine maintains:
//! - durable trigger rows are written before the in-memory queue is mutated,
//!   and the queue is rebuilt from those rows on restart
//! - due triggers dispatch in `(next_fire_at, job_id)` order
//! - a recurring trigger's next instant is computed and re-enqueued at
//!   dispatch time, before the worker runs
//! - at most one fire per job is in flight; an overlapping due fire is
//!   skipped and its next fire advanced past the overlap

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::models::{Job, ScheduleType};
use crate::store::TriggerStore;

use super::worker::CancellationMap;
use super::{clock, cron, Fire, FireSpec, SchedulerError, SchedulerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    at: DateTime<Utc>,
    job_id: Uuid,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.at.cmp(&other.at).then(self.job_id.cmp(&other.job_id))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
struct ActiveTrigger {
    client_id: String,
    recurring: bool,
    cron: Option<String>,
    zone: Tz,
    zone_name: String,
    paused: bool,
    next_fire_at: DateTime<Utc>,
}

#[derive(Default)]
struct EngineState {
    /// Min-queue over `(next_fire_at, job_id)`; entries whose job is absent
    /// from `entries` or whose instant no longer matches are stale and
    /// dropped on pop.
    queue: BinaryHeap<Reverse<QueueEntry>>,
    entries: HashMap<Uuid, ActiveTrigger>,
    in_flight: HashSet<Uuid>,
}

pub struct TriggerEngine {
    state: Mutex<EngineState>,
    notify: Notify,
    fire_tx: mpsc::Sender<Fire>,
    triggers: TriggerStore,
    cancellations: CancellationMap,
    running: AtomicBool,
    config: SchedulerConfig,
}

impl TriggerEngine {
    pub fn new(
        triggers: TriggerStore,
        fire_tx: mpsc::Sender<Fire>,
        cancellations: CancellationMap,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            notify: Notify::new(),
            fire_tx,
            triggers,
            cancellations,
            running: AtomicBool::new(false),
            config,
        }
    }

    /// Rebuild the in-memory queue from the durable trigger rows of all
    /// non-terminal jobs. Returns how many triggers were restored.
    pub async fn restore(&self) -> SchedulerResult<usize> {
        let rows = self.triggers.load_active().await?;
        let mut state = self.state.lock().unwrap();
        let mut restored = 0;
        for row in rows {
            let zone = match clock::resolve_zone(&row.time_zone) {
                Ok(zone) => zone,
                Err(_) => {
                    warn!(
                        "skipping trigger for job {}: unknown zone '{}'",
                        row.job_id, row.time_zone
                    );
                    continue;
                }
            };
            let recurring = ScheduleType::parse(&row.schedule_type)
                == Some(ScheduleType::Recurring);
            let trigger = ActiveTrigger {
                client_id: row.client_id,
                recurring,
                cron: row.cron_expression,
                zone,
                zone_name: row.time_zone,
                paused: row.paused,
                next_fire_at: row.next_fire_at,
            };
            if !trigger.paused {
                state.queue.push(Reverse(QueueEntry {
                    at: trigger.next_fire_at,
                    job_id: row.job_id,
                }));
            }
            state.entries.insert(row.job_id, trigger);
            restored += 1;
        }
        drop(state);
        self.notify.notify_one();
        Ok(restored)
    }

    /// Persist and enqueue a trigger for `job`. Returns the first fire
    /// instant.
    pub async fn register(&self, job: &Job, spec: FireSpec) -> SchedulerResult<DateTime<Utc>> {
        let zone = clock::resolve_zone(&job.time_zone)?;
        let (first_fire, cron_expression) = match spec {
            FireSpec::Now => (clock::now(), None),
            FireSpec::At(at) => (at, None),
            FireSpec::Cron { expression } => {
                let next = cron::next_after(clock::now(), &expression, zone)?
                    .ok_or_else(|| SchedulerError::NoUpcomingFire(expression.clone()))?;
                (next, Some(expression))
            }
        };

        self.triggers
            .upsert(
                job.id,
                first_fire,
                cron_expression.as_deref(),
                &job.time_zone,
                false,
            )
            .await?;

        {
            let mut state = self.state.lock().unwrap();
            state.entries.insert(
                job.id,
                ActiveTrigger {
                    client_id: job.client_id.clone(),
                    recurring: job.is_recurring(),
                    cron: cron_expression,
                    zone,
                    zone_name: job.time_zone.clone(),
                    paused: false,
                    next_fire_at: first_fire,
                },
            );
            state.queue.push(Reverse(QueueEntry {
                at: first_fire,
                job_id: job.id,
            }));
        }
        self.notify.notify_one();
        debug!("registered trigger for job {} at {}", job.id, first_fire);
        Ok(first_fire)
    }

    /// Remove the trigger and cancel any queued or in-flight fire.
    pub async fn deregister(&self, job_id: Uuid) -> SchedulerResult<()> {
        self.triggers.delete(job_id).await?;
        self.state.lock().unwrap().entries.remove(&job_id);
        self.cancellations.cancel(&job_id);
        self.notify.notify_one();
        Ok(())
    }

    pub async fn pause(&self, job_id: Uuid) -> SchedulerResult<()> {
        self.triggers.set_paused(job_id, true).await?;
        if let Some(trigger) = self.state.lock().unwrap().entries.get_mut(&job_id) {
            trigger.paused = true;
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Un-pause a trigger. Recurring jobs drop fires skipped while paused and
    /// continue from the next instant after now. Returns the next fire, or
    /// `None` when the engine holds no trigger for the job.
    pub async fn resume(&self, job_id: Uuid) -> SchedulerResult<Option<DateTime<Utc>>> {
        let snapshot = self.state.lock().unwrap().entries.get(&job_id).cloned();
        let Some(trigger) = snapshot else {
            return Ok(None);
        };

        let next_fire = if trigger.recurring {
            let expression = trigger
                .cron
                .as_deref()
                .ok_or_else(|| SchedulerError::NoUpcomingFire(String::new()))?;
            cron::next_after(clock::now(), expression, trigger.zone)?
                .ok_or_else(|| SchedulerError::NoUpcomingFire(expression.to_string()))?
        } else {
            trigger.next_fire_at
        };

        self.triggers
            .upsert(
                job_id,
                next_fire,
                trigger.cron.as_deref(),
                &trigger.zone_name,
                false,
            )
            .await?;

        {
            let mut state = self.state.lock().unwrap();
            if let Some(entry) = state.entries.get_mut(&job_id) {
                entry.paused = false;
                entry.next_fire_at = next_fire;
            }
            state.queue.push(Reverse(QueueEntry {
                at: next_fire,
                job_id,
            }));
        }
        self.notify.notify_one();
        Ok(Some(next_fire))
    }

    /// Called by the worker pool when a fire finishes, releasing the per-job
    /// mutual exclusion.
    pub fn complete(&self, job_id: Uuid) {
        self.state.lock().unwrap().in_flight.remove(&job_id);
        self.notify.notify_one();
    }

    pub fn shutdown(&self) {
        self.running.store(false, AtomicOrdering::SeqCst);
        self.notify.notify_one();
    }

    /// Spawn the dispatcher task.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        if self.running.swap(true, AtomicOrdering::SeqCst) {
            return tokio::spawn(async {});
        }
        tokio::spawn(async move { self.run_dispatcher().await })
    }

    async fn run_dispatcher(&self) {
        info!("trigger dispatcher started");
        let slop = Duration::milliseconds(self.config.dispatch_slop_ms);
        let reevaluate = StdDuration::from_millis(self.config.reevaluate_interval_ms);

        loop {
            if !self.running.load(AtomicOrdering::Relaxed) {
                break;
            }

            let now = clock::now();
            let mut due: Vec<(Uuid, DateTime<Utc>, ActiveTrigger)> = Vec::new();
            let mut next_wake: Option<DateTime<Utc>> = None;

            {
                let mut state = self.state.lock().unwrap();
                loop {
                    let head = match state.queue.peek() {
                        Some(Reverse(entry)) => entry.clone(),
                        None => break,
                    };
                    let trigger = match state.entries.get(&head.job_id) {
                        Some(trigger) => trigger,
                        None => {
                            state.queue.pop();
                            continue;
                        }
                    };
                    if trigger.paused || trigger.next_fire_at != head.at {
                        state.queue.pop();
                        continue;
                    }
                    if head.at <= now + slop {
                        let trigger = trigger.clone();
                        state.queue.pop();
                        due.push((head.job_id, head.at, trigger));
                    } else {
                        next_wake = Some(head.at);
                        break;
                    }
                }
            }

            let mut deferred = false;
            for (job_id, at, trigger) in due {
                match self.dispatch_one(job_id, at, trigger, now).await {
                    Ok(true) => {}
                    Ok(false) => deferred = true,
                    Err(e) => {
                        error!("dispatch failed for job {}: {}", job_id, e);
                        self.set_next_and_requeue(job_id, now + Duration::seconds(1));
                        deferred = true;
                    }
                }
            }

            let sleep_for = if deferred {
                reevaluate
            } else {
                match next_wake {
                    Some(at) => (at - clock::now()).to_std().unwrap_or(StdDuration::ZERO),
                    None => StdDuration::from_secs(60),
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.notify.notified() => {}
            }
        }
        info!("trigger dispatcher stopped");
    }

    /// Hand one due trigger to the worker pool. Returns `Ok(false)` when the
    /// fire was requeued instead (channel full or transient overlap) and the
    /// queue should be re-evaluated shortly.
    async fn dispatch_one(
        &self,
        job_id: Uuid,
        at: DateTime<Utc>,
        trigger: ActiveTrigger,
        now: DateTime<Utc>,
    ) -> SchedulerResult<bool> {
        let lag = now - at;
        if lag > Duration::seconds(1) {
            warn!(
                "late fire for job {}: {}ms behind schedule",
                job_id,
                lag.num_milliseconds()
            );
        }

        // Per-job mutual exclusion: never dispatch while the previous fire is
        // still running.
        let overlapping = self.state.lock().unwrap().in_flight.contains(&job_id);
        if overlapping {
            if trigger.recurring {
                let expression = trigger
                    .cron
                    .as_deref()
                    .ok_or_else(|| SchedulerError::NoUpcomingFire(String::new()))?;
                let next = cron::next_after(now, expression, trigger.zone)?
                    .ok_or_else(|| SchedulerError::NoUpcomingFire(expression.to_string()))?;
                info!(
                    "job {} still running, skipping overlapping fire; next at {}",
                    job_id, next
                );
                self.triggers.update_next_fire(job_id, next).await?;
                self.set_next_and_requeue(job_id, next);
                return Ok(true);
            }
            self.set_next_and_requeue(job_id, now + Duration::seconds(1));
            return Ok(false);
        }

        // Reserve a worker slot before touching durable state so a full
        // channel leaves the trigger untouched in the queue.
        let permit = match self.fire_tx.try_reserve() {
            Ok(permit) => permit,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("fire channel full, holding job {} in the queue", job_id);
                self.set_next_and_requeue(job_id, at);
                return Ok(false);
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                warn!("fire channel closed, dropping dispatch for job {}", job_id);
                return Ok(true);
            }
        };

        // Advance or retire the durable trigger before the worker runs so a
        // long execution cannot delay subsequent fires.
        let next_fire_at = if trigger.recurring {
            let expression = trigger
                .cron
                .as_deref()
                .ok_or_else(|| SchedulerError::NoUpcomingFire(String::new()))?;
            let next = cron::next_after(now, expression, trigger.zone)?
                .ok_or_else(|| SchedulerError::NoUpcomingFire(expression.to_string()))?;
            self.triggers.update_next_fire(job_id, next).await?;
            self.set_next_and_requeue(job_id, next);
            Some(next)
        } else {
            self.triggers.delete(job_id).await?;
            self.state.lock().unwrap().entries.remove(&job_id);
            None
        };

        let cancel = self.cancellations.register(job_id);
        self.state.lock().unwrap().in_flight.insert(job_id);
        permit.send(Fire {
            job_id,
            client_id: trigger.client_id,
            recurring: trigger.recurring,
            time_zone: trigger.zone,
            fired_at: at,
            next_fire_at,
            cancel,
        });
        Ok(true)
    }

    fn set_next_and_requeue(&self, job_id: Uuid, at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        if let Some(trigger) = state.entries.get_mut(&job_id) {
            trigger.next_fire_at = at;
            if !trigger.paused {
                state.queue.push(Reverse(QueueEntry { at, job_id }));
            }
        }
    }
}
