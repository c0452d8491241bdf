//! Weekly posting slots and the daily maintenance trigger

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{AstrumError, Result};
use crate::platforms::PlatformId;
use crate::storage::{keys, Collection, SharedStore};
use crate::types::Category;

/// A recurring weekly publishing slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: String,
    pub day: Weekday,
    /// Local time, `HH:MM`
    pub time: String,
    pub category: Category,
    #[serde(default)]
    pub platforms: Vec<PlatformId>,
}

impl ScheduleSlot {
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        parse_hhmm(&self.time).ok()
    }
}

/// Parse a local `HH:MM` time
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        AstrumError::InvalidInput(format!("Invalid time '{}': expected HH:MM", value))
    })
}

pub struct WeeklySchedule {
    slots: Collection<ScheduleSlot>,
}

impl WeeklySchedule {
    pub fn new(store: SharedStore) -> Self {
        Self {
            slots: Collection::new(store, keys::WEEKLY_SCHEDULE),
        }
    }

    pub fn add(
        &self,
        day: Weekday,
        time: &str,
        category: Category,
        platforms: Vec<PlatformId>,
    ) -> Result<ScheduleSlot> {
        let at = parse_hhmm(time)?;
        let slot = ScheduleSlot {
            id: Uuid::new_v4().to_string(),
            day,
            time: at.format("%H:%M").to_string(),
            category,
            platforms,
        };
        self.slots.update(|slots| slots.push(slot.clone()))?;
        Ok(slot)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        self.slots.update(|slots| {
            let before = slots.len();
            slots.retain(|slot| slot.id != id);
            slots.len() != before
        })
    }

    /// Slots ordered Monday first, then by time
    pub fn list(&self) -> Result<Vec<ScheduleSlot>> {
        let mut slots = self.slots.load()?;
        slots.sort_by(|a, b| {
            a.day
                .num_days_from_monday()
                .cmp(&b.day.num_days_from_monday())
                .then_with(|| a.time.cmp(&b.time))
        });
        Ok(slots)
    }

    /// Slots with an occurrence in `(after, until]`, each reported once
    pub fn due_slots(
        &self,
        after: NaiveDateTime,
        until: NaiveDateTime,
    ) -> Result<Vec<ScheduleSlot>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|slot| occurs_between(slot, after, until))
            .collect())
    }
}

fn occurs_between(slot: &ScheduleSlot, after: NaiveDateTime, until: NaiveDateTime) -> bool {
    let Some(time) = slot.time_of_day() else {
        return false;
    };
    if until <= after {
        return false;
    }

    // A week back from `until` covers every weekday
    let first = after.date().max(until.date() - chrono::Duration::days(7));
    first
        .iter_days()
        .take_while(|date| *date <= until.date())
        .filter(|date| date.weekday() == slot.day)
        .map(|date| date.and_time(time))
        .any(|occurrence| occurrence > after && occurrence <= until)
}

/// Time from `now` until the next occurrence of `at`
///
/// An occurrence exactly at `now` counts as already passed.
pub fn delay_until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Work run once per day by the [`DailyScheduler`]
#[async_trait]
pub trait DailyJob: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Stops a running [`DailyScheduler`]
#[derive(Clone)]
pub struct SchedulerHandle {
    shutdown: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Fires a [`DailyJob`] at a fixed local time every day
///
/// Each wake-up recomputes the delay from the current clock, so runs missed
/// while the process was down or suspended are skipped rather than caught
/// up. Nothing about previous runs is persisted.
pub struct DailyScheduler {
    at: NaiveTime,
    shutdown: watch::Receiver<bool>,
}

impl DailyScheduler {
    pub fn new(at: NaiveTime) -> (Self, SchedulerHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self { at, shutdown: rx },
            SchedulerHandle {
                shutdown: Arc::new(tx),
            },
        )
    }

    pub fn at(&self) -> NaiveTime {
        self.at
    }

    /// Run until the handle signals shutdown
    pub async fn run(mut self, job: Arc<dyn DailyJob>) {
        let mut last_run: Option<NaiveDateTime> = None;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // A timer that wakes ahead of the wall clock must not repeat a run
            let now = Local::now().naive_local();
            let now = last_run.map_or(now, |last| now.max(last));
            let delay = delay_until_next(now, self.at);
            let occurrence = now
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            tracing::info!(
                "Next daily run at {} (in {}s)",
                self.at.format("%H:%M"),
                delay.as_secs()
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    last_run = Some(occurrence);
                    tracing::info!("Running daily job");
                    if let Err(e) = job.run().await {
                        tracing::error!("Daily job failed: {}", e);
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Daily scheduler stopped");
    }
}
