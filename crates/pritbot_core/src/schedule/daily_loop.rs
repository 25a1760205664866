use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use tracing::{debug, info};

use super::TimeOfDay;

/// Work run once a day per guild by a [`DailyLoop`].
#[async_trait]
pub trait DailyTask: Send + Sync + 'static {
    /// Time of day the next wakeup for a guild should happen at.
    ///
    /// `None` skips scheduling, for guilds that have not configured the
    /// feature yet. They are picked up again on the next `start`/`reset`.
    async fn wake_time(&self, guild_id: u64) -> Option<TimeOfDay>;

    async fn run(&self, guild_id: u64);
}

/// Time to sleep before `target`. A target already in the past fires right away.
fn delay_until(now: &DateTime<Tz>, target: &DateTime<Tz>) -> Duration {
    (*target - *now).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopState {
    generation: u64,
    running: bool,
}

struct Inner<T> {
    name: &'static str,
    task: T,
    timezone: Tz,
    states: DashMap<u64, LoopState>,
}

/// Per-guild daily wakeups with generation-counter cancellation.
///
/// Every pending wakeup remembers the generation it was scheduled under.
/// `start`, `stop` and `reset` bump the stored generation, which turns any
/// wakeup scheduled before them into a no-op when it fires.
pub struct DailyLoop<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DailyLoop<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DailyTask> DailyLoop<T> {
    pub fn new(name: &'static str, task: T, timezone: Tz) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                task,
                timezone,
                states: DashMap::new(),
            }),
        }
    }

    pub fn task(&self) -> &T {
        &self.inner.task
    }

    /// Start the loop for a guild, superseding any wakeup already pending.
    pub fn start(&self, guild_id: u64) {
        let generation = {
            let mut state = self
                .inner
                .states
                .entry(guild_id)
                .and_modify(|state| state.generation += 1)
                .or_insert(LoopState {
                    generation: 0,
                    running: true,
                });
            state.running = true;
            state.generation
        };
        info!(guild_id, generation, task = self.inner.name, "starting daily loop");
        self.schedule(guild_id, generation);
    }

    /// Stop the loop for a guild. Unknown guilds are left untouched.
    pub fn stop(&self, guild_id: u64) {
        if let Some(mut state) = self.inner.states.get_mut(&guild_id) {
            if state.running {
                state.generation += 1;
                state.running = false;
                debug!(guild_id, task = self.inner.name, "stopped daily loop");
            }
        }
    }

    /// Restart the loop, for example after the configured time changed.
    pub fn reset(&self, guild_id: u64) {
        self.stop(guild_id);
        self.start(guild_id);
    }

    pub fn is_running(&self, guild_id: u64) -> bool {
        self.inner
            .states
            .get(&guild_id)
            .is_some_and(|state| state.running)
    }

    pub fn generation(&self, guild_id: u64) -> Option<u64> {
        self.inner.states.get(&guild_id).map(|state| state.generation)
    }

    fn is_current(&self, guild_id: u64, generation: u64) -> bool {
        self.inner
            .states
            .get(&guild_id)
            .is_some_and(|state| state.running && state.generation == generation)
    }

    fn schedule(&self, guild_id: u64, generation: u64) {
        let this = self.clone();
        tokio::spawn(async move {
            let Some(time) = this.inner.task.wake_time(guild_id).await else {
                debug!(guild_id, task = this.inner.name, "no wake time configured");
                return;
            };

            let now = Utc::now().with_timezone(&this.inner.timezone);
            let next = time.next_after(&now);
            let delay = delay_until(&now, &next);
            debug!(
                guild_id,
                task = this.inner.name,
                at = %next,
                "next wakeup in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;

            if !this.is_current(guild_id, generation) {
                debug!(guild_id, generation, task = this.inner.name, "superseded wakeup");
                return;
            }

            this.inner.task.run(guild_id).await;

            if this.is_current(guild_id, generation) {
                this.schedule(guild_id, generation);
            }
        });
    }
}
