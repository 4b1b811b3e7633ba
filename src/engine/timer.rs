use chrono::NaiveDate;
use tokio::{sync::watch, time::Instant};
use tracing::{debug, info, instrument, warn};

use crate::{
    goals::{
        error::GoalError,
        record::{GoalId, GoalRecord, NewGoal},
        store::GoalStore,
    },
    utils::clock::Clock,
};

use super::{EngineConfig, TICK_PERIOD};

/// What observers see of the timer. `elapsed` is today's total for the active goal, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerState {
    pub active_goal_id: Option<GoalId>,
    pub elapsed: u64,
}

/// Bookkeeping of the running timer. Dropping it cancels the ticker.
#[derive(Debug)]
struct ActiveTimer {
    goal_id: GoalId,
    elapsed: u64,
    /// Day the accrual is currently written into.
    day: NaiveDate,
    next_tick: Instant,
    last_flush: Instant,
}

/// Single active timer over the in-memory goals. The engine itself is not synchronized:
/// [EngineService](super::service::EngineService) is the one place that drives it, so ticks and
/// transitions never overlap.
pub struct TimerEngine {
    store: GoalStore,
    clock: Box<dyn Clock>,
    config: EngineConfig,
    goals: Vec<GoalRecord>,
    active: Option<ActiveTimer>,
    state: watch::Sender<TimerState>,
}

impl TimerEngine {
    /// Loads the goals and runs the day rollover check.
    pub async fn new(store: GoalStore, clock: Box<dyn Clock>, config: EngineConfig) -> Self {
        let goals = store.load().await;
        let (state, _) = watch::channel(TimerState::default());
        let mut engine = Self {
            store,
            clock,
            config,
            goals,
            active: None,
            state,
        };
        engine.roll_over_day().await;
        engine
    }

    /// In-memory goals, including accrual that wasn't flushed yet.
    pub fn goals(&self) -> &[GoalRecord] {
        &self.goals
    }

    pub fn store(&self) -> &GoalStore {
        &self.store
    }

    pub fn active_goal_id(&self) -> Option<GoalId> {
        self.active.as_ref().map(|v| v.goal_id)
    }

    pub fn current_elapsed_time_for_active(&self) -> u64 {
        self.active.as_ref().map_or(0, |v| v.elapsed)
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.subscribe()
    }

    /// Resolves when the next tick is due. Never resolves while idle.
    pub async fn tick_due(&self) {
        match self.active.as_ref().map(|v| v.next_tick) {
            Some(instant) => self.clock.sleep_until(instant).await,
            None => std::future::pending().await,
        }
    }

    /// Advances every goal's rollover marker to today and persists if anything changed.
    pub async fn roll_over_day(&mut self) {
        let today = self.clock.today();
        let rolled = self
            .goals
            .iter_mut()
            .fold(0, |count, goal| count + usize::from(goal.roll_over(today)));
        if rolled > 0 {
            info!("Rolled {rolled} goals over to {today}");
            let _ = self.persist().await;
        }
    }

    #[instrument(skip(self))]
    pub async fn start_timer(&mut self, goal_id: GoalId) {
        if self.position(goal_id).is_none() {
            warn!("{}", GoalError::NotFound(goal_id));
            return;
        }

        match self.active_goal_id() {
            Some(active) if active == goal_id => {
                debug!("Timer is already running");
                return;
            }
            Some(_) => self.stop_timer().await,
            None => {}
        }

        self.roll_over_day().await;

        let today = self.clock.today();
        let Some(goal) = self.goals.iter().find(|v| v.id == goal_id) else {
            return;
        };
        let now = self.clock.instant();
        self.active = Some(ActiveTimer {
            goal_id,
            elapsed: goal.today_progress(today),
            day: today,
            next_tick: now + TICK_PERIOD,
            last_flush: now,
        });
        info!("Started timer for {:?}", goal.name);
        self.publish_state();
    }

    /// Accrues one second into the active goal. Flushes when the flush interval has passed.
    pub async fn tick(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let (goal_id, previous_day) = (active.goal_id, active.day);

        let today = self.clock.today();
        if today != previous_day {
            // Seconds already accrued stay on the day they were tracked on.
            info!("Day changed from {previous_day} to {today} while the timer was running");
            self.roll_over_day().await;
            let seed = self
                .goals
                .iter()
                .find(|v| v.id == goal_id)
                .map_or(0, |v| v.today_progress(today));
            if let Some(active) = self.active.as_mut() {
                active.day = today;
                active.elapsed = seed;
            }
        }

        let Some(index) = self.position(goal_id) else {
            warn!("Active goal {goal_id} disappeared, stopping the timer");
            self.active = None;
            self.publish_state();
            return;
        };
        let Some(active) = self.active.as_mut() else {
            return;
        };

        active.elapsed = active.elapsed.saturating_add(1);
        active.next_tick += TICK_PERIOD;
        self.goals[index].set_progress(active.day, active.elapsed);
        debug!("Tick {} for {goal_id}", active.elapsed);

        let flush_due =
            self.clock.instant().duration_since(active.last_flush) >= self.config.flush_interval;
        self.publish_state();

        if flush_due {
            // A failure is already logged by the store. Accrual continues and the next interval retries.
            let _ = self.flush().await;
        }
    }

    /// Persists the active goal's accrual. Does nothing while idle.
    pub async fn flush(&mut self) -> Result<(), GoalError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        active.last_flush = self.clock.instant();
        let (goal_id, day, elapsed) = (active.goal_id, active.day, active.elapsed);

        if let Some(goal) = self.goals.iter_mut().find(|v| v.id == goal_id) {
            goal.set_progress(day, elapsed);
        }
        debug!("Flushing {elapsed}s for {goal_id}");
        self.persist().await
    }

    #[instrument(skip(self))]
    pub async fn stop_timer(&mut self) {
        if self.active.is_none() {
            return;
        }
        let flushed = self.flush().await;
        let Some(active) = self.active.take() else {
            return;
        };
        match flushed {
            Ok(()) => info!("Stopped timer for {} at {}s", active.goal_id, active.elapsed),
            Err(e) => warn!(
                "Stopped timer for {} but progress since the last flush may be lost: {e}",
                active.goal_id
            ),
        }
        self.publish_state();
    }

    pub async fn create_goal(&mut self, goal: NewGoal) -> GoalRecord {
        let record = GoalRecord::new(goal, self.clock.today());
        info!("Created goal {} {:?}", record.id, record.name);
        self.goals.push(record.clone());
        let _ = self.persist().await;
        record
    }

    /// Replaces the goal with the same id. While the goal is tracked the running value for
    /// today wins over the edited one.
    pub async fn update_goal(&mut self, mut record: GoalRecord) {
        let Some(index) = self.position(record.id) else {
            warn!("{}", GoalError::NotFound(record.id));
            return;
        };
        if let Some(active) = self.active.as_ref().filter(|v| v.goal_id == record.id) {
            record.set_progress(active.day, active.elapsed);
        }
        debug!("Updated goal {}", record.id);
        self.goals[index] = record;
        let _ = self.persist().await;
    }

    pub async fn delete_goal(&mut self, goal_id: GoalId) {
        let Some(index) = self.position(goal_id) else {
            warn!("{}", GoalError::NotFound(goal_id));
            return;
        };
        if self.active_goal_id() == Some(goal_id) {
            self.stop_timer().await;
        }
        let removed = self.goals.remove(index);
        info!("Deleted goal {} {:?}", removed.id, removed.name);
        let _ = self.persist().await;
    }

    pub async fn reorder_goals(&mut self, from: &[usize], to: usize) {
        move_elements(&mut self.goals, from, to);
        let _ = self.persist().await;
    }

    fn position(&self, goal_id: GoalId) -> Option<usize> {
        self.goals.iter().position(|v| v.id == goal_id)
    }

    async fn persist(&self) -> Result<(), GoalError> {
        self.store.save(&self.goals).await
    }

    fn publish_state(&self) {
        self.state.send_replace(TimerState {
            active_goal_id: self.active_goal_id(),
            elapsed: self.current_elapsed_time_for_active(),
        });
    }
}

/// Moves the elements at `from` so they end up, in their original order, right before the
/// element that was at `to` (or at the end when `to` is past the last element).
fn move_elements<T>(items: &mut Vec<T>, from: &[usize], to: usize) {
    let mut indices = from
        .iter()
        .copied()
        .filter(|&v| {
            let valid = v < items.len();
            if !valid {
                warn!("Ignoring out of range index {v} while reordering");
            }
            valid
        })
        .collect::<Vec<_>>();
    indices.sort_unstable();
    indices.dedup();
    if indices.is_empty() {
        return;
    }

    let insert_at = to.min(items.len()) - indices.iter().filter(|&&v| v < to).count();

    let mut moved = Vec::with_capacity(indices.len());
    for &index in indices.iter().rev() {
        moved.push(items.remove(index));
    }
    moved.reverse();

    let tail = items.split_off(insert_at);
    items.extend(moved);
    items.extend(tail);
}
