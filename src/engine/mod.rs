use std::{path::Path, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    goals::{error::GoalError, slot::FileSlot, store::GoalStore},
    utils::clock::Clock,
};

pub mod lifecycle;
pub mod service;
pub mod timer;

use service::{EngineHandle, EngineService};
use timer::TimerEngine;

/// Every tick accrues exactly one second.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
/// Name of the slot holding every goal.
pub const GOALS_SLOT: &str = "goals";

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Upper bound of progress lost on an abrupt termination.
    pub flush_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// Store kept in `dir`.
pub fn open_store(dir: &Path) -> Result<GoalStore, GoalError> {
    Ok(GoalStore::new(FileSlot::new(dir, GOALS_SLOT)?))
}

/// Loads the goals, performs the day rollover and prepares the engine. The returned service has
/// to be run for the handle to make progress.
pub async fn create_engine(
    store: GoalStore,
    clock: impl Clock,
    config: EngineConfig,
    shutdown: &CancellationToken,
) -> (EngineService, EngineHandle) {
    let engine = TimerEngine::new(store, Box::new(clock), config).await;
    EngineService::new(engine, shutdown.clone())
}

#[cfg(test)]
mod engine_tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        engine::{
            create_engine,
            lifecycle::{dispatch_event, LifecycleEvent, LifecycleListener},
            open_store, EngineConfig,
        },
        goals::{
            error::GoalError,
            record::{GoalRecord, NewGoal},
            slot::MemorySlot,
            store::GoalStore,
        },
        utils::{clock::test_clock::FixedClock, logging::TEST_LOGGING},
    };

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();

    fn persisted(slot: &MemorySlot) -> Vec<GoalRecord> {
        serde_json::from_slice(&slot.contents().unwrap_or_default()).unwrap_or_default()
    }

    #[tokio::test(start_paused = true)]
    async fn smoke_test_engine() -> Result<()> {
        *TEST_LOGGING;
        let slot = MemorySlot::default();
        let shutdown = CancellationToken::new();
        let (service, handle) = create_engine(
            GoalStore::new(slot.clone()),
            FixedClock::new(TODAY),
            EngineConfig::default(),
            &shutdown,
        )
        .await;
        let running = tokio::spawn(service.run());

        let goal = handle
            .create_goal(NewGoal {
                name: "Deep Work".into(),
                ..Default::default()
            })
            .await?;
        handle.start_timer(goal.id).await?;
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(handle.active_goal_id(), Some(goal.id));
        assert_eq!(handle.current_elapsed_time_for_active(), 3);
        assert_eq!(handle.list_goals().await?[0].today_progress(TODAY), 3);
        assert_eq!(persisted(&slot)[0].today_progress(TODAY), 0);

        handle.force_flush_and_stop().await;

        assert_eq!(handle.active_goal_id(), None);
        assert_eq!(persisted(&slot)[0].today_progress(TODAY), 3);

        shutdown.cancel();
        running.await??;
        assert!(matches!(
            handle.list_goals().await,
            Err(GoalError::EngineClosed)
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_through_handle() -> Result<()> {
        let slot = MemorySlot::default();
        let shutdown = CancellationToken::new();
        let (service, handle) = create_engine(
            GoalStore::new(slot.clone()),
            FixedClock::new(TODAY),
            EngineConfig::default(),
            &shutdown,
        )
        .await;
        let running = tokio::spawn(service.run());

        let a = handle.create_goal(NewGoal::default()).await?;
        let b = handle.create_goal(NewGoal::default()).await?;
        handle.start_timer(a.id).await?;
        tokio::time::sleep(Duration::from_millis(5500)).await;
        handle.start_timer(b.id).await?;

        let stored = persisted(&slot);
        assert_eq!(stored[0].today_progress(TODAY), 5);
        assert_eq!(handle.active_goal_id(), Some(b.id));

        handle.delete_goal(b.id).await?;
        assert_eq!(handle.active_goal_id(), None);
        assert_eq!(handle.list_goals().await?.len(), 1);

        drop(handle);
        running.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_running_timer() -> Result<()> {
        let dir = tempdir()?;
        let shutdown = CancellationToken::new();
        let (service, handle) = create_engine(
            open_store(dir.path())?,
            FixedClock::new(TODAY),
            EngineConfig::default(),
            &shutdown,
        )
        .await;
        let running = tokio::spawn(service.run());

        let goal = handle.create_goal(NewGoal::default()).await?;
        handle.start_timer(goal.id).await?;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.cancel();
        running.await??;

        let reloaded = open_store(dir.path())?.load().await;
        assert_eq!(reloaded[0].today_progress(TODAY), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_saves() -> Result<()> {
        let shutdown = CancellationToken::new();
        let (service, handle) = create_engine(
            GoalStore::new(MemorySlot::default()),
            FixedClock::new(TODAY),
            EngineConfig::default(),
            &shutdown,
        )
        .await;
        let running = tokio::spawn(service.run());
        let mut goals = handle.subscribe_goals();
        let mut timer = handle.subscribe_timer();

        let goal = handle.create_goal(NewGoal::default()).await?;
        assert!(goals.has_changed()?);
        assert_eq!(goals.borrow_and_update()[0].id, goal.id);

        handle.start_timer(goal.id).await?;
        timer.changed().await?;
        assert_eq!(timer.borrow_and_update().active_goal_id, Some(goal.id));

        shutdown.cancel();
        running.await??;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_pauses_and_keeps_serving() -> Result<()> {
        let slot = MemorySlot::default();
        let shutdown = CancellationToken::new();
        let (service, handle) = create_engine(
            GoalStore::new(slot.clone()),
            FixedClock::new(TODAY),
            EngineConfig::default(),
            &shutdown,
        )
        .await;
        let running = tokio::spawn(service.run());

        let goal = handle.create_goal(NewGoal::default()).await?;
        handle.start_timer(goal.id).await?;
        tokio::time::sleep(Duration::from_millis(4500)).await;

        assert!(!dispatch_event(&handle, LifecycleEvent::Suspend, &shutdown).await);

        assert!(!shutdown.is_cancelled());
        assert_eq!(handle.active_goal_id(), None);
        assert_eq!(persisted(&slot)[0].today_progress(TODAY), 4);

        handle.start_timer(goal.id).await?;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(handle.list_goals().await?[0].today_progress(TODAY), 6);

        shutdown.cancel();
        running.await??;
        assert_eq!(persisted(&slot)[0].today_progress(TODAY), 6);
        Ok(())
    }
}
