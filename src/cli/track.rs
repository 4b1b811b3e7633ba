use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use tokio::{select, sync::watch};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    engine::{lifecycle::forward_lifecycle_events, service::EngineHandle, timer::TimerState},
    goals::record::GoalRecord,
    utils::time::{format_clock, format_duration},
};

use super::goals::find_goal;

#[derive(Debug, Parser)]
pub struct TrackCommand {
    #[arg(help = "Goal position, name or id prefix")]
    goal: String,
}

/// Starts the timer for a goal and keeps the process alive until it is interrupted. Progress is
/// saved on Ctrl-C, SIGTERM and SIGHUP. SIGUSR1 (sleep, lock) saves and pauses tracking while
/// the process keeps running.
pub async fn process_track_command(
    TrackCommand { goal }: TrackCommand,
    handle: &EngineHandle,
    shutdown: &CancellationToken,
) -> Result<()> {
    let goals = handle.list_goals().await?;
    let goal = find_goal(&goals, &goal)?;
    handle.start_timer(goal.id).await?;
    info!("Tracking {:?}", goal.name);
    println!(
        "Tracking {} (target {}). Press Ctrl-C to stop.",
        goal.name,
        format_duration(goal.target_duration)
    );

    let mut stdout = io::stdout();
    // Both end only once the engine is shut down, which flushes the running timer.
    select! {
        result = forward_lifecycle_events(handle.clone(), shutdown.clone()) => result?,
        result = follow_timer(handle.subscribe_timer(), goal, &mut stdout) => result?,
    }
    println!();
    Ok(())
}

/// Prints the running clock of `goal` until the engine goes away.
async fn follow_timer(
    timer: watch::Receiver<TimerState>,
    goal: &GoalRecord,
    out: &mut impl Write,
) -> io::Result<()> {
    let mut updates = WatchStream::new(timer);
    let mut paused = false;
    while let Some(state) = updates.next().await {
        if state.active_goal_id == Some(goal.id) {
            paused = false;
            write!(out, "\r{}  {}", goal.name, format_clock(state.elapsed))?;
        } else if !paused {
            paused = true;
            writeln!(out, "\n{} paused, progress saved", goal.name)?;
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{pin::pin, time::Duration};

    use anyhow::Result;
    use chrono::NaiveDate;
    use tokio::{sync::watch, time::timeout};

    use crate::{
        engine::timer::TimerState,
        goals::record::{GoalRecord, NewGoal},
    };

    use super::follow_timer;

    #[tokio::test(start_paused = true)]
    async fn test_follow_timer_outlives_pause() -> Result<()> {
        let goal = GoalRecord::new(
            NewGoal {
                name: "Reading".into(),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
        );
        let (sender, receiver) = watch::channel(TimerState {
            active_goal_id: Some(goal.id),
            elapsed: 3,
        });
        let mut out = Vec::new();

        {
            let mut follow = pin!(follow_timer(receiver, &goal, &mut out));
            assert!(timeout(Duration::from_secs(1), &mut follow).await.is_err());

            sender.send_replace(TimerState::default());
            assert!(timeout(Duration::from_secs(5), &mut follow).await.is_err());

            drop(sender);
            follow.await?;
        }

        let printed = String::from_utf8(out)?;
        assert!(printed.contains("Reading  00:00:03"));
        assert!(printed.contains("Reading paused, progress saved"));
        Ok(())
    }
}
