use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::goals::{
    error::GoalError,
    record::{GoalId, GoalRecord, NewGoal},
};

use super::{
    lifecycle::LifecycleListener,
    timer::{TimerEngine, TimerState},
};

/// Requests accepted by [EngineService]. Every command carries the channel its answer goes to.
#[derive(Debug)]
enum Command {
    ListGoals(oneshot::Sender<Vec<GoalRecord>>),
    CreateGoal(NewGoal, oneshot::Sender<GoalRecord>),
    UpdateGoal(GoalRecord, oneshot::Sender<()>),
    DeleteGoal(GoalId, oneshot::Sender<()>),
    ReorderGoals {
        from: Vec<usize>,
        to: usize,
        reply: oneshot::Sender<()>,
    },
    StartTimer(GoalId, oneshot::Sender<()>),
    StopTimer(oneshot::Sender<()>),
    Flush(oneshot::Sender<Result<(), GoalError>>),
}

/// The coordination point of the engine. Commands and ticks are processed one at a time by
/// [EngineService::run].
pub struct EngineService {
    engine: TimerEngine,
    receiver: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
}

impl EngineService {
    /// Wraps `engine` and returns the handle used to talk to it.
    pub fn new(engine: TimerEngine, shutdown: CancellationToken) -> (Self, EngineHandle) {
        let (sender, receiver) = mpsc::channel(16);
        let handle = EngineHandle {
            sender,
            timer: engine.subscribe(),
            goals: engine.store().subscribe(),
        };
        (
            Self {
                engine,
                receiver,
                shutdown,
            },
            handle,
        )
    }

    /// Executes the engine event loop until shutdown or until every handle is dropped. The
    /// running timer is flushed and stopped on the way out.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                // Deadlines are absolute, so a slow flush only delays the following ticks and
                // overdue ones still fire one by one.
                _ = self.engine.tick_due() => self.engine.tick().await,
            }
        }

        info!("Stopping timer engine");
        self.engine.stop_timer().await;
        self.receiver.close();
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        debug!("Handling {command:?}");
        // A dropped reply channel only means the caller stopped waiting.
        match command {
            Command::ListGoals(reply) => {
                let _ = reply.send(self.engine.goals().to_vec());
            }
            Command::CreateGoal(goal, reply) => {
                let _ = reply.send(self.engine.create_goal(goal).await);
            }
            Command::UpdateGoal(record, reply) => {
                self.engine.update_goal(record).await;
                let _ = reply.send(());
            }
            Command::DeleteGoal(id, reply) => {
                self.engine.delete_goal(id).await;
                let _ = reply.send(());
            }
            Command::ReorderGoals { from, to, reply } => {
                self.engine.reorder_goals(&from, to).await;
                let _ = reply.send(());
            }
            Command::StartTimer(id, reply) => {
                self.engine.start_timer(id).await;
                let _ = reply.send(());
            }
            Command::StopTimer(reply) => {
                self.engine.stop_timer().await;
                let _ = reply.send(());
            }
            Command::Flush(reply) => {
                let _ = reply.send(self.engine.flush().await);
            }
        }
    }
}

/// Cheap, clonable access to a running [EngineService]. Every call returns once the engine has
/// fully applied it, including the persistence it triggers.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<Command>,
    timer: watch::Receiver<TimerState>,
    goals: watch::Receiver<Arc<[GoalRecord]>>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, GoalError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| GoalError::EngineClosed)?;
        response.await.map_err(|_| GoalError::EngineClosed)
    }

    /// Snapshot of the goals, including progress that wasn't flushed yet.
    pub async fn list_goals(&self) -> Result<Vec<GoalRecord>, GoalError> {
        self.request(Command::ListGoals).await
    }

    pub async fn create_goal(&self, goal: NewGoal) -> Result<GoalRecord, GoalError> {
        self.request(|reply| Command::CreateGoal(goal, reply)).await
    }

    pub async fn update_goal(&self, record: GoalRecord) -> Result<(), GoalError> {
        self.request(|reply| Command::UpdateGoal(record, reply))
            .await
    }

    pub async fn delete_goal(&self, id: GoalId) -> Result<(), GoalError> {
        self.request(|reply| Command::DeleteGoal(id, reply)).await
    }

    pub async fn reorder_goals(&self, from: Vec<usize>, to: usize) -> Result<(), GoalError> {
        self.request(|reply| Command::ReorderGoals { from, to, reply })
            .await
    }

    pub async fn start_timer(&self, id: GoalId) -> Result<(), GoalError> {
        self.request(|reply| Command::StartTimer(id, reply)).await
    }

    pub async fn stop_timer(&self) -> Result<(), GoalError> {
        self.request(Command::StopTimer).await
    }

    pub async fn flush(&self) -> Result<(), GoalError> {
        self.request(Command::Flush).await?
    }

    pub fn active_goal_id(&self) -> Option<GoalId> {
        self.timer.borrow().active_goal_id
    }

    pub fn current_elapsed_time_for_active(&self) -> u64 {
        self.timer.borrow().elapsed
    }

    /// Notified on every tick and transition.
    pub fn subscribe_timer(&self) -> watch::Receiver<TimerState> {
        self.timer.clone()
    }

    /// Notified every time the goals are persisted.
    pub fn subscribe_goals(&self) -> watch::Receiver<Arc<[GoalRecord]>> {
        self.goals.clone()
    }
}

#[async_trait]
impl LifecycleListener for EngineHandle {
    async fn force_flush_and_stop(&self) {
        if let Err(e) = self.stop_timer().await {
            error!("Couldn't flush the timer {e}");
        }
    }
}
