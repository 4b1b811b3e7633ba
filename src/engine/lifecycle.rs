use std::io;

use async_trait::async_trait;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The only thing the host environment has to do for the engine: make sure progress is saved
/// when the session is about to go away (quit, sleep, lock, user switch).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn force_flush_and_stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Ctrl-C or SIGTERM.
    Terminate,
    /// SIGHUP, the controlling session went away.
    SessionEnd,
    /// SIGUSR1, sent by a host hook on sleep, display sleep, lock or user switch.
    Suspend,
}

impl LifecycleEvent {
    pub fn ends_process(self) -> bool {
        !matches!(self, LifecycleEvent::Suspend)
    }
}

/// Forces a flush for `event` and requests shutdown if the event ends the process. Returns
/// whether the process is shutting down.
pub async fn dispatch_event(
    listener: &impl LifecycleListener,
    event: LifecycleEvent,
    shutdown: &CancellationToken,
) -> bool {
    info!("Received {event:?}, saving progress");
    listener.force_flush_and_stop().await;
    if event.ends_process() {
        shutdown.cancel();
        return true;
    }
    false
}

/// Adapts process signals to [LifecycleListener]. This works with limited success: on Windows
/// only Ctrl-C is observed, so sleep and lock have to be reported by the host some other way.
pub async fn forward_lifecycle_events(
    listener: impl LifecycleListener,
    shutdown: CancellationToken,
) -> io::Result<()> {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            use tokio::signal::unix::{signal, SignalKind};

            let mut terminate = signal(SignalKind::terminate())?;
            let mut hangup = signal(SignalKind::hangup())?;
            let mut suspend = signal(SignalKind::user_defined1())?;
            loop {
                let event = select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::signal::ctrl_c() => LifecycleEvent::Terminate,
                    _ = terminate.recv() => LifecycleEvent::Terminate,
                    _ = hangup.recv() => LifecycleEvent::SessionEnd,
                    _ = suspend.recv() => LifecycleEvent::Suspend,
                };
                if dispatch_event(&listener, event, &shutdown).await {
                    return Ok(());
                }
            }
        } else {
            select! {
                _ = shutdown.cancelled() => Ok(()),
                result = tokio::signal::ctrl_c() => {
                    result?;
                    dispatch_event(&listener, LifecycleEvent::Terminate, &shutdown).await;
                    Ok(())
                },
            }
        }
    }
}
