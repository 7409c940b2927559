use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use common::{CoreCommand, CoreState};

/// Cloneable handle passed to the control API.
#[derive(Clone)]
pub struct CoreHandle {
    command_tx: mpsc::Sender<CoreCommand>,
    state: Arc<RwLock<CoreState>>,
}

impl CoreHandle {
    pub async fn send(&self, cmd: CoreCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub async fn state(&self) -> CoreState {
        *self.state.read().await
    }

    pub fn state_handle(&self) -> Arc<RwLock<CoreState>> {
        self.state.clone()
    }
}

/// Command processor for the shared core state. The actors keep ticking in
/// every state; they consult the state each tick and take no decisions
/// unless it is `Running`.
pub struct Core {
    state: Arc<RwLock<CoreState>>,
    command_rx: mpsc::Receiver<CoreCommand>,
    #[allow(dead_code)] // kept to prevent channel close
    command_tx: mpsc::Sender<CoreCommand>,
}

impl Core {
    pub fn new() -> (Self, CoreHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(CoreState::Stopped));

        let handle = CoreHandle {
            command_tx: command_tx.clone(),
            state: state.clone(),
        };

        let core = Core {
            state,
            command_rx,
            command_tx,
        };

        (core, handle)
    }

    /// Run the command loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Core initialized in Stopped state. Waiting for Start command.");

        loop {
            match self.command_rx.recv().await {
                Some(CoreCommand::Start) => {
                    let current = *self.state.read().await;
                    if current == CoreState::Running {
                        info!("Core already running");
                        continue;
                    }
                    info!("Core starting");
                    *self.state.write().await = CoreState::Running;
                }

                Some(CoreCommand::Stop) => {
                    info!("Core stopped — actors idle until next Start");
                    *self.state.write().await = CoreState::Stopped;
                }

                Some(CoreCommand::Pause) => {
                    let current = *self.state.read().await;
                    if current == CoreState::Running {
                        info!("Core paused — data collection continues, decisions suppressed");
                        *self.state.write().await = CoreState::Paused;
                    }
                }

                Some(CoreCommand::Resume) => {
                    let current = *self.state.read().await;
                    if current == CoreState::Paused {
                        info!("Core resumed");
                        *self.state.write().await = CoreState::Running;
                    }
                }

                None => {
                    warn!("Core command channel closed — shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_stop_pause_resume_cycle() {
        let (core, handle) = Core::new();
        tokio::spawn(core.run());

        assert_eq!(handle.state().await, CoreState::Stopped);

        handle.send(CoreCommand::Start).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state().await, CoreState::Running);

        handle.send(CoreCommand::Pause).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state().await, CoreState::Paused);

        handle.send(CoreCommand::Resume).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state().await, CoreState::Running);

        handle.send(CoreCommand::Stop).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state().await, CoreState::Stopped);
    }

    #[tokio::test]
    async fn resume_ignored_unless_paused() {
        let (core, handle) = Core::new();
        tokio::spawn(core.run());

        handle.send(CoreCommand::Resume).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(handle.state().await, CoreState::Stopped);
    }
}
