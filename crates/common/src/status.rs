use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// Run/error counters for one periodic actor, exposed via the status query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActorStatus {
    pub runs: u64,
    pub errors: u64,
    pub last_tick: Option<DateTime<Utc>>,
}

/// Cloneable handle to one actor's counters.
#[derive(Clone, Default)]
pub struct StatusHandle(Arc<RwLock<ActorStatus>>);

impl StatusHandle {
    pub async fn record_run(&self) {
        let mut s = self.0.write().await;
        s.runs += 1;
        s.last_tick = Some(Utc::now());
    }

    pub async fn record_error(&self) {
        self.0.write().await.errors += 1;
    }

    pub async fn snapshot(&self) -> ActorStatus {
        self.0.read().await.clone()
    }
}

/// Per-actor status counters shared between the actors and the control API.
#[derive(Clone, Default)]
pub struct StatusBoard {
    pub collector: StatusHandle,
    pub generator: StatusHandle,
    pub executor: StatusHandle,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub collector: ActorStatus,
    pub generator: ActorStatus,
    pub executor: ActorStatus,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report(&self) -> StatusReport {
        StatusReport {
            collector: self.collector.snapshot().await,
            generator: self.generator.snapshot().await,
            executor: self.executor.snapshot().await,
        }
    }
}
