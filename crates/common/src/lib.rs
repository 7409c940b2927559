pub mod clients;
pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use clients::{AdvisoryClient, ExecutionClient, MarketDataProvider};
pub use config::Config;
pub use error::{Error, Result};
pub use status::{ActorStatus, StatusBoard, StatusHandle};
pub use types::*;
