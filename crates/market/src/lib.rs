pub mod collector;
pub mod indicators;
pub mod provider;
pub mod snapshot;

pub use collector::MarketDataCollector;
pub use provider::HttpMarketDataProvider;
pub use snapshot::SnapshotStore;
