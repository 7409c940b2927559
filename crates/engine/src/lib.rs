pub mod executor;
pub mod gateway;
pub mod lifecycle;
pub mod reservation;
pub mod store;

pub use executor::{ExecutorConfig, OrderExecutor};
pub use gateway::ExecutionGatewayClient;
pub use lifecycle::{Core, CoreHandle};
pub use reservation::{CooldownStore, ReservationStore};
pub use store::PositionStore;
