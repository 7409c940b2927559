pub mod gate;
pub mod sizing;

pub use gate::{gate, GateInput};
pub use sizing::{size, stops_for, SizingInput, MAX_ORDER_QUANTITY};
