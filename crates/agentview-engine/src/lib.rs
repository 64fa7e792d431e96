// Engine module - turn reconstruction logic shared by the live stream
// path and the historical replay path. Sits between normalized frames
// (types) and the rendering layer.

pub mod reducer;
pub mod replay;
mod scope;

pub use reducer::{TurnOutcome, TurnReducer};
pub use replay::replay_history;
