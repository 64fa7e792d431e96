pub mod frame;
pub mod history;
pub mod message;
pub mod subagent;

pub use frame::*;
pub use history::*;
pub use message::*;
pub use subagent::*;
