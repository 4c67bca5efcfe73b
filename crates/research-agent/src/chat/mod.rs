//! Chat turns: relay a generated answer as events and persist the turn
//! once the answer completes.

mod turn;

pub use turn::{ChatEventStream, ChatService};
