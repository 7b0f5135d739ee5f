//! State management with the actor pattern
//!
//! The reducer defines every legal mutation as a pure function; StateStore
//! owns the current AppState and serializes dispatches through a channel.

mod action;
mod messages;
mod reducer;
mod store;

pub use action::{Action, LoadPayload};
pub use messages::{StateCommand, StateError, StateEvent, StateResponse};
pub use reducer::{AppState, DashboardStats, reduce};
pub use store::StateStore;
