//! coachlink - Trainer/student coaching backend
//!
//! Workout and diet plans, daily progress and media for a trainer's roster,
//! served over a typed RPC endpoint or a hosted REST store.

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod rpc;
pub mod server;
pub mod state;
pub mod store;

pub use backend::Backend;
pub use config::Config;
pub use error::{CoachError, Result};
pub use state::ClientState;
