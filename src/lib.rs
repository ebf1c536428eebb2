pub mod analysis;
pub mod annotate;
pub mod config;
pub mod dedup;
pub mod device;
pub mod error;
pub mod face;
pub mod monitor;
pub mod notify;
pub mod session_log;
pub mod snapshot;

// Re-export vision types for convenience
pub use vigil_vision::{model::ModelSet, Camera, Gallery, Pipeline};

pub use monitor::{Monitor, RunSummary};
