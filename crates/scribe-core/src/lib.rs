pub mod config;
pub mod logging;

pub mod control;
pub mod engine;
pub mod executor;
pub mod fallback;
pub mod media;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod store;
