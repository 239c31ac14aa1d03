//! Periodic sensor monitoring and alerting

mod config;
mod core;

pub use config::MonitorConfig;
pub use core::Monitor;
