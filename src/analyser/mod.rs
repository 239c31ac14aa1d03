//! Sensor data acquisition and analysis
//!
//! The monitor loop and the data commands only see the [`SensorAnalyser`]
//! trait; the ThingSpeak-backed implementation lives in [`thingspeak`].

mod thingspeak;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use thingspeak::ThingSpeakAnalyser;

/// One analysed sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Display tag for the sensor (e.g. "Bin-1")
    pub tag: String,
    /// Fullness as a percentage in `[0, 100]`
    pub fullness_percent: f64,
}

/// Errors from sensor data acquisition or artifact rendering
#[derive(Debug, Error)]
pub enum AnalyserError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Api(u16),

    #[error("artifact error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no analysed data available yet")]
    NoData,
}

/// Sensor data collaborator
///
/// The monitor loop calls `refresh` once per tick; the chat data commands
/// read the retained snapshot through `report` and `render_graph`.
#[async_trait]
pub trait SensorAnalyser: Send + Sync {
    /// Fetch the latest readings, analyse them, and retain the snapshot
    async fn refresh(&self) -> Result<Vec<SensorReading>, AnalyserError>;

    /// Number of sensors this analyser tracks
    fn sensor_count(&self) -> usize;

    /// Push the retained analysed snapshot upstream
    async fn push_upstream(&self) -> Result<(), AnalyserError>;

    /// Render the retained snapshot to a retrievable artifact, returning its path
    async fn render_graph(&self) -> Result<PathBuf, AnalyserError>;

    /// Textual analysis of the retained snapshot, if one exists
    fn report(&self) -> Option<String>;
}
