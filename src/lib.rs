//! binwatch - chat-driven bin fullness monitoring
//!
//! A bot that gates sensor data behind a chat login dialogue and alerts
//! subscribed users when a bin crosses the fullness threshold.
//!
//! # Architecture
//!
//! Two long-lived tasks share state through one owning task:
//!
//! - The **event-dispatch task** routes inbound chat messages (login
//!   dialogue, menus, data commands)
//! - The **monitor task** polls the sensor channel on a fixed interval and
//!   raises threshold alerts
//! - The **session registry task** owns all authentication, dialogue, and
//!   subscription state; both other tasks reach it via message passing, so
//!   every state transition is atomic
//!
//! # Modules
//!
//! - [`registry`] - session registry actor and handle
//! - [`dialogue`] - login conversation driver
//! - [`router`] - inbound event routing and auth gating
//! - [`monitor`] - periodic monitor-and-alert loop
//! - [`alert`] - best-effort alert broadcasting
//! - [`transport`] - chat transport trait and Telegram implementation
//! - [`services`] - remote authentication service client
//! - [`analyser`] - sensor data acquisition and analysis

pub mod alert;
pub mod analyser;
pub mod cli;
pub mod config;
pub mod dialogue;
pub mod monitor;
pub mod registry;
pub mod router;
pub mod services;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod transport;

// Re-export commonly used types
pub use alert::AlertDispatcher;
pub use analyser::{AnalyserError, SensorAnalyser, SensorReading, ThingSpeakAnalyser};
pub use config::{Config, ServicesConfig, TelegramConfig, ThingSpeakConfig};
pub use dialogue::{AuthDialogue, DialogueReply};
pub use monitor::{Monitor, MonitorConfig};
pub use registry::{
    AuthState, DialogueStep, Identity, LoginStart, RegistryHandle, RegistryMetrics, SessionRegistry,
};
pub use router::{Command, EventRouter, run_dispatch};
pub use services::{AuthClient, HttpAuthClient, ServiceError};
pub use transport::{ChatEvent, ChatId, ChatTransport, TelegramTransport, TransportError};
