//! Mock collaborators for tests
//!
//! Shared by the unit tests and the integration suite; not part of the
//! runtime surface.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::analyser::{AnalyserError, SensorAnalyser, SensorReading};
use crate::registry::Identity;
use crate::services::{AuthClient, ServiceError};
use crate::transport::{ChatId, ChatTransport, TransportError};

/// Auth service mock accepting exactly one credential pair
pub struct MockAuth {
    accept: Option<(String, String)>,
    reachable: bool,
    registered: Mutex<Vec<(String, Identity)>>,
}

impl MockAuth {
    /// Accept exactly this username/password pair; reject everything else
    pub fn accepting(username: &str, password: &str) -> Self {
        Self {
            accept: Some((username.to_string(), password.to_string())),
            reachable: true,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call as if the service were down
    pub fn unreachable() -> Self {
        Self {
            accept: None,
            reachable: false,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Chat ids registered via `register_chat_id`
    pub fn registered(&self) -> Vec<(String, Identity)> {
        self.registered.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthClient for MockAuth {
    async fn login(&self, username: &str, password: &str) -> Result<(), ServiceError> {
        if !self.reachable {
            return Err(ServiceError::Unreachable("connection refused".to_string()));
        }
        match &self.accept {
            Some((u, p)) if u == username && p == password => Ok(()),
            _ => Err(ServiceError::Status(401)),
        }
    }

    async fn register_chat_id(&self, username: &str, chat_id: Identity) -> Result<(), ServiceError> {
        if !self.reachable {
            return Err(ServiceError::Unreachable("connection refused".to_string()));
        }
        self.registered.lock().unwrap().push((username.to_string(), chat_id));
        Ok(())
    }
}

/// One recorded outbound transport operation
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat: ChatId, text: String },
    Menu { chat: ChatId, text: String, buttons: Vec<String> },
    UrlButton { chat: ChatId, label: String, url: String },
    Document { chat: ChatId, path: PathBuf },
}

impl Sent {
    pub fn chat(&self) -> ChatId {
        match self {
            Sent::Text { chat, .. }
            | Sent::Menu { chat, .. }
            | Sent::UrlButton { chat, .. }
            | Sent::Document { chat, .. } => *chat,
        }
    }
}

/// Transport mock that records everything it is asked to send
#[derive(Default)]
pub struct RecordingTransport {
    sent: tokio::sync::Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<ChatId>>,
}

impl RecordingTransport {
    /// Make every send to this chat fail with an API error
    pub fn fail_chat(&self, chat: ChatId) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    fn check(&self, chat: ChatId) -> Result<(), TransportError> {
        if self.failing_chats.lock().unwrap().contains(&chat) {
            return Err(TransportError::Api {
                status: 403,
                description: "bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }

    /// Everything sent so far, in order
    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    /// All plain-text messages delivered to a chat
    pub async fn texts_for(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Text { chat: c, text } if *c == chat => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent plain-text message delivered to a chat
    pub async fn last_text(&self, chat: ChatId) -> Option<String> {
        self.texts_for(chat).await.pop()
    }

    /// Button rows of the most recent menu delivered to a chat
    pub async fn last_menu(&self, chat: ChatId) -> Option<Vec<String>> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Menu { chat: c, buttons, .. } if *c == chat => Some(buttons.clone()),
                _ => None,
            })
            .next_back()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.check(chat)?;
        self.sent.lock().await.push(Sent::Text {
            chat,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_menu(&self, chat: ChatId, text: &str, buttons: &[&str]) -> Result<(), TransportError> {
        self.check(chat)?;
        self.sent.lock().await.push(Sent::Menu {
            chat,
            text: text.to_string(),
            buttons: buttons.iter().map(|b| b.to_string()).collect(),
        });
        Ok(())
    }

    async fn send_url_button(
        &self,
        chat: ChatId,
        _text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), TransportError> {
        self.check(chat)?;
        self.sent.lock().await.push(Sent::UrlButton {
            chat,
            label: label.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    async fn send_document(&self, chat: ChatId, path: &Path) -> Result<(), TransportError> {
        self.check(chat)?;
        self.sent.lock().await.push(Sent::Document {
            chat,
            path: path.to_path_buf(),
        });
        Ok(())
    }
}

/// Analyser mock serving a fixed set of readings
pub struct MockAnalyser {
    readings: Mutex<Vec<SensorReading>>,
    fail_refresh: AtomicBool,
    fail_push: AtomicBool,
    refreshes: AtomicUsize,
    pushes: AtomicUsize,
    renders: AtomicUsize,
}

impl MockAnalyser {
    pub fn with_readings(readings: Vec<(&str, f64)>) -> Self {
        Self {
            readings: Mutex::new(
                readings
                    .into_iter()
                    .map(|(tag, fullness_percent)| SensorReading {
                        tag: tag.to_string(),
                        fullness_percent,
                    })
                    .collect(),
            ),
            fail_refresh: AtomicBool::new(false),
            fail_push: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            pushes: AtomicUsize::new(0),
            renders: AtomicUsize::new(0),
        }
    }

    pub fn set_readings(&self, readings: Vec<(&str, f64)>) {
        *self.readings.lock().unwrap() = readings
            .into_iter()
            .map(|(tag, fullness_percent)| SensorReading {
                tag: tag.to_string(),
                fullness_percent,
            })
            .collect();
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorAnalyser for MockAnalyser {
    async fn refresh(&self) -> Result<Vec<SensorReading>, AnalyserError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AnalyserError::Api(500));
        }
        Ok(self.readings.lock().unwrap().clone())
    }

    fn sensor_count(&self) -> usize {
        self.readings.lock().unwrap().len()
    }

    async fn push_upstream(&self) -> Result<(), AnalyserError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(AnalyserError::Api(500));
        }
        Ok(())
    }

    async fn render_graph(&self) -> Result<PathBuf, AnalyserError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from("bin_fullness.svg"))
    }

    fn report(&self) -> Option<String> {
        let readings = self.readings.lock().unwrap();
        if readings.is_empty() {
            return None;
        }
        Some(
            readings
                .iter()
                .map(|r| format!("{}: {:.2}% full", r.tag, r.fullness_percent))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
