//! Event routing
//!
//! Maps inbound chat events to handlers, consulting the session registry
//! to gate data access. Unauthenticated access to a gated action renders
//! the main menu instead of failing.

use std::sync::Arc;

use eyre::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::analyser::{AnalyserError, SensorAnalyser};
use crate::dialogue::{AuthDialogue, DialogueReply};
use crate::registry::{Identity, RegistryHandle};
use crate::transport::{ChatEvent, ChatId, ChatTransport};

pub const MSG_HELP_FALLBACK: &str = "Use /help to get more info.";
pub const MSG_NO_ANALYSIS: &str = "No analysis available yet. Please try again soon.";

const HELP_TEXT: &str = "Here are the available commands:\n\
    /start - Start the bot and see the main menu\n\
    /help - Show this help message\n\
    /logout - Log out of the bot\n\
    \n\
    Other commands available through buttons:\n\
    - Real-time data\n\
    - Data analysis\n\
    - Graph of current fullness\n";

pub const BTN_LOGIN: &str = "Login";
pub const BTN_BACK: &str = "Back!";
pub const BTN_REAL_TIME: &str = "Send me to real-time";
pub const BTN_DATA_ANALYSIS: &str = "Send me a data analysis";
pub const BTN_FULLNESS_GRAPH: &str = "Send me a graph of current fullness!";

/// A routed inbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Logout,
    Quit,
    LoginStart,
    Menu,
    RealTime,
    DataAnalysis,
    FullnessGraph,
    FreeText,
}

impl Command {
    /// Map message text to a command
    ///
    /// Triggers are case-sensitive prefix matches, mirroring how the chat
    /// platform matches button presses; anything else is free text.
    pub fn parse(text: &str) -> Command {
        // Longer triggers first so "Send me a data analysis" is not
        // shadowed by a shorter prefix
        const TRIGGERS: &[(&str, Command)] = &[
            ("/start", Command::Start),
            ("/help", Command::Help),
            ("/logout", Command::Logout),
            ("/quit", Command::Quit),
            (BTN_FULLNESS_GRAPH, Command::FullnessGraph),
            (BTN_DATA_ANALYSIS, Command::DataAnalysis),
            (BTN_REAL_TIME, Command::RealTime),
            (BTN_LOGIN, Command::LoginStart),
            (BTN_BACK, Command::Menu),
        ];

        TRIGGERS
            .iter()
            .find(|(trigger, _)| text.starts_with(trigger))
            .map(|(_, command)| *command)
            .unwrap_or(Command::FreeText)
    }
}

/// Routes inbound chat events to handlers
pub struct EventRouter {
    registry: RegistryHandle,
    dialogue: AuthDialogue,
    transport: Arc<dyn ChatTransport>,
    analyser: Arc<dyn SensorAnalyser>,
    dashboard_url: String,
    quit_tx: mpsc::Sender<()>,
}

impl EventRouter {
    pub fn new(
        registry: RegistryHandle,
        dialogue: AuthDialogue,
        transport: Arc<dyn ChatTransport>,
        analyser: Arc<dyn SensorAnalyser>,
        dashboard_url: String,
        quit_tx: mpsc::Sender<()>,
    ) -> Self {
        Self {
            registry,
            dialogue,
            transport,
            analyser,
            dashboard_url,
            quit_tx,
        }
    }

    /// Handle one inbound event
    pub async fn dispatch(&self, event: &ChatEvent) -> Result<()> {
        let command = Command::parse(&event.text);
        debug!(sender = event.sender, ?command, "Dispatching chat event");

        match command {
            Command::Start | Command::Menu => self.send_main_menu(event.sender, event.chat).await,
            Command::Help => {
                self.transport.send_text(event.chat, HELP_TEXT).await?;
                Ok(())
            }
            Command::LoginStart => self.dialogue.begin_login(event.sender, event.chat).await,
            Command::Logout => self.dialogue.logout(event.sender, event.chat).await,
            Command::Quit => self.quit(event.sender, event.chat).await,
            Command::RealTime => self.real_time(event.sender, event.chat).await,
            Command::DataAnalysis => self.data_analysis(event.sender, event.chat).await,
            Command::FullnessGraph => self.fullness_graph(event.sender, event.chat).await,
            Command::FreeText => self.free_text(event.sender, event.chat, &event.text).await,
        }
    }

    /// Render the main menu appropriate to the sender's auth state
    pub async fn send_main_menu(&self, identity: Identity, chat: ChatId) -> Result<()> {
        if self.registry.is_authenticated(identity).await? {
            self.transport
                .send_menu(
                    chat,
                    "Welcome to the bot! Choose an option:",
                    &[BTN_REAL_TIME, BTN_DATA_ANALYSIS, BTN_FULLNESS_GRAPH],
                )
                .await?;
        } else {
            self.transport
                .send_menu(chat, "Welcome to the bot! Please select an option:", &[BTN_LOGIN])
                .await?;
        }
        Ok(())
    }

    /// Gate check: redirect unauthenticated senders to the main menu
    async fn ensure_authenticated(&self, identity: Identity, chat: ChatId) -> Result<bool> {
        if self.registry.is_authenticated(identity).await? {
            return Ok(true);
        }
        debug!(identity, "Unauthenticated access to gated action; showing menu");
        self.send_main_menu(identity, chat).await?;
        Ok(false)
    }

    async fn real_time(&self, identity: Identity, chat: ChatId) -> Result<()> {
        if !self.ensure_authenticated(identity, chat).await? {
            return Ok(());
        }
        self.transport
            .send_url_button(
                chat,
                "Link to real-time graphing:",
                "Live dashboard",
                &self.dashboard_url,
            )
            .await?;
        Ok(())
    }

    async fn data_analysis(&self, identity: Identity, chat: ChatId) -> Result<()> {
        if !self.ensure_authenticated(identity, chat).await? {
            return Ok(());
        }
        match self.analyser.report() {
            Some(report) => self.transport.send_text(chat, &report).await?,
            None => self.transport.send_text(chat, MSG_NO_ANALYSIS).await?,
        }
        Ok(())
    }

    async fn fullness_graph(&self, identity: Identity, chat: ChatId) -> Result<()> {
        if !self.ensure_authenticated(identity, chat).await? {
            return Ok(());
        }
        match self.analyser.render_graph().await {
            Ok(path) => {
                self.transport
                    .send_text(chat, "Here is the graph of the current fullness:")
                    .await?;
                self.transport.send_document(chat, &path).await?;
            }
            Err(AnalyserError::NoData) => {
                self.transport.send_text(chat, MSG_NO_ANALYSIS).await?;
            }
            Err(e) => {
                warn!(identity, error = %e, "Failed to render fullness graph");
                self.transport
                    .send_text(chat, "Could not render the graph right now.")
                    .await?;
            }
        }
        Ok(())
    }

    async fn quit(&self, identity: Identity, chat: ChatId) -> Result<()> {
        if !self.ensure_authenticated(identity, chat).await? {
            return Ok(());
        }
        info!(identity, "Shutdown requested via chat");
        self.transport.send_text(chat, "Shutting down.").await?;
        let _ = self.quit_tx.send(()).await;
        Ok(())
    }

    async fn free_text(&self, identity: Identity, chat: ChatId, text: &str) -> Result<()> {
        match self.dialogue.handle_text(identity, chat, text).await? {
            DialogueReply::LoggedIn { .. } => self.send_main_menu(identity, chat).await,
            DialogueReply::Handled => Ok(()),
            DialogueReply::NotInDialogue => {
                // Free chat outside a dialogue gets the help prompt, even
                // from an authenticated idle user
                self.transport.send_text(chat, MSG_HELP_FALLBACK).await?;
                Ok(())
            }
        }
    }
}

/// Run the event-dispatch task
///
/// Each inbound event is handled in its own short-lived task so a slow
/// collaborator call never blocks the stream of updates.
pub async fn run_dispatch(router: Arc<EventRouter>, mut events_rx: mpsc::Receiver<ChatEvent>) {
    info!("Event dispatch started");
    while let Some(event) = events_rx.recv().await {
        let router = router.clone();
        tokio::spawn(async move {
            if let Err(e) = router.dispatch(&event).await {
                error!(sender = event.sender, error = %e, "Failed to handle chat event");
            }
        });
    }
    info!("Event dispatch stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionRegistry;
    use crate::testutil::{MockAnalyser, MockAuth, RecordingTransport, Sent};

    fn fixture() -> (Arc<EventRouter>, RegistryHandle, Arc<RecordingTransport>, mpsc::Receiver<()>) {
        let registry = SessionRegistry::new();
        let handle = registry.handle();
        tokio::spawn(registry.run());

        let transport = Arc::new(RecordingTransport::default());
        let analyser = Arc::new(MockAnalyser::with_readings(vec![("Bin-1", 85.0), ("Bin-2", 10.0)]));
        let dialogue = AuthDialogue::new(
            handle.clone(),
            Arc::new(MockAuth::accepting("alice", "hunter2")),
            transport.clone(),
        );
        let (quit_tx, quit_rx) = mpsc::channel(1);

        let router = Arc::new(EventRouter::new(
            handle.clone(),
            dialogue,
            transport.clone(),
            analyser,
            "https://example.com/channels/1".to_string(),
            quit_tx,
        ));
        (router, handle, transport, quit_rx)
    }

    fn event(sender: Identity, text: &str) -> ChatEvent {
        ChatEvent {
            sender,
            chat: sender,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/logout"), Command::Logout);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("Login"), Command::LoginStart);
        assert_eq!(Command::parse("Back!"), Command::Menu);
        assert_eq!(Command::parse("Send me to real-time"), Command::RealTime);
        assert_eq!(Command::parse("Send me a data analysis"), Command::DataAnalysis);
        assert_eq!(
            Command::parse("Send me a graph of current fullness!"),
            Command::FullnessGraph
        );
        assert_eq!(Command::parse("hello there"), Command::FreeText);
        // Case-sensitive: lowercase is free text
        assert_eq!(Command::parse("login"), Command::FreeText);
    }

    #[tokio::test]
    async fn test_start_shows_login_only_menu_when_anonymous() {
        let (router, _, transport, _) = fixture();

        router.dispatch(&event(1, "/start")).await.unwrap();
        assert_eq!(transport.last_menu(1).await.unwrap(), vec![BTN_LOGIN.to_string()]);
    }

    #[tokio::test]
    async fn test_start_shows_full_menu_when_authenticated() {
        let (router, registry, transport, _) = fixture();
        registry.mark_authenticated(1).await.unwrap();

        router.dispatch(&event(1, "/start")).await.unwrap();
        assert_eq!(
            transport.last_menu(1).await.unwrap(),
            vec![
                BTN_REAL_TIME.to_string(),
                BTN_DATA_ANALYSIS.to_string(),
                BTN_FULLNESS_GRAPH.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_gated_actions_redirect_to_menu_when_anonymous() {
        let (router, _, transport, _) = fixture();

        for text in [BTN_REAL_TIME, BTN_DATA_ANALYSIS, BTN_FULLNESS_GRAPH] {
            router.dispatch(&event(1, text)).await.unwrap();
        }

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|s| matches!(s, Sent::Menu { .. })));
    }

    #[tokio::test]
    async fn test_real_time_sends_dashboard_link() {
        let (router, registry, transport, _) = fixture();
        registry.mark_authenticated(1).await.unwrap();

        router.dispatch(&event(1, BTN_REAL_TIME)).await.unwrap();
        let sent = transport.sent().await;
        assert!(matches!(
            &sent[0],
            Sent::UrlButton { chat: 1, url, .. } if url == "https://example.com/channels/1"
        ));
    }

    #[tokio::test]
    async fn test_data_analysis_sends_report() {
        let (router, registry, transport, _) = fixture();
        registry.mark_authenticated(1).await.unwrap();

        router.dispatch(&event(1, BTN_DATA_ANALYSIS)).await.unwrap();
        let text = transport.last_text(1).await.unwrap();
        assert!(text.contains("Bin-1: 85.00% full"));
    }

    #[tokio::test]
    async fn test_fullness_graph_sends_document() {
        let (router, registry, transport, _) = fixture();
        registry.mark_authenticated(1).await.unwrap();

        router.dispatch(&event(1, BTN_FULLNESS_GRAPH)).await.unwrap();
        let sent = transport.sent().await;
        assert!(matches!(sent.last().unwrap(), Sent::Document { chat: 1, .. }));
    }

    #[tokio::test]
    async fn test_free_text_from_authenticated_idle_user_gets_help_fallback() {
        let (router, registry, transport, _) = fixture();
        registry.mark_authenticated(1).await.unwrap();

        router.dispatch(&event(1, "what is the weather")).await.unwrap();
        assert_eq!(transport.last_text(1).await.unwrap(), MSG_HELP_FALLBACK);
    }

    #[tokio::test]
    async fn test_login_flow_through_router_renders_menu() {
        let (router, registry, transport, _) = fixture();

        router.dispatch(&event(1, "Login")).await.unwrap();
        router.dispatch(&event(1, "alice")).await.unwrap();
        router.dispatch(&event(1, "hunter2")).await.unwrap();

        assert!(registry.is_authenticated(1).await.unwrap());
        // Welcome text followed by the authenticated menu
        let texts = transport.texts_for(1).await;
        assert!(texts.iter().any(|t| t.contains("Welcome, alice!")));
        assert_eq!(transport.last_menu(1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_quit_is_gated_and_signals_shutdown() {
        let (router, registry, transport, mut quit_rx) = fixture();

        router.dispatch(&event(1, "/quit")).await.unwrap();
        assert!(quit_rx.try_recv().is_err());
        assert!(transport.last_menu(1).await.is_some());

        registry.mark_authenticated(1).await.unwrap();
        router.dispatch(&event(1, "/quit")).await.unwrap();
        assert!(quit_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_help_text() {
        let (router, _, transport, _) = fixture();
        router.dispatch(&event(1, "/help")).await.unwrap();
        assert!(transport.last_text(1).await.unwrap().contains("/logout"));
    }
}
