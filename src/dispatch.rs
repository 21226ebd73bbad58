use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::commands::{Command, CommandLine};
use crate::config::Config;
use crate::platform::IncomingMessage;
use crate::referrals::ReferralStore;
use crate::reply::{Button, Formatting, Reply};

pub const HELP_TEXT: &str = "Help!";

/// Which handler an incoming message is routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Start { referral_id: Option<&'a str> },
    Help,
    Echo(&'a str),
    Ignore,
}

impl<'a> Route<'a> {
    /// Decide the route for a message. `bot_username` is used to drop
    /// commands addressed to a different bot in group chats.
    pub fn resolve(text: Option<&'a str>, bot_username: Option<&str>) -> Self {
        let Some(text) = text else {
            return Route::Ignore;
        };

        let Some(line) = CommandLine::parse(text) else {
            return Route::Echo(text);
        };

        if !line.is_addressed_to(bot_username) {
            debug!("Ignoring command for another bot: {}", text);
            return Route::Ignore;
        }

        match line.name.parse::<Command>() {
            Ok(Command::Start) => Route::Start {
                referral_id: line.first_arg(),
            },
            Ok(Command::Help) => Route::Help,
            Err(e) => {
                debug!("Ignoring {}", e);
                Route::Ignore
            }
        }
    }
}

/// Welcome message settings resolved once at startup
#[derive(Debug, Clone)]
pub struct Welcome {
    template: String,
    formatting: Option<Formatting>,
    buttons: Vec<Button>,
}

impl Welcome {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            template: config.welcome.text.clone(),
            formatting: config.welcome.formatting,
            buttons: config.welcome.buttons()?,
        })
    }

    pub fn render(&self, referral_id: Option<&str>) -> Reply {
        let referral_id = referral_id.unwrap_or("none");
        let referral_id = match self.formatting {
            Some(formatting) => formatting.escape(referral_id),
            None => referral_id.to_string(),
        };
        let text = self.template.replace("{referral_id}", &referral_id);
        Reply::text(text)
            .with_formatting(self.formatting)
            .with_buttons(self.buttons.clone())
    }
}

/// Routes messages to the start, help and echo handlers
pub struct Router {
    welcome: Welcome,
    referrals: Arc<dyn ReferralStore>,
}

impl Router {
    pub fn new(welcome: Welcome, referrals: Arc<dyn ReferralStore>) -> Self {
        Self { welcome, referrals }
    }

    /// Handle one message, returning the reply to send, if any
    pub async fn dispatch(
        &self,
        incoming: &IncomingMessage,
        bot_username: Option<&str>,
    ) -> Option<Reply> {
        match Route::resolve(incoming.text.as_deref(), bot_username) {
            Route::Start { referral_id } => Some(self.start(incoming, referral_id).await),
            Route::Help => Some(help()),
            Route::Echo(text) => Some(echo(text)),
            Route::Ignore => None,
        }
    }

    async fn start(&self, incoming: &IncomingMessage, referral_id: Option<&str>) -> Reply {
        info!(
            "/start from {} in chat {} (referral: {:?})",
            incoming.user_name.as_deref().unwrap_or("unknown"),
            incoming.chat_id,
            referral_id
        );

        if let Err(e) = self.referrals.save(incoming.chat_id, referral_id).await {
            error!("Failed to save referral for chat {}: {:#}", incoming.chat_id, e);
        }

        self.welcome.render(referral_id)
    }
}

fn help() -> Reply {
    Reply::text(HELP_TEXT)
}

fn echo(text: &str) -> Reply {
    Reply::text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ButtonTarget;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<(i64, Option<String>)>>,
    }

    #[async_trait]
    impl ReferralStore for RecordingStore {
        async fn save(&self, chat_id: i64, referral_id: Option<&str>) -> Result<()> {
            self.saved
                .lock()
                .await
                .push((chat_id, referral_id.map(str::to_string)));
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ReferralStore for FailingStore {
        async fn save(&self, _chat_id: i64, _referral_id: Option<&str>) -> Result<()> {
            anyhow::bail!("database is locked")
        }
    }

    fn message(text: Option<&str>) -> IncomingMessage {
        IncomingMessage {
            platform: "telegram",
            chat_id: 123456,
            user_id: Some(42),
            user_name: Some("Alice".to_string()),
            text: text.map(str::to_string),
        }
    }

    fn router_with(config: &Config) -> (Router, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        let router = Router::new(Welcome::from_config(config).unwrap(), store.clone());
        (router, store)
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(
            Route::resolve(Some("/start REF123"), None),
            Route::Start {
                referral_id: Some("REF123")
            }
        );
        assert_eq!(
            Route::resolve(Some("/start"), None),
            Route::Start { referral_id: None }
        );
        assert_eq!(Route::resolve(Some("/help me please"), None), Route::Help);
        assert_eq!(Route::resolve(Some("hello"), None), Route::Echo("hello"));
        assert_eq!(Route::resolve(Some("/unknown"), None), Route::Ignore);
        assert_eq!(Route::resolve(None, None), Route::Ignore);
    }

    #[test]
    fn test_route_follows_telegram_command_entities() {
        assert_eq!(Route::resolve(Some("/привет"), None), Route::Echo("/привет"));
        assert_eq!(Route::resolve(Some("/ hi"), None), Route::Echo("/ hi"));
        assert_eq!(
            Route::resolve(Some("/start-now"), None),
            Route::Start { referral_id: None }
        );
        assert_eq!(
            Route::resolve(Some("/start-now REF1"), None),
            Route::Start {
                referral_id: Some("REF1")
            }
        );
    }

    #[test]
    fn test_route_respects_addressee() {
        assert_eq!(Route::resolve(Some("/help@my_bot"), Some("my_bot")), Route::Help);
        assert_eq!(
            Route::resolve(Some("/help@other_bot"), Some("my_bot")),
            Route::Ignore
        );
    }

    #[tokio::test]
    async fn test_echo_returns_text_verbatim() {
        let (router, store) = router_with(&Config::default());
        let text = "  Hello, *world*! <b>ok</b>  ";

        let first = router.dispatch(&message(Some(text)), None).await.unwrap();
        assert_eq!(first.text, text);
        assert!(first.formatting.is_none());
        assert!(first.buttons.is_empty());

        let second = router
            .dispatch(&message(Some(&first.text)), None)
            .await
            .unwrap();
        assert_eq!(second.text, text);
        assert!(store.saved.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_with_referral() {
        let (router, store) = router_with(&Config::default());
        let reply = router
            .dispatch(&message(Some("/start REF123")), None)
            .await
            .unwrap();

        assert_eq!(reply.text, "Welcome! Your referral ID is REF123.");
        assert_eq!(
            *store.saved.lock().await,
            vec![(123456, Some("REF123".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_start_without_referral() {
        let (router, store) = router_with(&Config::default());
        let reply = router
            .dispatch(&message(Some("/start")), None)
            .await
            .unwrap();

        assert_eq!(reply.text, "Welcome! Your referral ID is none.");
        assert_eq!(*store.saved.lock().await, vec![(123456, None)]);
    }

    #[tokio::test]
    async fn test_start_replies_even_if_store_fails() {
        let router = Router::new(
            Welcome::from_config(&Config::default()).unwrap(),
            Arc::new(FailingStore),
        );
        let reply = router.dispatch(&message(Some("/start x")), None).await;
        assert_eq!(reply.unwrap().text, "Welcome! Your referral ID is x.");
    }

    #[tokio::test]
    async fn test_help_ignores_arguments() {
        let (router, _) = router_with(&Config::default());
        for text in ["/help", "/help with args", "/HELP"] {
            let reply = router.dispatch(&message(Some(text)), None).await.unwrap();
            assert_eq!(reply.text, "Help!");
            assert!(reply.buttons.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_command_sends_nothing() {
        let (router, store) = router_with(&Config::default());
        assert!(router
            .dispatch(&message(Some("/clear")), None)
            .await
            .is_none());
        assert!(router.dispatch(&message(None), None).await.is_none());
        assert!(store.saved.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_escapes_referral_for_markdown() {
        let config = Config::parse(
            r#"
            [welcome]
            text = "*Welcome\\!* Ref: {referral_id}"
            formatting = "markdown"
            "#,
        )
        .unwrap();
        let (router, store) = router_with(&config);

        let reply = router
            .dispatch(&message(Some("/start a_b.c")), None)
            .await
            .unwrap();
        assert_eq!(reply.text, r"*Welcome\!* Ref: a\_b\.c");
        assert_eq!(reply.formatting, Some(Formatting::Markdown));
        assert_eq!(
            *store.saved.lock().await,
            vec![(123456, Some("a_b.c".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_start_escapes_referral_for_html() {
        let config = Config::parse(
            r#"
            [welcome]
            text = "<b>Welcome!</b> Ref: {referral_id}"
            formatting = "html"
            "#,
        )
        .unwrap();
        let (router, _) = router_with(&config);

        let reply = router
            .dispatch(&message(Some("/start a_b.c")), None)
            .await
            .unwrap();
        assert_eq!(reply.text, "<b>Welcome!</b> Ref: a_b.c");

        let reply = router
            .dispatch(&message(Some("/start <i>x&y")), None)
            .await
            .unwrap();
        assert_eq!(reply.text, "<b>Welcome!</b> Ref: &lt;i&gt;x&amp;y");
    }

    #[tokio::test]
    async fn test_start_attaches_configured_buttons() {
        let config = Config::parse(
            r#"
            [welcome]
            text = "Welcome aboard!"
            formatting = "html"

            [[welcome.buttons]]
            label = "Join Telegram Channel"
            url = "https://t.me/example_channel"

            [[welcome.buttons]]
            label = "Play"
            url = "https://game.example.com/"
            kind = "web_app"
            "#,
        )
        .unwrap();
        let (router, _) = router_with(&config);

        let reply = router
            .dispatch(&message(Some("/start")), None)
            .await
            .unwrap();
        assert_eq!(reply.text, "Welcome aboard!");
        assert_eq!(reply.formatting, Some(Formatting::Html));

        let layout: Vec<(&str, &ButtonTarget)> = reply
            .buttons
            .iter()
            .map(|b| (b.label.as_str(), &b.target))
            .collect();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout[0].0, "Join Telegram Channel");
        assert_eq!(
            layout[0].1,
            &ButtonTarget::Url("https://t.me/example_channel".parse().unwrap())
        );
        assert_eq!(layout[1].0, "Play");
        assert_eq!(
            layout[1].1,
            &ButtonTarget::WebApp("https://game.example.com/".parse().unwrap())
        );
    }
}
