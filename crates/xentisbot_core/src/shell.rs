use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::commands::{Assistant, build_registry};
use crate::config::BotConfig;
use crate::dispatch::{Registry, Resolution};
use crate::reply::{Reply, split_message};

/// One message seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub sender_id: String,
    pub sender_name: String,
    pub channel_id: String,
    pub is_direct: bool,
    pub text: String,
}

/// Delivers replies to the chat service.
pub trait Transport {
    fn send(&mut self, channel: &str, reply: &Reply) -> Result<()>;
    fn send_to_user(&mut self, user: &str, reply: &Reply) -> Result<()>;
    /// Text replies longer than this are split; zero means unlimited.
    fn max_message_len(&self) -> usize;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSettings {
    pub bot_user_id: Option<String>,
    pub mention_tag: Option<String>,
    pub admin_user: Option<String>,
    pub observed_channels: Vec<String>,
}

impl ShellSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            bot_user_id: config
                .bot
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            mention_tag: config.mention_tag(),
            admin_user: config
                .bot
                .admin_user
                .as_deref()
                .map(str::trim)
                .filter(|user| !user.is_empty())
                .map(str::to_string),
            observed_channels: config.bot.observed_channels.clone(),
        }
    }
}

/// Routes chat events through the command registry and delivers the replies.
pub struct BotShell {
    settings: ShellSettings,
    registry: Registry<Assistant>,
    assistant: Assistant,
    separator: Regex,
}

impl BotShell {
    pub fn new(settings: ShellSettings, assistant: Assistant) -> Result<Self> {
        Ok(Self {
            settings,
            registry: build_registry()?,
            assistant,
            separator: Regex::new(r"\s+").context("token separator pattern")?,
        })
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    /// The part of the message meant for the bot, or `None` when the bot is not
    /// addressed.
    pub fn addressed_text<'a>(&self, event: &'a ChatEvent) -> Option<&'a str> {
        if self.settings.bot_user_id.as_deref() == Some(event.sender_id.as_str()) {
            return None;
        }
        if let Some(tag) = self.settings.mention_tag.as_deref()
            && let Some(rest) = event.text.strip_prefix(tag)
        {
            return Some(rest.trim());
        }
        let observed = self
            .settings
            .observed_channels
            .iter()
            .any(|channel| *channel == event.channel_id);
        (event.is_direct || observed).then_some(event.text.as_str())
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.separator.split(text).map(str::to_string).collect()
    }

    /// Resolve one event and deliver its replies in order. Returns `None` when
    /// the message was not addressed to the bot.
    pub fn handle(&mut self, event: &ChatEvent, transport: &mut dyn Transport) -> Option<Resolution> {
        let text = self.addressed_text(event)?;
        debug!(sender = %event.sender_name, channel = %event.channel_id, text, "message received");
        let tokens = self.tokenize(text);

        let resolution = self.registry.resolve(&mut self.assistant, &tokens);
        self.assistant.record_user(&event.sender_name);

        for reply in self.assistant.take_replies() {
            self.deliver(transport, &event.channel_id, &reply);
        }
        Some(resolution)
    }

    fn deliver(&self, transport: &mut dyn Transport, channel: &str, reply: &Reply) {
        let parts = match reply {
            Reply::Text(text) => split_message(text, transport.max_message_len())
                .into_iter()
                .map(Reply::Text)
                .collect(),
            other => vec![other.clone()],
        };
        for part in &parts {
            if let Err(failure) = transport.send(channel, part) {
                error!(channel, error = %format!("{failure:#}"), "failed to deliver reply");
                self.report_to_admin(transport, channel, &failure);
            }
        }
    }

    fn report_to_admin(&self, transport: &mut dyn Transport, channel: &str, failure: &anyhow::Error) {
        let Some(admin) = self.settings.admin_user.as_deref() else {
            return;
        };
        let report = Reply::text(format!(
            "Failed to deliver a reply to channel `{channel}`: {failure:#}"
        ));
        if let Err(error) = transport.send_to_user(admin, &report) {
            error!(admin, error = %format!("{error:#}"), "failed to report delivery failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::AssistantSettings;
    use crate::external::{PageFetcher, RemoteShell, ShellOutcome};
    use crate::store::{RecordStore, SourcePaths};
    use anyhow::bail;

    struct NoShell;

    impl RemoteShell for NoShell {
        fn run(&self, _host: &str, _user: &str, _command: &str) -> Result<ShellOutcome> {
            Ok(ShellOutcome::AuthenticationRefused)
        }
    }

    struct NoPages;

    impl PageFetcher for NoPages {
        fn fetch(&self, url: &str) -> Result<String> {
            bail!("offline: {url}")
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        limit: usize,
        fail_channel: Option<String>,
        sent: Vec<(String, Reply)>,
        direct: Vec<(String, Reply)>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, channel: &str, reply: &Reply) -> Result<()> {
            if self.fail_channel.as_deref() == Some(channel) {
                bail!("channel {channel} is archived");
            }
            self.sent.push((channel.to_string(), reply.clone()));
            Ok(())
        }

        fn send_to_user(&mut self, user: &str, reply: &Reply) -> Result<()> {
            self.direct.push((user.to_string(), reply.clone()));
            Ok(())
        }

        fn max_message_len(&self) -> usize {
            self.limit
        }
    }

    fn shell() -> BotShell {
        let settings = ShellSettings {
            bot_user_id: Some("U0BOT".to_string()),
            mention_tag: Some("<@U0BOT>".to_string()),
            admin_user: Some("admin".to_string()),
            observed_channels: vec!["xentis-help".to_string()],
        };
        let assistant = Assistant::new(
            RecordStore::new(),
            SourcePaths::default(),
            AssistantSettings {
                bot_name: "xentisbot".to_string(),
                servers: BotConfig::default().server_settings(),
                db_status_url: None,
            },
            Box::new(NoShell),
            Box::new(NoPages),
        )
        .expect("assistant");
        BotShell::new(settings, assistant).expect("shell")
    }

    fn event(channel: &str, is_direct: bool, text: &str) -> ChatEvent {
        ChatEvent {
            sender_id: "U1".to_string(),
            sender_name: "alice".to_string(),
            channel_id: channel.to_string(),
            is_direct,
            text: text.to_string(),
        }
    }

    #[test]
    fn mention_tag_is_stripped() {
        let shell = shell();
        let mention = event("general", false, "<@U0BOT>   hex ff ");
        assert_eq!(shell.addressed_text(&mention), Some("hex ff"));
    }

    #[test]
    fn only_addressed_messages_are_handled() {
        let shell = shell();
        assert_eq!(shell.addressed_text(&event("general", false, "hex ff")), None);
        assert_eq!(shell.addressed_text(&event("D1", true, "hex ff")), Some("hex ff"));
        assert_eq!(
            shell.addressed_text(&event("xentis-help", false, "hex ff")),
            Some("hex ff")
        );

        let mut own = event("D1", true, "hex ff");
        own.sender_id = "U0BOT".to_string();
        assert_eq!(shell.addressed_text(&own), None);
    }

    #[test]
    fn tokens_are_split_on_whitespace_runs() {
        let shell = shell();
        assert_eq!(
            shell.tokenize("  translate\taccrued   interest "),
            vec!["translate", "accrued", "interest"]
        );
        assert!(shell.tokenize("   ").is_empty());
    }

    #[test]
    fn replies_go_to_the_event_channel_and_users_are_counted() {
        let mut shell = shell();
        let mut transport = RecordingTransport::default();
        let resolution = shell
            .handle(&event("D1", true, "dec 10"), &mut transport)
            .expect("addressed");
        assert_eq!(resolution.explicit, Some("dec"));
        assert_eq!(
            transport.sent,
            vec![("D1".to_string(), Reply::text("Dec: `10`\nHex: `a`\nBin: `1010`"))]
        );

        assert!(shell.handle(&event("general", false, "dec 10"), &mut transport).is_none());
        shell.handle(&event("D1", true, "   "), &mut transport);
        assert_eq!(shell.assistant().usage().users.get("alice"), Some(&2));
    }

    #[test]
    fn long_text_is_split_for_the_transport() {
        let mut shell = shell();
        let mut transport = RecordingTransport {
            limit: 20,
            ..RecordingTransport::default()
        };
        shell.handle(&event("D1", true, "dec 10"), &mut transport);
        let texts: Vec<_> = transport
            .sent
            .iter()
            .map(|(_, reply)| match reply {
                Reply::Text(text) => text.as_str(),
                other => panic!("unexpected reply {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["Dec: `10`\nHex: `a`\n", "Bin: `1010`"]);
    }

    #[test]
    fn delivery_failures_are_reported_to_the_admin() {
        let mut shell = shell();
        let mut transport = RecordingTransport {
            fail_channel: Some("D1".to_string()),
            ..RecordingTransport::default()
        };
        shell.handle(&event("D1", true, "dec 10"), &mut transport);
        assert!(transport.sent.is_empty());
        assert_eq!(transport.direct.len(), 1);
        assert_eq!(transport.direct[0].0, "admin");
        assert_eq!(
            transport.direct[0].1,
            Reply::text("Failed to deliver a reply to channel `D1`: channel D1 is archived")
        );
    }
}
