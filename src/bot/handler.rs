use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::{LedgerError, LedgerService, MemberDirectory};
use crate::domain::{DEFAULT_AMOUNT, Member, UserId, trailing_number, trailing_number_or};

use super::command::{Command, HelpContext, help_text, split_command};

/// A chat message whose author and mentions the transport already resolved.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub author: Member,
    pub author_is_bot: bool,
    pub content: String,
    /// Mentioned members in order of appearance
    pub mentions: Vec<Member>,
}

impl IncomingMessage {
    pub fn new(author: Member, content: impl Into<String>, mentions: Vec<Member>) -> Self {
        Self {
            author,
            author_is_bot: false,
            content: content.into(),
            mentions,
        }
    }
}

/// Where replies go.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> Result<()>;
}

/// Routes prefixed chat commands to the ledger and sends the queued replies
/// back once the command is done.
pub struct CommandHandler {
    service: Arc<LedgerService>,
    directory: Arc<dyn MemberDirectory>,
    prefix: String,
    bot_id: UserId,
    // One command at a time, so an outbox drain only ever sees its own messages.
    gate: Mutex<()>,
}

impl CommandHandler {
    pub fn new(
        service: Arc<LedgerService>,
        directory: Arc<dyn MemberDirectory>,
        prefix: impl Into<String>,
        bot_id: UserId,
    ) -> Self {
        Self {
            service,
            directory,
            prefix: prefix.into(),
            bot_id,
            gate: Mutex::new(()),
        }
    }

    pub fn service(&self) -> &Arc<LedgerService> {
        &self.service
    }

    /// Process one message. Returns the command that ran, or `None` when the
    /// message was not for us.
    pub async fn handle(&self, msg: &IncomingMessage, channel: &dyn Channel) -> Option<Command> {
        if msg.author_is_bot || msg.author.id == self.bot_id {
            return None;
        }
        let (word, args) = split_command(&msg.content, &self.prefix)?;
        let command = Command::from_str(word).unwrap_or(Command::Unknown);
        if command == Command::Unknown {
            return None;
        }

        let _turn = self.gate.lock().await;
        debug!(author = %msg.author, content = %msg.content, "CMD");

        let result = match command {
            Command::Credit | Command::Debit => self.run_transfer(command, msg).await,
            Command::Status => self.run_status(msg).await,
            Command::Help => {
                self.run_help(args.first().copied()).await;
                Ok(())
            }
            Command::Unknown => Ok(()),
        };

        if let Err(err) = result {
            if err.is_user_error() {
                warn!(author = %msg.author, content = %msg.content, "{}", err);
            } else {
                error!(
                    author = %msg.author,
                    content = %msg.content,
                    error = %err,
                    "Command failed"
                );
            }
        }

        self.flush(channel).await;
        Some(command)
    }

    async fn run_transfer(
        &self,
        command: Command,
        msg: &IncomingMessage,
    ) -> Result<(), LedgerError> {
        let subject = self.transfer_subject(msg).await?;
        let amount = match trailing_number_or(&msg.content, DEFAULT_AMOUNT) {
            Ok(amount) => amount,
            Err(e) => {
                self.service.queue_message(format!("Invalid amount: {}", e)).await;
                return Err(LedgerError::Validation(e.to_string()));
            }
        };

        match command {
            Command::Debit => self.service.debit(&msg.author, &subject, amount).await?,
            _ => self.service.credit(&msg.author, &subject, amount).await?,
        };
        Ok(())
    }

    /// The first mention, which must be someone other than the bot.
    async fn transfer_subject(&self, msg: &IncomingMessage) -> Result<Member, LedgerError> {
        let Some(subject) = msg.mentions.first() else {
            self.service.queue_message("No/Invalid user mentioned").await;
            return Err(LedgerError::Resolution(format!(
                "no user mentioned: {}",
                msg.content
            )));
        };
        if subject.id == self.bot_id {
            self.service.queue_message("Invalid user mentioned").await;
            return Err(LedgerError::Resolution(format!(
                "{} tried to use the bot ({}) as subject",
                msg.author, self.bot_id
            )));
        }
        Ok(subject.clone())
    }

    async fn run_status(&self, msg: &IncomingMessage) -> Result<(), LedgerError> {
        let count = match trailing_number(&msg.content) {
            Ok(count) => count.map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
            Err(e) => {
                self.service.queue_message(format!("Invalid number: {}", e)).await;
                return Err(LedgerError::Validation(e.to_string()));
            }
        };
        self.service
            .status(msg.mentions.first(), count, self.directory.as_ref())
            .await?;
        Ok(())
    }

    async fn run_help(&self, topic: Option<&str>) {
        let settings = self.service.settings();
        let ctx = HelpContext {
            prefix: &self.prefix,
            resource: &settings.resource_name,
            status_length: settings.status_length,
        };
        self.service.queue_message(help_text(&ctx, topic)).await;
    }

    /// Send every queued message to the channel, logging each one.
    async fn flush(&self, channel: &dyn Channel) {
        for message in self.service.drain_messages().await {
            info!("```{}: {}```", channel.name(), message);
            if let Err(e) = channel.send(&message).await {
                error!(
                    channel = channel.name(),
                    error = %format!("{e:#}"),
                    "Failed to send message"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::application::{LedgerSettings, StaticDirectory};
    use crate::storage::JsonStore;

    #[derive(Default)]
    struct RecordingChannel {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "test"
        }

        async fn send(&self, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    async fn handler() -> (CommandHandler, tempfile::TempDir) {
        let temp = tempfile::TempDir::new().unwrap();
        let store = JsonStore::new(temp.path().join("ledger.json"));
        let service = LedgerService::open(Box::new(store), LedgerSettings::default())
            .await
            .unwrap();
        let directory =
            StaticDirectory::with_members([Member::new(1, "Ann"), Member::new(2, "Bo")]);
        let handler = CommandHandler::new(Arc::new(service), Arc::new(directory), "!", 99);
        (handler, temp)
    }

    #[tokio::test]
    async fn test_ignores_other_traffic() {
        let (handler, _temp) = handler().await;
        let channel = RecordingChannel::default();
        let ann = Member::new(1, "Ann");

        let chatter = IncomingMessage::new(ann.clone(), "hello", vec![]);
        assert_eq!(handler.handle(&chatter, &channel).await, None);
        let unknown = IncomingMessage::new(ann, "!dance", vec![]);
        assert_eq!(handler.handle(&unknown, &channel).await, None);

        let mut from_bot = IncomingMessage::new(Member::new(99, "Bot"), "!s", vec![]);
        from_bot.author_is_bot = true;
        assert_eq!(handler.handle(&from_bot, &channel).await, None);
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mentioning_the_bot_is_rejected() {
        let (handler, _temp) = handler().await;
        let channel = RecordingChannel::default();
        let msg = IncomingMessage::new(
            Member::new(1, "Ann"),
            "!a <@99> 3",
            vec![Member::new(99, "Bot")],
        );

        assert_eq!(handler.handle(&msg, &channel).await, Some(Command::Credit));
        assert_eq!(*channel.sent.lock().unwrap(), vec!["Invalid user mentioned"]);
        assert!(handler.service().actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_help_is_sent_as_one_message() {
        let (handler, _temp) = handler().await;
        let channel = RecordingChannel::default();
        let msg = IncomingMessage::new(Member::new(1, "Ann"), "!help", vec![]);

        assert_eq!(handler.handle(&msg, &channel).await, Some(Command::Help));
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Commands"));
    }
}
