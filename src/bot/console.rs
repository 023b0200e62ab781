use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;

use crate::application::StaticDirectory;
use crate::domain::Member;

use super::command::extract_mentions;
use super::handler::{Channel, CommandHandler, IncomingMessage};

/// Line prefix that switches the member typing in the console session.
pub const SWITCH_AUTHOR: &str = "/as ";

/// Channel writing each reply as one line.
pub struct WriterChannel<W> {
    name: String,
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> WriterChannel<W> {
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Channel for WriterChannel<W> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Chat transport for a terminal: every input line is a message from the
/// current author; `<@id>` mentions resolve through the directory.
pub struct ConsoleSession {
    handler: CommandHandler,
    directory: Arc<StaticDirectory>,
    author: Member,
}

impl ConsoleSession {
    pub fn new(handler: CommandHandler, directory: Arc<StaticDirectory>, author: Member) -> Self {
        directory.insert(author.clone());
        Self {
            handler,
            directory,
            author,
        }
    }

    pub fn author(&self) -> &Member {
        &self.author
    }

    /// Turn a raw input line into a message from the current author.
    /// Unknown mentioned ids keep their id as display name.
    pub fn to_message(&self, line: &str) -> IncomingMessage {
        let mentions = extract_mentions(line)
            .into_iter()
            .map(|id| {
                self.directory
                    .member(id)
                    .unwrap_or_else(|| Member::new(id, id.to_string()))
            })
            .collect();
        IncomingMessage::new(self.author.clone(), line, mentions)
    }

    /// Feed lines until end of input. Returns the number of commands handled.
    pub async fn run<R>(&mut self, input: R, channel: &dyn Channel) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut handled = 0;

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(who) = line.strip_prefix(SWITCH_AUTHOR) {
                match who.parse::<Member>() {
                    Ok(member) => {
                        self.directory.insert(member.clone());
                        info!(author = %member, "Console author switched");
                        channel.send(&format!("Now typing as {}", member)).await?;
                        self.author = member;
                    }
                    Err(e) => channel.send(&format!("Invalid user: {}", e)).await?,
                }
                continue;
            }

            let msg = self.to_message(line);
            if self.handler.handle(&msg, channel).await.is_some() {
                handled += 1;
            }
        }

        Ok(handled)
    }
}
