/// Messages produced while processing one command, waiting to be sent back
/// to the chat. Drained once per command.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Take every queued message in order, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

impl Extend<String> for Outbox {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.messages.extend(iter);
    }
}
