use std::sync::mpsc::{Receiver, Sender, channel};

/// Fan-out of human-readable progress lines to every subscriber.
///
/// Subscribers that dropped their receiver are pruned on the next emit.
#[derive(Debug, Default)]
pub struct StatusFeed {
    subscribers: Vec<Sender<String>>,
}

impl StatusFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<String> {
        let (tx, rx) = channel::<String>();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, message: String) {
        self.subscribers.retain(|tx| tx.send(message.clone()).is_ok());
    }
}
