//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use std::collections::HashMap;

use anyhow::Result;

/// Message represents a message to be published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    #[must_use]
    pub fn new(payload: &[u8]) -> Self {
        Self { payload: payload.to_vec(), headers: HashMap::new() }
    }

    /// Attach a header, such as a subject line, to the message.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// The `Publisher` trait defines the message publishing behavior.
pub trait Publisher: Send + Sync {
    /// Publish a message to the named topic.
    fn send(&self, topic: &str, message: &Message) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::Message;

    #[test]
    fn headers_accumulate() {
        let message = Message::new(b"hello").with_header("subject", "Theft alert");
        assert_eq!(message.payload, b"hello".to_vec());
        assert_eq!(message.headers.get("subject").map(String::as_str), Some("Theft alert"));
    }
}
