//! Builders for mailboxes and engine settings.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::DateTime;

use labelsort::gmail::FetchedMessage;
use labelsort::test_utils::FakeMailbox;

/// Builder for a single message.
pub struct MessageBuilder {
    message: FetchedMessage,
}

impl MessageBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            message: FetchedMessage {
                id: id.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.message.label_ids = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn sender(mut self, sender: &str) -> Self {
        self.message.sender = sender.to_string();
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.message.subject = subject.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.message.snippet = body.chars().take(40).collect();
        self.message.body = body.to_string();
        self
    }

    pub fn date(mut self, rfc2822: &str) -> Self {
        self.message.date = DateTime::parse_from_rfc2822(rfc2822).ok();
        self
    }

    pub fn build(self) -> FetchedMessage {
        self.message
    }
}

/// Builder for a `FakeMailbox` with an inbox and category labels.
pub struct MailboxBuilder {
    mailbox: FakeMailbox,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        let mailbox = FakeMailbox::new();
        mailbox.add_label("INBOX", "INBOX");
        Self { mailbox }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.mailbox.set_page_size(page_size);
        self
    }

    pub fn label(self, id: &str, name: &str) -> Self {
        self.mailbox.add_label(id, name);
        self
    }

    pub fn message(self, message: MessageBuilder) -> Self {
        self.mailbox.add_message(message.build());
        self
    }

    /// Adds an inbox message with the given sender, subject and body.
    pub fn inbox(self, id: &str, sender: &str, subject: &str, body: &str) -> Self {
        self.message(
            MessageBuilder::new(id)
                .labels(&["INBOX"])
                .sender(sender)
                .subject(subject)
                .body(body),
        )
    }

    /// Adds a message already filed under `label_id`.
    pub fn example(self, id: &str, label_id: &str, sender: &str, subject: &str) -> Self {
        self.message(
            MessageBuilder::new(id)
                .labels(&[label_id])
                .sender(sender)
                .subject(subject)
                .body(subject),
        )
    }

    pub fn build(self) -> Arc<FakeMailbox> {
        Arc::new(self.mailbox)
    }
}
