//! One-way notifications with optional provider targeting.

use crate::domain::{OwnerRef, RecordId, TimeMs};
use serde::{Deserialize, Serialize};

/// Delivery channel of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Channel {
    Email,
    InApp,
    /// Delivered on both email and in-app.
    Both,
    Other(String),
}

impl Channel {
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let email = lowered.contains("email") || lowered.contains("e-mail");
        let in_app = lowered.contains("app") || lowered.contains("push");
        match (email, in_app) {
            (true, true) => Channel::Both,
            (true, false) => Channel::Email,
            (false, true) => Channel::InApp,
            (false, false) => Channel::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Channel::Email => "Email",
            Channel::InApp => "In-App",
            Channel::Both => "Email & In-App",
            Channel::Other(raw) => raw,
        }
    }

    /// Whether a dashboard feed should surface this channel at all.
    pub fn reaches_feed(&self) -> bool {
        !matches!(self, Channel::Other(_))
    }
}

impl From<String> for Channel {
    fn from(value: String) -> Self {
        Channel::parse(&value)
    }
}

impl From<Channel> for String {
    fn from(value: Channel) -> Self {
        value.as_str().to_string()
    }
}

/// A message sent to an audience, optionally targeted at one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Option<RecordId>,
    pub audience: String,
    pub channel: Channel,
    pub subject: String,
    pub message: String,
    pub status: Option<String>,
    pub sent_at: TimeMs,
    /// Empty for broadcasts.
    pub target: OwnerRef,
    pub read_at: Option<TimeMs>,
}

impl Notification {
    pub fn broadcast(
        audience: impl Into<String>,
        channel: Channel,
        subject: impl Into<String>,
        message: impl Into<String>,
        sent_at: TimeMs,
    ) -> Self {
        Self {
            id: None,
            audience: audience.into(),
            channel,
            subject: subject.into(),
            message: message.into(),
            status: None,
            sent_at,
            target: OwnerRef::default(),
            read_at: None,
        }
    }

    pub fn targeted_at(mut self, target: OwnerRef) -> Self {
        self.target = target;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(RecordId::new(id));
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_unassigned()
    }

    /// Stable identity used to de-duplicate repeated deliveries.
    ///
    /// Priority: store id (if present) > hash of content fields.
    pub fn key(&self) -> String {
        if let Some(id) = &self.id {
            return format!("id:{}", id);
        }

        use sha2::{Digest, Sha256};

        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(self.sent_at.as_ms().to_le_bytes());
        hash_var(&mut hasher, &self.subject);
        hash_var(&mut hasher, &self.message);
        hash_var(&mut hasher, &self.audience);

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}
