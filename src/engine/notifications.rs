//! Per-recipient notification feed with seen/cleared watermarks.

use crate::domain::{Notification, TimeMs};
use crate::engine::identity::ProviderIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role category a notification audience can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
    Support,
    Administrator,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "customer" | "customers" => Some(Role::Customer),
            "provider" | "providers" | "service provider" => Some(Role::Provider),
            "support" | "agent" | "support agent" => Some(Role::Support),
            "admin" | "administrator" => Some(Role::Administrator),
            _ => None,
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Role::Customer => &["customer"],
            Role::Provider => &["provider"],
            Role::Support => &["support", "agent"],
            Role::Administrator => &["admin"],
        }
    }

    /// Free-text audience match. Blank, "all", "everyone" and "all users"
    /// reach every role.
    pub fn audience_matches(&self, audience: &str) -> bool {
        let audience = audience.trim().to_lowercase();
        if matches!(audience.as_str(), "" | "all" | "everyone" | "all users") {
            return true;
        }
        self.keywords().iter().any(|k| audience.contains(k))
    }
}

/// Who a feed is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Recipient {
    /// A specific provider; sees matching broadcasts plus notifications
    /// targeted at one of its identities.
    Provider { identity: ProviderIdentity },
    /// Anyone else in a role; sees broadcasts only.
    Role { role: Role },
}

impl Recipient {
    pub fn provider(identity: ProviderIdentity) -> Self {
        Recipient::Provider { identity }
    }

    pub fn administrator() -> Self {
        Recipient::Role {
            role: Role::Administrator,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Recipient::Provider { .. } => Role::Provider,
            Recipient::Role { role } => *role,
        }
    }

    pub fn key(&self) -> String {
        match self {
            Recipient::Provider { identity } => identity.key(),
            Recipient::Role { role } => format!("role:{:?}", role).to_lowercase(),
        }
    }

    pub fn can_see(&self, notification: &Notification) -> bool {
        if !notification.channel.reaches_feed() {
            return false;
        }
        if !self.role().audience_matches(&notification.audience) {
            return false;
        }
        if notification.is_broadcast() {
            return true;
        }
        match self {
            Recipient::Provider { identity } => identity.matches(&notification.target),
            Recipient::Role { .. } => false,
        }
    }
}

/// Per-recipient read state, persisted outside this module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermarks {
    /// Notifications sent after this count as unread.
    pub last_seen: Option<TimeMs>,
    /// Notifications sent at or before this are hidden entirely.
    pub hidden_before: Option<TimeMs>,
}

impl Watermarks {
    pub fn is_unread(&self, n: &Notification) -> bool {
        self.last_seen.map_or(true, |seen| n.sent_at > seen)
    }

    pub fn is_hidden(&self, n: &Notification) -> bool {
        self.hidden_before.is_some_and(|hidden| n.sent_at <= hidden)
    }
}

/// Store keys for a recipient's watermarks.
pub fn watermark_keys(recipient_key: &str) -> (String, String) {
    (
        format!("notifications:{}:last_seen", recipient_key),
        format!("notifications:{}:hidden_before", recipient_key),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    #[serde(flatten)]
    pub notification: Notification,
    pub unread: bool,
}

/// Result of recomputing a feed from the latest notifications snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedUpdate {
    /// Newest first.
    pub feed: Vec<FeedEntry>,
    pub unread: usize,
    /// Notifications announced for the first time by this recomputation.
    pub banners: Vec<Notification>,
}

/// Merges broadcast and targeted notifications into one feed for a recipient.
#[derive(Debug, Clone)]
pub struct NotificationAggregator {
    recipient: Recipient,
    watermarks: Watermarks,
    announced: HashSet<String>,
    active_banners: Vec<Notification>,
}

impl NotificationAggregator {
    pub fn new(recipient: Recipient) -> Self {
        Self::with_watermarks(recipient, Watermarks::default())
    }

    pub fn with_watermarks(recipient: Recipient, watermarks: Watermarks) -> Self {
        Self {
            recipient,
            watermarks,
            announced: HashSet::new(),
            active_banners: Vec::new(),
        }
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    /// Point the feed at a refreshed identity for the same recipient key.
    /// Watermarks and announced banners carry over.
    pub fn retarget(&mut self, recipient: Recipient) {
        self.recipient = recipient;
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    /// Banners announced since the last `mark_seen`.
    pub fn active_banners(&self) -> &[Notification] {
        &self.active_banners
    }

    /// Visible, non-hidden notifications, de-duplicated and newest first.
    /// Ties keep arrival order.
    pub fn feed<'a, I>(&self, notifications: I) -> Vec<FeedEntry>
    where
        I: IntoIterator<Item = &'a Notification>,
    {
        let mut seen_keys = HashSet::new();
        let mut feed: Vec<FeedEntry> = notifications
            .into_iter()
            .filter(|n| self.recipient.can_see(n) && !self.watermarks.is_hidden(n))
            .filter(|n| seen_keys.insert(n.key()))
            .map(|n| FeedEntry {
                notification: n.clone(),
                unread: self.watermarks.is_unread(n),
            })
            .collect();
        feed.sort_by(|a, b| b.notification.sent_at.cmp(&a.notification.sent_at));
        feed
    }

    /// Recompute the feed and announce unread notifications not yet bannered.
    pub fn recompute<'a, I>(&mut self, notifications: I) -> FeedUpdate
    where
        I: IntoIterator<Item = &'a Notification>,
    {
        let feed = self.feed(notifications);
        let unread = feed.iter().filter(|e| e.unread).count();

        let mut banners = Vec::new();
        for entry in feed.iter().filter(|e| e.unread) {
            if self.announced.insert(entry.notification.key()) {
                banners.push(entry.notification.clone());
            }
        }
        self.active_banners.extend(banners.iter().cloned());

        FeedUpdate {
            feed,
            unread,
            banners,
        }
    }

    /// Everything sent up to `now` becomes read; banners are dismissed.
    pub fn mark_seen(&mut self, now: TimeMs) -> Watermarks {
        self.watermarks.last_seen = Some(now);
        self.active_banners.clear();
        self.watermarks
    }

    /// Hide everything sent up to `now` without deleting it.
    pub fn clear(&mut self, now: TimeMs) -> Watermarks {
        self.watermarks.hidden_before = Some(now);
        self.mark_seen(now)
    }
}
