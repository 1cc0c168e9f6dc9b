//! Provider ownership resolution across loosely-keyed records.
//!
//! Records carry no canonical foreign key; a record belongs to a provider if
//! its provider-email is one of the provider's aliases or its provider-id
//! equals the provider's id. [`ProviderIdentity::matches`] is the only
//! ownership predicate in the crate.

use crate::domain::normalize::{all_strs, IDENTITY_EMAIL_FIELDS};
use crate::domain::{normalize_key, OwnerRef, ProviderProfile, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Collect every non-empty email alias on an identity record, lower-cased.
pub fn build_alias_set(identity_record: &Map<String, Value>) -> BTreeSet<String> {
    all_strs(identity_record, IDENTITY_EMAIL_FIELDS)
        .iter()
        .filter_map(|s| normalize_key(s))
        .collect()
}

/// Ownership test against an alias set and lower-cased provider id.
pub fn belongs_to_provider(
    owner: &OwnerRef,
    aliases: &BTreeSet<String>,
    provider_id_lower: Option<&str>,
) -> bool {
    let email_match = owner
        .email
        .as_ref()
        .is_some_and(|email| aliases.contains(email));
    let id_match = match (owner.provider_id.as_deref(), provider_id_lower) {
        (Some(record_id), Some(provider_id)) => record_id == provider_id,
        _ => false,
    };
    email_match || id_match
}

/// Every alias under which one provider's records may appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderIdentity {
    /// Lower-cased canonical provider id.
    pub provider_id: Option<String>,
    pub aliases: BTreeSet<String>,
}

impl ProviderIdentity {
    pub fn new<I, S>(provider_id: Option<&str>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            provider_id: provider_id.and_then(normalize_key),
            aliases: aliases
                .into_iter()
                .filter_map(|a| normalize_key(a.as_ref()))
                .collect(),
        }
    }

    /// Identity from a raw identity record plus the canonical id.
    pub fn from_record(identity_record: &Map<String, Value>, provider_id: Option<&str>) -> Self {
        Self {
            provider_id: provider_id.and_then(normalize_key),
            aliases: build_alias_set(identity_record),
        }
    }

    pub fn from_profile(profile: &ProviderProfile) -> Self {
        Self {
            provider_id: normalize_key(profile.id.as_str()),
            aliases: profile.aliases.clone(),
        }
    }

    /// Add an alias (e.g. the signed-in auth email).
    pub fn with_alias(mut self, alias: &str) -> Self {
        if let Some(alias) = normalize_key(alias) {
            self.aliases.insert(alias);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.provider_id.is_none() && self.aliases.is_empty()
    }

    pub fn matches(&self, owner: &OwnerRef) -> bool {
        belongs_to_provider(owner, &self.aliases, self.provider_id.as_deref())
    }

    /// Stable key for per-recipient state (watermarks, caches).
    pub fn key(&self) -> String {
        match (&self.provider_id, self.aliases.iter().next()) {
            (Some(id), _) => format!("provider:{}", id),
            (None, Some(alias)) => format!("provider-email:{}", alias),
            (None, None) => "provider:unassigned".to_string(),
        }
    }
}

/// Memo of ownership decisions for one identity, owned by the hosting session.
///
/// Entries are keyed by record id and remember the `OwnerRef` they were
/// computed from, so a record whose provider fields change is re-evaluated.
#[derive(Debug, Default)]
pub struct OwnershipCache {
    decisions: HashMap<RecordId, (OwnerRef, bool)>,
    hits: u64,
    misses: u64,
}

impl OwnershipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owns(&mut self, identity: &ProviderIdentity, id: &RecordId, owner: &OwnerRef) -> bool {
        if let Some((cached_owner, decision)) = self.decisions.get(id) {
            if cached_owner == owner {
                self.hits += 1;
                return *decision;
            }
        }
        self.misses += 1;
        let decision = identity.matches(owner);
        self.decisions.insert(id.clone(), (owner.clone(), decision));
        decision
    }

    /// Drop entries for records that are no longer present.
    pub fn retain_ids<'a, I>(&mut self, live_ids: I)
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        let live: std::collections::HashSet<&RecordId> = live_ids.into_iter().collect();
        self.decisions.retain(|id, _| live.contains(id));
    }

    pub fn clear(&mut self) {
        self.decisions.clear();
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
