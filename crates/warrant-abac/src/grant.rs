//! An in-memory, queryable set of policies.
//!
//! A [`Grant`] is what a decision hands back: every policy that matched the
//! request, keyed the same way the store keys them. All secondary checks
//! (time windows, locations, payload shaping) run against it without going
//! back to the store.

use crate::error::{AccessError, Result};
use crate::key::{KeyCodec, Query};
use crate::location;
use crate::notation;
use crate::policy::{Axis, Policy, Side};
use crate::time::{self, TimeOptions, TimeWindow};
use crate::validate::validate;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    codec: KeyCodec,
    timezone: Tz,
    present: BTreeMap<String, Policy>,
}

impl Grant {
    pub fn new(codec: KeyCodec) -> Self {
        Self {
            codec,
            timezone: Tz::UTC,
            present: BTreeMap::new(),
        }
    }

    /// Builds a grant from `policies`, failing on the first invalid or
    /// duplicate entry.
    pub fn from_policies<I>(codec: KeyCodec, policies: I) -> Result<Self>
    where
        I: IntoIterator<Item = Policy>,
    {
        let mut grant = Self::new(codec);
        for policy in policies {
            grant.update(policy)?;
        }
        Ok(grant)
    }

    /// Zone used by [`time`](Self::time) when the options name none.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Policies in canonical key order.
    pub fn policies(&self) -> impl Iterator<Item = &Policy> + '_ {
        self.present.values()
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Validates and inserts a policy. A policy already present under the
    /// same key is kept and the call fails.
    pub fn update(&mut self, policy: Policy) -> Result<()> {
        validate(&policy, &self.codec)?;
        let key = self.codec.encode(&policy)?;
        match self.present.entry(key) {
            Entry::Occupied(entry) => Err(AccessError::DuplicatePolicy {
                key: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(policy);
                Ok(())
            }
        }
    }

    /// Like [`update`](Self::update), but an existing key is left alone
    /// without error. Returns whether the policy was inserted.
    pub(crate) fn absorb(&mut self, policy: Policy) -> Result<bool> {
        validate(&policy, &self.codec)?;
        let key = self.codec.encode(&policy)?;
        match self.present.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(policy);
                Ok(true)
            }
        }
    }

    pub fn exists(&self, policy: &Policy) -> bool {
        self.codec
            .encode(policy)
            .is_ok_and(|key| self.present.contains_key(&key))
    }

    pub fn delete(&mut self, policy: &Policy) -> bool {
        match self.codec.encode(policy) {
            Ok(key) => self.present.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether any policy matches `query`. An empty query is ambiguous and
    /// rejected.
    pub fn has(&self, query: &Query) -> Result<bool> {
        if query.is_empty() {
            return Err(AccessError::PatternRequired);
        }
        let matcher = self.codec.compile(query)?;
        Ok(self.present.keys().any(|key| matcher.is_match(key)))
    }

    /// Distinct subjects of the matching policies, in key order.
    pub fn subjects(&self, query: Option<&Query>) -> Result<Vec<String>> {
        let mut subjects: Vec<String> = Vec::new();
        for policy in self.matching(query)? {
            if !subjects.contains(&policy.subject) {
                subjects.push(policy.subject.clone());
            }
        }
        Ok(subjects)
    }

    /// Distinct explicit scopes on `axis` among the matching policies.
    pub fn scopes(&self, axis: Axis, query: Option<&Query>) -> Result<Vec<String>> {
        let mut scopes: Vec<String> = Vec::new();
        for policy in self.matching(query)? {
            if let Some(scope) = self.codec.parse(policy.value(axis))?.scope {
                if !scopes.contains(&scope) {
                    scopes.push(scope);
                }
            }
        }
        Ok(scopes)
    }

    /// Whether the matching policies' time windows allow access.
    ///
    /// Without any window the answer is `true`; otherwise one open window
    /// is enough.
    pub fn time(&self, query: Option<&Query>, options: &TimeOptions) -> Result<bool> {
        let mut windows: Vec<&TimeWindow> = Vec::new();
        for policy in self.matching(query)? {
            for window in &policy.time {
                if !windows.contains(&window) {
                    windows.push(window);
                }
            }
        }

        let now = options.now.unwrap_or_else(Utc::now);
        let tz = options.timezone.unwrap_or(self.timezone);
        Ok(time::any_active(windows, now, tz))
    }

    /// Whether `ip` satisfies the matching policies' locations. Without any
    /// location the answer is `true`.
    pub fn location(&self, ip: IpAddr, query: Option<&Query>) -> Result<bool> {
        let mut locations: Vec<&str> = Vec::new();
        for policy in self.matching(query)? {
            for entry in &policy.location {
                if !locations.contains(&entry.as_str()) {
                    locations.push(entry);
                }
            }
        }
        Ok(location::contains(&locations, ip))
    }

    // ========================================================================
    // Payload shaping
    // ========================================================================

    /// Applies the matching policies' `field` notation to a copy of `data`.
    pub fn field(&self, data: &Value, query: Option<&Query>) -> Result<Value> {
        self.shape(Side::Field, data.clone(), query)
    }

    /// Applies the matching policies' `field` notation, consuming `data`.
    pub fn field_owned(&self, data: Value, query: Option<&Query>) -> Result<Value> {
        self.shape(Side::Field, data, query)
    }

    /// Applies the matching policies' `filter` notation to a copy of `data`.
    pub fn filter(&self, data: &Value, query: Option<&Query>) -> Result<Value> {
        self.shape(Side::Filter, data.clone(), query)
    }

    /// Applies the matching policies' `filter` notation, consuming `data`.
    pub fn filter_owned(&self, data: Value, query: Option<&Query>) -> Result<Value> {
        self.shape(Side::Filter, data, query)
    }

    /// Like [`field`](Self::field) with the query derived from the payload.
    /// An array is shaped element by element, each with its own query.
    pub fn field_by<F>(&self, data: &Value, query: F) -> Result<Value>
    where
        F: Fn(&Value) -> Query,
    {
        self.shape_by(Side::Field, data, query)
    }

    /// Like [`filter`](Self::filter) with the query derived from the payload.
    /// An array is shaped element by element, each with its own query.
    pub fn filter_by<F>(&self, data: &Value, query: F) -> Result<Value>
    where
        F: Fn(&Value) -> Query,
    {
        self.shape_by(Side::Filter, data, query)
    }

    fn shape(&self, side: Side, data: Value, query: Option<&Query>) -> Result<Value> {
        let lists: Vec<&[String]> = self
            .matching(query)?
            .into_iter()
            .map(|policy| policy.notation(side))
            .collect();
        let merged = notation::accumulate(lists);
        if merged.is_empty() {
            // No policy restricts this side, which is the same as `*`.
            return Ok(data);
        }
        notation::project_owned(data, &merged)
    }

    fn shape_by<F>(&self, side: Side, data: &Value, query: F) -> Result<Value>
    where
        F: Fn(&Value) -> Query,
    {
        match data {
            Value::Array(items) => items
                .iter()
                .map(|item| self.shape(side, item.clone(), Some(&query(item))))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            _ => self.shape(side, data.clone(), Some(&query(data))),
        }
    }

    /// Policies matching `query`; all of them when no axis is named.
    fn matching(&self, query: Option<&Query>) -> Result<Vec<&Policy>> {
        match query {
            Some(query) if !query.is_empty() => {
                let matcher = self.codec.compile(query)?;
                Ok(self
                    .present
                    .iter()
                    .filter(|(key, _)| matcher.is_match(key))
                    .map(|(_, policy)| policy)
                    .collect())
            }
            _ => Ok(self.present.values().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ALL, ANY};
    use serde_json::json;

    fn grant() -> Grant {
        Grant::from_policies(
            KeyCodec::new(),
            [
                Policy::new("admin", ANY, ALL),
                Policy::new("user", "create:own", "article").with_field(["*", "!owner"]),
                Policy::new("user", "update:own", "article").with_field(["*", "!id", "!owner"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_update_keeps_original() {
        let mut grant = grant();
        let duplicate = Policy::new("user", "create:own", "article").with_field(["title"]);

        assert!(matches!(
            grant.update(duplicate),
            Err(AccessError::DuplicatePolicy { key }) if key == "user:null:create:own:article:all"
        ));
        let stored = grant
            .policies()
            .find(|p| p.action == "create:own")
            .unwrap();
        assert_eq!(stored.field, vec!["*", "!owner"]);
    }

    #[test]
    fn test_invalid_policy_not_inserted() {
        let mut grant = grant();
        let invalid = Policy::new("user", "", "article");
        assert!(matches!(
            grant.update(invalid),
            Err(AccessError::InvalidPolicy { .. })
        ));
        assert_eq!(grant.len(), 3);
    }

    #[test]
    fn test_absorb_ignores_duplicates() {
        let mut grant = grant();
        assert!(!grant.absorb(Policy::new("admin", ANY, ALL)).unwrap());
        assert!(grant.absorb(Policy::new("guest", "read", "article")).unwrap());
        assert_eq!(grant.len(), 4);
    }

    #[test]
    fn test_empty_query_requires_pattern() {
        assert!(matches!(
            grant().has(&Query::new()),
            Err(AccessError::PatternRequired)
        ));
        // Strictness alone does not name an axis.
        assert!(matches!(
            grant().has(&Query::new().with_strict(false)),
            Err(AccessError::PatternRequired)
        ));
    }

    #[test]
    fn test_field_array_by_element_query() {
        let grant = grant();
        let payload = json!([
            {"id": 1, "owner": "u", "title": "a", "kind": "create"},
            {"id": 2, "owner": "u", "title": "b", "kind": "update"},
        ]);

        let shaped = grant
            .field_by(&payload, |item| {
                let action = item["kind"].as_str().unwrap_or_default();
                Query::new()
                    .subject("user")
                    .action(action)
                    .with_strict(false)
            })
            .unwrap();

        assert_eq!(
            shaped,
            json!([
                {"id": 1, "title": "a", "kind": "create"},
                {"title": "b", "kind": "update"},
            ])
        );
    }

    #[test]
    fn test_field_owned_matches_borrowed() {
        let grant = grant();
        let payload = json!({"id": 1, "owner": "u", "title": "t"});
        let query = Query::new().subject("user");

        let borrowed = grant.field(&payload, Some(&query)).unwrap();
        let owned = grant.field_owned(payload, Some(&query)).unwrap();
        assert_eq!(borrowed, owned);
        assert_eq!(owned, json!({"id": 1, "title": "t"}));
    }

    #[test]
    fn test_field_keeps_plain_array_values() {
        let grant = grant();
        let query = Query::new().subject("user");

        assert_eq!(
            grant.field(&json!(["a", "b"]), Some(&query)).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            grant.field(&json!([1, 2]), Some(&query)).unwrap(),
            json!([1, 2])
        );
    }

    #[test]
    fn test_default_timezone() {
        let grant = grant().with_timezone(chrono_tz::Asia::Tehran);
        assert_eq!(grant.timezone(), chrono_tz::Asia::Tehran);
        // No windows anywhere, so always open.
        assert!(grant.time(None, &TimeOptions::new()).unwrap());
    }
}
