//! Decision results.

use crate::error::Result;
use crate::grant::Grant;
use crate::key::{KeyCodec, Query};
use crate::policy::{Axis, Policy};
use crate::time::TimeOptions;
use serde_json::Value;
use std::net::IpAddr;

/// The outcome of [`AccessControl::can`](crate::AccessControl::can).
///
/// `granted` is fixed when the decision is made. The grant holds every
/// policy that matched and answers follow-up questions regardless of the
/// outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Permission {
    granted: bool,
    grant: Grant,
}

impl Permission {
    pub fn new(granted: bool, grant: Grant) -> Self {
        Self { granted, grant }
    }

    /// Builds a permission over a fresh grant of `policies`.
    pub fn build<I>(granted: bool, codec: KeyCodec, policies: I) -> Result<Self>
    where
        I: IntoIterator<Item = Policy>,
    {
        Ok(Self::new(granted, Grant::from_policies(codec, policies)?))
    }

    pub fn granted(&self) -> bool {
        self.granted
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }

    pub fn into_grant(self) -> Grant {
        self.grant
    }

    pub fn policies(&self) -> impl Iterator<Item = &Policy> + '_ {
        self.grant.policies()
    }

    pub fn has(&self, query: &Query) -> Result<bool> {
        self.grant.has(query)
    }

    pub fn subjects(&self, query: Option<&Query>) -> Result<Vec<String>> {
        self.grant.subjects(query)
    }

    pub fn scopes(&self, axis: Axis, query: Option<&Query>) -> Result<Vec<String>> {
        self.grant.scopes(axis, query)
    }

    pub fn time(&self, query: Option<&Query>, options: &TimeOptions) -> Result<bool> {
        self.grant.time(query, options)
    }

    pub fn location(&self, ip: IpAddr, query: Option<&Query>) -> Result<bool> {
        self.grant.location(ip, query)
    }

    pub fn field(&self, data: &Value, query: Option<&Query>) -> Result<Value> {
        self.grant.field(data, query)
    }

    pub fn field_owned(&self, data: Value, query: Option<&Query>) -> Result<Value> {
        self.grant.field_owned(data, query)
    }

    pub fn field_by<F>(&self, data: &Value, query: F) -> Result<Value>
    where
        F: Fn(&Value) -> Query,
    {
        self.grant.field_by(data, query)
    }

    pub fn filter(&self, data: &Value, query: Option<&Query>) -> Result<Value> {
        self.grant.filter(data, query)
    }

    pub fn filter_owned(&self, data: Value, query: Option<&Query>) -> Result<Value> {
        self.grant.filter_owned(data, query)
    }

    pub fn filter_by<F>(&self, data: &Value, query: F) -> Result<Value>
    where
        F: Fn(&Value) -> Query,
    {
        self.grant.filter_by(data, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use serde_json::json;

    #[test]
    fn test_build_keeps_flag_independent_of_policies() {
        let denied = Permission::build(
            false,
            KeyCodec::new(),
            [Policy::new("user", "read:shared", "article").with_filter(["*", "!owner"])],
        )
        .unwrap();

        assert!(!denied.granted());
        assert_eq!(denied.policies().count(), 1);
        assert_eq!(
            denied.filter(&json!({"title": "t", "owner": "o"}), None).unwrap(),
            json!({"title": "t"})
        );
        assert_eq!(denied.scopes(Axis::Action, None).unwrap(), vec!["shared"]);
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let policy = Policy::new("user", "read", "article");
        assert!(matches!(
            Permission::build(true, KeyCodec::new(), [policy.clone(), policy]),
            Err(AccessError::DuplicatePolicy { .. })
        ));
    }
}
