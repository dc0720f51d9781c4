//! The decision procedure.
//!
//! `can` turns one request into four candidate lookups per subject:
//!
//! ```text
//! (subject, action, object)   exact
//! (subject, any,    object)   action wildcard
//! (subject, action, all)      object wildcard
//! (subject, any,    all)      both wildcards
//! ```
//!
//! Every lookup runs to completion and their results are merged into one
//! [`Grant`], deduplicated by canonical key. Access is granted when anything
//! matched and the optional predicate agrees.

use crate::error::{AccessError, Result, StoreError};
use crate::grant::Grant;
use crate::key::{Query, Strictness};
use crate::permission::Permission;
use crate::policy::{ALL, ANY, Policy};
use crate::store::{MemoryDriver, PolicyStore};
use crate::time::parse_timezone;
use crate::validate::validate;
use chrono_tz::Tz;
use futures::future::try_join_all;
use std::fmt;
use tracing::{debug, info, warn};
use warrant_config::WarrantConfig;

/// Extra check run against a structurally granted permission.
pub type Predicate = Box<dyn Fn(&Permission) -> bool + Send + Sync>;

/// Per-call options for [`AccessControl::can`].
#[derive(Default)]
pub struct CanOptions {
    strict: Option<Strictness>,
    callable: Option<Predicate>,
}

impl CanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the scope strictness for this call.
    pub fn with_strict(mut self, strict: impl Into<Strictness>) -> Self {
        self.strict = Some(strict.into());
        self
    }

    /// Requires `predicate` to hold as well. It only runs when some policy
    /// matched.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Permission) -> bool + Send + Sync + 'static,
    {
        self.callable = Some(Box::new(predicate));
        self
    }
}

impl fmt::Debug for CanOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanOptions")
            .field("strict", &self.strict)
            .field("callable", &self.callable.is_some())
            .finish()
    }
}

/// Owns a policy store and answers access requests against it.
pub struct AccessControl<S: PolicyStore = MemoryDriver> {
    store: S,

    /// Strictness used when a call does not override it. Falls back to the
    /// store codec's default when unset.
    strict: Option<Strictness>,

    /// Zone handed to every grant for time checks.
    timezone: Tz,

    /// Whether to log decisions.
    audit_enabled: bool,
}

impl AccessControl<MemoryDriver> {
    /// Access control over an empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryDriver::new())
    }
}

impl<S: PolicyStore> AccessControl<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            strict: None,
            timezone: Tz::UTC,
            audit_enabled: true,
        }
    }

    /// Applies the decision and time settings of `config`. The store keeps
    /// its own codec.
    pub fn from_config(store: S, config: &WarrantConfig) -> Result<Self> {
        let mut access = Self::new(store)
            .with_strict(&config.decision.strict)
            .with_timezone(parse_timezone(&config.time.timezone)?);
        access.audit_enabled = config.decision.audit;
        Ok(access)
    }

    pub fn with_strict(mut self, strict: impl Into<Strictness>) -> Self {
        self.strict = Some(strict.into());
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // Policy management
    // ========================================================================

    /// Validates and stores a policy. A policy with the same canonical key
    /// is never replaced.
    pub async fn update(&mut self, policy: Policy) -> Result<()> {
        validate(&policy, self.store.codec())?;

        let (subject, action, object) = (
            policy.subject.clone(),
            policy.action.clone(),
            policy.object.clone(),
        );
        match self.store.set(policy).await {
            Ok(()) => {
                debug!(%subject, %action, %object, "Policy registered");
                Ok(())
            }
            Err(StoreError::Conflict { key }) => Err(AccessError::DuplicatePolicy { key }),
            Err(err) => Err(err.into()),
        }
    }

    /// Stores each policy in turn, stopping at the first failure.
    pub async fn update_many<I>(&mut self, policies: I) -> Result<()>
    where
        I: IntoIterator<Item = Policy>,
    {
        for policy in policies {
            self.update(policy).await?;
        }
        Ok(())
    }

    pub async fn exists(&self, policy: &Policy) -> Result<bool> {
        Ok(self.store.has(policy).await?)
    }

    pub async fn delete(&mut self, policy: &Policy) -> Result<bool> {
        Ok(self.store.delete(policy).await?)
    }

    pub async fn clear(&mut self) -> Result<()> {
        Ok(self.store.clear().await?)
    }

    // ========================================================================
    // Decision
    // ========================================================================

    /// Decides whether any of `subjects` may perform `action` on `object`.
    ///
    /// Fails only when `subjects` is empty, when the store fails, or when
    /// the store hands back a policy that does not validate.
    pub async fn can<T>(
        &self,
        subjects: &[T],
        action: &str,
        object: &str,
        options: CanOptions,
    ) -> Result<Permission>
    where
        T: AsRef<str>,
    {
        if subjects.is_empty() {
            return Err(AccessError::NoSubjects);
        }

        let codec = self.store.codec();
        let strict = options.strict.or(self.strict).unwrap_or(codec.strict());

        let mut candidates = Vec::with_capacity(subjects.len() * 4);
        for (candidate_action, candidate_object) in
            [(action, object), (ANY, object), (action, ALL), (ANY, ALL)]
        {
            for subject in subjects {
                candidates.push(
                    Query::new()
                        .subject(subject.as_ref())
                        .action(candidate_action)
                        .object(candidate_object)
                        .with_strict(strict),
                );
            }
        }

        let results = try_join_all(candidates.iter().map(|query| self.store.get(query))).await?;

        let mut grant = Grant::new(codec.clone()).with_timezone(self.timezone);
        let mut matched = 0usize;
        for policy in results.into_iter().flatten() {
            matched += 1;
            grant.absorb(policy)?;
        }

        let mut granted = matched > 0;
        let mut permission = Permission::new(granted, grant);
        if granted && let Some(callable) = &options.callable {
            granted = callable(&permission);
            permission = Permission::new(granted, permission.into_grant());
        }

        if self.audit_enabled {
            let subjects = subjects
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<&str>>()
                .join(",");
            if granted {
                info!(
                    %subjects,
                    %action,
                    %object,
                    policies = permission.grant().len(),
                    "Access granted"
                );
            } else {
                warn!(
                    %subjects,
                    %action,
                    %object,
                    matched,
                    "Access denied"
                );
            }
        }

        Ok(permission)
    }
}
