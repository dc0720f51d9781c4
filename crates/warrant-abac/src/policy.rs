//! Policy definitions.
//!
//! A policy binds a subject to an action on an object. Each of the three
//! identifiers may carry a scope after the key separator (`read:own`,
//! `article:published`). Optional constraints narrow the policy further:
//! time windows, network locations, and field/filter notations used to
//! shape payloads on write and read.

use crate::time::TimeWindow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard action: a policy with this action applies to every action.
pub const ANY: &str = "any";

/// Wildcard object: a policy with this object applies to every object.
pub const ALL: &str = "all";

/// Placeholder scope written into keys for unscoped subjects.
pub const NULL: &str = "null";

// ============================================================================
// Axis
// ============================================================================

/// One of the three identifiers every policy carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Subject,
    Action,
    Object,
}

impl Axis {
    /// Axes in canonical key order.
    pub const ALL: [Axis; 3] = [Axis::Subject, Axis::Action, Axis::Object];

    /// Scope written into the key when the value has none.
    pub fn default_scope(self) -> &'static str {
        match self {
            Axis::Subject => NULL,
            Axis::Action => ANY,
            Axis::Object => ALL,
        }
    }

    /// Letter naming this axis in a legacy strictness string (`"sao"`).
    pub fn letter(self) -> char {
        match self {
            Axis::Subject => 's',
            Axis::Action => 'a',
            Axis::Object => 'o',
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Subject => write!(f, "subject"),
            Axis::Action => write!(f, "action"),
            Axis::Object => write!(f, "object"),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// An authorization rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub subject: String,
    pub action: String,
    pub object: String,

    /// Cron windows during which the policy is usable. Empty means always.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub time: Vec<TimeWindow>,

    /// Notation applied to incoming payloads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<String>,

    /// Notation applied to outgoing payloads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,

    /// IP literals or CIDR blocks the request must come from. Empty means anywhere.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<String>,
}

impl Policy {
    /// Creates an unconstrained policy.
    pub fn new(
        subject: impl Into<String>,
        action: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            action: action.into(),
            object: object.into(),
            time: Vec::new(),
            field: Vec::new(),
            filter: Vec::new(),
            location: Vec::new(),
        }
    }

    pub fn with_time(mut self, window: TimeWindow) -> Self {
        self.time.push(window);
        self
    }

    pub fn with_field<I, S>(mut self, notation: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field.extend(notation.into_iter().map(Into::into));
        self
    }

    pub fn with_filter<I, S>(mut self, notation: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.extend(notation.into_iter().map(Into::into));
        self
    }

    pub fn with_location<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.location.extend(locations.into_iter().map(Into::into));
        self
    }

    /// Raw identifier on the given axis.
    pub fn value(&self, axis: Axis) -> &str {
        match axis {
            Axis::Subject => &self.subject,
            Axis::Action => &self.action,
            Axis::Object => &self.object,
        }
    }

    /// Notation list used by the given projection side.
    pub(crate) fn notation(&self, side: Side) -> &[String] {
        match side {
            Side::Field => &self.field,
            Side::Filter => &self.filter,
        }
    }
}

/// Which notation list a projection reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Field,
    Filter,
}
