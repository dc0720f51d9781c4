//! Canonical key encoding and query compilation.
//!
//! Every stored policy is indexed by a single string key:
//!
//! ```text
//! [prefix SEP] subject SEP scope|null SEP action SEP scope|any SEP object SEP scope|all
//! ```
//!
//! A [`Query`] names any subset of the three axes and compiles to a
//! [`Matcher`], an anchored regular expression over those keys. Strict axes
//! must match main and scope exactly; loose axes match the main value and
//! accept any scope; absent axes accept anything.

use crate::error::{AccessError, Result};
use crate::policy::{Axis, Policy};
use regex::Regex;
use std::fmt;
use warrant_config::{StrictSetting, WarrantConfig};

/// Default separator between main value, scope and key segments.
pub const SEP: &str = ":";

// ============================================================================
// Strictness
// ============================================================================

/// Per-axis scope strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strictness {
    subject: bool,
    action: bool,
    object: bool,
}

impl Strictness {
    pub const STRICT: Self = Self::all(true);
    pub const LOOSE: Self = Self::all(false);

    pub const fn all(strict: bool) -> Self {
        Self {
            subject: strict,
            action: strict,
            object: strict,
        }
    }

    /// Parses the legacy letter form: an axis is strict iff its first letter
    /// (`s`, `a`, `o`) appears in `letters`. Unknown letters are ignored.
    pub fn from_letters(letters: &str) -> Self {
        let letters = letters.to_ascii_lowercase();
        Self {
            subject: letters.contains(Axis::Subject.letter()),
            action: letters.contains(Axis::Action.letter()),
            object: letters.contains(Axis::Object.letter()),
        }
    }

    pub fn is_strict(self, axis: Axis) -> bool {
        match axis {
            Axis::Subject => self.subject,
            Axis::Action => self.action,
            Axis::Object => self.object,
        }
    }

    pub fn with_axis(mut self, axis: Axis, strict: bool) -> Self {
        match axis {
            Axis::Subject => self.subject = strict,
            Axis::Action => self.action = strict,
            Axis::Object => self.object = strict,
        }
        self
    }
}

impl Default for Strictness {
    fn default() -> Self {
        Self::STRICT
    }
}

impl From<bool> for Strictness {
    fn from(strict: bool) -> Self {
        Self::all(strict)
    }
}

impl From<&str> for Strictness {
    fn from(letters: &str) -> Self {
        Self::from_letters(letters)
    }
}

impl From<&StrictSetting> for Strictness {
    fn from(setting: &StrictSetting) -> Self {
        match setting {
            StrictSetting::Flag(strict) => Self::all(*strict),
            StrictSetting::Axes(letters) => Self::from_letters(letters),
        }
    }
}

// ============================================================================
// Scoped values and queries
// ============================================================================

/// An identifier split into its main value and optional scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedValue {
    pub main: String,
    pub scope: Option<String>,
}

impl ScopedValue {
    /// The scope, or the placeholder the key uses for this axis.
    pub fn scope_or_default(&self, axis: Axis) -> &str {
        self.scope.as_deref().unwrap_or(axis.default_scope())
    }
}

/// One axis of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// Raw identifier, `main` or `main SEP scope`.
    pub value: String,
    /// Overrides the query-wide strictness for this axis.
    pub strict: Option<bool>,
}

/// A partial description of the policies to look up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    subject: Option<Criterion>,
    action: Option<Criterion>,
    object: Option<Criterion>,
    strict: Option<Strictness>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(self, value: impl Into<String>) -> Self {
        self.axis(Axis::Subject, value)
    }

    pub fn action(self, value: impl Into<String>) -> Self {
        self.axis(Axis::Action, value)
    }

    pub fn object(self, value: impl Into<String>) -> Self {
        self.axis(Axis::Object, value)
    }

    /// Sets the value of an axis, keeping any strictness override already set on it.
    pub fn axis(mut self, axis: Axis, value: impl Into<String>) -> Self {
        let slot = self.slot_mut(axis);
        let strict = slot.as_ref().and_then(|c| c.strict);
        *slot = Some(Criterion {
            value: value.into(),
            strict,
        });
        self
    }

    /// Overrides strictness for one axis. Has no effect on an absent axis.
    pub fn with_axis_strict(mut self, axis: Axis, strict: bool) -> Self {
        if let Some(criterion) = self.slot_mut(axis) {
            criterion.strict = Some(strict);
        }
        self
    }

    /// Sets the query-wide strictness (`true`, `false`, or letters like `"sa"`).
    pub fn with_strict(mut self, strict: impl Into<Strictness>) -> Self {
        self.strict = Some(strict.into());
        self
    }

    pub fn get(&self, axis: Axis) -> Option<&Criterion> {
        match axis {
            Axis::Subject => self.subject.as_ref(),
            Axis::Action => self.action.as_ref(),
            Axis::Object => self.object.as_ref(),
        }
    }

    pub fn strictness(&self) -> Option<Strictness> {
        self.strict
    }

    /// True when no axis is named.
    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.action.is_none() && self.object.is_none()
    }

    fn slot_mut(&mut self, axis: Axis) -> &mut Option<Criterion> {
        match axis {
            Axis::Subject => &mut self.subject,
            Axis::Action => &mut self.action,
            Axis::Object => &mut self.object,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for axis in Axis::ALL {
            if let Some(criterion) = self.get(axis) {
                if !first {
                    write!(f, " ")?;
                }
                first = false;
                write!(f, "{axis}={}", criterion.value)?;
            }
        }
        if first {
            write!(f, "*")?;
        }
        Ok(())
    }
}

// ============================================================================
// Matcher
// ============================================================================

/// Compiled query, tested against canonical keys.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

// ============================================================================
// KeyCodec
// ============================================================================

/// Encodes policies into canonical keys and compiles queries into matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    separator: String,
    prefix: Option<String>,
    strict: Strictness,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self {
            separator: SEP.to_string(),
            prefix: None,
            strict: Strictness::STRICT,
        }
    }
}

impl KeyCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Result<Self> {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(AccessError::InvalidSeparator);
        }
        self.separator = separator;
        Ok(self)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Strictness used when neither the query nor its axes specify one.
    pub fn with_strict(mut self, strict: impl Into<Strictness>) -> Self {
        self.strict = strict.into();
        self
    }

    pub fn from_config(config: &WarrantConfig) -> Result<Self> {
        Ok(Self::new()
            .with_separator(config.codec.separator.as_str())?
            .with_prefix(config.codec.prefix.as_str())
            .with_strict(&config.decision.strict))
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn strict(&self) -> Strictness {
        self.strict
    }

    /// Splits `value` into main and scope, dropping the key prefix if present.
    ///
    /// Fails on empty input, an empty main or scope, or more than one separator.
    pub fn parse(&self, value: &str) -> Result<ScopedValue> {
        let value = self.strip_prefix(value);
        let not_parsable = || AccessError::NotParsable {
            value: value.to_string(),
        };

        let mut parts = value.split(self.separator.as_str());
        let main = parts.next().unwrap_or_default();
        let scope = parts.next();

        if main.is_empty() || scope.is_some_and(str::is_empty) || parts.next().is_some() {
            return Err(not_parsable());
        }

        Ok(ScopedValue {
            main: main.to_string(),
            scope: scope.map(str::to_string),
        })
    }

    /// Canonical key of a policy. Depends only on subject, action, object
    /// and this codec's separator and prefix.
    pub fn encode(&self, policy: &Policy) -> Result<String> {
        let mut segments = Vec::with_capacity(7);
        if let Some(prefix) = &self.prefix {
            segments.push(prefix.clone());
        }
        for axis in Axis::ALL {
            let scoped = self.parse(policy.value(axis))?;
            let scope = scoped.scope_or_default(axis).to_string();
            segments.push(scoped.main);
            segments.push(scope);
        }
        Ok(segments.join(&self.separator))
    }

    pub fn compile(&self, query: &Query) -> Result<Matcher> {
        let sep = regex::escape(&self.separator);
        let run = format!("[^{sep}]+");

        let mut segments = Vec::with_capacity(4);
        if let Some(prefix) = &self.prefix {
            segments.push(regex::escape(prefix));
        }

        let fallback = query.strictness().unwrap_or(self.strict);
        for axis in Axis::ALL {
            let segment = match query.get(axis) {
                Some(criterion) => {
                    let scoped = self.parse(&criterion.value)?;
                    let strict = criterion
                        .strict
                        .unwrap_or_else(|| fallback.is_strict(axis));
                    let scope = if strict {
                        regex::escape(scoped.scope_or_default(axis))
                    } else {
                        run.clone()
                    };
                    format!("{}{sep}{scope}", regex::escape(&scoped.main))
                }
                None => format!("{run}{sep}{run}"),
            };
            segments.push(segment);
        }

        let pattern = format!("^{}$", segments.join(&sep));
        let regex = Regex::new(&pattern).map_err(|_| AccessError::NotParsable {
            value: query.to_string(),
        })?;
        Ok(Matcher { regex })
    }

    fn strip_prefix<'a>(&self, value: &'a str) -> &'a str {
        self.prefix
            .as_deref()
            .and_then(|prefix| value.strip_prefix(prefix))
            .and_then(|rest| rest.strip_prefix(self.separator.as_str()))
            .unwrap_or(value)
    }
}
