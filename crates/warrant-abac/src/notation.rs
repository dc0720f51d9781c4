//! Field notation: merging allow/deny lists and projecting JSON payloads.
//!
//! A notation list is a sequence of globs. A plain glob allows a path, a
//! glob prefixed with `!` denies it:
//!
//! | Glob            | Meaning                                   |
//! |-----------------|-------------------------------------------|
//! | `*`             | every key at this level                   |
//! | `owner`         | the `owner` key                           |
//! | `author.email`  | `email` inside `author`                   |
//! | `items[*].id`   | `id` of every element of `items`          |
//! | `items[0]`      | first element of `items`                  |
//! | `!secret`       | remove `secret`                           |
//!
//! Projection starts from "exclude everything", so `*` is needed to keep
//! all fields and plain paths act as an allow-list. At each level the most
//! specific matching rule decides (an exact key beats `*`, an exact index
//! beats `[*]`); between equally specific rules the negation wins. Deeper
//! rules refine whatever their parent decided.

use crate::error::{AccessError, Result};
use serde_json::{Map, Value};

// ============================================================================
// Accumulation
// ============================================================================

/// Merges the notation lists of several policies.
///
/// Positive globs are unioned in first-seen order. A negation survives only
/// if every non-empty list carries it. The result lists positives first.
///
/// ```
/// use warrant_abac::notation::accumulate;
///
/// let merged = accumulate([vec!["*", "owner", "!id"], vec!["*", "!owner", "!id"]]);
/// assert_eq!(merged, vec!["*", "owner", "!id"]);
/// ```
pub fn accumulate<I, L, S>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = L>,
    L: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut lists = lists.into_iter().filter(|list| !list.as_ref().is_empty());
    let Some(first) = lists.next() else {
        return Vec::new();
    };

    let mut pos: Vec<String> = Vec::new();
    let mut neg: Vec<String> = Vec::new();
    for glob in first.as_ref() {
        let glob: &str = glob.as_ref();
        let side = if is_negated(glob) { &mut neg } else { &mut pos };
        if !side.iter().any(|g| g == glob) {
            side.push(glob.to_string());
        }
    }

    for list in lists {
        let list = list.as_ref();
        for glob in list {
            let glob: &str = glob.as_ref();
            if !is_negated(glob) && !pos.iter().any(|g| g == glob) {
                pos.push(glob.to_string());
            }
        }
        neg.retain(|n| list.iter().any(|g| g.as_ref() == n.as_str()));
    }

    pos.extend(neg);
    pos
}

fn is_negated(glob: &str) -> bool {
    glob.starts_with('!')
}

// ============================================================================
// Glob parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    AnyKey,
    Index(usize),
    AnyIndex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    negated: bool,
    path: Vec<Segment>,
}

fn parse_glob(glob: &str) -> Result<Rule> {
    let invalid = || AccessError::InvalidNotation {
        notation: glob.to_string(),
    };

    let (negated, body) = match glob.strip_prefix('!') {
        Some(body) => (true, body),
        None => (false, glob),
    };

    let mut path = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(invalid)?;
            let inner = &after[..close];
            path.push(if inner == "*" {
                Segment::AnyIndex
            } else {
                Segment::Index(inner.parse().map_err(|_| invalid())?)
            });
            rest = &after[close + 1..];
        } else {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let key = &rest[..end];
            if key.is_empty() || key.contains(']') {
                return Err(invalid());
            }
            path.push(if key == "*" {
                Segment::AnyKey
            } else {
                Segment::Key(key.to_string())
            });
            rest = &rest[end..];
        }

        if let Some(after) = rest.strip_prefix('.') {
            if after.is_empty() {
                return Err(invalid());
            }
            rest = after;
        } else if !rest.is_empty() && !rest.starts_with('[') {
            return Err(invalid());
        }
    }

    if path.is_empty() {
        return Err(invalid());
    }
    Ok(Rule { negated, path })
}

/// True if `glob` is well formed.
pub fn is_valid(glob: &str) -> bool {
    parse_glob(glob).is_ok()
}

// ============================================================================
// Projection
// ============================================================================

/// Projects a copy of `value`; the input is left untouched.
pub fn project<S: AsRef<str>>(value: &Value, notation: &[S]) -> Result<Value> {
    project_owned(value.clone(), notation)
}

/// Projects `value` in place of a copy.
///
/// Objects and arrays are projected; scalars are returned unchanged. An
/// array at the root is projected element by element.
pub fn project_owned<S: AsRef<str>>(value: Value, notation: &[S]) -> Result<Value> {
    if notation.is_empty() {
        return Err(AccessError::NotationEmpty);
    }
    let rules = notation
        .iter()
        .map(|glob| parse_glob(glob.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    let active: Vec<Active<'_>> = rules
        .iter()
        .map(|rule| Active {
            negated: rule.negated,
            rest: &rule.path,
        })
        .collect();

    match value {
        Value::Object(_) | Value::Array(_) => Ok(project_node(value, &active, false)),
        scalar => Ok(scalar),
    }
}

/// A rule with the segments already consumed by ancestors removed.
#[derive(Debug, Clone, Copy)]
struct Active<'a> {
    negated: bool,
    rest: &'a [Segment],
}

/// Outcome of matching one child against the active rules.
struct Step<'a> {
    include: bool,
    /// Whether a terminal rule named the child, as opposed to inheriting.
    decided: bool,
    nested: Vec<Active<'a>>,
}

/// Decides a child's inclusion and collects the rules that continue below it.
///
/// `specificity` returns how precisely a segment names the child (`None`
/// when it does not match).
fn step<'a>(
    rules: &[Active<'a>],
    inherited: bool,
    specificity: impl Fn(&Segment) -> Option<u8>,
) -> Step<'a> {
    let mut best: Option<(u8, bool)> = None;
    let mut nested = Vec::new();

    for rule in rules {
        let Some((head, tail)) = rule.rest.split_first() else {
            continue;
        };
        let Some(level) = specificity(head) else {
            continue;
        };
        if tail.is_empty() {
            best = match best {
                Some((current, negated)) if current > level => Some((current, negated)),
                Some((current, negated)) if current == level => {
                    Some((current, negated || rule.negated))
                }
                _ => Some((level, rule.negated)),
            };
        } else {
            nested.push(Active {
                negated: rule.negated,
                rest: tail,
            });
        }
    }

    Step {
        include: best.map_or(inherited, |(_, negated)| !negated),
        decided: best.is_some(),
        nested,
    }
}

fn project_node(value: Value, rules: &[Active<'_>], include: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                let outcome = step(rules, include, |segment| match segment {
                    Segment::Key(k) if *k == key => Some(2),
                    Segment::AnyKey => Some(1),
                    _ => None,
                });
                if let Some(child) = descend(child, &outcome.nested, outcome.include) {
                    // Under an exclude baseline, a container left empty was
                    // only visited, not selected.
                    if outcome.include || !is_empty_container(&child) {
                        out.insert(key, child);
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let mut outcome = step(rules, include, |segment| match segment {
                    Segment::Index(i) if *i == index => Some(2),
                    Segment::AnyIndex => Some(1),
                    _ => None,
                });
                // A plain element has no keys of its own, so a terminal `*`
                // selects it unless an index rule already decided.
                if !outcome.decided && !matches!(item, Value::Object(_) | Value::Array(_)) {
                    outcome.include = step(rules, outcome.include, |segment| {
                        matches!(segment, Segment::AnyKey).then_some(1)
                    })
                    .include;
                }
                // Key rules apply to each element.
                outcome.nested.extend(rules.iter().copied().filter(|rule| {
                    matches!(rule.rest.first(), Some(Segment::Key(_) | Segment::AnyKey))
                }));
                if let Some(item) = descend(item, &outcome.nested, outcome.include) {
                    out.push(item);
                }
            }
            Value::Array(out)
        }
        scalar => scalar,
    }
}

fn descend(child: Value, nested: &[Active<'_>], include: bool) -> Option<Value> {
    if nested.is_empty() {
        return include.then_some(child);
    }
    match child {
        Value::Object(_) | Value::Array(_) => Some(project_node(child, nested, include)),
        scalar => include.then_some(scalar),
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
