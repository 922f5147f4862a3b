// Copyright 2025 Plexus (https://github.com/plexus-net)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Metadata predicates and filters.
//!
//! A [`Filter`] is a conjunction of per-key predicates. An entity matches
//! when every filtered key is present and satisfies its predicate; missing
//! keys never match. The builder records the first construction error (a
//! non-integer bound, an invalid regex) instead of panicking, so traversal
//! steps can surface it as a sticky query error.

use crate::metadata::{to_f64, to_i64, Metadata};
use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while building a filter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    /// A numeric predicate was given a value that does not coerce to i64.
    #[error("'{key}' predicate requires an integer value")]
    NotAnInteger { key: String },

    /// A regex predicate was given an invalid pattern.
    #[error("invalid regex for '{key}': {pattern}")]
    InvalidRegex { key: String, pattern: String },
}

/// A predicate over a single metadata value.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Loose equality: numbers compare numerically, everything else
    /// structurally.
    Eq(Value),
    Ne(Value),
    Lt(i64),
    Gt(i64),
    Lte(i64),
    Gte(i64),
    /// `a < x < b`.
    Inside(i64, i64),
    /// `x < a || x > b`.
    Outside(i64, i64),
    /// `a <= x < b`.
    Between(i64, i64),
    /// Membership in a list of values.
    Within(Vec<Value>),
    /// Non-membership.
    Without(Vec<Value>),
    /// String regex match.
    Regex(Regex),
    /// `x >= now - seconds`, for Unix-second timestamps.
    Since(i64),
}

impl Predicate {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Predicate::Eq(expected) => loose_eq(value, expected),
            Predicate::Ne(expected) => !loose_eq(value, expected),
            Predicate::Lt(bound) => to_i64(value).map_or(false, |v| v < *bound),
            Predicate::Gt(bound) => to_i64(value).map_or(false, |v| v > *bound),
            Predicate::Lte(bound) => to_i64(value).map_or(false, |v| v <= *bound),
            Predicate::Gte(bound) => to_i64(value).map_or(false, |v| v >= *bound),
            Predicate::Inside(from, to) => {
                to_i64(value).map_or(false, |v| v > *from && v < *to)
            }
            Predicate::Outside(from, to) => {
                to_i64(value).map_or(false, |v| v < *from || v > *to)
            }
            Predicate::Between(from, to) => {
                to_i64(value).map_or(false, |v| v >= *from && v < *to)
            }
            Predicate::Within(list) => list.iter().any(|e| loose_eq(value, e)),
            Predicate::Without(list) => !list.iter().any(|e| loose_eq(value, e)),
            Predicate::Regex(re) => value.as_str().map_or(false, |s| re.is_match(s)),
            Predicate::Since(seconds) => {
                let horizon = Utc::now().timestamp() - seconds;
                to_i64(value).map_or(false, |v| v >= horizon)
            }
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => match (to_f64(a), to_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// A conjunction of metadata predicates. The empty filter matches every
/// entity.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    entries: Vec<(String, Predicate)>,
    error: Option<FilterError>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first error recorded while building this filter, if any. A
    /// filter carrying an error matches nothing.
    pub fn error(&self) -> Option<&FilterError> {
        self.error.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.error.is_none()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), Predicate::Eq(value.into())));
        self
    }

    pub fn ne(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((key.into(), Predicate::Ne(value.into())));
        self
    }

    pub fn lt(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.numeric(key.into(), value.into(), Predicate::Lt)
    }

    pub fn gt(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.numeric(key.into(), value.into(), Predicate::Gt)
    }

    pub fn lte(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.numeric(key.into(), value.into(), Predicate::Lte)
    }

    pub fn gte(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.numeric(key.into(), value.into(), Predicate::Gte)
    }

    pub fn inside(
        self,
        key: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.numeric_pair(key.into(), from.into(), to.into(), Predicate::Inside)
    }

    pub fn outside(
        self,
        key: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.numeric_pair(key.into(), from.into(), to.into(), Predicate::Outside)
    }

    pub fn between(
        self,
        key: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.numeric_pair(key.into(), from.into(), to.into(), Predicate::Between)
    }

    pub fn within<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.entries.push((key.into(), Predicate::Within(list)));
        self
    }

    pub fn without<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.entries.push((key.into(), Predicate::Without(list)));
        self
    }

    pub fn regex(mut self, key: impl Into<String>, pattern: &str) -> Self {
        let key = key.into();
        match Regex::new(pattern) {
            Ok(re) => self.entries.push((key, Predicate::Regex(re))),
            Err(_) => self.fail(FilterError::InvalidRegex {
                key,
                pattern: pattern.to_string(),
            }),
        }
        self
    }

    pub fn since(mut self, key: impl Into<String>, seconds: i64) -> Self {
        self.entries.push((key.into(), Predicate::Since(seconds)));
        self
    }

    /// Whether `metadata` satisfies every predicate of this filter.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.entries
            .iter()
            .all(|(key, predicate)| metadata.get(key).map_or(false, |v| predicate.matches(v)))
    }

    fn numeric(mut self, key: String, value: Value, build: fn(i64) -> Predicate) -> Self {
        match to_i64(&value) {
            Some(v) => self.entries.push((key, build(v))),
            None => self.fail(FilterError::NotAnInteger { key }),
        }
        self
    }

    fn numeric_pair(
        mut self,
        key: String,
        from: Value,
        to: Value,
        build: fn(i64, i64) -> Predicate,
    ) -> Self {
        match (to_i64(&from), to_i64(&to)) {
            (Some(f), Some(t)) => self.entries.push((key, build(f, t))),
            _ => self.fail(FilterError::NotAnInteger { key }),
        }
        self
    }

    fn fail(&mut self, error: FilterError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

impl From<Metadata> for Filter {
    /// An exact-equality filter over every key of `metadata`.
    fn from(metadata: Metadata) -> Self {
        let mut filter = Filter::new();
        for (key, value) in &metadata {
            filter = filter.eq(key.clone(), value.clone());
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::keys;
    use chrono::Utc;

    fn bridge() -> Metadata {
        Metadata::new()
            .with(keys::TYPE, "ovsbridge")
            .with(keys::NAME, "br-int")
            .with("MTU", 1500)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(Filter::new().matches(&bridge()));
        assert!(Filter::new().matches(&Metadata::new()));
    }

    #[test]
    fn test_equality_and_negation() {
        assert!(Filter::new().eq(keys::TYPE, "ovsbridge").matches(&bridge()));
        assert!(!Filter::new().eq(keys::TYPE, "host").matches(&bridge()));
        assert!(Filter::new().ne(keys::TYPE, "host").matches(&bridge()));
        assert!(Filter::new().eq("MTU", 1500.0).matches(&bridge()));
    }

    #[test]
    fn test_missing_keys_never_match() {
        assert!(!Filter::new().eq("Driver", "openvswitch").matches(&bridge()));
        // Even a negation needs the key to be present.
        assert!(!Filter::new().ne("Driver", "openvswitch").matches(&bridge()));
    }

    #[test]
    fn test_numeric_comparisons() {
        let meta = bridge();
        assert!(Filter::new().lt("MTU", 9000).matches(&meta));
        assert!(Filter::new().gt("MTU", 1000).matches(&meta));
        assert!(Filter::new().lte("MTU", 1500).matches(&meta));
        assert!(Filter::new().gte("MTU", 1500).matches(&meta));
        assert!(Filter::new().inside("MTU", 1000, 2000).matches(&meta));
        assert!(!Filter::new().inside("MTU", 1500, 2000).matches(&meta));
        assert!(Filter::new().outside("MTU", 2000, 3000).matches(&meta));
        assert!(Filter::new().between("MTU", 1500, 1501).matches(&meta));
        assert!(!Filter::new().between("MTU", 1501, 2000).matches(&meta));
        // Non-numeric entity value never satisfies a numeric predicate.
        assert!(!Filter::new().lt(keys::NAME, 10).matches(&meta));
    }

    #[test]
    fn test_membership() {
        let meta = bridge();
        assert!(Filter::new()
            .within(keys::TYPE, ["ovsbridge", "bond"])
            .matches(&meta));
        assert!(!Filter::new()
            .within(keys::TYPE, ["host", "netns"])
            .matches(&meta));
        assert!(Filter::new()
            .without(keys::TYPE, ["host", "netns"])
            .matches(&meta));
        assert!(Filter::new().within("MTU", [1500, 9000]).matches(&meta));
    }

    #[test]
    fn test_regex() {
        let meta = bridge();
        assert!(Filter::new().regex(keys::NAME, "^br-").matches(&meta));
        assert!(!Filter::new().regex(keys::NAME, "^eth").matches(&meta));
        // Regex only applies to string values.
        assert!(!Filter::new().regex("MTU", "15").matches(&meta));
    }

    #[test]
    fn test_since() {
        let now = Utc::now().timestamp();
        let meta = Metadata::new().with("LastSeen", now - 30);
        assert!(Filter::new().since("LastSeen", 60).matches(&meta));
        assert!(!Filter::new().since("LastSeen", 10).matches(&meta));
    }

    #[test]
    fn test_builder_errors_are_sticky() {
        let filter = Filter::new().lt("MTU", "not-a-number").eq(keys::TYPE, "ovsbridge");
        assert_eq!(
            filter.error(),
            Some(&FilterError::NotAnInteger {
                key: "MTU".to_string()
            })
        );
        assert!(!filter.matches(&bridge()));

        let filter = Filter::new().regex(keys::NAME, "br-(");
        assert!(matches!(
            filter.error(),
            Some(FilterError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_filter_from_metadata() {
        let filter: Filter = Metadata::new().with(keys::TYPE, "ovsbridge").into();
        assert!(filter.matches(&bridge()));
        assert!(!filter.matches(&Metadata::new().with(keys::TYPE, "host")));
    }
}
