// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution environments and environment-indexed field values.
//!
//! A single logical field of a task (e.g. memory) may legitimately carry
//! different concrete values under different execution environments. Rather
//! than reflection, every such field uses [`EnvironmentSpecificValue`] and
//! all consumers go through its API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Environment ─────────────────────────────────────────────────────────

/// The closed set of execution environments a workflow can target.
///
/// Variants are declared in lexical order of their wire names so that
/// sorted sets serialise in canonical order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Container-per-task execution with object-store file staging.
    CloudNative,
    /// Batch scheduler with explicit file transfer between nodes.
    DistributedComputing,
    /// Mixed model combining shared and distributed assumptions.
    Hybrid,
    /// Single-machine execution.
    Local,
    /// Cluster nodes that all see one filesystem.
    SharedFilesystem,
}

impl Environment {
    /// Wire name of this environment (snake_case).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CloudNative => "cloud_native",
            Self::DistributedComputing => "distributed_computing",
            Self::Hybrid => "hybrid",
            Self::Local => "local",
            Self::SharedFilesystem => "shared_filesystem",
        }
    }

    /// Returns all known environments.
    #[must_use]
    pub fn all() -> &'static [Environment] {
        &[
            Self::CloudNative,
            Self::DistributedComputing,
            Self::Hybrid,
            Self::Local,
            Self::SharedFilesystem,
        ]
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cloud_native" => Some(Self::CloudNative),
            "distributed_computing" => Some(Self::DistributedComputing),
            "hybrid" => Some(Self::Hybrid),
            "local" => Some(Self::Local),
            "shared_filesystem" => Some(Self::SharedFilesystem),
            _ => None,
        }
    }

    /// Whether GPU scheduling is expressible in this environment.
    ///
    /// `local` has no scheduler to honour a GPU request; the adapter falls
    /// back to a CPU-only profile when retargeting to it.
    #[must_use]
    pub fn supports_gpu(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── EnvironmentSpecificValue ────────────────────────────────────────────

/// One entry in an [`EnvironmentSpecificValue`]: a value applicable to a
/// non-empty set of environments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentEntry<T> {
    /// Environments this value applies to (serialised sorted).
    pub environments: BTreeSet<Environment>,
    /// The concrete value.
    pub value: T,
}

/// A field value indexed by execution environment, plus an optional default.
///
/// Lookup semantics: [`get_for`](Self::get_for) is an exact lookup with no
/// fallback; [`get_with_default`](Self::get_with_default) falls back to the
/// default value. Setting a default never shadows per-environment entries.
///
/// # Examples
///
/// ```
/// use wf2wf_core::{Environment, EnvironmentSpecificValue};
///
/// let mut mem = EnvironmentSpecificValue::for_environment(Environment::SharedFilesystem, 10240);
/// mem.set_for(Environment::DistributedComputing, 11264);
/// assert_eq!(mem.get_for(Environment::SharedFilesystem), Some(&10240));
/// assert_eq!(mem.get_for(Environment::Local), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct EnvironmentSpecificValue<T> {
    /// Fallback value used by [`get_with_default`](Self::get_with_default).
    #[serde(skip_serializing_if = "Option::is_none")]
    default_value: Option<T>,
    /// Per-environment values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<EnvironmentEntry<T>>,
}

impl<T> Default for EnvironmentSpecificValue<T> {
    fn default() -> Self {
        Self {
            default_value: None,
            values: Vec::new(),
        }
    }
}

impl<T> EnvironmentSpecificValue<T> {
    /// An unset value: no default, no per-environment entries.
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }

    /// A value carrying only a default.
    #[must_use]
    pub fn with_default(value: T) -> Self {
        Self {
            default_value: Some(value),
            values: Vec::new(),
        }
    }

    /// A value applicable to exactly one environment.
    #[must_use]
    pub fn for_environment(env: Environment, value: T) -> Self {
        Self {
            default_value: None,
            values: vec![EnvironmentEntry {
                environments: BTreeSet::from([env]),
                value,
            }],
        }
    }

    /// Exact lookup for `env`. No fallback to the default.
    #[must_use]
    pub fn get_for(&self, env: Environment) -> Option<&T> {
        self.values
            .iter()
            .find(|e| e.environments.contains(&env))
            .map(|e| &e.value)
    }

    /// Lookup for `env`, falling back to the default value.
    #[must_use]
    pub fn get_with_default(&self, env: Environment) -> Option<&T> {
        self.get_for(env).or(self.default_value.as_ref())
    }

    /// The default value, if set.
    #[must_use]
    pub fn default_value(&self) -> Option<&T> {
        self.default_value.as_ref()
    }

    /// Bind `value` to `env`, replacing any previous binding for `env`.
    ///
    /// Other environments sharing an entry with `env` keep their old value.
    pub fn set_for(&mut self, env: Environment, value: T) {
        for entry in &mut self.values {
            entry.environments.remove(&env);
        }
        self.values.retain(|e| !e.environments.is_empty());
        self.values.push(EnvironmentEntry {
            environments: BTreeSet::from([env]),
            value,
        });
    }

    /// Set the default value. Never shadows per-environment entries.
    pub fn set_default(&mut self, value: T) {
        self.default_value = Some(value);
    }

    /// The set of environments with an explicit entry.
    #[must_use]
    pub fn applicable_environments(&self) -> BTreeSet<Environment> {
        self.values
            .iter()
            .flat_map(|e| e.environments.iter().copied())
            .collect()
    }

    /// Whether `env` has an explicit entry.
    #[must_use]
    pub fn has_env(&self, env: Environment) -> bool {
        self.values.iter().any(|e| e.environments.contains(&env))
    }

    /// A value is applicable to `env` iff `env` has an explicit entry or a
    /// default is set.
    #[must_use]
    pub fn is_applicable_to(&self, env: Environment) -> bool {
        self.has_env(env) || self.default_value.is_some()
    }

    /// Whether the value is entirely unset (no default, no entries).
    ///
    /// Unset values are omitted from serialised workflows.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.default_value.is_none() && self.values.is_empty()
    }

    /// Iterate over `(environments, value)` entries.
    pub fn entries(&self) -> impl Iterator<Item = (&BTreeSet<Environment>, &T)> {
        self.values.iter().map(|e| (&e.environments, &e.value))
    }
}

// Deserialisation accepts both the canonical shape and the legacy flat
// scalar shape: a bare scalar `v` is interpreted as `{default_value: v}`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for EnvironmentSpecificValue<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        #[serde(bound(deserialize = "T: Deserialize<'de>"))]
        struct Canonical<T> {
            #[serde(default)]
            default_value: Option<T>,
            #[serde(default = "Vec::new")]
            values: Vec<EnvironmentEntry<T>>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr<T> {
            Canonical(Canonical<T>),
            Scalar(T),
        }

        match Repr::<T>::deserialize(deserializer)? {
            Repr::Canonical(c) => Ok(Self {
                default_value: c.default_value,
                values: c.values,
            }),
            Repr::Scalar(v) => Ok(Self::with_default(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parse_roundtrip() {
        for &env in Environment::all() {
            assert_eq!(Environment::parse(env.as_str()), Some(env));
        }
        assert_eq!(Environment::parse("mainframe"), None);
    }

    #[test]
    fn environment_ord_is_lexical() {
        let set: BTreeSet<Environment> = Environment::all().iter().copied().collect();
        let names: Vec<&str> = set.iter().map(|e| e.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn unset_by_default() {
        let v: EnvironmentSpecificValue<i64> = EnvironmentSpecificValue::default();
        assert!(v.is_unset());
        assert_eq!(v.get_for(Environment::Local), None);
        assert_eq!(v.get_with_default(Environment::Local), None);
    }

    #[test]
    fn exact_lookup_has_no_fallback() {
        let v = EnvironmentSpecificValue::with_default(4);
        assert_eq!(v.get_for(Environment::Local), None);
        assert_eq!(v.get_with_default(Environment::Local), Some(&4));
    }

    #[test]
    fn set_for_replaces_only_that_environment() {
        let mut v = EnvironmentSpecificValue::for_environment(Environment::SharedFilesystem, 1);
        v.set_for(Environment::SharedFilesystem, 2);
        assert_eq!(v.get_for(Environment::SharedFilesystem), Some(&2));
        assert_eq!(v.applicable_environments().len(), 1);
    }

    #[test]
    fn set_for_splits_shared_entries() {
        let mut v: EnvironmentSpecificValue<i64> = EnvironmentSpecificValue {
            default_value: None,
            values: vec![EnvironmentEntry {
                environments: BTreeSet::from([
                    Environment::SharedFilesystem,
                    Environment::DistributedComputing,
                ]),
                value: 7,
            }],
        };
        v.set_for(Environment::DistributedComputing, 9);
        assert_eq!(v.get_for(Environment::SharedFilesystem), Some(&7));
        assert_eq!(v.get_for(Environment::DistributedComputing), Some(&9));
    }

    #[test]
    fn set_default_never_shadows_entries() {
        let mut v = EnvironmentSpecificValue::for_environment(Environment::CloudNative, 10);
        v.set_default(1);
        assert_eq!(v.get_for(Environment::CloudNative), Some(&10));
        assert_eq!(v.get_with_default(Environment::CloudNative), Some(&10));
        assert_eq!(v.get_with_default(Environment::Local), Some(&1));
    }

    #[test]
    fn applicability_invariant() {
        let mut v = EnvironmentSpecificValue::for_environment(Environment::Hybrid, "x".to_string());
        assert!(v.is_applicable_to(Environment::Hybrid));
        assert!(!v.is_applicable_to(Environment::Local));
        v.set_default("d".to_string());
        assert!(v.is_applicable_to(Environment::Local));
    }

    #[test]
    fn serialize_canonical_shape() {
        let v = EnvironmentSpecificValue::for_environment(Environment::SharedFilesystem, 10240);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "values": [{"environments": ["shared_filesystem"], "value": 10240}]
            })
        );
    }

    #[test]
    fn serialize_omits_unset_parts() {
        let v = EnvironmentSpecificValue::with_default(3);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({"default_value": 3}));
    }

    #[test]
    fn deserialize_canonical_shape() {
        let v: EnvironmentSpecificValue<i64> = serde_json::from_value(serde_json::json!({
            "default_value": 1,
            "values": [{"environments": ["cloud_native", "hybrid"], "value": 5}]
        }))
        .unwrap();
        assert_eq!(v.default_value(), Some(&1));
        assert_eq!(v.get_for(Environment::CloudNative), Some(&5));
        assert_eq!(v.get_for(Environment::Hybrid), Some(&5));
    }

    #[test]
    fn deserialize_legacy_scalar() {
        let v: EnvironmentSpecificValue<i64> = serde_json::from_value(serde_json::json!(8192)).unwrap();
        assert_eq!(v.default_value(), Some(&8192));
        assert!(v.applicable_environments().is_empty());
    }

    #[test]
    fn deserialize_legacy_scalar_map() {
        // A flat object that is not the canonical shape is a legacy scalar.
        let v: EnvironmentSpecificValue<std::collections::BTreeMap<String, String>> =
            serde_json::from_value(serde_json::json!({"THREADS": "4"})).unwrap();
        assert_eq!(
            v.default_value().and_then(|m| m.get("THREADS")).map(String::as_str),
            Some("4")
        );
    }

    #[test]
    fn serde_roundtrip_preserves_entries() {
        let mut v = EnvironmentSpecificValue::for_environment(Environment::SharedFilesystem, 10);
        v.set_for(Environment::CloudNative, 20);
        v.set_default(1);
        let json = serde_json::to_string(&v).unwrap();
        let back: EnvironmentSpecificValue<i64> = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn environments_serialize_sorted() {
        let v: EnvironmentSpecificValue<i64> = EnvironmentSpecificValue {
            default_value: None,
            values: vec![EnvironmentEntry {
                environments: BTreeSet::from([
                    Environment::SharedFilesystem,
                    Environment::CloudNative,
                ]),
                value: 1,
            }],
        };
        let json = serde_json::to_string(&v).unwrap();
        let cloud = json.find("cloud_native").unwrap();
        let shared = json.find("shared_filesystem").unwrap();
        assert!(cloud < shared);
    }
}
