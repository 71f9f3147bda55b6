// SPDX-License-Identifier: MIT OR Apache-2.0
//! Field-scope validation rules: environment names and resource ranges.

use wf2wf_core::Environment;

/// Inclusive bounds for one numeric resource field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRule {
    /// Field name as it appears in the IR.
    pub field: &'static str,
    /// Minimum permitted value.
    pub min: i64,
    /// Maximum permitted value, if bounded.
    pub max: Option<i64>,
}

/// The resource-range rule table.
pub const RESOURCE_RULES: &[ResourceRule] = &[
    ResourceRule {
        field: "cpu",
        min: 1,
        max: Some(1024),
    },
    ResourceRule {
        field: "mem_mb",
        min: 1,
        max: None,
    },
    ResourceRule {
        field: "disk_mb",
        min: 0,
        max: None,
    },
    ResourceRule {
        field: "gpu",
        min: 0,
        max: None,
    },
    ResourceRule {
        field: "gpu_mem_mb",
        min: 0,
        max: None,
    },
    ResourceRule {
        field: "time_s",
        min: 1,
        max: None,
    },
    ResourceRule {
        field: "threads",
        min: 1,
        max: None,
    },
];

/// Look up the bounds for a resource field.
#[must_use]
pub fn resource_bounds(field: &str) -> Option<ResourceRule> {
    RESOURCE_RULES.iter().copied().find(|r| r.field == field)
}

/// Whether `value` is inside the permitted range for `field`.
///
/// Unknown fields are invalid.
#[must_use]
pub fn is_valid_resource(field: &str, value: i64) -> bool {
    match resource_bounds(field) {
        Some(rule) => value >= rule.min && rule.max.is_none_or(|max| value <= max),
        None => false,
    }
}

/// Clamp `value` into the permitted range for `field`.
///
/// Unknown fields pass through unchanged.
#[must_use]
pub fn clamp_resource(field: &str, value: i64) -> i64 {
    match resource_bounds(field) {
        Some(rule) => {
            let low = value.max(rule.min);
            rule.max.map_or(low, |max| low.min(max))
        }
        None => value,
    }
}

/// Whether `name` is a member of the closed execution-environment set.
#[must_use]
pub fn is_valid_environment_name(name: &str) -> bool {
    Environment::parse(name).is_some()
}
