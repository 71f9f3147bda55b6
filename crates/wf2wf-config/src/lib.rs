// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-config
//!
//! Conversion options with TOML overlays and env-var overrides.
//!
//! Precedence, lowest to highest: built-in defaults, `wf2wf.toml`
//! overlay, explicit setter calls, environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use wf2wf_core::{Environment, LossSeverity};

/// Environment variable forcing headless mode (`"1"` enables).
pub const NO_PROMPT_ENV: &str = "WF2WF_NO_PROMPT";
/// Environment variable overriding the dry-run enrichment timeout.
pub const DRYRUN_TIMEOUT_ENV: &str = "WF2WF_DRYRUN_TIMEOUT_S";

/// Default dry-run enrichment timeout in seconds.
pub const DEFAULT_DRYRUN_TIMEOUT_S: u64 = 300;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from loading or validating conversion options.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ── Options ─────────────────────────────────────────────────────────────

/// Options steering one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionOptions {
    /// Target execution environment override. When unset, the adapter
    /// targets the environment idiomatic for the target format.
    pub target_environment: Option<Environment>,
    /// Abort with a non-zero exit when any unrecovered loss entry has at
    /// least this severity.
    pub fail_on_loss: Option<LossSeverity>,
    /// Emit DAGMan submit descriptions inline in the `.dag` file rather
    /// than as one `.sub` file per job.
    pub dagman_inline: bool,
    /// Enable dry-run enrichment for rule-based sources (invokes the
    /// native tool).
    pub dry_run_enrichment: bool,
    /// Timeout for the dry-run subprocess, in seconds.
    pub dry_run_timeout_s: u64,
    /// Never prompt; apply documented defaults.
    pub headless: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            target_environment: None,
            fail_on_loss: None,
            dagman_inline: true,
            dry_run_enrichment: false,
            dry_run_timeout_s: DEFAULT_DRYRUN_TIMEOUT_S,
            headless: false,
        }
    }
}

impl ConversionOptions {
    /// Parse options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] on malformed TOML and
    /// [`ConfigError::ValidationError`] on semantic problems.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let options: Self = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            reason: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileNotFound`] when the path does not
    /// exist, otherwise as [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply environment-variable overrides (highest precedence).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if std::env::var(NO_PROMPT_ENV).is_ok_and(|v| v == "1") {
            self.headless = true;
        }
        if let Ok(raw) = std::env::var(DRYRUN_TIMEOUT_ENV)
            && let Ok(secs) = raw.parse::<u64>()
        {
            self.dry_run_timeout_s = secs;
        }
        self
    }

    /// Semantic validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut reasons = Vec::new();
        if self.dry_run_timeout_s == 0 {
            reasons.push("dry_run_timeout_s must be at least 1 second".to_string());
        }
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError { reasons })
        }
    }
}
