// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # wf2wf-prompt
//!
//! Declarative prompts with a headless override.
//!
//! The layer never inspects the IR; applicability is a predicate computed
//! by the caller and passed in. Scheduling is single-threaded: the
//! conversion pauses on each prompt.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// Environment variable forcing headless mode.
pub const NO_PROMPT_ENV: &str = "WF2WF_NO_PROMPT";

// ── Prompt & answers ────────────────────────────────────────────────────

/// A declarative prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Stable key identifying the decision (sticky `always` is per key).
    pub key: String,
    /// The question shown to the user.
    pub question: String,
    /// Documented default, applied in headless mode.
    pub default: bool,
}

impl Prompt {
    /// Create a prompt.
    #[must_use]
    pub fn new(key: impl Into<String>, question: impl Into<String>, default: bool) -> Self {
        Self {
            key: key.into(),
            question: question.into(),
            default,
        }
    }
}

/// A user's answer to one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    /// Accept for this occurrence.
    Yes,
    /// Decline for this occurrence.
    No,
    /// Accept for this and every later occurrence of the same key.
    Always,
    /// Abort the conversion.
    Quit,
}

impl Answer {
    /// Parse a user-typed answer. Accepts single letters and full words,
    /// case-insensitively. An empty reply means "use the default".
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Self::Yes),
            "n" | "no" => Some(Self::No),
            "a" | "always" => Some(Self::Always),
            "q" | "quit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Record of one prompt decision, kept for the conversion report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// The prompt key.
    pub key: String,
    /// The question asked.
    pub question: String,
    /// The decision taken.
    pub accepted: bool,
    /// Whether the decision came from the headless default.
    pub headless: bool,
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from the prompting layer.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// The user chose `quit`. Fatal, with an exit code distinct from
    /// ordinary errors.
    #[error("conversion cancelled at prompt `{key}`")]
    Cancelled {
        /// Key of the prompt that was cancelled.
        key: String,
    },
    /// Reading the answer failed.
    #[error("failed to read prompt answer: {0}")]
    Io(#[from] std::io::Error),
}

// ── Sources ─────────────────────────────────────────────────────────────

/// Where answers come from. Implemented by the interactive console and by
/// test doubles.
pub trait PromptSource {
    /// Ask one prompt and return the raw answer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the answer cannot be read.
    fn ask(&mut self, prompt: &Prompt) -> Result<Answer, std::io::Error>;
}

/// Interactive console source: writes to stderr, reads from stdin.
#[derive(Debug, Default)]
pub struct ConsoleSource {
    _priv: (),
}

impl ConsoleSource {
    /// Create a console source.
    #[must_use]
    pub fn new() -> Self {
        Self { _priv: () }
    }
}

impl PromptSource for ConsoleSource {
    fn ask(&mut self, prompt: &Prompt) -> Result<Answer, std::io::Error> {
        let stderr = std::io::stderr();
        let stdin = std::io::stdin();
        loop {
            {
                let mut err = stderr.lock();
                let hint = if prompt.default { "Y/n/a/q" } else { "y/N/a/q" };
                write!(err, "{} [{hint}] ", prompt.question)?;
                err.flush()?;
            }
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF behaves like the documented default.
                return Ok(if prompt.default { Answer::Yes } else { Answer::No });
            }
            if line.trim().is_empty() {
                return Ok(if prompt.default { Answer::Yes } else { Answer::No });
            }
            if let Some(answer) = Answer::parse(&line) {
                return Ok(answer);
            }
        }
    }
}

/// Scripted source for tests: pops answers front-to-back.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    answers: std::collections::VecDeque<Answer>,
}

impl ScriptedSource {
    /// A source that will return `answers` in order, then the default.
    #[must_use]
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl PromptSource for ScriptedSource {
    fn ask(&mut self, prompt: &Prompt) -> Result<Answer, std::io::Error> {
        Ok(self.answers.pop_front().unwrap_or(if prompt.default {
            Answer::Yes
        } else {
            Answer::No
        }))
    }
}

// ── Prompter ────────────────────────────────────────────────────────────

/// The prompting layer: applies headless and sticky-`always` policy over
/// a [`PromptSource`].
pub struct Prompter<S> {
    source: S,
    headless: bool,
    sticky: BTreeMap<String, bool>,
    transcript: Vec<PromptRecord>,
}

impl Default for Prompter<ConsoleSource> {
    fn default() -> Self {
        Self::console()
    }
}

impl Prompter<ConsoleSource> {
    /// Interactive prompter; headless when [`NO_PROMPT_ENV`] is `1`.
    #[must_use]
    pub fn console() -> Self {
        Self::new(ConsoleSource::new(), headless_from_env())
    }
}

/// Whether the headless override is set in the process environment.
#[must_use]
pub fn headless_from_env() -> bool {
    std::env::var(NO_PROMPT_ENV).is_ok_and(|v| v == "1")
}

impl<S: PromptSource> Prompter<S> {
    /// Create a prompter over `source`.
    #[must_use]
    pub fn new(source: S, headless: bool) -> Self {
        Self {
            source,
            headless,
            sticky: BTreeMap::new(),
            transcript: Vec::new(),
        }
    }

    /// Whether the prompter is headless.
    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// The decisions taken so far, in order.
    #[must_use]
    pub fn transcript(&self) -> &[PromptRecord] {
        &self.transcript
    }

    /// Consume the prompter, returning its transcript.
    #[must_use]
    pub fn into_transcript(self) -> Vec<PromptRecord> {
        self.transcript
    }

    /// Ask `prompt` if `applicable`, returning the decision.
    ///
    /// Inapplicable prompts return their default without asking and
    /// without a transcript entry. Headless mode returns the documented
    /// default instantly. An `always` answer is remembered for the
    /// remainder of the conversion under the prompt's key.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Cancelled`] when the user answers `quit`.
    pub fn confirm_when(&mut self, applicable: bool, prompt: &Prompt) -> Result<bool, PromptError> {
        if !applicable {
            return Ok(prompt.default);
        }
        if let Some(&accepted) = self.sticky.get(&prompt.key) {
            return Ok(accepted);
        }
        let (accepted, headless) = if self.headless {
            (prompt.default, true)
        } else {
            match self.source.ask(prompt)? {
                Answer::Yes => (true, false),
                Answer::No => (false, false),
                Answer::Always => {
                    self.sticky.insert(prompt.key.clone(), true);
                    (true, false)
                }
                Answer::Quit => {
                    return Err(PromptError::Cancelled {
                        key: prompt.key.clone(),
                    });
                }
            }
        };
        self.transcript.push(PromptRecord {
            key: prompt.key.clone(),
            question: prompt.question.clone(),
            accepted,
            headless,
        });
        Ok(accepted)
    }

    /// [`confirm_when`](Self::confirm_when) with `applicable = true`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Cancelled`] when the user answers `quit`.
    pub fn confirm(&mut self, prompt: &Prompt) -> Result<bool, PromptError> {
        self.confirm_when(true, prompt)
    }
}
