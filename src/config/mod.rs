/*!
 * Trace2 Configuration
 *
 * Sink targets and delivery tuning, read from the environment or set
 * explicitly through builder methods
 */

use crate::core::errors::Trace2Error;
use crate::core::limits::{
    BUG_EXIT_CODE, DEFAULT_MAX_WRITE_ATTEMPTS, EVENT_TARGET_ENV, NORMAL_TARGET_ENV,
    PERF_TARGET_ENV,
};
use crate::core::types::{ExitCode, Trace2Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where one output format is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Stderr,
    /// Append to a single file shared by every process in the tree
    File(PathBuf),
    /// One file per process, named after its SID
    Directory(PathBuf),
}

impl Target {
    /// Parse an environment value
    ///
    /// `Ok(None)` means the format is explicitly disabled.
    pub fn parse(raw: &str) -> Trace2Result<Option<Target>> {
        let value = raw.trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => return Ok(None),
            "1" | "2" | "true" | "yes" | "on" => return Ok(Some(Target::Stderr)),
            _ => {}
        }

        let path = Path::new(value);
        if !path.is_absolute() {
            return Err(Trace2Error::InvalidTarget(value.to_string()));
        }
        if path.is_dir() {
            Ok(Some(Target::Directory(path.to_path_buf())))
        } else {
            Ok(Some(Target::File(path.to_path_buf())))
        }
    }
}

/// Trace2 configuration
#[derive(Debug, Clone)]
pub struct Trace2Config {
    /// JSON-lines event target
    pub event: Option<Target>,
    /// Human-readable target
    pub normal: Option<Target>,
    /// Columnar performance target
    pub perf: Option<Target>,
    /// Attempts per event before a sink is disabled
    pub max_write_attempts: u32,
    /// Exit code of the fatal bug paths
    pub bug_exit_code: ExitCode,
}

impl Default for Trace2Config {
    fn default() -> Self {
        Self {
            event: None,
            normal: None,
            perf: None,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            bug_exit_code: BUG_EXIT_CODE,
        }
    }
}

impl Trace2Config {
    /// Configuration with every target disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Read targets from `TRACE2_EVENT`, `TRACE2_NORMAL` and `TRACE2_PERF`
    ///
    /// Unusable values are logged and treated as disabled.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read targets through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> Option<Target> {
            let raw = lookup(key)?;
            match Target::parse(&raw) {
                Ok(target) => target,
                Err(e) => {
                    warn!(variable = key, error = %e, "ignoring trace2 target");
                    None
                }
            }
        };

        Self {
            event: read(EVENT_TARGET_ENV),
            normal: read(NORMAL_TARGET_ENV),
            perf: read(PERF_TARGET_ENV),
            ..Self::default()
        }
    }

    pub fn with_event_target(mut self, target: Target) -> Self {
        self.event = Some(target);
        self
    }

    pub fn with_normal_target(mut self, target: Target) -> Self {
        self.normal = Some(target);
        self
    }

    pub fn with_perf_target(mut self, target: Target) -> Self {
        self.perf = Some(target);
        self
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn with_bug_exit_code(mut self, code: ExitCode) -> Self {
        self.bug_exit_code = code;
        self
    }

    /// True when at least one target is configured
    pub fn is_enabled(&self) -> bool {
        self.event.is_some() || self.normal.is_some() || self.perf.is_some()
    }
}
