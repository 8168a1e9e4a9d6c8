//! Centralized configuration (environment variables + defaults).
//!
//! Read once at process start; nothing here is reloaded at runtime.

use crate::domain::substitution::DEFAULT_POSITIONAL_CAPACITY;
use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BACKEND_SUBJECT: &str = "magic-mix.app";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Message bus connection string must be provided (no default).
pub fn bus_url() -> anyhow::Result<String> {
    std::env::var("BUS_URL").context("BUS_URL must be set")
}

/// Address the dispatcher HTTP server binds to.
pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

/// Optional registry document; the built-in catalog is used when unset.
pub fn registry_path() -> Option<PathBuf> {
    std::env::var("REGISTRY_PATH").ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// How view placeholders reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubstitutionMode {
    /// Values are spliced into the query text.
    #[default]
    Splice,
    /// Placeholders become `$n` markers; values travel separately for binding.
    Bind,
}

impl std::str::FromStr for SubstitutionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "splice" => Ok(SubstitutionMode::Splice),
            "bind" => Ok(SubstitutionMode::Bind),
            other => Err(anyhow::anyhow!("unknown substitution mode '{}' (expected splice|bind)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Subject the backend executor listens on.
    pub backend_subject: String,
    /// Hard upper bound for one backend call.
    pub backend_timeout: Duration,
    pub positional_capacity: usize,
    pub substitution_mode: SubstitutionMode,
    pub reject_expired_tokens: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            backend_subject: DEFAULT_BACKEND_SUBJECT.to_string(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS),
            positional_capacity: DEFAULT_POSITIONAL_CAPACITY,
            substitution_mode: SubstitutionMode::Splice,
            reject_expired_tokens: false,
        }
    }
}

impl DispatcherConfig {
    /// Builds the dispatcher configuration from environment variables.
    ///
    /// - `BACKEND_SUBJECT` (default `magic-mix.app`)
    /// - `BACKEND_TIMEOUT_SECS` (default 600)
    /// - `DISPATCH_POSITIONAL_CAPACITY` (default 4)
    /// - `DISPATCH_SUBSTITUTION` (`splice` | `bind`, default `splice`)
    /// - `DISPATCH_REJECT_EXPIRED_TOKENS` (default false)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let backend_subject = std::env::var("BACKEND_SUBJECT").unwrap_or(defaults.backend_subject);

        let backend_timeout = match std::env::var("BACKEND_TIMEOUT_SECS") {
            Ok(v) => {
                let secs = v
                    .parse::<u64>()
                    .context("BACKEND_TIMEOUT_SECS must be a valid u64")?;
                Duration::from_secs(secs.max(1))
            }
            Err(_) => defaults.backend_timeout,
        };

        let positional_capacity = match std::env::var("DISPATCH_POSITIONAL_CAPACITY") {
            Ok(v) => v
                .parse::<usize>()
                .context("DISPATCH_POSITIONAL_CAPACITY must be a valid usize")?,
            Err(_) => defaults.positional_capacity,
        };

        let substitution_mode = match std::env::var("DISPATCH_SUBSTITUTION") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.substitution_mode,
        };

        let reject_expired_tokens = std::env::var("DISPATCH_REJECT_EXPIRED_TOKENS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.reject_expired_tokens);

        Ok(Self {
            backend_subject,
            backend_timeout,
            positional_capacity,
            substitution_mode,
            reject_expired_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DispatcherConfig::default();
        assert_eq!(cfg.backend_timeout, Duration::from_secs(600));
        assert_eq!(cfg.positional_capacity, 4);
        assert_eq!(cfg.substitution_mode, SubstitutionMode::Splice);
    }

    #[test]
    fn parses_substitution_mode() {
        assert_eq!("BIND".parse::<SubstitutionMode>().unwrap(), SubstitutionMode::Bind);
        assert!("interpolate".parse::<SubstitutionMode>().is_err());
    }
}
