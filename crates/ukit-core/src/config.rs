#![forbid(unsafe_code)]

//! Observable runtime settings.
//!
//! Settings come from the environment once per process
//! ([`ObservableConfig::global`]) or are built explicitly. Lookup goes
//! through a caller-supplied function so tests never touch the real
//! environment.
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `UKIT_DISPATCH_POLICY` | `abort`, `isolate` | `abort` |
//! | `UKIT_PLATFORM_EVENTS` | `1/true/yes/on`, `0/false/no/off` | on |
//!
//! Unrecognized values keep the default.

use std::sync::OnceLock;

/// What `trigger` does when a callback fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Stop at the first failure and return it; later callbacks in the
    /// same dispatch do not run.
    #[default]
    Abort,
    /// Run every callback, then report all failures together.
    Isolate,
}

impl DispatchPolicy {
    /// Parse a policy name (case-insensitive, surrounding whitespace ignored).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "isolate" => Some(Self::Isolate),
            _ => None,
        }
    }
}

/// Settings consumed by observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservableConfig {
    pub dispatch: DispatchPolicy,
    /// When false, observables never attach to the platform and act as
    /// pure in-process event buses.
    pub platform_events: bool,
}

impl Default for ObservableConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchPolicy::Abort,
            platform_events: true,
        }
    }
}

#[inline]
fn env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ObservableConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dispatch: DispatchPolicy::Abort,
            platform_events: true,
        }
    }

    #[must_use]
    pub const fn dispatch(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch = policy;
        self
    }

    #[must_use]
    pub const fn platform_events(mut self, enabled: bool) -> Self {
        self.platform_events = enabled;
        self
    }

    /// Build from a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(policy) = get_env("UKIT_DISPATCH_POLICY")
            .as_deref()
            .and_then(DispatchPolicy::parse)
        {
            config.dispatch = policy;
        }
        if let Some(enabled) = get_env("UKIT_PLATFORM_EVENTS").as_deref().and_then(env_flag) {
            config.platform_events = enabled;
        }
        config
    }

    /// Build from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Process-wide settings, read from the environment on first use.
    #[must_use]
    pub fn global() -> Self {
        static GLOBAL: OnceLock<ObservableConfig> = OnceLock::new();
        *GLOBAL.get_or_init(Self::from_env)
    }
}
