//! Provider configuration.
//!
//! [`ProviderOptions`] is passed to
//! [`ServiceCollection::build_with_options`](crate::ServiceCollection::build_with_options).
//! With the `config` feature enabled the options can also be loaded from JSON
//! and overridden from the environment.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::DiError;
#[cfg(feature = "config")]
use crate::error::DiResult;

/// Default maximum resolution depth.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// What happens when a Scoped service is resolved from the root provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum RootScopedPolicy {
    /// Fail with [`DiError::WrongLifetime`].
    #[default]
    Reject,
    /// Treat the root as a scope that lives as long as the provider: one
    /// instance, cached and disposed like a singleton.
    RootSingleton,
}

impl fmt::Display for RootScopedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootScopedPolicy::Reject => write!(f, "reject"),
            RootScopedPolicy::RootSingleton => write!(f, "root_singleton"),
        }
    }
}

impl FromStr for RootScopedPolicy {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(RootScopedPolicy::Reject),
            "root_singleton" | "root-singleton" | "singleton" => Ok(RootScopedPolicy::RootSingleton),
            other => Err(DiError::Config(format!("unknown root scoped policy `{}`", other))),
        }
    }
}

/// Options fixed when a provider is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Longest chain of nested resolutions before failing with
    /// [`DiError::DepthExceeded`].
    pub max_depth: usize,
    pub root_scoped: RootScopedPolicy,
    /// Log a warning when the last provider handle drops with root-owned
    /// instances still awaiting teardown.
    pub warn_on_undisposed: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            root_scoped: RootScopedPolicy::Reject,
            warn_on_undisposed: true,
        }
    }
}

impl ProviderOptions {
    /// Sets [`max_depth`](Self::max_depth). Zero is raised to one so that
    /// top-level requests always resolve.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn with_root_scoped(mut self, policy: RootScopedPolicy) -> Self {
        self.root_scoped = policy;
        self
    }

    pub fn with_warn_on_undisposed(mut self, warn: bool) -> Self {
        self.warn_on_undisposed = warn;
        self
    }
}

#[cfg(feature = "config")]
impl ProviderOptions {
    /// Environment variable overriding [`max_depth`](Self::max_depth).
    pub const ENV_MAX_DEPTH: &'static str = "JOBSCOPE_MAX_DEPTH";
    /// Environment variable overriding [`root_scoped`](Self::root_scoped).
    pub const ENV_ROOT_SCOPED: &'static str = "JOBSCOPE_ROOT_SCOPED";
    /// Environment variable overriding [`warn_on_undisposed`](Self::warn_on_undisposed).
    pub const ENV_WARN_ON_UNDISPOSED: &'static str = "JOBSCOPE_WARN_ON_UNDISPOSED";

    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> DiResult<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| DiError::Config(format!("invalid provider options: {}", e)))?;
        if options.max_depth == 0 {
            return Err(DiError::Config("invalid provider options: max_depth must be positive".to_string()));
        }
        Ok(options)
    }

    /// Reads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> DiResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DiError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Applies `JOBSCOPE_*` environment variables on top of these options.
    pub fn with_env_overrides(self) -> DiResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(Self::ENV_MAX_DEPTH) {
            self.max_depth = value
                .trim()
                .parse()
                .ok()
                .filter(|depth: &usize| *depth > 0)
                .ok_or_else(|| {
                    DiError::Config(format!("{} must be a positive integer, got `{}`", Self::ENV_MAX_DEPTH, value))
                })?;
        }
        if let Some(value) = lookup(Self::ENV_ROOT_SCOPED) {
            self.root_scoped = value.parse()?;
        }
        if let Some(value) = lookup(Self::ENV_WARN_ON_UNDISPOSED) {
            self.warn_on_undisposed = value.trim().parse().map_err(|_| {
                DiError::Config(format!(
                    "{} must be `true` or `false`, got `{}`",
                    Self::ENV_WARN_ON_UNDISPOSED,
                    value
                ))
            })?;
        }
        Ok(self)
    }
}
