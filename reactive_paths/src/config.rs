//! Runtime configuration.

use crate::error::ConfigError;
use std::{env::VarError, num::NonZeroUsize};
use typed_builder::TypedBuilder;

/// Sets [`ObserveConfig::small_cache_limit`].
pub const SMALL_CACHE_LIMIT_VAR: &str = "REACTIVE_PATHS_SMALL_CACHE_LIMIT";
/// Sets [`ObserveConfig::big_cache_limit`].
pub const BIG_CACHE_LIMIT_VAR: &str = "REACTIVE_PATHS_BIG_CACHE_LIMIT";
/// Sets [`ObserveConfig::warn_on_snapshot`].
pub const WARN_ON_SNAPSHOT_VAR: &str = "REACTIVE_PATHS_WARN_ON_SNAPSHOT";

/// The default bound of the small caches.
pub const DEFAULT_SMALL_CACHE_LIMIT: NonZeroUsize = non_zero(64);
/// The default bound of the big caches.
pub const DEFAULT_BIG_CACHE_LIMIT: NonZeroUsize = non_zero(256);

const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => panic!("cache limits must be greater than zero"),
    }
}

/// Settings of a [`PathRuntime`](crate::runtime::PathRuntime).
///
/// ```rust
/// use reactive_paths::config::ObserveConfig;
/// use std::num::NonZeroUsize;
///
/// let config = ObserveConfig::builder()
///     .big_cache_limit(NonZeroUsize::new(1024).unwrap())
///     .warn_on_snapshot(false)
///     .build();
/// assert_eq!(config.small_cache_limit.get(), 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, TypedBuilder)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct ObserveConfig {
    /// Bound of the per-type member table cache.
    #[builder(default = DEFAULT_SMALL_CACHE_LIMIT)]
    pub small_cache_limit: NonZeroUsize,
    /// Bound of the accessor caches and of the provider resolution cache.
    #[builder(default = DEFAULT_BIG_CACHE_LIMIT)]
    pub big_cache_limit: NonZeroUsize,
    /// Whether the snapshot provider warns about types observed without
    /// change notification.
    #[builder(default = true)]
    pub warn_on_snapshot: bool,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ObserveConfig {
    /// The default configuration, overridden by the `REACTIVE_PATHS_*`
    /// environment variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(limit) = env_limit(SMALL_CACHE_LIMIT_VAR)? {
            config.small_cache_limit = limit;
        }
        if let Some(limit) = env_limit(BIG_CACHE_LIMIT_VAR)? {
            config.big_cache_limit = limit;
        }
        if let Some(value) = env_wo_default(WARN_ON_SNAPSHOT_VAR)? {
            config.warn_on_snapshot = bool_from_str(WARN_ON_SNAPSHOT_VAR, &value)?;
        }
        Ok(config)
    }
}

fn env_wo_default(var: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(var) {
        Ok(val) => Ok(Some(val)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { var }),
    }
}

fn env_limit(var: &'static str) -> Result<Option<NonZeroUsize>, ConfigError> {
    let Some(value) = env_wo_default(var)? else {
        return Ok(None);
    };
    let limit: usize =
        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value: value.clone(),
            expected: "a positive integer",
        })?;
    NonZeroUsize::new(limit)
        .map(Some)
        .ok_or(ConfigError::ZeroCapacity { var })
}

fn bool_from_str(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        bool_from_str, ObserveConfig, BIG_CACHE_LIMIT_VAR,
        SMALL_CACHE_LIMIT_VAR, WARN_ON_SNAPSHOT_VAR,
    };
    use crate::error::ConfigError;

    const VARS: [&str; 3] =
        [SMALL_CACHE_LIMIT_VAR, BIG_CACHE_LIMIT_VAR, WARN_ON_SNAPSHOT_VAR];

    #[test]
    fn defaults() {
        let config = ObserveConfig::default();
        assert_eq!(config.small_cache_limit.get(), 64);
        assert_eq!(config.big_cache_limit.get(), 256);
        assert!(config.warn_on_snapshot);
    }

    #[test]
    fn from_env_without_vars_is_default() {
        temp_env::with_vars_unset(VARS, || {
            assert_eq!(ObserveConfig::from_env(), Ok(ObserveConfig::default()));
        });
    }

    #[test]
    fn from_env_overrides() {
        temp_env::with_vars(
            [
                (SMALL_CACHE_LIMIT_VAR, Some("8")),
                (BIG_CACHE_LIMIT_VAR, Some(" 512 ")),
                (WARN_ON_SNAPSHOT_VAR, Some("off")),
            ],
            || {
                let config = ObserveConfig::from_env().unwrap();
                assert_eq!(config.small_cache_limit.get(), 8);
                assert_eq!(config.big_cache_limit.get(), 512);
                assert!(!config.warn_on_snapshot);
            },
        );
    }

    #[test]
    fn from_env_rejects_bad_values() {
        temp_env::with_vars(
            [
                (SMALL_CACHE_LIMIT_VAR, Some("0")),
                (BIG_CACHE_LIMIT_VAR, None),
                (WARN_ON_SNAPSHOT_VAR, None),
            ],
            || {
                assert_eq!(
                    ObserveConfig::from_env(),
                    Err(ConfigError::ZeroCapacity {
                        var: SMALL_CACHE_LIMIT_VAR
                    })
                );
            },
        );
        temp_env::with_vars(
            [
                (SMALL_CACHE_LIMIT_VAR, None),
                (BIG_CACHE_LIMIT_VAR, Some("lots")),
                (WARN_ON_SNAPSHOT_VAR, None),
            ],
            || {
                assert!(matches!(
                    ObserveConfig::from_env(),
                    Err(ConfigError::InvalidValue { var, .. })
                        if var == BIG_CACHE_LIMIT_VAR
                ));
            },
        );
    }

    #[test]
    fn bool_spellings() {
        for yes in ["1", "true", "TRUE", "yes", "on"] {
            assert_eq!(bool_from_str("X", yes), Ok(true));
        }
        for no in ["0", "false", "No", "off"] {
            assert_eq!(bool_from_str("X", no), Ok(false));
        }
        assert!(bool_from_str("X", "maybe").is_err());
    }
}
