//! Rounding configuration
//!
//! The rounding policy is fixed at load time, like a hardware config
//! register. Build a [`RoundingConfig`] once at startup and pass it into
//! every rescale call.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{FixedPointError, Result};

/// Environment variable selecting the rounding mode (`SR` or `EV`)
pub const ROUND_MODE_ENV: &str = "QSCALE_ROUND_MODE";

/// Environment variable enabling per-call rescale dumps
pub const DEBUG_ENV: &str = "QSCALE_ROUND_DEBUG";

/// Rounding policy for scale-based rescaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoundingMode {
    /// Double-precision multiply, round half away from zero
    #[default]
    DoubleRound,
    /// Power-of-two normalized multiply, stored, then rounded after the divide
    SingleRound,
    /// 15-bit mantissa, 64-bit product, round-half-to-even shift
    EvRound,
}

impl RoundingMode {
    /// Parse a configuration token (`"SR"` or `"EV"`).
    ///
    /// The default mode has no token; anything other than the two
    /// recognized values is an error.
    pub fn from_token(token: &str) -> Result<Self> {
        match token.trim() {
            "SR" => Ok(Self::SingleRound),
            "EV" => Ok(Self::EvRound),
            other => Err(FixedPointError::UnknownRoundingMode(other.to_string())),
        }
    }

    /// Short name used in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubleRound => "DR",
            Self::SingleRound => "SR",
            Self::EvRound => "EV",
        }
    }
}

impl std::fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounding policy for the pre-factored multiplier path
///
/// This path has no single-round variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MultiplierRoundingMode {
    /// Delegate to the baseline quantized-multiplier routine
    #[default]
    DoubleRound,
    /// Re-derive mantissa/shift from the raw scale, round half to even
    EvRound,
}

impl From<RoundingMode> for MultiplierRoundingMode {
    fn from(mode: RoundingMode) -> Self {
        match mode {
            RoundingMode::EvRound => Self::EvRound,
            RoundingMode::DoubleRound | RoundingMode::SingleRound => Self::DoubleRound,
        }
    }
}

impl std::fmt::Display for MultiplierRoundingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DoubleRound => f.write_str("DR"),
            Self::EvRound => f.write_str("EV"),
        }
    }
}

/// Rescale configuration, resolved once and threaded through callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundingConfig {
    /// Rounding mode for scale-based rescaling
    pub mode: RoundingMode,
    /// Emit per-call rescale dumps
    pub debug: bool,
}

impl RoundingConfig {
    /// Create a config with the given mode and dumps disabled
    pub fn new(mode: RoundingMode) -> Self {
        Self { mode, debug: false }
    }

    /// Enable or disable per-call dumps
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Mode used by the pre-factored multiplier path
    pub fn multiplier_mode(&self) -> MultiplierRoundingMode {
        self.mode.into()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary key lookup.
    ///
    /// An unrecognized mode token logs one warning and falls back to
    /// [`RoundingMode::DoubleRound`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup(ROUND_MODE_ENV) {
            None => RoundingMode::DoubleRound,
            Some(token) => RoundingMode::from_token(&token).unwrap_or_else(|e| {
                tracing::warn!(
                    variable = ROUND_MODE_ENV,
                    error = %e,
                    "Falling back to DoubleRound"
                );
                RoundingMode::DoubleRound
            }),
        };

        let debug = lookup(DEBUG_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Self { mode, debug }
    }

    /// Process-wide configuration, read from the environment on first use.
    ///
    /// Later changes to the environment have no effect.
    pub fn global() -> &'static RoundingConfig {
        static GLOBAL: OnceLock<RoundingConfig> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = Self::from_env();
            tracing::debug!(mode = %config.mode, debug = config.debug, "Rounding config resolved");
            config
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_unset_is_double_round() {
        let config = RoundingConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.mode, RoundingMode::DoubleRound);
        assert!(!config.debug);
    }

    #[test]
    fn test_recognized_tokens() {
        let config = RoundingConfig::from_lookup(lookup_from(&[(ROUND_MODE_ENV, "SR")]));
        assert_eq!(config.mode, RoundingMode::SingleRound);

        let config = RoundingConfig::from_lookup(lookup_from(&[(ROUND_MODE_ENV, "EV")]));
        assert_eq!(config.mode, RoundingMode::EvRound);
    }

    #[test]
    fn test_unrecognized_token_falls_back() {
        let config = RoundingConfig::from_lookup(lookup_from(&[(ROUND_MODE_ENV, "banker")]));
        assert_eq!(config.mode, RoundingMode::DoubleRound);
        assert_eq!(config, RoundingConfig::from_lookup(lookup_from(&[])));
    }

    /// Counts WARN events seen while installed as the default subscriber
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn count_warnings(f: impl FnOnce()) -> usize {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(count.clone()));
        tracing::subscriber::with_default(subscriber, f);
        count.load(Ordering::SeqCst)
    }

    #[test]
    fn test_unrecognized_token_warns_once() {
        let warnings = count_warnings(|| {
            let config = RoundingConfig::from_lookup(lookup_from(&[(ROUND_MODE_ENV, "banker")]));
            assert_eq!(config.mode, RoundingMode::DoubleRound);
        });
        assert_eq!(warnings, 1);

        let warnings = count_warnings(|| {
            RoundingConfig::from_lookup(lookup_from(&[]));
        });
        assert_eq!(warnings, 0);

        let warnings = count_warnings(|| {
            RoundingConfig::from_lookup(lookup_from(&[(ROUND_MODE_ENV, "EV")]));
        });
        assert_eq!(warnings, 0);
    }

    #[test]
    fn test_from_token_rejects_unknown() {
        assert!(matches!(
            RoundingMode::from_token("ev"),
            Err(FixedPointError::UnknownRoundingMode(ref t)) if t == "ev"
        ));
        assert!(RoundingMode::from_token("DR").is_err());
    }

    #[test]
    fn test_debug_flag() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            let config = RoundingConfig::from_lookup(lookup_from(&[(DEBUG_ENV, value)]));
            assert!(config.debug, "{} should enable debug", value);
        }
        for value in ["0", "false", "", "maybe"] {
            let config = RoundingConfig::from_lookup(lookup_from(&[(DEBUG_ENV, value)]));
            assert!(!config.debug, "{} should not enable debug", value);
        }
    }

    #[test]
    fn test_lookup_is_read_once_per_key() {
        use std::cell::RefCell;

        let calls = RefCell::new(Vec::new());
        let _ = RoundingConfig::from_lookup(|key| {
            calls.borrow_mut().push(key.to_string());
            None
        });
        assert_eq!(*calls.borrow(), vec![ROUND_MODE_ENV.to_string(), DEBUG_ENV.to_string()]);
    }

    #[test]
    fn test_multiplier_mode() {
        assert_eq!(
            RoundingConfig::new(RoundingMode::EvRound).multiplier_mode(),
            MultiplierRoundingMode::EvRound
        );
        assert_eq!(
            RoundingConfig::new(RoundingMode::SingleRound).multiplier_mode(),
            MultiplierRoundingMode::DoubleRound
        );
    }

    #[test]
    fn test_global_is_memoized() {
        let first = RoundingConfig::global();
        let second = RoundingConfig::global();
        assert!(std::ptr::eq(first, second));
    }
}
