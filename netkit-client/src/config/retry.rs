//! Retry policy with exponential backoff and a pluggable rule chain.
//!
//! # Overview
//!
//! The retry system consists of:
//! - [`RetryConfiguration`]: Budget and backoff settings (value object)
//! - [`RetryRule`]: Classifies an error as retryable, non-retryable, or no opinion
//! - [`RetryPolicy`]: Combines both and answers [`RetryPolicy::decide`]
//!
//! # Example
//!
//! ```
//! use netkit_client::{RetryDecision, RetryPolicy};
//! use netkit_core::NetworkError;
//!
//! let policy = RetryPolicy::default(); // 3 retries, 1s base, 30s ceiling
//!
//! let decision = policy.decide(&NetworkError::http(503, ""), 1);
//! assert!(matches!(decision, RetryDecision::RetryAfter(_)));
//!
//! let decision = policy.decide(&NetworkError::http(404, ""), 1);
//! assert_eq!(decision, RetryDecision::Stop);
//! ```
//!
//! # Backoff
//!
//! The delay before retrying attempt `n` is `base_delay * 2^(n-1)`, clamped
//! to `max_delay`, plus a jitter of `u * delay` where `u` is drawn uniformly
//! from the configured [`JitterRange`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use netkit_core::NetworkError;
use serde::{Deserialize, Serialize};

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Default maximum number of retries (not counting the first attempt).
    pub const MAX_RETRIES: u32 = 3;

    /// Default delay before the first retry.
    pub const BASE_DELAY: Duration = Duration::from_secs(1);

    /// Default ceiling for the un-jittered delay.
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    /// Default lower bound of the jitter fraction.
    pub const JITTER_LOW: f64 = 0.1;

    /// Default upper bound of the jitter fraction.
    pub const JITTER_HIGH: f64 = 0.3;
}

/// Invalid retry configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RetryConfigError {
    #[error("base_delay must be greater than zero")]
    ZeroBaseDelay,
    #[error("base_delay must not exceed max_delay")]
    BaseExceedsMax,
    #[error("jitter range must satisfy 0 <= low <= high")]
    InvalidJitter,
}

/// Fractional jitter bounds, `0 <= low <= high`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JitterRange {
    pub low: f64,
    pub high: f64,
}

impl JitterRange {
    /// Create a jitter range.
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// No jitter.
    pub fn none() -> Self {
        Self::new(0.0, 0.0)
    }

    fn is_valid(&self) -> bool {
        self.low >= 0.0 && self.low <= self.high && self.high.is_finite()
    }

    fn sample(&self) -> f64 {
        if self.high <= self.low {
            return self.low;
        }
        self.low + rand::random::<f64>() * (self.high - self.low)
    }
}

impl Default for JitterRange {
    fn default() -> Self {
        Self::new(defaults::JITTER_LOW, defaults::JITTER_HIGH)
    }
}

/// Retry budget and backoff settings.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `base_delay`: 1 second
/// - `max_delay`: 30 seconds
/// - `jitter`: `[0.1, 0.3]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfiguration {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling for the un-jittered delay.
    pub max_delay: Duration,
    /// Jitter fraction added on top of the clamped delay.
    pub jitter: JitterRange,
}

impl Default for RetryConfiguration {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::BASE_DELAY,
            max_delay: defaults::MAX_DELAY,
            jitter: JitterRange::default(),
        }
    }
}

impl RetryConfiguration {
    /// Create a validated configuration.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: JitterRange,
    ) -> Result<Self, RetryConfigError> {
        let config = Self {
            max_retries,
            base_delay,
            max_delay,
            jitter,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay ceiling.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter range.
    pub fn jitter(mut self, jitter: JitterRange) -> Self {
        self.jitter = jitter;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.base_delay.is_zero() {
            return Err(RetryConfigError::ZeroBaseDelay);
        }
        if self.base_delay > self.max_delay {
            return Err(RetryConfigError::BaseExceedsMax);
        }
        if !self.jitter.is_valid() {
            return Err(RetryConfigError::InvalidJitter);
        }
        Ok(())
    }
}

/// What to do after a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then retry.
    RetryAfter(Duration),
    /// Surface the error.
    Stop,
    /// Retry without sleeping.
    RetryImmediately,
}

/// A rule's opinion about one error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleVerdict {
    /// Retry with backoff.
    Retry,
    /// Do not retry.
    NoRetry,
    /// No opinion; ask the next rule.
    Pass,
    /// Retry without backoff. None of the built-in rules return this; it is
    /// meant for rules that know the server wants an immediate retry, such as
    /// one reading `Retry-After: 0`.
    RetryImmediately,
}

/// Classifies errors for the retry policy.
///
/// Rules are consulted in order and the first verdict other than
/// [`RuleVerdict::Pass`] wins.
pub trait RetryRule: Send + Sync {
    /// Classify `error`.
    fn classify(&self, error: &NetworkError) -> RuleVerdict;
}

/// Retries transient connection failures.
///
/// Connection errors of other kinds (TLS, invalid request) are not retried.
/// Non-connection errors pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectivityRule;

impl RetryRule for ConnectivityRule {
    fn classify(&self, error: &NetworkError) -> RuleVerdict {
        match error {
            NetworkError::Connection { kind, .. } if kind.is_transient() => RuleVerdict::Retry,
            NetworkError::Connection { .. } => RuleVerdict::NoRetry,
            _ => RuleVerdict::Pass,
        }
    }
}

/// Retries 5xx responses and refuses every other HTTP error.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerErrorRule;

impl RetryRule for ServerErrorRule {
    fn classify(&self, error: &NetworkError) -> RuleVerdict {
        match error {
            NetworkError::Http { status, .. } if (500..600).contains(status) => RuleVerdict::Retry,
            NetworkError::Http { .. } => RuleVerdict::NoRetry,
            _ => RuleVerdict::Pass,
        }
    }
}

/// A closure-based rule.
///
/// # Example
///
/// ```
/// use netkit_client::{FnRule, RuleVerdict};
/// use netkit_core::NetworkError;
///
/// // Treat 429 as retryable.
/// let rate_limited = FnRule::new(|err: &NetworkError| match err.status() {
///     Some(429) => RuleVerdict::Retry,
///     _ => RuleVerdict::Pass,
/// });
/// ```
pub struct FnRule<F> {
    func: F,
}

impl<F> FnRule<F>
where
    F: Fn(&NetworkError) -> RuleVerdict + Send + Sync,
{
    /// Create a rule from a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> RetryRule for FnRule<F>
where
    F: Fn(&NetworkError) -> RuleVerdict + Send + Sync,
{
    fn classify(&self, error: &NetworkError) -> RuleVerdict {
        (self.func)(error)
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").finish()
    }
}

/// The built-in rule chain: connectivity first, then server errors.
pub fn default_rules() -> Vec<Arc<dyn RetryRule>> {
    vec![Arc::new(ConnectivityRule), Arc::new(ServerErrorRule)]
}

/// Decides whether and when to retry a failed attempt.
///
/// A policy is an immutable value; share one across concurrent calls by
/// wrapping it in an `Arc`.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfiguration,
    rules: Vec<Arc<dyn RetryRule>>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Default for RetryPolicy {
    /// 3 retries, 1s base delay, 30s ceiling, jitter `[0.1, 0.3]`.
    fn default() -> Self {
        Self {
            config: RetryConfiguration::default(),
            rules: default_rules(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the built-in rules.
    pub fn new(config: RetryConfiguration) -> Result<Self, RetryConfigError> {
        Self::with_rules(config, default_rules())
    }

    /// Create a policy with a custom rule chain.
    pub fn with_rules(
        config: RetryConfiguration,
        rules: Vec<Arc<dyn RetryRule>>,
    ) -> Result<Self, RetryConfigError> {
        config.validate()?;
        Ok(Self { config, rules })
    }

    /// Latency-sensitive preset: 5 retries, 0.5s base delay.
    pub fn aggressive() -> Self {
        Self {
            config: RetryConfiguration::default()
                .max_retries(5)
                .base_delay(Duration::from_millis(500)),
            rules: default_rules(),
        }
    }

    /// Background preset: 1 retry, 2s base delay.
    pub fn conservative() -> Self {
        Self {
            config: RetryConfiguration::default()
                .max_retries(1)
                .base_delay(Duration::from_secs(2)),
            rules: default_rules(),
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        Self {
            config: RetryConfiguration::default().max_retries(0),
            rules: Vec::new(),
        }
    }

    /// Append a rule after the existing ones.
    pub fn push_rule(mut self, rule: impl RetryRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Insert a rule ahead of the existing ones.
    pub fn prepend_rule(mut self, rule: impl RetryRule + 'static) -> Self {
        self.rules.insert(0, Arc::new(rule));
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &RetryConfiguration {
        &self.config
    }

    /// Maximum number of retries.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Number of rules in the chain.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify `error` through the rule chain.
    pub fn classify(&self, error: &NetworkError) -> RuleVerdict {
        self.rules
            .iter()
            .map(|rule| rule.classify(error))
            .find(|verdict| *verdict != RuleVerdict::Pass)
            .unwrap_or(RuleVerdict::NoRetry)
    }

    /// The clamped, un-jittered delay after `attempt` fails.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let delay = self.config.base_delay.as_secs_f64() * 2f64.powi(exponent);
        let clamped = delay.min(self.config.max_delay.as_secs_f64());
        saturating_secs(clamped).min(self.config.max_delay)
    }

    /// Decide what to do after `attempt` (1-based) failed with `error`.
    pub fn decide(&self, error: &NetworkError, attempt: u32) -> RetryDecision {
        if attempt < 1 || attempt > self.config.max_retries {
            return RetryDecision::Stop;
        }

        match self.classify(error) {
            RuleVerdict::Retry => {
                let delay = self.backoff_delay(attempt).as_secs_f64();
                let jittered = delay + delay * self.config.jitter.sample();
                RetryDecision::RetryAfter(saturating_secs(jittered))
            }
            RuleVerdict::RetryImmediately => RetryDecision::RetryImmediately,
            RuleVerdict::NoRetry | RuleVerdict::Pass => RetryDecision::Stop,
        }
    }
}

/// Seconds to a `Duration`, saturating at `Duration::MAX`.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netkit_core::TransportErrorKind;

    fn no_jitter(max_retries: u32, base: Duration, max: Duration) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfiguration::default()
                .max_retries(max_retries)
                .base_delay(base)
                .max_delay(max)
                .jitter(JitterRange::none()),
        )
        .unwrap()
    }

    fn server_error() -> NetworkError {
        NetworkError::http(503, "busy")
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        let config = policy.config();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.jitter, JitterRange::new(0.1, 0.3));
        assert_eq!(policy.rule_count(), 2);
    }

    #[test]
    fn test_retry_policy_presets() {
        let aggressive = RetryPolicy::aggressive();
        assert_eq!(aggressive.max_retries(), 5);
        assert_eq!(aggressive.config().base_delay, Duration::from_millis(500));

        let conservative = RetryPolicy::conservative();
        assert_eq!(conservative.max_retries(), 1);
        assert_eq!(conservative.config().base_delay, Duration::from_secs(2));

        let none = RetryPolicy::none();
        assert_eq!(none.max_retries(), 0);
        assert_eq!(none.rule_count(), 0);
    }

    #[test]
    fn test_none_always_stops() {
        let policy = RetryPolicy::none();
        for attempt in 0..5 {
            assert_eq!(policy.decide(&server_error(), attempt), RetryDecision::Stop);
        }
    }

    #[test]
    fn test_configuration_validate() {
        assert!(RetryConfiguration::default().validate().is_ok());

        let zero = RetryConfiguration::default().base_delay(Duration::ZERO);
        assert_eq!(zero.validate(), Err(RetryConfigError::ZeroBaseDelay));

        let inverted = RetryConfiguration::default()
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(1));
        assert_eq!(inverted.validate(), Err(RetryConfigError::BaseExceedsMax));

        let jitter = RetryConfiguration::default().jitter(JitterRange::new(0.5, 0.1));
        assert_eq!(jitter.validate(), Err(RetryConfigError::InvalidJitter));

        let negative = RetryConfiguration::default().jitter(JitterRange::new(-0.1, 0.1));
        assert_eq!(negative.validate(), Err(RetryConfigError::InvalidJitter));

        assert!(RetryPolicy::new(inverted).is_err());
        assert!(
            RetryConfiguration::new(
                1,
                Duration::from_secs(2),
                Duration::from_secs(1),
                JitterRange::none()
            )
            .is_err()
        );
    }

    #[test]
    fn test_configuration_deserializes_with_defaults() {
        let config: RetryConfiguration =
            serde_json::from_str(r#"{"max_retries": 7}"#).unwrap();
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.base_delay, defaults::BASE_DELAY);
        assert_eq!(config.jitter, JitterRange::default());
    }

    #[test]
    fn test_invalid_attempt_stops() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(&server_error(), 0), RetryDecision::Stop);
    }

    #[test]
    fn test_budget_exhausted_stops() {
        let policy = no_jitter(3, Duration::from_secs(1), Duration::from_secs(30));
        assert!(matches!(
            policy.decide(&server_error(), 3),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(policy.decide(&server_error(), 4), RetryDecision::Stop);
    }

    #[test]
    fn test_backoff_exponent_starts_at_zero() {
        let policy = no_jitter(5, Duration::from_secs(1), Duration::from_secs(100));
        assert_eq!(
            policy.decide(&server_error(), 1),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(&server_error(), 2),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.decide(&server_error(), 3),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
    }

    #[test]
    fn test_backoff_monotonic_and_clamped() {
        let policy = no_jitter(20, Duration::from_millis(250), Duration::from_secs(10));
        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay >= previous, "attempt {}", attempt);
            assert!(delay <= Duration::from_secs(10), "attempt {}", attempt);
            previous = delay;
        }
        assert_eq!(policy.backoff_delay(20), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let policy = no_jitter(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_within_range() {
        let policy = RetryPolicy::new(
            RetryConfiguration::default()
                .base_delay(Duration::from_secs(1))
                .jitter(JitterRange::new(0.1, 0.3)),
        )
        .unwrap();

        for _ in 0..100 {
            let RetryDecision::RetryAfter(delay) = policy.decide(&server_error(), 1) else {
                panic!("expected retry");
            };
            assert!(delay >= Duration::from_millis(1100), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1300), "{:?}", delay);
        }
    }

    #[test]
    fn test_jitter_applies_after_clamp() {
        let policy = RetryPolicy::new(
            RetryConfiguration::default()
                .max_retries(10)
                .base_delay(Duration::from_secs(1))
                .max_delay(Duration::from_secs(4))
                .jitter(JitterRange::new(0.5, 0.5)),
        )
        .unwrap();
        assert_eq!(
            policy.decide(&server_error(), 8),
            RetryDecision::RetryAfter(Duration::from_secs(6))
        );
    }

    #[test]
    fn test_huge_jitter_saturates() {
        let policy = RetryPolicy::new(
            RetryConfiguration::default().jitter(JitterRange::new(1e20, 1e20)),
        )
        .unwrap();
        assert_eq!(
            policy.decide(&server_error(), 1),
            RetryDecision::RetryAfter(Duration::MAX)
        );
    }

    #[test]
    fn test_max_delay_at_duration_max() {
        let policy = RetryPolicy::new(
            RetryConfiguration::default()
                .max_retries(u32::MAX)
                .max_delay(Duration::MAX)
                .jitter(JitterRange::new(1.0, 1.0)),
        )
        .unwrap();
        assert_eq!(policy.backoff_delay(u32::MAX), Duration::from_secs(1 << 63));
        // 2^63s doubled no longer fits in a Duration.
        assert_eq!(
            policy.decide(&server_error(), 200),
            RetryDecision::RetryAfter(Duration::MAX)
        );
    }

    #[test]
    fn test_connectivity_rule() {
        let rule = ConnectivityRule;
        for kind in [
            TransportErrorKind::ConnectionLost,
            TransportErrorKind::TimedOut,
            TransportErrorKind::DnsFailure,
            TransportErrorKind::HostUnreachable,
            TransportErrorKind::Offline,
        ] {
            let err = NetworkError::connection(kind, "x");
            assert_eq!(rule.classify(&err), RuleVerdict::Retry, "{}", kind);
        }
        let tls = NetworkError::connection(TransportErrorKind::Tls, "bad cert");
        assert_eq!(rule.classify(&tls), RuleVerdict::NoRetry);
        assert_eq!(rule.classify(&server_error()), RuleVerdict::Pass);
    }

    #[test]
    fn test_server_error_rule() {
        let rule = ServerErrorRule;
        assert_eq!(rule.classify(&NetworkError::http(500, "")), RuleVerdict::Retry);
        assert_eq!(rule.classify(&NetworkError::http(599, "")), RuleVerdict::Retry);
        assert_eq!(rule.classify(&NetworkError::http(404, "")), RuleVerdict::NoRetry);
        assert_eq!(rule.classify(&NetworkError::http(304, "")), RuleVerdict::NoRetry);
        assert_eq!(rule.classify(&NetworkError::decoding("x")), RuleVerdict::Pass);
    }

    #[test]
    fn test_all_pass_defaults_to_no_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.classify(&NetworkError::decoding("bad")), RuleVerdict::NoRetry);
        assert_eq!(
            policy.decide(&NetworkError::unknown("odd"), 1),
            RetryDecision::Stop
        );
    }

    #[test]
    fn test_rule_short_circuit() {
        let policy = RetryPolicy::with_rules(
            RetryConfiguration::default(),
            vec![
                Arc::new(FnRule::new(|_: &NetworkError| RuleVerdict::NoRetry)),
                Arc::new(FnRule::new(|_: &NetworkError| RuleVerdict::Retry)),
            ],
        )
        .unwrap();
        assert_eq!(policy.decide(&server_error(), 1), RetryDecision::Stop);
    }

    #[test]
    fn test_prepended_rule_wins() {
        let policy = RetryPolicy::default().prepend_rule(FnRule::new(|err: &NetworkError| {
            match err.status() {
                Some(429) => RuleVerdict::Retry,
                _ => RuleVerdict::Pass,
            }
        }));
        assert!(matches!(
            policy.decide(&NetworkError::http(429, ""), 1),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(policy.decide(&NetworkError::http(404, ""), 1), RetryDecision::Stop);
    }

    #[test]
    fn test_retry_immediately_verdict() {
        let policy = RetryPolicy::none()
            .push_rule(FnRule::new(|_: &NetworkError| RuleVerdict::RetryImmediately));
        // No budget: still stops.
        assert_eq!(policy.decide(&server_error(), 1), RetryDecision::Stop);

        let policy = RetryPolicy::with_rules(
            RetryConfiguration::default(),
            vec![Arc::new(FnRule::new(|_: &NetworkError| {
                RuleVerdict::RetryImmediately
            }))],
        )
        .unwrap();
        assert_eq!(
            policy.decide(&server_error(), 1),
            RetryDecision::RetryImmediately
        );
    }
}
