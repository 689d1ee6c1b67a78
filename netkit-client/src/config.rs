//! Call-level configuration.
//!
//! This module contains:
//! - [`RetryPolicy`]: Backoff, jitter and the ordered retry rule chain
//! - [`Interceptor`]: Request/response hooks run on every attempt

mod interceptor;
mod retry;

pub(crate) use interceptor::millis;
pub use interceptor::{
    FnInterceptor, HeaderInterceptor, Interceptor, InterceptorChain, LoggingInterceptor,
};
pub use retry::{
    ConnectivityRule, FnRule, JitterRange, RetryConfigError, RetryConfiguration, RetryDecision,
    RetryPolicy, RetryRule, RuleVerdict, ServerErrorRule, default_rules, defaults,
};
