//! Resolver configuration.

use std::time::Duration;

/// Default delay between retiring an execution context and closing it.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(4);

/// Default interval at which a retiring context re-checks its in-flight work.
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// When a retired execution context may be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainPolicy {
    /// Close once the grace delay has elapsed, whatever is still running.
    #[default]
    FixedDelay,
    /// Close once the grace delay has elapsed and no query holds a lease.
    AwaitInFlight,
}

/// Configuration for the execution context manager.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Time a superseded context stays usable before it is closed.
    pub grace_delay: Duration,
    /// Drain behavior after the grace delay.
    pub drain_policy: DrainPolicy,
    /// Re-check interval for [`DrainPolicy::AwaitInFlight`].
    pub drain_poll_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            grace_delay: DEFAULT_GRACE_DELAY,
            drain_policy: DrainPolicy::default(),
            drain_poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
        }
    }
}

impl ContextConfig {
    pub fn with_grace_delay(mut self, delay: Duration) -> Self {
        self.grace_delay = delay;
        self
    }

    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    pub fn with_drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }
}

/// Configuration for a [`Resolver`](crate::Resolver).
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub context: ContextConfig,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grace delay for retiring execution contexts.
    pub fn with_grace_delay(mut self, delay: Duration) -> Self {
        self.context.grace_delay = delay;
        self
    }

    /// Set the drain policy for retiring execution contexts.
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.context.drain_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.context.grace_delay, Duration::from_secs(4));
        assert_eq!(config.context.drain_policy, DrainPolicy::FixedDelay);
        assert_eq!(config.context.drain_poll_interval, Duration::from_millis(25));
    }

    #[test]
    fn test_builders() {
        let config = ResolverConfig::new()
            .with_grace_delay(Duration::from_millis(50))
            .with_drain_policy(DrainPolicy::AwaitInFlight);
        assert_eq!(config.context.grace_delay, Duration::from_millis(50));
        assert_eq!(config.context.drain_policy, DrainPolicy::AwaitInFlight);
    }
}
