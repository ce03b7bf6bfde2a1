use crate::{carbon::CarbonHandler, clock::Clock, error::CarbonError};
use std::time::Duration;

/// Upper bound for a single connection attempt.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound for the delay between two connection attempts.
pub const DEFAULT_MAX_CONN_DELAY: Duration = Duration::from_secs(60);

/// A configuration builder for `CarbonHandler`.
#[derive(Clone)]
pub struct Configuration {
    pub(crate) destinations: Vec<String>,
    pub(crate) dial_timeout: Duration,
    pub(crate) max_conn_delay: Duration,
    pub(crate) clock: Clock,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            destinations: Vec::new(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            max_conn_delay: DEFAULT_MAX_CONN_DELAY,
            clock: Clock::new(),
        }
    }
}

impl Configuration {
    /// Creates a new `Configuration` with default values and no destinations.
    pub fn new() -> Configuration { Default::default() }

    /// Adds a destination to report to.
    ///
    /// Destinations are `host:port` addresses of carbon plaintext listeners.  Every destination
    /// gets its own connection, and a destination being down never affects the others.  Adding
    /// the same destination twice has no effect.
    pub fn destination<S: Into<String>>(mut self, url: S) -> Self {
        let url = url.into();
        if !self.destinations.contains(&url) {
            self.destinations.push(url);
        }
        self
    }

    /// Adds several destinations at once.
    pub fn destinations<I, S>(self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter().fold(self, |conf, url| conf.destination(url))
    }

    /// Sets the dial timeout.
    ///
    /// Defaults to `1s`.
    ///
    /// This bounds how long a single connection attempt may take before it is considered failed
    /// and the destination goes back to waiting out its backoff.
    pub fn dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    /// Sets the maximum delay between connection attempts.
    ///
    /// Defaults to `60s`.
    ///
    /// The delay grows by two seconds for every failed attempt to reach a destination, and never
    /// goes past this value.  Destinations are retried for as long as the handler lives.
    pub fn max_conn_delay(mut self, max_conn_delay: Duration) -> Self {
        self.max_conn_delay = max_conn_delay;
        self
    }

    /// Sets the clock used to timestamp reported values.
    ///
    /// Defaults to the system realtime clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Create a `CarbonHandler` based on this configuration.
    ///
    /// Fails if no destination was configured.  Nothing is started until the handler is first
    /// used.
    pub fn build(self) -> Result<CarbonHandler, CarbonError> {
        if self.destinations.is_empty() {
            return Err(CarbonError::NoDestinations);
        }

        Ok(CarbonHandler::from_config(self))
    }
}

#[cfg(test)]
mod tests {
    use super::{Configuration, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_CONN_DELAY};
    use crate::error::CarbonError;
    use std::time::Duration;

    #[test]
    fn test_configuration_defaults() {
        let conf = Configuration::new();
        assert!(conf.destinations.is_empty());
        assert_eq!(conf.dial_timeout, DEFAULT_DIAL_TIMEOUT);
        assert_eq!(conf.max_conn_delay, DEFAULT_MAX_CONN_DELAY);
    }

    #[test]
    fn test_configuration_dedupes_destinations() {
        let conf = Configuration::new()
            .destination("a:2003")
            .destinations(vec!["b:2003", "a:2003", "c:2003"])
            .dial_timeout(Duration::from_millis(250))
            .max_conn_delay(Duration::from_secs(10));

        assert_eq!(conf.destinations, vec!["a:2003", "b:2003", "c:2003"]);
        assert_eq!(conf.dial_timeout, Duration::from_millis(250));
        assert_eq!(conf.max_conn_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_configuration_requires_destination() {
        match Configuration::new().build() {
            Err(CarbonError::NoDestinations) => {},
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("handler built without destinations"),
        }
    }
}
