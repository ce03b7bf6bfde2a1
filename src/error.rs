use std::io;
use thiserror::Error;

/// Errors raised while configuring or connecting a `CarbonHandler`.
#[derive(Debug, Error)]
pub enum CarbonError {
    /// The handler was built without a single destination to report to.
    #[error("no URL configured")]
    NoDestinations,

    /// The destination did not resolve to any socket address.
    #[error("no address found for '{0}'")]
    Unresolvable(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
