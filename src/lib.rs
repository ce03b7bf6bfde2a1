//! Constant-memory metric distributions and a self-healing carbon reporter.
//!
//! A [`Distribution`] aggregates a stream of values into a fixed-size reservoir sample, and
//! [`Distribution::read_meter`] turns the current generation into a [`Snapshot`] of count,
//! percentiles, min and max.  Snapshots are shipped to carbon plaintext listeners by a
//! [`CarbonHandler`], which keeps its connections alive on its own.
mod carbon;
mod clock;
mod configuration;
mod data;
mod error;

pub use self::{
    carbon::{backoff_delay, CarbonHandler},
    clock::{Clock, ClockSource, Mock},
    configuration::{Configuration, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_CONN_DELAY},
    data::{Distribution, Snapshot, DEFAULT_DISTRIBUTION_SIZE},
    error::CarbonError,
};
