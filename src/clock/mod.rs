use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

mod mock;
pub use self::mock::Mock;

/// A source of wall-clock time, in whole seconds since the unix epoch.
pub trait ClockSource {
    fn now(&self) -> u64;
}

impl<T: ClockSource> ClockSource for Arc<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Wall-clock source backed by the system realtime clock.
#[derive(Clone, Copy, Default)]
pub struct Realtime;

impl ClockSource for Realtime {
    fn now(&self) -> u64 {
        // A clock set before the epoch is reported as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Clone)]
enum Source {
    Realtime(Realtime),
    Mock(Arc<Mock>),
}

/// Timestamp provider for the lines written to carbon.
///
/// `Clock` is cheap to clone; all clones of a mocked clock observe the same `Mock`.
#[derive(Clone)]
pub struct Clock {
    source: Source,
}

impl Clock {
    /// Creates a clock reading the system realtime clock.
    pub fn new() -> Clock {
        Clock {
            source: Source::Realtime(Realtime),
        }
    }

    /// Creates a clock driven by a `Mock`, returning both.
    ///
    /// The mock handle can be advanced independently of the clock, which is handy for asserting
    /// on the timestamps written to the wire.
    pub fn mock(offset: u64) -> (Clock, Arc<Mock>) {
        let mock = Arc::new(Mock::new(offset));
        let clock = Clock {
            source: Source::Mock(mock.clone()),
        };

        (clock, mock)
    }

    pub fn now(&self) -> u64 {
        match self.source {
            Source::Realtime(ref rt) => rt.now(),
            Source::Mock(ref mock) => mock.now(),
        }
    }
}

impl Default for Clock {
    fn default() -> Clock { Clock::new() }
}
