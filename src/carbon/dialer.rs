use crate::error::CarbonError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{info, warn};
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A freshly established connection, handed from a dialer to the control loop.
pub(crate) struct Ready {
    pub(crate) url: String,
    pub(crate) conn: TcpStream,
}

/// Delay to wait out before the given connection attempt.
///
/// Grows by two seconds per failed attempt and is capped at `max_delay`.  The first attempt
/// (`attempts == 0`) goes out immediately.
pub fn backoff_delay(attempts: u32, max_delay: Duration) -> Duration {
    let delay = Duration::from_secs(u64::from(attempts).saturating_mul(2));
    delay.min(max_delay)
}

/// Opens a TCP connection to `url`, trying every address it resolves to.
///
/// Each address gets at most `timeout` to connect.
pub(crate) fn dial(url: &str, timeout: Duration) -> Result<TcpStream, CarbonError> {
    let mut last_err = None;
    for addr in url.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(conn) => return Ok(conn),
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => CarbonError::Io(e),
        None => CarbonError::Unresolvable(url.to_owned()),
    })
}

/// Background task connecting a single destination.
///
/// Retries until a connection is established, hands it to the control loop and exits.  A dialer
/// also exits once its handler is gone, which it notices through `shutdown` disconnecting.
pub(crate) struct Dialer {
    url: String,
    timeout: Duration,
    max_delay: Duration,
    ready_tx: Sender<Ready>,
    shutdown: Receiver<()>,
}

impl Dialer {
    pub(crate) fn new(
        url: String, timeout: Duration, max_delay: Duration, ready_tx: Sender<Ready>, shutdown: Receiver<()>,
    ) -> Dialer {
        Dialer {
            url,
            timeout,
            max_delay,
            ready_tx,
            shutdown,
        }
    }

    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("carbon-dial-{}", self.url))
            .spawn(move || self.run())
    }

    fn run(self) {
        let mut attempts: u32 = 0;
        loop {
            if !self.wait(attempts) {
                return;
            }

            match dial(&self.url, self.timeout) {
                Ok(conn) => {
                    info!("connected to '{}'", self.url);
                    // Fails only when the control loop is gone, taking the connection with it.
                    let _ = self.ready_tx.send(Ready { url: self.url, conn });
                    return;
                },
                Err(e) => warn!("unable to connect to '{}': {}", self.url, e),
            }

            attempts = attempts.saturating_add(1);
        }
    }

    /// Sleeps out the backoff for the given attempt.
    ///
    /// Returns `false` if the handler went away in the meantime.
    fn wait(&self, attempts: u32) -> bool {
        let delay = backoff_delay(attempts, self.max_delay);
        match self.shutdown.recv_timeout(delay) {
            Err(RecvTimeoutError::Disconnected) => false,
            Err(RecvTimeoutError::Timeout) | Ok(()) => true,
        }
    }
}
