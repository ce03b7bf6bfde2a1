use super::{
    dialer::{Dialer, Ready},
    registry::Registry,
};
use crate::{clock::Clock, configuration::Configuration, data::Snapshot};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, error, warn};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Serializes a snapshot in the carbon plaintext protocol.
///
/// Every metric becomes a `<name> <value> <timestamp>` line, all sharing `ts`.  The lines are
/// buffered and handed to `w` in a single write followed by a flush.
pub(crate) fn write_snapshot<W: Write>(mut w: W, snapshot: &Snapshot, ts: u64) -> io::Result<()> {
    let mut buf = Vec::with_capacity(snapshot.len() * 48);
    for (key, value) in snapshot.iter() {
        debug!("{} {:.6} {}", key, value, ts);
        writeln!(buf, "{} {:.6} {}", key, value, ts)?;
    }

    w.write_all(&buf)?;
    w.flush()
}

/// The control loop of a `CarbonHandler`.
///
/// Owns the connection registry and performs every write.  It is fed snapshots by the handler and
/// established connections by the dialers, and is the only place connections get installed,
/// written to or torn down.
pub(crate) struct Control {
    registry: Registry<TcpStream>,
    dial_timeout: Duration,
    max_conn_delay: Duration,
    clock: Clock,
    ready_tx: Sender<Ready>,

    // Never sent on: dialers watch for it to disconnect, which happens when the loop is dropped.
    _shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl Control {
    pub(crate) fn new(conf: &Configuration, ready_tx: Sender<Ready>) -> Control {
        let (shutdown_tx, shutdown_rx) = bounded(0);

        Control {
            registry: Registry::new(conf.destinations.iter().cloned()),
            dial_timeout: conf.dial_timeout,
            max_conn_delay: conf.max_conn_delay,
            clock: conf.clock.clone(),
            ready_tx,
            _shutdown_tx: shutdown_tx,
            shutdown_rx,
        }
    }

    /// Runs the control loop until the handler feeding it snapshots goes away.
    pub(crate) fn run(mut self, snapshots_rx: Receiver<Snapshot>, ready_rx: Receiver<Ready>) {
        for url in self.registry.urls() {
            self.spawn_dialer(&url);
        }

        loop {
            select! {
                recv(snapshots_rx) -> msg => match msg {
                    Ok(snapshot) => self.send(&snapshot),
                    Err(_) => break,
                },
                recv(ready_rx) -> msg => {
                    if let Ok(ready) = msg {
                        self.install(ready);
                    }
                },
            }
        }

        debug!("carbon control loop stopped");
    }

    /// Writes the snapshot to every live destination, retiring the ones that fail.
    fn send(&mut self, snapshot: &Snapshot) {
        let ts = self.clock.now();

        let mut failed = Vec::new();
        for (url, conn) in self.registry.live_mut() {
            if let Err(e) = write_snapshot(conn, snapshot, ts) {
                error!("error when sending to '{}': {}", url, e);
                failed.push(url.to_owned());
            }
        }

        for url in failed {
            self.reconnect(&url);
        }
    }

    fn install(&mut self, ready: Ready) {
        // A peer that stops reading must fail the write instead of stalling the loop.
        if let Err(e) = ready.conn.set_write_timeout(Some(self.dial_timeout)) {
            warn!("unable to set write timeout for '{}': {}", ready.url, e);
        }

        if let Some(previous) = self.registry.install(ready.url, ready.conn) {
            let _ = previous.shutdown(Shutdown::Both);
        }
    }

    /// Tears down the connection to `url`, if any, and starts dialing it again.
    fn reconnect(&mut self, url: &str) {
        if let Some(conn) = self.registry.clear(url) {
            let _ = conn.shutdown(Shutdown::Both);
        }

        self.spawn_dialer(url);
    }

    fn spawn_dialer(&self, url: &str) {
        let dialer = Dialer::new(
            url.to_owned(),
            self.dial_timeout,
            self.max_conn_delay,
            self.ready_tx.clone(),
            self.shutdown_rx.clone(),
        );

        if let Err(e) = dialer.spawn() {
            error!("unable to start dialer for '{}': {}", url, e);
        }
    }
}
