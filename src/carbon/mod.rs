use crate::{configuration::Configuration, data::Snapshot};
use crossbeam_channel::{bounded, Sender};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::thread;

mod control;
mod dialer;
mod registry;

use self::control::Control;
pub use self::dialer::backoff_delay;

/// Reports snapshots to one or more carbon destinations.
///
/// Each destination gets a long-lived TCP connection.  Connections are established in the
/// background, and any connection that fails a write is torn down and dialed again with a backoff
/// that grows by two seconds per failed attempt.  Snapshots are written to every destination that
/// is connected at the time, and destinations that are down simply miss them.
///
/// The handler starts lazily: the first call to `init` or `handle_meters` spawns the control loop,
/// which in turn starts dialing every destination.  Dropping the handler stops the control loop
/// and closes its connections.
pub struct CarbonHandler {
    conf: Configuration,
    control_tx: OnceCell<Sender<Snapshot>>,
}

impl CarbonHandler {
    pub(crate) fn from_config(conf: Configuration) -> CarbonHandler {
        CarbonHandler {
            conf,
            control_tx: OnceCell::new(),
        }
    }

    /// Gets a builder to configure a `CarbonHandler` instance with.
    pub fn builder() -> Configuration { Configuration::default() }

    /// The destinations this handler reports to.
    pub fn destinations(&self) -> &[String] { &self.conf.destinations }

    /// Starts the handler if it isn't running yet.
    ///
    /// Safe to call any number of times from any number of threads; only the first call does any
    /// work.
    pub fn init(&self) { let _ = self.control_tx(); }

    /// Sends a snapshot to every connected destination.
    ///
    /// Hands the snapshot over to the control loop and returns.  Delivery failures are logged and
    /// never reported to the caller.
    pub fn handle_meters(&self, snapshot: Snapshot) {
        if self.control_tx().send(snapshot).is_err() {
            error!("carbon control loop is not running, dropping snapshot");
        }
    }

    fn control_tx(&self) -> &Sender<Snapshot> { self.control_tx.get_or_init(|| self.start()) }

    fn start(&self) -> Sender<Snapshot> {
        let (snapshots_tx, snapshots_rx) = bounded(0);
        let (ready_tx, ready_rx) = bounded(0);
        let control = Control::new(&self.conf, ready_tx);

        let spawned = thread::Builder::new()
            .name("carbon-control".to_owned())
            .spawn(move || control.run(snapshots_rx, ready_rx));

        match spawned {
            Ok(_) => info!("carbon handler started for {:?}", self.conf.destinations),
            Err(e) => error!("unable to start carbon control loop: {}", e),
        }

        snapshots_tx
    }
}
