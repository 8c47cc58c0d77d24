//! # Background Location Reporter
//!
//! While a driver is signed in, posts the device position on a fixed
//! interval. How the position is obtained is up to the [`PositionSource`].
//!
//! ```text
//! every interval ──► source.current_position() ──None──► skip
//!                              │Some(pos)
//!                              ▼
//!         POST /driver-locations/update-location {driver_id, lat, lng}
//!                              │
//!                     Err ─► warn!, keep going
//!
//! stops on: stop(), drop, or the session ending
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use courier_core::{Id, LocationUpdate, Position, RoleKind};

use crate::controllers::{require_role, DriverController};
use crate::error::ClientResult;
use crate::http::ApiClient;

/// Supplies the device position.
pub trait PositionSource: Send + Sync {
    /// `None` when no fix is available right now.
    fn current_position(&self) -> Option<Position>;
}

/// Fixed position, handy for simulators and tests.
impl PositionSource for Position {
    fn current_position(&self) -> Option<Position> {
        Some(*self)
    }
}

/// Handle to a running reporter. Dropping it stops reporting.
#[derive(Debug)]
pub struct LocationReporter {
    driver_id: Id,
    stop_tx: mpsc::Sender<()>,
    sent: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl LocationReporter {
    /// Starts reporting for `driver_id`. Only a driver session may start it.
    pub fn start(
        api: ApiClient,
        driver_id: Id,
        source: Arc<dyn PositionSource>,
        interval: Duration,
    ) -> ClientResult<Self> {
        require_role(&api, RoleKind::Driver, "report a location")?;

        let (stop_tx, stop_rx) = mpsc::channel(1);
        let sent = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(report_loop(
            api,
            driver_id,
            source,
            interval,
            stop_rx,
            Arc::clone(&sent),
        ));

        info!(driver_id, ?interval, "Location reporting started");
        Ok(LocationReporter {
            driver_id,
            stop_tx,
            sent,
            task,
        })
    }

    pub fn driver_id(&self) -> Id {
        self.driver_id
    }

    /// Positions successfully posted so far.
    pub fn reports_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops reporting and waits for the loop to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        drop(self.stop_tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Location reporter ended abnormally");
        }
    }
}

async fn report_loop(
    api: ApiClient,
    driver_id: Id,
    source: Arc<dyn PositionSource>,
    interval: Duration,
    mut stop_rx: mpsc::Receiver<()>,
    sent: Arc<AtomicU64>,
) {
    let mut session_rx = api.session().subscribe();
    let drivers = DriverController::new(api);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(position) = source.current_position() else {
                    debug!("No position fix, skipping");
                    continue;
                };
                let update = LocationUpdate {
                    driver_id,
                    latitude: position.latitude,
                    longitude: position.longitude,
                };
                match drivers.update_location(&update).await {
                    Ok(()) => {
                        sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => warn!(error = %e, "Location update failed"),
                }
            }
            changed = session_rx.changed() => {
                let signed_out = changed.is_err() || session_rx.borrow().session.is_none();
                if signed_out {
                    info!("Session ended, stopping location reporting");
                    break;
                }
            }
            _ = stop_rx.recv() => {
                break;
            }
        }
    }

    debug!(driver_id, "Location reporting stopped");
}
