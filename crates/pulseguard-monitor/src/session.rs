//! The background monitoring session.
//!
//! A session ticks the dose scheduler and polls the alert feed on the
//! cadences in the policy until it is ended. Ending it signals the task and
//! waits for the in-flight pass to finish. Dropping the handle without
//! ending it aborts the task.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::monitor::PatientMonitor;

pub struct MonitoringSession;

impl MonitoringSession {
    /// Spawn the session task for `monitor`. Must be called inside a tokio
    /// runtime.
    pub fn start(monitor: Arc<PatientMonitor>) -> SessionHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let patient_id = monitor.patient_id().clone();

        let task = tokio::spawn(async move {
            let mut dose_tick = interval(monitor.policy().dose_tick());
            dose_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut feed_poll = interval(monitor.policy().feed_poll());
            feed_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(patient_id = %monitor.patient_id(), "monitoring session started");
            loop {
                tokio::select! {
                    biased;
                    changed = stop.changed() => {
                        // A dropped sender also ends the session.
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = dose_tick.tick() => {
                        let report = monitor.tick(Utc::now()).await;
                        debug!(alerts = report.alerts_created, notifications = report.notifications_sent, "dose tick");
                    }
                    _ = feed_poll.tick() => {
                        let delivered = monitor.poll_feed().await;
                        if delivered > 0 {
                            debug!(delivered, "feed poll");
                        }
                    }
                }
            }
            info!(patient_id = %monitor.patient_id(), "monitoring session ended");
        });

        debug!(patient_id = %patient_id, "monitoring session spawned");
        SessionHandle { shutdown, task: Some(task) }
    }
}

/// Owns a running session. `end` stops it cleanly.
pub struct SessionHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the session and wait for its task to exit.
    pub async fn end(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "monitoring session task failed");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
