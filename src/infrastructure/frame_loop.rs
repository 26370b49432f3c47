//! Frame loop
//!
//! Runs [`PlaybackDriver::tick`] on a fixed-period tokio interval. One tick at
//! a time; the loop ends by itself once the driver is paused.

use crate::domain::playback::{PlaybackDriver, TimelineClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Nominal 60 Hz display refresh.
pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(16);

pub struct PlaybackController {
    driver: Arc<Mutex<PlaybackDriver>>,
    clock: Arc<dyn TimelineClock>,
    frame_period: Duration,
    task: Option<JoinHandle<()>>,
}

impl PlaybackController {
    pub fn new(
        driver: PlaybackDriver,
        clock: Arc<dyn TimelineClock>,
        frame_period: Duration,
    ) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
            clock,
            frame_period,
            task: None,
        }
    }

    pub fn driver(&self) -> Arc<Mutex<PlaybackDriver>> {
        self.driver.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Resume ticking. Does nothing while already playing.
    pub async fn play(&mut self) {
        let resumed = self.driver.lock().await.on_play();
        if !resumed && self.is_running() {
            return;
        }

        debug!("Starting frame loop ({} ms)", self.frame_period.as_millis());
        self.task = Some(tokio::spawn(run_frames(
            self.driver.clone(),
            self.clock.clone(),
            self.frame_period,
        )));
    }

    /// Stop ticking and halt every output. Does nothing while already paused.
    pub async fn pause(&mut self) -> anyhow::Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.driver.lock().await.on_pause().await
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_frames(
    driver: Arc<Mutex<PlaybackDriver>>,
    clock: Arc<dyn TimelineClock>,
    frame_period: Duration,
) {
    let mut ticker = time::interval(frame_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let mut driver = driver.lock().await;
        if driver.is_paused() {
            break;
        }
        // A failed frame is retried by the next one.
        if let Err(e) = driver.tick(clock.position_ms()).await {
            warn!("Frame failed: {:#}", e);
        }
    }
    debug!("Frame loop stopped");
}
