use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::session::SensorSample;

const FEED_CAPACITY: usize = 16;

/// Stand-in for a phone or watch: cumulative steps and distance with a
/// little noise on speed and cadence.
pub struct SimulatedRunner {
    speed_mps: f64,
    cadence_spm: f64,
    jitter: f64,
    steps: f64,
    distance_meters: f64,
    rng: StdRng,
}

impl SimulatedRunner {
    pub fn new(speed_mps: f64, cadence_spm: f64) -> Self {
        Self {
            speed_mps: speed_mps.max(0.0),
            cadence_spm: cadence_spm.max(0.0),
            jitter: 0.08,
            steps: 0.0,
            distance_meters: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.9);
        self
    }

    /// Advances the runner by `elapsed` and returns the running totals.
    pub fn advance(&mut self, elapsed: Duration) -> SensorSample {
        let seconds = elapsed.as_secs_f64();
        let noise = if self.jitter > 0.0 {
            1.0 + self.rng.gen_range(-self.jitter..self.jitter)
        } else {
            1.0
        };

        let speed = self.speed_mps * noise;
        self.distance_meters += speed * seconds;
        self.steps += self.cadence_spm * noise * seconds / 60.0;

        SensorSample {
            steps: self.steps.round() as u32,
            distance_meters: self.distance_meters,
            pace_min_per_km: (speed > 0.0).then(|| 1000.0 / (speed * 60.0)),
        }
    }
}

impl Default for SimulatedRunner {
    /// Easy jog, roughly 6 min/km.
    fn default() -> Self {
        Self::new(2.8, 165.0)
    }
}

/// Spawns a task pushing one sample per `period` until cancelled or the
/// receiver is dropped.
pub fn simulate_feed(
    mut runner: SimulatedRunner,
    period: Duration,
    cancel_token: CancellationToken,
) -> (mpsc::Receiver<SensorSample>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(FEED_CAPACITY);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tx.send(runner.advance(period)).await.is_err() {
                        break;
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
    });

    (rx, handle)
}
