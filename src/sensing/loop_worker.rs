use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::SessionError,
    session::{SensorSample, SessionController},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub async fn sensing_loop(
    mut feed: mpsc::Receiver<SensorSample>,
    session: SessionController,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            received = feed.recv() => {
                let Some(mut sample) = received else {
                    log_info!("sensor feed closed; sensing loop exiting");
                    break;
                };

                // Only the newest values matter, so skip any backlog.
                let mut skipped = 0usize;
                while let Ok(newer) = feed.try_recv() {
                    sample = newer;
                    skipped += 1;
                }
                if skipped > 0 {
                    log_debug!("coalesced {} stale sensor samples", skipped);
                }

                match session.update_live_data(sample).await {
                    Ok(()) => {}
                    Err(SessionError::NoActiveSession) => {
                        log_info!("no active session; sensing loop exiting");
                        break;
                    }
                    Err(err) => log_error!("failed to apply sensor sample: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("sensing loop shutting down");
                break;
            }
        }
    }
}
