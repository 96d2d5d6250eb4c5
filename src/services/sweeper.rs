use std::time::Duration;

use tracing::{info, warn};

use crate::services::session::SessionStore;

/// Spawn a background task that periodically deactivates expired sessions.
/// Lookups already filter on expiry, so the sweep only keeps the table's
/// `is_active` flags honest for audits and the active-sessions listing.
pub fn start(sessions: SessionStore, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match sessions.sweep_expired().await {
                Ok(0) => {}
                Ok(count) => info!("Session sweep deactivated {count} expired sessions"),
                Err(e) => warn!("Session sweep failed: {e}"),
            }
        }
    });
}
