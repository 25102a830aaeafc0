//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries, bounding
//! how long an expired entry can linger when nobody reads it.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Something that can drop its expired entries in one pass.
pub trait ExpirySweep: Send + Sync + 'static {
    /// Removes every expired entry and returns how many were removed.
    fn sweep_expired(&self) -> usize;
}

/// Spawns a background task that periodically sweeps `target`.
///
/// The task holds only a weak reference, so it stops on its own once the
/// owner is dropped. Cancelling `shutdown` stops it immediately.
///
/// # Arguments
/// * `target` - Weak reference to the state being swept
/// * `interval` - Time between sweeps
/// * `shutdown` - Token cancelled when the owner closes
///
/// # Returns
/// A JoinHandle for the spawned task.
///
/// # Example
/// ```ignore
/// let handle = spawn_sweep_task(Arc::downgrade(&state), Duration::from_secs(1), token.clone());
/// // Later, during shutdown:
/// token.cancel();
/// handle.await.ok();
/// ```
pub fn spawn_sweep_task<T: ExpirySweep>(
    target: Weak<T>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweep with interval of {:?}", interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let Some(target) = target.upgrade() else {
                break;
            };

            let removed = target.sweep_expired();
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }

        debug!("Expiry sweep task exiting");
    })
}
