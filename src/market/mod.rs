/// Background market data sync
///
/// Every ten seconds the token feed is reloaded and quote fields are
/// patched onto existing analysis records through the shared store. The
/// syncing flag suppresses overlapping passes when one runs long.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::feeds;
use crate::logger::{self, LogTag};
use crate::shutdown::{is_shutdown_requested, shutdown_notify};
use crate::store::AnalysisStore;

/// Refresh cadence for quote fields on persisted records
pub const MARKET_DATA_UPDATE_INTERVAL_MS: u64 = 10_000;

pub struct MarketDataSync {
    store: Arc<AnalysisStore>,
    tokens_path: PathBuf,
    syncing: AtomicBool,
}

impl MarketDataSync {
    pub fn new(store: Arc<AnalysisStore>, tokens_path: PathBuf) -> Self {
        Self {
            store,
            tokens_path,
            syncing: AtomicBool::new(false),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    /// One sync pass. Re-entry while a pass is in flight is a no-op.
    pub async fn sync_once(&self) {
        if self.syncing.swap(true, Ordering::SeqCst) {
            return;
        }

        self.run_sync().await;
        self.syncing.store(false, Ordering::SeqCst);
    }

    async fn run_sync(&self) {
        let snapshots = feeds::load_token_feed(&self.tokens_path).await;
        if snapshots.is_empty() {
            return;
        }

        match self.store.patch_market_data(&snapshots).await {
            Ok(patched) if patched > 0 => {
                logger::debug(
                    LogTag::Market,
                    &format!("Refreshed market data for {} records", patched),
                );
            }
            Ok(_) => {}
            Err(e) => {
                logger::error(
                    LogTag::Market,
                    &format!("Error syncing market data: {:#}", e),
                );
            }
        }
    }
}

/// Spawn the sync loop. The first pass runs immediately, then on the
/// fixed interval until shutdown.
pub fn start_market_data_sync(sync: Arc<MarketDataSync>) -> Result<JoinHandle<()>, String> {
    logger::info(LogTag::Market, "Starting market data sync");

    let handle = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_millis(MARKET_DATA_UPDATE_INTERVAL_MS));
        let notify = shutdown_notify();

        loop {
            if is_shutdown_requested() {
                break;
            }

            tokio::select! {
                _ = notify.notified() => break,
                _ = interval.tick() => sync.sync_once().await,
            }
        }

        logger::info(LogTag::Market, "Market data sync stopped");
    });

    Ok(handle)
}

// ============================================================================
// TESTS
// ============================================================================
