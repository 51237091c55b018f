/// Analysis pipeline orchestrator
///
/// Drives one analysis session per token-feed generation: load the social
/// bundle, queue the symbols that have market snapshots, analyze them one
/// by one with pacing in between, and merge each fresh record through the
/// shared store.
///
/// Sessions are numbered. A session aborts cooperatively when a newer one
/// starts, when shutdown is requested, or when the engine reports
/// rate-limit exhaustion. In watch mode the orchestrator then waits for
/// the token feed's mtime to move before starting the next session.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::ai::engine::{backoff_delay, AnalysisEngine, AnalysisVerdict};
use crate::config;
use crate::feeds::{self, CHAIN_ETHEREUM};
use crate::logger::{self, LogTag};
use crate::shutdown::{is_shutdown_requested, shutdown_notify};
use crate::store::AnalysisStore;

/// Poll cadence for detecting fresh scraper output in watch mode
const FEED_POLL_INTERVAL_MS: u64 = 10_000;

pub struct PipelineOrchestrator {
    engine: AnalysisEngine,
    store: Arc<AnalysisStore>,
    tweets_path: PathBuf,
    tokens_path: PathBuf,
    session_counter: AtomicU64,
    running: AtomicBool,
}

impl PipelineOrchestrator {
    pub fn new(
        engine: AnalysisEngine,
        store: Arc<AnalysisStore>,
        tweets_path: PathBuf,
        tokens_path: PathBuf,
    ) -> Self {
        Self {
            engine,
            store,
            tweets_path,
            tokens_path,
            session_counter: AtomicU64::new(0),
            running: AtomicBool::new(false),
        }
    }

    /// Orchestrator wired from the process-wide settings
    pub fn from_settings(engine: AnalysisEngine, store: Arc<AnalysisStore>) -> Self {
        let (tweets_path, tokens_path) =
            config::with_settings(|s| (s.tweets_file(), s.tokens_file()));
        Self::new(engine, store, tweets_path, tokens_path)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn current_session(&self) -> u64 {
        self.session_counter.load(Ordering::SeqCst)
    }

    /// Run sessions until shutdown, re-triggering on feed changes. With
    /// `run_once` the first session is also the last.
    pub async fn run(&self, run_once: bool) {
        loop {
            let baseline = feeds::feed_mtime(&self.tokens_path).await;
            self.run_session().await;

            if run_once || is_shutdown_requested() {
                break;
            }
            if !self.wait_for_feed_change(baseline).await {
                break;
            }
            logger::info(
                LogTag::Pipeline,
                "Token feed changed, starting new analysis session",
            );
        }
    }

    /// One full analysis pass over the social bundle
    pub async fn run_session(&self) {
        self.running.store(true, Ordering::SeqCst);
        let session = self.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        logger::info(
            LogTag::Pipeline,
            &format!("Starting analysis session {}", session),
        );

        self.run_queue(session).await;

        let analyzed = self.store.analyzed_count(CHAIN_ETHEREUM).await;
        logger::info(
            LogTag::Pipeline,
            &format!("Analysis completed - Ethereum tokens analyzed: {}", analyzed),
        );
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_queue(&self, session: u64) {
        if !self.tweets_path.exists() {
            logger::info(LogTag::Pipeline, "tweets.json not found.");
            return;
        }

        let bundle = match feeds::load_social_bundle(&self.tweets_path).await {
            Ok(bundle) => bundle,
            Err(e) => {
                logger::error(
                    LogTag::Pipeline,
                    &format!("Error reading tweets.json: {:#}", e),
                );
                return;
            }
        };

        let tokens = feeds::load_token_feed(&self.tokens_path).await;
        let loaded = self.store.load().await;
        logger::debug(
            LogTag::Pipeline,
            &format!("Loaded {} existing analysis records", loaded),
        );

        // Queue keeps bundle order, restricted to symbols with snapshots
        let available: HashSet<&str> = tokens.iter().map(|t| t.symbol.as_str()).collect();
        let queue: Vec<&str> = bundle
            .symbols()
            .filter(|symbol| available.contains(symbol))
            .collect();
        logger::info(
            LogTag::Pipeline,
            &format!("Queued {} of {} symbols for analysis", queue.len(), bundle.len()),
        );

        for (index, symbol) in queue.iter().enumerate() {
            if session != self.session_counter.load(Ordering::SeqCst) {
                logger::info(
                    LogTag::Pipeline,
                    &format!("Session {} superseded, stopping", session),
                );
                break;
            }
            if is_shutdown_requested() {
                break;
            }

            let snapshot = feeds::find_by_symbol(&tokens, symbol);
            let posts = bundle.posts_for(symbol);

            match self.engine.analyze(symbol, posts, snapshot).await {
                Ok(AnalysisVerdict::Analyzed(record)) => {
                    if record.rationale.trim().is_empty() {
                        logger::info(
                            LogTag::Pipeline,
                            &format!("Skipped {}: Invalid analysis", symbol),
                        );
                    } else if let Err(e) = self.store.upsert(record).await {
                        logger::error(
                            LogTag::Pipeline,
                            &format!("Failed to persist analysis for {}: {:#}", symbol, e),
                        );
                    }
                }
                Ok(AnalysisVerdict::Skipped(reason)) => {
                    logger::info(
                        LogTag::Pipeline,
                        &format!("Skipped {}: {}", symbol, reason),
                    );
                }
                Err(e) => {
                    logger::error(
                        LogTag::Pipeline,
                        &format!("Rate limit exceeded. Stopping session. ({})", e),
                    );
                    break;
                }
            }

            // Pace between queue items, not after the last one
            if index < queue.len() - 1 {
                let notify = shutdown_notify();
                tokio::select! {
                    _ = notify.notified() => break,
                    _ = tokio::time::sleep(backoff_delay(0)) => {}
                }
            }
        }
    }

    /// Poll the token feed until its mtime moves past the baseline.
    /// Returns false when shutdown interrupts the wait.
    async fn wait_for_feed_change(&self, mut baseline: Option<SystemTime>) -> bool {
        let notify = shutdown_notify();
        loop {
            tokio::select! {
                _ = notify.notified() => return false,
                _ = tokio::time::sleep(Duration::from_millis(FEED_POLL_INTERVAL_MS)) => {}
            }
            if is_shutdown_requested() {
                return false;
            }

            let current = feeds::feed_mtime(&self.tokens_path).await;
            let changed = match (baseline, current) {
                (Some(before), Some(after)) => after > before,
                (None, Some(_)) => true,
                _ => false,
            };
            if changed {
                return true;
            }
            baseline = baseline.or(current);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
