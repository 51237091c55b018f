/// Per-token analysis engine
///
/// Owns one full analysis attempt: advisory health probe, completion
/// request (sync or SSE), layered response parsing with chat fallback,
/// risk blending, and the retry policy around transport failures.
///
/// Failure handling distinguishes two classes:
/// - rate-limit class failures retry with exponential backoff, and
///   exhausting the ceiling is FATAL for the calling session
/// - transient failures (server errors, refused connections, timeouts)
///   retry the same way but exhaust into a soft skip
/// Everything else skips softly without retrying.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::ai::prompts::{self, SPECIALIST_PREAMBLE};
use crate::ai::schema::{self, TokenVerdict};
use crate::apis::llm::{ChatMessage, CompletionBackend, LlmError};
use crate::config;
use crate::feeds::{parse_display_value, SocialPost, TokenSnapshot, CHAIN_ETHEREUM};
use crate::logger::{self, LogTag};
use crate::risk;
use crate::store::AnalysisRecord;

// ============================================================================
// RETRY CONFIGURATION
// ============================================================================

/// Retries after the initial attempt, so the ceiling is MAX_RETRIES + 1
/// total attempts
pub const MAX_RETRIES: u32 = 3;
/// Base delay for the exponential retry backoff
pub const RETRY_DELAY_MS: u64 = 30_000;
/// Pacing delay between queue items
pub const RATE_LIMIT_DELAY_MS: u64 = 12_000;

/// Backoff schedule: 12s pacing at zero, then 30s, 60s, 120s
pub fn backoff_delay(retry_count: u32) -> Duration {
    if retry_count > 0 {
        Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(retry_count - 1))
    } else {
        Duration::from_millis(RATE_LIMIT_DELAY_MS)
    }
}

// ============================================================================
// TYPES
// ============================================================================

/// Why a token produced no record this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingMarketData,
    EmptyResponse,
    Unparseable,
    NotMemecoin,
    RetriesExhausted,
    BackendFailure,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::MissingMarketData => "no market snapshot",
            SkipReason::EmptyResponse => "empty model response",
            SkipReason::Unparseable => "unparseable model response",
            SkipReason::NotMemecoin => "not classified as a memecoin",
            SkipReason::RetriesExhausted => "retries exhausted",
            SkipReason::BackendFailure => "backend failure",
        };
        write!(f, "{}", text)
    }
}

/// Outcome of one token analysis
///
/// The Err side of `analyze` is reserved for the one fatal condition:
/// rate-limit failures that survived every retry.
#[derive(Debug, Clone)]
pub enum AnalysisVerdict {
    Analyzed(AnalysisRecord),
    Skipped(SkipReason),
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AnalysisEngine {
    backend: Arc<dyn CompletionBackend>,
    use_sse: bool,
    probe_health: bool,
}

impl AnalysisEngine {
    pub fn new(backend: Arc<dyn CompletionBackend>, use_sse: bool, probe_health: bool) -> Self {
        Self {
            backend,
            use_sse,
            probe_health,
        }
    }

    /// Engine wired from the process-wide settings; the health probe is
    /// only armed when an API key is configured
    pub fn from_settings(backend: Arc<dyn CompletionBackend>) -> Self {
        let (use_sse, probe_health) =
            config::with_settings(|s| (s.use_sse, !s.api_key.is_empty()));
        Self::new(backend, use_sse, probe_health)
    }

    /// Analyze one token end to end
    pub async fn analyze(
        &self,
        symbol: &str,
        posts: &[SocialPost],
        snapshot: Option<&TokenSnapshot>,
    ) -> Result<AnalysisVerdict, LlmError> {
        let snapshot = match snapshot {
            Some(s) => s,
            None => {
                logger::info(
                    LogTag::Analysis,
                    &format!("Token {} not found in token file. Skipping analysis.", symbol),
                );
                return Ok(AnalysisVerdict::Skipped(SkipReason::MissingMarketData));
            }
        };

        let prompt = prompts::build_analysis_prompt(symbol, snapshot, posts);
        let factors = risk::score_snapshot(snapshot);

        let mut retry_count: u32 = 0;
        loop {
            match self.attempt(symbol, &prompt).await {
                Ok(response) => {
                    return Ok(self
                        .resolve_response(symbol, &prompt, snapshot, &factors, &response)
                        .await);
                }
                Err(e) if e.is_rate_limit_class() => {
                    if retry_count < MAX_RETRIES {
                        retry_count += 1;
                        logger::warning(
                            LogTag::Analysis,
                            &format!(
                                "Rate limited on {} (attempt {}/{}), backing off: {}",
                                symbol,
                                retry_count,
                                MAX_RETRIES,
                                e
                            ),
                        );
                        tokio::time::sleep(backoff_delay(retry_count)).await;
                        continue;
                    }
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    if retry_count < MAX_RETRIES {
                        retry_count += 1;
                        logger::warning(
                            LogTag::Analysis,
                            &format!(
                                "Transient failure on {} (attempt {}/{}), backing off: {}",
                                symbol,
                                retry_count,
                                MAX_RETRIES,
                                e
                            ),
                        );
                        tokio::time::sleep(backoff_delay(retry_count)).await;
                        continue;
                    }
                    logger::error(
                        LogTag::Analysis,
                        &format!("Retries exhausted for {}: {}", symbol, e),
                    );
                    return Ok(AnalysisVerdict::Skipped(SkipReason::RetriesExhausted));
                }
                Err(e) => {
                    logger::error(
                        LogTag::Analysis,
                        &format!("Analysis error for {}: {}", symbol, e),
                    );
                    return Ok(AnalysisVerdict::Skipped(SkipReason::BackendFailure));
                }
            }
        }
    }

    /// One completion round trip, with the advisory health probe in front
    async fn attempt(&self, symbol: &str, prompt: &str) -> Result<String, LlmError> {
        if self.probe_health && !self.backend.health_check().await {
            logger::warning(
                LogTag::Analysis,
                &format!("Health check failed for {}, proceeding anyway", symbol),
            );
        }

        if self.use_sse {
            self.backend.complete_streaming(prompt).await
        } else {
            self.backend.complete(prompt).await
        }
    }

    /// Parse a completed response into a verdict and assemble the record
    async fn resolve_response(
        &self,
        symbol: &str,
        prompt: &str,
        snapshot: &TokenSnapshot,
        factors: &risk::RiskFactors,
        response: &str,
    ) -> AnalysisVerdict {
        if response.is_empty() {
            logger::error(LogTag::Analysis, &format!("Empty response for {}", symbol));
            return AnalysisVerdict::Skipped(SkipReason::EmptyResponse);
        }

        let cleaned = schema::clean_response_text(response);
        let verdict = match schema::extract_verdict(&cleaned) {
            Some(verdict) => verdict,
            None => {
                logger::error(
                    LogTag::Analysis,
                    &format!("JSON parsing error for {}, trying chat fallback", symbol),
                );
                match self.chat_fallback(prompt).await {
                    Some(verdict) => verdict,
                    None => {
                        logger::error(
                            LogTag::Analysis,
                            &format!("Chat completion also failed for {}", symbol),
                        );
                        return AnalysisVerdict::Skipped(SkipReason::Unparseable);
                    }
                }
            }
        };

        if !verdict.is_memecoin {
            logger::info(
                LogTag::Analysis,
                &format!("Token {} is not classified as a memecoin. Skipping.", symbol),
            );
            return AnalysisVerdict::Skipped(SkipReason::NotMemecoin);
        }

        AnalysisVerdict::Analyzed(build_record(symbol, snapshot, factors, &verdict))
    }

    /// Retry the same prompt through the chat endpoint; any failure here
    /// is soft
    async fn chat_fallback(&self, prompt: &str) -> Option<TokenVerdict> {
        let messages = [
            ChatMessage::system(SPECIALIST_PREAMBLE),
            ChatMessage::user(prompt),
        ];

        match self.backend.chat_complete(&messages).await {
            Ok(response) => {
                let cleaned = schema::clean_response_text(&response);
                schema::extract_verdict(&cleaned)
            }
            Err(e) => {
                logger::error(
                    LogTag::Analysis,
                    &format!("Chat fallback request failed: {}", e),
                );
                None
            }
        }
    }
}

// ============================================================================
// RECORD ASSEMBLY
// ============================================================================

fn text_or(value: &Option<String>, fallback: &str) -> String {
    match value {
        Some(s) if !s.is_empty() => s.clone(),
        _ => fallback.to_string(),
    }
}

/// Blend the model verdict with snapshot fundamentals into a record
fn build_record(
    symbol: &str,
    snapshot: &TokenSnapshot,
    factors: &risk::RiskFactors,
    verdict: &TokenVerdict,
) -> AnalysisRecord {
    let model_risk = verdict.risk_score();
    let fundamental_risk = factors.fundamental_risk();
    let combined_risk = ((model_risk * 0.6 + fundamental_risk * 0.4) * 10.0).round() / 10.0;

    let price = snapshot
        .price
        .as_deref()
        .map(parse_display_value)
        .unwrap_or(0.0);
    let change_24h = snapshot
        .change_24h
        .as_deref()
        .map(parse_display_value)
        .unwrap_or(0.0);

    AnalysisRecord {
        symbol: verdict.symbol_or(symbol).to_string(),
        symbol1: snapshot.symbol1.clone().unwrap_or_default(),
        chain: CHAIN_ETHEREUM.to_string(),
        risk: combined_risk,
        investment_potential: verdict.potential_score(),
        rationale: verdict.rationale_or_default(),
        raw_risk_score: combined_risk,
        price,
        volume: text_or(&snapshot.volume, "N/A"),
        market_cap: text_or(&snapshot.mcap, "N/A"),
        change_24h,
        age: text_or(&snapshot.age, "N/A"),
        href: text_or(&snapshot.href, "#"),
        image_url: snapshot.image_url.clone().filter(|s| !s.is_empty()),
        last_analyzed: Utc::now(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
