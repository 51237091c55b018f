//! Input feed loading.
//!
//! Two external JSON files feed the pipeline, both produced by the scraper
//! layer and treated as read-only here:
//!
//! - `ethereum_tokens.json`: `{"tokens":[...]}` market snapshots with
//!   source-formatted display strings ("$1.2m", "+120%", "2h", ...)
//! - `tweets.json`: an object keyed by symbol, each entry carrying the
//!   scraped posts for that token
//!
//! Snapshots keep unknown fields in a flattened map because the full
//! snapshot JSON is embedded verbatim into the analysis prompt. The social
//! bundle preserves file order, which defines analysis queue order.

use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::logger::{self, LogTag};

pub const CHAIN_ETHEREUM: &str = "ethereum";

// ============================================================================
// TOKEN SNAPSHOTS
// ============================================================================

/// One scraped market snapshot. All market fields stay in their
/// source-formatted textual shape until a consumer parses them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcap: Option<String>,
    #[serde(default, rename = "change-24h", skip_serializing_if = "Option::is_none")]
    pub change_24h: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Stamped by the loader, not present in the feed file
    #[serde(default)]
    pub chain: String,
    /// Scraper fields we do not model explicitly; they still reach the prompt
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TokenFeedFile {
    #[serde(default)]
    tokens: Vec<TokenSnapshot>,
}

/// Load the token feed, stamping every snapshot with the Ethereum chain id.
/// A missing or unreadable file degrades to an empty feed.
pub async fn load_token_feed(path: &Path) -> Vec<TokenSnapshot> {
    if !path.exists() {
        return Vec::new();
    }

    match read_token_feed(path).await {
        Ok(tokens) => tokens,
        Err(e) => {
            logger::error(LogTag::System, &format!("Error loading Ethereum tokens: {:#}", e));
            Vec::new()
        }
    }
}

async fn read_token_feed(path: &Path) -> Result<Vec<TokenSnapshot>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read token feed: {}", path.display()))?;

    let file: TokenFeedFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse token feed: {}", path.display()))?;

    let mut tokens = file.tokens;
    for token in &mut tokens {
        token.chain = CHAIN_ETHEREUM.to_string();
    }

    Ok(tokens)
}

/// First snapshot matching the symbol, chain ignored (queue lookups)
pub fn find_by_symbol<'a>(tokens: &'a [TokenSnapshot], symbol: &str) -> Option<&'a TokenSnapshot> {
    tokens.iter().find(|t| t.symbol == symbol)
}

/// Snapshot matching both symbol and chain (market refresh lookups)
pub fn find_by_symbol_chain<'a>(
    tokens: &'a [TokenSnapshot],
    symbol: &str,
    chain: &str,
) -> Option<&'a TokenSnapshot> {
    tokens.iter().find(|t| t.symbol == symbol && t.chain == chain)
}

/// Modification time of a feed file, used to detect fresh scraper output
pub async fn feed_mtime(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    metadata.modified().ok()
}

/// Parse a display-formatted numeric string ("$1,234.5", "+120%", "N/A")
/// into a plain number. Unparseable input maps to zero.
pub fn parse_display_value(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    cleaned.parse::<f64>().unwrap_or(0.0)
}

// ============================================================================
// SOCIAL BUNDLE
// ============================================================================

/// One scraped social post; only the text participates in analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPost {
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct SocialGroup {
    #[serde(default)]
    tweets: Vec<SocialPost>,
}

/// Social posts grouped per symbol, in file order
#[derive(Debug, Clone, Default)]
pub struct SocialBundle {
    groups: Vec<(String, Vec<SocialPost>)>,
}

impl SocialBundle {
    /// Symbols in file order; this is the analysis queue source
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(symbol, _)| symbol.as_str())
    }

    pub fn posts_for(&self, symbol: &str) -> &[SocialPost] {
        self.groups
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, posts)| posts.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Load the social bundle. Missing or corrupt files are an error here; the
/// caller decides whether that ends the pass.
pub async fn load_social_bundle(path: &Path) -> Result<SocialBundle> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read social bundle: {}", path.display()))?;

    let raw: serde_json::Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse social bundle: {}", path.display()))?;

    let mut groups = Vec::with_capacity(raw.len());
    for (symbol, value) in raw {
        // Entries that do not match the expected shape carry no posts
        let group: SocialGroup = serde_json::from_value(value).unwrap_or(SocialGroup {
            tweets: Vec::new(),
        });
        groups.push((symbol, group.tweets));
    }

    Ok(SocialBundle { groups })
}

// ============================================================================
// TESTS
// ============================================================================
