/// Prompt construction for memecoin analysis
///
/// One prompt per token, built from the token's market snapshot and its
/// queued social posts. The same prompt is reused verbatim as the user
/// message of the chat fallback.
use crate::feeds::{SocialPost, TokenSnapshot};

/// System preamble for the chat-completion fallback
pub const SPECIALIST_PREAMBLE: &str = "You are a memecoin specialist. Assess risk RELATIVE to other memecoins, not traditional investments. All your responses must be valid JSON only.";

/// Posts beyond this are dropped from the prompt to bound its size
pub const MAX_SOCIAL_POSTS: usize = 10;

/// Build the full analysis prompt for one token
pub fn build_analysis_prompt(
    symbol: &str,
    snapshot: &TokenSnapshot,
    posts: &[SocialPost],
) -> String {
    let token_data = serde_json::to_string_pretty(snapshot).unwrap_or_default();
    let social_text = posts
        .iter()
        .take(MAX_SOCIAL_POSTS)
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        r#"{preamble}

MEMECOIN ANALYSIS - RELATIVE RISK ASSESSMENT

Token: {symbol} (ETHEREUM Chain)
Token Data: {token_data}

Social Data: {social_text}

CONTEXT: You are analyzing ETHEREUM MEMECOINS specifically. All memecoins are inherently risky, so assess risk RELATIVE to other memecoins.

ANALYSIS REQUIREMENTS:
1. Risk Level (1-10): Compare to OTHER MEMECOINS, not traditional investments
   - 1 = Lower risk memecoin (established, good liquidity, stable community)
   - 5 = Average memecoin risk
   - 10 = Extremely risky even for a memecoin (rug pull potential, very new, no liquidity)

2. Investment Potential (1-10): Upside potential within memecoin space
   - Consider community engagement, trend momentum, uniqueness
   - 10 = Very high viral/growth potential

RESPOND WITH VALID JSON ONLY:
{{
  "symbol": "{symbol}",
  "is_memecoin": true,
  "risk": number,
  "potential": number,
  "rationale": "Brief analysis focusing on RELATIVE memecoin risk and viral potential"
}}"#,
        preamble = SPECIALIST_PREAMBLE,
        symbol = symbol,
        token_data = token_data,
        social_text = social_text,
    )
}

// ============================================================================
// TESTS
// ============================================================================
