/// Analysis results store
///
/// Single owner of the results file. The pipeline merges fresh analyses
/// and the market sync patches quotes through this one instance, so every
/// write goes through the same lock and the file never sees interleaved
/// writers.
///
/// Persisted shape is `{"results": [...]}` with ids assigned in insertion
/// order and rows sorted by risk. Analysis writes renormalize the cohort
/// first; market patches persist the stored scores as-is.
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::feeds::{self, parse_display_value, TokenSnapshot};
use crate::logger::{self, LogTag};

// ============================================================================
// TYPES
// ============================================================================

/// One analyzed token held in memory between persists
///
/// `raw_risk_score` keeps the pre-normalization blend so repeated
/// normalization passes rescale from the same basis instead of
/// compounding.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub symbol: String,
    pub symbol1: String,
    pub chain: String,
    pub risk: f64,
    pub investment_potential: f64,
    pub rationale: String,
    pub raw_risk_score: f64,
    pub price: f64,
    pub volume: String,
    pub market_cap: String,
    pub change_24h: f64,
    pub age: String,
    pub href: String,
    pub image_url: Option<String>,
    pub last_analyzed: DateTime<Utc>,
}

/// One row of the persisted results file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub symbol1: String,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub volume: String,
    #[serde(default, rename = "marketCap")]
    pub market_cap: String,
    #[serde(default, rename = "change24h")]
    pub change_24h: f64,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub potential: f64,
    #[serde(default)]
    pub risk: f64,
    #[serde(default)]
    pub href: String,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResultsFile {
    #[serde(default)]
    pub results: Vec<ResultRow>,
}

// ============================================================================
// STORE
// ============================================================================

pub struct AnalysisStore {
    path: PathBuf,
    records: RwLock<Vec<AnalysisRecord>>,
}

impl AnalysisStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Rehydrate records from the results file. Missing or corrupt files
    /// degrade to an empty store. Returns the number of records loaded.
    pub async fn load(&self) -> usize {
        let rows = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str::<ResultsFile>(&content) {
                Ok(file) => file.results,
                Err(e) => {
                    logger::error(
                        LogTag::Store,
                        &format!("Error reading existing results: {}", e),
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                logger::error(
                    LogTag::Store,
                    &format!("Error reading existing results: {}", e),
                );
                Vec::new()
            }
        };

        let mut records = self.records.write().await;
        *records = rows.into_iter().map(rehydrate_row).collect();
        records.len()
    }

    /// Merge one analysis by (symbol, chain), renormalize the cohort,
    /// and persist
    pub async fn upsert(&self, record: AnalysisRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let existing = records
            .iter()
            .position(|r| r.symbol == record.symbol && r.chain == record.chain);
        match existing {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        normalize_risk_scores(&mut records);
        self.persist(&records).await
    }

    /// Refresh quote fields from fresh snapshots, keeping existing values
    /// where the snapshot is silent. Returns the number of patched rows.
    ///
    /// Scores, ids, and display order persist exactly as last written;
    /// only the quote fields move.
    pub async fn patch_market_data(&self, snapshots: &[TokenSnapshot]) -> Result<usize> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut records = self.records.write().await;
        if records.is_empty() {
            return Ok(0);
        }

        let mut patched = 0;
        for record in records.iter_mut() {
            let fresh = feeds::find_by_symbol_chain(snapshots, &record.symbol, &record.chain);
            if let Some(snapshot) = fresh {
                apply_market_patch(record, snapshot);
                patched += 1;
            }
        }

        self.persist(&records).await?;
        Ok(patched)
    }

    /// Records currently held for one chain
    pub async fn analyzed_count(&self, chain: &str) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.chain == chain)
            .count()
    }

    async fn persist(&self, records: &[AnalysisRecord]) -> Result<()> {
        let output = format_results(records);
        let json = serde_json::to_string_pretty(&output)
            .context("Failed to serialize analysis results")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

fn rehydrate_row(row: ResultRow) -> AnalysisRecord {
    AnalysisRecord {
        symbol: row.symbol,
        symbol1: row.symbol1,
        chain: row.chain,
        risk: row.risk,
        investment_potential: row.potential,
        rationale: "Existing analysis".to_string(),
        raw_risk_score: row.risk,
        price: row.price,
        volume: row.volume,
        market_cap: row.market_cap,
        change_24h: row.change_24h,
        age: row.age,
        href: row.href,
        image_url: row.image_url,
        last_analyzed: Utc::now(),
    }
}

fn apply_market_patch(record: &mut AnalysisRecord, snapshot: &TokenSnapshot) {
    if let Some(price) = snapshot.price.as_deref().filter(|s| !s.is_empty()) {
        record.price = parse_display_value(price);
    }
    if let Some(volume) = snapshot.volume.as_deref().filter(|s| !s.is_empty()) {
        record.volume = volume.to_string();
    }
    if let Some(mcap) = snapshot.mcap.as_deref().filter(|s| !s.is_empty()) {
        record.market_cap = mcap.to_string();
    }
    if let Some(change) = snapshot.change_24h.as_deref().filter(|s| !s.is_empty()) {
        record.change_24h = parse_display_value(change);
    }
    if let Some(age) = snapshot.age.as_deref().filter(|s| !s.is_empty()) {
        record.age = age.to_string();
    }
    if let Some(href) = snapshot.href.as_deref().filter(|s| !s.is_empty()) {
        record.href = href.to_string();
    }
    if let Some(image) = snapshot.image_url.as_deref().filter(|s| !s.is_empty()) {
        record.image_url = Some(image.to_string());
    }
}

// ============================================================================
// NORMALIZATION AND FORMATTING
// ============================================================================

/// Normalization basis: the raw blend when present, the stored risk
/// otherwise
fn risk_basis(record: &AnalysisRecord) -> f64 {
    if record.raw_risk_score != 0.0 {
        record.raw_risk_score
    } else {
        record.risk
    }
}

/// Rescale cohort risks onto the full 1-10 band, writing the displayed
/// score back into each record
///
/// Runs on the analysis write path only; the market sync persists the
/// scores it finds. Fewer than two records pass through untouched. When
/// every basis is identical the cohort collapses to jitter around the
/// midpoint, keeping visual spread without inventing an ordering.
fn normalize_risk_scores(records: &mut [AnalysisRecord]) {
    if records.len() < 2 {
        return;
    }

    let raw_risks: Vec<f64> = records
        .iter()
        .map(risk_basis)
        .filter(|r| *r > 0.0)
        .collect();
    if raw_risks.is_empty() {
        return;
    }

    let min_risk = raw_risks.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_risk = raw_risks.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    if max_risk == min_risk {
        for record in records.iter_mut() {
            record.risk = (5.0 + (rand::random::<f64>() - 0.5) * 2.0).clamp(1.0, 10.0);
        }
        return;
    }

    for record in records.iter_mut() {
        let basis = risk_basis(record);
        let normalized = 1.0 + (basis - min_risk) / (max_risk - min_risk) * 9.0;
        let jittered = (normalized + (rand::random::<f64>() - 0.5) * 0.5).clamp(1.0, 10.0);
        record.risk = (jittered * 10.0).round() / 10.0;
    }
}

/// Assign ids in insertion order, then sort for display
fn format_results(records: &[AnalysisRecord]) -> ResultsFile {
    if records.is_empty() {
        return ResultsFile::default();
    }

    let mut rows: Vec<ResultRow> = records
        .iter()
        .enumerate()
        .map(|(index, record)| ResultRow {
            id: (index + 1) as u32,
            symbol: record.symbol.clone(),
            symbol1: record.symbol1.clone(),
            chain: record.chain.clone(),
            price: record.price,
            volume: record.volume.clone(),
            market_cap: record.market_cap.clone(),
            change_24h: record.change_24h,
            age: record.age.clone(),
            favorite: false,
            potential: record.investment_potential,
            risk: record.risk,
            href: record.href.clone(),
            image_url: record.image_url.clone(),
        })
        .collect();

    // Risk ascending by displayed tenth, equal tenths tie-break on upside
    rows.sort_by(|a, b| {
        let a_bucket = (a.risk * 10.0).round() as i64;
        let b_bucket = (b.risk * 10.0).round() as i64;
        a_bucket
            .cmp(&b_bucket)
            .then_with(|| b.potential.total_cmp(&a.potential))
    });

    ResultsFile { results: rows }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(symbol: &str, raw_risk: f64) -> AnalysisRecord {
        AnalysisRecord {
            symbol: symbol.to_string(),
            symbol1: String::new(),
            chain: "ethereum".to_string(),
            risk: raw_risk,
            investment_potential: 5.0,
            rationale: "Analysis completed".to_string(),
            raw_risk_score: raw_risk,
            price: 0.001,
            volume: "$800".to_string(),
            market_cap: "$1.2m".to_string(),
            change_24h: 120.0,
            age: "2h".to_string(),
            href: "#".to_string(),
            image_url: None,
            last_analyzed: Utc::now(),
        }
    }

    fn store_in(dir: &TempDir) -> AnalysisStore {
        AnalysisStore::new(dir.path().join("ai_analyzer.json"))
    }

    #[tokio::test]
    async fn load_missing_file_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().await, 0);
        assert_eq!(store.analyzed_count("ethereum").await, 0);
    }

    #[tokio::test]
    async fn empty_store_persists_empty_results_object() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.persist(&[]).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("ai_analyzer.json")).unwrap();
        assert_eq!(content, "{\n  \"results\": []\n}");
    }

    #[tokio::test]
    async fn upsert_replaces_by_symbol_and_chain() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.upsert(record("PUP", 7.0)).await.unwrap();
        store.upsert(record("DOGE", 4.0)).await.unwrap();
        let mut updated = record("PUP", 9.0);
        updated.rationale = "Second pass".to_string();
        store.upsert(updated).await.unwrap();

        assert_eq!(store.analyzed_count("ethereum").await, 2);
        let records = store.records.read().await;
        let pup = records.iter().find(|r| r.symbol == "PUP").unwrap();
        assert_eq!(pup.raw_risk_score, 9.0);
        assert_eq!(pup.rationale, "Second pass");
    }

    #[tokio::test]
    async fn rehydration_restores_records_with_placeholder_rationale() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.upsert(record("PUP", 7.0)).await.unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.load().await, 1);

        let records = reloaded.records.read().await;
        assert_eq!(records[0].symbol, "PUP");
        assert_eq!(records[0].rationale, "Existing analysis");
        // Normalized risk becomes the new basis after a round trip
        assert_eq!(records[0].raw_risk_score, records[0].risk);
    }

    #[tokio::test]
    async fn corrupt_results_file_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ai_analyzer.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = AnalysisStore::new(path);
        assert_eq!(store.load().await, 0);
    }

    #[test]
    fn single_record_skips_normalization() {
        let mut records = vec![record("PUP", 7.3)];
        normalize_risk_scores(&mut records);
        assert_eq!(records[0].risk, 7.3);

        let output = format_results(&records);
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.results[0].id, 1);
        assert_eq!(output.results[0].risk, 7.3);
        assert!(!output.results[0].favorite);
    }

    #[test]
    fn normalization_spreads_cohort_across_full_band() {
        let base = vec![
            record("LOW", 4.0),
            record("MID", 10.0),
            record("HIGH", 16.0),
        ];

        for _ in 0..20 {
            let mut records = base.clone();
            normalize_risk_scores(&mut records);
            let risk_of = |symbol: &str| {
                records.iter().find(|r| r.symbol == symbol).unwrap().risk
            };

            // Band edges 1 and 10, midpoint 5.5, jitter within +-0.25
            // plus one-decimal rounding
            assert!(risk_of("LOW") >= 1.0 && risk_of("LOW") <= 1.3);
            assert!(risk_of("MID") >= 5.2 && risk_of("MID") <= 5.8);
            assert!(risk_of("HIGH") >= 9.7 && risk_of("HIGH") <= 10.0);
        }
    }

    #[test]
    fn equal_cohort_jitters_around_midpoint() {
        let base = vec![record("A", 7.0), record("B", 7.0), record("C", 7.0)];

        for _ in 0..20 {
            let mut records = base.clone();
            normalize_risk_scores(&mut records);
            for record in &records {
                assert!(record.risk >= 4.0 && record.risk <= 6.0);
            }
        }
    }

    #[test]
    fn renormalization_is_stable_within_jitter() {
        let mut first = vec![record("LOW", 4.0), record("MID", 10.0), record("HIGH", 16.0)];
        normalize_risk_scores(&mut first);

        // A second pass rescales from the untouched raw bases
        let mut second = first.clone();
        normalize_risk_scores(&mut second);

        for (a, b) in first.iter().zip(&second) {
            assert!((a.risk - b.risk).abs() <= 0.6);
        }
    }

    #[test]
    fn rows_sort_by_risk_with_potential_tiebreak() {
        let mut safe = record("SAFE", 7.0);
        safe.risk = 2.0;
        let mut risky = record("RISKY", 7.0);
        risky.risk = 8.0;
        let mut high_upside = record("UPSIDE", 7.0);
        high_upside.risk = 2.0;
        high_upside.investment_potential = 9.0;

        let output = format_results(&[safe, risky, high_upside]);

        let symbols: Vec<&str> = output.results.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["UPSIDE", "SAFE", "RISKY"]);

        // Ids reflect insertion order, not display order
        assert_eq!(output.results[0].id, 3);
        assert_eq!(output.results[1].id, 1);
        assert_eq!(output.results[2].id, 2);
    }

    #[test]
    fn large_cohorts_with_adjacent_risks_sort_consistently() {
        // 0.05 steps put runs of rows on the same displayed tenth right
        // next to rows one tenth apart
        let mut records = Vec::new();
        for i in 0..60u32 {
            let scrambled = (i * 37) % 60;
            let mut entry = record(&format!("T{:02}", scrambled), 7.0);
            entry.risk = 2.0 + scrambled as f64 * 0.05;
            entry.investment_potential = (scrambled % 10) as f64 + 0.5;
            records.push(entry);
        }

        let output = format_results(&records);
        assert_eq!(output.results.len(), 60);

        let bucket = |risk: f64| (risk * 10.0).round() as i64;
        for pair in output.results.windows(2) {
            assert!(bucket(pair[0].risk) <= bucket(pair[1].risk));
            if bucket(pair[0].risk) == bucket(pair[1].risk) {
                assert!(pair[0].potential >= pair[1].potential);
            }
        }
    }

    #[tokio::test]
    async fn market_patch_updates_fresh_fields_and_keeps_stale_ones() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.upsert(record("PUP", 7.0)).await.unwrap();

        let fresh = TokenSnapshot {
            symbol: "PUP".to_string(),
            price: Some("$0.005".to_string()),
            volume: Some("$12k".to_string()),
            change_24h: Some("-35%".to_string()),
            chain: "ethereum".to_string(),
            ..Default::default()
        };

        let patched = store.patch_market_data(&[fresh]).await.unwrap();
        assert_eq!(patched, 1);

        let records = store.records.read().await;
        assert_eq!(records[0].price, 0.005);
        assert_eq!(records[0].volume, "$12k");
        assert_eq!(records[0].change_24h, -35.0);
        // Fields the snapshot left out keep their existing values
        assert_eq!(records[0].market_cap, "$1.2m");
        assert_eq!(records[0].age, "2h");
        // Risk and potential never move on a market patch
        assert_eq!(records[0].raw_risk_score, 7.0);
        assert_eq!(records[0].investment_potential, 5.0);
    }

    #[tokio::test]
    async fn market_patch_keeps_risks_ids_and_order_as_written() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.upsert(record("PUP", 4.0)).await.unwrap();
        store.upsert(record("DOGE", 10.0)).await.unwrap();
        store.upsert(record("PEPE", 16.0)).await.unwrap();

        let path = dir.path().join("ai_analyzer.json");
        let before: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        let fresh = TokenSnapshot {
            symbol: "DOGE".to_string(),
            price: Some("$0.31".to_string()),
            volume: Some("$2.1m".to_string()),
            chain: "ethereum".to_string(),
            ..Default::default()
        };
        assert_eq!(store.patch_market_data(&[fresh]).await.unwrap(), 1);

        let after: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        let before_rows = before["results"].as_array().unwrap();
        let after_rows = after["results"].as_array().unwrap();
        assert_eq!(before_rows.len(), after_rows.len());

        // A sync tick never moves scores, ids, or display order
        for (row_before, row_after) in before_rows.iter().zip(after_rows.iter()) {
            assert_eq!(row_before["symbol"], row_after["symbol"]);
            assert_eq!(row_before["id"], row_after["id"]);
            assert_eq!(row_before["risk"], row_after["risk"]);
            assert_eq!(row_before["potential"], row_after["potential"]);
        }

        let doge = after_rows.iter().find(|r| r["symbol"] == "DOGE").unwrap();
        assert_eq!(doge["price"], 0.31);
        assert_eq!(doge["volume"], "$2.1m");
    }

    #[tokio::test]
    async fn market_patch_ignores_unknown_symbols() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.upsert(record("PUP", 7.0)).await.unwrap();

        let fresh = TokenSnapshot {
            symbol: "OTHER".to_string(),
            price: Some("$1".to_string()),
            chain: "ethereum".to_string(),
            ..Default::default()
        };

        assert_eq!(store.patch_market_data(&[fresh]).await.unwrap(), 0);
        assert_eq!(store.patch_market_data(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn written_rows_carry_expected_shape() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut rec = record("PUP", 7.0);
        rec.image_url = Some("https://img.example/pup.png".to_string());
        store.upsert(rec).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("ai_analyzer.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        let row = &value["results"][0];

        assert_eq!(row["id"], 1);
        assert_eq!(row["symbol"], "PUP");
        assert_eq!(row["chain"], "ethereum");
        assert_eq!(row["marketCap"], "$1.2m");
        assert_eq!(row["change24h"], 120.0);
        assert_eq!(row["favorite"], false);
        assert_eq!(row["imageUrl"], "https://img.example/pup.png");
        // Rationale and timestamps stay internal
        assert!(row.get("rationale").is_none());
        assert!(row.get("lastAnalyzed").is_none());
    }
}
