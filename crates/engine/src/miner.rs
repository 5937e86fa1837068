//! Unsupervised rule mining over a corpus of already-categorized
//! transactions.
//!
//! Per category group: exact-match mining over unique normalized
//! descriptions, contains-style mining over frequent words, and (in the
//! secondary mode) fuzzy grouping of near-duplicate merchant names. The
//! miner is tuned for precision: it never emits a rule below the configured
//! confidence threshold and never for a group with too few examples.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use tally_core::{CategorizationRule, RuleSource, RuleType};

use crate::normalize::normalize;
use crate::util::similarity_ratio;

/// Only the most frequent words of a group are considered for contains
/// mining.
const TOP_WORDS: usize = 5;

/// A single word must cover at least this share of its group to become a
/// contains rule. Suppresses generic words that would over-match unrelated
/// categories sharing common vocabulary.
const CONTAINS_COVERAGE_FLOOR: f64 = 0.6;

/// Generic financial vocabulary and web boilerplate that never identifies
/// a merchant.
const DEFAULT_SKIP_WORDS: &[&str] = &[
    "payment",
    "purchase",
    "debit",
    "credit",
    "card",
    "auto",
    "recurring",
    "online",
    "mobile",
    "terminal",
    "transaction",
    "transfer",
    "www",
    "com",
    "http",
    "https",
];

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Categories and patterns with fewer supporting transactions are
    /// dropped.
    pub minimum_transactions: usize,
    /// Minimum fraction of a group a pattern must cover to become a rule.
    pub confidence_threshold: f64,
    /// Exact-match patterns shorter than this are too ambiguous to keep.
    pub min_pattern_length: usize,
    /// Similarity at or above which two merchant names are grouped.
    pub fuzzy_similarity: f64,
    pub skip_words: Vec<String>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            minimum_transactions: 2,
            confidence_threshold: 0.3,
            min_pattern_length: 5,
            fuzzy_similarity: 0.8,
            skip_words: DEFAULT_SKIP_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One record of the historical corpus: a transaction together with the
/// category a human already assigned to it.
#[derive(Debug, Clone)]
pub struct HistoricalTransaction {
    pub description: String,
    pub normalized_description: String,
    pub category: String,
}

impl HistoricalTransaction {
    pub fn new(description: &str, category: &str) -> Self {
        HistoricalTransaction {
            description: description.to_string(),
            normalized_description: normalize(description),
            category: category.to_string(),
        }
    }
}

pub struct RuleMiner {
    config: MinerConfig,
}

impl RuleMiner {
    pub fn new(config: MinerConfig) -> Self {
        RuleMiner { config }
    }

    /// Mine exact-match and contains rules from the corpus. Output is
    /// pooled across groups and sorted by (confidence, supporting count)
    /// descending — an advisory ordering for human review, not consumed by
    /// the engine's own tie-break.
    pub fn mine(&self, corpus: &[HistoricalTransaction]) -> Vec<CategorizationRule> {
        self.mine_internal(corpus, false)
    }

    /// [`Self::mine`] plus fuzzy grouping of near-duplicate merchant names.
    pub fn mine_with_fuzzy(&self, corpus: &[HistoricalTransaction]) -> Vec<CategorizationRule> {
        self.mine_internal(corpus, true)
    }

    fn mine_internal(
        &self,
        corpus: &[HistoricalTransaction],
        fuzzy: bool,
    ) -> Vec<CategorizationRule> {
        let mut groups: BTreeMap<&str, Vec<&HistoricalTransaction>> = BTreeMap::new();
        for txn in corpus {
            groups.entry(&txn.category).or_default().push(txn);
        }

        let mut rules = Vec::new();
        for (category, txns) in &groups {
            if txns.len() < self.config.minimum_transactions {
                continue;
            }
            rules.extend(self.mine_exact(category, txns));
            rules.extend(self.mine_contains(category, txns));
            if fuzzy {
                rules.extend(self.mine_fuzzy_merchants(category, txns));
            }
        }

        rules.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.transaction_count.cmp(&a.transaction_count))
        });

        tracing::info!(
            rules = rules.len(),
            categories = groups.len(),
            transactions = corpus.len(),
            "rule mining complete"
        );
        rules
    }

    fn mine_exact(
        &self,
        category: &str,
        txns: &[&HistoricalTransaction],
    ) -> Vec<CategorizationRule> {
        let mut by_description: BTreeMap<&str, Vec<&HistoricalTransaction>> = BTreeMap::new();
        for txn in txns {
            by_description
                .entry(&txn.normalized_description)
                .or_default()
                .push(txn);
        }

        let mut rules = Vec::new();
        for (description, supporting) in &by_description {
            if supporting.len() < self.config.minimum_transactions
                || description.len() < self.config.min_pattern_length
            {
                continue;
            }
            let confidence = supporting.len() as f64 / txns.len() as f64;
            if confidence < self.config.confidence_threshold {
                continue;
            }
            rules.push(self.make_rule(
                RuleType::ExactMatch,
                description,
                category,
                confidence,
                supporting.len(),
                txns.len(),
                supporting.iter().map(|t| t.description.as_str()).take(3),
            ));
        }
        rules
    }

    fn mine_contains(
        &self,
        category: &str,
        txns: &[&HistoricalTransaction],
    ) -> Vec<CategorizationRule> {
        // Count each word once per transaction: coverage, not token
        // frequency.
        let mut coverage: HashMap<&str, usize> = HashMap::new();
        for txn in txns {
            let mut seen: Vec<&str> = Vec::new();
            for word in txn.normalized_description.split_whitespace() {
                if word.len() <= 3
                    || self.config.skip_words.iter().any(|s| s == word)
                    || seen.contains(&word)
                {
                    continue;
                }
                seen.push(word);
                *coverage.entry(word).or_insert(0) += 1;
            }
        }

        // Deterministic top-K: count descending, then alphabetical.
        let mut ranked: Vec<(&str, usize)> = coverage.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let mut rules = Vec::new();
        for (word, count) in ranked.into_iter().take(TOP_WORDS) {
            let confidence = count as f64 / txns.len() as f64;
            if count < self.config.minimum_transactions
                || confidence < CONTAINS_COVERAGE_FLOOR
                || confidence < self.config.confidence_threshold
            {
                continue;
            }
            rules.push(self.make_rule(
                RuleType::Contains,
                word,
                category,
                confidence,
                count,
                txns.len(),
                txns.iter()
                    .filter(|t| t.normalized_description.split_whitespace().any(|w| w == word))
                    .map(|t| t.description.as_str())
                    .take(3),
            ));
        }
        rules
    }

    fn mine_fuzzy_merchants(
        &self,
        category: &str,
        txns: &[&HistoricalTransaction],
    ) -> Vec<CategorizationRule> {
        // Merchant candidates in first-encounter order; the greedy pass
        // below depends on it.
        let mut merchants: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut examples: HashMap<String, Vec<String>> = HashMap::new();

        for txn in txns {
            let merchant = extract_merchant_name(&txn.description);
            if merchant.len() <= 2 {
                continue;
            }
            if !counts.contains_key(&merchant) {
                merchants.push(merchant.clone());
            }
            *counts.entry(merchant.clone()).or_insert(0) += 1;
            examples
                .entry(merchant)
                .or_default()
                .push(txn.description.clone());
        }

        // Greedy left-to-right clustering: each merchant joins at most one
        // group, scanning in encounter order. Order-dependent by design;
        // this mirrors the reference behavior rather than optimal
        // clustering.
        let mut used = vec![false; merchants.len()];
        let mut rules = Vec::new();

        for i in 0..merchants.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            let mut members = vec![i];
            for j in (i + 1)..merchants.len() {
                if !used[j]
                    && similarity_ratio(&merchants[i], &merchants[j]) >= self.config.fuzzy_similarity
                {
                    used[j] = true;
                    members.push(j);
                }
            }
            if members.len() < 2 {
                continue;
            }

            let combined: usize = members.iter().map(|&m| counts[&merchants[m]]).sum();
            if combined < self.config.minimum_transactions {
                continue;
            }
            let confidence = combined as f64 / txns.len() as f64;
            if confidence < self.config.confidence_threshold {
                continue;
            }

            // Most frequent member is the canonical pattern; ties keep the
            // earliest.
            let mut canonical_idx = members[0];
            for &m in &members[1..] {
                if counts[&merchants[m]] > counts[&merchants[canonical_idx]] {
                    canonical_idx = m;
                }
            }
            let canonical = merchants[canonical_idx].clone();

            let mut rule = self.make_rule(
                RuleType::FuzzyMerchant,
                &canonical,
                category,
                confidence,
                combined,
                txns.len(),
                examples
                    .get(&canonical)
                    .map(|e| e.iter().map(String::as_str))
                    .into_iter()
                    .flatten()
                    .take(2),
            );
            rule.merchant_name = Some(canonical);
            rules.push(rule);
        }
        rules
    }

    #[allow(clippy::too_many_arguments)]
    fn make_rule<'a>(
        &self,
        rule_type: RuleType,
        pattern: &str,
        category: &str,
        confidence: f64,
        transaction_count: usize,
        total_transactions: usize,
        examples: impl Iterator<Item = &'a str>,
    ) -> CategorizationRule {
        let mut rule = CategorizationRule::new(
            rule_type,
            RuleSource::HistoryBased,
            pattern,
            category,
            confidence,
        );
        rule.transaction_count = Some(transaction_count as u32);
        rule.total_transactions = Some(total_transactions as u32);
        rule.example_descriptions = examples.map(|s| s.to_string()).collect();
        rule
    }
}

static PROCESSOR_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"PAYPAL \*([^0-9\s]+)",
        r"SQ \*([^0-9\s]+)",
        r"TST\* ([^0-9\s]+)",
        r"AMZN MKTP ([^0-9\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Best-effort merchant extraction: a recognized payment-processor prefix
/// ("PROCESSOR *MERCHANT"), else the leading 1-2 meaningful tokens of the
/// description. Always uppercase.
pub fn extract_merchant_name(description: &str) -> String {
    let desc = description.trim().to_uppercase();

    for re in PROCESSOR_PREFIXES.iter() {
        if let Some(caps) = re.captures(&desc) {
            if let Some(m) = caps.get(1) {
                let merchant = clean_merchant(m.as_str());
                if merchant.len() > 2 {
                    return merchant;
                }
            }
        }
    }

    let mut words: Vec<&str> = Vec::new();
    for word in desc.split_whitespace().take(4) {
        if word.len() > 2 && !word.chars().all(|c| c.is_ascii_digit()) {
            words.push(word);
        }
        if words.len() >= 2 {
            break;
        }
    }

    if words.is_empty() {
        desc.chars().take(20).collect::<String>().trim().to_string()
    } else {
        words.join(" ")
    }
}

fn clean_merchant(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '&')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
