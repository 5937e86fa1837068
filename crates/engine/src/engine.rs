//! Priority-tiered rule resolution.
//!
//! Three independent rule pools — manual, history, AI — resolved in strict
//! priority order: the first tier that produces any match wins, and tiers
//! are never merged upward. Between the manual tier and the combined
//! history+AI pool sits the credit filter: incoming funds are never
//! silently assigned an expense category.

use std::path::Path;
use std::sync::Arc;

use tally_core::{
    CategorizationResult, CategorizationRule, RuleMatchResult, RuleSource, RuleType, Transaction,
    TransactionType, UNSPECIFIED,
};

use crate::matcher::{compile_all, CompiledRule};
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub manual_rules: usize,
    pub history_rules: usize,
    pub ai_rules: usize,
}

impl EngineStats {
    pub fn total(&self) -> usize {
        self.manual_rules + self.history_rules + self.ai_rules
    }
}

pub struct RulesEngine {
    manual: Vec<CompiledRule>,
    history: Vec<CompiledRule>,
    // The AI tier is the only one mutated after construction; it is
    // republished wholesale so concurrent readers holding the previous
    // snapshot never observe a partially updated list.
    ai: Arc<Vec<CompiledRule>>,
}

impl RulesEngine {
    pub fn new(
        manual: Vec<CategorizationRule>,
        history: Vec<CategorizationRule>,
        ai: Vec<CategorizationRule>,
    ) -> Self {
        let engine = RulesEngine {
            manual: compile_all(manual),
            history: compile_all(history),
            ai: Arc::new(compile_all(ai)),
        };
        let stats = engine.stats();
        tracing::info!(
            manual = stats.manual_rules,
            history = stats.history_rules,
            ai = stats.ai_rules,
            "rules engine initialized"
        );
        engine
    }

    /// Build an engine from up to three rule files. A missing or malformed
    /// file is logged and its tier left empty; startup never fails on rule
    /// sources.
    pub fn from_files(
        manual_path: Option<&Path>,
        history_path: Option<&Path>,
        ai_path: Option<&Path>,
    ) -> Self {
        let load = |path: Option<&Path>, source| {
            path.map(|p| store::load_rules(p, source)).unwrap_or_default()
        };
        RulesEngine::new(
            load(manual_path, RuleSource::Manual),
            load(history_path, RuleSource::HistoryBased),
            load(ai_path, RuleSource::AiGenerated),
        )
    }

    /// Resolve a transaction to a rule match, or `matched = false` when no
    /// tier produces a candidate (the fallback classifier is then the
    /// caller's responsibility). Pure with respect to engine state.
    pub fn classify(&self, transaction: &Transaction) -> RuleMatchResult {
        let description = &transaction.normalized_description;

        // Priority 1: manual rules, the authoritative override tier.
        if let Some(rule) = find_best_match(description, self.manual.iter()) {
            return RuleMatchResult::hit(rule.clone(), "Matched manual rule");
        }

        // Priority 2: credits (payments, refunds) require manual review.
        if transaction.transaction_type == TransactionType::Credit {
            let mut credit_rule = CategorizationRule::new(
                RuleType::ExactMatch,
                RuleSource::Manual,
                description,
                UNSPECIFIED,
                1.0,
            );
            credit_rule.note = Some("Credit transactions are not auto-categorized".to_string());
            return RuleMatchResult::hit(
                credit_rule,
                "Credit transaction - not auto-categorized",
            );
        }

        // Priority 3: history and AI rules as one pool, history listed
        // first so equal-confidence ties resolve deterministically.
        let combined = self.history.iter().chain(self.ai.iter());
        if let Some(rule) = find_best_match(description, combined) {
            let reason = match rule.rule_source {
                RuleSource::AiGenerated => "Matched AI rule",
                _ => "Matched history rule",
            };
            return RuleMatchResult::hit(rule.clone(), reason);
        }

        RuleMatchResult::miss("No matching rule found")
    }

    /// Classify and attach the outcome to the transaction. Leaves the
    /// transaction untouched when nothing matched.
    pub fn categorize(&self, transaction: &mut Transaction) {
        let result = self.classify(transaction);
        if let Some(rule) = result.rule {
            transaction.categorization = Some(CategorizationResult {
                category: rule.category.clone(),
                confidence: rule.confidence,
                source: rule.rule_source,
                matched_rule: Some(rule),
                reasoning: result.reason,
            });
        }
    }

    /// Append newly generated rules to the AI tier by publishing a fresh
    /// list (immutable swap; see module docs).
    pub fn add_ai_rules(&mut self, rules: Vec<CategorizationRule>) {
        if rules.is_empty() {
            return;
        }
        let mut next: Vec<CompiledRule> = (*self.ai).clone();
        next.extend(compile_all(rules));
        self.ai = Arc::new(next);
    }

    /// Snapshot of the AI tier, e.g. for persisting rules accumulated at
    /// runtime.
    pub fn ai_rules(&self) -> Vec<CategorizationRule> {
        self.ai.iter().map(|cr| cr.rule.clone()).collect()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            manual_rules: self.manual.len(),
            history_rules: self.history.len(),
            ai_rules: self.ai.len(),
        }
    }
}

/// Highest-confidence match wins; ties go to the earliest rule in list
/// order, which keeps classification deterministic.
fn find_best_match<'a, I>(description: &str, rules: I) -> Option<&'a CategorizationRule>
where
    I: Iterator<Item = &'a CompiledRule>,
{
    let mut best: Option<&CompiledRule> = None;
    for cr in rules {
        if !cr.matches(description) {
            continue;
        }
        match best {
            Some(b) if cr.rule.confidence <= b.rule.confidence => {}
            _ => best = Some(cr),
        }
    }
    best.map(|cr| &cr.rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn tx(description: &str, ty: TransactionType) -> Transaction {
        Transaction::new(
            description,
            description,
            Decimal::new(2500, 2),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ty,
        )
    }

    fn rule(
        rule_type: RuleType,
        source: RuleSource,
        pattern: &str,
        category: &str,
        confidence: f64,
    ) -> CategorizationRule {
        CategorizationRule::new(rule_type, source, pattern, category, confidence)
    }

    fn contains(source: RuleSource, pattern: &str, category: &str, confidence: f64) -> CategorizationRule {
        rule(RuleType::Contains, source, pattern, category, confidence)
    }

    #[test]
    fn manual_rule_wins_over_history_regardless_of_confidence() {
        let engine = RulesEngine::new(
            vec![contains(
                RuleSource::Manual,
                "netflix",
                "Expenses.Bills.Streaming Services",
                0.6,
            )],
            vec![contains(
                RuleSource::HistoryBased,
                "netflix",
                "Expenses.Entertainment",
                0.99,
            )],
            vec![],
        );
        let result = engine.classify(&tx("netflix.com", TransactionType::Debit));
        assert!(result.matched);
        assert_eq!(
            result.rule.unwrap().category,
            "Expenses.Bills.Streaming Services"
        );
    }

    #[test]
    fn credit_without_manual_match_returns_unspecified_sentinel() {
        let engine = RulesEngine::new(
            vec![],
            vec![contains(
                RuleSource::HistoryBased,
                "payment",
                "Expenses.Bills",
                0.9,
            )],
            vec![],
        );
        let result = engine.classify(&tx("internet payment thank you", TransactionType::Credit));
        assert!(result.matched);
        let rule = result.rule.unwrap();
        assert_eq!(rule.category, UNSPECIFIED);
        assert_eq!(rule.confidence, 1.0);
    }

    #[test]
    fn manual_rule_still_applies_to_credits() {
        let engine = RulesEngine::new(
            vec![contains(
                RuleSource::Manual,
                "refund",
                "Income.Refunds",
                1.0,
            )],
            vec![],
            vec![],
        );
        let result = engine.classify(&tx("merchant refund", TransactionType::Credit));
        assert_eq!(result.rule.unwrap().category, "Income.Refunds");
    }

    #[test]
    fn history_and_ai_resolve_as_one_pool_by_confidence() {
        let engine = RulesEngine::new(
            vec![],
            vec![contains(
                RuleSource::HistoryBased,
                "starbucks",
                "Expenses.Dining Out",
                0.85,
            )],
            vec![contains(
                RuleSource::AiGenerated,
                "starbucks",
                "Expenses.Coffee",
                0.92,
            )],
        );
        let result = engine.classify(&tx("starbucks #1234", TransactionType::Debit));
        assert_eq!(result.rule.unwrap().category, "Expenses.Coffee");
    }

    #[test]
    fn equal_confidence_tie_goes_to_history_before_ai() {
        let engine = RulesEngine::new(
            vec![],
            vec![contains(
                RuleSource::HistoryBased,
                "starbucks",
                "Expenses.Dining Out",
                0.9,
            )],
            vec![contains(
                RuleSource::AiGenerated,
                "starbucks",
                "Expenses.Coffee",
                0.9,
            )],
        );
        let result = engine.classify(&tx("starbucks #1234", TransactionType::Debit));
        let rule = result.rule.unwrap();
        assert_eq!(rule.category, "Expenses.Dining Out");
        assert_eq!(rule.rule_source, RuleSource::HistoryBased);
    }

    #[test]
    fn unmatched_debit_reports_no_match() {
        let engine = RulesEngine::new(vec![], vec![], vec![]);
        let result = engine.classify(&tx("unknown merchant xyz", TransactionType::Debit));
        assert!(!result.matched);
        assert!(result.rule.is_none());
    }

    #[test]
    fn classify_is_deterministic_across_calls() {
        let engine = RulesEngine::new(
            vec![],
            vec![
                contains(RuleSource::HistoryBased, "uber", "Expenses.Transport", 0.8),
                contains(RuleSource::HistoryBased, "uber", "Expenses.Travel", 0.8),
            ],
            vec![],
        );
        let t = tx("uber *trip", TransactionType::Debit);
        let first = engine.classify(&t).rule.unwrap().category;
        for _ in 0..10 {
            assert_eq!(engine.classify(&t).rule.as_ref().unwrap().category, first);
        }
        // Equal confidence: the earlier rule wins.
        assert_eq!(first, "Expenses.Transport");
    }

    #[test]
    fn categorize_attaches_result_to_transaction() {
        let engine = RulesEngine::new(
            vec![contains(
                RuleSource::Manual,
                "netflix",
                "Expenses.Bills.Streaming Services",
                1.0,
            )],
            vec![],
            vec![],
        );
        let mut t = tx("netflix.com", TransactionType::Debit);
        engine.categorize(&mut t);
        let cat = t.categorization.expect("should be categorized");
        assert_eq!(cat.category, "Expenses.Bills.Streaming Services");
        assert_eq!(cat.source, RuleSource::Manual);
        assert!(cat.matched_rule.is_some());
    }

    #[test]
    fn categorize_leaves_unmatched_transaction_untouched() {
        let engine = RulesEngine::new(vec![], vec![], vec![]);
        let mut t = tx("unknown merchant xyz", TransactionType::Debit);
        engine.categorize(&mut t);
        assert!(t.categorization.is_none());
    }

    #[test]
    fn add_ai_rules_publishes_a_new_tier() {
        let mut engine = RulesEngine::new(vec![], vec![], vec![]);
        assert!(!engine
            .classify(&tx("chipotle 1234", TransactionType::Debit))
            .matched);

        engine.add_ai_rules(vec![rule(
            RuleType::Regex,
            RuleSource::AiGenerated,
            r"chipotle.*",
            "Expenses.Dining Out",
            0.92,
        )]);
        let result = engine.classify(&tx("chipotle 1234", TransactionType::Debit));
        assert_eq!(result.rule.unwrap().category, "Expenses.Dining Out");
        assert_eq!(engine.stats().ai_rules, 1);
        assert_eq!(engine.ai_rules().len(), 1);
    }

    #[test]
    fn empty_tiers_yield_no_candidates_without_error() {
        let engine = RulesEngine::from_files(None, None, None);
        assert_eq!(engine.stats().total(), 0);
        assert!(!engine
            .classify(&tx("anything", TransactionType::Debit))
            .matched);
    }

    #[test]
    fn excluded_rule_never_reports_a_match() {
        let engine = RulesEngine::new(
            vec![CategorizationRule::new(
                RuleType::Contains,
                RuleSource::Manual,
                "amazon",
                "Expenses.Shopping",
                1.0,
            )
            .with_exclude("prime video")],
            vec![],
            vec![],
        );
        assert!(!engine
            .classify(&tx("amazon prime video", TransactionType::Debit))
            .matched);
    }
}
