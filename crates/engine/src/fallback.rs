//! Seam to the external fallback classifier, plus the orchestration that
//! ties it to the rules engine.
//!
//! The fallback (an LLM in production, a mock in tests) is only consulted
//! when the rules engine reports no match. Whatever it proposes is
//! validated against the category taxonomy before it is trusted: an
//! out-of-taxonomy category is corrected to the Unspecified sentinel with
//! zero confidence, and a proposed rule carrying an invalid category is
//! discarded rather than cached.

use tally_core::{
    CategorizationResult, CategorizationRule, CategoryTaxonomy, RuleSource, RuleType, Transaction,
    UNSPECIFIED,
};

use crate::engine::RulesEngine;

/// Rule suggested by the fallback for caching into the AI tier.
#[derive(Debug, Clone)]
pub struct ProposedRule {
    pub pattern: String,
    pub rule_type: RuleType,
    pub category: String,
    pub confidence: f64,
    pub merchant_name: Option<String>,
}

/// What the fallback classifier produced for one transaction.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub category: String,
    pub confidence: f64,
    pub reasoning: String,
    pub proposed_rule: Option<ProposedRule>,
}

/// External classifier consumed by the core; invoked only on rule misses.
pub trait FallbackClassifier {
    fn classify(&self, transaction: &Transaction, taxonomy: &CategoryTaxonomy) -> FallbackOutcome;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategorizerStats {
    pub rule_hits: usize,
    pub fallback_calls: usize,
    pub invalid_proposals: usize,
}

/// Rules-first categorization with fallback: the full classify-or-fallback
/// pass over single transactions or batches, accumulating any rules the
/// fallback proposes into the engine's AI tier.
pub struct Categorizer<F> {
    engine: RulesEngine,
    taxonomy: CategoryTaxonomy,
    fallback: F,
    new_ai_rules: Vec<CategorizationRule>,
    stats: CategorizerStats,
}

impl<F: FallbackClassifier> Categorizer<F> {
    pub fn new(engine: RulesEngine, taxonomy: CategoryTaxonomy, fallback: F) -> Self {
        Categorizer {
            engine,
            taxonomy,
            fallback,
            new_ai_rules: Vec::new(),
            stats: CategorizerStats::default(),
        }
    }

    pub fn categorize(&mut self, transaction: &mut Transaction) {
        let result = self.engine.classify(transaction);
        if let Some(rule) = result.rule {
            self.stats.rule_hits += 1;
            transaction.categorization = Some(CategorizationResult {
                category: rule.category.clone(),
                confidence: rule.confidence,
                source: rule.rule_source,
                matched_rule: Some(rule),
                reasoning: result.reason,
            });
            return;
        }

        self.stats.fallback_calls += 1;
        let outcome = self.fallback.classify(transaction, &self.taxonomy);

        let (category, confidence) = if self.taxonomy.is_valid(&outcome.category) {
            (outcome.category, outcome.confidence)
        } else {
            self.stats.invalid_proposals += 1;
            tracing::warn!(
                proposed = %outcome.category,
                description = %transaction.normalized_description,
                "fallback proposed a category outside the taxonomy"
            );
            (UNSPECIFIED.to_string(), 0.0)
        };

        if let Some(proposed) = outcome.proposed_rule {
            self.accept_proposed_rule(proposed);
        }

        transaction.categorization = Some(CategorizationResult {
            category,
            confidence,
            matched_rule: None,
            source: RuleSource::AiGenerated,
            reasoning: outcome.reasoning,
        });
    }

    pub fn categorize_batch(&mut self, transactions: &mut [Transaction]) {
        for transaction in transactions {
            self.categorize(transaction);
        }
    }

    fn accept_proposed_rule(&mut self, proposed: ProposedRule) {
        if !self.taxonomy.is_valid(&proposed.category) {
            self.stats.invalid_proposals += 1;
            tracing::warn!(
                category = %proposed.category,
                pattern = %proposed.pattern,
                "discarding proposed rule with invalid category"
            );
            return;
        }
        let mut rule = CategorizationRule::new(
            proposed.rule_type,
            RuleSource::AiGenerated,
            &proposed.pattern,
            &proposed.category,
            proposed.confidence,
        );
        rule.merchant_name = proposed.merchant_name;
        self.new_ai_rules.push(rule.clone());
        self.engine.add_ai_rules(vec![rule]);
    }

    /// Rules proposed by the fallback during this run, for persisting to
    /// the AI tier's file.
    pub fn new_ai_rules(&self) -> &[CategorizationRule] {
        &self.new_ai_rules
    }

    pub fn stats(&self) -> CategorizerStats {
        self.stats
    }

    pub fn engine(&self) -> &RulesEngine {
        &self.engine
    }
}
