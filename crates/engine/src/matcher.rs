//! Evaluation of a single normalized description against a single rule.
//!
//! Regex-bearing rules are compiled once, when a tier is built. An invalid
//! pattern is never fatal: it is logged and the rule simply cannot match
//! (an invalid exclude pattern degrades to "no exclusion").

use regex::{Regex, RegexBuilder};
use tally_core::{CategorizationRule, RuleType};

use crate::miner::extract_merchant_name;
use crate::util::similarity_ratio;

/// Similarity a merchant candidate must reach against a fuzzy-merchant
/// rule's canonical pattern.
const FUZZY_MATCH_THRESHOLD: f64 = 0.8;

/// A rule paired with its precompiled primary and exclude regexes.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: CategorizationRule,
    compiled_pattern: Option<Regex>,
    compiled_exclude: Option<Regex>,
}

impl CompiledRule {
    pub fn compile(rule: CategorizationRule) -> Self {
        let compiled_pattern = if rule.rule_type == RuleType::Regex {
            match case_insensitive(&rule.pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %rule.pattern, "invalid rule regex: {e}");
                    None
                }
            }
        } else {
            None
        };

        let compiled_exclude = rule.regex_exclude.as_deref().and_then(|pattern| {
            match case_insensitive(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, "invalid exclude regex, ignoring: {e}");
                    None
                }
            }
        });

        CompiledRule {
            rule,
            compiled_pattern,
            compiled_exclude,
        }
    }

    /// Does the normalized description satisfy this rule, including the
    /// exclusion veto?
    pub fn matches(&self, description: &str) -> bool {
        let matched = match self.rule.rule_type {
            RuleType::ExactMatch => description == self.rule.pattern,
            RuleType::Contains => description.contains(&self.rule.pattern),
            RuleType::Regex => self
                .compiled_pattern
                .as_ref()
                .is_some_and(|re| re.is_match(description)),
            RuleType::FuzzyMerchant => {
                let merchant = extract_merchant_name(description);
                similarity_ratio(&merchant, &self.rule.pattern) >= FUZZY_MATCH_THRESHOLD
            }
        };

        if matched {
            if let Some(exclude) = &self.compiled_exclude {
                if exclude.is_match(description) {
                    return false;
                }
            }
        }

        matched
    }
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

pub(crate) fn compile_all(rules: Vec<CategorizationRule>) -> Vec<CompiledRule> {
    rules.into_iter().map(CompiledRule::compile).collect()
}
