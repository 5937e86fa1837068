use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::rule::CategorizationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Debit,
    Credit,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Debit => write!(f, "debit"),
            TransactionType::Credit => write!(f, "credit"),
        }
    }
}

/// A single ledger transaction as seen by the categorization engine.
///
/// `description`, `amount` and `date` are immutable input facts.
/// `normalized_description` is derived once from `description` by the
/// caller (a pure function of it) and is the unit of comparison for every
/// rule type. The engine only ever writes the `categorization` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub description: String,
    pub normalized_description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorization: Option<CategorizationResult>,
}

impl Transaction {
    pub fn new(
        description: &str,
        normalized_description: &str,
        amount: Decimal,
        date: NaiveDate,
        transaction_type: TransactionType,
    ) -> Self {
        Transaction {
            description: description.to_string(),
            normalized_description: normalized_description.to_string(),
            amount,
            date,
            transaction_type,
            memo: None,
            guid: None,
            source_account: None,
            categorization: None,
        }
    }

    pub fn is_categorized(&self) -> bool {
        self.categorization.is_some()
    }
}
