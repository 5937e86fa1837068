pub mod rule;
pub mod taxonomy;
pub mod transaction;

pub use rule::{CategorizationRule, CategorizationResult, RuleMatchResult, RuleSource, RuleType};
pub use taxonomy::{CategoryTaxonomy, UNSPECIFIED};
pub use transaction::{Transaction, TransactionType};
