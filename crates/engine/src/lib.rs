pub mod engine;
pub mod fallback;
pub mod matcher;
pub mod miner;
pub mod normalize;
pub mod store;
pub(crate) mod util;

pub use engine::{EngineStats, RulesEngine};
pub use fallback::{Categorizer, CategorizerStats, FallbackClassifier, FallbackOutcome, ProposedRule};
pub use matcher::CompiledRule;
pub use miner::{extract_merchant_name, HistoricalTransaction, MinerConfig, RuleMiner};
pub use normalize::{iterative_normalize, normalize, normalize_with_numbers, NormalizeError};
pub use store::{load_rules, save_rules, RuleFile, StoreError};
