use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tally_core::{Transaction, TransactionType};
use tally_engine::{
    iterative_normalize, normalize, save_rules, HistoricalTransaction, MinerConfig, RuleMiner,
    RulesEngine,
};

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "Rule-based transaction categorizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Categorize a CSV of transactions against the rule tiers
    Classify {
        /// CSV with columns: date,description,amount,type
        input: PathBuf,

        /// Manually curated rules (highest priority)
        #[arg(long)]
        manual: Option<PathBuf>,

        /// Rules mined from categorized history
        #[arg(long)]
        history: Option<PathBuf>,

        /// Cached AI-generated rules
        #[arg(long)]
        ai: Option<PathBuf>,

        /// Write full results as JSON to this path instead of a summary
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Mine categorization rules from already-categorized transactions
    Mine {
        /// CSV with columns: description,category
        input: PathBuf,

        /// Where to write the mined rules (TOML)
        #[arg(long, short)]
        output: PathBuf,

        /// Also mine fuzzy merchant-name rules
        #[arg(long)]
        fuzzy: bool,

        /// Minimum transactions a pattern must cover
        #[arg(long, default_value_t = 2)]
        min_transactions: usize,

        /// Minimum precision for a mined rule (0.0 - 1.0)
        #[arg(long, default_value_t = 0.3)]
        confidence_threshold: f64,
    },
}

#[derive(Debug, Deserialize)]
struct ClassifyRecord {
    date: NaiveDate,
    description: String,
    amount: Decimal,
    #[serde(rename = "type")]
    transaction_type: TransactionType,
}

#[derive(Debug, Deserialize)]
struct MineRecord {
    description: String,
    category: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify {
            input,
            manual,
            history,
            ai,
            json,
        } => classify(&input, manual.as_deref(), history.as_deref(), ai.as_deref(), json),
        Command::Mine {
            input,
            output,
            fuzzy,
            min_transactions,
            confidence_threshold,
        } => mine(&input, &output, fuzzy, min_transactions, confidence_threshold),
    }
}

fn classify(
    input: &Path,
    manual: Option<&Path>,
    history: Option<&Path>,
    ai: Option<&Path>,
    json: Option<PathBuf>,
) -> Result<()> {
    let engine = RulesEngine::from_files(manual, history, ai);
    let stats = engine.stats();
    tracing::info!(
        manual = stats.manual_rules,
        history = stats.history_rules,
        ai = stats.ai_rules,
        "engine ready"
    );

    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("cannot open {}", input.display()))?;

    let mut transactions = Vec::new();
    for record in reader.deserialize() {
        let record: ClassifyRecord = record.context("malformed transaction row")?;
        let normalized = match iterative_normalize(&record.description) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("{e}; using single-pass normalization");
                normalize(&record.description)
            }
        };
        let mut transaction = Transaction::new(
            &record.description,
            &normalized,
            record.amount,
            record.date,
            record.transaction_type,
        );
        engine.categorize(&mut transaction);
        transactions.push(transaction);
    }

    if let Some(path) = json {
        let out = serde_json::to_string_pretty(&transactions)?;
        std::fs::write(&path, out)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("Wrote {} transactions to {}", transactions.len(), path.display());
        return Ok(());
    }

    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut uncategorized = 0usize;
    for transaction in &transactions {
        match &transaction.categorization {
            Some(c) => {
                *by_category.entry(c.category.clone()).or_default() += 1;
                *by_source.entry(c.source.to_string()).or_default() += 1;
            }
            None => uncategorized += 1,
        }
    }

    println!("{} transactions", transactions.len());
    for (category, count) in &by_category {
        println!("{count:>6}  {category}");
    }
    if uncategorized > 0 {
        println!("{uncategorized:>6}  (no match)");
    }
    println!();
    for (source, count) in &by_source {
        println!("{count:>6}  matched via {source} rules");
    }
    Ok(())
}

fn mine(
    input: &Path,
    output: &Path,
    fuzzy: bool,
    min_transactions: usize,
    confidence_threshold: f64,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("cannot open {}", input.display()))?;

    let mut history = Vec::new();
    for record in reader.deserialize() {
        let record: MineRecord = record.context("malformed history row")?;
        history.push(HistoricalTransaction::new(&record.description, &record.category));
    }

    let config = MinerConfig {
        minimum_transactions: min_transactions,
        confidence_threshold,
        ..MinerConfig::default()
    };
    let miner = RuleMiner::new(config.clone());
    let rules = if fuzzy {
        miner.mine_with_fuzzy(&history)
    } else {
        miner.mine(&history)
    };

    let mut metadata = toml::value::Table::new();
    metadata.insert(
        "source_transactions".to_string(),
        toml::Value::Integer(history.len() as i64),
    );
    metadata.insert(
        "minimum_transactions".to_string(),
        toml::Value::Integer(config.minimum_transactions as i64),
    );
    metadata.insert(
        "confidence_threshold".to_string(),
        toml::Value::Float(config.confidence_threshold),
    );

    println!("Mined {} rules from {} transactions", rules.len(), history.len());
    save_rules(output, rules, Some(metadata))?;
    println!("Wrote {}", output.display());
    Ok(())
}
