use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spendsort_categorize::{
    BatchReport, ConsoleOperator, LearnOutcome, Learner, MemoryRules, Pipeline, RuleBackend,
    TomlRuleFile,
};
use spendsort_core::{Category, Money, Transaction, YearMonth};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "spendsort", version, about = "Categorize credit-card exports by keyword rules")]
struct Cli {
    /// Config file (default: ./spendsort.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import the CSV folder, categorize, and export to the database
    Categorize {
        /// Learn keywords for this run only; the rule file is not written
        #[arg(long)]
        dry_run: bool,

        /// Skip writing categorized transactions to the database
        #[arg(long)]
        no_export: bool,

        /// Print batch stats as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or edit the keyword rules
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Spend per category from the database
    Report {
        /// Limit to one month (YYYY-MM)
        #[arg(long)]
        month: Option<YearMonth>,

        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    InitConfig,
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// List keywords per category
    List {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Add a keyword to a category
    Add { category: Category, keyword: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the operator prompt and results.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = config::config_path(cli.config.as_deref());

    match cli.command {
        Command::InitConfig => config::init_config(&config_path),
        Command::Categorize {
            dry_run,
            no_export,
            json,
        } => {
            let cfg = config::load_config(&config_path)?;
            categorize(&cfg, dry_run, no_export, json).await
        }
        Command::Rules { command } => {
            let cfg = config::load_config(&config_path)?;
            rules(&cfg, command)
        }
        Command::Report { month, json } => {
            let cfg = config::load_config(&config_path)?;
            report(&cfg, month, json).await
        }
    }
}

/// Where operator prompts are rendered. With `--json`, stdout carries only
/// the stats document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStream {
    Stdout,
    Stderr,
}

impl PromptStream {
    fn for_output(json: bool) -> Self {
        if json {
            PromptStream::Stderr
        } else {
            PromptStream::Stdout
        }
    }

    fn writer(self) -> Box<dyn Write> {
        match self {
            PromptStream::Stdout => Box::new(std::io::stdout()),
            PromptStream::Stderr => Box::new(std::io::stderr()),
        }
    }
}

fn run_batch<B: RuleBackend>(
    cfg: &AppConfig,
    backend: B,
    transactions: Vec<Transaction>,
    prompts: PromptStream,
) -> Result<BatchReport> {
    let mut store = backend
        .load()
        .with_context(|| format!("load rules from {}", cfg.rules_path.display()))?;
    let operator = ConsoleOperator::new(std::io::stdin().lock(), prompts.writer());
    let learner = Learner::new(operator, cfg.learning);
    let mut pipeline = Pipeline::new(learner, backend);
    Ok(pipeline.categorize_batch(transactions, &mut store))
}

async fn categorize(cfg: &AppConfig, dry_run: bool, no_export: bool, json: bool) -> Result<()> {
    let sources = cfg.sources()?;
    let transactions = spendsort_import::import_folder(&cfg.csv_folder, &sources)
        .with_context(|| format!("import {}", cfg.csv_folder.display()))?;

    let prompts = PromptStream::for_output(json);
    let rule_file = TomlRuleFile::new(&cfg.rules_path);
    let report = if dry_run {
        let store = rule_file
            .load()
            .with_context(|| format!("load rules from {}", cfg.rules_path.display()))?;
        run_batch(cfg, MemoryRules::new(store), transactions, prompts)?
    } else {
        run_batch(cfg, rule_file, transactions, prompts)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report.stats)?);
    } else {
        print_stats(&report);
    }

    if let Some(e) = &report.flush_error {
        eprintln!("warning: {e}. Keywords learned in this run were not saved.");
    }

    if !no_export {
        let pool = spendsort_storage::create_db(&cfg.database_path)
            .await
            .with_context(|| format!("open {}", cfg.database_path.display()))?;
        let summary = spendsort_storage::insert_transactions(&pool, &report.transactions).await?;
        if !json {
            println!(
                "\nExported {} new transactions to {} ({} already present)",
                summary.inserted,
                cfg.database_path.display(),
                summary.duplicates
            );
        }
    }

    Ok(())
}

fn print_stats(report: &BatchReport) {
    let stats = &report.stats;
    println!("\n=== Categorization ===");
    println!("Total:          {}", stats.total);
    println!("Matched by rule: {}", stats.rule_matched);
    println!("Manual:         {}", stats.manual);
    println!("Uncategorized:  {}", stats.unset);
    println!("New keywords:   {}", stats.keywords_learned);

    println!("\n{:<15} {:>8} {:>12}", "Category", "Keywords", "Spend");
    let totals = report.totals_by_category();
    for category in Category::ALL {
        let keywords = stats.rule_counts.get(&category).copied().unwrap_or(0);
        let spend = totals.get(&category).copied().unwrap_or_else(Money::zero);
        println!("{:<15} {:>8} {:>12}", category, keywords, spend.to_string());
    }

    if !stats.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &stats.warnings {
            println!("  - {warning}");
        }
    }
}

fn rules(cfg: &AppConfig, command: RulesCommand) -> Result<()> {
    let backend = TomlRuleFile::new(&cfg.rules_path);
    let mut store = backend
        .load()
        .with_context(|| format!("load rules from {}", cfg.rules_path.display()))?;

    match command {
        RulesCommand::List { category } => {
            for (cat, keywords) in store.iter() {
                if category.is_some_and(|c| c != cat) {
                    continue;
                }
                println!("{cat} ({})", keywords.len());
                for keyword in keywords {
                    println!("  {keyword}");
                }
            }
            for (keyword, categories) in store.conflicts() {
                eprintln!("warning: '{keyword}' is listed under {categories:?}");
            }
            Ok(())
        }
        RulesCommand::Add { category, keyword } => match store.learn(category, &keyword) {
            LearnOutcome::Added => {
                backend.flush(&store)?;
                println!("Added '{keyword}' to {category}");
                Ok(())
            }
            LearnOutcome::AlreadyPresent => {
                println!("'{keyword}' is already a {category} keyword");
                Ok(())
            }
            LearnOutcome::Conflict { existing } => {
                bail!("'{keyword}' already belongs to {existing}; not added to {category}")
            }
            LearnOutcome::EmptyKeyword => bail!("keyword is empty"),
        },
    }
}

async fn report(cfg: &AppConfig, month: Option<YearMonth>, json: bool) -> Result<()> {
    if !cfg.database_path.exists() {
        bail!(
            "no database at {}; run `spendsort categorize` first",
            cfg.database_path.display()
        );
    }
    let pool = spendsort_storage::create_db(&cfg.database_path)
        .await
        .with_context(|| format!("open {}", cfg.database_path.display()))?;
    let totals = spendsort_storage::category_totals(&pool, month).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    match month {
        Some(m) => println!("Spend for {m}"),
        None => {
            println!("Spend by month");
            for m in spendsort_storage::monthly_totals(&pool).await? {
                println!("  {}  {:>5} rows  {:>12}", m.month, m.count, m.total.to_string());
            }
            println!("\nSpend by category (all months)");
        }
    }
    for t in &totals {
        let name = t.category.map_or("Uncategorized", Category::name);
        println!("  {:<15} {:>5} rows  {:>12}", name, t.count, t.total.to_string());
    }
    Ok(())
}
