use anyhow::Result;
use clap::{Parser, Subcommand};
use px_workbench::engine::PolarsEngine;
use px_workbench::ingest::HttpFetcher;
use px_workbench::{QueryResult, Workbench};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "px-workbench")]
#[command(about = "Workbench for exploring PxStat datasets in an embedded analytical engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a dataset by matrix code and show its schema
    Load {
        /// Dataset matrix code, e.g. PEA01
        code: String,
    },
    /// Load one or more datasets, then run ad-hoc SQL against them
    Sql {
        /// Dataset matrix codes to load first
        #[arg(short, long)]
        load: Vec<String>,
        /// The query to run
        query: String,
        /// Write the result as CSV to this templated file name
        #[arg(long)]
        export: bool,
    },
    /// Show per-column value frequencies for a loaded dataset
    Values {
        code: String,
        column: String,
    },
    /// Propose a join key and check key overlap between two datasets
    Join {
        left_code: String,
        right_code: String,
    },
    /// Search the remote dataset catalog
    Catalog {
        /// Optional substring filter over code and title
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let workbench = Workbench::new(Arc::new(PolarsEngine::new()), Arc::new(HttpFetcher::new()));

    match cli.command {
        Command::Load { code } => {
            let Some(relation) = workbench.load_dataset(&code).await? else {
                println!("Nothing to load.");
                return Ok(());
            };
            println!("Loaded {relation}");
            for col in workbench.describe(&relation).await? {
                let marker = if col.is_continuous { " (continuous)" } else { "" };
                println!("  {} [{}]{}", col.name, col.declared_type, marker);
            }
        }
        Command::Sql { load, query, export } => {
            for code in &load {
                workbench.load_dataset(code).await?;
            }
            let result = workbench.run_sql(&query).await?;
            print_result(&result);
            if export {
                let (file_name, body) = workbench.export_result(&result).await?;
                std::fs::write(&file_name, body)?;
                info!("exported {}", file_name);
            }
        }
        Command::Values { code, column } => {
            let Some(relation) = workbench.load_dataset(&code).await? else {
                println!("Nothing to load.");
                return Ok(());
            };
            for entry in workbench.drill_down(&relation, &column).await? {
                let shown = match &entry.value {
                    serde_json::Value::Null => "NULL".to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                println!("{:>8}  {}", entry.count, shown);
            }
        }
        Command::Join {
            left_code,
            right_code,
        } => {
            let left = workbench
                .load_dataset(&left_code)
                .await?
                .ok_or_else(|| anyhow::anyhow!("empty left code"))?;
            let right = workbench
                .load_dataset(&right_code)
                .await?
                .ok_or_else(|| anyhow::anyhow!("empty right code"))?;
            let proposal = workbench.propose_join(&left, &right).await?;
            match &proposal.chosen_key {
                Some(key) => {
                    println!("Shared columns: {}", proposal.candidate_keys.join(", "));
                    println!("Suggested key: {key}");
                    let report = workbench.check_overlap(&left, &right).await?;
                    println!(
                        "{} has {} distinct values, {} has {}; {} match ({:.1}% of {})",
                        left,
                        report.distinct_left,
                        right,
                        report.distinct_right,
                        report.matching_keys,
                        report.match_percent,
                        left,
                    );
                }
                None => println!("No matching column names found; pick the keys manually."),
            }
            println!("\n{}", proposal.template());
        }
        Command::Catalog { query } => {
            let count = workbench.load_catalog().await?;
            info!("catalog holds {} datasets", count);
            let hits = workbench
                .search_catalog(query.as_deref().unwrap_or(""))
                .await;
            for (sector, entries) in px_workbench::catalog::sectioned(&hits) {
                println!("{sector}");
                for entry in entries {
                    println!("  {:<10} {}", entry.id, entry.title);
                }
            }
        }
    }
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("{}", result.columns.join(" | "));
    for row in &result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    println!("({} rows)", result.row_count);
}
