use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leadgen_storage::{LeadLedger, StateStore};
use leadgen_sync::{load_query_catalog, AgentConfig, AgentController, AgentParts};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "leadgen")]
#[command(about = "Lead Agent command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dashboard and control API (default).
    Serve,
    /// One headless run from the saved checkpoint; ctrl-c stops it cleanly.
    Run,
    /// Print saved progress and ledger counters.
    Status,
    /// Rewind the checkpoint to the first query.
    Reset,
    /// Rebuild the duplicate cache from the remote ledger.
    Resync,
    /// List the query sequence.
    Queries {
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("leadgen=info"))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let config = AgentConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => leadgen_web::serve_from_env().await?,
        Commands::Run => {
            let controller = Arc::new(AgentController::from_config(&config).await?);
            let stopper = Arc::clone(&controller);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("stopping run");
                        stopper.stop();
                    }
                    Err(err) => warn!(error = %err, "could not listen for ctrl-c"),
                }
            });
            controller.start().await;
            print_outcome(controller.wait().await)?;
        }
        Commands::Status => {
            let catalog = load_query_catalog(&config.queries_file).await?;
            let total = catalog.queries().len();
            let store = StateStore::new(&config.state_dir);
            let progress = store.load_progress().await.min(total);
            let visited = store.load_visited().await.len();
            let cache = store.load_cache().await;
            let ledger = LeadLedger::new(&config.leads_csv).scan().await;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "progress": progress,
                    "total_queries": total,
                    "visited_places": visited,
                    "cached_businesses": cache.names.len(),
                    "last_sync": cache.last_sync,
                    "ledger_rows": ledger.rows,
                    "ledger_with_email": ledger.with_email,
                }))?
            );
        }
        Commands::Reset => {
            StateStore::new(&config.state_dir).save_progress(0).await?;
            println!("progress reset to query 0");
        }
        Commands::Resync => {
            let controller = AgentController::restore(AgentParts::from_config(&config).await?).await;
            let count = controller.resync().await;
            println!("known businesses: {count}");
        }
        Commands::Queries { limit } => {
            let queries = load_query_catalog(&config.queries_file).await?.queries();
            let shown = limit.unwrap_or(queries.len());
            for (index, query) in queries.iter().take(shown).enumerate() {
                println!("{index:>4}  {query}");
            }
            println!("{} queries", queries.len());
        }
    }

    Ok(())
}

fn print_outcome(outcome: Option<leadgen_sync::RunOutcome>) -> Result<()> {
    match outcome {
        Some(outcome) => println!("{}", serde_json::to_string(&outcome)?),
        None => eprintln!("run worker ended without an outcome"),
    }
    Ok(())
}
