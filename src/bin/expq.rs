//! expq CLI — operator interface to the experiment store.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use uuid::Uuid;

use expq_rs::config::Config;
use expq_rs::db::Db;
use expq_rs::enrich::PassthroughResolver;
use expq_rs::error::Error;
use expq_rs::filter::AcceptAll;
use expq_rs::model::IncludeExperimentKeys;
use expq_rs::store::ExperimentStore;
use expq_rs::telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser)]
#[command(name = "expq", about = "Experiment store and hypothesis work queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run pending migrations
    Migrate,
    /// Check database connectivity
    Health,
    /// Claim the next pending experiment and print its id
    Claim,
    /// Fetch one experiment document and print it as JSON
    Show {
        /// Experiment ID
        id: Uuid,
        /// Include dataset row input records
        #[arg(long)]
        inputs: bool,
        /// Include prompt templates and their resolved parents
        #[arg(long)]
        prompt_version: bool,
        /// Include response bodies
        #[arg(long)]
        response_bodies: bool,
    },
    /// List this organization's experiments, newest first
    List {
        /// Organization ID to scope the listing to
        #[arg(long)]
        organization: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "expq".to_string(),
    })?;

    let db = Db::connect(config.database_url.expose_secret()).await?;

    let result = match cli.command {
        Command::Migrate => {
            db.migrate().await?;
            println!("migrations applied");
            Ok(())
        }
        Command::Health => {
            db.health_check().await?;
            println!("ok");
            Ok(())
        }
        Command::Claim => match db.claim_next_experiment().await? {
            Some(id) => {
                println!("{id}");
                Ok(())
            }
            None => {
                println!("queue empty");
                Ok(())
            }
        },
        Command::Show {
            id,
            inputs,
            prompt_version,
            response_bodies,
        } => {
            // Single-id lookups are not org-scoped; the org id on the store
            // only drives listing, so a nil placeholder is fine here.
            let store = ExperimentStore::new(Arc::new(db), Uuid::nil(), AcceptAll, PassthroughResolver);
            let include = IncludeExperimentKeys {
                inputs,
                prompt_version,
                response_bodies,
            };
            match store.get_experiment(id, &include).await {
                Ok(experiment) => {
                    println!("{}", serde_json::to_string_pretty(&experiment)?);
                    Ok(())
                }
                Err(Error::NotFound(id)) => {
                    println!("not found: {id}");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::List { organization } => {
            let store = ExperimentStore::new(
                Arc::new(db),
                organization,
                AcceptAll,
                PassthroughResolver,
            );
            let experiments = store
                .list_experiments(&serde_json::Value::Null, &IncludeExperimentKeys::default())
                .await?;
            for experiment in &experiments {
                println!(
                    "{}  {}  hypotheses={}",
                    experiment.id,
                    experiment.created_at,
                    experiment.hypotheses.len()
                );
            }
            Ok(())
        }
    };

    // One-shot process: push out whatever the command recorded.
    guard.force_flush();
    result
}
