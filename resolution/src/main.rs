//! Command-line front end for the resolution engine
//!
//! Each invocation loads the JSON state snapshot, runs one operation and
//! writes the snapshot back when the operation changed anything.
//!
//! # Usage
//!
//! ```bash
//! # Checklist scoring finished: open the record
//! resolution create pump-7 mech-12 elec-4 --system-verdict monitor --urgency-score 42.5
//!
//! # Inspector verdicts
//! resolution submit <record-id> mechanical_inspector operational
//! resolution submit <record-id> electrical_inspector stop \
//!     --justification "Exposed conductor at the junction box, arcing marks on the cover plate"
//!
//! # Inspect and list
//! resolution show <record-id>
//! resolution pending engineer
//!
//! # Custom configuration
//! RESOLUTION_STATE_PATH=/var/lib/resolution/state.json resolution pending admin
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use resolution::{
    AssessmentStore, EngineConfig, EscalationLevel, RecommendationSource, ResolutionEngine,
    ResolutionError, Role, Severity, SystemRecommendation,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON state snapshot (overrides RESOLUTION_STATE_PATH)
    #[arg(long, global = true)]
    state_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the assessment record for a completed inspection cycle
    Create {
        equipment_id: String,
        mechanical_inspector_id: String,
        electrical_inspector_id: String,

        /// Automated checklist verdict
        #[arg(long)]
        system_verdict: Option<Severity>,

        /// Automated urgency score
        #[arg(long)]
        urgency_score: Option<f64>,

        /// At least one critical checklist item failed
        #[arg(long, default_value_t = false)]
        critical: bool,
    },

    /// Submit a verdict for a role
    Submit {
        record_id: String,
        /// mechanical_inspector, electrical_inspector, engineer or admin
        role: Role,
        /// operational, monitor or stop
        verdict: Severity,

        #[arg(long)]
        justification: Option<String>,
    },

    /// Show a record with its audit trail
    Show { record_id: String },

    /// List open records awaiting a tier (inspector, engineer, admin)
    Pending { tier: EscalationLevel },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("resolution=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::load(args.config.as_deref())?;
    if let Some(path) = args.state_path {
        config.state_path = path;
    }
    tracing::debug!("State path: {}", config.state_path.display());

    match run(&config, args.command) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let structured = e.to_structured();
            println!(
                "{}",
                serde_json::to_string_pretty(&structured).context("Failed to encode error")?
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(config: &EngineConfig, command: Command) -> Result<serde_json::Value, ResolutionError> {
    let store = AssessmentStore::load_from(&config.state_path)?.shared();

    let (output, dirty) = match command {
        Command::Create {
            equipment_id,
            mechanical_inspector_id,
            electrical_inspector_id,
            system_verdict,
            urgency_score,
            critical,
        } => {
            let recommendation = match (system_verdict, urgency_score) {
                (Some(verdict), Some(score)) => {
                    Some(SystemRecommendation::new(verdict, score, critical))
                }
                _ => None,
            };
            let engine = build_engine(config, store.clone(), Arc::new(recommendation));
            let record = engine.create(
                &equipment_id,
                &mechanical_inspector_id,
                &electrical_inspector_id,
            )?;
            (to_value(&record)?, true)
        }
        Command::Submit {
            record_id,
            role,
            verdict,
            justification,
        } => {
            let engine = build_engine(config, store.clone(), Arc::new(None::<SystemRecommendation>));
            let receipt =
                engine.submit_verdict(&record_id, role, verdict, justification.as_deref())?;
            let dirty = !receipt.duplicate;
            (to_value(&receipt)?, dirty)
        }
        Command::Show { record_id } => {
            let engine = build_engine(config, store.clone(), Arc::new(None::<SystemRecommendation>));
            (to_value(&engine.record(&record_id)?)?, false)
        }
        Command::Pending { tier } => {
            let engine = build_engine(config, store.clone(), Arc::new(None::<SystemRecommendation>));
            (to_value(&engine.pending(tier)?)?, false)
        }
    };

    if dirty {
        store.save_to(&config.state_path)?;
    }
    Ok(output)
}

fn build_engine(
    config: &EngineConfig,
    store: resolution::SharedAssessmentStore,
    recommendations: Arc<dyn RecommendationSource>,
) -> ResolutionEngine {
    ResolutionEngine::with_config(config, store, recommendations)
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, ResolutionError> {
    Ok(serde_json::to_value(value)?)
}
