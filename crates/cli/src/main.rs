mod context_file;
mod host;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use medrec_core::{
    form_code_from_env_value, prefill, sections, validate, CoreConfig, ExportOutcome,
    ExportPipeline, ExportRequest, FieldError, FormRecord, FormSession, InMemorySharedContext,
    SharedContextStore, SourceTag,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use host::{DirectoryDelivery, YamlRenderer};

const DEFAULT_CONTEXT_FILE: &str = "medrec-context.yaml";
const CLI_SOURCE_TAG: &str = "medrec-cli";

#[derive(Parser)]
#[command(name = "medrec")]
#[command(about = "Fill in, validate and export medical recommendation forms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a draft form, after prefilling it from the shared context
    Validate {
        /// Draft form (YAML)
        draft: PathBuf,
    },
    /// Export a draft form and write it back to the shared context
    Export {
        /// Draft form (YAML)
        draft: PathBuf,
        /// Output directory (defaults to MEDREC_OUTPUT_DIR, then the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Inspect or edit the shared context
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },
}

#[derive(Subcommand)]
enum ContextCommands {
    /// Print the shared context
    Show,
    /// Set the clinician's own details used to prefill the first practitioner
    SetClinician {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        organisation: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("medrec=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let form_code = form_code_from_env_value(std::env::var("MEDREC_FORM_CODE").ok())?;
    let cfg = Arc::new(CoreConfig::for_form(form_code)?);
    let context_path = std::env::var("MEDREC_CONTEXT_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONTEXT_FILE));

    match cli.command {
        Commands::Validate { draft } => {
            let ctx = context_file::load(&context_path)?;
            let record = prefill(load_draft(&draft)?, &ctx);
            let errors = validate(&record);
            print_summary(&record, &errors);
            if errors.is_empty() {
                println!("No validation errors.");
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Export { draft, out } => {
            let out = out
                .or_else(|| std::env::var("MEDREC_OUTPUT_DIR").ok().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            let exported = export(cfg, &context_path, &draft, out).await?;
            Ok(if exported {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Context {
            command: ContextCommands::Show,
        } => {
            let ctx = context_file::load(&context_path)?;
            print!("{}", serde_yaml::to_string(&ctx)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Context {
            command:
                ContextCommands::SetClinician {
                    name,
                    email,
                    organisation,
                },
        } => {
            let store = InMemorySharedContext::with_snapshot(context_file::load(&context_path)?);
            let source = SourceTag::new(CLI_SOURCE_TAG)?;
            store.update_clinician(&source, &mut |clinician| {
                clinician.name = name.clone();
                clinician.email = email.clone();
                if let Some(organisation) = &organisation {
                    clinician.organisation = organisation.clone();
                }
            });
            context_file::save(&context_path, &store.read())?;
            println!("Updated clinician in {}", context_path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Exports `draft` into `out` and saves the updated shared context.
///
/// Returns whether a document was produced. The context is saved either way.
async fn export(
    cfg: Arc<CoreConfig>,
    context_path: &Path,
    draft: &Path,
    out: PathBuf,
) -> anyhow::Result<bool> {
    let store = Arc::new(InMemorySharedContext::with_snapshot(context_file::load(context_path)?));
    let pipeline = ExportPipeline::new(Arc::new(YamlRenderer), Arc::new(DirectoryDelivery::new(out)));

    let mut session = FormSession::resume(
        load_draft(draft)?,
        cfg,
        store.clone(),
        pipeline,
        tokio::runtime::Handle::current(),
    );

    if session.request_export() == ExportRequest::AlreadyExporting {
        anyhow::bail!("an export is already in progress");
    }
    print_summary(session.record(), session.errors());

    let outcome = session.next_export_completion().await;
    let exported = match outcome {
        Some(ExportOutcome::Ready) => session.present_document(),
        Some(ExportOutcome::Failed) => {
            if let Some(failure) = session.export_failure() {
                eprintln!("Export failed: {failure}");
            }
            false
        }
        None => {
            eprintln!("Export did not complete");
            false
        }
    };

    let groups = session.finish();
    tracing::debug!(groups = ?groups, "shared context updated");
    context_file::save(context_path, &store.read())?;

    Ok(exported)
}

fn load_draft(path: &Path) -> anyhow::Result<FormRecord> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read draft {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("failed to parse draft {}", path.display()))
}

fn print_summary(record: &FormRecord, errors: &[FieldError]) {
    let routed = sections::route_errors(errors);
    for summary in sections::section_summaries(record, errors) {
        let state = match (summary.has_error, summary.complete) {
            (true, _) => "errors",
            (false, true) => "complete",
            (false, false) => "incomplete",
        };
        println!("{}: {}", summary.section.title(), state);
        for error in routed.for_section(summary.section) {
            println!("  - {error}");
        }
    }
    for error in &routed.unroutable {
        println!("  - {error}");
    }

    let progress = sections::progress(record);
    println!(
        "Sections complete: {}/{} ({:.0}%)",
        progress.completed,
        progress.total,
        progress.fraction() * 100.0
    );
}
