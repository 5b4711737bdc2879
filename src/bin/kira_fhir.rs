use std::fs;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_fhir_etl::config::{ConfigLoader, ConfigOverrides, ResolvedConfig};
use kira_fhir_etl::emitter::MultiplexedEmitter;
use kira_fhir_etl::error::EtlError;
use kira_fhir_etl::output::{JsonOutput, OutputMode, TextOutput};
use kira_fhir_etl::pipeline::PipelineRun;
use kira_fhir_etl::validate::{ConventionValidator, PassThrough, SchemaValidator};

#[derive(Parser)]
#[command(name = "kira-fhir")]
#[command(about = "Transform LINCS MCF10A sample annotations into FHIR NDJSON")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the annotation to FHIR transform")]
    Transform(TransformArgs),
}

#[derive(Args)]
struct TransformArgs {
    #[arg(long)]
    annotations: Option<Utf8PathBuf>,

    #[arg(long)]
    specimens: Option<Utf8PathBuf>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "DNS name the identity namespace is derived from")]
    namespace: Option<String>,

    #[arg(long)]
    no_validate: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<EtlError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &EtlError) -> u8 {
    match error.root() {
        EtlError::MissingConfig
        | EtlError::ConfigRead(_)
        | EtlError::ConfigParse(_)
        | EtlError::InputOpen { .. } => 2,
        EtlError::MisalignedStreams { .. } | EtlError::SpecimenMismatch { .. } => 3,
        EtlError::UnmappedVocabularyTerm { .. }
        | EtlError::InvalidTimepoint(_)
        | EtlError::InvalidDose { .. }
        | EtlError::SchemaValidation { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Transform(args) => run_transform(args, output_mode),
    }
}

fn run_transform(args: TransformArgs, output_mode: OutputMode) -> miette::Result<()> {
    let overrides = ConfigOverrides {
        namespace: args.namespace,
        annotations: args.annotations,
        specimens: args.specimens,
        output_dir: args.output,
        no_validate: args.no_validate,
    };
    let resolved = ConfigLoader::resolve(args.config.as_deref(), overrides)?;
    fs::create_dir_all(resolved.output_dir.as_std_path())
        .map_err(|err| EtlError::Filesystem(format!("create {}: {err}", resolved.output_dir)))?;

    let validator: Box<dyn SchemaValidator> = if resolved.validate {
        Box::new(ConventionValidator)
    } else {
        info!("schema validation disabled");
        Box::new(PassThrough)
    };
    let summary = transform(&resolved, validator)?;

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_summary(&summary).into_diagnostic(),
        OutputMode::Interactive => TextOutput::print_summary(&summary).into_diagnostic(),
    }
}

fn transform(
    resolved: &ResolvedConfig,
    validator: Box<dyn SchemaValidator>,
) -> Result<kira_fhir_etl::pipeline::RunSummary, EtlError> {
    let emitter = MultiplexedEmitter::new(resolved.output_dir.clone(), validator);
    let mut run = PipelineRun::new(resolved.identities, emitter).with_study(resolved.study.clone());
    run.execute(&resolved.annotations, &resolved.specimens)
}
