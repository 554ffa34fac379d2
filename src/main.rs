use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizforge::cli::commands::{config, generate};
use quizforge::config::ConfigFormat;

#[derive(Parser)]
#[command(name = "quizforge")]
#[command(version, about = "Generate multiple-choice quizzes from documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a quiz from documents and transcripts
    Generate {
        #[arg(required_unless_present = "transcript", help = "Documents (pdf, txt, md, docx)")]
        files: Vec<PathBuf>,
        #[arg(long, help = "Transcript URL to include (repeatable)")]
        transcript: Vec<String>,
        #[arg(long, help = "Store the quiz in the local database")]
        save: bool,
        #[arg(long, help = "Print the quiz as JSON")]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: ConfigFormat,
    },
    /// Show configuration file paths
    Path,
    /// Write a starter project config
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();

        // Reaches the log only once the subscriber is installed
        tracing::error!(%message, %location, "quizforge panicked");
        eprintln!(
            "{} {} {}",
            console::style("quizforge crashed:").red().bold(),
            message,
            console::style(location).dim()
        );

        default_hook(info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "quizforge=debug"
    } else if cli.quiet {
        "error"
    } else {
        "quizforge=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            files,
            transcript,
            save,
            json,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(generate::run(generate::GenerateOptions {
                files,
                transcripts: transcript,
                save,
                json,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => config::show(format)?,
            ConfigAction::Path => config::path()?,
            ConfigAction::Init { force } => config::init(force)?,
        },
    }

    Ok(())
}
