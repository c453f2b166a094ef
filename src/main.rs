//! `guard` command-line tool.
//!
//! Sanitizes, analyzes or reports on a file (or stdin) with the same engine
//! the API server uses.
//!
//! Exit status: 0 when the content is valid and safe, 1 when it is not,
//! 2 when the input could not be read or the engine could not be built.

use std::fs;
use std::io::{self, Read as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use sanitizer::{
    ContentType, ModelValidator, SanitizerConfig, SecurityAnalyzer, build_engines, render_report,
};
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[derive(Parser)]
#[command(name = "guard", version, about = "Sanitize content and analyze it for XSS threats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sanitize content and print the validation result as JSON
    Sanitize {
        /// Content type policy (general, title, slug, email, url, ...)
        #[arg(short = 't', long = "type", default_value = "general")]
        content_type: String,

        /// Input file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Analyze content for threats and print the result as JSON
    Analyze {
        /// Input file (default: stdin)
        file: Option<PathBuf>,
    },

    /// Print a plain-text security report
    Report {
        /// Content type shown in the report header
        #[arg(short = 't', long = "type", default_value = "general")]
        content_type: String,

        /// Input file (default: stdin)
        file: Option<PathBuf>,
    },
}

impl Command {
    fn file(&self) -> Option<&Path> {
        match self {
            Self::Sanitize { file, .. } | Self::Analyze { file } | Self::Report { file, .. } => {
                file.as_deref()
            }
        }
    }
}

/// Rendered output and whether the content passed.
struct Outcome {
    output: String,
    passed: bool,
}

fn execute(
    command: &Command,
    validator: &ModelValidator,
    analyzer: &SecurityAnalyzer,
    input: &str,
) -> Result<Outcome, serde_json::Error> {
    match command {
        Command::Sanitize { content_type, .. } => {
            let result = validator
                .sanitizer()
                .sanitize(input, ContentType::from_tag(content_type));
            Ok(Outcome {
                output: serde_json::to_string_pretty(&result)?,
                passed: result.is_valid,
            })
        }
        Command::Analyze { .. } => {
            let result = analyzer.analyze(input);
            Ok(Outcome {
                output: serde_json::to_string_pretty(&result)?,
                passed: result.is_safe,
            })
        }
        Command::Report { content_type, .. } => {
            let result = analyzer.analyze(input);
            Ok(Outcome {
                output: render_report(&result, ContentType::from_tag(content_type), Utc::now()),
                passed: result.is_safe,
            })
        }
    }
}

fn read_input(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if dotenvy::dotenv().is_err() {
        tracing::debug!("There is no corresponding .env file");
    }

    let cli = Cli::parse();

    let engines = SanitizerConfig::from_env().and_then(build_engines);
    let (validator, analyzer) = match engines {
        Ok(engines) => engines,
        Err(err) => {
            error!(?err, "Failed to build the sanitization engine");
            eprintln!("guard: {err}");
            return ExitCode::from(2);
        }
    };

    let input = match read_input(cli.command.file()) {
        Ok(input) => input,
        Err(err) => {
            eprintln!("guard: failed to read input: {err}");
            return ExitCode::from(2);
        }
    };

    match execute(&cli.command, &validator, &analyzer, &input) {
        Ok(Outcome { output, passed }) => {
            println!("{output}");
            if passed {
                ExitCode::SUCCESS
            } else {
                warn!("Content did not pass");
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("guard: failed to render output: {err}");
            ExitCode::from(2)
        }
    }
}
