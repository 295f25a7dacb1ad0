//! streamfn CLI - build and run stream functions.

mod build;
mod colors;
mod run;
mod version;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use streamfn_core::{BackendConfig, BuildOptions, DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "streamfn")]
#[command(about = "Build and run stream functions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Go executable to use instead of the one on PATH
    #[arg(long, global = true, env = "STREAMFN_GO")]
    go: Option<PathBuf>,
}

/// Arguments shared by every command that builds a function.
#[derive(Args)]
pub struct FunctionArgs {
    /// Path to the handler source (.go file)
    pub file: PathBuf,

    /// Function name, also the module name [default: file stem]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Host of the zipper the function connects to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port of the zipper the function connects to
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl FunctionArgs {
    pub fn options(&self) -> BuildOptions {
        let opts = BuildOptions::new(&self.file)
            .with_host(&self.host)
            .with_port(self.port);
        match &self.name {
            Some(name) => opts.with_name(name),
            None => opts,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a function into a standalone executable next to its source
    Build {
        #[command(flatten)]
        function: FunctionArgs,

        /// Remove the build workspace afterwards
        #[arg(long)]
        clean: bool,
    },

    /// Build a function and run it in the foreground
    Run {
        #[command(flatten)]
        function: FunctionArgs,
    },

    /// Print CLI and runtime versions
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Attach recovery hints to core errors
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<streamfn_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    let config = BackendConfig { go: cli.go };

    match cli.command {
        Commands::Build { function, clean } => {
            build::execute(&function, clean, &config).map_err(format_error)?;
        }
        Commands::Run { function } => {
            run::execute(&function, &config).map_err(format_error)?;
        }
        Commands::Version => version::execute()?,
    }

    Ok(())
}
