//! privgate CLI.
//!
//! Validates declarative policies and dry-runs authorization decisions
//! against hand-built requests.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate every policy in ./privgate.toml (and overrides)
//! privgate check
//!
//! # Would u1, holding APP1_UNIT5_ADMIN, be allowed to read unit 5?
//! privgate decide units.read --header userId=u1 --path unitId=5 --grant APP1_UNIT5_ADMIN
//!
//! # Render a spec against ad-hoc attributes
//! privgate render 'APP{appId}_UNIT{unitId}' --attr appId=1 --attr unitId=5
//! ```

mod commands;
mod style;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// privgate - privilege-token authorization for protected operations.
#[derive(Parser)]
#[command(name = "privgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory to load configuration from.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Load a single configuration file instead of the layered project config.
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Validate every configured policy.
    Check,

    /// Dry-run a decision for one operation.
    Decide {
        /// Operation identifier.
        operation: String,

        /// Request header (repeatable).
        #[arg(long = "header", value_name = "NAME=VALUE", value_parser = commands::parse_pair)]
        headers: Vec<(String, String)>,

        /// Query parameter (repeatable).
        #[arg(long = "query", value_name = "NAME=VALUE", value_parser = commands::parse_pair)]
        query: Vec<(String, String)>,

        /// Path parameter (repeatable).
        #[arg(long = "path", value_name = "NAME=VALUE", value_parser = commands::parse_pair)]
        path: Vec<(String, String)>,

        /// Operation argument (repeatable).
        #[arg(long = "arg", value_name = "NAME=VALUE", value_parser = commands::parse_pair)]
        args: Vec<(String, String)>,

        /// JSON request body.
        #[arg(long)]
        body: Option<String>,

        /// Privilege token held by the principal (repeatable).
        #[arg(long = "grant", value_name = "TOKEN")]
        grants: Vec<String>,
    },

    /// Render a template or expression against ad-hoc attributes.
    Render {
        /// Template (or expression with --expression).
        spec: String,

        /// Treat the spec as an expression.
        #[arg(short, long)]
        expression: bool,

        /// Attribute value (repeatable).
        #[arg(long = "attr", value_name = "NAME=VALUE", value_parser = commands::parse_pair)]
        attrs: Vec<(String, String)>,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    let source = commands::ConfigSource::new(cli.project, cli.file);

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Check => commands::check::run(&source),
        Commands::Decide {
            operation,
            headers,
            query,
            path,
            args,
            body,
            grants,
        } => {
            let request = commands::decide::RequestArgs {
                headers,
                query,
                path,
                args,
                body,
            };
            commands::decide::run(&source, &operation, request, grants)
        }
        Commands::Render {
            spec,
            expression,
            attrs,
        } => commands::render::run(&spec, expression, &attrs),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&source, &format),
        },
    }
}
