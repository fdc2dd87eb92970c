#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use isle_core::config::{build_stamp_from_env, BUILD_STAMP_ENV};
use isle_core::paths::normalize_path;
use isle_core::{EvictionPolicy, ServerConfig};
use miette::{IntoDiagnostic, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "isle")]
#[command(author, version, about = "Island hydration with on-demand module bundling", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted logs
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every command that resolves sources.
#[derive(clap::Args, Debug, Clone)]
struct ProjectArgs {
    /// Directory allowed to be served (repeatable, relative to cwd)
    #[arg(long = "allow", value_name = "DIR", default_value = "app/islands")]
    allow: Vec<PathBuf>,

    /// Directory `~/` sources resolve against
    #[arg(long, default_value = "app")]
    app_dir: PathBuf,

    /// URL path of the script endpoint
    #[arg(long, default_value = "/_script")]
    endpoint: String,

    /// CDN origin bare imports are rewritten to
    #[arg(long, default_value = "https://esm.sh")]
    cdn: String,

    /// UI runtime package
    #[arg(long, default_value = "preact")]
    runtime: String,

    /// Build identifier; enables immutable caching
    #[arg(long, env = BUILD_STAMP_ENV)]
    build_sha: Option<String>,
}

impl ProjectArgs {
    fn into_config(self, cwd: PathBuf) -> ServerConfig {
        ServerConfig::new(cwd)
            .with_app_dir(self.app_dir)
            .with_allowed_dirs(self.allow)
            .with_endpoint(self.endpoint)
            .with_cdn_host(self.cdn)
            .with_runtime_package(self.runtime)
            .with_build_stamp(self.build_sha.or_else(build_stamp_from_env))
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Serve island bundles over HTTP
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, short, default_value_t = 3000)]
        port: u16,

        /// Keep at most N bundles in memory (default: unbounded)
        #[arg(long, value_name = "N")]
        cache_max_entries: Option<NonZeroUsize>,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Bundle one source and print the module
    Bundle {
        /// Source path, relative to cwd or `~/`-prefixed
        source: String,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Print the markup for an island
    Island {
        /// Source path of the island component
        source: String,

        /// Props the component was rendered with (JSON object)
        #[arg(long)]
        props: Option<String>,

        /// Server-rendered markup of the component
        #[arg(long, default_value = "")]
        markup: String,

        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = if cwd.is_absolute() {
        normalize_path(&cwd)
    } else {
        normalize_path(&std::env::current_dir().into_diagnostic()?.join(cwd))
    };

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Serve {
            host,
            port,
            cache_max_entries,
            project,
        }) => {
            let policy = cache_max_entries.map_or(EvictionPolicy::Unbounded, EvictionPolicy::MaxEntries);
            let action = commands::serve::ServeAction {
                config: project.into_config(cwd).with_cache_policy(policy),
                host,
                port,
            };
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::serve::run(action))
        }
        Some(Commands::Bundle { source, project }) => {
            commands::bundle::run(project.into_config(cwd), &source)
        }
        Some(Commands::Island {
            source,
            props,
            markup,
            project,
        }) => commands::island::run(
            project.into_config(cwd),
            &source,
            props.as_deref(),
            markup,
        ),
    }
}
