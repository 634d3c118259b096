mod commands;
mod session;

use clap::{Parser, Subcommand};
use session::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(about = "Project, stage and region lifecycle on CloudFormation", long_about = None)]
struct Cli {
    /// AWS credentials profile
    #[arg(long, env = "STACKFLOW_PROFILE", global = true)]
    profile: Option<String>,
    /// Render and record only; make no AWS calls
    #[arg(long, env = "STACKFLOW_NO_EXE_CF", global = true)]
    no_exe_cf: bool,
    /// Project root (default: nearest directory containing .stackflow/)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,
    /// Resources template to use instead of the built-in one
    #[arg(long, global = true)]
    template: Option<PathBuf>,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or remove the project
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Create or remove stages
    #[command(subcommand)]
    Stage(StageCommands),
    /// Create or remove regions of a stage
    #[command(subcommand)]
    Region(RegionCommands),
    /// Deploy or remove the resources stack of a region
    #[command(subcommand)]
    Resources(ResourcesCommands),
    /// Inspect variables
    #[command(subcommand)]
    Variables(VariablesCommands),
    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create the project with its first stage and region
    Init {
        /// Project name; only letters and digits are kept
        #[arg(short, long)]
        name: String,
        /// Provisioning bucket
        #[arg(short, long)]
        bucket: String,
        #[arg(short, long)]
        stage: Option<String>,
        /// Region of the first stage, also where the bucket lives
        #[arg(short, long)]
        region: Option<String>,
    },
    /// Remove a project that has no stages left
    Remove {
        /// Also empty and delete the provisioning bucket
        #[arg(long)]
        purge_bucket: bool,
    },
}

#[derive(Subcommand)]
enum StageCommands {
    /// Create a stage with its first region
    Create {
        stage: String,
        #[arg(short, long)]
        region: Option<String>,
    },
    /// Remove a stage that has no regions left
    Remove { stage: String },
}

#[derive(Subcommand)]
enum RegionCommands {
    /// Add a region to a stage
    Create {
        region: String,
        #[arg(short, long)]
        stage: Option<String>,
    },
    /// Remove a region whose resources stack is gone
    Remove {
        region: String,
        #[arg(short, long)]
        stage: Option<String>,
        /// Remove the region's resources stack first
        #[arg(long)]
        with_resources: bool,
    },
}

#[derive(Subcommand)]
enum ResourcesCommands {
    /// Render and deploy the resources stack
    Deploy {
        #[arg(short, long)]
        stage: Option<String>,
        #[arg(short, long)]
        region: Option<String>,
    },
    /// Remove the resources stack
    Remove {
        #[arg(short, long)]
        stage: Option<String>,
        #[arg(short, long)]
        region: Option<String>,
    },
}

#[derive(Subcommand)]
enum VariablesCommands {
    /// Print the resolved variables of a scope
    List {
        #[arg(short, long)]
        stage: Option<String>,
        /// Requires --stage
        #[arg(short, long, requires = "stage")]
        region: Option<String>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if matches!(cli.command, Commands::Version) {
        println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let ctx = Context::new(
        cli.profile,
        cli.no_exe_cf,
        cli.project_dir,
        cli.template,
    )?;

    match cli.command {
        Commands::Project(cmd) => commands::project::handle(cmd, &ctx).await,
        Commands::Stage(cmd) => commands::stage::handle(cmd, &ctx).await,
        Commands::Region(cmd) => commands::region::handle(cmd, &ctx).await,
        Commands::Resources(cmd) => commands::resources::handle(cmd, &ctx).await,
        Commands::Variables(cmd) => commands::variables::handle(cmd, &ctx).await,
        Commands::Version => Ok(()),
    }
}
