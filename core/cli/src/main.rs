mod deploy;
mod synth;

use clap::{Parser, Subcommand};
use iac_lambda::config::{self, CONFIG_FILE};
use iac_lambda::{init_tracing, ContextOverrides, DeploymentContext, IacResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "iac")]
#[command(about = "Synthesize and deploy the Lambda, storage and pipeline stacks")]
#[command(version)]
struct Cli {
    /// Project file; built-in defaults apply when it does not exist
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Context value such as `env=qa`, may be repeated
    #[arg(short = 'c', long = "context", global = true, value_name = "KEY=VALUE")]
    context: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print or write the cloud assembly
    Synth {
        /// Print only this stack's template
        stack: Option<String>,
        /// Write every template and the manifest into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List stacks in deployment order
    List,
    /// Create or update stacks and their dependencies
    Deploy {
        stacks: Vec<String>,
        /// Print the plan without calling CloudFormation
        #[arg(short, long)]
        dry_run: bool,
    },
    /// Delete stacks and everything depending on them
    Destroy {
        stacks: Vec<String>,
        /// Print the plan without calling CloudFormation
        #[arg(short, long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err.error_report());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> IacResult<()> {
    let ctx = resolve_context(&cli)?;
    debug!("Resolved context: {:?}", ctx);

    match cli.command {
        Command::Synth { stack, out } => synth::synth_command(&ctx, stack.as_deref(), out),
        Command::List => synth::list_command(&ctx),
        Command::Deploy { stacks, dry_run } => deploy::deploy_command(&ctx, &stacks, dry_run).await,
        Command::Destroy { stacks, dry_run } => {
            deploy::destroy_command(&ctx, &stacks, dry_run).await
        }
    }
}

fn resolve_context(cli: &Cli) -> IacResult<DeploymentContext> {
    let file = config::load_optional(&cli.config)?;
    let overrides = ContextOverrides::parse(&cli.context)?;
    Ok(DeploymentContext::resolve(&file, &overrides)?)
}
