use crate::demo::{run_demo, run_fee_lookup, DemoArgs, FeeArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use efs_submissions::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "EFS Submission Orchestrator",
    about = "Run and demonstrate the electronic filing submission lifecycle from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Resolve the fee in force for a form type
    Fee(FeeArgs),
    /// Walk submissions through the full lifecycle against in-memory adapters
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fee(args) => run_fee_lookup(args),
        Command::Demo(args) => run_demo(args),
    }
}
