use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{config::ConfigCommand, scan::ScanArgs, test_plan::TestPlanArgs};

#[derive(Parser)]
#[command(name = "blockarmor")]
#[command(about = "Tiered smart contract security analysis")]
#[command(version)]
#[command(author = "BlockArmor Team")]
struct Cli {
    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a contract for vulnerabilities at the requested tier
    Scan(ScanArgs),

    /// Identify the contract type and suggest what to test
    TestPlan(TestPlanArgs),

    Config {
        #[command(subcommand)]
        subcommand: ConfigCommand,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::scan::execute(args))
        }
        Commands::TestPlan(args) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(commands::test_plan::execute(args))
        }
        Commands::Config { subcommand } => subcommand.execute(),
    }
}
