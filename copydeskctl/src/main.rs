use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "copydeskctl", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the access policy for an account
    Access {
        #[command(subcommand)]
        cmd: commands::access::AccessCommands,
    },
    /// Inspect user profiles
    Users {
        #[command(subcommand)]
        cmd: commands::users::UsersCommands,
    },
    /// Usage reports
    Report {
        #[command(subcommand)]
        cmd: commands::report::ReportCommands,
    },
    /// Write a CSV export to a file
    Export(commands::export::ExportArgs),
    /// Backend connection settings
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },
    /// Print version and exit
    Version,
}

fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Access { cmd } => commands::access::handle(cmd).await?,
        Commands::Users { cmd } => commands::users::handle(cmd).await?,
        Commands::Report { cmd } => commands::report::handle(cmd).await?,
        Commands::Export(args) => commands::export::run(args).await?,
        Commands::Config { cmd } => commands::config::handle(cmd)?,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}
