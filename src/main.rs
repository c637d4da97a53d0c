use clap::Parser;
use credvault::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `credvault=debug`).
const LOG_ENV: &str = "CREDVAULT_LOG";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { ref admin } => credvault::cli::commands::init::execute(&cli, admin.as_deref()),
        Commands::Keygen { ref path } => {
            credvault::cli::commands::keygen::execute(&cli, path.as_deref())
        }
        Commands::Add {
            ref username,
            ref role,
        } => credvault::cli::commands::add::execute(&cli, username, role),
        Commands::Remove {
            ref username,
            force,
        } => credvault::cli::commands::remove::execute(&cli, username, force),
        Commands::List => credvault::cli::commands::list::execute(&cli),
        Commands::Passwd { ref username } => {
            credvault::cli::commands::passwd::execute(&cli, username)
        }
        Commands::Role {
            ref username,
            ref role,
        } => credvault::cli::commands::role::execute(&cli, username, role),
        Commands::Verify { ref username } => {
            credvault::cli::commands::verify::execute(&cli, username)
        }
        Commands::RotateKey { ref new_keyfile } => {
            credvault::cli::commands::rotate::execute(&cli, new_keyfile)
        }
        Commands::Audit {
            last,
            ref since,
            ref user,
        } => credvault::cli::commands::audit_cmd::execute(
            &cli,
            last,
            since.as_deref(),
            user.as_deref(),
        ),
        Commands::Completions { shell } => credvault::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        credvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
