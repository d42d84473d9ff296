use clap::Parser;
use tracing_subscriber::EnvFilter;

use credvault::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Set(ref args) => commands::set::execute(&cli, args).await,
        Commands::Update(ref args) => commands::update::execute(&cli, args).await,
        Commands::Get { ref name, json } => commands::get::execute(&cli, name, json).await,
        Commands::List => commands::list::execute(&cli).await,
        Commands::Delete { ref name, force } => {
            commands::delete::execute(&cli, name, force).await
        }
        Commands::Rotate {
            ref name,
            ref value,
        } => commands::rotate::execute(&cli, name, value.as_deref()).await,
        Commands::Validate { ref name } => commands::validate::execute(&cli, name).await,
        Commands::History { ref name } => commands::history::execute(&cli, name).await,
        #[cfg(feature = "audit-log")]
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Keygen => commands::keygen::execute(),
    };

    if let Err(e) = result {
        credvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
