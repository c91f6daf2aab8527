use clap::Parser;
use solodis::config::{Config, DEFAULT_LISTEN_ADDR};
use solodis::{cli, server, Error};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Listen address of the server
    #[arg(
        long = "listenAddr",
        visible_alias = "listen-addr",
        env = "SOLODIS_LISTEN_ADDR",
        default_value = DEFAULT_LISTEN_ADDR
    )]
    listen_addr: String,

    /// Maximum number of distinct keys the server accepts
    #[arg(long, env = "SOLODIS_MAX_KEYS")]
    max_keys: Option<usize>,

    /// Start an offline interactive shell instead of the server
    #[arg(long)]
    cli: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    if args.cli {
        let stdin = std::io::stdin();
        cli::run(stdin.lock(), std::io::stdout())?;
        return Ok(());
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let config = Config {
        listen_addr: args.listen_addr,
        max_keys: args.max_keys,
        ..Config::default()
    };

    server::run(config).await
}
