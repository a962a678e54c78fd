//! The `duelroom` server binary.
//!
//! ```text
//! duelroom --config duelroom.toml --listen 0.0.0.0:9000 --round-secs 90
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use duelroom::DuelServerBuilder;
use duelroom::config::ServerConfig;
use tracing_subscriber::EnvFilter;

/// Command-line arguments. Each flag overrides the matching value from
/// the configuration file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, as IP:PORT.
    #[arg(short, long)]
    listen: Option<String>,

    /// Round length in seconds.
    #[arg(long)]
    round_secs: Option<u64>,

    /// Close connections idle for this many seconds (0 disables).
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

impl Args {
    /// Loads the configuration file (if any) and applies the flags.
    fn resolve(&self) -> Result<ServerConfig, duelroom::DuelroomError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(secs) = self.round_secs {
            config.round.duration_secs = secs;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config.limits.idle_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        listen = %config.listen,
        round_secs = config.round.duration_secs,
        "starting Duelroom"
    );

    let server = match DuelServerBuilder::from_config(&config).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    match server.run_until(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped with error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_builtin_config() {
        let args = Args::parse_from(["duelroom"]);
        let config = args.resolve().unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_args_override_config_values() {
        let args = Args::parse_from([
            "duelroom",
            "--listen",
            "127.0.0.1:9100",
            "--round-secs",
            "15",
            "--idle-timeout-secs",
            "30",
        ]);
        let config = args.resolve().unwrap();
        assert_eq!(config.listen, "127.0.0.1:9100");
        assert_eq!(config.round.duration_secs, 15);
        assert_eq!(config.limits.idle_timeout_secs, 30);
    }

    #[test]
    fn test_args_zero_round_is_rejected() {
        let args = Args::parse_from(["duelroom", "--round-secs", "0"]);
        assert!(args.resolve().is_err());
    }
}
