use std::env;
use std::fmt;
use std::process::ExitCode;

use tagcache_server::ServerBuilder;
use tagcache_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};

const CONFIG_ENV: &str = "TAGCACHE_CONFIG";

/// Where the config path came from, for the startup log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigSource {
    Flag,
    Env,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flag => "--config",
            Self::Env => CONFIG_ENV,
            Self::Default => "default",
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    tagcache_server::observability::init_tracing();

    let (config_path, source) =
        resolve_config_path(env::args().skip(1), env::var(CONFIG_ENV).ok());
    let cfg = match load_config(Some(&config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration in {config_path}: {e}");
            return ExitCode::from(2);
        }
    };
    tracing::info!(
        path = %config_path,
        source = %source,
        redis = cfg.redis.enabled,
        "configuration loaded"
    );

    tagcache_server::observability::apply_logging_level(&cfg.logging.level);
    tagcache_server::metrics::init_metrics();

    match ServerBuilder::new().with_config(cfg).build().await.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped with error");
            ExitCode::FAILURE
        }
    }
}

/// Loads `.env` when present. A missing file is fine.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("ignoring unreadable .env: {e}"),
    }
}

/// Picks the config path: `--config <path>` or `--config=<path>`, then
/// `TAGCACHE_CONFIG`, then `tagcache.toml`.
fn resolve_config_path<I>(args: I, env_path: Option<String>) -> (String, ConfigSource)
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if let Some(path) = arg.strip_prefix("--config=") {
            if !path.is_empty() {
                return (path.to_string(), ConfigSource::Flag);
            }
        } else if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::Flag);
            }
        }
    }

    match env_path {
        Some(path) if !path.is_empty() => (path, ConfigSource::Env),
        _ => (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default),
    }
}
