//! Layered configuration loading and log setup.

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use issue_portal::PortalConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Environment variables with this prefix override file values;
/// `__` separates nested keys (`PORTAL__CACHE__SESSION__FRESHNESS=1m`).
pub const ENV_PREFIX: &str = "PORTAL__";

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_base_url: Option<String>,
    pub allow_insecure_http: bool,
}

/// Load the effective configuration.
///
/// Layers, lowest first: built-in defaults, the YAML file (if given),
/// `PORTAL__*` environment variables, command-line overrides.
///
/// # Errors
/// Fails if `path` is not a file or if any layer does not match the
/// configuration schema.
pub fn load(path: Option<&Path>, overrides: &CliOverrides) -> Result<PortalConfig> {
    let mut figment = Figment::new().merge(Serialized::defaults(PortalConfig::default()));

    if let Some(path) = path {
        if !path.is_file() {
            bail!("config file does not exist: {}", path.display());
        }
        figment = figment.merge(Yaml::file(path));
    }

    let mut config: PortalConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid portal configuration")?;

    if let Some(url) = &overrides.api_base_url {
        config.api_base_url.clone_from(url);
    }
    if overrides.allow_insecure_http {
        config.allow_insecure_http = true;
    }

    Ok(config)
}

/// Install the stderr log subscriber.
///
/// Without `-v` the filter comes from `RUST_LOG` and falls back to `info`;
/// `-v` selects debug and `-vv` trace, ignoring `RUST_LOG`.
pub fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
