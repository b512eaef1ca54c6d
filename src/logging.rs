//! Logging setup for the binary. The library itself only emits events.

use anyhow::Context;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::BeaconConfig;

/// `RUST_LOG` wins over `level` when it is set and parses.
fn filter_for(level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}")),
    }
}

/// Install the global subscriber from `cfg`, with an optional level override
/// from the command line.
pub fn init(cfg: &BeaconConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let level = level_override.unwrap_or(&cfg.log_level);
    let registry = tracing_subscriber::registry().with(filter_for(level)?);

    let installed = if cfg.log_json {
        registry.with(fmt::layer().json().with_current_span(false)).try_init()
    } else {
        registry.with(fmt::layer().compact().with_target(false)).try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("logging already initialised: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_directives_parse() {
        assert!(filter_for("debug").is_ok());
        assert!(filter_for("commit_recover=trace,warn").is_ok());
    }

    #[test]
    fn init_installs_once() {
        let cfg = BeaconConfig { log_json: true, ..Default::default() };
        assert!(init(&cfg, Some("info")).is_ok());
        assert!(init(&BeaconConfig::default(), None).is_err());
    }
}
