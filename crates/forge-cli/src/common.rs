use clap::Parser;
use forge_config::{ConfigError, ForgeConfig};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    #[arg(short, long, global = true, help = "Decrease verbosity")]
    pub quiet: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "Increase verbosity (-v for info, -vv for debug, -vvv for trace)")]
    pub verbose: u8,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: $FORGE_CONFIG or ./forge.toml)"
    )]
    pub config: Option<PathBuf>,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: quiet/warn only
    /// - 1: info (-v)
    /// - 2: debug (-vv)
    /// - 3+: trace
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ForgeConfig::path)
    }

    pub fn load_config(&self) -> Result<ForgeConfig, ConfigError> {
        ForgeConfig::load_from_path(&self.config_path())
    }
}

/// Install the `tracing` subscriber for library events.
///
/// `RUST_LOG` wins; otherwise the level follows `-v`.
pub fn init_tracing(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = match verbosity {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_overrides_verbose() {
        let opts = GlobalOpts {
            quiet: true,
            verbose: 2,
            config: None,
        };
        assert_eq!(opts.verbosity_level(), 0);
    }

    #[test]
    fn test_explicit_config_path() {
        let opts = GlobalOpts {
            config: Some(PathBuf::from("ci/forge.toml")),
            ..Default::default()
        };
        assert_eq!(opts.config_path(), PathBuf::from("ci/forge.toml"));
    }
}
