use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{CliError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    EnvFilter::new(match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    })
}

/// Installs the global subscriber. Everything goes to stderr; stdout belongs
/// to command output.
pub fn setup_logging(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let filter = filter_for(verbose, quiet);
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    let installed = match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(formatter)
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(formatter.json())
            .with(filter)
            .try_init(),
    };
    installed.map_err(|e| CliError::Config(format!("Failed to set up logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(filter_for(2, true).to_string(), "error");
        assert_eq!(filter_for(0, false).to_string(), "info");
        assert_eq!(filter_for(1, false).to_string(), "debug");
        assert_eq!(filter_for(5, false).to_string(), "trace");
    }
}
