//! Error reporting through miette.

use tracing::debug;

use crate::{CliError, Result};

/// Install miette as the global report handler.
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// Renders `err` once on stderr and returns the exit status it maps to.
pub fn report(err: CliError, verbose: u8) -> i32 {
    let code = err.exit_code();
    if verbose > 0 {
        debug!(?err, "detailed error context");
    }
    eprintln!("{:?}", miette::Report::new(err));
    code
}
