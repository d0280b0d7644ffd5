use std::path::PathBuf;

use clap::Args;
use sea_core::ir::io::{read_module, ModuleFormat};
use sea_pipeline::{run_pipeline, PipelineBuilder};
use tracing::{debug, info};

use crate::config::{PipelineArgs, SeappConfigFile};
use crate::output::OutputSink;
use crate::{CliError, Result};

#[derive(Debug, Clone, Args)]
pub struct PreprocessArgs {
    /// Input module (JSON or binary)
    pub input: PathBuf,

    /// Write the prepared module here; nothing is written without it
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Emit the textual listing instead of the binary encoding
    #[arg(short = 'S')]
    pub text: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Reads the input, opens the output, runs the pipeline and commits the
/// result. Any failure leaves no output behind.
pub fn preprocess_command(args: &PreprocessArgs, file: &SeappConfigFile) -> Result<()> {
    let config = args.pipeline.resolve(file)?;
    let module = read_module(&args.input).map_err(|source| CliError::InputParse {
        path: args.input.clone(),
        source,
    })?;
    let sink = args.output.as_deref().map(OutputSink::open).transpose()?;

    debug!(
        pipeline = %PipelineBuilder::for_configuration(&config),
        "selected pipeline"
    );
    let execution = run_pipeline(&config, module)?;
    info!(
        module = %execution.module.name,
        changes = execution.total_changes(),
        "module prepared"
    );

    match sink {
        Some(sink) => {
            let format = if args.text {
                ModuleFormat::Text
            } else {
                ModuleFormat::Binary
            };
            sink.commit(&execution.module, format)
        }
        None => Ok(()),
    }
}
