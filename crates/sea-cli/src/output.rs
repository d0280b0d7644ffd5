use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sea_core::ir::io::{write_module, ModuleFormat, ModuleIoError};
use sea_core::ir::Module;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{CliError, Result};

/// A destination opened before the pipeline runs. The module is written to
/// a temporary file next to the destination and only renamed into place by
/// [`OutputSink::commit`]; dropping the sink removes the temporary file.
#[derive(Debug)]
pub struct OutputSink {
    destination: PathBuf,
    file: NamedTempFile,
}

impl OutputSink {
    pub fn open(destination: &Path) -> Result<Self> {
        let open_error = |source| CliError::OutputOpen {
            path: destination.to_path_buf(),
            source,
        };
        if destination.is_dir() {
            return Err(open_error(std::io::Error::other("destination is a directory")));
        }
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir).map_err(open_error)?;
        Ok(Self {
            destination: destination.to_path_buf(),
            file,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn commit(mut self, module: &Module, format: ModuleFormat) -> Result<()> {
        let write_error = |source| CliError::OutputWrite {
            path: self.destination.clone(),
            source,
        };
        {
            let mut writer = BufWriter::new(self.file.as_file_mut());
            write_module(module, format, &mut writer).map_err(write_error)?;
            writer
                .flush()
                .map_err(|e| write_error(ModuleIoError::Write(e)))?;
        }
        self.file
            .persist(&self.destination)
            .map_err(|e| write_error(ModuleIoError::Write(e.error)))?;
        info!(path = %self.destination.display(), ?format, "wrote module");
        Ok(())
    }
}
