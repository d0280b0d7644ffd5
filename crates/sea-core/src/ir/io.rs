//! Module encodings: JSON for hand-written inputs, a tagged `bincode` payload
//! as the binary form, and the textual listing for `-S`.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::{Constant, Module, Ty, Value};

const BINARY_MAGIC: &[u8; 4] = b"SEAM";
const BINARY_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    Json,
    Binary,
    Text,
}

#[derive(Debug, Error)]
pub enum ModuleIoError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON module: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary module: {0}")]
    Binary(#[from] bincode::Error),
    #[error("unsupported binary module version {0}")]
    Version(u8),
    #[error("unrecognized module encoding (expected JSON or binary module)")]
    UnknownEncoding,
    #[error("integer constant {value} does not fit {ty}")]
    ConstantRange { value: i64, ty: Ty },
    #[error("failed to write module: {0}")]
    Write(#[from] std::io::Error),
}

pub fn read_module(path: &Path) -> Result<Module, ModuleIoError> {
    let bytes = std::fs::read(path).map_err(|source| ModuleIoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let module = decode_module(&bytes)?;
    debug!(
        path = %path.display(),
        functions = module.functions.len(),
        globals = module.globals.len(),
        "read module"
    );
    Ok(module)
}

pub fn decode_module(bytes: &[u8]) -> Result<Module, ModuleIoError> {
    let mut module: Module = if let Some(payload) = bytes.strip_prefix(BINARY_MAGIC.as_slice()) {
        let Some((&version, payload)) = payload.split_first() else {
            return Err(ModuleIoError::UnknownEncoding);
        };
        if version != BINARY_VERSION {
            return Err(ModuleIoError::Version(version));
        }
        bincode::deserialize(payload)?
    } else {
        match bytes.iter().find(|byte| !byte.is_ascii_whitespace()) {
            Some(b'{') => serde_json::from_slice(bytes)?,
            _ => return Err(ModuleIoError::UnknownEncoding),
        }
    };
    canonicalize_constants(&mut module)?;
    Ok(module)
}

/// Accepts either the signed or the unsigned spelling of a value of `ty`
/// and returns its sign-extended form.
fn canonical_int(value: i64, ty: &Ty) -> Option<i64> {
    match ty.int_bits() {
        Some(bits) if bits < 64 => {
            let low = -(1i128 << (bits - 1));
            let high = 1i128 << bits;
            (low..high)
                .contains(&i128::from(value))
                .then(|| ty.normalize(value))
        }
        _ => Some(value),
    }
}

fn canonicalize_constant(constant: &mut Constant) -> Result<(), ModuleIoError> {
    match constant {
        Constant::Int { value, ty } => {
            *value = canonical_int(*value, ty).ok_or_else(|| ModuleIoError::ConstantRange {
                value: *value,
                ty: ty.clone(),
            })?;
        }
        Constant::Aggregate { elements, .. } => {
            for element in elements {
                canonicalize_constant(element)?;
            }
        }
        Constant::Null | Constant::Zero(_) => {}
    }
    Ok(())
}

/// Integer constants are kept sign-extended to their width; passes rely on it.
fn canonicalize_constants(module: &mut Module) -> Result<(), ModuleIoError> {
    for global in &mut module.globals {
        if let Some(initializer) = &mut global.initializer {
            canonicalize_constant(initializer)?;
        }
    }
    for function in &mut module.functions {
        let mut first_error = None;
        function.for_each_operand_mut(|operand| {
            if first_error.is_some() {
                return;
            }
            if let Value::Const(constant) = operand {
                if let Err(err) = canonicalize_constant(constant) {
                    first_error = Some(err);
                }
            }
        });
        if let Some(err) = first_error {
            return Err(err);
        }
    }
    Ok(())
}

pub fn write_module<W: Write>(
    module: &Module,
    format: ModuleFormat,
    out: &mut W,
) -> Result<(), ModuleIoError> {
    match format {
        ModuleFormat::Json => serde_json::to_writer_pretty(&mut *out, module)?,
        ModuleFormat::Binary => {
            out.write_all(BINARY_MAGIC)?;
            out.write_all(&[BINARY_VERSION])?;
            bincode::serialize_into(&mut *out, module)?;
        }
        ModuleFormat::Text => out.write_all(module.to_text().as_bytes())?,
    }
    out.flush()?;
    Ok(())
}
