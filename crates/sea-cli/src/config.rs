//! `seapp` settings: an optional TOML file overlaid with command-line flags,
//! folded into one [`Configuration`].

use std::path::Path;

use clap::Args;
use sea_core::ir::DataLayout;
use sea_pipeline::{Configuration, SroaThresholds};
use serde::Deserialize;
use tracing::debug;

use crate::{CliError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeappConfigFile {
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// The `[pipeline]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub inline_all: bool,
    pub bounds_check: bool,
    pub overflow_check: bool,
    pub mixed_semantics: bool,
    pub default_data_layout: Option<String>,
    pub sroa_threshold: Option<i64>,
    pub sroa_struct: Option<i64>,
    pub sroa_array: Option<i64>,
    pub sroa_scalar_load: Option<i64>,
}

impl SeappConfigFile {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            CliError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load_from_file)
    }
}

/// Pipeline selection flags shared by the `seapp` command line.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// Data layout for modules that do not declare one
    #[arg(long = "default-data-layout", value_name = "LAYOUT")]
    pub default_data_layout: Option<String>,

    /// Inline every internal function into its callers
    #[arg(long = "horn-inline-all")]
    pub inline_all: bool,

    /// Insert buffer bounds checks
    #[arg(long = "boc")]
    pub bounds_check: bool,

    /// Insert signed integer overflow checks
    #[arg(long = "ioc")]
    pub overflow_check: bool,

    /// Apply the mixed-semantics transformation
    #[arg(long = "horn-mixed-sem")]
    pub mixed_semantics: bool,

    /// SROA size threshold in bytes (negative for unlimited)
    #[arg(long = "sroa-threshold", allow_negative_numbers = true)]
    pub sroa_threshold: Option<i64>,

    /// SROA struct member threshold (negative for unlimited)
    #[arg(long = "sroa-struct", allow_negative_numbers = true)]
    pub sroa_struct: Option<i64>,

    /// SROA array element threshold (negative for unlimited)
    #[arg(long = "sroa-array", allow_negative_numbers = true)]
    pub sroa_array: Option<i64>,

    /// SROA scalar load threshold (negative for unlimited)
    #[arg(long = "sroa-scalar-load", allow_negative_numbers = true)]
    pub sroa_scalar_load: Option<i64>,
}

const DEFAULT_SROA_LIMIT: i64 = i32::MAX as i64;
const DEFAULT_SROA_SCALAR_LOAD: i64 = -1;

impl PipelineArgs {
    /// Flags override the file; a boolean flag can only switch a group on.
    /// An unusable default layout is rejected here, before any input is read.
    pub fn resolve(&self, file: &SeappConfigFile) -> Result<Configuration> {
        let section = &file.pipeline;
        let default_data_layout = self
            .default_data_layout
            .clone()
            .or_else(|| section.default_data_layout.clone());
        if let Some(layout) = default_data_layout.as_deref() {
            DataLayout::parse(layout).map_err(CliError::DefaultLayout)?;
        }
        let sroa_thresholds = SroaThresholds::from_raw(
            self.sroa_threshold
                .or(section.sroa_threshold)
                .unwrap_or(DEFAULT_SROA_LIMIT),
            self.sroa_struct
                .or(section.sroa_struct)
                .unwrap_or(DEFAULT_SROA_LIMIT),
            self.sroa_array
                .or(section.sroa_array)
                .unwrap_or(DEFAULT_SROA_LIMIT),
            self.sroa_scalar_load
                .or(section.sroa_scalar_load)
                .unwrap_or(DEFAULT_SROA_SCALAR_LOAD),
        );
        Ok(Configuration {
            insert_bounds_checks: self.bounds_check || section.bounds_check,
            insert_overflow_checks: self.overflow_check || section.overflow_check,
            inline_all: self.inline_all || section.inline_all,
            mixed_semantics: self.mixed_semantics || section.mixed_semantics,
            sroa_thresholds,
            default_data_layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_plain_configuration() {
        let config = PipelineArgs::default()
            .resolve(&SeappConfigFile::default())
            .unwrap();
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn flags_override_file_values() {
        let file: SeappConfigFile = toml::from_str(
            r#"
            [pipeline]
            bounds_check = true
            sroa_array = 16
            sroa_struct = 4
            default_data_layout = "e-p:32:32"
            "#,
        )
        .unwrap();
        let args = PipelineArgs {
            overflow_check: true,
            sroa_array: Some(-1),
            ..PipelineArgs::default()
        };
        let config = args.resolve(&file).unwrap();
        assert!(config.insert_bounds_checks && config.insert_overflow_checks);
        assert_eq!(config.sroa_thresholds.array_elements, None);
        assert_eq!(config.sroa_thresholds.struct_members, Some(4));
        assert_eq!(config.default_data_layout.as_deref(), Some("e-p:32:32"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<SeappConfigFile>("[pipeline]\nboc = true\n").is_err());
    }

    #[test]
    fn bad_default_layout_is_a_configuration_error() {
        let args = PipelineArgs {
            default_data_layout: Some("q-nonsense".to_string()),
            ..PipelineArgs::default()
        };
        let err = args.resolve(&SeappConfigFile::default()).unwrap_err();
        assert!(matches!(err, CliError::DefaultLayout(_)));
        assert_eq!(err.exit_code(), 2);
    }
}
