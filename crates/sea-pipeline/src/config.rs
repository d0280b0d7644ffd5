use sea_core::ir::layout::LayoutError;
use sea_core::ir::{DataLayout, Module};
use sea_transforms::SroaThresholds;

/// Options for one run, fixed before the pipeline is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub insert_bounds_checks: bool,
    pub insert_overflow_checks: bool,
    pub inline_all: bool,
    pub mixed_semantics: bool,
    pub sroa_thresholds: SroaThresholds,
    /// Layout used when the module does not declare one.
    pub default_data_layout: Option<String>,
}

impl Configuration {
    /// The layout stages work with: the module's own when it declares a
    /// non-empty one, else the configured default, else the built-in default.
    pub fn resolve_data_layout(&self, module: &Module) -> Result<DataLayout, LayoutError> {
        let declared = module
            .data_layout
            .as_deref()
            .filter(|layout| !layout.trim().is_empty());
        let fallback = self
            .default_data_layout
            .as_deref()
            .filter(|layout| !layout.trim().is_empty());
        match declared.or(fallback) {
            Some(layout) => DataLayout::parse(layout),
            None => Ok(DataLayout::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(layout: Option<&str>) -> Module {
        let mut module = Module::new("m");
        module.data_layout = layout.map(str::to_string);
        module
    }

    #[test]
    fn module_layout_wins() {
        let config = Configuration {
            default_data_layout: Some("e-p:32:32".to_string()),
            ..Configuration::default()
        };
        let layout = config
            .resolve_data_layout(&module(Some("e-p:64:64")))
            .unwrap();
        assert_eq!(layout.pointer_size, 8);
    }

    #[test]
    fn default_applies_only_without_module_layout() {
        let config = Configuration {
            default_data_layout: Some("e-p:32:32".to_string()),
            ..Configuration::default()
        };
        assert_eq!(
            config.resolve_data_layout(&module(None)).unwrap().pointer_size,
            4
        );
        assert_eq!(
            config.resolve_data_layout(&module(Some(""))).unwrap().pointer_size,
            4
        );
        assert_eq!(
            Configuration::default()
                .resolve_data_layout(&module(None))
                .unwrap(),
            DataLayout::default()
        );
    }
}
