//! Compute modules
//!
//! A compute module owns one family of analyses. It receives a method name
//! and JSON parameters, runs the statistics and lays the results out as
//! tables. Modules are hosted by compute units in [`crate::execution`].

pub mod descriptives;
pub mod frequencies;
pub mod nonparametric;
pub mod regression;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::data::{format_date, Variable, VariableKind};
use crate::error::{Error, Result};
use crate::output::{AnalysisOutput, Cell};

pub use descriptives::DescriptivesModule;
pub use frequencies::FrequenciesModule;
pub use nonparametric::NonparametricModule;
pub use regression::RegressionModule;

/// Names of the modules every registry knows about
pub const BUILTIN_MODULES: [&str; 4] = [
    frequencies::MODULE_NAME,
    descriptives::MODULE_NAME,
    nonparametric::MODULE_NAME,
    regression::MODULE_NAME,
];

/// Settings shared by every module instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisContext {
    /// Decimal places kept in numeric cells
    pub decimals: u32,
    /// Pivot threshold for matrix inversion
    pub singular_epsilon: f64,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl AnalysisContext {
    pub fn from_config(config: &EngineConfig) -> Self {
        AnalysisContext {
            decimals: config.decimals,
            singular_epsilon: config.singular_epsilon,
        }
    }

    /// Rounded numeric cell
    pub fn cell(&self, value: f64) -> Cell {
        Cell::rounded(value, self.decimals)
    }

    /// Rounded cell, empty when undefined
    pub fn optional(&self, value: Option<f64>) -> Cell {
        Cell::optional(value, self.decimals)
    }

    /// Cell for a value on the scale of `variable`; dates are shown as text
    pub fn scaled(&self, variable: &Variable, value: Option<f64>) -> Cell {
        match (variable.kind, value) {
            (VariableKind::Date, Some(v)) => Cell::text(format_date(v)),
            (_, v) => self.optional(v),
        }
    }
}

/// A family of analyses hosted by one compute unit
pub trait ComputeModule: Send {
    /// Registry name of the module
    fn name(&self) -> &str;

    /// Methods accepted by [`ComputeModule::call`]
    fn methods(&self) -> &[&'static str];

    /// Runs `method` with JSON parameters
    fn call(&mut self, method: &str, params: &Value) -> Result<AnalysisOutput>;
}

/// Creates a fresh module instance for a new compute unit
pub type ModuleFactory = Arc<dyn Fn(&AnalysisContext) -> Box<dyn ComputeModule> + Send + Sync>;

/// Factories of the built-in modules, keyed by module name
pub fn builtin_factories() -> Vec<(&'static str, ModuleFactory)> {
    fn factory<M: ComputeModule + 'static>(make: fn(AnalysisContext) -> M) -> ModuleFactory {
        Arc::new(move |ctx: &AnalysisContext| Box::new(make(*ctx)) as Box<dyn ComputeModule>)
    }
    vec![
        (frequencies::MODULE_NAME, factory(FrequenciesModule::new)),
        (descriptives::MODULE_NAME, factory(DescriptivesModule::new)),
        (nonparametric::MODULE_NAME, factory(NonparametricModule::new)),
        (regression::MODULE_NAME, factory(RegressionModule::new)),
    ]
}

/// Instantiates a built-in module by name
pub fn builtin_module(name: &str, context: &AnalysisContext) -> Option<Box<dyn ComputeModule>> {
    builtin_factories()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, make)| make(context))
}

/// Deserializes call parameters, naming the call in the error
pub(crate) fn parse_params<T: DeserializeOwned>(module: &str, method: &str, params: &Value) -> Result<T> {
    T::deserialize(params).map_err(|e| {
        Error::InvalidInput(format!("invalid parameters for {}.{}: {}", module, method, e))
    })
}

pub(crate) fn unknown_method(module: &str, method: &str) -> Error {
    Error::UnknownMethod {
        module: module.to_string(),
        method: method.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_modules_resolve() {
        let ctx = AnalysisContext::default();
        for name in BUILTIN_MODULES {
            let module = builtin_module(name, &ctx).unwrap();
            assert_eq!(module.name(), name);
            assert!(!module.methods().is_empty());
        }
        assert!(builtin_module("anova", &ctx).is_none());
    }

    #[test]
    fn test_unknown_method_is_reported() {
        let mut module = builtin_module("regression", &AnalysisContext::default()).unwrap();
        let err = module.call("logistic", &json!({})).unwrap_err();
        assert!(matches!(err, Error::UnknownMethod { ref method, .. } if method == "logistic"));
    }

    #[test]
    fn test_parse_params_error_names_the_call() {
        #[derive(serde::Deserialize, Debug)]
        struct P {
            #[allow(dead_code)]
            x: f64,
        }
        let err = parse_params::<P>("m", "f", &json!({ "x": "a" })).unwrap_err();
        assert!(err.to_string().contains("m.f"));
    }
}
