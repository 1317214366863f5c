use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Settings;
use crate::grid::ModelGrid;
use crate::structure::OtherHasher;

// ------------- PackageDimensions -------------
/// Package level facts the schema refers to: auxiliary variable names,
/// whether boundnames are written, and named dimensions used by shapes.
#[derive(Debug, Clone, Default)]
pub struct PackageDimensions {
    aux_names: Vec<String>,
    boundnames: bool,
    dimensions: HashMap<String, usize, OtherHasher>,
}

impl PackageDimensions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_aux<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.aux_names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self
    }
    pub fn with_boundnames(mut self, boundnames: bool) -> Self {
        self.boundnames = boundnames;
        self
    }
    pub fn with_dimension(mut self, name: &str, size: usize) -> Self {
        self.dimensions.insert(name.to_lowercase(), size);
        self
    }
    /// Declared auxiliary variables, without the literal `auxiliary` keyword.
    pub fn aux_variables(&self) -> impl Iterator<Item = &str> {
        self.aux_names
            .iter()
            .map(String::as_str)
            .filter(|name| !name.eq_ignore_ascii_case("auxiliary"))
    }
    pub fn boundnames(&self) -> bool {
        self.boundnames
    }
    pub fn dimension(&self, name: &str) -> Option<usize> {
        match name.to_lowercase().as_str() {
            "naux" => Some(self.aux_variables().count()),
            other => self.dimensions.get(other).copied(),
        }
    }
}

// ------------- ModelContext -------------
/// What a dataset knows about its surroundings. Shared by every period of a
/// transient dataset and never mutated once built.
#[derive(Debug, Clone)]
pub struct ModelContext {
    model_name: Option<String>,
    grid: Option<Arc<dyn ModelGrid>>,
    package: PackageDimensions,
    stress_periods: usize,
    settings: Settings,
}

impl ModelContext {
    /// A context outside of any model: no grid, one stress period.
    pub fn new(settings: Settings) -> Self {
        Self {
            model_name: None,
            grid: None,
            package: PackageDimensions::default(),
            stress_periods: 1,
            settings,
        }
    }
    pub fn with_model(mut self, name: &str, grid: Arc<dyn ModelGrid>) -> Self {
        self.model_name = Some(name.to_string());
        self.grid = Some(grid);
        self
    }
    pub fn with_package(mut self, package: PackageDimensions) -> Self {
        self.package = package;
        self
    }
    pub fn with_stress_periods(mut self, stress_periods: usize) -> Self {
        self.stress_periods = stress_periods;
        self
    }
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }
    pub fn grid(&self) -> Option<&dyn ModelGrid> {
        self.grid.as_deref()
    }
    pub fn package(&self) -> &PackageDimensions {
        &self.package
    }
    pub fn stress_periods(&self) -> usize {
        self.stress_periods
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
