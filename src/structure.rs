//! Field descriptors and the schema repository they come from.
//!
//! A dataset's columns are not fixed at compile time: a [`DatasetStructure`]
//! lists [`FieldDescriptor`]s whose [`FieldKind`] and [`Shape`] decide, at run
//! time, how many columns of a row they consume and how they are written.

use serde::Deserialize;

// other keepers use HashMap
use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::PackageDimensions;
use crate::error::{ListError, Result};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Shape -------------
/// How many times a field repeats on one line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum Shape {
    #[default]
    Scalar,
    Count(usize),
    /// One cellid whose arity follows the grid.
    CellDim,
    /// Resolved through a named package dimension.
    Dimension(String),
    /// Every column left on the line.
    Remaining,
}
impl From<String> for Shape {
    fn from(expr: String) -> Self {
        Shape::from(expr.as_str())
    }
}
impl From<&str> for Shape {
    fn from(expr: &str) -> Self {
        let expr = expr.trim().trim_start_matches('(').trim_end_matches(')').trim();
        match expr.to_lowercase().as_str() {
            "" => Shape::Scalar,
            "ncelldim" => Shape::CellDim,
            "*" | "any1d" | ":" => Shape::Remaining,
            other => match other.parse::<usize>() {
                Ok(n) => Shape::Count(n),
                Err(_) => Shape::Dimension(other.to_string()),
            },
        }
    }
}

// ------------- FieldKind -------------
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "float")]
    Double,
    String,
    Keyword,
    /// A selector whose value decides the shape of the rest of the line.
    Keystring { variants: Vec<KeystringVariant> },
    Record { fields: Vec<FieldDescriptor> },
    CellId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeystringVariant {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}
impl KeystringVariant {
    pub fn new(name: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// The fields following the selector token.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

// ------------- FieldDescriptor -------------
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(flatten)]
    kind: FieldKind,
    #[serde(default)]
    is_cellid: bool,
    #[serde(default)]
    possible_cellid: bool,
    #[serde(default)]
    is_aux: bool,
    #[serde(default)]
    is_boundname: bool,
    #[serde(default)]
    tagged: bool,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    shape: Shape,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            kind,
            is_cellid: false,
            possible_cellid: false,
            is_aux: false,
            is_boundname: false,
            tagged: false,
            optional: false,
            shape: Shape::Scalar,
        }
    }
    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }
    pub fn double(name: &str) -> Self {
        Self::new(name, FieldKind::Double)
    }
    pub fn string(name: &str) -> Self {
        Self::new(name, FieldKind::String)
    }
    pub fn keyword(name: &str) -> Self {
        Self::new(name, FieldKind::Keyword)
    }
    pub fn cellid(name: &str) -> Self {
        let mut field = Self::new(name, FieldKind::CellId);
        field.is_cellid = true;
        field.shape = Shape::CellDim;
        field
    }
    pub fn record(name: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self::new(name, FieldKind::Record { fields })
    }
    pub fn keystring(name: &str, variants: Vec<KeystringVariant>) -> Self {
        Self::new(name, FieldKind::Keystring { variants })
    }
    /// Auxiliary columns, one per declared auxiliary variable.
    pub fn aux(name: &str) -> Self {
        let mut field = Self::new(name, FieldKind::Double);
        field.is_aux = true;
        field.optional = true;
        field
    }
    pub fn boundname(name: &str) -> Self {
        let mut field = Self::new(name, FieldKind::String);
        field.is_boundname = true;
        field.optional = true;
        field
    }
    // builder style modifiers
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
    pub fn tagged(mut self) -> Self {
        self.tagged = true;
        self
    }
    pub fn maybe_cellid(mut self) -> Self {
        self.possible_cellid = true;
        self
    }
    pub fn with_shape(mut self, shape: impl Into<Shape>) -> Self {
        self.shape = shape.into();
        self
    }
    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }
    // getters only, descriptors are immutable once built
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Token written for keywords and tags.
    pub fn display_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.name.to_uppercase())
    }
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
    pub fn is_cellid(&self) -> bool {
        self.is_cellid || matches!(self.kind, FieldKind::CellId)
    }
    pub fn possible_cellid(&self) -> bool {
        self.possible_cellid
    }
    pub fn is_aux(&self) -> bool {
        self.is_aux
    }
    pub fn is_boundname(&self) -> bool {
        self.is_boundname
    }
    pub fn is_tagged(&self) -> bool {
        self.tagged
    }
    pub fn is_optional(&self) -> bool {
        self.optional
    }
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Integer | FieldKind::Double)
    }
    /// Looks up a keystring option by its selector, also trying the `<key>record` form.
    pub fn keystring_variant(&self, key: &str) -> Option<&KeystringVariant> {
        let FieldKind::Keystring { variants } = &self.kind else {
            return None;
        };
        let key = key.to_lowercase();
        let record_key = format!("{}record", key);
        variants
            .iter()
            .find(|v| v.name.to_lowercase() == key)
            .or_else(|| variants.iter().find(|v| v.name.to_lowercase() == record_key))
    }
}

// ------------- Columns -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    CellId,
    Integer,
    Double,
    Text,
}

/// One resolved column of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}
impl Column {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnKind::Integer | ColumnKind::Double)
    }
}

/// Number of columns a row must at least have for these fields.
pub fn minimum_required_columns(fields: &[FieldDescriptor]) -> usize {
    required_columns(fields, 1)
}

fn required_columns(fields: &[FieldDescriptor], keyword_width: usize) -> usize {
    fields
        .iter()
        .map(|field| match field.kind() {
            _ if field.is_optional() || field.is_aux() || field.is_boundname() => 0,
            FieldKind::Record { fields } => required_columns(fields, keyword_width),
            FieldKind::Keyword => keyword_width,
            _ => match field.shape() {
                Shape::Count(n) => *n,
                Shape::Remaining => 0,
                _ => 1,
            },
        })
        .sum()
}

// ------------- DatasetStructure -------------
fn default_block() -> String {
    String::from("period")
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetStructure {
    name: String,
    #[serde(default)]
    package: String,
    #[serde(default = "default_block")]
    block: String,
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    block_variable: bool,
    #[serde(default)]
    construct_package: Option<String>,
}

impl DatasetStructure {
    pub fn new(package: &str, name: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.to_string(),
            package: package.to_string(),
            block: default_block(),
            fields,
            block_variable: false,
            construct_package: None,
        }
    }
    pub fn in_block(mut self, block: &str) -> Self {
        self.block = block.to_string();
        self
    }
    pub fn as_block_variable(mut self) -> Self {
        self.block_variable = true;
        self
    }
    pub fn constructing(mut self, package: &str) -> Self {
        self.construct_package = Some(package.to_string());
        self
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn package(&self) -> &str {
        &self.package
    }
    pub fn block(&self) -> &str {
        &self.block
    }
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    /// Block variables write their keywords without consuming a column.
    pub fn is_block_variable(&self) -> bool {
        self.block_variable
    }
    /// Set when the data belongs to a child package rather than this one.
    pub fn construct_package(&self) -> Option<&str> {
        self.construct_package.as_deref()
    }
    pub fn minimum_required_columns(&self) -> usize {
        let keyword_width = if self.block_variable { 0 } else { 1 };
        required_columns(&self.fields, keyword_width)
    }
    /// Column of the first field that is not a keyword.
    pub fn first_non_keyword_index(&self) -> Option<usize> {
        let keywords = self
            .fields
            .iter()
            .take_while(|field| matches!(field.kind(), FieldKind::Keyword))
            .count();
        if keywords == self.fields.len() {
            return None;
        }
        Some(if self.block_variable { 0 } else { keywords })
    }
    /// The field whose type a constant value is written with.
    pub fn constant_field(&self) -> Option<&FieldDescriptor> {
        self.fields.get(1).or_else(|| self.fields.first())
    }
    pub fn has_cellid_fields(&self) -> bool {
        fn any_cellid(fields: &[FieldDescriptor]) -> bool {
            fields.iter().any(|field| match field.kind() {
                FieldKind::Record { fields } => any_cellid(fields),
                FieldKind::Keystring { variants } => variants.iter().any(|v| any_cellid(v.fields())),
                _ => field.is_cellid() || field.possible_cellid(),
            })
        }
        any_cellid(&self.fields)
    }
    /// Resolved columns up to the first variable-width field (keystring or
    /// open-ended shape), with auxiliary variables expanded.
    pub fn columns(&self, dims: &PackageDimensions) -> Vec<Column> {
        let mut columns = Vec::new();
        self.collect_columns(&self.fields, dims, &mut columns);
        columns
    }
    // returns false once the width of the rest of the line is unknown
    fn collect_columns(&self, fields: &[FieldDescriptor], dims: &PackageDimensions, columns: &mut Vec<Column>) -> bool {
        for field in fields {
            if field.is_aux() {
                for aux in dims.aux_variables() {
                    columns.push(Column::new(aux, ColumnKind::Double));
                }
                continue;
            }
            if field.is_boundname() && !dims.boundnames() {
                continue;
            }
            let kind = if field.is_cellid() {
                ColumnKind::CellId
            } else {
                match field.kind() {
                    FieldKind::Record { fields } => {
                        if !self.collect_columns(fields, dims, columns) {
                            return false;
                        }
                        continue;
                    }
                    FieldKind::Keystring { .. } => {
                        columns.push(Column::new(field.name(), ColumnKind::Text));
                        return false;
                    }
                    FieldKind::Keyword if self.block_variable => continue,
                    FieldKind::Integer => ColumnKind::Integer,
                    FieldKind::Double => ColumnKind::Double,
                    _ => ColumnKind::Text,
                }
            };
            let repeats = match field.shape() {
                Shape::Count(n) => *n,
                Shape::Dimension(name) => match dims.dimension(name) {
                    Some(n) => n,
                    None => return false,
                },
                Shape::Remaining => return false,
                Shape::Scalar | Shape::CellDim => 1,
            };
            if repeats == 1 {
                columns.push(Column::new(field.name(), kind));
            } else {
                for n in 1..=repeats {
                    columns.push(Column::new(&format!("{}_{}", field.name(), n), kind));
                }
            }
        }
        true
    }
    /// Positions of the columns that hold (or may hold) a cellid.
    pub fn cellid_columns(&self, dims: &PackageDimensions) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut cursor = 0;
        self.cellid_positions(&self.fields, dims, &mut cursor, &mut positions);
        positions
    }
    fn cellid_positions(&self, fields: &[FieldDescriptor], dims: &PackageDimensions, cursor: &mut usize, positions: &mut Vec<usize>) -> bool {
        for field in fields {
            if field.is_aux() {
                *cursor += dims.aux_variables().count();
                continue;
            }
            if field.is_boundname() && !dims.boundnames() {
                continue;
            }
            match field.kind() {
                FieldKind::Record { fields } => {
                    if !self.cellid_positions(fields, dims, cursor, positions) {
                        return false;
                    }
                }
                FieldKind::Keystring { .. } => return false,
                FieldKind::Keyword if self.block_variable => {}
                _ => {
                    let repeats = match field.shape() {
                        Shape::Count(n) => *n,
                        Shape::Dimension(name) => match dims.dimension(name) {
                            Some(n) => n,
                            None => return false,
                        },
                        Shape::Remaining => return false,
                        Shape::Scalar | Shape::CellDim => 1,
                    };
                    if field.is_cellid() || field.possible_cellid() {
                        positions.extend(*cursor..*cursor + repeats);
                    }
                    *cursor += repeats;
                }
            }
        }
        true
    }
}

// ------------- SchemaRepository -------------
/// Keeps the dataset structures of every known package, keyed by lower-cased package name.
#[derive(Debug, Default)]
pub struct SchemaRepository {
    kept: HashMap<String, Vec<Arc<DatasetStructure>>, OtherHasher>,
}

impl SchemaRepository {
    pub fn new() -> Self {
        Self::default()
    }
    /// Reads a document of the form `{"<package>": [<dataset>, ...], ...}`.
    pub fn from_json(document: &str) -> Result<Self> {
        let packages: HashMap<String, Vec<DatasetStructure>> = serde_json::from_str(document)?;
        let mut repository = Self::new();
        for (package, datasets) in packages {
            for mut dataset in datasets {
                if dataset.package.is_empty() {
                    dataset.package = package.clone();
                } else if !dataset.package.eq_ignore_ascii_case(&package) {
                    return Err(ListError::Schema(format!(
                        "dataset \"{}\" declares package \"{}\" but is listed under \"{}\"",
                        dataset.name, dataset.package, package
                    )));
                }
                repository.keep(dataset);
            }
        }
        Ok(repository)
    }
    pub fn keep(&mut self, structure: DatasetStructure) -> Arc<DatasetStructure> {
        let kept = Arc::new(structure);
        self.kept
            .entry(kept.package().to_lowercase())
            .or_default()
            .push(Arc::clone(&kept));
        kept
    }
    pub fn dataset(&self, package: &str, name: &str) -> Option<Arc<DatasetStructure>> {
        self.kept
            .get(&package.to_lowercase())?
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
    }
    pub fn get_field_descriptors(&self, package: &str, name: &str) -> Option<Vec<FieldDescriptor>> {
        self.dataset(package, name).map(|d| d.fields().to_vec())
    }
    pub fn len(&self) -> usize {
        self.kept.values().map(Vec::len).sum()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_expressions() {
        assert_eq!(Shape::from(""), Shape::Scalar);
        assert_eq!(Shape::from("(ncelldim)"), Shape::CellDim);
        assert_eq!(Shape::from("3"), Shape::Count(3));
        assert_eq!(Shape::from("any1d"), Shape::Remaining);
        assert_eq!(Shape::from("(naux)"), Shape::Dimension("naux".to_string()));
    }

    #[test]
    fn minimum_columns_skip_optional_and_aux() {
        let fields = vec![
            FieldDescriptor::cellid("cellid"),
            FieldDescriptor::double("head"),
            FieldDescriptor::aux("aux"),
            FieldDescriptor::boundname("boundname"),
            FieldDescriptor::double("extra").optional(),
        ];
        assert_eq!(minimum_required_columns(&fields), 2);
    }

    #[test]
    fn schema_document_fills_package_names() {
        let document = r#"{
            "chd": [{
                "name": "stress_period_data",
                "fields": [
                    {"name": "cellid", "type": "cellid", "shape": "ncelldim"},
                    {"name": "head", "type": "double"},
                    {"name": "boundname", "type": "string", "is_boundname": true, "optional": true}
                ]
            }]
        }"#;
        let repository = SchemaRepository::from_json(document).unwrap();
        let dataset = repository.dataset("CHD", "stress_period_data").unwrap();
        assert_eq!(dataset.package(), "chd");
        assert_eq!(dataset.block(), "period");
        assert!(dataset.has_cellid_fields());
        assert_eq!(dataset.minimum_required_columns(), 2);
        let fields = repository.get_field_descriptors("chd", "STRESS_PERIOD_DATA").unwrap();
        assert!(fields[2].is_boundname());
    }
}
