//! Record encoder.
//!
//! Walks the field descriptors of a dataset against one row and produces the
//! tokens of one output line. Nested records recurse over the same row and
//! cursor; a keystring selector switches the rest of the line over to the
//! fields of the chosen option; auxiliary fields expand to one column per
//! declared auxiliary variable.

use crate::config::Settings;
use crate::context::ModelContext;
use crate::datatype::{format_cellid, format_double, needs_quotes, quote_text, Value};
use crate::error::{ErrorContext, ListError, Result};
use crate::storage::ExternalFile;
use crate::structure::{DatasetStructure, FieldDescriptor, FieldKind, Shape};

pub struct RecordEncoder<'a> {
    structure: &'a DatasetStructure,
    context: &'a ModelContext,
    settings: &'a Settings,
    error_context: &'a ErrorContext,
}

impl<'a> RecordEncoder<'a> {
    pub fn new(
        structure: &'a DatasetStructure,
        context: &'a ModelContext,
        settings: &'a Settings,
        error_context: &'a ErrorContext,
    ) -> Self {
        Self {
            structure,
            context,
            settings,
            error_context,
        }
    }

    /// Tokens for data line `index`, in schema order.
    pub fn encode_row(&self, row: &[Value], index: usize) -> Result<Vec<String>> {
        let mut tokens = Vec::with_capacity(row.len());
        let mut cursor = 0;
        self.encode_fields(self.structure.fields(), row, index, &mut cursor, &mut tokens)?;
        Ok(tokens)
    }

    /// One complete line, without the trailing newline.
    pub fn encode_line(&self, row: &[Value], index: usize) -> Result<String> {
        let indent = &self.settings.indent;
        let tokens = self.encode_row(row, index)?;
        Ok(format!("{}{}", indent, tokens.join(indent)))
    }

    fn encode_fields(
        &self,
        fields: &[FieldDescriptor],
        row: &[Value],
        index: usize,
        cursor: &mut usize,
        tokens: &mut Vec<String>,
    ) -> Result<()> {
        let dims = self.context.package();
        for field in fields {
            if field.is_aux() {
                for _aux in dims.aux_variables() {
                    let Some(value) = row.get(*cursor) else {
                        if field.is_optional() {
                            break;
                        }
                        return Err(self.missing(field, index));
                    };
                    if !value.is_absent() {
                        tokens.push(self.encode_value(field, value, index)?);
                    }
                    *cursor += 1;
                }
                continue;
            }
            if let FieldKind::Record { fields } = field.kind() {
                self.encode_fields(fields, row, index, cursor, tokens)?;
                continue;
            }
            if field.is_boundname() && !dims.boundnames() {
                continue;
            }
            // block variables write their keywords without a column
            if matches!(field.kind(), FieldKind::Keyword) && self.structure.is_block_variable() {
                tokens.push(field.display_name());
                continue;
            }
            if *cursor >= row.len() {
                if field.is_optional() {
                    break;
                }
                return Err(self.missing(field, index));
            }
            let repeats = self.repeats(field, row.len() - *cursor, index)?;
            for repetition in 0..repeats {
                let Some(value) = row.get(*cursor) else {
                    if !field.is_optional() && matches!(field.shape(), Shape::Count(_)) {
                        return Err(self.missing(field, index));
                    }
                    break;
                };
                match field.kind() {
                    FieldKind::Keyword => {
                        if !value.is_absent() {
                            tokens.push(field.display_name());
                        }
                        *cursor += 1;
                    }
                    FieldKind::Keystring { .. } => {
                        self.encode_keystring(field, row, index, cursor, tokens)?;
                        break;
                    }
                    _ => {
                        // NaN and null are skipped but still take their column
                        if !value.is_absent() {
                            if field.is_tagged() && repetition == 0 {
                                tokens.push(field.display_name());
                            }
                            tokens.push(self.encode_value(field, value, index)?);
                        }
                        *cursor += 1;
                    }
                }
            }
        }
        Ok(())
    }

    // Everything after the selector belongs to the chosen option. Its fields
    // are used in order and the last one repeats for any extra columns.
    fn encode_keystring(
        &self,
        field: &FieldDescriptor,
        row: &[Value],
        index: usize,
        cursor: &mut usize,
        tokens: &mut Vec<String>,
    ) -> Result<()> {
        let selector = &row[*cursor];
        *cursor += 1;
        if selector.is_absent() {
            if !field.is_optional() {
                return Err(self.missing(field, index));
            }
            *cursor = row.len();
            return Ok(());
        }
        let Some(key) = selector.as_str() else {
            return Err(self.failure(field, index, format!("keystring option must be text, found {}", selector.data_type())));
        };
        let variant = field
            .keystring_variant(key)
            .ok_or_else(|| self.failure(field, index, format!("\"{}\" is not a valid option", key)))?;
        tokens.push(key.to_string());
        let sub_fields = variant.fields();
        let mut sub_index = 0;
        for value in &row[*cursor..] {
            if value.is_absent() {
                continue;
            }
            let Some(sub_field) = sub_fields.get(sub_index) else {
                return Err(self.failure(field, index, format!("option \"{}\" takes no values", key)));
            };
            tokens.push(self.encode_value(sub_field, value, index)?);
            if sub_index + 1 < sub_fields.len() {
                sub_index += 1;
            }
        }
        *cursor = row.len();
        Ok(())
    }

    fn repeats(&self, field: &FieldDescriptor, remaining: usize, index: usize) -> Result<usize> {
        match field.shape() {
            Shape::Scalar | Shape::CellDim => Ok(1),
            Shape::Count(n) => Ok(*n),
            Shape::Remaining => Ok(remaining),
            Shape::Dimension(name) => self.context.package().dimension(name).ok_or_else(|| {
                self.failure(
                    field,
                    index,
                    format!("unable to resolve shape \"{}\", verify that your data is the correct shape", name),
                )
            }),
        }
    }

    /// Text form of one value in the type of its field.
    pub fn encode_value(&self, field: &FieldDescriptor, value: &Value, index: usize) -> Result<String> {
        let offset = self.settings.cellid_offset;
        if field.is_cellid() || (field.possible_cellid() && value.as_cellid().is_some()) {
            return match value {
                Value::CellId(cellid) => {
                    if let Some(grid) = self.context.grid() {
                        let size = grid.num_spatial_coordinates();
                        if cellid.len() != size {
                            return Err(self.failure(
                                field,
                                index,
                                format!("cellid {} has {} components but the model grid has {}", cellid, cellid.len(), size),
                            ));
                        }
                    }
                    format_cellid(cellid, offset)
                        .ok_or_else(|| self.failure(field, index, format!("cellid {} overflows with offset {}", cellid, offset)))
                }
                // node numbers of unstructured grids
                Value::Integer(node) => node
                    .checked_add(offset)
                    .map(|node| node.to_string())
                    .ok_or_else(|| self.failure(field, index, format!("node {} overflows with offset {}", node, offset))),
                other => Err(self.failure(field, index, format!("expected a cellid, found {} {}", other.data_type(), other))),
            };
        }
        let precision = self.settings.float_precision;
        match (field.kind(), value) {
            (FieldKind::Keyword, _) => Ok(field.display_name()),
            (_, Value::CellId(cellid)) => Err(self.failure(
                field,
                index,
                format!("cellid {} found in a column that does not hold cellids", cellid),
            )),
            (FieldKind::Integer, Value::Integer(n)) => Ok(n.to_string()),
            (FieldKind::Integer, Value::Double(x)) if x.is_finite() && x.fract() == 0.0 => Ok((*x as i64).to_string()),
            (FieldKind::Double, Value::Double(x)) => Ok(format_double(*x, precision)),
            (FieldKind::Double, Value::Integer(n)) => Ok(format_double(*n as f64, precision)),
            // numeric columns may name a time series instead
            (FieldKind::Integer | FieldKind::Double, Value::Text(name)) => {
                if needs_quotes(name) {
                    Err(self.failure(field, index, format!("\"{}\" is neither a number nor a time series name", name)))
                } else {
                    Ok(name.clone())
                }
            }
            (FieldKind::String | FieldKind::Keystring { .. }, Value::Text(text)) => quote_text(text)
                .ok_or_else(|| self.failure(field, index, format!("\"{}\" holds both quote characters", text))),
            (FieldKind::String, Value::Integer(n)) => Ok(n.to_string()),
            (FieldKind::String, Value::Double(x)) => Ok(format_double(*x, precision)),
            (kind, value) => Err(self.failure(
                field,
                index,
                format!("{} value {} cannot be written as {}", value.data_type(), value, kind_name(kind)),
            )),
        }
    }

    fn missing(&self, field: &FieldDescriptor, index: usize) -> ListError {
        ListError::MissingRequiredField {
            context: self.error_context.clone(),
            field: field.name().to_string(),
            row: index,
        }
    }

    fn failure(&self, field: &FieldDescriptor, index: usize, message: String) -> ListError {
        ListError::EncodingFailure {
            context: self.error_context.clone(),
            field: field.name().to_string(),
            row: index,
            message,
        }
    }
}

fn kind_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Integer => "integer",
        FieldKind::Double => "double",
        FieldKind::String => "string",
        FieldKind::Keyword => "keyword",
        FieldKind::Keystring { .. } => "keystring",
        FieldKind::Record { .. } => "record",
        FieldKind::CellId => "cellid",
    }
}

// ------------- Constant and external lines -------------
/// `CONSTANT <value>`, upper-cased. `None` when the value has no text form.
pub fn constant_line(value: &Value, field: Option<&FieldDescriptor>, settings: &Settings) -> Option<String> {
    let text = match (field.map(FieldDescriptor::kind), value) {
        (Some(FieldKind::Integer), Value::Double(x)) if x.fract() == 0.0 => (*x as i64).to_string(),
        (_, Value::Double(x)) => format_double(*x, settings.float_precision),
        (_, Value::Integer(n)) => n.to_string(),
        (_, Value::Text(text)) => quote_text(text)?,
        (_, Value::CellId(cellid)) => format_cellid(cellid, settings.cellid_offset)?,
        (_, Value::Null) => String::new(),
    };
    Some(format!("CONSTANT{}{}", settings.indent, text).to_uppercase())
}

/// `OPEN/CLOSE <path> [FACTOR <f>] [(BINARY)] [IPRN <n>]`. `None` when the path
/// holds both quote characters.
pub fn external_line(file: &ExternalFile, settings: &Settings) -> Option<String> {
    let mut parts = vec![
        String::from("OPEN/CLOSE"),
        quote_text(&file.path().to_string_lossy())?,
    ];
    if file.factor() != 1.0 {
        parts.push(String::from("FACTOR"));
        parts.push(format_double(file.factor(), settings.float_precision));
    }
    if file.binary() {
        parts.push(String::from("(BINARY)"));
    }
    if let Some(iprn) = file.iprn() {
        parts.push(String::from("IPRN"));
        parts.push(iprn.to_string());
    }
    Some(parts.join(&settings.indent))
}
