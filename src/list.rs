//! The single-period list container.
//!
//! A [`DataList`] owns the [`DataStorage`] of one dataset and runs every
//! mutation through the same pipeline: stage the new backing, check it, and
//! only then swap it in. A failed check therefore leaves the previous content
//! untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::array::{empty_arrays, period_arrays, ColumnArrays};
use crate::codec::{constant_line, external_line, RecordEncoder};
use crate::config::Verbosity;
use crate::context::ModelContext;
use crate::datatype::{Row, Value};
use crate::error::{ErrorContext, ListError, Result};
use crate::grid::GridLock;
use crate::reader::{tokenize, BlockHeader, ListReader, LoadResult, RecordDecoder, TextListReader};
use crate::storage::{
    decode_binary, encode_binary, read_binary_file, read_text_file, write_file, Comment, DataStorage, ExternalFile,
    ListData, StorageBacking,
};
use crate::structure::{Column, DatasetStructure};
use crate::validate::check_cellids;

// ------------- Input -------------
/// What an external file holds: data lines, or a single `CONSTANT` line.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalContent {
    Rows(Vec<Row>),
    Constant(Value),
}

/// Request to keep a dataset in a separate file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSpec {
    path: PathBuf,
    content: Option<ExternalContent>,
    binary: bool,
    factor: f64,
}
impl ExternalSpec {
    /// Points at an existing file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: None,
            binary: false,
            factor: 1.0,
        }
    }
    /// Rows to write to the file once they pass validation.
    pub fn with_data(mut self, rows: Vec<Row>) -> Self {
        self.content = Some(ExternalContent::Rows(rows));
        self
    }
    /// A constant, written as a `CONSTANT` text line.
    pub fn with_constant(mut self, value: Value) -> Self {
        self.content = Some(ExternalContent::Constant(value));
        self
    }
    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ListInput {
    Rows(Vec<Row>),
    /// A single row, wrapped into a one-row sequence.
    Row(Row),
    Constant { value: Value, count: usize },
    External(ExternalSpec),
}
impl From<Vec<Row>> for ListInput {
    fn from(rows: Vec<Row>) -> Self {
        ListInput::Rows(rows)
    }
}
impl From<Row> for ListInput {
    fn from(row: Row) -> Self {
        ListInput::Row(row)
    }
}
impl From<ExternalSpec> for ListInput {
    fn from(spec: ExternalSpec) -> Self {
        ListInput::External(spec)
    }
}

// ------------- DataList -------------
#[derive(Debug, Clone)]
pub struct DataList {
    structure: Arc<DatasetStructure>,
    context: Arc<ModelContext>,
    path: Vec<String>,
    storage: Option<DataStorage>,
    current_key: Option<usize>,
}

impl DataList {
    pub fn new(structure: Arc<DatasetStructure>, context: Arc<ModelContext>) -> Self {
        let mut path: Vec<String> = context.model_name().map(str::to_string).into_iter().collect();
        path.extend([
            structure.package().to_string(),
            structure.block().to_string(),
            structure.name().to_string(),
        ]);
        Self {
            structure,
            context,
            path,
            storage: None,
            current_key: None,
        }
    }
    /// A container for one stress period (zero based) of a transient dataset.
    pub fn with_period(mut self, key: usize) -> Self {
        self.current_key = Some(key);
        self
    }
    pub fn structure(&self) -> &DatasetStructure {
        &self.structure
    }
    pub fn context(&self) -> &ModelContext {
        &self.context
    }
    pub fn path(&self) -> &[String] {
        &self.path
    }
    pub fn current_key(&self) -> Option<usize> {
        self.current_key
    }
    pub fn storage(&self) -> Option<&DataStorage> {
        self.storage.as_ref()
    }
    pub fn error_context(&self) -> ErrorContext {
        ErrorContext {
            model: self.context.model_name().map(str::to_string),
            package: self.structure.package().to_string(),
            dataset: self.structure.name().to_string(),
            path: self.path.join("/"),
        }
    }
    pub fn minimum_required_columns(&self) -> usize {
        self.structure.minimum_required_columns()
    }
    /// Resolved columns for the current package dimensions.
    pub fn columns(&self) -> Vec<Column> {
        self.structure.columns(self.context.package())
    }

    /// Discards all content, as for a freshly created simulation.
    pub fn new_simulation(&mut self) {
        self.storage = None;
    }

    pub fn has_data(&self) -> bool {
        self.storage.as_ref().is_some_and(DataStorage::has_data)
    }

    /// Content in the form of the active backing. External files are not read.
    pub fn get_data(&self) -> Option<ListData<'_>> {
        self.storage.as_ref().map(DataStorage::data)
    }

    /// Replaces the content. Nothing changes unless every row passes the checks.
    pub fn set_data(&mut self, input: impl Into<ListInput>, autofill: bool, check: bool) -> Result<()> {
        let backing = self.stage(input.into(), autofill, check)?;
        debug!(path = %self.path.join("/"), external = backing.is_external(), "data set");
        self.storage.get_or_insert_with(DataStorage::new).set_backing(backing);
        Ok(())
    }

    fn stage(&self, input: ListInput, autofill: bool, check: bool) -> Result<StorageBacking> {
        match input {
            ListInput::Row(row) => self.stage(ListInput::Rows(vec![row]), autofill, check),
            ListInput::Rows(mut rows) => {
                if autofill {
                    self.autofill(&mut rows);
                }
                if check {
                    self.check_rows(&rows)?;
                }
                Ok(StorageBacking::InlineRows(rows))
            }
            ListInput::Constant { value, count } => Ok(StorageBacking::Constant { value, count }),
            ListInput::External(spec) => match spec.content {
                Some(ExternalContent::Rows(mut rows)) => {
                    let file = ExternalFile::new(spec.path, spec.binary, spec.factor);
                    if autofill {
                        self.autofill(&mut rows);
                    }
                    if check {
                        self.check_rows(&rows)?;
                    }
                    self.write_external(&file, &rows)?;
                    Ok(StorageBacking::ExternalFile(file))
                }
                Some(ExternalContent::Constant(value)) => {
                    // constants have no binary form
                    let file = ExternalFile::new(spec.path, false, spec.factor);
                    let line = self.constant_text(&value)?;
                    let target = self.context.settings().resolve(file.path());
                    write_file(&target, format!("{}\n", line).as_bytes())?;
                    Ok(StorageBacking::ExternalFile(file))
                }
                None => Ok(StorageBacking::ExternalFile(ExternalFile::new(spec.path, spec.binary, spec.factor))),
            },
        }
    }

    fn autofill(&self, rows: &mut [Row]) {
        let width = self.columns().len();
        for row in rows.iter_mut().filter(|row| !row.is_empty() && row.len() < width) {
            row.resize(width, Value::Null);
        }
    }

    // empty rows are deliberately sparse and pass
    fn check_rows(&self, rows: &[Row]) -> Result<()> {
        let minimum = self.minimum_required_columns();
        for (index, row) in rows.iter().enumerate() {
            if !row.is_empty() && row.len() < minimum {
                return Err(ListError::SchemaViolation {
                    context: self.error_context(),
                    row: index,
                    found: row.len(),
                    minimum,
                });
            }
        }
        check_cellids(rows, &self.structure, &self.context, &self.error_context())
    }

    /// Appends rows without checking them.
    pub fn append_data(&mut self, rows: Vec<Row>) -> Result<()> {
        let storage = self.storage.get_or_insert_with(DataStorage::new);
        if !storage.has_data() && !matches!(storage.backing(), StorageBacking::InlineRows(_)) {
            storage.set_backing(StorageBacking::InlineRows(Vec::new()));
        }
        storage.append_rows(rows).map_err(|_| ListError::Storage {
            context: self.error_context(),
            message: String::from("rows can only be appended to inline data"),
        })
    }

    pub fn append_list_as_record(&mut self, values: Row) -> Result<()> {
        self.append_data(vec![values])
    }

    /// Adds `values` as a new record. The index is not used to overwrite anything.
    pub fn update_record(&mut self, values: Row, index: usize) -> Result<()> {
        debug!(index, "update_record appends a new record");
        self.append_list_as_record(values)
    }

    /// First text value equal to `term` ignoring case, in row then column order.
    pub fn search_data(&self, term: &str, column: Option<usize>) -> Option<(Row, usize)> {
        let rows = self.get_data()?.rows()?;
        let term = term.to_lowercase();
        for row in rows {
            for (position, value) in row.iter().enumerate() {
                if column.is_some_and(|c| c != position) {
                    continue;
                }
                if value.as_str().is_some_and(|text| text.to_lowercase() == term) {
                    return Some((row.clone(), position));
                }
            }
        }
        None
    }

    pub fn set_comment(&mut self, row: usize, text: &str) {
        self.storage
            .get_or_insert_with(DataStorage::new)
            .set_comment(row, Comment::new(text));
    }
    pub fn set_pre_data_comment(&mut self, text: &str) {
        self.storage
            .get_or_insert_with(DataStorage::new)
            .set_pre_data_comments(Comment::new(text));
    }

    // ------------- External files -------------
    /// Moves the current content into a file. Rows are written as data lines,
    /// a constant as its `CONSTANT` line.
    pub fn store_as_external_file(&mut self, path: impl AsRef<Path>, binary: bool, replace_existing: bool, check: bool) -> Result<()> {
        if let Some(package) = self.structure.construct_package() {
            debug!(package, "data belongs to a child package and stays inline");
            return Ok(());
        }
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let content = match storage.backing() {
            StorageBacking::ExternalFile(_) if !replace_existing => return Ok(()),
            StorageBacking::ExternalFile(_) => self
                .read_external_content()?
                .unwrap_or(ExternalContent::Rows(Vec::new())),
            StorageBacking::Constant { value, .. } => ExternalContent::Constant(value.clone()),
            StorageBacking::InlineRows(rows) => ExternalContent::Rows(rows.clone()),
        };
        let path = path.as_ref();
        if self.context.settings().verbosity >= Verbosity::Verbose {
            info!(dataset = self.structure.name(), path = %path.display(), "storing data in external file");
        }
        let spec = match content {
            ExternalContent::Rows(rows) => ExternalSpec::new(path).with_data(rows).binary(binary),
            ExternalContent::Constant(value) => ExternalSpec::new(path).with_constant(value),
        };
        self.set_data(spec, false, check)
    }

    fn constant_text(&self, value: &Value) -> Result<String> {
        constant_line(value, self.structure.constant_field(), self.context.settings()).ok_or_else(|| {
            ListError::EncodingFailure {
                context: self.error_context(),
                field: self.structure.constant_field().map(|f| f.name().to_string()).unwrap_or_default(),
                row: 0,
                message: format!("constant {} has no text form", value),
            }
        })
    }

    fn write_external(&self, file: &ExternalFile, rows: &[Row]) -> Result<()> {
        let settings = self.context.settings();
        let target = settings.resolve(file.path());
        if file.binary() {
            let bytes = encode_binary(rows, &self.columns(), settings.cellid_offset).map_err(|message| self.storage_error(message))?;
            write_file(&target, &bytes)
        } else {
            let text = self.encode_rows(rows, None)?;
            write_file(&target, text.as_bytes())
        }
    }

    /// Rows of the external file backing this container, `None` for other backings.
    /// A file holding a constant is an error here; see [`Self::read_external_content`].
    pub fn read_external(&self) -> Result<Option<Vec<Row>>> {
        match self.read_external_content()? {
            None => Ok(None),
            Some(ExternalContent::Rows(rows)) => Ok(Some(rows)),
            Some(ExternalContent::Constant(_)) => Err(self.storage_error(String::from(
                "the external file holds a constant, not data lines",
            ))),
        }
    }

    /// Content of the external file backing this container, `None` for other backings.
    pub fn read_external_content(&self) -> Result<Option<ExternalContent>> {
        let Some(ListData::External(file)) = self.get_data() else {
            return Ok(None);
        };
        let settings = self.context.settings();
        let source = settings.resolve(file.path());
        let error_context = self.error_context();
        let decoder = RecordDecoder::new(&self.structure, &self.context, &error_context);
        if file.binary() {
            let size = decoder
                .cellid_size()
                .ok_or_else(|| self.storage_error(String::from("binary cellids cannot be read without a model grid")))?;
            let bytes = read_binary_file(&source)?;
            let rows = decode_binary(&bytes, &self.columns(), size, settings.cellid_offset)
                .map_err(|message| self.storage_error(message))?;
            debug!(path = %source.display(), rows = rows.len(), "binary external file read");
            return Ok(Some(ExternalContent::Rows(rows)));
        }
        let text = read_text_file(&source)?;
        if let Some(value) = constant_of(&decoder, &text)? {
            debug!(path = %source.display(), "external constant read");
            return Ok(Some(ExternalContent::Constant(value)));
        }
        let rows = decoder.decode_lines(&text)?;
        debug!(path = %source.display(), rows = rows.len(), "external file read");
        Ok(Some(ExternalContent::Rows(rows)))
    }

    fn storage_error(&self, message: String) -> ListError {
        ListError::Storage {
            context: self.error_context(),
            message,
        }
    }

    // ------------- Text -------------
    fn encode_rows(&self, rows: &[Row], storage: Option<&DataStorage>) -> Result<String> {
        let settings = self.context.settings();
        let error_context = self.error_context();
        let encoder = RecordEncoder::new(&self.structure, &self.context, settings, &error_context);
        let mut text = String::new();
        for (index, row) in rows.iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            text.push_str(&encoder.encode_line(row, index)?);
            if let Some(comment) = storage.and_then(|s| s.comment(index)) {
                text.push_str(&settings.indent);
                text.push_str(comment.text());
            }
            text.push('\n');
        }
        Ok(text)
    }

    /// The text of this dataset as it appears inside its block.
    pub fn get_file_entry(&self, values_only: bool) -> Result<String> {
        let _lock = GridLock::acquire(self.context.grid());
        let Some(storage) = &self.storage else {
            return Ok(String::new());
        };
        let settings = self.context.settings();
        let indent = &settings.indent;
        let mut text = String::new();
        if !values_only {
            if let Some(comment) = storage.pre_data_comments() {
                for line in comment.text().lines() {
                    text.push_str(line);
                    text.push('\n');
                }
            }
        }
        match storage.data() {
            ListData::Rows(rows) => {
                let comments = if values_only { None } else { Some(storage) };
                text.push_str(&self.encode_rows(rows, comments)?);
            }
            ListData::Constant { value, .. } => {
                let line = self.constant_text(value)?;
                text.push_str(&format!("{}{}{}{}\n", indent, indent, indent, line));
            }
            ListData::External(file) => {
                let line = external_line(file, settings).ok_or_else(|| {
                    self.storage_error(format!("external file path {} holds both quote characters", file.path().display()))
                })?;
                text.push_str(&format!("{}{}{}\n", indent, indent, line));
            }
        }
        Ok(text)
    }

    /// Loads one block of text with the default reader.
    pub fn load(
        &mut self,
        first_line: &str,
        lines: &mut dyn Iterator<Item = String>,
        header: Option<&BlockHeader>,
        pre_comments: Option<Comment>,
    ) -> Result<LoadResult> {
        let structure = Arc::clone(&self.structure);
        let context = Arc::clone(&self.context);
        let error_context = self.error_context();
        let mut reader = TextListReader::new(&structure, &context, &error_context);
        self.load_with(&mut reader, first_line, lines, header, pre_comments)
    }

    /// Loads with any reader. Cellids are checked once, after the whole block is read.
    pub fn load_with(
        &mut self,
        reader: &mut dyn ListReader,
        first_line: &str,
        lines: &mut dyn Iterator<Item = String>,
        header: Option<&BlockHeader>,
        pre_comments: Option<Comment>,
    ) -> Result<LoadResult> {
        let mut staged = DataStorage::new();
        let result = reader.load_from_package(first_line, lines, &mut staged, pre_comments)?;
        if let ListData::Rows(rows) = staged.data() {
            check_cellids(rows, &self.structure, &self.context, &self.error_context())?;
        }
        debug!(path = %self.path.join("/"), complete = result.complete, "block loaded");
        self.storage = Some(staged);
        if let Some(period) = header.and_then(BlockHeader::period) {
            self.current_key = Some(period.saturating_sub(1));
        }
        Ok(result)
    }

    // ------------- Arrays -------------
    /// Grid shaped arrays of the numeric columns; `None` without a grid or data.
    pub fn to_array(&self, mask: bool) -> Result<Option<ColumnArrays>> {
        let Some(grid) = self.context.grid() else {
            return Ok(None);
        };
        let shape = grid.axis_bounds();
        let columns = self.columns();
        let external;
        let rows = match self.get_data() {
            Some(ListData::Rows(rows)) => rows,
            Some(ListData::External(_)) => match self.read_external_content()? {
                Some(ExternalContent::Rows(rows)) => {
                    external = rows;
                    &external[..]
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        if rows.is_empty() {
            return Ok(Some(empty_arrays(&columns, &shape, mask)));
        }
        period_arrays(rows, &columns, &shape, mask, &self.error_context()).map(Some)
    }
}

// The value of a file whose first data line is `CONSTANT <value>`.
fn constant_of(decoder: &RecordDecoder, text: &str) -> Result<Option<Value>> {
    for (number, line) in text.lines().enumerate() {
        let (tokens, _) = tokenize(line.trim_end())?;
        let Some(head) = tokens.first() else {
            continue;
        };
        if !head.eq_ignore_ascii_case("CONSTANT") {
            return Ok(None);
        }
        return decoder.decode_constant(&tokens, number + 1).map(Some);
    }
    Ok(None)
}
