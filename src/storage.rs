//! The storage backing of one list container.
//!
//! Exactly one [`StorageBacking`] variant is active at a time. Comments live
//! next to the backing in [`DataStorage`] so that switching variants (for
//! example when data moves to an external file) never loses them.

// used for ordered row comments
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::datatype::{CellId, Row, Value};
use crate::error::{ListError, Result};
use crate::structure::{Column, ColumnKind};

// ------------- Comment -------------
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comment(String);
impl Comment {
    pub fn new(text: &str) -> Self {
        Self(text.to_string())
    }
    pub fn text(&self) -> &str {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
    /// Adds another line of comment text.
    pub fn push_line(&mut self, text: &str) {
        if !self.0.is_empty() {
            self.0.push('\n');
        }
        self.0.push_str(text);
    }
}
impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- ExternalFile -------------
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalFile {
    path: PathBuf,
    binary: bool,
    factor: f64,
    iprn: Option<i32>,
}
impl ExternalFile {
    pub fn new(path: impl Into<PathBuf>, binary: bool, factor: f64) -> Self {
        Self {
            path: path.into(),
            binary,
            factor,
            iprn: None,
        }
    }
    pub fn with_iprn(mut self, iprn: i32) -> Self {
        self.iprn = Some(iprn);
        self
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn binary(&self) -> bool {
        self.binary
    }
    pub fn factor(&self) -> f64 {
        self.factor
    }
    pub fn iprn(&self) -> Option<i32> {
        self.iprn
    }
}

// ------------- StorageBacking -------------
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBacking {
    InlineRows(Vec<Row>),
    Constant { value: Value, count: usize },
    ExternalFile(ExternalFile),
}

impl StorageBacking {
    pub fn is_external(&self) -> bool {
        matches!(self, StorageBacking::ExternalFile(_))
    }
    pub fn has_data(&self) -> bool {
        match self {
            StorageBacking::InlineRows(rows) => !rows.is_empty(),
            StorageBacking::Constant { value, .. } => !matches!(value, Value::Null),
            StorageBacking::ExternalFile(_) => true,
        }
    }
}

/// Borrowed view of a container's content, matching its backing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListData<'a> {
    Rows(&'a [Row]),
    Constant { value: &'a Value, count: usize },
    External(&'a ExternalFile),
}
impl<'a> ListData<'a> {
    pub fn rows(&self) -> Option<&'a [Row]> {
        match self {
            ListData::Rows(rows) => Some(*rows),
            _ => None,
        }
    }
}

// ------------- DataStorage -------------
#[derive(Debug, Clone, PartialEq)]
pub struct DataStorage {
    backing: StorageBacking,
    comments: BTreeMap<usize, Comment>,
    pre_data_comments: Option<Comment>,
}

impl Default for DataStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStorage {
    pub fn new() -> Self {
        Self {
            backing: StorageBacking::InlineRows(Vec::new()),
            comments: BTreeMap::new(),
            pre_data_comments: None,
        }
    }
    pub fn backing(&self) -> &StorageBacking {
        &self.backing
    }
    pub fn has_data(&self) -> bool {
        self.backing.has_data()
    }
    pub fn data(&self) -> ListData<'_> {
        match &self.backing {
            StorageBacking::InlineRows(rows) => ListData::Rows(rows),
            StorageBacking::Constant { value, count } => ListData::Constant {
                value,
                count: *count,
            },
            StorageBacking::ExternalFile(file) => ListData::External(file),
        }
    }
    /// Swaps the backing; comments stay attached.
    pub fn set_backing(&mut self, backing: StorageBacking) -> StorageBacking {
        std::mem::replace(&mut self.backing, backing)
    }
    /// Appends to inline rows. Returns the rows back when another backing is active.
    pub fn append_rows(&mut self, rows: Vec<Row>) -> std::result::Result<(), Vec<Row>> {
        match &mut self.backing {
            StorageBacking::InlineRows(kept) => {
                kept.extend(rows);
                Ok(())
            }
            _ => Err(rows),
        }
    }
    pub fn comment(&self, row: usize) -> Option<&Comment> {
        self.comments.get(&row).filter(|c| !c.is_empty())
    }
    pub fn comments(&self) -> &BTreeMap<usize, Comment> {
        &self.comments
    }
    pub fn set_comment(&mut self, row: usize, comment: Comment) {
        self.comments.insert(row, comment);
    }
    pub fn pre_data_comments(&self) -> Option<&Comment> {
        self.pre_data_comments.as_ref().filter(|c| !c.is_empty())
    }
    pub fn set_pre_data_comments(&mut self, comment: Comment) {
        self.pre_data_comments = Some(comment);
    }
}

// ------------- External file content -------------
/// Writes a whole file, creating missing parent directories.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ListError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| ListError::io(path, e))
}

pub fn read_text_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ListError::io(path, e))
}

pub fn read_binary_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| ListError::io(path, e))
}

/// Little-endian records: `i32` per integer or cellid component, `f64` per double.
/// Every row must fill every column; absent doubles are stored as NaN.
pub fn encode_binary(rows: &[Row], columns: &[Column], offset: i64) -> std::result::Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(format!("data line {} has {} entries but a binary record has {}", index, row.len(), columns.len()));
        }
        for (value, column) in row.iter().zip(columns) {
            match (column.kind, value) {
                (ColumnKind::CellId, Value::CellId(cellid)) => {
                    for component in cellid.components() {
                        let shifted = component
                            .checked_add(offset)
                            .ok_or_else(|| format!("cellid {} on data line {} overflows with offset {}", cellid, index, offset))?;
                        bytes.extend(to_i32(shifted, index)?.to_le_bytes());
                    }
                }
                (ColumnKind::Integer, Value::Integer(n)) => bytes.extend(to_i32(*n, index)?.to_le_bytes()),
                (ColumnKind::Double, Value::Double(x)) => bytes.extend(x.to_le_bytes()),
                (ColumnKind::Double, Value::Integer(n)) => bytes.extend((*n as f64).to_le_bytes()),
                (ColumnKind::Double, Value::Null) => bytes.extend(f64::NAN.to_le_bytes()),
                (kind, value) => {
                    return Err(format!(
                        "data line {} holds {} \"{}\" which cannot be stored as {:?} in a binary file",
                        index,
                        value.data_type(),
                        value,
                        kind
                    ));
                }
            }
        }
    }
    Ok(bytes)
}

fn to_i32(n: i64, row: usize) -> std::result::Result<i32, String> {
    i32::try_from(n).map_err(|_| format!("integer {} on data line {} does not fit a binary record", n, row))
}

/// Reads records written by [`encode_binary`] back into rows of the given columns.
pub fn decode_binary(bytes: &[u8], columns: &[Column], cellid_size: usize, offset: i64) -> std::result::Result<Vec<Row>, String> {
    let record_size: usize = columns
        .iter()
        .map(|column| match column.kind {
            ColumnKind::CellId => 4 * cellid_size,
            ColumnKind::Integer => 4,
            ColumnKind::Double => 8,
            ColumnKind::Text => 0,
        })
        .sum();
    if columns.iter().any(|c| c.kind == ColumnKind::Text) {
        return Err(String::from("text columns cannot be read from a binary file"));
    }
    if record_size == 0 || bytes.len() % record_size != 0 {
        return Err(format!("binary file size {} is not a multiple of the record size {}", bytes.len(), record_size));
    }
    let mut rows = Vec::with_capacity(bytes.len() / record_size);
    for record in bytes.chunks_exact(record_size) {
        let mut position = 0;
        let read_i32 = |position: &mut usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&record[*position..*position + 4]);
            *position += 4;
            i32::from_le_bytes(word) as i64
        };
        let mut row = Vec::with_capacity(columns.len());
        for column in columns {
            match column.kind {
                ColumnKind::CellId => {
                    let components: Option<Vec<i64>> =
                        (0..cellid_size).map(|_| read_i32(&mut position).checked_sub(offset)).collect();
                    let components = components
                        .ok_or_else(|| format!("cellid on binary record {} overflows with offset {}", rows.len(), offset))?;
                    row.push(Value::CellId(CellId::new(components)));
                }
                ColumnKind::Integer => row.push(Value::Integer(read_i32(&mut position))),
                ColumnKind::Double => {
                    let mut word = [0u8; 8];
                    word.copy_from_slice(&record[position..position + 8]);
                    position += 8;
                    let x = f64::from_le_bytes(word);
                    row.push(if x.is_nan() { Value::Null } else { Value::Double(x) });
                }
                ColumnKind::Text => {}
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
