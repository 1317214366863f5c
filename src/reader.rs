//! Line reader for list input.
//!
//! Lines are tokenised by the grammar in `list.pest` and decoded into rows by
//! walking the same field descriptors the encoder walks, in reverse. A block
//! ends at a line starting with `END`; the caller gets that line back so it
//! can carry on with whatever follows.

use lazy_static::lazy_static;
use pest::Parser;
use pest_derive::Parser;
use regex::Regex;
use tracing::debug;

use crate::context::ModelContext;
use crate::datatype::{parse_double, parse_integer, CellId, Row, Value};
use crate::error::{ErrorContext, ListError, Result};
use crate::storage::{Comment, DataStorage, ExternalFile, StorageBacking};
use crate::structure::{DatasetStructure, FieldDescriptor, FieldKind, Shape};

#[derive(Parser)]
#[grammar = "list.pest"]
struct LineParser;

lazy_static! {
    static ref END_BLOCK: Regex = Regex::new(r"(?i)^\s*END\b").unwrap();
    static ref BEGIN_BLOCK: Regex = Regex::new(r"(?i)^\s*BEGIN\s+(\w+)(?:\s+(\d+))?").unwrap();
}

impl From<pest::error::Error<Rule>> for ListError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos(position) => position,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        ListError::Parse {
            message: e.variant.message().to_string(),
            line: Some(line),
            col: Some(col),
        }
    }
}

/// Splits one line into its tokens and trailing comment. Quotes are removed.
pub fn tokenize(line: &str) -> Result<(Vec<String>, Option<String>)> {
    let mut tokens = Vec::new();
    let mut comment = None;
    let Some(parsed) = LineParser::parse(Rule::line, line)?.next() else {
        return Ok((tokens, comment));
    };
    for pair in parsed.into_inner() {
        match pair.as_rule() {
            Rule::quoted => {
                let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
                tokens.push(inner.to_string());
            }
            Rule::bare => tokens.push(pair.as_str().to_string()),
            Rule::comment => comment = Some(pair.as_str().to_string()),
            _ => (),
        }
    }
    Ok((tokens, comment))
}

fn parse_error(message: String, line: usize) -> ListError {
    ListError::Parse {
        message,
        line: Some(line),
        col: None,
    }
}

// ------------- Block headers -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    name: String,
    period: Option<usize>,
}
impl BlockHeader {
    pub fn new(name: &str, period: Option<usize>) -> Self {
        Self {
            name: name.to_lowercase(),
            period,
        }
    }
    /// Reads `BEGIN <name> [<period>]`.
    pub fn parse(line: &str) -> Option<Self> {
        let captures = BEGIN_BLOCK.captures(line)?;
        let period = captures.get(2).and_then(|p| p.as_str().parse::<usize>().ok());
        Some(Self::new(&captures[1], period))
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    /// One based, as written in the file.
    pub fn period(&self) -> Option<usize> {
        self.period
    }
}

pub fn is_block_end(line: &str) -> bool {
    END_BLOCK.is_match(line)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// True when the block's END line was reached.
    pub complete: bool,
    pub last_line: Option<String>,
}

pub trait ListReader {
    /// Reads one block's data into `storage`, starting with `first_line`.
    fn load_from_package(
        &mut self,
        first_line: &str,
        lines: &mut dyn Iterator<Item = String>,
        storage: &mut DataStorage,
        pre_comments: Option<Comment>,
    ) -> Result<LoadResult>;
}

// ------------- RecordDecoder -------------
pub struct RecordDecoder<'a> {
    structure: &'a DatasetStructure,
    context: &'a ModelContext,
    error_context: &'a ErrorContext,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(structure: &'a DatasetStructure, context: &'a ModelContext, error_context: &'a ErrorContext) -> Self {
        Self {
            structure,
            context,
            error_context,
        }
    }

    /// Number of tokens one cellid takes.
    pub fn cellid_size(&self) -> Option<usize> {
        self.context
            .grid()
            .map(|grid| grid.num_spatial_coordinates())
            .or_else(|| self.context.package().dimension("ncelldim"))
    }

    /// Decodes the tokens of data line `index`.
    pub fn decode(&self, tokens: &[String], index: usize) -> Result<Row> {
        let mut row = Vec::with_capacity(tokens.len());
        let mut cursor = 0;
        self.decode_fields(self.structure.fields(), tokens, index, &mut cursor, &mut row)?;
        if cursor < tokens.len() {
            debug!(line = index, ignored = tokens.len() - cursor, "trailing tokens ignored");
        }
        Ok(row)
    }

    /// Decodes every data line of standalone content, skipping blanks and comments.
    pub fn decode_lines(&self, content: &str) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let (tokens, _) = tokenize(line.trim_end()).map_err(|e| at_line(e, number + 1))?;
            if tokens.is_empty() {
                continue;
            }
            rows.push(self.decode(&tokens, rows.len())?);
        }
        Ok(rows)
    }

    fn decode_fields(
        &self,
        fields: &[FieldDescriptor],
        tokens: &[String],
        index: usize,
        cursor: &mut usize,
        row: &mut Row,
    ) -> Result<()> {
        let dims = self.context.package();
        for field in fields {
            if field.is_aux() {
                for _aux in dims.aux_variables() {
                    let Some(token) = tokens.get(*cursor) else {
                        if field.is_optional() {
                            break;
                        }
                        return Err(self.missing(field, index));
                    };
                    row.push(self.decode_value(field, token));
                    *cursor += 1;
                }
                continue;
            }
            if let FieldKind::Record { fields } = field.kind() {
                self.decode_fields(fields, tokens, index, cursor, row)?;
                continue;
            }
            if field.is_boundname() && !dims.boundnames() {
                continue;
            }
            if matches!(field.kind(), FieldKind::Keyword) && self.structure.is_block_variable() {
                if tokens.get(*cursor).is_some_and(|t| self.is_keyword(field, t)) {
                    *cursor += 1;
                }
                continue;
            }
            if *cursor >= tokens.len() {
                if field.is_optional() {
                    break;
                }
                return Err(self.missing(field, index));
            }
            let repeats = match field.shape() {
                Shape::Scalar | Shape::CellDim => 1,
                Shape::Count(n) => *n,
                Shape::Remaining => tokens.len() - *cursor,
                Shape::Dimension(name) => dims.dimension(name).ok_or_else(|| {
                    parse_error(format!("unable to resolve shape \"{}\" of \"{}\"", name, field.name()), index)
                })?,
            };
            for repetition in 0..repeats {
                let Some(token) = tokens.get(*cursor) else {
                    if !field.is_optional() && matches!(field.shape(), Shape::Count(_)) {
                        return Err(self.missing(field, index));
                    }
                    break;
                };
                match field.kind() {
                    FieldKind::Keyword => {
                        if self.is_keyword(field, token) {
                            row.push(Value::Text(field.display_name()));
                            *cursor += 1;
                        } else {
                            row.push(Value::Null);
                        }
                    }
                    FieldKind::Keystring { .. } => {
                        self.decode_keystring(field, tokens, index, cursor, row)?;
                        break;
                    }
                    _ => {
                        if field.is_tagged() && repetition == 0 {
                            if !self.is_keyword(field, token) {
                                if field.is_optional() {
                                    row.push(Value::Null);
                                    break;
                                }
                                return Err(parse_error(
                                    format!("expected \"{}\" but found \"{}\"", field.display_name(), token),
                                    index,
                                ));
                            }
                            *cursor += 1;
                        }
                        if *cursor >= tokens.len() {
                            return Err(self.missing(field, index));
                        }
                        if field.is_cellid() || field.possible_cellid() {
                            row.push(self.decode_cellid(field, tokens, index, cursor)?);
                        } else {
                            row.push(self.decode_value(field, &tokens[*cursor]));
                            *cursor += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_keystring(
        &self,
        field: &FieldDescriptor,
        tokens: &[String],
        index: usize,
        cursor: &mut usize,
        row: &mut Row,
    ) -> Result<()> {
        let key = &tokens[*cursor];
        *cursor += 1;
        let variant = field
            .keystring_variant(key)
            .ok_or_else(|| parse_error(format!("\"{}\" is not a valid option for \"{}\"", key, field.name()), index))?;
        row.push(Value::Text(key.clone()));
        let sub_fields = variant.fields();
        let mut sub_index = 0;
        for token in &tokens[*cursor..] {
            let Some(sub_field) = sub_fields.get(sub_index) else {
                return Err(parse_error(format!("option \"{}\" takes no values", key), index));
            };
            row.push(self.decode_value(sub_field, token));
            if sub_index + 1 < sub_fields.len() {
                sub_index += 1;
            }
        }
        *cursor = tokens.len();
        Ok(())
    }

    // A possible cellid falls back to a plain value when its tokens are not integers.
    fn decode_cellid(&self, field: &FieldDescriptor, tokens: &[String], index: usize, cursor: &mut usize) -> Result<Value> {
        let offset = self.context.settings().cellid_offset;
        let size = match self.cellid_size() {
            Some(size) => size,
            None if field.possible_cellid() => {
                let value = self.decode_value(field, &tokens[*cursor]);
                *cursor += 1;
                return Ok(value);
            }
            None => {
                return Err(parse_error(
                    format!("cellid \"{}\" cannot be read without a model grid", field.name()),
                    index,
                ));
            }
        };
        let components: Option<Vec<i64>> = tokens
            .get(*cursor..*cursor + size)
            .and_then(|slice| slice.iter().map(|t| t.parse::<i64>().ok()?.checked_sub(offset)).collect());
        match components {
            Some(components) => {
                *cursor += size;
                Ok(Value::CellId(CellId::new(components)))
            }
            None if field.possible_cellid() => {
                let value = self.decode_value(field, &tokens[*cursor]);
                *cursor += 1;
                Ok(value)
            }
            None if *cursor + size > tokens.len() => Err(self.missing(field, index)),
            None => Err(parse_error(
                format!("\"{}\" is not a valid cellid", tokens[*cursor..*cursor + size].join(" ")),
                index,
            )),
        }
    }

    /// Typed value of one token; numeric columns keep unparseable tokens as time series names.
    pub fn decode_value(&self, field: &FieldDescriptor, token: &str) -> Value {
        match field.kind() {
            FieldKind::Integer => parse_integer(token).map_or_else(|| Value::Text(token.to_string()), Value::Integer),
            FieldKind::Double => parse_double(token).map_or_else(|| Value::Text(token.to_string()), Value::Double),
            FieldKind::Keyword => Value::Text(field.display_name()),
            _ => Value::Text(token.to_string()),
        }
    }

    /// Value of a `CONSTANT <value>` line, typed by the dataset's constant field.
    pub fn decode_constant(&self, tokens: &[String], line: usize) -> Result<Value> {
        let token = tokens
            .get(1)
            .ok_or_else(|| parse_error(String::from("CONSTANT without a value"), line))?;
        Ok(match self.structure.constant_field() {
            Some(field) => self.decode_value(field, token),
            None => Value::Text(token.clone()),
        })
    }

    fn is_keyword(&self, field: &FieldDescriptor, token: &str) -> bool {
        token.eq_ignore_ascii_case(&field.display_name()) || token.eq_ignore_ascii_case(field.name())
    }

    fn missing(&self, field: &FieldDescriptor, index: usize) -> ListError {
        ListError::MissingRequiredField {
            context: self.error_context.clone(),
            field: field.name().to_string(),
            row: index,
        }
    }
}

fn at_line(error: ListError, number: usize) -> ListError {
    match error {
        ListError::Parse { message, col, .. } => ListError::Parse {
            message,
            line: Some(number),
            col,
        },
        other => other,
    }
}

// ------------- TextListReader -------------
pub struct TextListReader<'a> {
    decoder: RecordDecoder<'a>,
}

impl<'a> TextListReader<'a> {
    pub fn new(structure: &'a DatasetStructure, context: &'a ModelContext, error_context: &'a ErrorContext) -> Self {
        Self {
            decoder: RecordDecoder::new(structure, context, error_context),
        }
    }

    fn open_close(&self, tokens: &[String], line: usize) -> Result<ExternalFile> {
        let path = tokens
            .get(1)
            .ok_or_else(|| parse_error(String::from("OPEN/CLOSE without a file name"), line))?;
        let mut binary = false;
        let mut factor = 1.0;
        let mut iprn = None;
        let mut options = tokens[2..].iter();
        while let Some(option) = options.next() {
            match option.to_uppercase().as_str() {
                "(BINARY)" | "BINARY" => binary = true,
                "FACTOR" => {
                    factor = options
                        .next()
                        .and_then(|t| parse_double(t))
                        .ok_or_else(|| parse_error(String::from("FACTOR without a number"), line))?;
                }
                "IPRN" => {
                    iprn = options.next().and_then(|t| t.parse::<i32>().ok());
                }
                other => debug!(option = other, "unknown OPEN/CLOSE option ignored"),
            }
        }
        let file = ExternalFile::new(path.as_str(), binary, factor);
        Ok(match iprn {
            Some(iprn) => file.with_iprn(iprn),
            None => file,
        })
    }
}

impl ListReader for TextListReader<'_> {
    fn load_from_package(
        &mut self,
        first_line: &str,
        lines: &mut dyn Iterator<Item = String>,
        storage: &mut DataStorage,
        pre_comments: Option<Comment>,
    ) -> Result<LoadResult> {
        let mut rows: Vec<Row> = Vec::new();
        let mut backing: Option<StorageBacking> = None;
        let mut pre_data = pre_comments;
        let mut number = 0;
        let mut current = Some(first_line.to_string());
        while let Some(line) = current.take() {
            number += 1;
            if is_block_end(&line) {
                commit(storage, backing, rows, pre_data);
                return Ok(LoadResult {
                    complete: true,
                    last_line: Some(line),
                });
            }
            let (tokens, comment) = tokenize(line.trim_end()).map_err(|e| at_line(e, number))?;
            if tokens.is_empty() {
                if let Some(comment) = comment {
                    match rows.len() {
                        0 => pre_data.get_or_insert_with(Comment::default).push_line(&comment),
                        n => push_comment(storage, n - 1, &comment),
                    }
                }
                current = lines.next();
                continue;
            }
            if backing.is_some() {
                return Err(parse_error(
                    String::from("data lines cannot follow an OPEN/CLOSE or CONSTANT line"),
                    number,
                ));
            }
            let head = tokens[0].to_uppercase();
            if rows.is_empty() && head == "OPEN/CLOSE" {
                backing = Some(StorageBacking::ExternalFile(self.open_close(&tokens, number)?));
            } else if rows.is_empty() && head == "CONSTANT" {
                let value = self.decoder.decode_constant(&tokens, number)?;
                backing = Some(StorageBacking::Constant { value, count: 1 });
            } else {
                rows.push(self.decoder.decode(&tokens, rows.len())?);
                if let Some(comment) = comment {
                    push_comment(storage, rows.len() - 1, &comment);
                }
            }
            current = lines.next();
        }
        commit(storage, backing, rows, pre_data);
        Ok(LoadResult {
            complete: false,
            last_line: None,
        })
    }
}

fn push_comment(storage: &mut DataStorage, row: usize, text: &str) {
    let mut comment = storage.comment(row).cloned().unwrap_or_default();
    comment.push_line(text);
    storage.set_comment(row, comment);
}

fn commit(storage: &mut DataStorage, backing: Option<StorageBacking>, rows: Vec<Row>, pre_data: Option<Comment>) {
    storage.set_backing(backing.unwrap_or(StorageBacking::InlineRows(rows)));
    if let Some(comment) = pre_data {
        storage.set_pre_data_comments(comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_quotes_and_comments() {
        let (tokens, comment) = tokenize("  1 2, 3  'my well'  -1.5D2 # pumping").unwrap();
        assert_eq!(tokens, vec!["1", "2", "3", "my well", "-1.5D2"]);
        assert_eq!(comment.as_deref(), Some("# pumping"));
        let (tokens, comment) = tokenize("// only a comment").unwrap();
        assert!(tokens.is_empty());
        assert_eq!(comment.as_deref(), Some("// only a comment"));
    }

    #[test]
    fn unterminated_quote_is_a_parse_error() {
        assert!(matches!(tokenize("1 'open"), Err(ListError::Parse { .. })));
    }

    #[test]
    fn block_headers() {
        let header = BlockHeader::parse("BEGIN period 3").unwrap();
        assert_eq!(header.name(), "period");
        assert_eq!(header.period(), Some(3));
        assert_eq!(BlockHeader::parse("begin OPTIONS").unwrap().period(), None);
        assert!(BlockHeader::parse("1 2 3").is_none());
        assert!(is_block_end("  end period"));
        assert!(!is_block_end("endless"));
    }
}
