//! Dense, grid shaped views of list data.
//!
//! Every numeric column after the leading cellid column becomes one array with
//! the shape of the grid. Rows sharing a cell are averaged, except for
//! conductance and flux columns which are summed.

use indexmap::IndexMap;
use ndarray::{ArrayD, Axis, IxDyn};

use crate::datatype::{CellId, Row, Value};
use crate::error::{ErrorContext, ListError, Result};
use crate::structure::Column;

/// Dense arrays keyed by column name, in column order.
pub type ColumnArrays = IndexMap<String, ArrayD<f64>>;

pub fn is_additive_column(name: &str) -> bool {
    name.eq_ignore_ascii_case("cond") || name.eq_ignore_ascii_case("flux")
}

fn array_columns(columns: &[Column]) -> impl Iterator<Item = (usize, &Column)> {
    columns.iter().enumerate().skip(1).filter(|(_, column)| column.is_numeric())
}

/// Arrays for one period. Cells without contributions hold zero, or NaN when masked.
pub fn period_arrays(rows: &[Row], columns: &[Column], shape: &[usize], mask: bool, error_context: &ErrorContext) -> Result<ColumnArrays> {
    let cell_count: usize = shape.iter().product();
    let mut cells = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        cells.push(cell_index(row, shape, index, error_context)?);
    }
    let mut arrays = ColumnArrays::new();
    for (position, column) in array_columns(columns) {
        let mut sums = vec![0.0; cell_count];
        let mut counts = vec![0usize; cell_count];
        for (row, cell) in rows.iter().zip(&cells) {
            let Some(cell) = cell else {
                continue;
            };
            let Some(x) = row.get(position).and_then(Value::as_f64).filter(|x| !x.is_nan()) else {
                continue;
            };
            sums[*cell] += x;
            counts[*cell] += 1;
        }
        let additive = is_additive_column(&column.name);
        let values: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| match count {
                0 if mask => f64::NAN,
                0 => 0.0,
                _ if additive => sum,
                n => sum / n as f64,
            })
            .collect();
        arrays.insert(column.name.clone(), shaped(shape, values, error_context)?);
    }
    Ok(arrays)
}

/// Arrays for a period without entries.
pub fn empty_arrays(columns: &[Column], shape: &[usize], mask: bool) -> ColumnArrays {
    let fill = if mask { f64::NAN } else { 0.0 };
    array_columns(columns)
        .map(|(_, column)| (column.name.clone(), ArrayD::from_elem(IxDyn(shape), fill)))
        .collect()
}

/// Stacks per-period arrays along a leading period axis. Missing periods stay NaN.
pub fn stack_periods(periods: &[Option<ColumnArrays>], columns: &[Column], shape: &[usize]) -> ColumnArrays {
    let mut full_shape = vec![periods.len()];
    full_shape.extend_from_slice(shape);
    let mut stacked: ColumnArrays = array_columns(columns)
        .map(|(_, column)| (column.name.clone(), ArrayD::from_elem(IxDyn(&full_shape), f64::NAN)))
        .collect();
    for (kper, arrays) in periods.iter().enumerate() {
        let Some(arrays) = arrays else {
            continue;
        };
        for (name, array) in arrays {
            if let Some(target) = stacked.get_mut(name) {
                target.index_axis_mut(Axis(0), kper).assign(array);
            }
        }
    }
    stacked
}

fn shaped(shape: &[usize], values: Vec<f64>, error_context: &ErrorContext) -> Result<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| ListError::Storage {
        context: error_context.clone(),
        message: e.to_string(),
    })
}

// Unstructured grids may carry plain node numbers instead of cellids.
fn cell_index(row: &Row, shape: &[usize], index: usize, error_context: &ErrorContext) -> Result<Option<usize>> {
    let cellid = match row.first() {
        Some(Value::CellId(cellid)) => cellid.clone(),
        Some(Value::Integer(node)) if shape.len() == 1 => CellId::new(vec![*node]),
        _ => return Ok(None),
    };
    match cellid.flat_index(shape) {
        Some(cell) => Ok(Some(cell)),
        None => Err(ListError::GridBoundsViolation {
            context: error_context.clone(),
            row: index,
            cellid,
            shape: shape.to_vec(),
        }),
    }
}
