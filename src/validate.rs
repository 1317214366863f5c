//! Cross-checks cellids against the grid of the owning model.

use tracing::trace;

use crate::context::ModelContext;
use crate::datatype::{Row, Value};
use crate::error::{ErrorContext, ListError, Result};
use crate::structure::DatasetStructure;

/// Every cellid must lie inside the grid bounds and address an active cell.
/// Nothing is checked without a complete grid or without cellid fields.
/// Values in possible-cellid columns that are not cellids are skipped.
pub fn check_cellids(rows: &[Row], structure: &DatasetStructure, context: &ModelContext, error_context: &ErrorContext) -> Result<()> {
    let Some(grid) = context.grid() else {
        return Ok(());
    };
    if !grid.is_complete() || !structure.has_cellid_fields() {
        return Ok(());
    }
    let positions = structure.cellid_columns(context.package());
    let bounds = grid.axis_bounds();
    for (index, row) in rows.iter().enumerate() {
        for position in &positions {
            let Some(Value::CellId(cellid)) = row.get(*position) else {
                continue;
            };
            let inside = cellid.len() == bounds.len()
                && cellid
                    .components()
                    .iter()
                    .zip(&bounds)
                    .all(|(component, bound)| *component >= 0 && (*component as usize) < *bound);
            if !inside {
                return Err(ListError::GridBoundsViolation {
                    context: error_context.clone(),
                    row: index,
                    cellid: cellid.clone(),
                    shape: bounds,
                });
            }
            if !grid.active_flag(cellid) {
                return Err(ListError::InactiveCellViolation {
                    context: error_context.clone(),
                    row: index,
                    cellid: cellid.clone(),
                });
            }
        }
    }
    trace!(rows = rows.len(), columns = positions.len(), "cellids checked");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Settings;
    use crate::datatype::CellId;
    use crate::grid::StructuredGrid;
    use crate::structure::FieldDescriptor;

    fn structure() -> DatasetStructure {
        DatasetStructure::new(
            "wel",
            "stress_period_data",
            vec![FieldDescriptor::cellid("cellid"), FieldDescriptor::double("q")],
        )
    }

    fn row(cellid: [i64; 3]) -> Row {
        vec![Value::CellId(CellId::from(cellid)), Value::Double(1.0)]
    }

    #[test]
    fn negative_components_are_out_of_bounds() {
        let context = ModelContext::new(Settings::default()).with_model("gwf", Arc::new(StructuredGrid::dis(1, 2, 2)));
        let error = check_cellids(&[row([0, -1, 0])], &structure(), &context, &ErrorContext::default()).unwrap_err();
        assert!(matches!(error, ListError::GridBoundsViolation { row: 0, .. }));
    }

    #[test]
    fn idomain_zero_is_inactive() {
        let grid = StructuredGrid::dis(1, 2, 2).with_idomain(vec![1, 1, 0, 1]);
        let context = ModelContext::new(Settings::default()).with_model("gwf", Arc::new(grid));
        let rows = vec![row([0, 0, 1]), row([0, 1, 0])];
        let error = check_cellids(&rows, &structure(), &context, &ErrorContext::default()).unwrap_err();
        assert!(matches!(error, ListError::InactiveCellViolation { row: 1, .. }));
    }

    #[test]
    fn incomplete_grid_is_not_checked() {
        let grid = StructuredGrid::dis(1, 1, 1).incomplete();
        let context = ModelContext::new(Settings::default()).with_model("gwf", Arc::new(grid));
        assert!(check_cellids(&[row([5, 5, 5])], &structure(), &context, &ErrorContext::default()).is_ok());
    }
}
