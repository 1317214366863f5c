use std::sync::Arc;

use listdata::config::Settings;
use listdata::context::ModelContext;
use listdata::datatype::{CellId, Row, Value};
use listdata::grid::StructuredGrid;
use listdata::list::ListInput;
use listdata::reader::BlockHeader;
use listdata::storage::ListData;
use listdata::structure::{DatasetStructure, FieldDescriptor};
use listdata::transient::TransientDataList;
use listdata::ListError;

fn cell(k: i64, i: i64, j: i64) -> Value {
    Value::CellId(CellId::from([k, i, j]))
}

fn row(j: i64, q: f64) -> Row {
    vec![cell(0, 0, j), Value::Double(q)]
}

fn setup(stress_periods: usize) -> TransientDataList {
    let structure = DatasetStructure::new(
        "wel",
        "stress_period_data",
        vec![FieldDescriptor::cellid("cellid"), FieldDescriptor::double("q")],
    );
    let context = ModelContext::new(Settings::default())
        .with_model("gwf", Arc::new(StructuredGrid::dis(1, 1, 3)))
        .with_stress_periods(stress_periods);
    TransientDataList::new(Arc::new(structure), Arc::new(context))
}

fn rows_of(wel: &TransientDataList, key: usize) -> Option<Vec<Row>> {
    wel.get_data(key).and_then(|d| d.rows()).map(<[Row]>::to_vec)
}

#[test]
fn none_removes_a_period() {
    let mut wel = setup(5);
    wel.set_data(
        [
            (0, Some(ListInput::from(vec![row(0, -1.0)]))),
            (3, Some(ListInput::from(vec![row(1, -2.0)]))),
        ],
        false,
    )
    .expect("valid data");
    assert!(wel.has_data(Some(3)));
    wel.set_data([(3, None)], false).expect("removal");
    assert!(wel.get_data(3).is_none());
    assert!(!wel.has_data(Some(3)));
    let all = wel.get_all_data();
    assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![0]);
    // removing an absent period is fine
    wel.set_period_data(4, None, false).expect("nothing to remove");
}

#[test]
fn absent_is_not_empty() {
    let mut wel = setup(3);
    wel.add_period(1);
    assert!(wel.get_data(1).is_some());
    assert!(!wel.has_data(Some(1)));
    assert!(wel.get_data(2).is_none());
    assert!(!wel.has_data(None));
    // add_period leaves existing data alone
    wel.set_period_data(0, Some(vec![row(0, 1.0)].into()), false).unwrap();
    wel.add_period(0);
    assert_eq!(rows_of(&wel, 0).map(|r| r.len()), Some(1));
    assert!(wel.has_data(None));
}

#[test]
fn failed_period_is_not_created() {
    let mut wel = setup(2);
    wel.set_period_data(0, Some(vec![row(0, 1.0)].into()), false).unwrap();
    let error = wel
        .set_data(
            [
                (1, Some(ListInput::from(vec![row(7, 1.0)]))),
            ],
            false,
        )
        .unwrap_err();
    assert!(matches!(error, ListError::GridBoundsViolation { .. }));
    assert!(wel.get_data(1).is_none());
    assert!(wel.has_data(Some(0)));
}

#[test]
fn data_array_is_aligned_to_periods() {
    let mut wel = setup(4);
    wel.set_period_data(1, Some(vec![row(0, 1.0)].into()), false).unwrap();
    wel.set_period_data(3, Some(vec![row(2, 2.0)].into()), false).unwrap();
    let slots = wel.get_data_array();
    assert_eq!(slots.len(), 4);
    assert!(slots[0].is_none());
    assert!(matches!(slots[1], Some(ListData::Rows(rows)) if rows.len() == 1));
    assert!(slots[2].is_none());
    assert!(slots[3].is_some());
    assert_eq!(wel.periods().collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn period_entries_and_removal() {
    let mut wel = setup(2);
    wel.set_period_data(1, Some(vec![row(2, -3.5)].into()), false).unwrap();
    assert_eq!(wel.get_file_entry(1).unwrap(), "  0 0 2  -3.5\n");
    assert_eq!(wel.get_file_entry(0).unwrap(), "");
    assert!(wel.remove_period(1).is_some());
    assert!(wel.remove_period(1).is_none());
}

#[test]
fn load_uses_the_block_period() {
    let mut wel = setup(3);
    let header = BlockHeader::parse("BEGIN PERIOD 3").unwrap();
    let mut lines = vec![String::from("  0 0 1  4.0"), String::from("END PERIOD 3")].into_iter();
    let result = wel.load("  0 0 0  2.0", &mut lines, &header, None).expect("loads");
    assert!(result.complete);
    assert_eq!(rows_of(&wel, 2), Some(vec![row(0, 2.0), row(1, 4.0)]));
    assert_eq!(wel.period(2).and_then(|p| p.current_key()), Some(2));

    // a failing block leaves the period as it was
    let mut lines = vec![String::from("END PERIOD 3")].into_iter();
    assert!(wel.load("  0 0 9  1.0", &mut lines, &header, None).is_err());
    assert_eq!(rows_of(&wel, 2).map(|r| r.len()), Some(2));
}

#[test]
fn records_by_key() {
    let mut wel = setup(2);
    wel.append_list_as_record(row(0, 1.0), 1).unwrap();
    wel.update_record(row(1, 2.0), 0, 1).unwrap();
    assert_eq!(rows_of(&wel, 1), Some(vec![row(0, 1.0), row(1, 2.0)]));
    assert!(wel.get_data(0).is_none());
}

#[test]
fn dense_views_across_periods() {
    let mut wel = setup(3);
    wel.set_data(
        [
            (0, Some(ListInput::from(vec![row(0, 1.0)]))),
            (2, Some(ListInput::from(vec![row(2, 3.0)]))),
        ],
        false,
    )
    .unwrap();
    assert!(wel.to_array(1, true).unwrap().is_none());
    let arrays = wel.masked_4d_arrays().unwrap().expect("data present");
    let q = &arrays["q"];
    assert_eq!(q.shape(), &[3, 1, 1, 3]);
    assert_eq!(q[[0, 0, 0, 0]], 1.0);
    assert!(q[[0, 0, 0, 1]].is_nan());
    assert!((0..3).all(|j| q[[1, 0, 0, j]].is_nan()));
    assert_eq!(q[[2, 0, 0, 2]], 3.0);

    let empty = setup(3);
    assert!(empty.masked_4d_arrays().unwrap().is_none());
}

#[test]
fn period_from_the_first_non_keyword_column() {
    let structure = DatasetStructure::new(
        "ats",
        "perioddata",
        vec![
            FieldDescriptor::keyword("period"),
            FieldDescriptor::integer("iperats"),
            FieldDescriptor::double("dt0"),
        ],
    );
    assert_eq!(structure.first_non_keyword_index(), Some(1));
    let context = ModelContext::new(Settings::default()).with_stress_periods(3);
    let mut ats = TransientDataList::new(Arc::new(structure), Arc::new(context));

    let row = vec![Value::from("PERIOD"), Value::Integer(2), Value::Double(0.5)];
    ats.set_data_unkeyed(ListInput::from(row.clone()), false).unwrap();
    assert_eq!(ats.get_data(2).and_then(|d| d.rows()).map(<[Row]>::to_vec), Some(vec![row]));

    // nothing to take the period from
    ats.set_data_unkeyed(ListInput::Constant { value: Value::Double(1.0), count: 1 }, false)
        .unwrap();
    assert!(ats.has_data(Some(0)));
    assert_eq!(ats.periods().collect::<Vec<_>>(), vec![2, 0]);
}
