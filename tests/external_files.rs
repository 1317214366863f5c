use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use listdata::config::Settings;
use listdata::context::ModelContext;
use listdata::datatype::{CellId, Row, Value};
use listdata::grid::StructuredGrid;
use listdata::list::{DataList, ExternalContent, ExternalSpec, ListInput};
use listdata::storage::{ListData, StorageBacking};
use listdata::structure::{DatasetStructure, FieldDescriptor};
use listdata::transient::TransientDataList;
use listdata::ListError;

fn cell(k: i64, i: i64, j: i64) -> Value {
    Value::CellId(CellId::from([k, i, j]))
}

fn context(dir: &TempDir, stress_periods: usize) -> Arc<ModelContext> {
    let settings = Settings {
        model_ws: dir.path().to_path_buf(),
        ..Settings::default()
    };
    Arc::new(
        ModelContext::new(settings)
            .with_model("gwf", Arc::new(StructuredGrid::dis(1, 2, 2)))
            .with_stress_periods(stress_periods),
    )
}

fn structure() -> Arc<DatasetStructure> {
    Arc::new(DatasetStructure::new(
        "riv",
        "stress_period_data",
        vec![
            FieldDescriptor::cellid("cellid"),
            FieldDescriptor::double("stage"),
            FieldDescriptor::double("cond"),
        ],
    ))
}

fn rows() -> Vec<Row> {
    vec![
        vec![cell(0, 0, 0), Value::Double(10.5), Value::Double(100.0)],
        vec![cell(0, 1, 1), Value::Double(9.25), Value::Double(50.0)],
    ]
}

#[test]
fn text_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    riv.set_data(rows(), false, true).unwrap();
    riv.set_comment(0, "# upstream reach");
    riv.store_as_external_file("riv.txt", false, true, true).expect("stored");

    assert!(matches!(riv.get_data(), Some(ListData::External(_))));
    let written = fs::read_to_string(dir.path().join("riv.txt")).unwrap();
    assert_eq!(written, "  0 0 0  10.5  100.0\n  0 1 1  9.25  50.0\n");
    assert_eq!(riv.get_file_entry(false).unwrap(), "    OPEN/CLOSE  riv.txt\n");
    assert_eq!(riv.read_external().unwrap(), Some(rows()));
    // comments stay with the container
    assert!(riv.storage().and_then(|s| s.comment(0)).is_some());
}

#[test]
fn keeping_an_existing_file_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    riv.set_data(rows(), false, true).unwrap();
    riv.store_as_external_file("first.txt", false, false, true).unwrap();
    let before = riv.storage().unwrap().backing().clone();
    riv.store_as_external_file("second.txt", false, false, true).unwrap();
    assert_eq!(riv.storage().unwrap().backing(), &before);
    assert!(!dir.path().join("second.txt").exists());

    // replacing moves the data on
    riv.store_as_external_file("second.txt", false, true, true).unwrap();
    let first = fs::read_to_string(dir.path().join("first.txt")).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("second.txt")).unwrap(), first);
}

#[test]
fn binary_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    riv.set_data(rows(), false, true).unwrap();
    riv.store_as_external_file("data/riv.bin", true, true, true).unwrap();
    let bytes = fs::read(dir.path().join("data/riv.bin")).unwrap();
    // three i32 cellid components and two f64 per record
    assert_eq!(bytes.len(), 2 * (3 * 4 + 2 * 8));
    assert_eq!(riv.get_file_entry(false).unwrap(), "    OPEN/CLOSE  data/riv.bin  (BINARY)\n");
    assert_eq!(riv.read_external().unwrap(), Some(rows()));
}

#[test]
fn invalid_data_writes_no_file() {
    let dir = TempDir::new().unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    let spec = ExternalSpec::new("bad.txt").with_data(vec![vec![cell(3, 0, 0), Value::Double(1.0), Value::Double(1.0)]]);
    assert!(riv.set_data(spec, false, true).is_err());
    assert!(!dir.path().join("bad.txt").exists());
    assert!(riv.get_data().is_none());
}

#[test]
fn pointing_at_an_existing_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("given.txt"), "# from elsewhere\n  0 1 0  3.0  1.0\n").unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    riv.set_data(ListInput::External(ExternalSpec::new("given.txt").with_factor(2.0)), false, true)
        .unwrap();
    assert!(riv.has_data());
    assert_eq!(riv.get_file_entry(false).unwrap(), "    OPEN/CLOSE  given.txt  FACTOR  2.0\n");
    let rows = riv.read_external().unwrap().unwrap();
    assert_eq!(rows, vec![vec![cell(0, 1, 0), Value::Double(3.0), Value::Double(1.0)]]);
}

#[test]
fn child_package_data_stays_inline() {
    let dir = TempDir::new().unwrap();
    let structure = DatasetStructure::new(
        "gwf",
        "perioddata",
        vec![FieldDescriptor::cellid("cellid"), FieldDescriptor::double("rate")],
    )
    .constructing("obs");
    let mut obs = DataList::new(Arc::new(structure), context(&dir, 1));
    obs.set_data(vec![vec![cell(0, 0, 0), Value::Double(1.0)]], false, true).unwrap();
    obs.store_as_external_file("obs.txt", false, true, true).unwrap();
    assert!(matches!(obs.get_data(), Some(ListData::Rows(_))));
}

#[test]
fn constants_move_to_a_constant_file() {
    let dir = TempDir::new().unwrap();
    let mut riv = DataList::new(structure(), context(&dir, 1));
    riv.set_data(ListInput::Constant { value: Value::Double(1.0), count: 4 }, false, true)
        .unwrap();
    riv.store_as_external_file("riv.txt", true, true, true).unwrap();
    // a constant is always written as text
    assert!(matches!(riv.storage().unwrap().backing(), StorageBacking::ExternalFile(file) if !file.binary()));
    assert_eq!(fs::read_to_string(dir.path().join("riv.txt")).unwrap(), "CONSTANT  1.0\n");
    assert_eq!(riv.get_file_entry(false).unwrap(), "    OPEN/CLOSE  riv.txt\n");
    assert_eq!(riv.read_external_content().unwrap(), Some(ExternalContent::Constant(Value::Double(1.0))));
    assert!(matches!(riv.read_external(), Err(ListError::Storage { .. })));
    assert!(riv.to_array(false).unwrap().is_none());

    riv.store_as_external_file("moved.txt", false, true, true).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("moved.txt")).unwrap(), "CONSTANT  1.0\n");
}

#[test]
fn one_file_per_period() {
    let dir = TempDir::new().unwrap();
    let mut riv = TransientDataList::new(structure(), context(&dir, 3));
    riv.set_data(
        [
            (0, Some(ListInput::from(rows()))),
            (2, Some(ListInput::from(vec![rows()[1].clone()]))),
        ],
        false,
    )
    .unwrap();
    riv.add_period(1);
    riv.store_as_external_file("riv.txt", false, true, true).unwrap();
    assert!(dir.path().join("riv_1.txt").exists());
    assert!(!dir.path().join("riv_2.txt").exists());
    assert!(dir.path().join("riv_3.txt").exists());
    assert!(matches!(riv.get_data(1), Some(ListData::Rows(rows)) if rows.is_empty()));
    assert_eq!(riv.get_file_entry(2).unwrap(), "    OPEN/CLOSE  riv_3.txt\n");
}

#[test]
fn binary_offsets_that_overflow_write_nothing() {
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        model_ws: dir.path().to_path_buf(),
        cellid_offset: i64::MAX,
        ..Settings::default()
    };
    let context = ModelContext::new(settings).with_model("gwf", Arc::new(StructuredGrid::dis(1, 2, 2)));
    let mut riv = DataList::new(structure(), Arc::new(context));
    riv.set_data(rows(), false, true).unwrap();
    let error = riv.store_as_external_file("riv.bin", true, true, true).unwrap_err();
    assert!(matches!(error, ListError::Storage { .. }));
    assert!(!dir.path().join("riv.bin").exists());
    assert!(matches!(riv.get_data(), Some(ListData::Rows(_))));
}
