use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use listdata::config::Settings;
use listdata::context::{ModelContext, PackageDimensions};
use listdata::datatype::{CellId, Row, Value};
use listdata::grid::StructuredGrid;
use listdata::list::DataList;
use listdata::structure::{DatasetStructure, FieldDescriptor};

fn well_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|n| {
            let (k, i, j) = ((n / 10000) as i64, ((n / 100) % 100) as i64, (n % 100) as i64);
            vec![
                Value::CellId(CellId::from([k, i, j])),
                Value::Double(-0.5 * n as f64),
                Value::Double(1.0),
                Value::Text(format!("well{}", n)),
            ]
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let structure = DatasetStructure::new(
        "wel",
        "stress_period_data",
        vec![
            FieldDescriptor::cellid("cellid"),
            FieldDescriptor::double("q"),
            FieldDescriptor::aux("aux"),
            FieldDescriptor::boundname("boundname"),
        ],
    );
    let context = ModelContext::new(Settings::default())
        .with_model("gwf", Arc::new(StructuredGrid::dis(10, 100, 100)))
        .with_package(PackageDimensions::new().with_aux(&["concentration"]).with_boundnames(true));
    let mut wel = DataList::new(Arc::new(structure), Arc::new(context));

    for count in [1_000usize, 100_000] {
        let rows = well_rows(count);
        c.bench_function(&format!("set_data {}", count), |b| {
            b.iter(|| wel.set_data(black_box(rows.clone()), false, true))
        });
        c.bench_function(&format!("get_file_entry {}", count), |b| b.iter(|| wel.get_file_entry(black_box(false))));
        let text = wel.get_file_entry(true).unwrap_or_default();
        c.bench_function(&format!("load {}", count), |b| {
            b.iter(|| {
                let mut lines = text.lines().map(str::to_string).chain(std::iter::once(String::from("END PERIOD")));
                let first = lines.next().unwrap_or_default();
                wel.load(&first, &mut lines, None, None)
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
