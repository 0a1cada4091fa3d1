use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use normopt::catalog::{IndexBuilder, TableBuilder, TableRef};
use normopt::datatypes::DataType;
use normopt::memo::{ExprId, Memo};
use normopt::meta::{ColumnId, Metadata, TableId};
use normopt::norm::Factory;
use normopt::operators::relational::ScanPrivate;
use normopt::operators::scalar::CmpOp;

fn table() -> TableRef {
    let table = TableBuilder::new("t")
        .add_not_null_column("a", DataType::Int)
        .add_column("b", DataType::Int)
        .add_column("c", DataType::Int)
        .add_column("d", DataType::String)
        .primary_key(&["a"])
        .add_index(IndexBuilder::new("t_b").add_column("b"))
        .add_row_count(1000)
        .build()
        .expect("Failed to build a table");
    Arc::new(table)
}

fn new_factory(table: &TableRef) -> (Factory, TableId) {
    let mut metadata = Metadata::new();
    let id = metadata.add_table(table.clone());
    (Factory::new(Memo::new(metadata)), id)
}

fn col(f: &Factory, table: TableId, ordinal: usize) -> ColumnId {
    f.metadata().table(table).column_id(ordinal)
}

fn cmp(f: &mut Factory, op: CmpOp, col: ColumnId, value: i64) -> ExprId {
    let var = f.construct_variable(col);
    let value = f.construct_int(value);
    f.construct_comparison(op, var, value)
}

// SELECT * FROM t WHERE (a = 1 AND b = 2) OR (a = 1 AND c = 3) AND b > 0 AND b < 10 AND (c, d) = (1, 'x')
fn build_select(f: &mut Factory, table: TableId) -> ExprId {
    let (a, b, c, d) = (col(f, table, 0), col(f, table, 1), col(f, table, 2), col(f, table, 3));
    let cols = f.metadata().table(table).readable_cols();
    let scan = f.construct_scan(ScanPrivate::new(table, cols));

    let a_eq = cmp(f, CmpOp::Eq, a, 1);
    let b_eq = cmp(f, CmpOp::Eq, b, 2);
    let c_eq = cmp(f, CmpOp::Eq, c, 3);
    let left = f.construct_and(a_eq, b_eq);
    let right = f.construct_and(a_eq, c_eq);
    let or = f.construct_or(left, right);

    let b_gt = cmp(f, CmpOp::Gt, b, 0);
    let b_lt = cmp(f, CmpOp::Lt, b, 10);

    let vc = f.construct_variable(c);
    let vd = f.construct_variable(d);
    let one = f.construct_int(1);
    let x = f.construct_const(normopt::operators::scalar::value::ScalarValue::String("x".to_string()));
    let left = f.construct_tuple(vec![vc, vd]);
    let right = f.construct_tuple(vec![one, x]);
    let tuple_eq = f.construct_eq(left, right);

    let filters = f.construct_filters(&[or, b_gt, b_lt, tuple_eq]);
    f.construct_select(scan, filters)
}

fn factory_bench(c: &mut Criterion) {
    let table = table();

    c.bench_function("normalize_select_filters", |b| {
        b.iter(|| {
            let (mut f, id) = new_factory(&table);
            black_box(build_select(&mut f, id));
        });
    });

    c.bench_function("normalize_select_filters_disabled", |b| {
        b.iter(|| {
            let (mut f, id) = new_factory(&table);
            f.disable_optimizations();
            black_box(build_select(&mut f, id));
        });
    });

    c.bench_function("reconstruct_normalized_select", |b| {
        let (mut f, id) = new_factory(&table);
        let select = build_select(&mut f, id);
        b.iter(|| black_box(f.reconstruct(select)));
    });
}

criterion_group!(benches, factory_bench);

criterion_main!(benches);
