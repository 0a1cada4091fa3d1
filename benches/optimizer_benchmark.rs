use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use normopt::catalog::mutable::MutableCatalog;
use normopt::catalog::{CatalogRef, DataSourceName, IndexBuilder, TableBuilder, DEFAULT_SCHEMA};
use normopt::datatypes::DataType;
use normopt::memo::ExprId;
use normopt::meta::{ColumnId, TableId};
use normopt::operators::relational::ScanPrivate;
use normopt::operators::scalar::CmpOp;
use normopt::optimizer::{Optimizer, OptimizerOptions};
use normopt::properties::physical::PhysicalProps;
use normopt::properties::OrderingChoice;

fn catalog() -> CatalogRef {
    let catalog = MutableCatalog::new();
    let tables = [("a", 1000), ("b", 100), ("c", 10)];
    for (name, rows) in tables {
        let table = TableBuilder::new(name)
            .add_not_null_column(&format!("{}1", name), DataType::Int)
            .add_column(&format!("{}2", name), DataType::Int)
            .add_column(&format!("{}3", name), DataType::String)
            .primary_key(&[&format!("{}1", name)])
            .add_index(IndexBuilder::new(&format!("{}_{}2", name, name)).add_column(&format!("{}2", name)))
            .add_row_count(rows)
            .build()
            .expect("Failed to build a table");
        catalog.add_table(DEFAULT_SCHEMA, table).expect("Failed to add a table");
    }
    Arc::new(catalog)
}

fn scan(optimizer: &mut Optimizer, name: &str) -> (ExprId, TableId) {
    let table = optimizer.resolve_table(&DataSourceName::new(name)).expect("Failed to resolve a table");
    let cols = optimizer.metadata().table(table).readable_cols();
    (optimizer.factory().construct_scan(ScanPrivate::new(table, cols)), table)
}

fn col(optimizer: &Optimizer, table: TableId, ordinal: usize) -> ColumnId {
    optimizer.metadata().table(table).column_id(ordinal)
}

// SELECT * FROM a JOIN b ON a1 = b2 JOIN c ON b1 = c1 WHERE a2 > 10 ORDER BY a1
fn build_query(optimizer: &mut Optimizer) -> (ExprId, PhysicalProps) {
    let (a, ta) = scan(optimizer, "a");
    let (b, tb) = scan(optimizer, "b");
    let (c, tc) = scan(optimizer, "c");
    let (a1, a2) = (col(optimizer, ta, 0), col(optimizer, ta, 1));
    let (b1, b2) = (col(optimizer, tb, 0), col(optimizer, tb, 1));
    let c1 = col(optimizer, tc, 0);

    let f = optimizer.factory();
    let eq = |f: &mut normopt::norm::Factory, l: ColumnId, r: ColumnId| {
        let l = f.construct_variable(l);
        let r = f.construct_variable(r);
        f.construct_eq(l, r)
    };
    let ab = eq(f, a1, b2);
    let bc = eq(f, b1, c1);
    let on = f.construct_filters(&[ab]);
    let join = f.construct_inner_join(a, b, on);
    let on = f.construct_filters(&[bc]);
    let join = f.construct_inner_join(join, c, on);

    let var = f.construct_variable(a2);
    let ten = f.construct_int(10);
    let gt = f.construct_comparison(CmpOp::Gt, var, ten);
    let filters = f.construct_filters(&[gt]);
    let select = f.construct_select(join, filters);
    (select, PhysicalProps::with_ordering(OrderingChoice::asc(&[a1])))
}

fn optimizer_bench(c: &mut Criterion) {
    let catalog = catalog();
    let mut optimizer = Optimizer::new(catalog, OptimizerOptions::default().with_check_expressions(false));

    c.bench_function("optimize_query_join_abc_ordered", |b| {
        b.iter(|| {
            optimizer.init();
            let (root, required) = build_query(&mut optimizer);
            optimizer.set_root(root, required);
            let plan = optimizer.optimize().expect("Failed to optimize a query");
            black_box(plan);
        });
    });

    c.bench_function("normalize_query_join_abc", |b| {
        b.iter(|| {
            optimizer.init();
            let (root, _) = build_query(&mut optimizer);
            black_box(root);
        });
    });
}

criterion_group!(benches, optimizer_bench);

criterion_main!(benches);
