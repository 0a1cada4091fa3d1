//! Test harness for the optimizer: a catalog described in YAML and an [OptimizerTester]
//! that builds queries through the factory and compares selected plans with expected ones.

use std::sync::{Arc, Once};

use serde::Deserialize;

use crate::catalog::mutable::MutableCatalog;
use crate::catalog::{CatalogRef, DataSourceName, IndexBuilder, TableBuilder, DEFAULT_SCHEMA};
use crate::datatypes::DataType;
use crate::error::OptimizerError;
use crate::memo::ExprId;
use crate::meta::{ColumnId, TableId};
use crate::norm::Factory;
use crate::operators::format::{format_expr, format_plan};
use crate::operators::relational::ScanPrivate;
use crate::operators::scalar::CmpOp;
use crate::optimizer::{Optimizer, OptimizerOptions, PlanExpr};
use crate::properties::physical::PhysicalProps;

static INIT_LOG: Once = Once::new();

/// The catalog used by [OptimizerTester::new].
pub const DEFAULT_CATALOG: &str = r#"
tables:
  - name: a
    row_count: 1000
    columns:
      - { name: a1, type: int, not_null: true }
      - { name: a2, type: int }
      - { name: a3, type: string }
    primary_key: [a1]
    indexes:
      - { name: a_a2, columns: [a2] }
    statistics:
      - { column: a2, distinct_count: 100, null_count: 10 }
  - name: b
    row_count: 100
    columns:
      - { name: b1, type: int, not_null: true }
      - { name: b2, type: int }
      - { name: b3, type: string }
    primary_key: [b1]
    indexes:
      - { name: b_b2, columns: [b2], storing: [b3] }
  - name: c
    row_count: 10
    columns:
      - { name: c1, type: int, not_null: true }
      - { name: c2, type: bool }
    primary_key: [c1]
"#;

#[derive(Debug, Deserialize)]
struct CatalogFixture {
    tables: Vec<TableFixture>,
}

#[derive(Debug, Deserialize)]
struct TableFixture {
    name: String,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    row_count: Option<u64>,
    columns: Vec<ColumnFixture>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    indexes: Vec<IndexFixture>,
    #[serde(default)]
    statistics: Vec<ColumnStatisticsFixture>,
}

#[derive(Debug, Deserialize)]
struct ColumnFixture {
    name: String,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    not_null: bool,
}

#[derive(Debug, Deserialize)]
struct IndexFixture {
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    storing: Vec<String>,
    #[serde(default)]
    unique: bool,
}

#[derive(Debug, Deserialize)]
struct ColumnStatisticsFixture {
    column: String,
    distinct_count: u64,
    #[serde(default)]
    null_count: u64,
}

fn parse_data_type(name: &str) -> Result<DataType, OptimizerError> {
    let data_type = match name.to_lowercase().as_str() {
        "bool" | "boolean" => DataType::Bool,
        "int" | "integer" | "bigint" => DataType::Int,
        "float" | "double" => DataType::Float,
        "string" | "text" | "varchar" => DataType::String,
        "date" => DataType::Date,
        "timestamp" => DataType::Timestamp,
        "timestamptz" => DataType::TimestampTz,
        _ => return Err(OptimizerError::argument(format!("Unexpected column type: {}", name))),
    };
    Ok(data_type)
}

/// Builds a catalog from its YAML description.
pub fn load_catalog(yaml: &str) -> Result<MutableCatalog, OptimizerError> {
    let fixture: CatalogFixture = serde_yaml::from_str(yaml)
        .map_err(|e| OptimizerError::argument(format!("Invalid catalog description: {}", e)))?;

    let catalog = MutableCatalog::new();
    for table in fixture.tables {
        let mut builder = TableBuilder::new(&table.name);
        for column in table.columns.iter() {
            let data_type = parse_data_type(&column.data_type)?;
            builder = if column.not_null {
                builder.add_not_null_column(&column.name, data_type)
            } else {
                builder.add_column(&column.name, data_type)
            };
        }
        if !table.primary_key.is_empty() {
            let key: Vec<&str> = table.primary_key.iter().map(|c| c.as_str()).collect();
            builder = builder.primary_key(&key);
        }
        for index in table.indexes.iter() {
            let mut index_builder = IndexBuilder::new(&index.name);
            for column in index.columns.iter() {
                index_builder = index_builder.add_column(column);
            }
            for column in index.storing.iter() {
                index_builder = index_builder.storing(column);
            }
            if index.unique {
                index_builder = index_builder.unique();
            }
            builder = builder.add_index(index_builder);
        }
        if let Some(row_count) = table.row_count {
            builder = builder.add_row_count(row_count);
        }
        for stats in table.statistics.iter() {
            builder = builder.add_column_statistics(&stats.column, stats.distinct_count, stats.null_count);
        }
        let schema = table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
        catalog.add_table(schema, builder.build()?)?;
    }
    Ok(catalog)
}

/// Initializes the logger once per test binary. Use `RUST_LOG` to enable output.
pub fn init_logging() {
    INIT_LOG.call_once(pretty_env_logger::init);
}

/// Builds queries against a catalog and checks plans selected by the optimizer.
pub struct OptimizerTester {
    pub catalog: Arc<MutableCatalog>,
    pub optimizer: Optimizer,
}

impl OptimizerTester {
    /// A tester that uses [DEFAULT_CATALOG] with expression checks enabled.
    pub fn new() -> Self {
        Self::with_options(OptimizerOptions::default().with_check_expressions(true))
    }

    pub fn with_options(options: OptimizerOptions) -> Self {
        Self::with_catalog(DEFAULT_CATALOG, options)
    }

    pub fn with_catalog(yaml: &str, options: OptimizerOptions) -> Self {
        init_logging();

        let catalog = Arc::new(load_catalog(yaml).unwrap());
        let catalog_ref: CatalogRef = catalog.clone();
        OptimizerTester {
            catalog,
            optimizer: Optimizer::new(catalog_ref, options),
        }
    }

    pub fn f(&mut self) -> &mut Factory {
        self.optimizer.factory()
    }

    /// Resolves the table with the given name.
    pub fn table(&mut self, name: &str) -> TableId {
        self.optimizer.resolve_table(&DataSourceName::new(name)).unwrap()
    }

    /// The column of the given table.
    pub fn col(&self, table: TableId, name: &str) -> ColumnId {
        let table = self.optimizer.metadata().table(table);
        let ordinal = table
            .table()
            .column_ordinal(name)
            .unwrap_or_else(|| panic!("No column {} in table {}", name, table.table().name()));
        table.column_id(ordinal)
    }

    /// Resolves the table and builds a scan of all its columns.
    pub fn scan(&mut self, name: &str) -> (ExprId, TableId) {
        let table = self.table(name);
        let cols = self.optimizer.metadata().table(table).readable_cols();
        let scan = self.f().construct_scan(ScanPrivate::new(table, cols));
        (scan, table)
    }

    pub fn var(&mut self, col: ColumnId) -> ExprId {
        self.f().construct_variable(col)
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.f().construct_int(value)
    }

    /// Builds `col <op> value`.
    pub fn cmp(&mut self, op: CmpOp, col: ColumnId, value: i64) -> ExprId {
        let var = self.var(col);
        let value = self.int(value);
        self.f().construct_comparison(op, var, value)
    }

    /// Builds `col = value`.
    pub fn eq(&mut self, col: ColumnId, value: i64) -> ExprId {
        self.cmp(CmpOp::Eq, col, value)
    }

    /// Builds `left = right`.
    pub fn cols_eq(&mut self, left: ColumnId, right: ColumnId) -> ExprId {
        let left = self.var(left);
        let right = self.var(right);
        self.f().construct_eq(left, right)
    }

    pub fn select(&mut self, input: ExprId, conditions: &[ExprId]) -> ExprId {
        let filters = self.f().construct_filters(conditions);
        self.f().construct_select(input, filters)
    }

    pub fn inner_join(&mut self, left: ExprId, right: ExprId, conditions: &[ExprId]) -> ExprId {
        let on = self.f().construct_filters(conditions);
        self.f().construct_inner_join(left, right, on)
    }

    pub fn format(&self, id: ExprId) -> String {
        format_expr(self.optimizer.memo(), id)
    }

    /// Compares the normalized form of the given expression with the expected one.
    pub fn expect_expr(&self, id: ExprId, expected: &str) {
        let actual = self.format(id);
        assert_eq!(actual.trim(), expected.trim(), "Unexpected expression:\n{}", actual);
    }

    /// Sets the root and runs the optimizer.
    pub fn optimize(&mut self, root: ExprId, required: PhysicalProps) -> PlanExpr {
        self.optimizer.set_root(root, required);
        self.optimizer.optimize().unwrap()
    }

    pub fn format_plan(&self, plan: &PlanExpr) -> String {
        format_plan(self.optimizer.memo(), plan)
    }

    /// Optimizes the given expression and compares the selected plan with the expected one.
    /// The first line of `expected` can be a `query: ...` line that describes the query.
    pub fn expect_plan(&mut self, root: ExprId, required: PhysicalProps, expected: &str) {
        let plan = self.optimize(root, required);
        let actual = self.format_plan(&plan);

        let mut lines: Vec<&str> = expected.lines().map(|l| l.trim_end()).skip_while(|l| l.is_empty()).collect();
        while lines.last().map(|l| l.is_empty()).unwrap_or(false) {
            lines.pop();
        }
        let query = match lines.first().map(|l| l.trim_start()) {
            Some(first) if first.starts_with("query:") => {
                let query = first["query:".len()..].trim().to_string();
                lines.remove(0);
                query
            }
            _ => "query".to_string(),
        };
        let expected_lines = strip_indent(&lines);
        let actual_lines: Vec<_> = actual.lines().map(|l| l.trim_end()).collect();
        assert_eq!(actual_lines, expected_lines, "{} does not match. Actual plan:\n{}", query, actual);
    }
}

/// Removes the common leading indentation of the given lines.
fn strip_indent<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines.iter().map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() }).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_load_catalog() {
        let catalog = load_catalog(DEFAULT_CATALOG).unwrap();
        let (table, _) = catalog.resolve_data_source(&DataSourceName::new("b")).unwrap();
        assert_eq!(table.name(), "b");
        assert_eq!(table.index(1).name(), "b_b2");
        assert_eq!(table.statistics().map(|s| s.row_count()), Some(100));
    }

    #[test]
    fn test_load_catalog_rejects_unknown_types() {
        let yaml = r#"
tables:
  - name: t
    columns:
      - { name: x, type: geometry }
"#;
        let err = load_catalog(yaml).unwrap_err();
        assert!(err.to_string().contains("geometry"), "{}", err);
    }
}
