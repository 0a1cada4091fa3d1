//! Database catalog.
//!
//! The optimizer consults the catalog through the [Catalog] trait. All objects returned by a catalog
//! are immutable, so the optimizer is free to hold on to them for the duration of an optimization run.

use std::any::Any;
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use crate::datatypes::DataType;
use crate::error::OptimizerError;

pub mod mutable;

pub type CatalogRef = Arc<dyn Catalog>;
pub type SchemaRef = Arc<dyn Schema>;
pub type TableRef = Arc<Table>;
pub type ColumnRef = Arc<Column>;

/// The name of default schema.
pub const DEFAULT_SCHEMA: &str = "default";

/// The name of the hidden column added to tables without an explicit primary key.
pub const ROWID_COLUMN: &str = "rowid";

/// Provides access to database objects used by the optimizer.
pub trait Catalog: Debug + Sync + Send {
    /// Returns this catalog as [`Any`](std::any::Any) in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// The version of this catalog. The version changes every time a database object is added or removed.
    fn version(&self) -> u64;

    /// Returns schemas available in the catalog.
    fn get_schemas(&self) -> Vec<SchemaRef>;

    /// Returns a schema with the given name.
    fn resolve_schema(&self, name: &str) -> Result<SchemaRef, OptimizerError>;

    /// Returns a table with the given name and a fully qualified name of that table.
    /// If the schema is not specified the table is searched in the [default schema](DEFAULT_SCHEMA).
    fn resolve_data_source(&self, name: &DataSourceName) -> Result<(TableRef, DataSourceName), OptimizerError>;

    /// Returns a table with the given identifier.
    fn resolve_data_source_by_id(&self, id: StableId) -> Result<TableRef, OptimizerError>;

    /// Checks whether the current user has the given privilege on the given table.
    fn check_privilege(&self, table: &Table, privilege: Privilege) -> Result<(), OptimizerError>;
}

/// Represents a database schema.
pub trait Schema: Debug + Sync + Send {
    /// Returns this schema as [`Any`](std::any::Any) in order it can be downcast to its implementation.
    fn as_any(&self) -> &dyn Any;

    /// The name of this schema.
    fn name(&self) -> &str;

    /// Returns tables registered in this schema.
    fn get_tables(&self) -> Vec<TableRef>;

    /// Returns a table with the given name.
    fn get_table_by_name(&self, name: &str) -> Option<TableRef>;
}

/// A stable identifier of a catalog object. Unlike names identifiers never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId(pub u64);

impl Display for StableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A possibly qualified name of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSourceName {
    pub schema: Option<String>,
    pub name: String,
}

impl DataSourceName {
    /// Creates an unqualified name.
    pub fn new(name: &str) -> Self {
        DataSourceName {
            schema: None,
            name: name.to_string(),
        }
    }

    /// Creates a name qualified with the given schema.
    pub fn qualified(schema: &str, name: &str) -> Self {
        DataSourceName {
            schema: Some(schema.to_string()),
            name: name.to_string(),
        }
    }

    /// The schema part of the name or the [default schema](DEFAULT_SCHEMA).
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }
}

impl Display for DataSourceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.schema.as_ref() {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Privileges checked by [Catalog::check_privilege].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    Select,
    Insert,
    Update,
    Delete,
}

impl Display for Privilege {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Privilege::Select => write!(f, "SELECT"),
            Privilege::Insert => write!(f, "INSERT"),
            Privilege::Update => write!(f, "UPDATE"),
            Privilege::Delete => write!(f, "DELETE"),
        }
    }
}

/// Represents a database table.
///
/// Index `0` is always the primary index.
#[derive(Debug, Clone)]
pub struct Table {
    id: StableId,
    name: String,
    columns: Vec<ColumnRef>,
    indexes: Vec<Index>,
    statistics: Option<TableStatistics>,
}

impl Table {
    /// The identifier of this table.
    pub fn id(&self) -> StableId {
        self.id
    }

    /// The name of this table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of columns of this table. Includes hidden columns and columns that are being added or dropped.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given ordinal position.
    pub fn column(&self, ordinal: usize) -> &Column {
        &self.columns[ordinal]
    }

    /// The columns of this table.
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    /// Returns the ordinal of a column with the given name.
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The number of indexes of this table (including the primary index).
    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }

    /// Returns the index at the given ordinal position. The primary index has ordinal `0`.
    pub fn index(&self, ordinal: usize) -> &Index {
        &self.indexes[ordinal]
    }

    /// The indexes of this table.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Returns statistics available for this table.
    pub fn statistics(&self) -> Option<&TableStatistics> {
        self.statistics.as_ref()
    }
}

/// Statistics for a database table.
#[derive(Debug, Clone)]
pub struct TableStatistics {
    row_count: u64,
    columns: Vec<ColumnStatistics>,
}

impl TableStatistics {
    /// Creates a new table statistics object.
    pub fn new(row_count: u64) -> Self {
        TableStatistics {
            row_count,
            columns: Vec::new(),
        }
    }

    /// The total number of rows in a table.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Returns statistics for the column with the given ordinal.
    pub fn column(&self, ordinal: usize) -> Option<&ColumnStatistics> {
        self.columns.iter().find(|c| c.ordinal == ordinal)
    }
}

/// Statistics for a single column.
#[derive(Debug, Clone)]
pub struct ColumnStatistics {
    ordinal: usize,
    distinct_count: u64,
    null_count: u64,
}

impl ColumnStatistics {
    /// The ordinal of the column.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The number of distinct values.
    pub fn distinct_count(&self) -> u64 {
        self.distinct_count
    }

    /// The number of NULLs.
    pub fn null_count(&self) -> u64 {
        self.null_count
    }
}

/// A builder to create instances of a [table].
///
/// [table]: crate::catalog::Table
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    indexes: Vec<IndexBuilder>,
    statistics: Option<TableStatistics>,
}

impl TableBuilder {
    /// Creates a builder for a table the given name.
    pub fn new(name: &str) -> Self {
        TableBuilder {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            statistics: None,
        }
    }

    /// Adds a nullable column with the given name and data type to this table.
    pub fn add_column(self, name: &str, data_type: DataType) -> TableBuilder {
        self.add_column_with(Column::new(name, data_type))
    }

    /// Adds a not null column with the given name and data type to this table.
    pub fn add_not_null_column(self, name: &str, data_type: DataType) -> TableBuilder {
        self.add_column_with(Column::new(name, data_type).not_null())
    }

    /// Adds the given column.
    pub fn add_column_with(mut self, column: Column) -> TableBuilder {
        self.columns.push(column);
        self
    }

    /// Sets the primary key of this table. Primary key columns are not nullable.
    pub fn primary_key(mut self, columns: &[&str]) -> TableBuilder {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Adds a secondary index.
    pub fn add_index(mut self, index: IndexBuilder) -> TableBuilder {
        self.indexes.push(index);
        self
    }

    /// Sets row count statistics for this table.
    pub fn add_row_count(mut self, row_count: u64) -> TableBuilder {
        match self.statistics.as_mut() {
            Some(statistics) => statistics.row_count = row_count,
            None => self.statistics = Some(TableStatistics::new(row_count)),
        }
        self
    }

    /// Sets the number of distinct values and NULLs for the given column.
    pub fn add_column_statistics(mut self, column: &str, distinct_count: u64, null_count: u64) -> TableBuilder {
        let ordinal = self.columns.iter().position(|c| c.name == column);
        let statistics = self.statistics.get_or_insert_with(|| TableStatistics::new(0));
        if let Some(ordinal) = ordinal {
            statistics.columns.retain(|c| c.ordinal != ordinal);
            statistics.columns.push(ColumnStatistics {
                ordinal,
                distinct_count,
                null_count,
            });
        }
        self
    }

    /// Creates an instance of a [table] with previously specified properties.
    /// If no primary key has been specified, adds a hidden `rowid` column and uses it as the primary key.
    ///
    /// [table]: crate::catalog::Table
    pub fn build(mut self) -> Result<Table, OptimizerError> {
        if self.columns.is_empty() {
            return Err(OptimizerError::argument("No columns has been specified"));
        }

        let mut names = HashSet::new();
        for col in self.columns.iter() {
            if !names.insert(col.name.clone()) {
                let message = format!("Column already exists. Column: {} table: {}", col.name, self.name);
                return Err(OptimizerError::argument(message));
            }
        }

        if self.primary_key.is_empty() {
            if names.contains(ROWID_COLUMN) {
                let message = format!("Table {} has a column named {} but no primary key", self.name, ROWID_COLUMN);
                return Err(OptimizerError::argument(message));
            }
            self.columns.push(Column::new(ROWID_COLUMN, DataType::Int).not_null().hidden());
            self.primary_key.push(ROWID_COLUMN.to_string());
        }

        let mut pk_ordinals = Vec::with_capacity(self.primary_key.len());
        for name in self.primary_key.iter() {
            match self.columns.iter().position(|c| &c.name == name) {
                Some(ordinal) => {
                    self.columns[ordinal].nullable = false;
                    pk_ordinals.push(ordinal);
                }
                None => {
                    let message = format!("Primary key column does not exist. Table: {}, column: {}", self.name, name);
                    return Err(OptimizerError::argument(message));
                }
            }
        }

        let primary = Index {
            id: StableId(1),
            name: "primary".to_string(),
            unique: true,
            inverted: false,
            key_column_count: pk_ordinals.len(),
            lax_key_column_count: pk_ordinals.len(),
            columns: pk_ordinals
                .iter()
                .map(|ordinal| IndexColumn {
                    ordinal: *ordinal,
                    descending: false,
                })
                .collect(),
            storing: (0..self.columns.len()).filter(|o| !pk_ordinals.contains(o)).collect(),
            foreign_key: None,
            predicate: None,
        };

        let mut indexes = vec![primary];
        let mut index_names = HashSet::new();
        for (i, builder) in std::mem::take(&mut self.indexes).into_iter().enumerate() {
            if !index_names.insert(builder.name.clone()) {
                let message = format!("Index already exists. Index: {} table: {}", builder.name, self.name);
                return Err(OptimizerError::argument(message));
            }
            let index = builder.build(StableId(i as u64 + 2), &self.name, &self.columns, &pk_ordinals)?;
            indexes.push(index);
        }

        Ok(Table {
            id: StableId(0),
            name: self.name,
            columns: self.columns.into_iter().map(Arc::new).collect(),
            indexes,
            statistics: self.statistics,
        })
    }
}

/// A column of a database table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    nullable: bool,
    hidden: bool,
    computed: Option<String>,
    mutation: bool,
}

impl Column {
    /// Creates a nullable column.
    pub fn new(name: &str, data_type: DataType) -> Self {
        Column {
            name: name.to_string(),
            data_type,
            nullable: true,
            hidden: false,
            computed: None,
            mutation: false,
        }
    }

    /// Marks this column as not nullable.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks this column as hidden. Hidden columns are not returned by `SELECT *`.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Marks this column as computed from the given expression.
    pub fn computed(mut self, expr: &str) -> Self {
        self.computed = Some(expr.to_string());
        self
    }

    /// Marks this column as a mutation column: a column that is being added or dropped by a schema change.
    /// Mutation columns can be written but never read.
    pub fn mutation(mut self) -> Self {
        self.mutation = true;
        self
    }

    /// The name of this column.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The data type of this column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// The expression of a computed column.
    pub fn computed_expr(&self) -> Option<&str> {
        self.computed.as_deref()
    }

    pub fn is_mutation(&self) -> bool {
        self.mutation
    }
}

/// Represents a database index.
///
/// Index columns consist of the key columns followed by the primary key columns that are not part of the key
/// (implicit key columns). Columns stored in the index but not part of its key are listed separately.
#[derive(Debug, Clone)]
pub struct Index {
    id: StableId,
    name: String,
    unique: bool,
    inverted: bool,
    columns: Vec<IndexColumn>,
    key_column_count: usize,
    lax_key_column_count: usize,
    storing: Vec<usize>,
    foreign_key: Option<ForeignKeyReference>,
    predicate: Option<String>,
}

impl Index {
    /// The identifier of this index. Unique within a table.
    pub fn id(&self) -> StableId {
        self.id
    }

    /// The name of this index.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// The number of columns of this index including stored columns.
    pub fn column_count(&self) -> usize {
        self.columns.len() + self.storing.len()
    }

    /// The number of columns that form a strict key of this index. NULLs are treated as equal.
    pub fn key_column_count(&self) -> usize {
        self.key_column_count
    }

    /// The number of columns that form a lax key of this index. NULLs are treated as not equal.
    pub fn lax_key_column_count(&self) -> usize {
        self.lax_key_column_count
    }

    /// Returns the index column at the given position. Stored columns follow key columns and are always ascending.
    pub fn column(&self, i: usize) -> IndexColumn {
        if i < self.columns.len() {
            self.columns[i].clone()
        } else {
            IndexColumn {
                ordinal: self.storing[i - self.columns.len()],
                descending: false,
            }
        }
    }

    /// The foreign key reference of this index if there is one.
    pub fn foreign_key(&self) -> Option<&ForeignKeyReference> {
        self.foreign_key.as_ref()
    }

    /// The predicate of a partial index.
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }
}

/// A column of an [Index].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// The ordinal of the table column.
    pub ordinal: usize,
    pub descending: bool,
}

/// A foreign key from the columns of an index to an index of another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyReference {
    /// The referenced table.
    pub table: StableId,
    /// The referenced index.
    pub index: StableId,
    /// The number of leading index columns that form the foreign key.
    pub prefix_len: usize,
}

/// A builder to create instances of an [Index]. Indexes are built as a part of a [table](TableBuilder).
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    name: String,
    columns: Vec<(String, bool)>,
    storing: Vec<String>,
    unique: bool,
    inverted: bool,
    foreign_key: Option<ForeignKeyReference>,
    predicate: Option<String>,
}

impl IndexBuilder {
    /// Creates a builder for an index with the given name.
    pub fn new(name: &str) -> Self {
        IndexBuilder {
            name: name.to_string(),
            columns: Vec::new(),
            storing: Vec::new(),
            unique: false,
            inverted: false,
            foreign_key: None,
            predicate: None,
        }
    }

    /// Adds an ascending key column.
    pub fn add_column(self, column: &str) -> IndexBuilder {
        self.add(column, false)
    }

    /// Adds a descending key column.
    pub fn add_desc_column(self, column: &str) -> IndexBuilder {
        self.add(column, true)
    }

    fn add(mut self, column: &str, descending: bool) -> IndexBuilder {
        self.columns.push((column.into(), descending));
        self
    }

    /// Adds a column stored in the index.
    pub fn storing(mut self, column: &str) -> IndexBuilder {
        self.storing.push(column.into());
        self
    }

    pub fn unique(mut self) -> IndexBuilder {
        self.unique = true;
        self
    }

    pub fn inverted(mut self) -> IndexBuilder {
        self.inverted = true;
        self
    }

    pub fn foreign_key(mut self, reference: ForeignKeyReference) -> IndexBuilder {
        self.foreign_key = Some(reference);
        self
    }

    pub fn predicate(mut self, predicate: &str) -> IndexBuilder {
        self.predicate = Some(predicate.to_string());
        self
    }

    fn build(self, id: StableId, table: &str, columns: &[Column], pk: &[usize]) -> Result<Index, OptimizerError> {
        if self.columns.is_empty() {
            return Err(OptimizerError::argument(format!("No columns have been specified. Index: {}", self.name)));
        }

        let find = |name: &str| {
            columns.iter().position(|c| c.name == name).ok_or_else(|| {
                OptimizerError::argument(format!("Column does not exist. Table: {}, column: {}", table, name))
            })
        };

        let mut index_columns = Vec::with_capacity(self.columns.len() + pk.len());
        for (name, descending) in self.columns.iter() {
            index_columns.push(IndexColumn {
                ordinal: find(name)?,
                descending: *descending,
            });
        }

        let lax_key_column_count = index_columns.len();
        let has_nullable = index_columns.iter().any(|c| columns[c.ordinal].nullable);

        // Non-unique indexes and unique indexes over nullable columns need the primary key to form a strict key.
        for ordinal in pk {
            if !index_columns.iter().any(|c| c.ordinal == *ordinal) {
                index_columns.push(IndexColumn {
                    ordinal: *ordinal,
                    descending: false,
                });
            }
        }
        let key_column_count = if self.unique && !has_nullable {
            lax_key_column_count
        } else {
            index_columns.len()
        };
        let lax_key_column_count = if self.unique {
            lax_key_column_count
        } else {
            key_column_count
        };

        let mut storing = Vec::with_capacity(self.storing.len());
        for name in self.storing.iter() {
            let ordinal = find(name)?;
            if !index_columns.iter().any(|c| c.ordinal == ordinal) {
                storing.push(ordinal);
            }
        }

        Ok(Index {
            id,
            name: self.name,
            unique: self.unique,
            inverted: self.inverted,
            columns: index_columns,
            key_column_count,
            lax_key_column_count,
            storing,
            foreign_key: self.foreign_key,
            predicate: self.predicate,
        })
    }
}

#[allow(dead_code)]
pub(crate) fn __ensure_type_is_sync_send<T>()
where
    T: Sync + Send,
{
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_implicit_primary_key() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("t").add_column("a", DataType::Int).build()?;

        assert_eq!(table.column_count(), 2);
        let rowid = table.column(1);
        assert_eq!(rowid.name(), ROWID_COLUMN);
        assert!(rowid.is_hidden());
        assert!(!rowid.nullable());

        let primary = table.index(0);
        assert_eq!(primary.key_column_count(), 1);
        assert_eq!(primary.column(0).ordinal, 1);
        assert_eq!(primary.column_count(), 2, "primary index stores all columns");
        Ok(())
    }

    #[test]
    fn test_secondary_index_keys() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("t")
            .add_column("a", DataType::Int)
            .add_column("b", DataType::Int)
            .add_not_null_column("c", DataType::Int)
            .primary_key(&["a"])
            .add_index(IndexBuilder::new("t_b").add_column("b"))
            .add_index(IndexBuilder::new("t_b_unique").add_column("b").unique())
            .add_index(IndexBuilder::new("t_c_unique").add_desc_column("c").unique().storing("b"))
            .build()?;

        assert!(!table.column(0).nullable(), "primary key columns are not null");

        let t_b = table.index(1);
        assert_eq!(t_b.key_column_count(), 2);
        assert_eq!(t_b.lax_key_column_count(), 2);

        let t_b_unique = table.index(2);
        assert_eq!(t_b_unique.lax_key_column_count(), 1);
        assert_eq!(t_b_unique.key_column_count(), 2);

        let t_c_unique = table.index(3);
        assert_eq!(t_c_unique.lax_key_column_count(), 1);
        assert_eq!(t_c_unique.key_column_count(), 1);
        assert!(t_c_unique.column(0).descending);
        assert_eq!(t_c_unique.column_count(), 3);
        assert_eq!(t_c_unique.column(2).ordinal, 1);
        Ok(())
    }

    #[test]
    fn test_duplicate_columns() {
        let result = TableBuilder::new("t")
            .add_column("a", DataType::Int)
            .add_column("a", DataType::String)
            .build();
        assert!(matches!(result, Err(OptimizerError::Argument(_))));
    }

    #[test]
    fn test_unknown_index_column() {
        let result = TableBuilder::new("t")
            .add_column("a", DataType::Int)
            .add_index(IndexBuilder::new("t_x").add_column("x"))
            .build();
        assert!(matches!(result, Err(OptimizerError::Argument(_))));
    }

    #[test]
    fn test_column_statistics() -> Result<(), OptimizerError> {
        let table = TableBuilder::new("t")
            .add_column("a", DataType::Int)
            .add_row_count(100)
            .add_column_statistics("a", 10, 5)
            .build()?;
        let statistics = table.statistics().unwrap();
        assert_eq!(statistics.row_count(), 100);
        assert_eq!(statistics.column(0).map(|c| c.distinct_count()), Some(10));
        assert!(statistics.column(1).is_none());
        Ok(())
    }
}
