use std::fmt::{Display, Formatter};

use crate::catalog::TableRef;
use crate::datatypes::DataType;
use crate::properties::ColSet;

/// Uniquely identifies a column within one optimization run. Identifiers start from `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(usize);

impl ColumnId {
    /// Creates a column identifier.
    ///
    /// # Panics
    ///
    /// Panics if `id` is zero.
    pub fn new(id: usize) -> Self {
        assert_ne!(id, 0, "Column id must be positive");
        ColumnId(id)
    }

    /// The numeric value of this identifier.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for ColumnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a table referenced by a query. A table referenced twice gets two identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

impl TableId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for TableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Distinguishes separate VALUES clauses of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValuesId(usize);

impl Display for ValuesId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Column metadata. If the table is set this is a column of a database table.
/// Otherwise this is a synthetic column.
#[derive(Debug, Clone)]
pub struct ColumnMeta {
    id: ColumnId,
    alias: String,
    data_type: DataType,
    table: Option<TableId>,
}

impl ColumnMeta {
    /// The identifier of this column.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// The name of this column.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The type of this column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The table this column belongs to. `None` for synthetic columns.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }
}

/// A table referenced by a query.
#[derive(Debug, Clone)]
pub struct TableMeta {
    id: TableId,
    table: TableRef,
    first_column: usize,
}

impl TableMeta {
    /// The identifier of this table.
    pub fn id(&self) -> TableId {
        self.id
    }

    /// The catalog table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Maps the ordinal of a catalog column to a column identifier.
    ///
    /// # Panics
    ///
    /// Panics if the ordinal is out of bounds.
    pub fn column_id(&self, ordinal: usize) -> ColumnId {
        assert!(
            ordinal < self.table.column_count(),
            "Column ordinal {} is out of bounds. Table: {}",
            ordinal,
            self.table.name()
        );
        ColumnId(self.first_column + ordinal)
    }

    /// Maps a column identifier back to the ordinal of a catalog column.
    pub fn column_ordinal(&self, col: ColumnId) -> Option<usize> {
        let ordinal = col.0.checked_sub(self.first_column)?;
        if ordinal < self.table.column_count() {
            Some(ordinal)
        } else {
            None
        }
    }

    /// All columns of this table including hidden and mutation columns.
    pub fn all_cols(&self) -> ColSet {
        (0..self.table.column_count()).map(|i| self.column_id(i)).collect()
    }

    /// Columns that are being added or dropped by a schema change.
    pub fn mutation_cols(&self) -> ColSet {
        (0..self.table.column_count())
            .filter(|i| self.table.column(*i).is_mutation())
            .map(|i| self.column_id(i))
            .collect()
    }

    /// Columns that can be read by a query: every column except mutation columns.
    pub fn readable_cols(&self) -> ColSet {
        self.all_cols().difference(&self.mutation_cols())
    }

    /// Columns of the given index (key columns followed by stored columns).
    pub fn index_cols(&self, index: usize) -> ColSet {
        let index = self.table.index(index);
        (0..index.column_count()).map(|i| self.column_id(index.column(i).ordinal)).collect()
    }

    /// Strict key columns of the given index.
    pub fn index_key_cols(&self, index: usize) -> ColSet {
        let index = self.table.index(index);
        (0..index.key_column_count()).map(|i| self.column_id(index.column(i).ordinal)).collect()
    }

    /// Lax key columns of the given index.
    pub fn index_lax_key_cols(&self, index: usize) -> ColSet {
        let index = self.table.index(index);
        (0..index.lax_key_column_count()).map(|i| self.column_id(index.column(i).ordinal)).collect()
    }
}

/// Assigns identifiers to tables, columns and VALUES clauses referenced within one optimization run.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    columns: Vec<ColumnMeta>,
    tables: Vec<TableMeta>,
    values: usize,
}

impl Metadata {
    /// Creates an empty metadata.
    pub fn new() -> Self {
        Metadata::default()
    }

    /// Adds a synthetic column and returns its identifier.
    pub fn add_column(&mut self, alias: &str, data_type: DataType) -> ColumnId {
        self.push_column(alias, data_type, None)
    }

    fn push_column(&mut self, alias: &str, data_type: DataType, table: Option<TableId>) -> ColumnId {
        let id = ColumnId(self.columns.len() + 1);
        self.columns.push(ColumnMeta {
            id,
            alias: alias.to_string(),
            data_type,
            table,
        });
        id
    }

    /// Returns metadata of the given column.
    ///
    /// # Panics
    ///
    /// Panics if there is no such column.
    pub fn column(&self, id: ColumnId) -> &ColumnMeta {
        self.columns
            .get(id.0 - 1)
            .unwrap_or_else(|| panic!("Unknown or unexpected column id: {:?}", id))
    }

    /// Returns an iterator over metadata of all columns.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnMeta> {
        self.columns.iter()
    }

    /// The number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Adds the given table. Every column of the table (including hidden and mutation columns) gets an identifier.
    pub fn add_table(&mut self, table: TableRef) -> TableId {
        let id = TableId(self.tables.len() + 1);
        let first_column = self.columns.len() + 1;
        for column in table.columns() {
            self.push_column(column.name(), column.data_type().clone(), Some(id));
        }
        self.tables.push(TableMeta {
            id,
            table,
            first_column,
        });
        id
    }

    /// Returns metadata of the given table.
    ///
    /// # Panics
    ///
    /// Panics if there is no such table.
    pub fn table(&self, id: TableId) -> &TableMeta {
        self.tables
            .get(id.0 - 1)
            .unwrap_or_else(|| panic!("Unknown or unexpected table id: {:?}", id))
    }

    /// Returns an iterator over all tables.
    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.iter()
    }

    /// Returns a new identifier for a VALUES clause.
    pub fn next_values_id(&mut self) -> ValuesId {
        self.values += 1;
        ValuesId(self.values)
    }

    /// An estimate of the number of bytes used by this metadata.
    pub fn memory_estimate(&self) -> usize {
        let columns: usize = self.columns.iter().map(|c| std::mem::size_of::<ColumnMeta>() + c.alias.len()).sum();
        columns + self.tables.len() * std::mem::size_of::<TableMeta>()
    }
}
