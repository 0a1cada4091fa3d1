//! Mutable implementation of a database catalog.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::catalog::{
    Catalog, DataSourceName, Privilege, Schema, SchemaRef, StableId, Table, TableRef, __ensure_type_is_sync_send,
};
use crate::error::{OptimizerError, SqlCode};

/// A [database catalog] that stores database objects in memory and provides operation to add/remove database objects.
/// Every successful modification increments the [version](Catalog::version) of the catalog.
///
/// # Error handling
///
/// Errors returned by methods of the `MutableCatalog` are recoverable.
///
/// [database catalog]: crate::catalog::Catalog
#[derive(Debug)]
pub struct MutableCatalog {
    schemas: RwLock<HashMap<ObjectId, SchemaRef>>,
    tables_by_id: RwLock<HashMap<StableId, TableRef>>,
    denied: RwLock<HashSet<(StableId, Privilege)>>,
    version: AtomicU64,
    next_table_id: AtomicU64,
}

impl MutableCatalog {
    /// Creates a instance of [MutableCatalog].
    pub fn new() -> Self {
        MutableCatalog {
            schemas: RwLock::new(HashMap::new()),
            tables_by_id: RwLock::new(HashMap::new()),
            denied: RwLock::new(HashSet::new()),
            version: AtomicU64::new(1),
            next_table_id: AtomicU64::new(1),
        }
    }

    /// Adds the given table to the specified schema and assigns an identifier to it.
    /// If such schema does not exists creates one.
    /// If the table already exists this method returns an error.
    pub fn add_table(&self, schema: &str, mut table: Table) -> Result<TableRef, OptimizerError> {
        let mut schemas = self.schemas.write().unwrap();
        table.id = StableId(self.next_table_id.fetch_add(1, Ordering::Relaxed));
        let table = Arc::new(table);

        let schema = match schemas.entry(ObjectId::from(schema)) {
            Entry::Occupied(o) => o.into_mut(),
            Entry::Vacant(v) => v.insert(Arc::new(MutableSchema::new(schema))),
        };
        MutableSchema::from_ref(schema).add_table(table.clone())?;

        self.tables_by_id.write().unwrap().insert(table.id(), table.clone());
        self.version.fetch_add(1, Ordering::Relaxed);
        Ok(table)
    }

    /// Remove a database table with name `table` from the specified schema.
    /// If the schema or the table do not exist this method returns an error.
    pub fn remove_table(&self, schema: &str, table: &str) -> Result<(), OptimizerError> {
        let mut schemas = self.schemas.write().unwrap();
        if let Some(schema) = schemas.get_mut(&ObjectId::from(schema)) {
            let schema = MutableSchema::from_ref(schema);
            let removed = schema.remove_table(table)?;
            self.tables_by_id.write().unwrap().remove(&removed.id());
            self.version.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            Err(OptimizerError::argument(format!("Schema does not exist. Schema: {}", schema)))
        }
    }

    /// Revokes the given privilege on the given table.
    pub fn deny_privilege(&self, table: StableId, privilege: Privilege) {
        self.denied.write().unwrap().insert((table, privilege));
        self.version.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for MutableCatalog {
    fn default() -> Self {
        MutableCatalog::new()
    }
}

// see https://github.com/rust-lang/rust-clippy/issues/6066
#[allow(clippy::needless_collect)]
impl Catalog for MutableCatalog {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    fn get_schemas(&self) -> Vec<SchemaRef> {
        let schemas = self.schemas.read().unwrap();
        let mut schemas = schemas.values().cloned().collect::<Vec<SchemaRef>>();
        schemas.sort_by(|a, b| a.name().cmp(b.name()));
        schemas
    }

    fn resolve_schema(&self, name: &str) -> Result<SchemaRef, OptimizerError> {
        let schemas = self.schemas.read().unwrap();
        schemas
            .get(&ObjectId::from(name))
            .cloned()
            .ok_or_else(|| OptimizerError::plan(SqlCode::InvalidSchemaName, format!("schema {} does not exist", name)))
    }

    fn resolve_data_source(&self, name: &DataSourceName) -> Result<(TableRef, DataSourceName), OptimizerError> {
        let schema = self.resolve_schema(name.schema_or_default()).map_err(|_| {
            OptimizerError::plan(SqlCode::UndefinedTable, format!("relation {} does not exist", name))
        })?;
        match schema.get_table_by_name(&name.name) {
            Some(table) => {
                let resolved = DataSourceName::qualified(schema.name(), table.name());
                Ok((table, resolved))
            }
            None => Err(OptimizerError::plan(SqlCode::UndefinedTable, format!("relation {} does not exist", name))),
        }
    }

    fn resolve_data_source_by_id(&self, id: StableId) -> Result<TableRef, OptimizerError> {
        let tables = self.tables_by_id.read().unwrap();
        tables
            .get(&id)
            .cloned()
            .ok_or_else(|| OptimizerError::plan(SqlCode::UndefinedTable, format!("relation [{}] does not exist", id)))
    }

    fn check_privilege(&self, table: &Table, privilege: Privilege) -> Result<(), OptimizerError> {
        let denied = self.denied.read().unwrap();
        if denied.contains(&(table.id(), privilege)) {
            let message = format!("user does not have {} privilege on relation {}", privilege, table.name());
            Err(OptimizerError::plan(SqlCode::InsufficientPrivilege, message))
        } else {
            Ok(())
        }
    }
}

/// A [database schema](Schema) that stores object in memory and provides operation to add/remove database objects.
///
/// # Error handling
///
/// Errors returned by methods of the `MutableSchema` are recoverable.
#[derive(Debug)]
pub struct MutableSchema {
    name: String,
    tables: RwLock<HashMap<ObjectId, TableRef>>,
}

impl MutableSchema {
    fn new(name: &str) -> Self {
        MutableSchema {
            name: name.to_string(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn from_ref(schema: &SchemaRef) -> &MutableSchema {
        schema
            .as_any()
            .downcast_ref::<MutableSchema>()
            .unwrap_or_else(|| panic!("Unable to downcast to MutableSchema: {:?}", schema))
    }

    fn add_table(&self, table: TableRef) -> Result<(), OptimizerError> {
        let mut tables = self.tables.write().unwrap();
        match tables.entry(ObjectId::from(table.name())) {
            Entry::Occupied(_) => {
                Err(OptimizerError::argument(format!("Add table: Table already exists. Table: {}", table.name())))
            }
            Entry::Vacant(v) => {
                v.insert(table);
                Ok(())
            }
        }
    }

    fn remove_table(&self, name: &str) -> Result<TableRef, OptimizerError> {
        let mut tables = self.tables.write().unwrap();
        tables
            .remove(&ObjectId::from(name))
            .ok_or_else(|| OptimizerError::argument(format!("Remove table: Table does not exist. Table: {}", name)))
    }
}

impl Schema for MutableSchema {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn get_tables(&self) -> Vec<TableRef> {
        let tables = self.tables.read().unwrap();
        let mut tables = tables.values().cloned().collect::<Vec<TableRef>>();
        tables.sort_by_key(|t| t.id());
        tables
    }

    fn get_table_by_name(&self, name: &str) -> Option<TableRef> {
        let tables = self.tables.read().unwrap();
        tables.get(&ObjectId::from(name)).cloned()
    }
}

#[derive(Debug, Eq, PartialEq, Hash)]
struct ObjectId {
    id: CaseInsensitiveString,
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        ObjectId {
            id: CaseInsensitiveString(String::from(id)),
        }
    }
}

#[derive(Debug)]
struct CaseInsensitiveString(String);

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CaseInsensitiveString {}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.0.as_bytes() {
            c.to_ascii_lowercase().hash(state)
        }
    }
}

#[allow(dead_code)]
fn __type_system_guarantees() {
    __ensure_type_is_sync_send::<MutableCatalog>();
    __ensure_type_is_sync_send::<MutableSchema>();
}

#[cfg(test)]
mod test {
    use crate::catalog::mutable::{MutableCatalog, MutableSchema};
    use crate::catalog::{Catalog, DataSourceName, Privilege, Schema, TableBuilder};
    use crate::datatypes::DataType;
    use crate::error::{OptimizerError, SqlCode};

    #[test]
    fn test_tables() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        let table = TableBuilder::new("A").add_column("a1", DataType::Int).build()?;
        let version = catalog.version();

        let table = catalog.add_table("s", table)?;
        assert!(catalog.version() > version, "version has not been changed");

        let schema = catalog.resolve_schema("S")?;
        let _ = schema
            .get_table_by_name("a")
            .unwrap_or_else(|| panic!("table A is missing from the schema s"));

        let by_id = catalog.resolve_data_source_by_id(table.id())?;
        assert_eq!(by_id.name(), "A");

        catalog.remove_table("s", "A")?;
        let schema: &MutableSchema = schema.as_any().downcast_ref::<MutableSchema>().unwrap();
        assert_eq!(schema.get_tables().len(), 0, "table has not been removed");
        assert!(catalog.resolve_data_source_by_id(table.id()).is_err());
        Ok(())
    }

    #[test]
    fn test_resolve_data_source() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        let table = TableBuilder::new("t").add_column("a", DataType::Int).build()?;
        catalog.add_table("default", table)?;

        let (table, name) = catalog.resolve_data_source(&DataSourceName::new("t"))?;
        assert_eq!(table.name(), "t");
        assert_eq!(name.to_string(), "default.t");

        let err = catalog.resolve_data_source(&DataSourceName::new("u")).unwrap_err();
        assert_eq!(err.code(), SqlCode::UndefinedTable);

        let err = catalog.resolve_data_source(&DataSourceName::qualified("x", "t")).unwrap_err();
        assert_eq!(err.code(), SqlCode::UndefinedTable);
        Ok(())
    }

    #[test]
    fn test_duplicate_table() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        catalog.add_table("s", TableBuilder::new("t").add_column("a", DataType::Int).build()?)?;
        let result = catalog.add_table("s", TableBuilder::new("T").add_column("a", DataType::Int).build()?);
        assert!(matches!(result, Err(OptimizerError::Argument(_))));
        Ok(())
    }

    #[test]
    fn test_privileges() -> Result<(), OptimizerError> {
        let catalog = MutableCatalog::new();
        let table = catalog.add_table("s", TableBuilder::new("t").add_column("a", DataType::Int).build()?)?;

        catalog.check_privilege(&table, Privilege::Insert)?;
        catalog.deny_privilege(table.id(), Privilege::Insert);

        let err = catalog.check_privilege(&table, Privilege::Insert).unwrap_err();
        assert_eq!(err.code(), SqlCode::InsufficientPrivilege);
        catalog.check_privilege(&table, Privilege::Select)?;
        Ok(())
    }
}
