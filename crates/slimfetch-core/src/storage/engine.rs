//! Storage engine implementation.

use super::codec;
use super::key::{decode_key, decode_link, encode_key, encode_link};
use super::{Record, StorageConfig};
use crate::error::Error;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use slimfetch_proto::Value;
use sled::{Db, Tree};
use std::sync::Arc;

/// Tree name for table metadata.
const META_TREE: &str = "meta";

/// Prefix for table trees and their metadata keys.
const TABLE_PREFIX: &str = "table:";

/// Schema of one stored table, kept as JSON in the meta tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableSchema {
    /// A row table keyed by its identity column.
    Rows { columns: Vec<String> },
    /// A link table holding `(source, target)` pairs.
    Links {
        source_column: String,
        target_column: String,
    },
}

impl TableSchema {
    /// Column names of the table.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            TableSchema::Rows { columns } => columns.iter().map(String::as_str).collect(),
            TableSchema::Links {
                source_column,
                target_column,
            } => vec![source_column.as_str(), target_column.as_str()],
        }
    }

    /// Check whether the table has the given column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

#[derive(Clone)]
struct TableHandle {
    schema: Arc<TableSchema>,
    tree: Tree,
}

/// The storage engine wrapping sled.
///
/// Every table lives in its own sled tree. Row keys are the order-preserving
/// encoding of the identity value (see [`key`](super::key)); row values are
/// rkyv [`Record`]s whose data is a [`codec`](super::codec)-encoded row.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for table metadata.
    meta_tree: Tree,

    /// Opened tables, loaded from the meta tree on first use.
    tables: DashMap<String, TableHandle>,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let meta_tree = db.open_tree(META_TREE)?;

        Ok(Self {
            db,
            meta_tree,
            tables: DashMap::new(),
        })
    }

    /// Create a row table with the given columns.
    ///
    /// Recreating an existing table replaces its column list; stored rows are kept.
    pub fn create_table(&self, name: &str, columns: &[&str]) -> Result<(), Error> {
        let schema = TableSchema::Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
        };
        self.write_schema(name, schema)
    }

    /// Create a link table relating source keys to target keys.
    pub fn create_link_table(
        &self,
        name: &str,
        source_column: &str,
        target_column: &str,
    ) -> Result<(), Error> {
        let schema = TableSchema::Links {
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
        };
        self.write_schema(name, schema)
    }

    /// Insert or replace a row.
    ///
    /// Every column must be part of the table schema.
    pub fn insert_row(
        &self,
        table: &str,
        key: &Value,
        columns: &[(String, Value)],
    ) -> Result<(), Error> {
        let handle = self.table(table)?;
        if !matches!(*handle.schema, TableSchema::Rows { .. }) {
            return Err(Error::InvalidData(format!("'{}' is a link table", table)));
        }
        for (column, _) in columns {
            if !handle.schema.has_column(column) {
                return Err(Error::MissingColumn {
                    table: table.to_string(),
                    column: column.clone(),
                });
            }
        }

        let record = Record::new(codec::encode_row(columns)?);
        handle.tree.insert(encode_key(key)?, record.to_bytes()?)?;
        Ok(())
    }

    /// Insert a `(source, target)` pair into a link table.
    pub fn insert_link(&self, table: &str, source: &Value, target: &Value) -> Result<(), Error> {
        let handle = self.table(table)?;
        if !matches!(*handle.schema, TableSchema::Links { .. }) {
            return Err(Error::InvalidData(format!("'{}' is not a link table", table)));
        }
        handle.tree.insert(encode_link(source, target)?, &[])?;
        Ok(())
    }

    /// Get a row by key.
    pub fn get_row(&self, table: &str, key: &Value) -> Result<Option<Record>, Error> {
        let handle = self.table(table)?;
        match handle.tree.get(encode_key(key)?)? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan all rows of a table in key order.
    pub fn scan_table(
        &self,
        table: &str,
    ) -> Result<impl Iterator<Item = Result<(Value, Record), Error>>, Error> {
        let handle = self.table(table)?;
        Ok(handle.tree.iter().map(|result| {
            let (key_bytes, value_bytes) = result?;
            let key = decode_key(&key_bytes)?;
            let record = Record::from_bytes(&value_bytes)?;
            Ok((key, record))
        }))
    }

    /// Scan the targets linked to a source key, in target key order.
    pub fn scan_links(
        &self,
        table: &str,
        source: &Value,
    ) -> Result<impl Iterator<Item = Result<Value, Error>>, Error> {
        let handle = self.table(table)?;
        let prefix = encode_key(source)?;
        Ok(handle.tree.scan_prefix(prefix).map(|result| {
            let (key_bytes, _) = result?;
            let (_, target) = decode_link(&key_bytes)?;
            Ok(target)
        }))
    }

    /// Get the schema of a table.
    pub fn table_schema(&self, table: &str) -> Result<Arc<TableSchema>, Error> {
        Ok(self.table(table)?.schema)
    }

    /// Column names of a table.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, Error> {
        let schema = self.table_schema(table)?;
        Ok(schema.columns().into_iter().map(str::to_string).collect())
    }

    /// Check whether a table exists.
    pub fn has_table(&self, table: &str) -> Result<bool, Error> {
        if self.tables.contains_key(table) {
            return Ok(true);
        }
        Ok(self.meta_tree.contains_key(meta_key(table))?)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn write_schema(&self, name: &str, schema: TableSchema) -> Result<(), Error> {
        let bytes =
            serde_json::to_vec(&schema).map_err(|e| Error::Serialization(e.to_string()))?;
        self.meta_tree.insert(meta_key(name), bytes)?;
        let tree = self.db.open_tree(meta_key(name))?;
        self.tables.insert(
            name.to_string(),
            TableHandle {
                schema: Arc::new(schema),
                tree,
            },
        );
        Ok(())
    }

    fn table(&self, name: &str) -> Result<TableHandle, Error> {
        if let Some(handle) = self.tables.get(name) {
            return Ok(handle.clone());
        }

        let bytes = self
            .meta_tree
            .get(meta_key(name))?
            .ok_or_else(|| Error::UnknownTable(name.to_string()))?;
        let schema: TableSchema =
            serde_json::from_slice(&bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        let handle = TableHandle {
            schema: Arc::new(schema),
            tree: self.db.open_tree(meta_key(name))?,
        };
        self.tables.insert(name.to_string(), handle.clone());
        Ok(handle)
    }
}

fn meta_key(table: &str) -> String {
    format!("{}{}", TABLE_PREFIX, table)
}
