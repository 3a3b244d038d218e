//! Rows loaded while executing a fetch, grouped by alias.

use std::collections::HashMap;

use slimfetch_proto::Value;

use crate::context::CompiledProjection;
use crate::error::Error;
use crate::storage::codec::get_columns;
use crate::storage::key::encode_key;
use crate::storage::Record;

/// A loaded row and the related rows attached to it.
#[derive(Debug)]
pub(crate) struct RowNode {
    pub key: Value,
    /// Values aligned with the compiled projection's columns.
    pub values: Vec<Value>,
    /// Related row indices by relation field name.
    pub relations: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Default)]
struct AliasRows {
    order: Vec<usize>,
    by_key: HashMap<Vec<u8>, usize>,
}

/// Arena of loaded rows. Each row is stored once per alias.
#[derive(Debug, Default)]
pub(crate) struct RowArena {
    nodes: Vec<RowNode>,
    aliases: HashMap<String, AliasRows>,
}

impl RowArena {
    /// Bind a row to `alias`, returning its index and whether it was new.
    pub fn insert(
        &mut self,
        alias: &str,
        key: Value,
        record: &Record,
        compiled: &CompiledProjection,
    ) -> Result<(usize, bool), Error> {
        let encoded = encode_key(&key)?;
        let rows = self.aliases.entry(alias.to_string()).or_default();
        if let Some(&index) = rows.by_key.get(&encoded) {
            return Ok((index, false));
        }

        let columns: Vec<&str> = compiled.columns().iter().map(String::as_str).collect();
        let values = get_columns(&record.data, &columns)?;

        let index = self.nodes.len();
        self.nodes.push(RowNode {
            key,
            values,
            relations: HashMap::new(),
        });
        rows.order.push(index);
        rows.by_key.insert(encoded, index);
        Ok((index, true))
    }

    /// Attach `child` to `parent` under `field`.
    pub fn link(&mut self, parent: usize, field: &str, child: usize) {
        let children = self.nodes[parent]
            .relations
            .entry(field.to_string())
            .or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    /// Rows bound to `alias`, in load order.
    pub fn rows(&self, alias: &str) -> Vec<usize> {
        self.aliases
            .get(alias)
            .map(|rows| rows.order.clone())
            .unwrap_or_default()
    }

    pub fn node(&self, index: usize) -> &RowNode {
        &self.nodes[index]
    }

    /// Value of `column` for a row, `Null` if the projection does not read it.
    pub fn value(&self, index: usize, compiled: &CompiledProjection, column: &str) -> Value {
        compiled
            .column_index(column)
            .and_then(|i| self.nodes[index].values.get(i).cloned())
            .unwrap_or(Value::Null)
    }
}
