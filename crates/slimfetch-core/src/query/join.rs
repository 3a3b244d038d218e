//! Join steps for loading the rows of one relation.
//!
//! Each relation mapping has its own access path:
//! - ForeignKey: point lookup of the key stored on the parent row
//! - MappedBy: hash join, one scan of the child table probed by parent key
//! - LinkTable: prefix scan of the link table per parent, then point lookups

use std::collections::HashMap;

use slimfetch_proto::Value;

use super::rows::RowArena;
use crate::catalog::ScalarType;
use crate::context::CompiledProjection;
use crate::error::Error;
use crate::storage::codec::get_column;
use crate::storage::key::encode_key;
use crate::storage::StorageEngine;

/// Loads the rows of `field` for every parent row.
pub(crate) struct JoinStep<'a> {
    pub storage: &'a StorageEngine,
    pub parent: &'a CompiledProjection,
    pub child: &'a CompiledProjection,
    pub field: &'a str,
    pub child_alias: &'a str,
}

impl JoinStep<'_> {
    /// Follow a foreign key stored in `column` of the parent rows.
    pub fn foreign_key(
        &self,
        arena: &mut RowArena,
        parents: &[usize],
        column: &str,
    ) -> Result<usize, Error> {
        let identity = identity_type(self.child)?;
        let mut loaded: HashMap<Vec<u8>, Option<usize>> = HashMap::new();
        let mut joined = 0;

        for &parent in parents {
            let fk = arena.value(parent, self.parent, column);
            if fk.is_null() {
                continue;
            }
            let key = identity.coerce_key(&fk)?;
            let encoded = encode_key(&key)?;

            let child = match loaded.get(&encoded) {
                Some(child) => *child,
                None => {
                    let child = match self.storage.get_row(self.child.table(), &key)? {
                        Some(record) => Some(arena.insert(self.child_alias, key, &record, self.child)?.0),
                        None => None,
                    };
                    loaded.insert(encoded, child);
                    child
                }
            };

            if let Some(child) = child {
                arena.link(parent, self.field, child);
                joined += 1;
            }
        }

        Ok(joined)
    }

    /// Match child rows whose `column` holds a parent key.
    ///
    /// Build phase indexes the parents by encoded key; probe phase scans the
    /// child table once.
    pub fn mapped_by(
        &self,
        arena: &mut RowArena,
        parents: &[usize],
        column: &str,
    ) -> Result<usize, Error> {
        if parents.is_empty() {
            return Ok(0);
        }

        let parent_identity = identity_type(self.parent)?;
        let mut by_key: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
        for &parent in parents {
            let encoded = encode_key(&arena.node(parent).key)?;
            by_key.entry(encoded).or_default().push(parent);
        }

        let mut joined = 0;
        for result in self.storage.scan_table(self.child.table())? {
            let (key, record) = result?;
            let reference = match get_column(&record.data, column)? {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            // A reference of another type cannot match any parent.
            let Ok(reference) = parent_identity.coerce_key(&reference) else {
                continue;
            };
            let Some(matches) = by_key.get(&encode_key(&reference)?) else {
                continue;
            };

            let (child, _) = arena.insert(self.child_alias, key, &record, self.child)?;
            for &parent in matches {
                arena.link(parent, self.field, child);
                joined += 1;
            }
        }

        Ok(joined)
    }

    /// Follow the pairs of a link table.
    pub fn link_table(
        &self,
        arena: &mut RowArena,
        parents: &[usize],
        table: &str,
    ) -> Result<usize, Error> {
        let identity = identity_type(self.child)?;
        let mut joined = 0;

        for &parent in parents {
            let source = arena.node(parent).key.clone();
            let targets: Vec<Value> = self
                .storage
                .scan_links(table, &source)?
                .collect::<Result<_, _>>()?;

            for target in targets {
                let key = identity.coerce_key(&target)?;
                if let Some(record) = self.storage.get_row(self.child.table(), &key)? {
                    let (child, _) = arena.insert(self.child_alias, key, &record, self.child)?;
                    arena.link(parent, self.field, child);
                    joined += 1;
                }
            }
        }

        Ok(joined)
    }
}

fn identity_type(compiled: &CompiledProjection) -> Result<ScalarType, Error> {
    let template = compiled.projection().template();
    template.identity_type().ok_or_else(|| {
        Error::InvalidData(format!("template '{}' has no identity field", template.name))
    })
}
