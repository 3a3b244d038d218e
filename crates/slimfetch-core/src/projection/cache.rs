//! Shape-keyed cache of projection types.
//!
//! Lookups go through two identifiers. The shallow id of the request is
//! checked first without taking any lock. On a miss the full id is computed
//! (validating the selection); if another selection already produced the
//! same full shape, the shallow id is recorded as an alias of it. Only then
//! is the per-shape lock taken and the type built, at most once per full
//! shape for the life of the cache.
//!
//! Nested relation types are resolved through the same path while the parent
//! lock is held. A nested selection is strictly smaller than its parent, so
//! locks are always taken from larger shapes to smaller ones.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use slimfetch_proto::SelectionSet;
use tracing::{debug, info};

use super::builder::ProjectionBuilder;
use super::locks::KeyedLocks;
use super::shape::{check_names, full_id, shallow_id, ShapeId};
use super::types::ProjectionType;
use crate::catalog::{EntityTemplate, TemplateRegistry};
use crate::error::Error;

/// Receives every projection type created by a top-level request.
pub trait ProjectionListener: Send + Sync {
    /// Called once per new type, after it has been cached.
    fn on_new_type(&self, ty: &Arc<ProjectionType>) -> Result<(), Error>;
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    alias_hits: AtomicU64,
    builds: AtomicU64,
    failures: AtomicU64,
}

impl CacheStats {
    /// Lookups answered by the shallow id, or by a build another thread finished.
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    /// Lookups answered by the full id and recorded as a new alias.
    pub fn alias_hits(&self) -> u64 {
        self.alias_hits.load(AtomicOrdering::Relaxed)
    }

    /// Projection types built.
    pub fn builds(&self) -> u64 {
        self.builds.load(AtomicOrdering::Relaxed)
    }

    /// Lookups that failed validation or building.
    pub fn failures(&self) -> u64 {
        self.failures.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = (self.hits() + self.alias_hits()) as f64;
        let total = hits + self.builds() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Cache of projection types keyed by shape identifier. Entries are never evicted.
pub struct ProjectionCache {
    registry: Arc<TemplateRegistry>,
    entries: DashMap<ShapeId, Arc<ProjectionType>>,
    locks: KeyedLocks,
    next_sequence: AtomicU64,
    listener: Option<Arc<dyn ProjectionListener>>,
    stats: CacheStats,
}

impl ProjectionCache {
    pub fn new(registry: Arc<TemplateRegistry>) -> Self {
        Self {
            registry,
            entries: DashMap::new(),
            locks: KeyedLocks::new(),
            next_sequence: AtomicU64::new(0),
            listener: None,
            stats: CacheStats::default(),
        }
    }

    /// Notify `listener` about every type created by [`get_or_build`](Self::get_or_build).
    pub fn with_listener(mut self, listener: Arc<dyn ProjectionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get the projection type for a selection, building it on first use.
    ///
    /// When a type is created the listener is told before returning; a
    /// listener error is returned to the caller but the type stays cached.
    pub fn get_or_build(
        &self,
        template: &str,
        selection: &SelectionSet,
    ) -> Result<Arc<ProjectionType>, Error> {
        let template = self.registry.require(template).map_err(|e| {
            self.stats.failures.fetch_add(1, AtomicOrdering::Relaxed);
            e
        })?;
        let (ty, created) = self.lookup_or_build(template, selection)?;

        if created {
            if let Some(listener) = &self.listener {
                listener.on_new_type(&ty)?;
            }
        }

        Ok(ty)
    }

    /// Resolve a nested relation type. Listeners are not notified.
    pub(crate) fn get_or_build_nested(
        &self,
        template: &Arc<EntityTemplate>,
        selection: &SelectionSet,
    ) -> Result<Arc<ProjectionType>, Error> {
        self.lookup_or_build(template, selection).map(|(ty, _)| ty)
    }

    fn lookup_or_build(
        &self,
        template: &Arc<EntityTemplate>,
        selection: &SelectionSet,
    ) -> Result<(Arc<ProjectionType>, bool), Error> {
        check_names(&template.name, selection).map_err(|e| {
            self.stats.failures.fetch_add(1, AtomicOrdering::Relaxed);
            e
        })?;
        let shallow = shallow_id(&template.name, selection);
        if let Some(ty) = self.lookup(&shallow) {
            self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
            return Ok((ty, false));
        }

        let full = full_id(&self.registry, template, selection).map_err(|e| {
            self.stats.failures.fetch_add(1, AtomicOrdering::Relaxed);
            e
        })?;

        if full != shallow {
            if let Some(ty) = self.lookup(&full) {
                self.alias(shallow, &ty);
                self.stats.alias_hits.fetch_add(1, AtomicOrdering::Relaxed);
                return Ok((ty, false));
            }
        }

        let lock = self.locks.get(&full);
        let _guard = lock.lock();

        if let Some(ty) = self.lookup(&full) {
            self.alias(shallow, &ty);
            self.stats.hits.fetch_add(1, AtomicOrdering::Relaxed);
            return Ok((ty, false));
        }

        let sequence = self.next_sequence.fetch_add(1, AtomicOrdering::SeqCst);
        let result = ProjectionBuilder::new(self).build(template, selection, full.clone(), sequence);

        let ty = match result {
            Ok(ty) => Arc::new(ty),
            Err(e) => {
                self.stats.failures.fetch_add(1, AtomicOrdering::Relaxed);
                self.locks.release(&full);
                return Err(e);
            }
        };

        self.entries.insert(full.clone(), ty.clone());
        if full != shallow {
            self.alias(shallow, &ty);
        }
        self.stats.builds.fetch_add(1, AtomicOrdering::Relaxed);
        self.locks.release(&full);

        info!(
            projection = %ty.name(),
            shape = %ty.shape(),
            fields = ty.fields().len(),
            "projection type created"
        );

        Ok((ty, true))
    }

    fn lookup(&self, id: &ShapeId) -> Option<Arc<ProjectionType>> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    fn alias(&self, shallow: ShapeId, ty: &Arc<ProjectionType>) {
        debug!(alias = %shallow, shape = %ty.shape(), "projection alias registered");
        self.entries.entry(shallow).or_insert_with(|| ty.clone());
    }

    /// Get a cached type by shallow or full identifier.
    pub fn get(&self, id: &ShapeId) -> Option<Arc<ProjectionType>> {
        self.lookup(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of identifiers in the cache, aliases included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, RelationDef, ScalarType};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::sync::Barrier;
    use std::thread;

    fn registry() -> Arc<TemplateRegistry> {
        let registry = TemplateRegistry::builder()
            .register(
                EntityTemplate::new("Book", "book", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int32))
                    .with_field(FieldDef::scalar("title", ScalarType::String))
                    .with_field(FieldDef::relation(
                        "author",
                        RelationDef::many_to_one("Person", "author_id"),
                    ))
                    .with_field(FieldDef::relation(
                        "quotes",
                        RelationDef::one_to_many("Quote", "book_id"),
                    ))
                    .with_field(FieldDef::relation(
                        "missingOneToMany",
                        RelationDef::one_to_many("Missing", "book_id"),
                    )),
            )
            .register(
                EntityTemplate::new("Person", "person", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int64))
                    .with_field(FieldDef::scalar("name", ScalarType::String)),
            )
            .register(
                EntityTemplate::new("Quote", "quote", "id")
                    .with_field(FieldDef::scalar("id", ScalarType::Int32))
                    .with_field(FieldDef::scalar("text", ScalarType::String)),
            )
            .build()
            .unwrap();
        Arc::new(registry)
    }

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<String>>,
    }

    impl ProjectionListener for RecordingListener {
        fn on_new_type(&self, ty: &Arc<ProjectionType>) -> Result<(), Error> {
            self.seen.lock().push(ty.name().to_string());
            Ok(())
        }
    }

    #[test]
    fn test_mandatory_fields_always_present() {
        let cache = ProjectionCache::new(registry());
        let ty = cache
            .get_or_build("Book", &SelectionSet::new().field("title"))
            .unwrap();

        assert_eq!(ty.field_names(), vec!["id", "title"]);
        assert_eq!(ty.name(), "Book$proj0");
        assert_eq!(ty.shape().as_str(), "Book[id,title]");
    }

    #[test]
    fn test_distinct_shapes_distinct_types() {
        let cache = ProjectionCache::new(registry());
        let a = cache.get_or_build("Book", &SelectionSet::new().field("id")).unwrap();
        let b = cache
            .get_or_build("Book", &SelectionSet::new().fields(["id", "title"]))
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats().builds(), 2);
    }

    #[test]
    fn test_shallow_hit_and_alias() {
        let cache = ProjectionCache::new(registry());
        let first = cache
            .get_or_build("Book", &SelectionSet::new().fields(["id", "title"]))
            .unwrap();

        let again = cache
            .get_or_build("Book", &SelectionSet::new().fields(["title", "id"]))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(cache.stats().hits(), 1);

        // {title} has a different shallow id but the same full shape.
        let aliased = cache.get_or_build("Book", &SelectionSet::new().field("title")).unwrap();
        assert!(Arc::ptr_eq(&first, &aliased));
        assert_eq!(cache.stats().alias_hits(), 1);
        assert_eq!(cache.stats().builds(), 1);
        assert!(cache.contains(&shallow_id("Book", &SelectionSet::new().field("title"))));
        assert!((cache.stats().hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_delimiter_name_does_not_hit_cached_shape() {
        let cache = ProjectionCache::new(registry());
        cache
            .get_or_build("Book", &SelectionSet::new().fields(["id", "title"]))
            .unwrap();

        let err = cache
            .get_or_build("Book", &SelectionSet::new().field("id,title"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSelection { path, .. } if path == "Book.id,title"));
        assert_eq!(cache.stats().hits(), 0);
        assert_eq!(cache.stats().failures(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_nested_types_are_shared() {
        let cache = ProjectionCache::new(registry());
        let book = cache
            .get_or_build(
                "Book",
                &SelectionSet::new()
                    .field("title")
                    .relation("author", SelectionSet::new().field("name")),
            )
            .unwrap();

        let author = book.field("author").and_then(|f| f.target()).unwrap();
        assert_eq!(author.name(), "Person$proj1");
        assert_eq!(author.field_names(), vec!["id", "name"]);

        let person = cache
            .get_or_build("Person", &SelectionSet::new().field("name"))
            .unwrap();
        assert!(Arc::ptr_eq(author, &person));
        assert_eq!(book.with_nested().len(), 2);
    }

    #[test]
    fn test_relation_without_children_is_omitted() {
        let cache = ProjectionCache::new(registry());
        let ty = cache
            .get_or_build("Book", &SelectionSet::new().field("author").field("title"))
            .unwrap();
        assert_eq!(ty.field_names(), vec!["id", "title"]);
        assert_eq!(ty.shape().as_str(), "Book[author,id,title]");
        assert!(ty.has_field("title"));
        assert!(!ty.has_field("author"));
    }

    #[test]
    fn test_unknown_field_leaves_cache_untouched() {
        let cache = ProjectionCache::new(registry());
        let err = cache
            .get_or_build("Book", &SelectionSet::new().field("bogus"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownField { path } if path == "Book.bogus"));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures(), 1);

        assert!(cache.get_or_build("Book", &SelectionSet::new().field("id")).is_ok());
    }

    #[test]
    fn test_build_failure_not_cached() {
        let cache = ProjectionCache::new(registry());
        let selection =
            SelectionSet::new().relation("missingOneToMany", SelectionSet::new().field("id"));

        for _ in 0..2 {
            let err = cache.get_or_build("Book", &selection).unwrap_err();
            assert!(matches!(err, Error::BuildFailure { .. }));
        }
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures(), 2);
    }

    #[test]
    fn test_unknown_template() {
        let cache = ProjectionCache::new(registry());
        assert!(matches!(
            cache.get_or_build("Shelf", &SelectionSet::new()),
            Err(Error::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_listener_sees_top_level_types_only() {
        let listener = Arc::new(RecordingListener::default());
        let cache = ProjectionCache::new(registry()).with_listener(listener.clone());

        cache
            .get_or_build(
                "Book",
                &SelectionSet::new().relation("quotes", SelectionSet::new().field("text")),
            )
            .unwrap();
        cache.get_or_build("Book", &SelectionSet::new()).unwrap();

        assert_eq!(*listener.seen.lock(), vec!["Book$proj0", "Book$proj2"]);
    }

    #[test]
    fn test_concurrent_build_once() {
        const THREADS: usize = 16;
        let cache = Arc::new(ProjectionCache::new(registry()));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    // Same shape, different field order per thread.
                    let selection = if i % 2 == 0 {
                        SelectionSet::new()
                            .field("title")
                            .relation("author", SelectionSet::new().field("name"))
                    } else {
                        SelectionSet::new()
                            .relation("author", SelectionSet::new().field("name"))
                            .field("title")
                    };
                    barrier.wait();
                    cache.get_or_build("Book", &selection).unwrap()
                })
            })
            .collect();

        let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(types.iter().all(|t| Arc::ptr_eq(t, &types[0])));
        // One Book type and one nested Person type.
        assert_eq!(cache.stats().builds(), 2);
    }
}
