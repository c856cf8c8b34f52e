//! Definition cache
//!
//! Resources are keyed by `(kind, canonical URL)`, or `(kind, identity name)`
//! when a resource has no canonical URL. Iteration follows insertion order;
//! a replaced resource keeps the position of the one it replaced.

use crate::error::{Error, Result};
use crate::resource::{CachedResource, Resource, ResourceKind};
use crate::snapshot::Elaboration;
use indexmap::IndexMap;
use std::sync::Arc;

pub(crate) type CacheKey = (ResourceKind, String);

/// One cached resource plus, for StructureDefinitions, its elaboration state.
#[derive(Debug)]
pub struct CacheEntry {
    resource: CachedResource,
    elaboration: Option<Elaboration>,
}

impl CacheEntry {
    fn new(resource: CachedResource) -> Self {
        let elaboration = match &resource.content {
            Resource::StructureDefinition(sd) => Some(Elaboration::new(sd)),
            _ => None,
        };
        Self {
            resource,
            elaboration,
        }
    }

    /// The resource as loaded, before any elaboration
    pub fn resource(&self) -> &CachedResource {
        &self.resource
    }

    pub(crate) fn elaboration(&self) -> Option<&Elaboration> {
        self.elaboration.as_ref()
    }
}

pub(crate) fn key_of(resource: &CachedResource) -> CacheKey {
    (resource.kind(), resource.identity().to_string())
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionCache {
    entries: IndexMap<CacheKey, Arc<CacheEntry>>,
    allow_duplicates: bool,
}

impl DefinitionCache {
    pub fn new(allow_duplicates: bool) -> Self {
        Self {
            entries: IndexMap::new(),
            allow_duplicates,
        }
    }

    pub fn allows_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// Check whether `resource` may be stored under the duplicate policy.
    ///
    /// Binaries are always replaceable.
    pub fn check(&self, resource: &CachedResource) -> Result<()> {
        self.check_key(&key_of(resource))
    }

    pub(crate) fn check_key(&self, key: &CacheKey) -> Result<()> {
        if self.allow_duplicates || key.0 == ResourceKind::Binary || !self.entries.contains_key(key)
        {
            Ok(())
        } else {
            Err(Error::DuplicateResource {
                kind: key.0,
                identity: key.1.clone(),
            })
        }
    }

    /// Store `resource`, applying the duplicate policy.
    ///
    /// When a duplicate is rejected the first resource stays in place.
    pub fn put(&mut self, resource: CachedResource) -> Result<()> {
        self.check(&resource)?;
        self.insert(resource);
        Ok(())
    }

    /// Store without a policy check. A replacement starts unelaborated.
    pub(crate) fn insert(&mut self, resource: CachedResource) {
        let key = key_of(&resource);
        self.entries.insert(key, Arc::new(CacheEntry::new(resource)));
    }

    /// Exact lookup
    pub fn get(&self, kind: ResourceKind, identity: &str) -> Option<&Arc<CacheEntry>> {
        self.entries.get(&(kind, identity.to_string()))
    }

    pub fn contains(&self, kind: ResourceKind, identity: &str) -> bool {
        self.get(kind, identity).is_some()
    }

    /// Entries of `kind` in insertion order.
    ///
    /// Each call starts a fresh iteration over the current contents.
    pub fn list_all(&self, kind: ResourceKind) -> impl Iterator<Item = &Arc<CacheEntry>> + '_ {
        self.entries
            .iter()
            .filter(move |(key, _)| key.0 == kind)
            .map(|(_, entry)| entry)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.list_all(kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_models::ValueSet;
    use serde_json::json;

    fn value_set(url: &str, name: &str) -> CachedResource {
        let vs: ValueSet = serde_json::from_value(json!({
            "resourceType": "ValueSet",
            "url": url,
            "name": name,
            "status": "active"
        }))
        .unwrap();
        CachedResource::new(format!("{}.json", name), Resource::ValueSet(Arc::new(vs)))
    }

    fn name_of(entry: &CacheEntry) -> Option<String> {
        match &entry.resource().content {
            Resource::ValueSet(vs) => vs.name.clone(),
            _ => None,
        }
    }

    #[test]
    fn rejected_duplicate_keeps_first() {
        let mut cache = DefinitionCache::new(false);
        cache.put(value_set("http://example.org/vs", "First")).unwrap();

        let err = cache.put(value_set("http://example.org/vs", "Second")).unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateResource { kind: ResourceKind::ValueSet, ref identity }
                if identity == "http://example.org/vs"
        ));
        let entry = cache.get(ResourceKind::ValueSet, "http://example.org/vs").unwrap();
        assert_eq!(name_of(entry).as_deref(), Some("First"));
    }

    #[test]
    fn allowed_duplicate_replaces_in_place() {
        let mut cache = DefinitionCache::new(true);
        cache.put(value_set("http://example.org/a", "A")).unwrap();
        cache.put(value_set("http://example.org/b", "B")).unwrap();
        cache.put(value_set("http://example.org/a", "A2")).unwrap();

        let names: Vec<_> = cache
            .list_all(ResourceKind::ValueSet)
            .filter_map(|e| name_of(e))
            .collect();
        assert_eq!(names, vec!["A2".to_string(), "B".to_string()]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn binaries_are_last_write_wins() {
        let mut cache = DefinitionCache::new(false);
        cache.put(CachedResource::binary("version.info", b"a".to_vec())).unwrap();
        cache.put(CachedResource::binary("version.info", b"b".to_vec())).unwrap();

        let entry = cache.get(ResourceKind::Binary, "version.info").unwrap();
        assert!(matches!(&entry.resource().content, Resource::Binary(b) if b.as_slice() == b"b"));
    }

    #[test]
    fn lookups_are_exact_and_listing_is_restartable() {
        let mut cache = DefinitionCache::new(false);
        cache.put(value_set("http://example.org/vs", "VS")).unwrap();

        assert!(cache.get(ResourceKind::ValueSet, "http://example.org/vs|1.0").is_none());
        assert!(cache.get(ResourceKind::CodeSystem, "http://example.org/vs").is_none());

        let listing = || cache.list_all(ResourceKind::ValueSet).count();
        assert_eq!(listing(), 1);
        assert_eq!(listing(), 1);
        assert_eq!(cache.count(ResourceKind::StructureDefinition), 0);
    }
}
