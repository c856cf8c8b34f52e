//! StructureMap lookups by source structure.

use crate::context::WorkerContext;
use crate::resource::{Resource, ResourceKind};
use hearth_models::StructureMap;
use std::sync::Arc;

/// Whether every source structure of `map` is `url`, and there is at least one
fn transforms_from(map: &StructureMap, url: &str) -> bool {
    let mut sources = map.sources().peekable();
    sources.peek().is_some() && sources.all(|structure| structure.url == url)
}

impl WorkerContext {
    /// StructureMaps whose source structures are all bound to `url`, in
    /// cache order.
    pub fn find_transforms_for_source(&self, url: &str) -> Vec<Arc<StructureMap>> {
        self.structure_maps()
            .filter(|map| transforms_from(map, url))
            .collect()
    }

    /// Canonical URLs of all cached StructureMaps, sorted and comma separated
    pub fn list_map_urls(&self) -> String {
        let mut urls: Vec<String> = self.structure_maps().map(|map| map.url.clone()).collect();
        urls.sort();
        urls.join(",")
    }

    fn structure_maps(&self) -> impl Iterator<Item = Arc<StructureMap>> + '_ {
        self.cache
            .list_all(ResourceKind::StructureMap)
            .filter_map(|entry| match &entry.resource().content {
                Resource::StructureMap(map) => Some(Arc::clone(map)),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(structures: serde_json::Value) -> StructureMap {
        serde_json::from_value(json!({
            "resourceType": "StructureMap",
            "url": "http://example.org/map",
            "name": "M",
            "status": "active",
            "structure": structures
        }))
        .unwrap()
    }

    #[test]
    fn all_sources_must_match() {
        let single = map(json!([
            { "url": "http://example.org/a", "mode": "source" },
            { "url": "http://example.org/b", "mode": "target" }
        ]));
        let mixed = map(json!([
            { "url": "http://example.org/a", "mode": "source" },
            { "url": "http://example.org/c", "mode": "source" }
        ]));

        assert!(transforms_from(&single, "http://example.org/a"));
        assert!(!transforms_from(&single, "http://example.org/b"));
        assert!(!transforms_from(&mixed, "http://example.org/a"));
    }

    #[test]
    fn maps_without_sources_never_match() {
        let targets_only = map(json!([{ "url": "http://example.org/a", "mode": "target" }]));
        assert!(!transforms_from(&targets_only, "http://example.org/a"));
    }
}
