//! The worker context
//!
//! A [`WorkerContext`] owns the definition cache, the version manifest and
//! the collaborators used to fill it (a [`ResourceDecoder`]) and to elaborate
//! StructureDefinitions (a [`SnapshotGenerator`]). Loading takes `&mut self`;
//! every read takes `&self` and may be shared across threads.
//!
//! StructureDefinitions come in two flavours of access:
//!
//! - lenient ([`get_structure_definition`](WorkerContext::get_structure_definition),
//!   [`list_all`](WorkerContext::list_all), [`all_structures`](WorkerContext::all_structures)):
//!   a definition whose snapshot cannot be generated is returned as loaded and
//!   the failure is logged
//! - strict ([`generate_snapshot`](WorkerContext::generate_snapshot),
//!   [`all_structures_strict`](WorkerContext::all_structures_strict)): the
//!   failure is returned

use crate::cache::{CacheEntry, DefinitionCache};
use crate::config::ContextConfig;
use crate::error::{DefinitionError, Result};
use crate::loader::{PackageSource, ResourceDecoder, StandardDecoder};
use crate::manifest::VersionManifest;
use crate::resource::{Resource, ResourceKind};
use crate::snapshot::{structure_parts, Materializer};
use hearth_models::{
    CodeSystem, StructureDefinition, StructureDefinitionKind, StructureMap, ValueSet,
};
use hearth_package::PackArchive;
use hearth_snapshot::{DifferentialMerger, SnapshotGenerator};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Canonical URL prefix of the core definitions
pub const CORE_STRUCTURE_PREFIX: &str = "http://hl7.org/fhir/StructureDefinition/";

#[derive(Clone)]
pub struct WorkerContext {
    pub(crate) config: ContextConfig,
    pub(crate) cache: DefinitionCache,
    pub(crate) manifest: VersionManifest,
    pub(crate) decoder: Arc<dyn ResourceDecoder>,
    pub(crate) generator: Arc<dyn SnapshotGenerator>,
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("config", &self.config)
            .field("manifest", &self.manifest)
            .field("entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Default for WorkerContext {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl WorkerContext {
    /// An empty context using [`StandardDecoder`] and [`DifferentialMerger`].
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            cache: DefinitionCache::new(config.allow_loading_duplicates),
            manifest: VersionManifest::default(),
            decoder: Arc::new(StandardDecoder),
            generator: Arc::new(DifferentialMerger::new()),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ResourceDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the merge routine used for definitions elaborated from now on
    pub fn with_snapshot_generator(mut self, generator: Arc<dyn SnapshotGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Context loaded from a zip pack on disk
    pub fn from_pack(path: &Path, config: ContextConfig) -> Result<Self> {
        let mut context = Self::new(config);
        context.load_pack(path)?;
        Ok(context)
    }

    /// Context loaded from a zip pack already in memory
    pub fn from_archive(archive: &PackArchive, config: ContextConfig) -> Result<Self> {
        let mut context = Self::new(config);
        context.ingest_pack(archive)?;
        Ok(context)
    }

    /// Context loaded with the definitional resources of a package
    pub fn from_package<P>(package: &P, config: ContextConfig) -> Result<Self>
    where
        P: PackageSource + ?Sized,
    {
        let mut context = Self::new(config);
        context.load_package(package)?;
        Ok(context)
    }

    /// Context loaded from named entries, e.g. `("patient.xml", bytes)`
    pub fn from_definitions<I, K, V>(definitions: I, config: ContextConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut context = Self::new(config);
        context.ingest_entries(definitions)?;
        Ok(context)
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn cache(&self) -> &DefinitionCache {
        &self.cache
    }

    pub fn manifest(&self) -> &VersionManifest {
        &self.manifest
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest.version()
    }

    pub fn revision(&self) -> Option<&str> {
        self.manifest.revision()
    }

    pub fn date(&self) -> Option<&str> {
        self.manifest.date()
    }

    fn materializer(&self) -> Materializer<'_> {
        Materializer::new(&self.cache, self.generator.as_ref(), self.config.policy())
    }

    /// Elaborated form of a StructureDefinition entry; `None` for other kinds
    fn elaborate(
        &self,
        entry: &CacheEntry,
    ) -> Option<std::result::Result<Arc<StructureDefinition>, DefinitionError>> {
        let (raw, elaboration) = structure_parts(entry)?;
        Some(self.materializer().materialize(raw, elaboration))
    }

    /// Elaborated form, or the definition as loaded when elaboration failed
    fn elaborate_lenient(&self, entry: &CacheEntry) -> Option<Arc<StructureDefinition>> {
        let (raw, _) = structure_parts(entry)?;
        match self.elaborate(entry)? {
            Ok(sd) => Some(sd),
            Err(err) => {
                warn!(profile = %raw.url, error = %err, "Unable to generate snapshot");
                Some(Arc::clone(raw))
            }
        }
    }

    fn resolve(&self, entry: &CacheEntry) -> Resource {
        match self.elaborate_lenient(entry) {
            Some(sd) => Resource::StructureDefinition(sd),
            None => entry.resource().content.clone(),
        }
    }

    /// Resource of `kind` with the exact canonical URL (or name) `url`.
    ///
    /// StructureDefinitions are elaborated on first access; see
    /// [`get_structure_definition`](Self::get_structure_definition).
    pub fn get(&self, kind: ResourceKind, url: &str) -> Option<Resource> {
        self.cache.get(kind, url).map(|entry| self.resolve(entry))
    }

    /// The StructureDefinition with canonical URL `url`, with its snapshot
    /// generated on first access.
    ///
    /// When generation fails a warning is logged and the definition is
    /// returned as loaded. The failure is kept; later calls do not retry.
    pub fn get_structure_definition(&self, url: &str) -> Option<Arc<StructureDefinition>> {
        let entry = self.cache.get(ResourceKind::StructureDefinition, url)?;
        self.elaborate_lenient(entry)
    }

    /// Like [`get_structure_definition`](Self::get_structure_definition), but a
    /// generation failure is returned as an error.
    pub fn generate_snapshot(&self, url: &str) -> Result<Option<Arc<StructureDefinition>>> {
        let Some(entry) = self.cache.get(ResourceKind::StructureDefinition, url) else {
            return Ok(None);
        };
        match self.elaborate(entry) {
            Some(outcome) => Ok(Some(outcome?)),
            None => Ok(None),
        }
    }

    pub fn value_set(&self, url: &str) -> Option<Arc<ValueSet>> {
        match &self.cache.get(ResourceKind::ValueSet, url)?.resource().content {
            Resource::ValueSet(vs) => Some(Arc::clone(vs)),
            _ => None,
        }
    }

    pub fn code_system(&self, url: &str) -> Option<Arc<CodeSystem>> {
        match &self.cache.get(ResourceKind::CodeSystem, url)?.resource().content {
            Resource::CodeSystem(cs) => Some(Arc::clone(cs)),
            _ => None,
        }
    }

    pub fn structure_map(&self, url: &str) -> Option<Arc<StructureMap>> {
        match &self.cache.get(ResourceKind::StructureMap, url)?.resource().content {
            Resource::StructureMap(map) => Some(Arc::clone(map)),
            _ => None,
        }
    }

    /// Resources of `kind` in load order.
    ///
    /// The iterator is lazy: StructureDefinitions are elaborated as they are
    /// reached. Every call starts over.
    pub fn list_all(&self, kind: ResourceKind) -> impl Iterator<Item = Resource> + '_ {
        self.cache.list_all(kind).map(move |entry| self.resolve(entry))
    }

    /// Every StructureDefinition, elaborated where possible
    pub fn all_structures(&self) -> Vec<Arc<StructureDefinition>> {
        self.cache
            .list_all(ResourceKind::StructureDefinition)
            .filter_map(|entry| self.elaborate_lenient(entry))
            .collect()
    }

    /// Every StructureDefinition, elaborated; the first failure is returned.
    pub fn all_structures_strict(&self) -> Result<Vec<Arc<StructureDefinition>>> {
        let mut structures = Vec::new();
        for entry in self.cache.list_all(ResourceKind::StructureDefinition) {
            if let Some(outcome) = self.elaborate(entry) {
                structures.push(outcome?);
            }
        }
        Ok(structures)
    }

    /// Stored binaries as `(name, bytes)` in load order
    pub fn binaries(&self) -> impl Iterator<Item = (&str, &Arc<Vec<u8>>)> + '_ {
        self.cache
            .list_all(ResourceKind::Binary)
            .filter_map(|entry| match &entry.resource().content {
                Resource::Binary(bytes) => Some((entry.resource().identity(), bytes)),
                _ => None,
            })
    }

    pub fn binary(&self, name: &str) -> Option<Arc<Vec<u8>>> {
        match &self.cache.get(ResourceKind::Binary, name)?.resource().content {
            Resource::Binary(bytes) => Some(Arc::clone(bytes)),
            _ => None,
        }
    }

    /// Raw StructureDefinitions as loaded, without elaboration
    fn raw_structures(&self) -> impl Iterator<Item = &Arc<StructureDefinition>> + '_ {
        self.cache
            .list_all(ResourceKind::StructureDefinition)
            .filter_map(|entry| structure_parts(entry).map(|(raw, _)| raw))
    }

    /// Sorted names of the resource types this context defines
    pub fn resource_names(&self) -> Vec<String> {
        self.specialization_names(|sd| sd.kind == StructureDefinitionKind::Resource)
    }

    /// Sorted names of all non-logical types this context defines
    pub fn type_names(&self) -> Vec<String> {
        self.specialization_names(|sd| sd.kind != StructureDefinitionKind::Logical)
    }

    fn specialization_names(&self, filter: impl Fn(&StructureDefinition) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .raw_structures()
            .filter(|sd| sd.is_specialization() && filter(sd))
            .map(|sd| sd.name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Whether `name` is a core resource type
    pub fn is_resource(&self, name: &str) -> bool {
        let url = format!("{}{}", CORE_STRUCTURE_PREFIX, name);
        match self.get_structure_definition(&url) {
            Some(sd) => !sd.is_constraint() && sd.kind == StructureDefinitionKind::Resource,
            None => false,
        }
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.cache.count(kind)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
