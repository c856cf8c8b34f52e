//! Loading definitions into a context
//!
//! Every load call stages its entries in a [`LoadBatch`] first. Duplicate
//! checks run against both the committed cache and the batch; the batch is
//! committed only after the last entry was dispatched, so a failing call
//! leaves the context exactly as it was.

use crate::cache::{key_of, CacheKey, DefinitionCache};
use crate::context::WorkerContext;
use crate::error::{Error, Result};
use crate::manifest::VersionManifest;
use crate::resource::{CachedResource, Resource, ResourceKind};
use hearth_format::{FormatError, ResourceFormat};
use hearth_models::Bundle;
use hearth_package::{FhirPackage, PackArchive, PackageResult, ROOT_FOLDER};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Entry name carrying the version manifest
pub const VERSION_INFO: &str = "version.info";

/// Package folder holding non-resource files
pub const OTHER_FOLDER: &str = "other";

/// A package the loader can read resources from.
pub trait PackageSource {
    /// Names of root-folder files whose resource type is one of `kinds`
    fn list_resources(&self, kinds: &[&str]) -> Vec<String>;

    fn load(&self, folder: &str, name: &str) -> PackageResult<Vec<u8>>;

    /// All file names in `folder`
    fn list(&self, folder: &str) -> Vec<String>;

    fn version(&self) -> &str;
}

impl PackageSource for FhirPackage {
    fn list_resources(&self, kinds: &[&str]) -> Vec<String> {
        FhirPackage::list_resources(self, kinds)
    }

    fn load(&self, folder: &str, name: &str) -> PackageResult<Vec<u8>> {
        FhirPackage::load(self, folder, name).map(<[u8]>::to_vec)
    }

    fn list(&self, folder: &str) -> Vec<String> {
        FhirPackage::list(self, folder)
    }

    fn version(&self) -> &str {
        FhirPackage::version(self)
    }
}

/// Turns entry bytes into a FHIR JSON value.
pub trait ResourceDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], format: ResourceFormat) -> std::result::Result<Value, FormatError>;
}

/// Decoder backed by `hearth-format`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl ResourceDecoder for StandardDecoder {
    fn decode(&self, bytes: &[u8], format: ResourceFormat) -> std::result::Result<Value, FormatError> {
        hearth_format::decode(bytes, format)
    }
}

/// Entries of one load call, not yet visible in the cache.
pub(crate) struct LoadBatch<'c> {
    cache: &'c DefinitionCache,
    decoder: &'c dyn ResourceDecoder,
    staged: IndexMap<CacheKey, CachedResource>,
    manifest: VersionManifest,
}

/// Result of a finished batch, ready to commit
pub(crate) struct Staged {
    resources: Vec<CachedResource>,
    manifest: VersionManifest,
}

impl<'c> LoadBatch<'c> {
    pub(crate) fn new(
        cache: &'c DefinitionCache,
        decoder: &'c dyn ResourceDecoder,
        manifest: &VersionManifest,
    ) -> Self {
        Self {
            cache,
            decoder,
            staged: IndexMap::new(),
            manifest: manifest.clone(),
        }
    }

    /// Dispatch one entry by its name.
    pub(crate) fn entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        match ResourceFormat::from_file_name(name) {
            Some(format) => self.resource_file(name, bytes, format),
            None if name == VERSION_INFO => self.version_info(bytes),
            None => self.binary(name, bytes),
        }
    }

    pub(crate) fn binary(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.stage(CachedResource::binary(name, bytes.to_vec()))
    }

    fn version_info(&mut self, bytes: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.manifest.apply_version_info(&text)?;
        self.binary(VERSION_INFO, bytes)
    }

    fn resource_file(&mut self, name: &str, bytes: &[u8], format: ResourceFormat) -> Result<()> {
        let value = self
            .decoder
            .decode(bytes, format)
            .map_err(|e| format_error(name, e))?;

        if hearth_models::resource_type_of(&value) == Some("Bundle") {
            let bundle: Bundle = serde_json::from_value(value).map_err(|e| format_error(name, e))?;
            return self.bundle(name, bundle);
        }

        self.resource(name, name, value)
    }

    fn bundle(&mut self, name: &str, bundle: Bundle) -> Result<()> {
        for (index, entry) in bundle.entry.into_iter().enumerate() {
            let Some(resource) = entry.resource else {
                continue;
            };
            let identity = match entry.full_url {
                Some(full_url) => full_url,
                None => {
                    debug!(file = name, index, "Unidentified resource in {} (no fullUrl)", name);
                    match (
                        hearth_models::resource_type_of(&resource),
                        resource.get("id").and_then(Value::as_str),
                    ) {
                        (Some(resource_type), Some(id)) => format!("{}/{}", resource_type, id),
                        _ => format!("{}#{}", name, index),
                    }
                }
            };
            self.resource(name, &identity, resource)?;
        }
        Ok(())
    }

    fn resource(&mut self, name: &str, identity: &str, value: Value) -> Result<()> {
        match Resource::from_value(value).map_err(|e| format_error(name, e))? {
            Some(content) => self.stage(CachedResource::new(identity, content)),
            None => {
                debug!(file = name, identity, "Skipping resource of an unsupported type");
                Ok(())
            }
        }
    }

    fn stage(&mut self, resource: CachedResource) -> Result<()> {
        let key = key_of(&resource);
        self.cache.check_key(&key)?;
        if !self.cache.allows_duplicates()
            && key.0 != ResourceKind::Binary
            && self.staged.contains_key(&key)
        {
            return Err(Error::DuplicateResource {
                kind: key.0,
                identity: key.1,
            });
        }
        debug!(kind = %key.0, identity = %key.1, "Staged resource");
        self.staged.insert(key, resource);
        Ok(())
    }

    pub(crate) fn finish(self) -> Staged {
        Staged {
            resources: self.staged.into_values().collect(),
            manifest: self.manifest,
        }
    }
}

fn format_error(name: &str, err: impl std::fmt::Display) -> Error {
    Error::Format {
        name: name.to_string(),
        message: err.to_string(),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Regular files of `dir` sorted by path
fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl WorkerContext {
    fn batch(&self) -> LoadBatch<'_> {
        LoadBatch::new(&self.cache, self.decoder.as_ref(), &self.manifest)
    }

    fn commit(&mut self, staged: Staged) -> usize {
        let count = staged.resources.len();
        for resource in staged.resources {
            self.cache.insert(resource);
        }
        self.manifest = staged.manifest;
        count
    }

    /// Load `(name, bytes)` entries, each dispatched by its name.
    ///
    /// Returns the number of cached entries. On error nothing is kept.
    pub fn ingest_entries<I, K, V>(&mut self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let mut batch = self.batch();
        for (name, bytes) in entries {
            batch.entry(name.as_ref(), bytes.as_ref())?;
        }
        let staged = batch.finish();
        Ok(self.commit(staged))
    }

    /// Load every entry of a zip pack read from `reader`.
    pub fn ingest_archive<R: Read + Seek>(&mut self, reader: R) -> Result<usize> {
        let archive = PackArchive::from_reader(reader)?;
        self.ingest_pack(&archive)
    }

    pub fn ingest_pack(&mut self, archive: &PackArchive) -> Result<usize> {
        let count = self.ingest_entries(archive.entries())?;
        info!(
            entries = count,
            version = self.manifest.version().unwrap_or("unknown"),
            "Loaded definitions pack"
        );
        Ok(count)
    }

    /// Load a zip pack from disk, e.g. `definitions.xml.zip`.
    pub fn load_pack(&mut self, path: &Path) -> Result<usize> {
        debug!(path = %path.display(), "Opening definitions pack");
        let archive = PackArchive::open(path)?;
        self.ingest_pack(&archive)
    }

    /// Load the root-folder resources of `package` whose type is in `kinds`,
    /// then record the package version.
    pub fn ingest_package<P>(&mut self, package: &P, kinds: &[ResourceKind]) -> Result<usize>
    where
        P: PackageSource + ?Sized,
    {
        let types: Vec<&str> = kinds.iter().map(ResourceKind::as_str).collect();
        let mut batch = self.batch();
        for name in package.list_resources(&types) {
            let bytes = package.load(ROOT_FOLDER, &name)?;
            batch.entry(&name, &bytes)?;
        }
        let mut staged = batch.finish();
        staged.manifest.set_version(package.version());

        let count = self.commit(staged);
        info!(
            entries = count,
            version = package.version(),
            "Loaded package"
        );
        Ok(count)
    }

    /// [`ingest_package`](Self::ingest_package) with the definitional kinds
    pub fn load_package<P>(&mut self, package: &P) -> Result<usize>
    where
        P: PackageSource + ?Sized,
    {
        self.ingest_package(package, &ResourceKind::DEFINITIONAL)
    }

    /// Load one file, dispatched by its file name.
    pub fn load_from_file(&mut self, path: &Path) -> Result<usize> {
        let bytes = fs::read(path)?;
        self.ingest_entries([(file_name(path), bytes)])
    }

    /// Load the `.json` and `.xml` files of `dir`.
    ///
    /// A file that cannot be loaded is skipped with a warning.
    pub fn load_from_folder(&mut self, dir: &Path) -> Result<usize> {
        let mut count = 0;
        for path in sorted_files(dir)? {
            if ResourceFormat::from_file_name(&file_name(&path)).is_none() {
                continue;
            }
            match self.load_from_file(&path) {
                Ok(loaded) => count += loaded,
                Err(err) => warn!(
                    file = %path.display(),
                    error = %err,
                    "Skipping file that could not be loaded"
                ),
            }
        }
        info!(dir = %dir.display(), entries = count, "Loaded definitions folder");
        Ok(count)
    }

    /// Store every file of `dir` as a binary.
    pub fn load_binaries_from_folder(&mut self, dir: &Path) -> Result<usize> {
        let mut batch = self.batch();
        for path in sorted_files(dir)? {
            let bytes = fs::read(&path)?;
            batch.binary(&file_name(&path), &bytes)?;
        }
        let staged = batch.finish();
        Ok(self.commit(staged))
    }

    /// Store every file of the package's `other` folder as a binary.
    pub fn load_binaries_from_package<P>(&mut self, package: &P) -> Result<usize>
    where
        P: PackageSource + ?Sized,
    {
        let mut batch = self.batch();
        for name in package.list(OTHER_FOLDER) {
            let bytes = package.load(OTHER_FOLDER, &name)?;
            batch.binary(&name, &bytes)?;
        }
        let staged = batch.finish();
        Ok(self.commit(staged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextConfig;
    use serde_json::json;

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn value_set(url: &str) -> Value {
        json!({
            "resourceType": "ValueSet",
            "url": url,
            "name": "VS",
            "status": "active"
        })
    }

    #[test]
    fn dispatches_by_entry_name() {
        let mut context = WorkerContext::new(ContextConfig::default());
        let count = context
            .ingest_entries([
                ("vs.json", bytes(value_set("http://example.org/vs"))),
                ("version.info", b"version=4.0.1\nrevision=abc\n".to_vec()),
                ("readme.txt", b"hello".to_vec()),
            ])
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(context.version(), Some("4.0.1"));
        assert_eq!(context.revision(), Some("abc"));
        assert!(context.binary("version.info").is_some());
        assert_eq!(context.binary("readme.txt").as_deref().map(Vec::as_slice), Some(&b"hello"[..]));
        assert!(context.value_set("http://example.org/vs").is_some());
    }

    #[test]
    fn bundle_entries_are_cached_individually() {
        let bundle = json!({
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                { "fullUrl": "http://example.org/vs/a", "resource": value_set("http://example.org/a") },
                { "resource": value_set("http://example.org/b") },
                { "resource": { "resourceType": "Patient", "id": "p" } }
            ]
        });
        let mut context = WorkerContext::new(ContextConfig::default());

        let count = context.ingest_entries([("bundle.json", bytes(bundle))]).unwrap();

        assert_eq!(count, 2);
        assert_eq!(context.count(ResourceKind::ValueSet), 2);
    }

    #[test]
    fn staged_duplicates_are_rejected() {
        let mut context = WorkerContext::new(ContextConfig::default());
        let err = context
            .ingest_entries([
                ("a.json", bytes(value_set("http://example.org/vs"))),
                ("b.json", bytes(value_set("http://example.org/vs"))),
            ])
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateResource { kind: ResourceKind::ValueSet, .. }));
        assert!(context.is_empty());
    }

    #[test]
    fn decode_failure_names_the_entry() {
        let mut context = WorkerContext::new(ContextConfig::default());
        let err = context
            .ingest_entries([("broken.xml", b"<ValueSet".to_vec())])
            .unwrap_err();

        assert!(matches!(err, Error::Format { ref name, .. } if name == "broken.xml"));
    }
}
