//! FHIR package containers.
//!
//! Two on-disk shapes are supported:
//!
//! - NPM packages (`.tgz`, or an unpacked `package/` directory) with a
//!   `package.json` manifest and an optional `.index.json`. See [`FhirPackage`].
//! - Flat zip packs of definitions (`definitions.xml.zip` style). See [`PackArchive`].
//!
//! Both keep the raw bytes of each file; decoding is left to the caller.

mod archive;

pub use archive::{PackArchive, PackEntry};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use thiserror::Error;

pub type PackageName = String;
pub type Version = String;
pub type VersionReference = String;
pub type Url = String;

/// Folder holding the package's conformance resources.
pub const ROOT_FOLDER: &str = "package";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// FHIR NPM Package manifest (`package/package.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: PackageName,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_versions: Vec<String>,
    #[serde(default)]
    pub dependencies: HashMap<PackageName, VersionReference>,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Package index (`.index.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
    #[serde(rename = "index-version")]
    pub index_version: u8,
    pub files: Vec<IndexedFile>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// File entry in package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub filename: String,
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),
    #[error("Missing file: {0}")]
    MissingFile(String),
}

pub type PackageResult<T> = Result<T, PackageError>;

/// Loaded FHIR NPM package.
///
/// Files are grouped by folder: the package root is [`ROOT_FOLDER`], and
/// `package/other/x` lives in folder `other`. Names within a folder are sorted.
#[derive(Debug, Clone)]
pub struct FhirPackage {
    pub manifest: PackageManifest,
    pub index: Option<PackageIndex>,
    folders: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl FhirPackage {
    /// Load package from tar.gz reader.
    pub fn from_tar_gz<R: Read>(reader: R) -> PackageResult<Self> {
        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut folders: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().replace('\\', "/");
            let Some((folder, name)) = split_package_path(&path) else {
                continue;
            };
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            folders.entry(folder).or_default().insert(name, contents);
        }

        Self::from_folders(folders)
    }

    /// Load package from tar.gz bytes.
    pub fn from_tar_gz_bytes(bytes: &[u8]) -> PackageResult<Self> {
        Self::from_tar_gz(std::io::Cursor::new(bytes))
    }

    /// Load package from an unpacked `package/` directory.
    ///
    /// Files directly in the directory form the root folder; each
    /// subdirectory one level down becomes a folder of its own.
    pub fn from_directory(package_dir: &Path) -> PackageResult<Self> {
        let mut folders: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();

        for entry in fs::read_dir(package_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                let Some(folder) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let files = read_flat_dir(&path)?;
                folders.insert(folder.to_string(), files);
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                folders
                    .entry(ROOT_FOLDER.to_string())
                    .or_default()
                    .insert(name.to_string(), fs::read(&path)?);
            }
        }

        Self::from_folders(folders)
    }

    fn from_folders(folders: BTreeMap<String, BTreeMap<String, Vec<u8>>>) -> PackageResult<Self> {
        let root = folders.get(ROOT_FOLDER);
        let manifest = root
            .and_then(|files| files.get("package.json"))
            .ok_or_else(|| PackageError::MissingFile("package/package.json".to_string()))
            .and_then(|bytes| parse_json::<PackageManifest>(bytes))?;

        let index = root
            .and_then(|files| files.get(".index.json"))
            .and_then(|bytes| parse_json::<PackageIndex>(bytes).ok());

        Ok(Self {
            manifest,
            index,
            folders,
        })
    }

    /// Package version from the manifest.
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Names of files in the root folder whose `resourceType` is one of `kinds`.
    ///
    /// Uses `.index.json` when the package has one, otherwise reads each JSON file.
    pub fn list_resources(&self, kinds: &[&str]) -> Vec<String> {
        if let Some(index) = &self.index {
            return index
                .files
                .iter()
                .filter(|f| kinds.contains(&f.resource_type.as_str()))
                .map(|f| f.filename.clone())
                .collect();
        }

        let Some(files) = self.folders.get(ROOT_FOLDER) else {
            return Vec::new();
        };
        files
            .iter()
            .filter(|(name, _)| is_resource_file(name))
            .filter(|(_, bytes)| {
                sniff_resource_type(bytes).is_some_and(|rt| kinds.contains(&rt.as_str()))
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of all files in `folder`.
    pub fn list(&self, folder: &str) -> Vec<String> {
        self.folders
            .get(folder)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw bytes of `folder/name`.
    pub fn load(&self, folder: &str, name: &str) -> PackageResult<&[u8]> {
        self.folders
            .get(folder)
            .and_then(|files| files.get(name))
            .map(Vec::as_slice)
            .ok_or_else(|| PackageError::MissingFile(format!("{}/{}", folder, name)))
    }
}

fn split_package_path(path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix("package/")?;
    match rest.rsplit_once('/') {
        Some((folder, name)) if !name.is_empty() => Some((folder.to_string(), name.to_string())),
        Some(_) => None,
        None => Some((ROOT_FOLDER.to_string(), rest.to_string())),
    }
}

fn read_flat_dir(dir: &Path) -> PackageResult<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.insert(name.to_string(), fs::read(&path)?);
        }
    }
    Ok(files)
}

fn is_resource_file(name: &str) -> bool {
    name.ends_with(".json") && name != "package.json" && name != ".index.json"
}

fn sniff_resource_type(bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Sniff {
        #[serde(rename = "resourceType")]
        resource_type: Option<String>,
    }
    parse_json::<Sniff>(bytes).ok()?.resource_type
}

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> PackageResult<T> {
    let cleaned = clean_bytes(bytes)?;
    Ok(serde_json::from_str(&cleaned)?)
}

fn clean_bytes(bytes: &[u8]) -> PackageResult<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let content = std::str::from_utf8(bytes)
        .map_err(|e| PackageError::InvalidStructure(format!("Invalid UTF-8: {}", e)))?;

    Ok(content
        .chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\x7F'))
        .collect::<String>()
        .trim()
        .to_string())
}
