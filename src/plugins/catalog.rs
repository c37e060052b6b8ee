// Copyright (c) 2026 Space Data Network Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0

//! `catalog.json` loading: validate every entry, confine its paths to
//! the plugin root, and checksum its bundle on load (I5, P7). An
//! invalid entry fails the whole load — fail-closed, like the teacher's
//! peer registry load.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

fn default_required_scope() -> String {
    "orbpro:base".to_string()
}
fn default_content_type() -> String {
    "application/wasm".to_string()
}
fn default_cache_control() -> String {
    "public, max-age=300, stale-while-revalidate=3600".to_string()
}

#[derive(Deserialize)]
struct RawAsset {
    id: String,
    version: String,
    #[serde(default)]
    required_scope: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    cache_control: Option<String>,
    encrypted_path: String,
    key_path: String,
}

/// A validated, checksummed plugin catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginAsset {
    /// Plugin identifier; matches `[A-Za-z0-9._-]+`.
    pub id: String,
    /// Plugin version string (opaque, non-empty).
    pub version: String,
    /// OAuth-style scope a capability claim must carry to fetch this plugin.
    pub required_scope: String,
    /// MIME type served for the bundle.
    pub content_type: String,
    /// `Cache-Control` header value served with the bundle.
    pub cache_control: String,
    /// Hex SHA-256 of the bundle file, computed at load time.
    pub bundle_sha256: String,
    /// Size of the bundle file in bytes, at load time.
    pub size_bytes: u64,
    /// Resolved, root-confined path to the encrypted bundle.
    pub encrypted_path: PathBuf,
    /// Resolved, root-confined path to the bundle's key file.
    pub key_path: PathBuf,
}

/// Catalog load errors. Any single bad entry fails the whole load.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file itself could not be read or parsed.
    #[error("catalog unreadable: {0}")]
    Unreadable(String),
    /// An entry's `id` did not match `[A-Za-z0-9._-]+`.
    #[error("invalid plugin id: {0}")]
    InvalidId(String),
    /// An entry's `version` was empty.
    #[error("empty version for plugin {0}")]
    EmptyVersion(String),
    /// A resolved path escaped the configured plugin root.
    #[error("path escapes plugin root for plugin {0}")]
    PathEscapesRoot(String),
    /// A resolved path pointed at a directory instead of a file.
    #[error("path is a directory for plugin {0}")]
    IsDirectory(String),
    /// Stat or read of an asset's files failed.
    #[error("io error for plugin {0}: {1}")]
    Io(String, String),
}

fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}

/// Join `rel` onto `root` and reject the result if, after lexical
/// cleaning, it would resolve outside `root`. Pure path arithmetic —
/// does not require either path to exist.
fn confine(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(rel).components() {
        use std::path::Component::*;
        match component {
            Normal(part) => resolved.push(part),
            CurDir => {}
            ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            RootDir | Prefix(_) => return None,
        }
    }
    resolved.starts_with(root).then_some(resolved)
}

fn checksum_and_size(path: &Path, plugin_id: &str) -> Result<(String, u64), CatalogError> {
    let metadata =
        std::fs::metadata(path).map_err(|e| CatalogError::Io(plugin_id.to_string(), e.to_string()))?;
    if metadata.is_dir() {
        return Err(CatalogError::IsDirectory(plugin_id.to_string()));
    }
    let bytes = std::fs::read(path).map_err(|e| CatalogError::Io(plugin_id.to_string(), e.to_string()))?;
    Ok((hex::encode(Sha256::digest(&bytes)), metadata.len()))
}

/// The loaded, checksummed catalog. Re-`load` to refresh from disk.
#[derive(Default)]
pub struct PluginCatalog {
    assets: HashMap<String, PluginAsset>,
}

impl PluginCatalog {
    /// Load and validate `catalog.json` under `root`. Fails closed: any
    /// single invalid entry aborts the entire load.
    pub fn load(root: &Path) -> Result<Self, CatalogError> {
        let catalog_path = root.join("catalog.json");
        let raw = std::fs::read_to_string(&catalog_path).map_err(|e| CatalogError::Unreadable(e.to_string()))?;
        let entries: Vec<RawAsset> =
            serde_json::from_str(&raw).map_err(|e| CatalogError::Unreadable(e.to_string()))?;

        let mut assets = HashMap::with_capacity(entries.len());
        for entry in entries {
            if !valid_id(&entry.id) {
                return Err(CatalogError::InvalidId(entry.id));
            }
            if entry.version.trim().is_empty() {
                return Err(CatalogError::EmptyVersion(entry.id));
            }

            let encrypted_path =
                confine(root, &entry.encrypted_path).ok_or_else(|| CatalogError::PathEscapesRoot(entry.id.clone()))?;
            let key_path =
                confine(root, &entry.key_path).ok_or_else(|| CatalogError::PathEscapesRoot(entry.id.clone()))?;

            let (bundle_sha256, size_bytes) = checksum_and_size(&encrypted_path, &entry.id)?;
            let key_metadata =
                std::fs::metadata(&key_path).map_err(|e| CatalogError::Io(entry.id.clone(), e.to_string()))?;
            if key_metadata.is_dir() {
                return Err(CatalogError::IsDirectory(entry.id));
            }

            let asset = PluginAsset {
                id: entry.id.clone(),
                version: entry.version,
                required_scope: entry.required_scope.unwrap_or_else(default_required_scope),
                content_type: entry.content_type.unwrap_or_else(default_content_type),
                cache_control: entry.cache_control.unwrap_or_else(default_cache_control),
                bundle_sha256,
                size_bytes,
                encrypted_path,
                key_path,
            };
            assets.insert(entry.id, asset);
        }

        Ok(Self { assets })
    }

    /// Look up a loaded asset by id.
    pub fn get(&self, id: &str) -> Option<&PluginAsset> {
        self.assets.get(id)
    }

    /// Every loaded asset, for `GET /plugins/manifest`.
    pub fn manifest(&self) -> Vec<&PluginAsset> {
        let mut out: Vec<&PluginAsset> = self.assets.values().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Re-read an asset's bundle bytes and verify its checksum still
    /// matches what was recorded at load time (I5: a mismatch is a
    /// storage fault, never a silent pass-through).
    pub fn read_bundle_verified(&self, asset: &PluginAsset) -> Result<Vec<u8>, CatalogError> {
        let bytes = std::fs::read(&asset.encrypted_path)
            .map_err(|e| CatalogError::Io(asset.id.clone(), e.to_string()))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        if digest != asset.bundle_sha256 {
            return Err(CatalogError::Io(asset.id.clone(), "bundle checksum mismatch since load".to_string()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn loads_valid_catalog_and_checksums_bundle() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "bundles/demo.wasm.enc", b"ciphertext-bytes");
        write(root, "bundles/demo.key", b"01234567890123456789012345678901");
        write(
            root,
            "catalog.json",
            br#"[{"id":"demo","version":"1.0.0","encrypted_path":"bundles/demo.wasm.enc","key_path":"bundles/demo.key"}]"#,
        );

        let catalog = PluginCatalog::load(root).unwrap();
        let asset = catalog.get("demo").unwrap();
        assert_eq!(asset.required_scope, "orbpro:base");
        assert_eq!(asset.content_type, "application/wasm");
        assert_eq!(asset.bundle_sha256, hex::encode(Sha256::digest(b"ciphertext-bytes")));
        assert_eq!(asset.size_bytes, "ciphertext-bytes".len() as u64);
    }

    #[test]
    fn rejects_invalid_id() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "bundles/demo.wasm.enc", b"x");
        write(root, "bundles/demo.key", b"x");
        write(
            root,
            "catalog.json",
            br#"[{"id":"bad id!","version":"1.0.0","encrypted_path":"bundles/demo.wasm.enc","key_path":"bundles/demo.key"}]"#,
        );
        assert!(matches!(PluginCatalog::load(root), Err(CatalogError::InvalidId(_))));
    }

    #[test]
    fn rejects_path_escaping_root() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "catalog.json",
            br#"[{"id":"demo","version":"1.0.0","encrypted_path":"../outside.enc","key_path":"bundles/demo.key"}]"#,
        );
        assert!(matches!(PluginCatalog::load(root), Err(CatalogError::PathEscapesRoot(_))));
    }

    #[test]
    fn rejects_missing_version() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "bundles/demo.wasm.enc", b"x");
        write(root, "bundles/demo.key", b"x");
        write(
            root,
            "catalog.json",
            br#"[{"id":"demo","version":"","encrypted_path":"bundles/demo.wasm.enc","key_path":"bundles/demo.key"}]"#,
        );
        assert!(matches!(PluginCatalog::load(root), Err(CatalogError::EmptyVersion(_))));
    }

    #[test]
    fn manifest_is_sorted_by_id() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "bundles/b.enc", b"x");
        write(root, "bundles/b.key", b"x");
        write(root, "bundles/a.enc", b"y");
        write(root, "bundles/a.key", b"y");
        write(
            root,
            "catalog.json",
            br#"[
                {"id":"b","version":"1","encrypted_path":"bundles/b.enc","key_path":"bundles/b.key"},
                {"id":"a","version":"1","encrypted_path":"bundles/a.enc","key_path":"bundles/a.key"}
            ]"#,
        );
        let catalog = PluginCatalog::load(root).unwrap();
        let ids: Vec<&str> = catalog.manifest().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
