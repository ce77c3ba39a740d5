//! Sidecar state persisted on top of the storage backend.
//!
//! Locks, dead properties, collection orderings and version history live as
//! JSON (plus version blobs) under the reserved `_dav/` tree, keyed by a
//! filename-safe encoding of the resource path. Reads are best-effort: a
//! missing or unparsable record behaves as the empty record. Writes go
//! through a per-(kind, path) mutex so that read-modify-write cycles on one
//! record do not interleave; write failures propagate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::davpath::DavPath;
use crate::fs::{FsResult, PersistAdapter};
use crate::util::now_rfc3339;

/// Dead properties: prefix-qualified name to textual value.
pub type PropMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub token: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OrderRecord {
    names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    pub size: u64,
    pub mime: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VersionMeta {
    versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone)]
pub struct DavStateStore {
    fs: Box<dyn PersistAdapter>,
    // serializes writers per (kind, path) record.
    keymux: Arc<parking_lot::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

fn sidecar(kind: &str, key: &str) -> DavPath {
    DavPath::new(vec!["_dav".to_string(), kind.to_string(), format!("{}.json", key)])
}

fn version_dir(key: &str) -> DavPath {
    DavPath::new(vec!["_dav".to_string(), "versions".to_string(), key.to_string()])
}

impl DavStateStore {
    pub fn new(fs: Box<dyn PersistAdapter>) -> DavStateStore {
        DavStateStore {
            fs,
            keymux: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    async fn guard(&self, kind: &str, path: &DavPath) -> tokio::sync::OwnedMutexGuard<()> {
        let mux = {
            let mut map = self.keymux.lock();
            map.entry(format!("{}:{}", kind, path.sidecar_key()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        mux.lock_owned().await
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, p: &DavPath) -> T {
        match self.fs.read_file(p).await {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_default(),
            Err(_) => T::default(),
        }
    }

    async fn write_json<T: Serialize>(&self, p: &DavPath, value: &T) -> FsResult<()> {
        self.fs.ensure_dir(&p.parent()).await?;
        let data = serde_json::to_vec(value).unwrap_or_default();
        self.fs.write_file(p, Bytes::from(data), Some("application/json")).await
    }

    // ----- locks -----

    pub async fn get_lock(&self, path: &DavPath) -> Option<LockRecord> {
        let p = sidecar("locks", &path.sidecar_key());
        let rec: Option<LockRecord> = match self.fs.read_file(&p).await {
            Ok(data) => serde_json::from_slice(&data).ok(),
            Err(_) => None,
        };
        rec
    }

    pub async fn set_lock(&self, path: &DavPath, token: &str) -> FsResult<LockRecord> {
        let _g = self.guard("locks", path).await;
        let rec = LockRecord {
            token: token.to_string(),
            updated_at: now_rfc3339(),
        };
        self.write_json(&sidecar("locks", &path.sidecar_key()), &rec).await?;
        Ok(rec)
    }

    /// Returns true if no lock existed or the token matched (lock removed).
    pub async fn release_lock(&self, path: &DavPath, token: Option<&str>) -> FsResult<bool> {
        let _g = self.guard("locks", path).await;
        let existing = self.get_lock(path).await;
        match existing {
            None => Ok(true),
            Some(rec) => {
                if token == Some(rec.token.as_str()) {
                    let p = sidecar("locks", &path.sidecar_key());
                    self.fs.remove(&p, false).await.ok();
                    Ok(true)
                } else {
                    Ok(false)
                }
            },
        }
    }

    // ----- dead properties -----

    pub async fn get_props(&self, path: &DavPath) -> PropMap {
        self.read_json(&sidecar("props", &path.sidecar_key())).await
    }

    pub async fn merge_props(
        &self,
        path: &DavPath,
        set: &PropMap,
        remove: &[String],
    ) -> FsResult<PropMap> {
        let _g = self.guard("props", path).await;
        let mut props = self.get_props(path).await;
        for (k, v) in set {
            props.insert(k.clone(), v.clone());
        }
        for k in remove {
            props.remove(k);
        }
        self.write_json(&sidecar("props", &path.sidecar_key()), &props).await?;
        Ok(props)
    }

    pub async fn set_props(&self, path: &DavPath, full: PropMap) -> FsResult<()> {
        let _g = self.guard("props", path).await;
        self.write_json(&sidecar("props", &path.sidecar_key()), &full).await
    }

    // ----- collection ordering -----

    pub async fn get_order(&self, path: &DavPath) -> Vec<String> {
        let rec: OrderRecord = self.read_json(&sidecar("order", &path.sidecar_key())).await;
        rec.names
    }

    pub async fn set_order(&self, path: &DavPath, names: &[String]) -> FsResult<()> {
        let _g = self.guard("order", path).await;
        let rec = OrderRecord { names: names.to_vec() };
        self.write_json(&sidecar("order", &path.sidecar_key()), &rec).await
    }

    /// Reorder a child listing: explicit order file first, `Z:order` CSV
    /// dead property as fallback, backend-native order otherwise. Known
    /// names keep the stored sequence; unknown names are appended in input
    /// order.
    pub async fn apply_order(&self, path: &DavPath, children: Vec<String>) -> Vec<String> {
        let mut order = self.get_order(path).await;
        if order.is_empty() {
            if let Some(csv) = self.get_props(path).await.get("Z:order") {
                order = csv
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
        }
        if order.is_empty() {
            return children;
        }
        let mut out = Vec::with_capacity(children.len());
        for name in &order {
            if children.contains(name) && !out.contains(name) {
                out.push(name.clone());
            }
        }
        for name in children {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }

    // ----- versioning -----

    pub async fn record_version(
        &self,
        path: &DavPath,
        data: &Bytes,
        mime: Option<&str>,
    ) -> FsResult<VersionEntry> {
        let _g = self.guard("versions", path).await;
        let key = path.sidecar_key();
        let dir = version_dir(&key);
        let meta_path = dir.join("meta.json");
        let mut meta: VersionMeta = self.read_json(&meta_path).await;
        let id = (meta.versions.len() + 1).to_string();
        self.fs.ensure_dir(&dir).await?;
        self.fs
            .write_file(&dir.join(&format!("{}.bin", id)), data.clone(), mime)
            .await?;
        let entry = VersionEntry {
            id:         id.clone(),
            size:       data.len() as u64,
            mime:       mime.map(|m| m.to_string()),
            created_at: now_rfc3339(),
        };
        meta.versions.push(entry.clone());
        self.write_json(&meta_path, &meta).await?;
        Ok(entry)
    }

    pub async fn list_versions(&self, path: &DavPath) -> Vec<VersionEntry> {
        let meta: VersionMeta = self
            .read_json(&version_dir(&path.sidecar_key()).join("meta.json"))
            .await;
        meta.versions
    }

    pub async fn read_version(&self, path: &DavPath, id: &str) -> Option<(Bytes, Option<String>)> {
        let meta: VersionMeta = self
            .read_json(&version_dir(&path.sidecar_key()).join("meta.json"))
            .await;
        let entry = meta.versions.iter().find(|v| v.id == id)?;
        let data = self
            .fs
            .read_file(&version_dir(&path.sidecar_key()).join(&format!("{}.bin", id)))
            .await
            .ok()?;
        Some((data, entry.mime.clone()))
    }
}
