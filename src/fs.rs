//! Contains the structs and traits that define the storage backend seam.
//!
//! The `PersistAdapter` is the external collaborator that owns the resource
//! tree. Everything else in this crate (sidecar state, handlers, hooks)
//! operates on top of it. Implementations may be memory-backed, OS-backed,
//! or anything that can satisfy the per-call atomicity contract.

use std::fmt::Debug;
use std::time::SystemTime;

use bytes::Bytes;
use dyn_clone::DynClone;
use futures_util::future::BoxFuture;

use crate::davpath::DavPath;
use crate::util::systemtime_to_ms;

/// Error kinds a `PersistAdapter` can surface. The taxonomy mapping to
/// WebDAV status codes lives in `errors.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    GeneralFailure,
    NotFound,
    Exists,
    Forbidden,
    NotADirectory,
    IsADirectory,
    NotEmpty,
    InsufficientStorage,
    NotImplemented,
}

pub type FsResult<T> = std::result::Result<T, FsError>;

/// Convenience alias for the boxed futures the adapter returns.
pub type FsFuture<'a, T> = BoxFuture<'a, FsResult<T>>;

impl std::error::Error for FsError {}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
}

/// Metadata for one resource, as reported by the backend.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub mime: Option<String>,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Weak validator, exactly `W/"<size>-<mtime-ms>"`. The mtime component
    /// is empty when the backend reports none.
    pub fn etag(&self) -> String {
        let mtime = self
            .mtime
            .map(|t| systemtime_to_ms(t).to_string())
            .unwrap_or_default();
        format!("W/\"{}-{}\"", self.size, mtime)
    }
}

/// The storage backend contract. All operations are atomic per call; no
/// higher-level transaction is required of implementations.
pub trait PersistAdapter: Debug + Send + Sync + DynClone {
    fn exists<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, bool>;
    fn stat<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, FileStat>;
    fn read_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Vec<String>>;
    fn read_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Bytes>;
    fn write_file<'a>(&'a self, path: &'a DavPath, data: Bytes, mime: Option<&'a str>) -> FsFuture<'a, ()>;
    fn ensure_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()>;
    fn remove<'a>(&'a self, path: &'a DavPath, recursive: bool) -> FsFuture<'a, ()>;
    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()>;
    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()>;
}

dyn_clone::clone_trait_object!(PersistAdapter);
