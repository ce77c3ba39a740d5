//! Simple in-memory implementation of the `PersistAdapter` backend.
//!
//! Mostly useful for testing and for embedders that want an ephemeral DAV
//! tree. Directory listings preserve insertion order, which is what makes
//! collection ordering deterministic on this backend.

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use futures_util::FutureExt;
use parking_lot::RwLock;

use crate::davpath::DavPath;
use crate::fs::*;

#[derive(Debug, Clone)]
enum Node {
    Dir(DirNode),
    File(FileNode),
}

#[derive(Debug, Clone)]
struct DirNode {
    children: Vec<(String, Node)>,
    mtime:    SystemTime,
}

#[derive(Debug, Clone)]
struct FileNode {
    data:  Bytes,
    mime:  Option<String>,
    mtime: SystemTime,
}

impl Node {
    fn new_dir() -> Node {
        Node::Dir(DirNode {
            children: Vec::new(),
            mtime:    SystemTime::now(),
        })
    }

    fn as_dir(&self) -> FsResult<&DirNode> {
        match self {
            Node::Dir(d) => Ok(d),
            Node::File(_) => Err(FsError::NotADirectory),
        }
    }

    fn as_dir_mut(&mut self) -> FsResult<&mut DirNode> {
        match self {
            Node::Dir(d) => Ok(d),
            Node::File(_) => Err(FsError::NotADirectory),
        }
    }
}

impl DirNode {
    fn get(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    // insert or replace, keeping insertion order for new names.
    fn put(&mut self, name: &str, node: Node) {
        match self.children.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = node,
            None => self.children.push((name.to_string(), node)),
        }
        self.mtime = SystemTime::now();
    }

    fn take(&mut self, name: &str) -> Option<Node> {
        let pos = self.children.iter().position(|(n, _)| n == name)?;
        self.mtime = SystemTime::now();
        Some(self.children.remove(pos).1)
    }
}

/// Ephemeral in-memory storage backend.
#[derive(Debug, Clone)]
pub struct MemFs {
    root: Arc<RwLock<Node>>,
}

impl MemFs {
    pub fn new() -> Box<MemFs> {
        Box::new(MemFs {
            root: Arc::new(RwLock::new(Node::new_dir())),
        })
    }

    fn lookup<'t>(node: &'t Node, segs: &[String]) -> FsResult<&'t Node> {
        let mut cur = node;
        for seg in segs {
            cur = cur.as_dir()?.get(seg).ok_or(FsError::NotFound)?;
        }
        Ok(cur)
    }

    fn lookup_mut<'t>(node: &'t mut Node, segs: &[String]) -> FsResult<&'t mut Node> {
        let mut cur = node;
        for seg in segs {
            cur = cur.as_dir_mut()?.get_mut(seg).ok_or(FsError::NotFound)?;
        }
        Ok(cur)
    }

    fn do_stat(node: &Node) -> FileStat {
        match node {
            Node::Dir(d) => FileStat {
                kind:  FileKind::Dir,
                size:  0,
                mtime: Some(d.mtime),
                mime:  None,
            },
            Node::File(f) => FileStat {
                kind:  FileKind::File,
                size:  f.data.len() as u64,
                mtime: Some(f.mtime),
                mime:  f.mime.clone(),
            },
        }
    }
}

impl Default for MemFs {
    fn default() -> Self {
        *MemFs::new()
    }
}

impl PersistAdapter for MemFs {
    fn exists<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, bool> {
        async move {
            let root = self.root.read();
            Ok(Self::lookup(&root, path.segments()).is_ok())
        }
        .boxed()
    }

    fn stat<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, FileStat> {
        async move {
            let root = self.root.read();
            let node = Self::lookup(&root, path.segments())?;
            Ok(Self::do_stat(node))
        }
        .boxed()
    }

    fn read_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Vec<String>> {
        async move {
            let root = self.root.read();
            let node = Self::lookup(&root, path.segments())?;
            let dir = node.as_dir()?;
            Ok(dir.children.iter().map(|(n, _)| n.clone()).collect())
        }
        .boxed()
    }

    fn read_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Bytes> {
        async move {
            let root = self.root.read();
            match Self::lookup(&root, path.segments())? {
                Node::File(f) => Ok(f.data.clone()),
                Node::Dir(_) => Err(FsError::IsADirectory),
            }
        }
        .boxed()
    }

    fn write_file<'a>(&'a self, path: &'a DavPath, data: Bytes, mime: Option<&'a str>) -> FsFuture<'a, ()> {
        async move {
            if path.is_root() {
                return Err(FsError::IsADirectory);
            }
            let mut root = self.root.write();
            let parent = Self::lookup_mut(&mut root, path.parent().segments())?;
            let dir = parent.as_dir_mut()?;
            if let Some(Node::Dir(_)) = dir.get(path.file_name()) {
                return Err(FsError::IsADirectory);
            }
            dir.put(
                path.file_name(),
                Node::File(FileNode {
                    data,
                    mime: mime.map(|m| m.to_string()),
                    mtime: SystemTime::now(),
                }),
            );
            Ok(())
        }
        .boxed()
    }

    fn ensure_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            let mut root = self.root.write();
            let mut cur = &mut *root;
            for seg in path.segments() {
                let dir = cur.as_dir_mut()?;
                if dir.get(seg).is_none() {
                    dir.put(seg, Node::new_dir());
                }
                cur = dir.get_mut(seg).unwrap();
            }
            cur.as_dir()?;
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, path: &'a DavPath, recursive: bool) -> FsFuture<'a, ()> {
        async move {
            if path.is_root() {
                return Err(FsError::Forbidden);
            }
            let mut root = self.root.write();
            let parent = Self::lookup_mut(&mut root, path.parent().segments())?;
            let dir = parent.as_dir_mut()?;
            match dir.get(path.file_name()) {
                None => return Err(FsError::NotFound),
                Some(Node::Dir(d)) if !d.children.is_empty() && !recursive => {
                    return Err(FsError::NotEmpty);
                },
                _ => {},
            }
            dir.take(path.file_name());
            Ok(())
        }
        .boxed()
    }

    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            if from.is_root() || to.is_root() {
                return Err(FsError::Forbidden);
            }
            let mut root = self.root.write();
            let node = {
                let parent = Self::lookup_mut(&mut root, from.parent().segments())?;
                parent.as_dir_mut()?.take(from.file_name()).ok_or(FsError::NotFound)?
            };
            let parent = match Self::lookup_mut(&mut root, to.parent().segments()) {
                Ok(p) => p,
                Err(e) => {
                    // put the node back, the rename must be atomic.
                    let parent = Self::lookup_mut(&mut root, from.parent().segments())?;
                    parent.as_dir_mut()?.put(from.file_name(), node);
                    return Err(e);
                },
            };
            parent.as_dir_mut()?.put(to.file_name(), node);
            Ok(())
        }
        .boxed()
    }

    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            if to.is_root() {
                return Err(FsError::Forbidden);
            }
            let mut root = self.root.write();
            let node = Self::lookup(&root, from.segments())?.clone();
            let parent = Self::lookup_mut(&mut root, to.parent().segments())?;
            parent.as_dir_mut()?.put(to.file_name(), node);
            Ok(())
        }
        .boxed()
    }
}
