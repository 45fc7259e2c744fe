//! Simple in-memory resource bridge.
//!
//! Keeps only what the lock check needs: which paths exist, which of
//! them are collections, and a version number that is turned into an
//! etag. Useful for tests and as a stand-in while content lives
//! elsewhere.
use std::collections::HashMap;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;

use crate::davpath::DavPath;
use crate::fs::*;

#[derive(Debug, Clone)]
struct MemFsNode {
    is_collection: bool,
    version: u64,
}

impl DavMetaData for MemFsNode {
    fn is_collection(&self) -> bool {
        self.is_collection
    }

    fn etag(&self) -> Option<String> {
        if self.is_collection {
            None
        } else {
            Some(format!("\"{:x}\"", self.version))
        }
    }
}

/// Ephemeral in-memory resource bridge.
#[derive(Debug, Clone)]
pub struct MemFs {
    tree: Arc<Mutex<HashMap<String, MemFsNode>>>,
}

impl MemFs {
    /// Create a new "memfs" bridge that has only the root collection.
    pub fn new() -> Arc<MemFs> {
        let mut tree = HashMap::new();
        tree.insert(
            "/".to_string(),
            MemFsNode {
                is_collection: true,
                version: 1,
            },
        );
        Arc::new(MemFs {
            tree: Arc::new(Mutex::new(tree)),
        })
    }

    /// Create a resource. The parent collection must exist.
    pub fn create(&self, path: &DavPath, is_collection: bool) -> FsResult<()> {
        let mut tree = self.tree.lock();
        if tree.contains_key(path.as_key()) {
            return Err(FsError::Forbidden);
        }
        let parent_ok = path
            .parent()
            .and_then(|p| tree.get(p.as_key()).map(|n| n.is_collection))
            .unwrap_or(false);
        if !parent_ok {
            return Err(FsError::NotFound);
        }
        trace!("memfs: create {:?}", path);
        tree.insert(
            path.as_key().to_string(),
            MemFsNode {
                is_collection,
                version: 1,
            },
        );
        Ok(())
    }

    /// Create the resource if needed, otherwise bump its etag.
    pub fn touch(&self, path: &DavPath) -> FsResult<()> {
        {
            let mut tree = self.tree.lock();
            if let Some(node) = tree.get_mut(path.as_key()) {
                if node.is_collection {
                    return Err(FsError::Forbidden);
                }
                node.version += 1;
                return Ok(());
            }
        }
        self.create(path, false)
    }

    /// Remove a resource and everything below it.
    pub fn remove(&self, path: &DavPath) -> FsResult<()> {
        if path.is_root() {
            return Err(FsError::Forbidden);
        }
        let key = path.as_key();
        let mut tree = self.tree.lock();
        if tree.remove(key).is_none() {
            return Err(FsError::NotFound);
        }
        let below = format!("{key}/");
        tree.retain(|p, _| !p.starts_with(&below));
        Ok(())
    }
}

impl ResourceBridge for MemFs {
    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        async move {
            let tree = self.tree.lock();
            match tree.get(path.as_key()) {
                Some(node) => Ok(Box::new(node.clone()) as Box<dyn DavMetaData>),
                None => Err(FsError::NotFound),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> DavPath {
        DavPath::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_touch() {
        let fs = MemFs::new();
        fs.create(&p("/dir/"), true).unwrap();
        fs.create(&p("/dir/file"), false).unwrap();
        assert_eq!(fs.create(&p("/nodir/file"), false), Err(FsError::NotFound));

        let meta = fs.metadata(&p("/dir/file")).await.unwrap();
        let etag = meta.etag().unwrap();
        fs.touch(&p("/dir/file")).unwrap();
        let meta = fs.metadata(&p("/dir/file")).await.unwrap();
        assert_ne!(meta.etag().unwrap(), etag);
        assert!(fs.metadata(&p("/dir")).await.unwrap().is_collection());
    }

    #[tokio::test]
    async fn test_remove() {
        let fs = MemFs::new();
        fs.create(&p("/dir/"), true).unwrap();
        fs.create(&p("/dir/file"), false).unwrap();
        fs.remove(&p("/dir/")).unwrap();
        assert!(fs.metadata(&p("/dir/file")).await.is_err());
        assert_eq!(fs.remove(&p("/")), Err(FsError::Forbidden));
    }
}
