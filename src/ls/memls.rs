//! Simple in-memory lockstore.
//!
//! Locks are kept in a map keyed by path. Expired locks are pruned on
//! every access, so they are never handed out.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures_util::FutureExt;
use parking_lot::Mutex;

use crate::davpath::DavPath;
use crate::lock::Lock;
use crate::ls::*;

/// Ephemeral in-memory lockstore.
#[derive(Debug, Clone, Default)]
pub struct MemLs(Arc<Mutex<HashMap<String, Lock>>>);

impl MemLs {
    /// Create a new "memls" lockstore.
    pub fn new() -> Arc<MemLs> {
        Arc::new(MemLs::default())
    }

    /// Number of live locks.
    pub fn len(&self) -> usize {
        let mut tree = self.0.lock();
        prune(&mut tree);
        tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune(tree: &mut HashMap<String, Lock>) {
    let now = SystemTime::now();
    tree.retain(|path, lock| {
        let live = !lock.is_expired_at(now);
        if !live {
            debug!("memls: lock {} on {} expired", lock.token, path);
        }
        live
    });
}

// is "path" equal to or below "base".
fn is_below(base: &str, path: &str) -> bool {
    base == "/"
        || path == base
        || (path.starts_with(base) && path.as_bytes().get(base.len()) == Some(&b'/'))
}

impl DavLockStore for MemLs {
    fn get<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<Option<Lock>>> {
        async move {
            let mut tree = self.0.lock();
            prune(&mut tree);
            Ok(tree.get(path.as_key()).cloned())
        }
        .boxed()
    }

    fn set<'a>(&'a self, path: &'a DavPath, lock: Lock) -> LsFuture<'a, LsResult<()>> {
        async move {
            trace!("memls: set {} on {:?}", lock.token, path);
            self.0.lock().insert(path.as_key().to_string(), lock);
            Ok(())
        }
        .boxed()
    }

    fn compare_and_set<'a>(
        &'a self,
        path: &'a DavPath,
        expected: Option<&'a str>,
        lock: Lock,
    ) -> LsFuture<'a, LsResult<()>> {
        async move {
            let mut tree = self.0.lock();
            prune(&mut tree);
            let current = tree.get(path.as_key()).map(|l| l.token.as_str());
            if current != expected {
                debug!(
                    "memls: compare_and_set on {:?}: expected {:?}, found {:?}",
                    path, expected, current
                );
                return Err(LsError::Conflict);
            }
            trace!("memls: set {} on {:?}", lock.token, path);
            tree.insert(path.as_key().to_string(), lock);
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, path: &'a DavPath, token: &'a str) -> LsFuture<'a, LsResult<()>> {
        async move {
            let mut tree = self.0.lock();
            prune(&mut tree);
            let owned = tree.get(path.as_key()).map(|l| l.token == token);
            match owned {
                None => Err(LsError::NotFound),
                Some(false) => Err(LsError::Conflict),
                Some(true) => {
                    trace!("memls: remove {} from {:?}", token, path);
                    tree.remove(path.as_key());
                    Ok(())
                }
            }
        }
        .boxed()
    }

    fn delete<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<()>> {
        async move {
            let base = path.as_key();
            let mut tree = self.0.lock();
            tree.retain(|p, _| !is_below(base, p));
            Ok(())
        }
        .boxed()
    }

    fn descendants<'a>(&'a self, path: &'a DavPath) -> LsFuture<'a, LsResult<Vec<Lock>>> {
        async move {
            let base = path.as_key();
            let mut tree = self.0.lock();
            prune(&mut tree);
            Ok(tree
                .iter()
                .filter(|(p, _)| p.as_str() != base && is_below(base, p))
                .map(|(_, l)| l.clone())
                .collect())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{LockDepth, LockScope};
    use std::time::Duration;

    fn lock(path: &DavPath, timeout: Option<Duration>) -> Lock {
        Lock::new(path.clone(), LockScope::Exclusive, LockDepth::Zero, None, None, timeout)
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let ls = MemLs::new();
        let path = DavPath::new("/file").unwrap();
        let first = lock(&path, None);
        let second = lock(&path, None);

        ls.compare_and_set(&path, None, first.clone()).await.unwrap();
        // second creator lost the race.
        let res = ls.compare_and_set(&path, None, second.clone()).await;
        assert_eq!(res, Err(LsError::Conflict));
        assert_eq!(ls.get(&path).await.unwrap().unwrap().token, first.token);

        ls.compare_and_set(&path, Some(&first.token), second.clone())
            .await
            .unwrap();
        assert_eq!(ls.get(&path).await.unwrap().unwrap().token, second.token);
    }

    #[tokio::test]
    async fn test_expired_not_returned() {
        let ls = MemLs::new();
        let path = DavPath::new("/file").unwrap();
        let mut l = lock(&path, Some(Duration::from_secs(60)));
        l.expires = Some(SystemTime::now() - Duration::from_secs(1));
        ls.set(&path, l).await.unwrap();
        assert!(ls.get(&path).await.unwrap().is_none());
        assert!(ls.is_empty());
        // an expired lock does not block a new one.
        ls.compare_and_set(&path, None, lock(&path, None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove() {
        let ls = MemLs::new();
        let path = DavPath::new("/file").unwrap();
        let l = lock(&path, None);
        ls.set(&path, l.clone()).await.unwrap();
        assert_eq!(ls.remove(&path, "urn:other").await, Err(LsError::Conflict));
        ls.remove(&path, &l.token).await.unwrap();
        assert_eq!(ls.remove(&path, &l.token).await, Err(LsError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_tree() {
        let ls = MemLs::new();
        for p in ["/dir/", "/dir/a", "/dir/sub/b", "/dirx"] {
            let path = DavPath::new(p).unwrap();
            ls.set(&path, lock(&path, None)).await.unwrap();
        }
        ls.delete(&DavPath::new("/dir/").unwrap()).await.unwrap();
        assert_eq!(ls.len(), 1);
        assert!(ls.get(&DavPath::new("/dirx").unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_descendants() {
        let ls = MemLs::new();
        for p in ["/dir/", "/dir/a", "/dir/sub/b", "/dirx"] {
            let path = DavPath::new(p).unwrap();
            ls.set(&path, lock(&path, None)).await.unwrap();
        }
        let below = ls.descendants(&DavPath::new("/dir/").unwrap()).await.unwrap();
        let mut roots: Vec<_> = below.iter().map(|l| l.root.as_str().to_string()).collect();
        roots.sort();
        assert_eq!(roots, ["/dir/a", "/dir/sub/b"]);
        let below = ls.descendants(&DavPath::new("/").unwrap()).await.unwrap();
        assert_eq!(below.len(), 4);
    }

    #[tokio::test]
    async fn test_trailing_slash() {
        let ls = MemLs::new();
        let coll = DavPath::new("/dir/").unwrap();
        ls.set(&coll, lock(&coll, None)).await.unwrap();
        assert!(ls.get(&DavPath::new("/dir").unwrap()).await.unwrap().is_some());
    }
}
