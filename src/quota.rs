//! Quota accounting.
//!
//! The single limit is the `Z:quota-limit-bytes` dead property on the root
//! path; absent or non-numeric means unlimited. Used bytes are the
//! recursive sum of file sizes under a path, with ignored names (including
//! the sidecar tree) excluded.

use crate::davpath::DavPath;
use crate::fs::PersistAdapter;
use crate::ignore::IgnoreFilter;
use crate::statestore::DavStateStore;

pub(crate) async fn quota_limit(store: &DavStateStore) -> Option<u64> {
    store
        .get_props(&DavPath::root())
        .await
        .get("Z:quota-limit-bytes")
        .and_then(|v| v.trim().parse::<u64>().ok())
}

pub(crate) async fn used_bytes(
    fs: &dyn PersistAdapter,
    ignore: &IgnoreFilter,
    path: &DavPath,
) -> u64 {
    let mut total = 0u64;
    let mut queue = vec![path.clone()];
    while let Some(cur) = queue.pop() {
        let stat = match fs.stat(&cur).await {
            Ok(s) => s,
            Err(_) => continue,
        };
        if stat.is_file() {
            total += stat.size;
            continue;
        }
        let names = match fs.read_dir(&cur).await {
            Ok(n) => n,
            Err(_) => continue,
        };
        for name in ignore.filter_names(names) {
            queue.push(cur.join(&name));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfs::MemFs;
    use crate::statestore::PropMap;
    use bytes::Bytes;

    fn p(s: &str) -> DavPath {
        DavPath::from_request_path(s, "").unwrap()
    }

    #[tokio::test]
    async fn test_used_bytes_skips_sidecar() {
        let fs = MemFs::new();
        fs.write_file(&p("/a.txt"), Bytes::from("12345"), None).await.unwrap();
        fs.ensure_dir(&p("/sub")).await.unwrap();
        fs.write_file(&p("/sub/b.txt"), Bytes::from("123"), None).await.unwrap();
        fs.ensure_dir(&p("/_dav/props")).await.unwrap();
        fs.write_file(&p("/_dav/props/x.json"), Bytes::from("{}"), None).await.unwrap();
        let ignore = IgnoreFilter::default();
        assert_eq!(used_bytes(&*fs, &ignore, &DavPath::root()).await, 8);
    }

    #[tokio::test]
    async fn test_limit_parse() {
        let fs = MemFs::new();
        let store = DavStateStore::new(fs);
        assert_eq!(quota_limit(&store).await, None);
        let mut set = PropMap::new();
        set.insert("Z:quota-limit-bytes".to_string(), "1024".to_string());
        store.merge_props(&DavPath::root(), &set, &[]).await.unwrap();
        assert_eq!(quota_limit(&store).await, Some(1024));
        let mut set = PropMap::new();
        set.insert("Z:quota-limit-bytes".to_string(), "lots".to_string());
        store.merge_props(&DavPath::root(), &set, &[]).await.unwrap();
        assert_eq!(quota_limit(&store).await, None);
    }
}
