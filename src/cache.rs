//! The content cache: a thread-safe, snapshot-swappable open-addressed hash
//! table mapping request paths to preloaded file bodies.
//!
//! A [`Snapshot`] is built once per `load()` call from a full filesystem
//! walk and never mutated afterward. [`ContentCache`] holds the single
//! readers/writer lock that guards which `Snapshot` is currently published;
//! `find` clones a caller-owned [`CacheEntry`] out from behind the lock so
//! callers never hold a reference across a reload.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CacheError;
use crate::hash::path_hash;
use crate::logging::Logger;
use crate::mime;

/// Maximum number of files a single walk may discover before `load` refuses
/// to publish a new snapshot.
pub const MAX_ENTRIES: usize = 65_534;

/// A single cached file: its canonical request path, preloaded body, and
/// inferred MIME type. Immutable for the lifetime of the `Snapshot` it was
/// published in.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub path: String,
    pub hash: u64,
    pub bytes: Arc<[u8]>,
    pub length: usize,
    pub mime: &'static str,
}

impl CacheEntry {
    fn new(path: String, bytes: Vec<u8>, mime: &'static str) -> Self {
        let hash = path_hash(&path);
        let length = bytes.len();
        CacheEntry {
            path,
            hash,
            bytes: Arc::from(bytes.into_boxed_slice()),
            length,
            mime,
        }
    }

    /// Build a synthesized entry whose body is `text` and whose MIME type is
    /// `text/plain`. Used by the response assembler's error-page fallback
    /// when no on-disk error page exists.
    pub fn synthesize(path: &str, text: &str) -> Self {
        CacheEntry::new(path.to_string(), text.as_bytes().to_vec(), "text/plain")
    }
}

/// An immutable, open-addressed hash table over [`CacheEntry`], built
/// offline by [`build_snapshot`] and published atomically by
/// [`ContentCache::load`].
#[derive(Debug)]
pub struct Snapshot {
    table: Vec<Option<CacheEntry>>,
    mask: usize,
    count: usize,
}

impl Snapshot {
    /// Smallest power of two strictly greater than `count`, guaranteeing a
    /// load factor <= 0.5 at publication.
    fn capacity_for(count: usize) -> usize {
        let mut cap = 1usize;
        while cap <= count {
            cap <<= 1;
        }
        cap
    }

    fn empty() -> Self {
        Snapshot {
            table: vec![None],
            mask: 0,
            count: 0,
        }
    }

    fn with_capacity(count: usize) -> Self {
        let capacity = Self::capacity_for(count);
        Snapshot {
            table: vec![None; capacity],
            mask: capacity - 1,
            count: 0,
        }
    }

    /// Linear-probe insert. Replaces an existing slot in place when `path`
    /// already occupies a slot (only possible during a build, never after
    /// publication).
    fn insert(&mut self, entry: CacheEntry) {
        let mut index = (entry.hash as usize) & self.mask;
        loop {
            match &self.table[index] {
                Some(existing) if existing.path == entry.path => {
                    self.table[index] = Some(entry);
                    return;
                }
                None => {
                    self.table[index] = Some(entry);
                    self.count += 1;
                    return;
                }
                Some(_) => {
                    index = (index + 1) & self.mask;
                }
            }
        }
    }

    /// Linear-probe lookup. Stops on the first empty slot (miss), or after a
    /// full wraparound of the table (also a miss; guards against an
    /// accidentally full table).
    pub fn find(&self, path: &str) -> Option<&CacheEntry> {
        let hash = path_hash(path);
        let start = (hash as usize) & self.mask;
        let mut index = start;
        loop {
            match &self.table[index] {
                Some(entry) if entry.path == path => return Some(entry),
                None => return None,
                Some(_) => {
                    index = (index + 1) & self.mask;
                    if index == start {
                        return None;
                    }
                }
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

/// Recursively walk `root` (skipping dot-files), reading every regular file
/// into memory and inferring its MIME type. Returns entries keyed by the
/// request path the on-disk file corresponds to (root prefix stripped,
/// leading `/`).
fn walk(root: &Path) -> Result<Vec<CacheEntry>, CacheError> {
    let mut entries = Vec::new();
    walk_into(root, root, &mut entries)?;
    Ok(entries)
}

fn walk_into(root: &Path, dir: &Path, out: &mut Vec<CacheEntry>) -> Result<(), CacheError> {
    let read = fs::read_dir(dir).map_err(|source| CacheError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for item in read {
        let item = item.map_err(|source| CacheError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_name = item.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }

        let full_path = item.path();
        let meta = item.metadata().map_err(|source| CacheError::Stat {
            path: full_path.clone(),
            source,
        })?;

        if meta.is_dir() {
            walk_into(root, &full_path, out)?;
            continue;
        }
        if !meta.is_file() {
            continue;
        }

        let bytes = fs::read(&full_path).map_err(|source| CacheError::ReadFile {
            path: full_path.clone(),
            source,
        })?;

        let request_path = to_request_path(root, &full_path);
        let mime = mime::infer_str(&request_path);
        out.push(CacheEntry::new(request_path, bytes, mime));

        if out.len() > MAX_ENTRIES {
            return Err(CacheError::TooManyFiles {
                found: out.len(),
                cap: MAX_ENTRIES,
            });
        }
    }

    Ok(())
}

/// Strip `root` from `full_path` and normalize to a leading-slash,
/// forward-slash request path, regardless of host path separator.
fn to_request_path(root: &Path, full_path: &Path) -> String {
    let relative = full_path.strip_prefix(root).unwrap_or(full_path);
    let mut out = String::with_capacity(relative.as_os_str().len() + 1);
    out.push('/');
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}

fn build_snapshot(root: &Path) -> Result<Snapshot, CacheError> {
    let entries = walk(root)?;
    if entries.is_empty() {
        return Ok(Snapshot::empty());
    }
    let mut snapshot = Snapshot::with_capacity(entries.len());
    for entry in entries {
        snapshot.insert(entry);
    }
    Ok(snapshot)
}

/// The published, swappable content cache. `None` until the first
/// successful `load`.
pub struct ContentCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl ContentCache {
    /// Create the cache with no published snapshot yet.
    pub fn init() -> Self {
        ContentCache {
            current: RwLock::new(None),
        }
    }

    /// Build a new snapshot from `root` with no lock held, then atomically
    /// publish it. On failure the previously published snapshot (if any) is
    /// left untouched.
    pub fn load(&self, root: &Path, logger: &Logger) -> Result<(), CacheError> {
        match build_snapshot(root) {
            Ok(snapshot) => {
                let count = snapshot.count();
                let capacity = snapshot.capacity();
                *self.current.write() = Some(Arc::new(snapshot));
                logger.info(format!(
                    "content cache loaded: {count} entries, capacity {capacity}"
                ));
                Ok(())
            }
            Err(err) => {
                logger.error(format!("cache reload from {root:?} failed: {err}"));
                Err(err)
            }
        }
    }

    /// Return a caller-owned copy of the entry at `path`, or `None` if there
    /// is no published snapshot yet or the path is absent from it. The
    /// returned copy remains valid after a concurrent `load` replaces the
    /// published snapshot, since the underlying byte buffer is reference
    /// counted independently of the table that indexes it.
    pub fn find(&self, path: &str) -> Option<CacheEntry> {
        let guard = self.current.read();
        guard.as_ref()?.find(path).cloned()
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.current
            .read()
            .as_ref()
            .map(|s| s.count())
            .unwrap_or(0)
    }
}

/// Where the html root lives on disk, used only to build the absolute path
/// passed to `ContentCache::load`.
pub fn resolve_root(html_root: &str) -> PathBuf {
    PathBuf::from(html_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Logger;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn walk_skips_dotfiles_and_strips_root() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "index.html", "<html></html>");
        write(tmp.path(), ".hidden", "secret");
        write(tmp.path(), "css/style.css", "body{}");

        let entries = walk(tmp.path()).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        assert!(paths.contains(&"/index.html".to_string()));
        assert!(paths.contains(&"/css/style.css".to_string()));
        assert!(!paths.iter().any(|p| p.contains("hidden")));
    }

    #[test]
    fn snapshot_capacity_is_power_of_two_exceeding_count() {
        for count in [0usize, 1, 2, 3, 4, 5, 16, 17] {
            let snap = Snapshot::with_capacity(count);
            assert!(snap.capacity().is_power_of_two());
            assert!(snap.capacity() > count);
        }
    }

    #[test]
    fn snapshot_no_two_occupied_slots_share_a_path() {
        let tmp = TempDir::new().unwrap();
        for i in 0..50 {
            write(tmp.path(), &format!("file{i}.html"), "x");
        }
        let snapshot = build_snapshot(tmp.path()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for slot in &snapshot.table {
            if let Some(entry) = slot {
                assert!(seen.insert(entry.path.clone()), "duplicate path in table");
            }
        }
    }

    #[test]
    fn find_returns_entry_with_matching_hash_and_length() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "index.html", "hello world");
        let snapshot = build_snapshot(tmp.path()).unwrap();
        let entry = snapshot.find("/index.html").unwrap();
        assert_eq!(entry.length, entry.bytes.len());
        assert_eq!(entry.hash, path_hash(&entry.path));
        assert_eq!(&*entry.bytes, b"hello world");
    }

    #[test]
    fn load_preserves_prior_snapshot_on_cap_overflow() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "index.html", "first");
        let cache = ContentCache::init();
        let logger = Logger::for_test();
        cache.load(tmp.path(), &logger).unwrap();
        assert_eq!(cache.entry_count(), 1);

        // Simulate an over-cap directory by calling build_snapshot directly
        // against a non-existent directory, which must fail without
        // touching the already-published snapshot.
        let missing = tmp.path().join("does-not-exist");
        assert!(cache.load(&missing, &logger).is_err());
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn concurrent_find_during_reload_never_observes_torn_state() {
        use std::sync::Barrier;
        use std::thread;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.html", "aaaa");
        let cache = Arc::new(ContentCache::init());
        let logger = Logger::for_test();
        cache.load(tmp.path(), &logger).unwrap();

        write(tmp.path(), "b.html", "bbbb");

        let barrier = Arc::new(Barrier::new(5));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    if let Some(entry) = cache.find("/a.html") {
                        assert_eq!(&*entry.bytes, b"aaaa");
                    }
                }
            }));
        }
        let loader = {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let root = tmp.path().to_path_buf();
            thread::spawn(move || {
                barrier.wait();
                let logger = Logger::for_test();
                cache.load(&root, &logger).unwrap();
            })
        };
        for h in handles {
            h.join().unwrap();
        }
        loader.join().unwrap();
        assert!(cache.find("/b.html").is_some());
    }
}
