//! Shuffle-solution cache.
//!
//! Maps a layout name plus the exact set of remaining tile ids to a kind
//! assignment the solver has already proven clearable. Entries are content
//! addressed, so concurrent writers may race freely: any verified assignment
//! for a signature is as good as another.
//!
//! File format for [`FileStore`] (JSON):
//! - `version`: format version, currently 1
//! - `layouts`: map of layout name to entries, oldest first
//!   - `signature`: hex bitmask of remaining tile slots
//!   - `remaining`: remaining tile ids, ascending
//!   - `positions`: position of each remaining tile, same order
//!   - `kinds`: kind code for each remaining tile, same order

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::layout::Position;
use crate::tiles::{Kind, TileId};
use crate::topology::TileMask;

const FILE_VERSION: u32 = 2;

/// Canonical, order-independent key for a set of remaining tile ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Encodes the ids as a bitmask over slots, highest word first, in hex.
    pub fn of(remaining: impl IntoIterator<Item = TileId>) -> Self {
        let mask: TileMask = remaining.into_iter().map(TileId::slot).collect();
        let words = mask.words();
        let used = words.iter().rposition(|&w| w != 0).map_or(0, |i| i + 1);
        let encoded = words[..used]
            .iter()
            .rev()
            .map(|word| format!("{word:016x}"))
            .collect::<Vec<_>>()
            .join("");
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A verified kind assignment for the remaining tiles of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedShuffle {
    /// Remaining tile ids, ascending.
    pub remaining: Vec<TileId>,
    /// Where each entry of `remaining` sits; the assignment was proven for
    /// this geometry only.
    pub positions: Vec<Position>,
    /// Kind for each entry of `remaining`.
    pub kinds: Vec<Kind>,
}

impl CachedShuffle {
    /// Whether this entry can be applied to a live board whose remaining tiles
    /// are `remaining` (ascending) at `positions`, holding `kinds`.
    ///
    /// The tile ids and their positions must match exactly, and the entry must
    /// use the same multiset of kinds, so applying it is a pure permutation of
    /// the live board the solver proved it on.
    pub fn fits(&self, remaining: &[TileId], positions: &[Position], kinds: &[Kind]) -> bool {
        if self.remaining != remaining
            || self.positions != positions
            || self.kinds.len() != kinds.len()
        {
            return false;
        }
        let mut cached = self.kinds.clone();
        let mut live = kinds.to_vec();
        cached.sort_unstable();
        live.sort_unstable();
        cached == live
    }
}

/// Key-value capability backing the shuffle cache.
///
/// Implementations must tolerate concurrent readers; last writer wins.
pub trait ShuffleStore: Send + Sync {
    fn lookup(&self, layout: &str, signature: &Signature) -> Option<CachedShuffle>;
    fn save(&self, layout: &str, signature: Signature, entry: CachedShuffle);
}

#[derive(Debug, Default)]
struct Bucket {
    order: VecDeque<Signature>,
    entries: FxHashMap<Signature, CachedShuffle>,
}

/// In-memory store with a per-layout capacity and oldest-first eviction.
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    layouts: RwLock<FxHashMap<String, Bucket>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            layouts: RwLock::new(FxHashMap::default()),
        }
    }

    /// Number of entries held for `layout`.
    pub fn len(&self, layout: &str) -> usize {
        let layouts = self.layouts.read().unwrap_or_else(PoisonError::into_inner);
        layouts.get(layout).map_or(0, |bucket| bucket.entries.len())
    }

    /// All entries, grouped by layout, oldest first.
    fn snapshot(&self) -> BTreeMap<String, Vec<StoredEntry>> {
        let layouts = self.layouts.read().unwrap_or_else(PoisonError::into_inner);
        layouts
            .iter()
            .map(|(name, bucket)| {
                let entries = bucket
                    .order
                    .iter()
                    .filter_map(|signature| {
                        bucket.entries.get(signature).map(|entry| StoredEntry {
                            signature: signature.clone(),
                            remaining: entry.remaining.clone(),
                            positions: entry.positions.clone(),
                            kinds: entry.kinds.clone(),
                        })
                    })
                    .collect();
                (name.clone(), entries)
            })
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::CACHE_CAPACITY)
    }
}

impl ShuffleStore for MemoryStore {
    fn lookup(&self, layout: &str, signature: &Signature) -> Option<CachedShuffle> {
        let layouts = self.layouts.read().unwrap_or_else(PoisonError::into_inner);
        layouts.get(layout)?.entries.get(signature).cloned()
    }

    fn save(&self, layout: &str, signature: Signature, entry: CachedShuffle) {
        if self.capacity == 0 {
            return;
        }
        let mut layouts = self.layouts.write().unwrap_or_else(PoisonError::into_inner);
        let bucket = layouts.entry(layout.to_string()).or_default();
        if bucket.entries.insert(signature.clone(), entry).is_none() {
            bucket.order.push_back(signature);
        }
        while bucket.order.len() > self.capacity {
            if let Some(oldest) = bucket.order.pop_front() {
                bucket.entries.remove(&oldest);
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    signature: Signature,
    remaining: Vec<TileId>,
    positions: Vec<Position>,
    kinds: Vec<Kind>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    layouts: BTreeMap<String, Vec<StoredEntry>>,
}

/// A [`MemoryStore`] mirrored to a JSON file.
///
/// Persistence is best effort: a missing, unreadable or corrupt file starts an
/// empty cache, and write failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (or starts) the cache file at `path`.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let memory = MemoryStore::new(capacity);
        match load_file(&path) {
            Ok(Some(file)) => {
                let mut loaded = 0;
                for (layout, entries) in file.layouts {
                    for stored in entries {
                        memory.save(
                            &layout,
                            stored.signature,
                            CachedShuffle {
                                remaining: stored.remaining,
                                positions: stored.positions,
                                kinds: stored.kinds,
                            },
                        );
                        loaded += 1;
                    }
                }
                log::debug!("loaded {loaded} cached shuffles from {}", path.display());
            }
            Ok(None) => {}
            Err(e) => log::warn!("ignoring shuffle cache {}: {e}", path.display()),
        }
        Self {
            path,
            memory,
            write_lock: Mutex::new(()),
        }
    }

    /// The per-user default location, if the platform has a cache directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("shanghai").join("shuffles.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self, layout: &str) -> usize {
        self.memory.len(layout)
    }

    fn persist(&self) -> io::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let file = CacheFile {
            version: FILE_VERSION,
            layouts: self.memory.snapshot(),
        };
        let json = serde_json::to_string(&file).map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)
    }
}

impl ShuffleStore for FileStore {
    fn lookup(&self, layout: &str, signature: &Signature) -> Option<CachedShuffle> {
        self.memory.lookup(layout, signature)
    }

    fn save(&self, layout: &str, signature: Signature, entry: CachedShuffle) {
        self.memory.save(layout, signature, entry);
        if let Err(e) = self.persist() {
            log::warn!("failed to write shuffle cache {}: {e}", self.path.display());
        }
    }
}

/// Reads a cache file; `Ok(None)` when it does not exist yet.
fn load_file(path: &Path) -> io::Result<Option<CacheFile>> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let file: CacheFile = serde_json::from_str(&json).map_err(io::Error::other)?;
    if file.version != FILE_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported version {}", file.version),
        ));
    }
    Ok(Some(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::Honor;

    /// Positions for `ids` laid out along one row.
    fn row(ids: &[u32]) -> Vec<Position> {
        ids.iter().map(|&i| Position::new(0, 0, i as i32)).collect()
    }

    fn entry(ids: &[u32], kinds: &[&str]) -> CachedShuffle {
        CachedShuffle {
            remaining: ids.iter().map(|&i| TileId(i)).collect(),
            positions: row(ids),
            kinds: kinds.iter().map(|k| k.parse().unwrap()).collect(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("shanghai-cache-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = Signature::of([TileId(3), TileId(70), TileId(1)]);
        let b = Signature::of([TileId(70), TileId(1), TileId(3)]);
        assert_eq!(a, b);
        assert_ne!(a, Signature::of([TileId(3), TileId(1)]));
        assert_eq!(
            Signature::of([TileId(0), TileId(1)]).as_str(),
            "0000000000000003"
        );
        assert_eq!(Signature::of(Vec::<TileId>::new()).as_str(), "");
    }

    #[test]
    fn test_memory_store_roundtrip_per_layout() {
        let store = MemoryStore::new(4);
        let signature = Signature::of([TileId(0), TileId(1)]);
        store.save("turtle", signature.clone(), entry(&[0, 1], &["E", "E"]));
        assert_eq!(
            store.lookup("turtle", &signature),
            Some(entry(&[0, 1], &["E", "E"]))
        );
        assert_eq!(store.lookup("pyramid", &signature), None);
    }

    #[test]
    fn test_memory_store_evicts_oldest() {
        let store = MemoryStore::new(2);
        let signatures: Vec<Signature> = (0..3)
            .map(|i| Signature::of([TileId(i), TileId(i + 10)]))
            .collect();
        for (i, signature) in signatures.iter().enumerate() {
            let i = i as u32;
            store.save("flat", signature.clone(), entry(&[i, i + 10], &["N", "N"]));
        }
        assert_eq!(store.len("flat"), 2);
        assert!(store.lookup("flat", &signatures[0]).is_none(), "oldest entry evicted");
        assert!(store.lookup("flat", &signatures[2]).is_some());
    }

    #[test]
    fn test_resave_replaces_without_growing() {
        let store = MemoryStore::new(2);
        let signature = Signature::of([TileId(0), TileId(1)]);
        store.save("flat", signature.clone(), entry(&[0, 1], &["N", "N"]));
        store.save("flat", signature.clone(), entry(&[0, 1], &["E", "E"]));
        assert_eq!(store.len("flat"), 1);
        assert_eq!(
            store.lookup("flat", &signature).unwrap().kinds,
            vec![Kind::Honor(Honor::East); 2]
        );
    }

    #[test]
    fn test_fits_requires_same_ids_and_kind_multiset() {
        let cached = entry(&[2, 5, 7, 9], &["D1", "D2", "D2", "D1"]);
        let ids: Vec<TileId> = [2, 5, 7, 9].map(TileId).to_vec();
        let live: Vec<Kind> = ["D2", "D1", "D1", "D2"].iter().map(|k| k.parse().unwrap()).collect();
        let positions = row(&[2, 5, 7, 9]);
        assert!(cached.fits(&ids, &positions, &live));

        let other_kinds: Vec<Kind> = ["D3", "D1", "D1", "D3"].iter().map(|k| k.parse().unwrap()).collect();
        assert!(!cached.fits(&ids, &positions, &other_kinds), "different kinds are stale");

        let other_ids: Vec<TileId> = [2, 5, 7, 8].map(TileId).to_vec();
        assert!(!cached.fits(&other_ids, &positions, &live), "different tiles are stale");
    }

    #[test]
    fn test_fits_requires_same_positions() {
        let cached = entry(&[0, 1, 2, 3], &["D2", "D1", "D1", "D2"]);
        let ids: Vec<TileId> = [0, 1, 2, 3].map(TileId).to_vec();
        let live: Vec<Kind> = ["D1", "D1", "D2", "D2"].iter().map(|k| k.parse().unwrap()).collect();
        let stacks = [(0, 0, 0), (1, 0, 0), (0, 0, 5), (1, 0, 5)].map(Position::from);
        assert!(
            !cached.fits(&ids, &stacks, &live),
            "an assignment proven on another geometry is stale"
        );
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let path = temp_path("persist.json");
        let _ = fs::remove_file(&path);
        let signature = Signature::of([TileId(4), TileId(6)]);
        {
            let store = FileStore::open(&path, 8);
            store.save("easy", signature.clone(), entry(&[4, 6], &["F1", "F1"]));
        }
        let reopened = FileStore::open(&path, 8);
        assert_eq!(reopened.len("easy"), 1);
        assert_eq!(
            reopened.lookup("easy", &signature),
            Some(entry(&[4, 6], &["F1", "F1"]))
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_ignores_entries_without_positions() {
        let path = temp_path("v1.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let v1 = r#"{"version":1,"layouts":{"easy":[{"signature":"3","remaining":["t0","t1"],"kinds":["E","E"]}]}}"#;
        fs::write(&path, v1).unwrap();
        let store = FileStore::open(&path, 8);
        assert_eq!(store.len("easy"), 0);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let path = temp_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let store = FileStore::open(&path, 8);
        assert_eq!(store.len("turtle"), 0);
        let _ = fs::remove_file(&path);
    }
}
