//! In-memory versioned triple store
//!
//! `MemoryStore` is the reference storage collaborator: a copy-on-write set
//! of triples where every write publishes a new immutable [`Snapshot`].
//! Readers pin the snapshot that was current when they opened, so a reader
//! never observes a write that happened after it started.
//!
//! The store also tracks how many read snapshots are open (to verify that
//! query execution releases what it acquires) and supports fault injection
//! for exercising failure paths in tests.

use crate::error::{Error, Result};
use crate::term::{Term, Triple};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Immutable, indexed view of the store at one version
#[derive(Debug, Default)]
pub struct Snapshot {
    version: u64,
    triples: Vec<Triple>,
    by_s: HashMap<Term, Vec<u32>>,
    by_p: HashMap<Term, Vec<u32>>,
    by_o: HashMap<Term, Vec<u32>>,
}

impl Snapshot {
    fn build(version: u64, triples: &BTreeSet<Triple>) -> Self {
        let triples: Vec<Triple> = triples.iter().cloned().collect();
        let mut by_s: HashMap<Term, Vec<u32>> = HashMap::new();
        let mut by_p: HashMap<Term, Vec<u32>> = HashMap::new();
        let mut by_o: HashMap<Term, Vec<u32>> = HashMap::new();
        for (idx, t) in triples.iter().enumerate() {
            let idx = idx as u32;
            by_s.entry(t.s.clone()).or_default().push(idx);
            by_p.entry(t.p.clone()).or_default().push(idx);
            by_o.entry(t.o.clone()).or_default().push(idx);
        }
        Self {
            version,
            triples,
            by_s,
            by_p,
            by_o,
        }
    }

    /// Version number (incremented by every committed write)
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Triples matching the given constants (`None` = wildcard)
    ///
    /// Uses the most selective bound position as the driving index.
    pub fn matching<'a>(
        &'a self,
        s: Option<&'a Term>,
        p: Option<&'a Term>,
        o: Option<&'a Term>,
    ) -> impl Iterator<Item = &'a Triple> + 'a {
        let driver = self.driver(s, p, o);
        (0..)
            .map_while(move |pos| self.candidate(driver, s, p, o, pos))
            .filter(move |t| t.matches(s, p, o))
    }

    /// Pick the shortest index list among the bound positions
    fn driver(&self, s: Option<&Term>, p: Option<&Term>, o: Option<&Term>) -> Driver {
        [
            (Driver::Subject, s.map(|t| self.by_s.get(t))),
            (Driver::Predicate, p.map(|t| self.by_p.get(t))),
            (Driver::Object, o.map(|t| self.by_o.get(t))),
        ]
        .into_iter()
        .filter_map(|(driver, hit)| {
            hit.map(|ids| match ids {
                Some(ids) => (driver, ids.len()),
                None => (Driver::Nothing, 0),
            })
        })
        .min_by_key(|(_, len)| *len)
        .map_or(Driver::All, |(driver, _)| driver)
    }

    /// The `pos`-th candidate of the driving index
    fn candidate(
        &self,
        driver: Driver,
        s: Option<&Term>,
        p: Option<&Term>,
        o: Option<&Term>,
        pos: usize,
    ) -> Option<&Triple> {
        let ids = match driver {
            Driver::All => return self.triples.get(pos),
            Driver::Nothing => return None,
            Driver::Subject => self.by_s.get(s?)?,
            Driver::Predicate => self.by_p.get(p?)?,
            Driver::Object => self.by_o.get(o?)?,
        };
        ids.get(pos).map(|&i| &self.triples[i as usize])
    }
}

/// Index a scan is driven by
#[derive(Debug, Clone, Copy)]
enum Driver {
    All,
    Subject,
    Predicate,
    Object,
    /// A bound position has no entry: nothing matches
    Nothing,
}

/// Lazy scan over a pinned snapshot
///
/// Owns its snapshot and constants, so it can outlive the borrow that
/// created it and be pulled one triple at a time.
#[derive(Debug)]
pub struct SnapshotScan {
    snapshot: Arc<Snapshot>,
    s: Option<Term>,
    p: Option<Term>,
    o: Option<Term>,
    driver: Driver,
    pos: usize,
}

impl Iterator for SnapshotScan {
    type Item = Triple;

    fn next(&mut self) -> Option<Triple> {
        let (s, p, o) = (self.s.as_ref(), self.p.as_ref(), self.o.as_ref());
        loop {
            let triple = self.snapshot.candidate(self.driver, s, p, o, self.pos)?;
            self.pos += 1;
            if triple.matches(s, p, o) {
                return Some(triple.clone());
            }
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Number of upcoming `read()` calls that fail
    failing_reads: usize,
    /// Number of successful scans before scans start failing
    scans_before_failure: Option<usize>,
}

#[derive(Debug)]
struct StoreInner {
    /// Working set, only touched under the write path
    triples: Mutex<BTreeSet<Triple>>,
    current: RwLock<Arc<Snapshot>>,
    next_version: AtomicU64,
    open_readers: AtomicUsize,
    reads_opened: AtomicU64,
    faults: Mutex<Faults>,
}

/// A copy-on-write in-memory triple store
///
/// Cloning is cheap and shares the underlying store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                triples: Mutex::new(BTreeSet::new()),
                current: RwLock::new(Arc::new(Snapshot::default())),
                next_version: AtomicU64::new(1),
                open_readers: AtomicUsize::new(0),
                reads_opened: AtomicU64::new(0),
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    /// Create a store pre-populated with triples
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let store = Self::new();
        store.transact(|w| {
            for t in triples {
                w.insert(t);
            }
        });
        store
    }

    /// Apply a batch of changes atomically and publish a new snapshot.
    ///
    /// Returns the version of the published snapshot.
    pub fn transact(&self, f: impl FnOnce(&mut WriteBatch<'_>)) -> u64 {
        let mut triples = self.inner.triples.lock();
        let mut batch = WriteBatch {
            triples: &mut triples,
            changed: false,
        };
        f(&mut batch);

        if !batch.changed {
            return self.inner.current.read().version;
        }

        let version = self.inner.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(Snapshot::build(version, &triples));
        *self.inner.current.write() = snapshot;
        tracing::trace!(version, len = triples.len(), "published snapshot");
        version
    }

    /// Insert a single triple; returns true if it was not present
    pub fn insert(&self, triple: Triple) -> bool {
        let mut inserted = false;
        self.transact(|w| inserted = w.insert(triple));
        inserted
    }

    /// Remove a single triple; returns true if it was present
    pub fn remove(&self, triple: &Triple) -> bool {
        let mut removed = false;
        self.transact(|w| removed = w.remove(triple));
        removed
    }

    /// Number of triples in the current snapshot
    pub fn len(&self) -> usize {
        self.inner.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a read snapshot pinned to the current version.
    ///
    /// The snapshot stays valid (and counted as open) until the returned
    /// handle is dropped, regardless of later writes.
    pub fn read(&self) -> Result<ReadSnapshot> {
        {
            let mut faults = self.inner.faults.lock();
            if faults.failing_reads > 0 {
                faults.failing_reads -= 1;
                return Err(Error::storage("injected read failure"));
            }
        }

        let snapshot = self.inner.current.read().clone();
        self.inner.open_readers.fetch_add(1, Ordering::SeqCst);
        self.inner.reads_opened.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(version = snapshot.version, "opened read snapshot");
        Ok(ReadSnapshot {
            snapshot,
            store: self.inner.clone(),
        })
    }

    /// Number of read snapshots currently open
    pub fn open_readers(&self) -> usize {
        self.inner.open_readers.load(Ordering::SeqCst)
    }

    /// Total number of read snapshots opened so far
    pub fn reads_opened(&self) -> u64 {
        self.inner.reads_opened.load(Ordering::SeqCst)
    }

    /// Make the next `n` calls to [`read`](Self::read) fail
    pub fn fail_next_reads(&self, n: usize) {
        self.inner.faults.lock().failing_reads = n;
    }

    /// Let `n` more scans succeed, then fail every scan
    pub fn fail_scans_after(&self, n: usize) {
        self.inner.faults.lock().scans_before_failure = Some(n);
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = Faults::default();
    }
}

/// Mutable view handed to [`MemoryStore::transact`]
pub struct WriteBatch<'a> {
    triples: &'a mut BTreeSet<Triple>,
    changed: bool,
}

impl WriteBatch<'_> {
    pub fn insert(&mut self, triple: Triple) -> bool {
        let inserted = self.triples.insert(triple);
        self.changed |= inserted;
        inserted
    }

    pub fn remove(&mut self, triple: &Triple) -> bool {
        let removed = self.triples.remove(triple);
        self.changed |= removed;
        removed
    }

    pub fn clear(&mut self) {
        self.changed |= !self.triples.is_empty();
        self.triples.clear();
    }
}

/// An open, pinned read snapshot
///
/// Dropping the handle releases the reader.
#[derive(Debug)]
pub struct ReadSnapshot {
    snapshot: Arc<Snapshot>,
    store: Arc<StoreInner>,
}

impl ReadSnapshot {
    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    /// Shared handle to the pinned snapshot
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Scan the pinned snapshot for triples matching the given constants.
    ///
    /// Triples are produced lazily as the returned iterator is advanced.
    pub fn scan(
        &self,
        s: Option<&Term>,
        p: Option<&Term>,
        o: Option<&Term>,
    ) -> Result<SnapshotScan> {
        {
            let mut faults = self.store.faults.lock();
            if let Some(remaining) = faults.scans_before_failure.as_mut() {
                if *remaining == 0 {
                    return Err(Error::storage("injected scan failure"));
                }
                *remaining -= 1;
            }
        }
        Ok(SnapshotScan {
            driver: self.snapshot.driver(s, p, o),
            snapshot: self.snapshot.clone(),
            s: s.cloned(),
            p: p.cloned(),
            o: o.cloned(),
            pos: 0,
        })
    }
}

impl Drop for ReadSnapshot {
    fn drop(&mut self) {
        self.store.open_readers.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(version = self.snapshot.version, "released read snapshot");
    }
}
