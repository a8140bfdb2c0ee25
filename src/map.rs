//! The top-level road map: caches, seed, and persistence orchestration.
//!
//! A [`RoadMap`] owns every piece of shared mutable state: the region and
//! network caches, the current seed, the foreground generator, and a
//! background queue for disk writes. Callers hold an immutable `RoadMap`
//! and share it freely across threads.
//!
//! Regions flow through the map as immutable [`Arc`] snapshots. Disk
//! reads happen synchronously on the calling thread; writes are
//! fire-and-forget jobs on an owned worker thread that is joined when the
//! map is dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::config::GenConfig;
use crate::generator::RoadGenerator;
use crate::height::HeightSource;
use crate::io::{self, region_path, StoreResult};
use crate::network::RoadNetwork;
use crate::point::pack;
use crate::region::RoadRegion;

/// Slots in the region cache.
const REGION_CACHE: usize = 16;
/// Slots in the network identity cache.
const NETWORK_CACHE: usize = 256;

type Job = Box<dyn FnOnce() + Send>;

/// Shared access point for generated road data.
pub struct RoadMap {
    root: PathBuf,
    config: GenConfig,
    seed: AtomicI64,
    regions: Mutex<Vec<Arc<RoadRegion>>>,
    networks: Mutex<Vec<(u64, Arc<RoadNetwork>)>>,
    generator: Mutex<RoadGenerator>,
    queue: BackgroundQueue,
}

impl RoadMap {
    /// Creates a map storing data under `root` for the given seed.
    pub fn new(root: impl Into<PathBuf>, seed: i64, config: GenConfig) -> Self {
        Self {
            root: root.into(),
            seed: AtomicI64::new(seed),
            generator: Mutex::new(RoadGenerator::new(config.clone())),
            config,
            regions: Mutex::new(Vec::new()),
            networks: Mutex::new(Vec::new()),
            queue: BackgroundQueue::new(),
        }
    }

    /// The settings this map generates with.
    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The current world seed.
    pub fn seed(&self) -> i64 {
        self.seed.load(Ordering::Relaxed)
    }

    /// Re-keys the map to a new seed, dropping all in-memory caches.
    ///
    /// Persisted data is untouched; each seed has its own directories.
    pub fn set_seed(&self, seed: i64) {
        if self.seed.swap(seed, Ordering::Relaxed) != seed {
            self.clear_cache();
        }
    }

    /// Drops all cached regions and networks.
    pub fn clear_cache(&self) {
        lock(&self.regions).clear();
        lock(&self.networks).clear();
    }

    /// Deletes every persisted region and network, for all seeds, and
    /// clears the caches.
    pub fn delete_saves(&self) -> StoreResult<()> {
        self.clear_cache();
        io::delete_all(&self.root)
    }

    /// Returns the fully generated region at `(x, y)`.
    ///
    /// Served from cache when possible; otherwise loaded from disk and,
    /// when quads are still missing, completed by the foreground
    /// generator. A newly completed region is persisted in the
    /// background.
    pub fn get_region<H: HeightSource + ?Sized>(&self, gen: &H, x: i16, y: i16) -> Arc<RoadRegion> {
        // A cached partial region may hold neighbor-generated quads whose
        // background save has not landed yet, so it wins over disk.
        let loaded = match self.cached_region(x, y) {
            Some(r) if r.is_fully_generated() => return r,
            Some(r) => (*r).clone(),
            None => self.read_region(x, y),
        };
        if loaded.is_fully_generated() {
            let arc = Arc::new(loaded);
            self.cache_region(Arc::clone(&arc));
            self.register_networks(&arc);
            return arc;
        }
        let generated = {
            let mut g = lock(&self.generator);
            g.generate_region(self, gen, loaded, self.config.generate_partial)
        };
        let arc = Arc::new(generated);
        self.cache_region(Arc::clone(&arc));
        self.register_networks(&arc);
        if self.config.persist_roads {
            self.enqueue_save(Arc::clone(&arc));
        }
        arc
    }

    /// Returns the region at `(x, y)` in whatever state it is in, never
    /// generating anything. Cache reads here do not promote.
    pub(crate) fn load_partial(&self, x: i16, y: i16) -> RoadRegion {
        {
            let regions = lock(&self.regions);
            if let Some(r) = regions.iter().find(|r| r.x == x && r.y == y) {
                return (**r).clone();
            }
        }
        self.read_region(x, y)
    }

    fn read_region(&self, x: i16, y: i16) -> RoadRegion {
        match RoadRegion::load_from_disk(&self.root, self.seed(), x, y) {
            Ok(Some(r)) => r,
            Ok(None) => RoadRegion::new(x, y),
            Err(e) => {
                log::warn!("discarding unreadable region ({x}, {y}): {e}");
                RoadRegion::new(x, y)
            }
        }
    }

    /// Whether a region file exists on disk for the current seed.
    pub(crate) fn region_on_disk(&self, x: i16, y: i16) -> bool {
        region_path(&self.root, self.seed(), x, y).exists()
    }

    /// Generates a region with a caller-owned generator, bypassing the
    /// foreground generator lock. Used by pre-generation workers. The
    /// result is persisted synchronously and not cached.
    pub(crate) fn generate_detached<H: HeightSource + ?Sized>(
        &self,
        generator: &mut RoadGenerator,
        gen: &H,
        x: i16,
        y: i16,
    ) {
        let region = generator.generate_region(self, gen, self.read_region(x, y), false);
        if self.config.persist_roads {
            if let Err(e) = region.save_to_disk(&self.root, self.seed()) {
                log::error!("failed to save region ({x}, {y}): {e}");
            }
        }
    }

    /// Takes back a neighbor region that a generation pass added quads
    /// to. Caching it keeps those quads from being regenerated when the
    /// neighbor's own turn comes, and the updated quad mask is persisted.
    pub(crate) fn store_partial(&self, region: RoadRegion) {
        let arc = Arc::new(region);
        self.cache_region(Arc::clone(&arc));
        if self.config.persist_roads {
            self.enqueue_save(arc);
        }
    }

    /// Enters a freshly generated network into the identity cache and
    /// queues its write. Every pass consults the cache before building,
    /// so the first generation of an origin is the one everyone shares.
    pub(crate) fn publish_network(&self, network: &Arc<RoadNetwork>) {
        self.cache_network(network.origin_point().packed(), Arc::clone(network));
        if self.config.persist_roads {
            let root = self.root.clone();
            let seed = self.seed();
            let n = Arc::clone(network);
            self.queue.submit(Box::new(move || {
                if let Err(e) = n.save_to_disk(&root, seed) {
                    let o = n.origin_point();
                    log::error!("failed to save network {o}: {e}");
                }
            }));
        }
    }

    /// Looks up a network by its origin coordinate, reading through to
    /// disk on a cache miss.
    pub fn get_network(&self, x: i32, y: i32) -> Option<Arc<RoadNetwork>> {
        let key = pack(x, y);
        {
            let mut networks = lock(&self.networks);
            if let Some(i) = networks.iter().position(|(k, _)| *k == key) {
                let hit = networks.remove(i);
                let found = Arc::clone(&hit.1);
                networks.insert(0, hit);
                return Some(found);
            }
        }
        match RoadNetwork::load_from_disk(&self.root, self.seed(), x, y) {
            Ok(Some(n)) => {
                let arc = Arc::new(n);
                self.cache_network(key, Arc::clone(&arc));
                Some(arc)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("discarding unreadable network ({x}, {y}): {e}");
                None
            }
        }
    }

    fn cached_region(&self, x: i16, y: i16) -> Option<Arc<RoadRegion>> {
        let mut regions = lock(&self.regions);
        let i = regions.iter().position(|r| r.x == x && r.y == y)?;
        // Bubble the hit one slot toward the front.
        if i > 0 {
            regions.swap(i, i - 1);
            Some(Arc::clone(&regions[i - 1]))
        } else {
            Some(Arc::clone(&regions[0]))
        }
    }

    fn cache_region(&self, region: Arc<RoadRegion>) {
        let mut regions = lock(&self.regions);
        regions.retain(|r| !(r.x == region.x && r.y == region.y));
        regions.insert(0, region);
        regions.truncate(REGION_CACHE);
    }

    fn cache_network(&self, key: u64, network: Arc<RoadNetwork>) {
        let mut networks = lock(&self.networks);
        networks.retain(|(k, _)| *k != key);
        networks.insert(0, (key, network));
        // Eviction drops the Arc; any region still referencing the
        // network keeps it alive.
        networks.truncate(NETWORK_CACHE);
    }

    fn register_networks(&self, region: &Arc<RoadRegion>) {
        for n in region.networks() {
            self.cache_network(n.origin_point().packed(), Arc::clone(n));
        }
    }

    /// Queues a region snapshot for writing. Networks are written when
    /// published, not here.
    fn enqueue_save(&self, region: Arc<RoadRegion>) {
        let root = self.root.clone();
        let seed = self.seed();
        self.queue.submit(Box::new(move || {
            if let Err(e) = region.save_to_disk(&root, seed) {
                log::error!("failed to save region ({}, {}): {e}", region.x, region.y);
            }
        }));
    }

    /// Blocks until every queued background write has completed.
    pub fn flush(&self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.queue.submit(Box::new(move || {
            let _ = tx.send(());
        }));
        let _ = rx.recv();
    }

    pub(crate) fn submit_background(&self, job: Job) {
        self.queue.submit(job);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owned worker thread running queued closures in submission order.
///
/// Dropping the queue closes the channel and joins the worker, so every
/// submitted write lands before the owner is gone.
struct BackgroundQueue {
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundQueue {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();
        let worker = thread::Builder::new()
            .name("roadgen-io".into())
            .spawn(move || {
                for job in rx {
                    job();
                }
            })
            .ok();
        if worker.is_none() {
            log::error!("failed to spawn background worker; writes will be dropped");
        }
        Self {
            tx: worker.is_some().then_some(tx),
            worker,
        }
    }

    fn submit(&self, job: Job) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
    }
}

impl Drop for BackgroundQueue {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
