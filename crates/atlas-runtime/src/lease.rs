use std::sync::Arc;

use atlas_geom::ChunkPos;
use atlas_world::{ChunkHost, ChunkLoadRequest, ChunkLoaded, LoadTicket};
use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;

/// Runs once the leased chunk is pinned resident.
pub type LeaseCallback = Box<dyn FnOnce(ChunkPos)>;

#[derive(Default)]
struct Lease {
    count: u32,
    pinned: bool,
    waiters: Vec<LeaseCallback>,
}

/// Counted holds on chunks. A chunk is pinned in the host exactly while its
/// count is above zero and its load has completed.
pub struct ChunkLeaseManager<H: ChunkHost> {
    host: Arc<H>,
    leases: HashMap<ChunkPos, Lease>,
    loading: HashMap<ChunkPos, LoadTicket>,
    next_ticket: LoadTicket,
    tx: Sender<ChunkLoaded>,
    rx: Receiver<ChunkLoaded>,
}

impl<H: ChunkHost> ChunkLeaseManager<H> {
    pub fn new(host: Arc<H>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            host,
            leases: HashMap::new(),
            loading: HashMap::new(),
            next_ticket: 1,
            tx,
            rx,
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Takes one hold on `chunk`. `on_ready` fires now if the chunk is already
    /// pinned or resident, otherwise from [`poll`](Self::poll) once it loads.
    pub fn acquire(&mut self, chunk: ChunkPos, on_ready: Option<LeaseCallback>) {
        let lease = self.leases.entry(chunk).or_default();
        lease.count += 1;
        if lease.pinned {
            if let Some(cb) = on_ready {
                cb(chunk);
            }
            return;
        }
        if let Some(cb) = on_ready {
            lease.waiters.push(cb);
        }
        self.ensure_loading(chunk);
    }

    /// Pins a held chunk that became resident, or starts its load if none is
    /// running. Does nothing for chunks that are not held or already pinned.
    pub fn ensure_loading(&mut self, chunk: ChunkPos) {
        if !self.leases.get(&chunk).is_some_and(|l| !l.pinned) || self.loading.contains_key(&chunk) {
            return;
        }
        if self.host.is_chunk_resident(chunk) {
            self.pin(chunk);
            return;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.loading.insert(chunk, ticket);
        log::trace!(target: "leases", "loading {} (ticket {})", chunk, ticket);
        self.host
            .load_chunk_async(chunk, ChunkLoadRequest::new(ticket, self.tx.clone()));
    }

    /// Drops one hold. Releasing a chunk that is not held does nothing.
    pub fn release(&mut self, chunk: ChunkPos) {
        let Some(lease) = self.leases.get_mut(&chunk) else {
            return;
        };
        lease.count = lease.count.saturating_sub(1);
        if lease.count > 0 {
            return;
        }
        if let Some(lease) = self.leases.remove(&chunk) {
            if lease.pinned {
                self.host.unpin_chunk(chunk);
            }
        }
    }

    /// Drops every hold. Loads in flight keep running and are discarded on
    /// completion.
    pub fn release_all(&mut self) {
        for (chunk, lease) in self.leases.drain() {
            if lease.pinned {
                self.host.unpin_chunk(chunk);
            }
        }
    }

    /// Forgets everything, including loads in flight; their completions are
    /// ignored by ticket.
    pub fn clear(&mut self) {
        self.release_all();
        self.loading.clear();
    }

    /// Applies finished loads. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let done: Vec<ChunkLoaded> = self.rx.try_iter().collect();
        let mut applied = 0;
        for ChunkLoaded { chunk, ticket } in done {
            if self.loading.get(&chunk) != Some(&ticket) {
                log::trace!(target: "leases", "stale load of {} (ticket {})", chunk, ticket);
                continue;
            }
            self.loading.remove(&chunk);
            applied += 1;
            if self.leases.contains_key(&chunk) {
                self.pin(chunk);
            }
        }
        applied
    }

    fn pin(&mut self, chunk: ChunkPos) {
        let Some(lease) = self.leases.get_mut(&chunk) else {
            return;
        };
        if !lease.pinned {
            self.host.pin_chunk(chunk);
            lease.pinned = true;
        }
        for cb in std::mem::take(&mut lease.waiters) {
            cb(chunk);
        }
    }

    pub fn count(&self, chunk: ChunkPos) -> u32 {
        self.leases.get(&chunk).map_or(0, |l| l.count)
    }

    /// Held and pinned resident.
    pub fn is_ready(&self, chunk: ChunkPos) -> bool {
        self.leases.get(&chunk).is_some_and(|l| l.pinned)
    }

    pub fn is_loading(&self, chunk: ChunkPos) -> bool {
        self.loading.contains_key(&chunk)
    }

    pub fn held_chunks(&self) -> Vec<ChunkPos> {
        let mut out: Vec<ChunkPos> = self.leases.keys().copied().collect();
        out.sort();
        out
    }

    pub fn held_count(&self) -> usize {
        self.leases.len()
    }

    pub fn pending_loads(&self) -> usize {
        self.loading.len()
    }

    /// Short human readable state of one chunk's lease.
    pub fn describe(&self, chunk: ChunkPos) -> String {
        match self.leases.get(&chunk) {
            None => format!("{chunk}: not held"),
            Some(l) => format!(
                "{chunk}: count={} pinned={} loading={} resident={}",
                l.count,
                l.pinned,
                self.is_loading(chunk),
                self.host.is_chunk_resident(chunk)
            ),
        }
    }
}
