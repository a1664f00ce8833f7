//! Serial execution lanes
//!
//! A [`Lane`] is a dedicated OS thread draining a job queue in FIFO order.
//! Lanes are the confinement unit for contexts: a context records the lane
//! it was created on and every entry point checks [`Lane::current`] against
//! it. The engine owns one root lane (root context, notifier delivery,
//! query refresh) plus a bounded pool of worker lanes for units of work.

use loam_core::{Error, LaneId, Result};
use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A unit of work dispatched to a lane.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_LANE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_LANE: Cell<Option<u64>> = const { Cell::new(None) };
}

/// A serial executor bound to one OS thread.
pub struct Lane {
    id: LaneId,
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
    /// Spawn a new lane.
    pub fn spawn(name: impl Into<String>) -> Arc<Lane> {
        let name = name.into();
        let id = LaneId::from_raw(NEXT_LANE_ID.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = channel::<Job>();
        let thread_name = name.clone();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                CURRENT_LANE.with(|cell| cell.set(Some(id.as_u64())));
                while let Ok(job) = rx.recv() {
                    job();
                }
                tracing::debug!(lane = %id, name = %thread_name, "lane drained and stopped");
            })
            .expect("failed to spawn lane thread");
        tracing::debug!(lane = %id, name = %name, "lane spawned");
        Arc::new(Lane {
            id,
            name,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// This lane's id.
    pub fn id(&self) -> LaneId {
        self.id
    }

    /// This lane's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lane the calling thread belongs to, if any.
    pub fn current() -> Option<LaneId> {
        CURRENT_LANE.with(|cell| cell.get().map(LaneId::from_raw))
    }

    /// Describe the calling thread for confinement diagnostics.
    pub fn caller_description() -> String {
        match Lane::current() {
            Some(lane) => lane.to_string(),
            None => "unmanaged thread".to_string(),
        }
    }

    /// Enqueue a job. Jobs run in dispatch order.
    pub fn dispatch(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| Error::Internal(format!("lane {} stopped", self.id))),
            None => Err(Error::Internal(format!("lane {} shut down", self.id))),
        }
    }

    /// Run a closure on this lane and wait for its result.
    ///
    /// Runs inline when already on this lane, so a job may re-enter its own
    /// lane (the coordinator's short re-entrant flush relies on this).
    pub fn run_sync<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if Lane::current() == Some(self.id) {
            return Ok(f());
        }
        let (tx, rx) = channel();
        self.dispatch(Box::new(move || {
            // Receiver gone means the caller stopped waiting; nothing to do.
            let _ = tx.send(f());
        }))?;
        rx.recv()
            .map_err(|_| Error::Internal(format!("lane {} dropped job", self.id)))
    }

    /// Stop accepting jobs, drain the queue, and join the thread.
    pub fn shutdown(&self) {
        let sender = self.sender.lock().take();
        drop(sender);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lane")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// A bounded, round-robin pool of worker lanes.
pub struct LanePool {
    lanes: Vec<Arc<Lane>>,
    next: AtomicUsize,
}

impl LanePool {
    /// Spawn `size` worker lanes (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let lanes = (0..size)
            .map(|i| Lane::spawn(format!("loam-worker-{}", i)))
            .collect();
        LanePool {
            lanes,
            next: AtomicUsize::new(0),
        }
    }

    /// Pick the next lane round-robin.
    pub fn checkout(&self) -> Arc<Lane> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.lanes.len();
        self.lanes[idx].clone()
    }

    /// Number of lanes in the pool.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// Always false: the pool holds at least one lane.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Shut down all lanes.
    pub fn shutdown(&self) {
        for lane in &self.lanes {
            lane.shutdown();
        }
    }
}
