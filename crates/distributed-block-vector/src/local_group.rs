//! In-process process group: one OS thread per rank.
//!
//! [`LocalGroup::run`] executes the same closure on every rank in lock-step,
//! SPMD style, with a [`ThreadComm`] connecting the ranks. Collectives meet at
//! a generation-counted rendezvous; the last rank to arrive publishes the
//! round and wakes the others.
//!
//! A rank that panics aborts the group so peers blocked in a collective get a
//! `Communication` error instead of waiting forever; the panic is re-raised
//! from `run` once every rank has stopped. The same happens when a rank
//! returns while its peers still wait for it in a collective.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use block_vector::{BlockVectorError, Result};
use tracing::{debug, trace, warn};

use crate::comm::Communicator;

type Slot = Box<dyn Any + Send + Sync>;

/// Options for [`LocalGroup::with_options`].
#[derive(Debug, Clone)]
pub struct LocalGroupOptions {
    /// Number of ranks.
    pub size: usize,
    /// Thread name prefix; rank `r` runs on thread `"{thread_name}-{r}"`.
    pub thread_name: String,
}

impl Default for LocalGroupOptions {
    fn default() -> Self {
        Self {
            size: 1,
            thread_name: "rank".to_string(),
        }
    }
}

impl LocalGroupOptions {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

struct RoundState {
    generation: u64,
    arrived: usize,
    departed: usize,
    aborted: bool,
    slots: Vec<Option<Slot>>,
    published: Arc<Vec<Slot>>,
}

struct Rendezvous {
    size: usize,
    state: Mutex<RoundState>,
    ready: Condvar,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Self {
            size,
            state: Mutex::new(RoundState {
                generation: 0,
                arrived: 0,
                departed: 0,
                aborted: false,
                slots: (0..size).map(|_| None).collect(),
                published: Arc::new(Vec::new()),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RoundState>> {
        self.state
            .lock()
            .map_err(|_| BlockVectorError::Communication("rendezvous lock poisoned".into()))
    }

    /// True when the open round can no longer complete.
    fn stalled(&self, state: &RoundState) -> bool {
        state.aborted || (state.arrived > 0 && state.arrived + state.departed >= self.size)
    }

    fn exchange(&self, rank: usize, slot: Slot) -> Result<Arc<Vec<Slot>>> {
        let mut state = self.lock()?;
        if state.aborted {
            return Err(aborted());
        }
        if state.slots[rank].is_some() {
            return Err(BlockVectorError::Communication(format!(
                "rank {rank} entered a collective twice"
            )));
        }
        state.slots[rank] = Some(slot);
        state.arrived += 1;
        let generation = state.generation;

        if state.arrived == self.size {
            let slots: Option<Vec<Slot>> = state.slots.iter_mut().map(Option::take).collect();
            let slots = slots.ok_or_else(|| {
                BlockVectorError::Communication("collective round lost a contribution".into())
            })?;
            state.published = Arc::new(slots);
            state.arrived = 0;
            state.generation += 1;
            trace!(generation, "collective round complete");
            self.ready.notify_all();
            return Ok(Arc::clone(&state.published));
        }

        if self.stalled(&state) {
            state.aborted = true;
            self.ready.notify_all();
            return Err(aborted());
        }

        let state = self
            .ready
            .wait_while(state, |s| s.generation == generation && !self.stalled(s))
            .map_err(|_| BlockVectorError::Communication("rendezvous lock poisoned".into()))?;
        if state.generation == generation {
            return Err(aborted());
        }
        Ok(Arc::clone(&state.published))
    }

    fn depart(&self, panicked: bool) {
        // Poisoning cannot leave the state inconsistent: no code panics while
        // holding the lock.
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.departed += 1;
        if panicked {
            state.aborted = true;
        }
        if self.stalled(&state) {
            state.aborted = true;
        }
        self.ready.notify_all();
    }
}

fn aborted() -> BlockVectorError {
    BlockVectorError::Communication("process group aborted".into())
}

/// Communicator handed to each rank by [`LocalGroup`].
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    rendezvous: Arc<Rendezvous>,
}

impl fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather<V>(&self, value: V) -> Result<Vec<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let published = self.rendezvous.exchange(self.rank, Box::new(value))?;
        published
            .iter()
            .map(|slot| {
                slot.downcast_ref::<V>().cloned().ok_or_else(|| {
                    BlockVectorError::Communication(format!(
                        "ranks disagree on collective payload type (expected {})",
                        std::any::type_name::<V>()
                    ))
                })
            })
            .collect()
    }
}

/// Runs SPMD closures over an in-process group of ranks.
pub struct LocalGroup;

impl LocalGroup {
    /// Run `f` on `size` ranks and collect the per-rank results by rank.
    ///
    /// # Errors
    /// Returns an error if `size` is zero or a rank thread cannot be spawned.
    ///
    /// # Panics
    /// Re-raises the first panic raised by any rank.
    pub fn run<R, F>(size: usize, f: F) -> Result<Vec<R>>
    where
        F: Fn(ThreadComm) -> R + Send + Sync,
        R: Send,
    {
        Self::with_options(LocalGroupOptions::default().with_size(size), f)
    }

    /// Like [`LocalGroup::run`], with explicit options.
    pub fn with_options<R, F>(options: LocalGroupOptions, f: F) -> Result<Vec<R>>
    where
        F: Fn(ThreadComm) -> R + Send + Sync,
        R: Send,
    {
        let size = options.size;
        if size == 0 {
            return Err(BlockVectorError::Communication(
                "process group must have at least one rank".into(),
            ));
        }
        debug!(size, name = %options.thread_name, "starting local process group");
        let rendezvous = Arc::new(Rendezvous::new(size));

        let outcomes = thread::scope(|s| {
            let mut handles = Vec::with_capacity(size);
            for rank in 0..size {
                let f = &f;
                let comm = ThreadComm {
                    rank,
                    size,
                    rendezvous: Arc::clone(&rendezvous),
                };
                let spawned = thread::Builder::new()
                    .name(format!("{}-{rank}", options.thread_name))
                    .spawn_scoped(s, move || {
                        let rendezvous = Arc::clone(&comm.rendezvous);
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(comm)));
                        if outcome.is_err() {
                            warn!(rank, "rank panicked; aborting process group");
                        }
                        rendezvous.depart(outcome.is_err());
                        outcome
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // Ranks already running would wait for this one.
                        rendezvous.depart(true);
                        return Err(BlockVectorError::Communication(format!(
                            "failed to spawn rank {rank}: {e}"
                        )));
                    }
                }
            }
            Ok(handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(Err))
                .collect::<Vec<_>>())
        })?;

        let mut results = Vec::with_capacity(size);
        let mut first_panic: Option<Box<dyn Any + Send>> = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(payload) => {
                    first_panic.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
        debug!(size, "local process group finished");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_vector::ReduceOp;

    #[test]
    fn test_all_gather_orders_by_rank() {
        let out = LocalGroup::run(4, |comm| comm.all_gather(comm.rank() * 10).unwrap()).unwrap();
        for gathered in out {
            assert_eq!(gathered, vec![0, 10, 20, 30]);
        }
    }

    #[test]
    fn test_repeated_collectives() {
        let out = LocalGroup::run(3, |comm| {
            let mut acc = 0.0;
            for round in 0..50 {
                acc += comm
                    .all_reduce((comm.rank() + round) as f64, ReduceOp::Sum)
                    .unwrap();
            }
            comm.barrier().unwrap();
            acc
        })
        .unwrap();
        // each round sums to 3 + 3 * round
        let expected: f64 = (0..50).map(|r| 3.0 + 3.0 * r as f64).sum();
        assert_eq!(out, vec![expected; 3]);
    }

    #[test]
    fn test_reduce_ops_and_broadcast() {
        let out = LocalGroup::run(3, |comm| {
            let r = comm.rank() as f64;
            (
                comm.all_reduce(r, ReduceOp::Max).unwrap(),
                comm.all_reduce(r + 1.0, ReduceOp::Product).unwrap(),
                comm.all_reduce(comm.rank() == 1, ReduceOp::LogicalOr).unwrap(),
                comm.all_reduce(comm.rank() == 1, ReduceOp::LogicalAnd).unwrap(),
                comm.broadcast(comm.rank(), 2).unwrap(),
            )
        })
        .unwrap();
        for o in out {
            assert_eq!(o, (2.0, 6.0, true, false, 2));
        }
    }

    #[test]
    fn test_undefined_reduce_op_errors() {
        let out = LocalGroup::run(2, |comm| comm.all_reduce(true, ReduceOp::Sum)).unwrap();
        assert!(out.iter().all(|r| r.is_err()));
    }

    #[test]
    fn test_early_return_aborts_waiting_peers() {
        let out = LocalGroup::run(3, |comm| {
            if comm.rank() == 0 {
                return Ok(());
            }
            comm.barrier()
        })
        .unwrap();
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(BlockVectorError::Communication(_))));
        assert!(matches!(out[2], Err(BlockVectorError::Communication(_))));
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn test_panic_is_propagated() {
        let _ = LocalGroup::run(2, |comm| {
            if comm.rank() == 1 {
                panic!("boom");
            }
            comm.barrier()
        });
    }

    #[test]
    fn test_zero_size_group_rejected() {
        assert!(LocalGroup::run(0, |_comm| ()).is_err());
    }

    #[test]
    fn test_thread_names() {
        let opts = LocalGroupOptions::default()
            .with_size(2)
            .with_thread_name("worker");
        let names = LocalGroup::with_options(opts, |_comm| {
            thread::current().name().map(str::to_string)
        })
        .unwrap();
        assert_eq!(
            names,
            vec![Some("worker-0".to_string()), Some("worker-1".to_string())]
        );
    }
}
