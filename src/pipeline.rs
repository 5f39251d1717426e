// Three-stage pipeline: load -> transform -> compare.
//
// Genomes live in a slot arena; the queues between stages carry only slot
// indices. Loaders parse proteome files into dense counts, transformers
// collapse them into sparse signatures, comparators pair each signature
// with every earlier one and fill the correlation matrix.
//
// The raw queue is the memory throttle: its capacity plus the two pool
// sizes bounds how many dense count arrays exist at once.

use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use rayon::prelude::*;

use crate::correlation;
use crate::counts::{ProteomeCounter, RawCounts};
use crate::error::{PhylosigError, Result};
use crate::matrix::CorrelationMatrix;
use crate::queue::BoundedQueue;
use crate::signature::{self, Signature};

/// Worker pool sizes for the three stages.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub loaders: usize,
    pub transformers: usize,
    pub comparators: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            loaders: 2,
            transformers: 2,
            comparators: 4,
        }
    }
}

/// Per-genome progression through the pipeline. Transitions are monotonic;
/// a slot never moves backwards.
enum SlotState {
    Unloaded,
    Counted(RawCounts),
    Transforming,
    Signed {
        sig: Arc<Signature>,
        /// Pair comparisons this signature still participates in.
        remaining: usize,
    },
    Retired,
}

impl SlotState {
    fn name(&self) -> &'static str {
        match self {
            SlotState::Unloaded => "Unloaded",
            SlotState::Counted(_) => "Counted",
            SlotState::Transforming => "Transforming",
            SlotState::Signed { .. } => "Signed",
            SlotState::Retired => "Retired",
        }
    }
}

struct SlotTableState {
    slots: Vec<SlotState>,
    aborted: bool,
}

/// Slot arena shared by all workers. One mutex guards every slot; the
/// condvar signals newly published signatures and aborts.
struct SlotTable {
    state: Mutex<SlotTableState>,
    signed: Condvar,
}

impl SlotTable {
    fn new(n: usize) -> Self {
        SlotTable {
            state: Mutex::new(SlotTableState {
                slots: (0..n).map(|_| SlotState::Unloaded).collect(),
                aborted: false,
            }),
            signed: Condvar::new(),
        }
    }

    fn abort(&self) {
        self.state.lock().unwrap().aborted = true;
        self.signed.notify_all();
    }

    fn store_counts(&self, i: usize, counts: RawCounts) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match &state.slots[i] {
            SlotState::Unloaded => {
                state.slots[i] = SlotState::Counted(counts);
                Ok(())
            }
            other => Err(bad_state(i, other, "Unloaded")),
        }
    }

    fn take_counts(&self, i: usize) -> Result<RawCounts> {
        let mut state = self.state.lock().unwrap();
        match std::mem::replace(&mut state.slots[i], SlotState::Transforming) {
            SlotState::Counted(counts) => Ok(counts),
            other => {
                let err = bad_state(i, &other, "Counted");
                state.slots[i] = other;
                Err(err)
            }
        }
    }

    /// Publish a signature and wake comparators waiting on it. A genome
    /// with no pairs left to compute retires on the spot.
    fn publish(&self, i: usize, sig: Signature, pairs: usize) {
        let mut state = self.state.lock().unwrap();
        state.slots[i] = if pairs == 0 {
            SlotState::Retired
        } else {
            SlotState::Signed {
                sig: Arc::new(sig),
                remaining: pairs,
            }
        };
        drop(state);
        self.signed.notify_all();
    }

    /// Block until genome `i` and every genome before it are signed, then
    /// hand back their signatures. Returns `None` on abort.
    ///
    /// No slot in `0..=i` can retire before this call returns: retirement
    /// needs all of a genome's pairs done, and the pairs against genome
    /// `i` are computed only after this collect.
    fn collect_ready(&self, i: usize) -> Option<(Arc<Signature>, Vec<Arc<Signature>>)> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.aborted {
                return None;
            }
            let all_signed = state.slots[..=i]
                .iter()
                .all(|s| matches!(s, SlotState::Signed { .. }));
            if all_signed {
                let mut sigs = state.slots[..=i].iter().map(|s| match s {
                    SlotState::Signed { sig, .. } => Arc::clone(sig),
                    _ => unreachable!(),
                });
                let earlier: Vec<Arc<Signature>> = sigs.by_ref().take(i).collect();
                let own = sigs.next().unwrap();
                return Some((own, earlier));
            }
            state = self.signed.wait(state).unwrap();
        }
    }

    /// Record that the pair (i, j) has been written; a slot whose last
    /// pair completes drops its signature.
    fn release_pair(&self, i: usize, j: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for k in [i, j] {
            let slot = &mut state.slots[k];
            let retire = match slot {
                SlotState::Signed { remaining, .. } => {
                    *remaining -= 1;
                    *remaining == 0
                }
                other => return Err(bad_state(k, other, "Signed")),
            };
            if retire {
                *slot = SlotState::Retired;
            }
        }
        Ok(())
    }
}

fn bad_state(i: usize, found: &SlotState, expected: &str) -> PhylosigError {
    PhylosigError::InternalInvariant(format!(
        "slot {i} is {} but {expected} was expected",
        found.name()
    ))
}

/// Everything the worker pools share.
struct PipelineCtx {
    paths: Vec<PathBuf>,
    slots: SlotTable,
    work: BoundedQueue<usize>,
    raw: BoundedQueue<usize>,
    ready: BoundedQueue<usize>,
    matrix: Mutex<CorrelationMatrix>,
    failure: Mutex<Option<PhylosigError>>,
}

impl PipelineCtx {
    fn n(&self) -> usize {
        self.paths.len()
    }

    fn aborted(&self) -> bool {
        self.failure.lock().unwrap().is_some()
    }

    /// Record the first fatal error and wake every worker so the run can
    /// unwind.
    fn fail(&self, e: PhylosigError) {
        log::error!("pipeline failure: {e}");
        let mut failure = self.failure.lock().unwrap();
        if failure.is_none() {
            *failure = Some(e);
        }
        drop(failure);
        self.work.set_shutdown();
        self.raw.set_shutdown();
        self.ready.set_shutdown();
        self.slots.abort();
    }
}

/// Drive every genome through the three stages and return the filled
/// lower-triangular correlation matrix.
pub fn run(paths: Vec<PathBuf>, pools: &PoolConfig) -> Result<CorrelationMatrix> {
    let n = paths.len();
    if n == 0 {
        return Ok(CorrelationMatrix::new(0));
    }

    let ctx = Arc::new(PipelineCtx {
        slots: SlotTable::new(n),
        work: BoundedQueue::new(n),
        raw: BoundedQueue::new(pools.loaders.max(pools.transformers)),
        ready: BoundedQueue::new(n),
        matrix: Mutex::new(CorrelationMatrix::new(n)),
        failure: Mutex::new(None),
        paths,
    });

    // The work queue is pre-filled; loaders drain it and exit on None.
    for i in 0..n {
        ctx.work.enqueue(i);
    }
    ctx.work.set_shutdown();

    let loaders = spawn_pool(pools.loaders, &ctx, loader_worker);
    let transformers = spawn_pool(pools.transformers, &ctx, transform_worker);
    let comparators = spawn_pool(pools.comparators, &ctx, compare_worker);

    // Each stage closes the next queue once its pool has drained.
    join_pool(loaders, &ctx);
    ctx.raw.set_shutdown();
    join_pool(transformers, &ctx);
    ctx.ready.set_shutdown();
    join_pool(comparators, &ctx);

    if let Some(e) = ctx.failure.lock().unwrap().take() {
        return Err(e);
    }

    let ctx = Arc::into_inner(ctx).ok_or_else(|| {
        PhylosigError::InternalInvariant("pipeline context still shared after join".to_string())
    })?;
    Ok(ctx.matrix.into_inner().unwrap())
}

fn spawn_pool(
    size: usize,
    ctx: &Arc<PipelineCtx>,
    body: fn(&PipelineCtx),
) -> Vec<JoinHandle<()>> {
    (0..size)
        .map(|_| {
            let ctx = Arc::clone(ctx);
            thread::spawn(move || body(&ctx))
        })
        .collect()
}

fn join_pool(handles: Vec<JoinHandle<()>>, ctx: &PipelineCtx) {
    for handle in handles {
        if handle.join().is_err() {
            ctx.fail(PhylosigError::InternalInvariant(
                "pipeline worker panicked".to_string(),
            ));
        }
    }
}

fn loader_worker(ctx: &PipelineCtx) {
    let n = ctx.n();
    while let Some(i) = ctx.work.dequeue() {
        if ctx.aborted() {
            return;
        }
        log::info!("load {} of {}", i + 1, n);
        match ProteomeCounter::count_from_file(&ctx.paths[i]) {
            Ok(counts) => {
                if let Err(e) = ctx.slots.store_counts(i, counts) {
                    return ctx.fail(e);
                }
                ctx.raw.enqueue(i);
            }
            Err(e) => return ctx.fail(e),
        }
    }
}

fn transform_worker(ctx: &PipelineCtx) {
    while let Some(i) = ctx.raw.dequeue() {
        if ctx.aborted() {
            return;
        }
        let counts = match ctx.slots.take_counts(i) {
            Ok(counts) => counts,
            Err(e) => return ctx.fail(e),
        };
        let sig = signature::transform(counts);
        log::debug!("signature {} ready with {} entries", i, sig.len());
        ctx.slots.publish(i, sig, ctx.n() - 1);
        ctx.ready.enqueue(i);
    }
}

fn compare_worker(ctx: &PipelineCtx) {
    while let Some(i) = ctx.ready.dequeue() {
        if ctx.aborted() {
            return;
        }
        if i == 0 {
            continue; // nothing earlier to pair with
        }
        let Some((sig, earlier)) = ctx.slots.collect_ready(i) else {
            return; // aborted
        };
        for (j, other) in earlier.iter().enumerate() {
            let corr = correlation::compare(&sig, other);
            log::debug!("{:03} {:03} -> {:.10}", i, j, corr);
            let written = ctx
                .matrix
                .lock()
                .unwrap()
                .set(i, j, corr)
                .and_then(|()| ctx.slots.release_pair(i, j));
            if let Err(e) = written {
                return ctx.fail(e);
            }
        }
    }
}

/// Load, transform, and compare everything with the rayon pool instead of
/// the staged pipeline. Simpler and faster on small inputs, but every
/// genome's dense counts may be resident at once.
pub fn run_batch(paths: &[PathBuf]) -> Result<CorrelationMatrix> {
    let n = paths.len();
    let sigs: Vec<Signature> = paths
        .par_iter()
        .enumerate()
        .map(|(i, path)| {
            log::info!("load {} of {}", i + 1, n);
            ProteomeCounter::count_from_file(path).map(signature::transform)
        })
        .collect::<Result<_>>()?;

    let mut pairs = Vec::with_capacity(n * (n.saturating_sub(1)) / 2);
    for i in 1..n {
        for j in 0..i {
            pairs.push((i, j));
        }
    }

    let correlations: Vec<(usize, usize, f64)> = pairs
        .par_iter()
        .map(|&(i, j)| (i, j, correlation::compare(&sigs[i], &sigs[j])))
        .collect();

    let mut matrix = CorrelationMatrix::new(n);
    for (i, j, corr) in correlations {
        log::debug!("{:03} {:03} -> {:.10}", i, j, corr);
        matrix.set(i, j, corr)?;
    }
    Ok(matrix)
}
