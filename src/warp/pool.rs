//! Bounded worker pool that delivers results in job order.
//!
//! A feeder thread queues job indices on a bounded channel; each worker owns
//! its own state (a stretch backend) and sends `(index, result)` back on a
//! second bounded channel. The calling thread buffers out-of-order
//! completions and hands them to the consumer strictly by index, so the
//! consumer can mutate shared output without locks.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::thread;

use crossbeam::channel;

use crate::error::WarpError;

/// Jobs (and results) in flight per worker.
const QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Worker count for `jobs` jobs. `requested == 0` means one per available
/// core. Never more workers than jobs, never fewer than one.
pub fn effective_workers(requested: usize, jobs: usize) -> usize {
    let workers = if requested == 0 {
        thread::available_parallelism().map_or(1, NonZeroUsize::get)
    } else {
        requested
    };
    workers.min(jobs).max(1)
}

/// Runs `work` over every job and passes each result to `consume` in job
/// order. `make_state` is called once per worker.
///
/// With a single worker everything runs on the calling thread. The first
/// error from any closure stops the run and is returned; queued jobs are
/// abandoned.
pub fn run_ordered<J, S, R, M, W, C>(
    jobs: &[J],
    workers: usize,
    make_state: M,
    work: W,
    mut consume: C,
) -> Result<(), WarpError>
where
    J: Sync,
    S: Send,
    R: Send,
    M: Fn() -> Result<S, WarpError>,
    W: Fn(&mut S, &J) -> Result<R, WarpError> + Sync,
    C: FnMut(usize, R) -> Result<(), WarpError>,
{
    if jobs.is_empty() {
        return Ok(());
    }
    let workers = effective_workers(workers, jobs.len());
    if workers == 1 {
        let mut state = make_state()?;
        for (index, job) in jobs.iter().enumerate() {
            let result = work(&mut state, job)?;
            consume(index, result)?;
        }
        return Ok(());
    }

    let states = (0..workers)
        .map(|_| make_state())
        .collect::<Result<Vec<S>, _>>()?;
    let depth = workers * QUEUE_DEPTH_PER_WORKER;
    let work = &work;

    thread::scope(|scope| -> Result<(), WarpError> {
        // Both channels live inside the scope: returning early drops the
        // receivers, which unblocks and stops every worker before the join.
        let (job_tx, job_rx) = channel::bounded::<usize>(depth);
        let (result_tx, result_rx) = channel::bounded::<(usize, Result<R, WarpError>)>(depth);

        thread::Builder::new()
            .name("beatwarp-feeder".to_string())
            .spawn_scoped(scope, move || {
                for index in 0..jobs.len() {
                    if job_tx.send(index).is_err() {
                        break;
                    }
                }
            })?;

        for (worker, mut state) in states.into_iter().enumerate() {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            thread::Builder::new()
                .name(format!("beatwarp-worker-{}", worker))
                .spawn_scoped(scope, move || {
                    for index in job_rx.iter() {
                        let result = work(&mut state, &jobs[index]);
                        let failed = result.is_err();
                        if result_tx.send((index, result)).is_err() || failed {
                            break;
                        }
                    }
                })?;
        }
        drop(job_rx);
        drop(result_tx);

        let mut pending = BTreeMap::new();
        let mut next = 0;
        for (index, result) in result_rx.iter() {
            pending.insert(index, result?);
            while let Some(ready) = pending.remove(&next) {
                consume(next, ready)?;
                next += 1;
            }
        }
        Ok(())
    })
}
