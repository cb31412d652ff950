// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Spatial Partitioning
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Spatial decomposition and collective reductions.
//!
//! Each worker owns a contiguous half-open cell range `[min_x, max_x)`
//! and talks to the others only through a [`Communicator`]. Every
//! collective is a barrier: all workers must call the same sequence of
//! collectives, and all of them receive the same reduced value.

use std::sync::{Barrier, Mutex, MutexGuard};

use crm_types::error::{CrmError, CrmResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub size: usize,
    pub min_x: usize,
    pub max_x: usize,
}

impl Partition {
    /// Whole domain on a single worker.
    pub fn whole(num_x: usize) -> Self {
        Partition {
            rank: 0,
            size: 1,
            min_x: 0,
            max_x: num_x,
        }
    }

    pub fn len(&self) -> usize {
        self.max_x - self.min_x
    }

    pub fn is_empty(&self) -> bool {
        self.max_x == self.min_x
    }

    pub fn contains(&self, cell: usize) -> bool {
        (self.min_x..self.max_x).contains(&cell)
    }
}

/// Balanced contiguous split of `num_x` cells over `workers` partitions.
/// The first `num_x % workers` partitions get one extra cell.
pub fn decompose(num_x: usize, workers: usize) -> CrmResult<Vec<Partition>> {
    if num_x == 0 {
        return Err(CrmError::ConfigError("cannot partition an empty grid".into()));
    }
    if workers == 0 {
        return Err(CrmError::ConfigError("at least one worker is required".into()));
    }
    if workers > num_x {
        return Err(CrmError::ConfigError(format!(
            "cannot split {num_x} cells across {workers} workers"
        )));
    }

    let base = num_x / workers;
    let rem = num_x % workers;
    let mut out = Vec::with_capacity(workers);
    let mut cursor = 0usize;
    for rank in 0..workers {
        let len = base + usize::from(rank < rem);
        out.push(Partition {
            rank,
            size: workers,
            min_x: cursor,
            max_x: cursor + len,
        });
        cursor += len;
    }
    Ok(out)
}

/// Collective operations shared by all workers of one run.
pub trait Communicator: Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn all_reduce_max(&self, value: f64) -> f64;
    fn all_reduce_or(&self, flag: bool) -> bool;
    /// Value held by `root`, delivered to everyone.
    fn broadcast(&self, value: f64, root: usize) -> f64;
}

/// Single-worker communicator: every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_or(&self, flag: bool) -> bool {
        flag
    }

    fn broadcast(&self, value: f64, _root: usize) -> f64 {
        value
    }
}

/// State shared by the workers of a [`ThreadCommunicator`] group.
#[derive(Debug)]
struct Shared {
    barrier: Barrier,
    slots: Mutex<Vec<f64>>,
    result: Mutex<f64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Shared-memory communicator for workers running on scoped threads.
#[derive(Debug, Clone, Copy)]
pub struct ThreadCommunicator<'a> {
    rank: usize,
    size: usize,
    shared: &'a Shared,
}

/// Owner of the shared state; hands out one communicator per rank.
///
/// Every rank must take part in every collective. A rank that stops
/// early (for instance by panicking) leaves the others blocked.
#[derive(Debug)]
pub struct ThreadGroup {
    shared: Shared,
    size: usize,
}

impl ThreadGroup {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        ThreadGroup {
            shared: Shared {
                barrier: Barrier::new(size),
                slots: Mutex::new(vec![0.0; size]),
                result: Mutex::new(0.0),
            },
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn communicators(&self) -> Vec<ThreadCommunicator<'_>> {
        (0..self.size)
            .map(|rank| ThreadCommunicator {
                rank,
                size: self.size,
                shared: &self.shared,
            })
            .collect()
    }
}

impl ThreadCommunicator<'_> {
    /// Write own slot, let rank 0 combine, hand the result to everyone.
    fn collective(&self, value: f64, combine: impl Fn(&[f64]) -> f64) -> f64 {
        lock(&self.shared.slots)[self.rank] = value;
        self.shared.barrier.wait();
        if self.rank == 0 {
            let reduced = combine(&lock(&self.shared.slots));
            *lock(&self.shared.result) = reduced;
        }
        self.shared.barrier.wait();
        // Rank 0 rewrites `result` only after the next first barrier
        *lock(&self.shared.result)
    }
}

impl Communicator for ThreadCommunicator<'_> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        self.collective(value, |slots| {
            slots.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        })
    }

    fn all_reduce_or(&self, flag: bool) -> bool {
        let v = if flag { 1.0 } else { 0.0 };
        self.collective(v, |slots| {
            if slots.iter().any(|&s| s != 0.0) {
                1.0
            } else {
                0.0
            }
        }) != 0.0
    }

    fn broadcast(&self, value: f64, root: usize) -> f64 {
        let root = root.min(self.size - 1);
        self.collective(value, |slots| slots[root])
    }
}
