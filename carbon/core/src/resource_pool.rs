// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::writer::{Datapoint, Tag};

/// Returned name buffers that grew beyond this are dropped rather than
/// pooled.
pub(crate) const MAX_POOLED_NAME_CAPACITY: usize = 1024;

/// Returned tag buffers that grew beyond this are dropped rather than
/// pooled.
pub(crate) const MAX_POOLED_TAG_CAPACITY: usize = 16;

/// Working set for one in-flight metric: the owned name copy, the single
/// datapoint slot, and the tags generated from the name.
///
/// An instance is held by exactly one owner at a time — the pool's idle set,
/// the scan loop between rent and enqueue, or the in-flight write — and is
/// returned to the pool exactly once, after the write path finishes with it.
#[derive(Debug)]
pub(crate) struct LineResources {
    /// Owned copy of the metric name. Frozen into [`Bytes`] while tags
    /// borrow it, reclaimed afterwards.
    pub name: BytesMut,
    /// Exactly one datapoint per carbon line.
    pub datapoints: Vec<Datapoint>,
    pub tags: Vec<Tag>,
}

impl LineResources {
    fn new() -> Self {
        Self {
            name: BytesMut::new(),
            datapoints: vec![Datapoint::default()],
            tags: Vec::new(),
        }
    }

    /// Takes the name out of the working set as an immutable buffer that tag
    /// values can slice without copying.
    pub(crate) fn freeze_name(&mut self) -> Bytes {
        self.name.split().freeze()
    }

    /// Puts the frozen name buffer back for reuse. Requires every tag slice
    /// to have been dropped; a buffer something still references is replaced
    /// with an empty one.
    pub(crate) fn reclaim_name(&mut self, frozen: Bytes) {
        self.name = match frozen.try_into_mut() {
            Ok(mut buffer) => {
                buffer.clear();
                buffer
            }
            Err(_) => BytesMut::new(),
        };
    }
}

/// Bounded pool of [`LineResources`] keeping the scan-to-write path free of
/// steady-state allocation.
pub(crate) struct LineResourcePool {
    idle: Mutex<Vec<Box<LineResources>>>,
    max_idle: usize,
}

impl LineResourcePool {
    pub(crate) fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Returns a reset working set: empty name, one zeroed datapoint, no
    /// tags.
    pub(crate) fn rent(&self) -> Box<LineResources> {
        if let Some(resources) = self.idle.lock().pop() {
            return resources;
        }
        Box::new(LineResources::new())
    }

    /// Returns a working set to the pool. Sets that grew beyond the shrink
    /// bounds are dropped so the idle set only holds right-sized buffers;
    /// accepted sets are cleared so no bytes from this rental remain
    /// observable and no tag slice pins an old name buffer.
    pub(crate) fn put(&self, mut resources: Box<LineResources>) {
        if resources.name.capacity() > MAX_POOLED_NAME_CAPACITY
            || resources.datapoints.capacity() != 1
            || resources.tags.capacity() > MAX_POOLED_TAG_CAPACITY
        {
            return;
        }
        resources.name.clear();
        resources.tags.clear();
        resources.datapoints[0] = Datapoint::default();

        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(resources);
        }
    }

    #[cfg(test)]
    fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rent_after_return_yields_a_clean_instance() {
        let pool = LineResourcePool::new(4);

        let mut resources = pool.rent();
        resources.name.extend_from_slice(b"foo.bar");
        resources.datapoints[0] = Datapoint {
            timestamp: 1700000000,
            value: 42.0,
        };
        let frozen = resources.freeze_name();
        resources.tags.push(Tag {
            name: Bytes::from_static(b"__g0__"),
            value: frozen.slice(0..3),
        });
        resources.tags.clear();
        resources.reclaim_name(frozen);
        pool.put(resources);

        let resources = pool.rent();
        assert!(resources.name.is_empty());
        assert_eq!(resources.datapoints.len(), 1);
        assert_eq!(resources.datapoints[0], Datapoint::default());
        assert!(resources.tags.is_empty());
    }

    #[test]
    fn frozen_name_round_trips_through_reclaim() {
        let mut resources = LineResources::new();
        resources.name.extend_from_slice(b"sys.cpu.load");
        let frozen = resources.freeze_name();
        assert_eq!(frozen.as_ref(), b"sys.cpu.load");
        assert!(resources.name.is_empty());

        let pointer = frozen.as_ptr();
        resources.reclaim_name(frozen);
        assert!(resources.name.is_empty());
        assert!(resources.name.capacity() >= b"sys.cpu.load".len());
        // Same allocation came back.
        resources.name.extend_from_slice(b"x");
        assert_eq!(resources.name.as_ptr(), pointer);
    }

    #[test]
    fn reclaim_with_an_outstanding_slice_starts_fresh() {
        let mut resources = LineResources::new();
        resources.name.extend_from_slice(b"foo.bar");
        let frozen = resources.freeze_name();
        let outstanding = frozen.slice(0..3);
        resources.reclaim_name(frozen);
        assert_eq!(resources.name.capacity(), 0);
        drop(outstanding);
    }

    #[test]
    fn oversized_returns_are_dropped() {
        let pool = LineResourcePool::new(4);

        let mut resources = pool.rent();
        resources.name.reserve(MAX_POOLED_NAME_CAPACITY + 1);
        pool.put(resources);
        assert_eq!(pool.idle_len(), 0);

        let mut resources = pool.rent();
        resources.tags.reserve(MAX_POOLED_TAG_CAPACITY + 1);
        pool.put(resources);
        assert_eq!(pool.idle_len(), 0);

        let mut resources = pool.rent();
        resources.datapoints.push(Datapoint::default());
        pool.put(resources);
        assert_eq!(pool.idle_len(), 0);

        pool.put(pool.rent());
        assert_eq!(pool.idle_len(), 1);
    }

    #[test]
    fn idle_set_is_bounded() {
        let pool = LineResourcePool::new(2);
        let first = pool.rent();
        let second = pool.rent();
        let third = pool.rent();
        pool.put(first);
        pool.put(second);
        pool.put(third);
        assert_eq!(pool.idle_len(), 2);
    }
}
