// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Task pool for the write path. Both flavors run jobs on the tokio runtime;
/// they differ only in admission: static submission waits for a free worker
/// slot, dynamic submission always accepts.
pub(crate) enum WorkerPool {
    Static { slots: Arc<Semaphore> },
    Dynamic,
}

impl WorkerPool {
    pub(crate) fn new_static(workers: usize) -> Self {
        WorkerPool::Static {
            slots: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub(crate) fn new_dynamic() -> Self {
        WorkerPool::Dynamic
    }

    /// Runs `job` on the pool. Suspends while a static pool is saturated.
    pub(crate) async fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            WorkerPool::Static { slots } => {
                let permit = slots
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("worker pool semaphore is never closed");
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
            }
            WorkerPool::Dynamic => {
                tokio::spawn(job);
            }
        }
    }
}
