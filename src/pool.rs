//! Background compilation workers.
//!
//! A fixed pool of threads drains a shared queue of work items. Each item
//! owns a snapshot of the program it compiles and the pending handle it
//! will publish into; the worker swaps the cache's pending reservation for
//! the finished unit before waking waiters. Dropping the pool disconnects
//! the queue, lets workers drain what is already enqueued, then joins them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::cache::ShaderCache;
use crate::compiler::{CompileError, ShaderCompiler};
use crate::key::CacheKey;
use crate::metrics::JitMetrics;
use crate::pending::CompileHandle;
use crate::program::ProgramIdentity;

/// One queued compilation: the captured program and the reservation it
/// will populate.
pub(crate) struct WorkItem<C: ShaderCompiler> {
    pub key: CacheKey,
    pub program: ProgramIdentity,
    pub handle: CompileHandle<C::Shader>,
}

pub(crate) struct CompilePool<C: ShaderCompiler> {
    sender: Option<Sender<WorkItem<C>>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<C: ShaderCompiler> CompilePool<C> {
    pub fn new(
        worker_count: usize,
        compiler: Arc<C>,
        cache: Arc<ShaderCache<C::Shader>>,
        metrics: Arc<JitMetrics>,
    ) -> Self {
        let (sender, receiver) = unbounded();
        let workers = (0..worker_count.max(1))
            .map(|index| {
                let receiver: Receiver<WorkItem<C>> = receiver.clone();
                let compiler = Arc::clone(&compiler);
                let cache = Arc::clone(&cache);
                let metrics = Arc::clone(&metrics);
                thread::Builder::new()
                    .name(format!("shaderjit-worker-{index}"))
                    .spawn(move || worker_loop(&receiver, &compiler, &cache, &metrics))
                    .expect("failed to spawn compile worker")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    pub fn submit(&self, item: WorkItem<C>) {
        if let Some(sender) = &self.sender {
            // Send only fails once the pool is shutting down.
            let _ = sender.send(item);
        }
    }
}

impl<C: ShaderCompiler> Drop for CompilePool<C> {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop<C: ShaderCompiler>(
    receiver: &Receiver<WorkItem<C>>,
    compiler: &C,
    cache: &ShaderCache<C::Shader>,
    metrics: &JitMetrics,
) {
    while let Ok(item) = receiver.recv() {
        let started = Instant::now();
        // A panicking compiler must not kill the worker or strand the
        // pending reservation; fold the panic into the failure path.
        let compiled = panic::catch_unwind(AssertUnwindSafe(|| compiler.compile(&item.program)))
            .unwrap_or_else(|payload| Err(CompileError::Panic(panic_message(&payload))));
        match compiled {
            Ok(shader) => {
                let shader = Arc::new(shader);
                let compile_time = started.elapsed();
                cache.publish(item.key, Arc::clone(&shader), compile_time, &item.handle);
                metrics.record_compile();
                debug!(
                    key = item.key,
                    micros = compile_time.as_micros() as u64,
                    "compiled shader"
                );
                item.handle.complete(Ok(shader));
            }
            Err(err) => {
                cache.retract_pending(item.key, &item.handle);
                metrics.record_compile_failure();
                warn!(key = item.key, error = %err, "shader compilation failed");
                item.handle.complete(Err(err));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
