//! Background execution context for every engine call.
//!
//! Engine handles are not safe for concurrent use, so load, unload and
//! generation all run as jobs on one dedicated thread that owns the
//! [`ModelSlot`]. Callers hand jobs over through a channel and get results
//! back through a oneshot, on whatever context they were awaiting from.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{BridgeError, Result};
use crate::model::ModelSlot;

type Job = Box<dyn FnOnce(&mut ModelSlot) + Send + 'static>;

/// Owner of the background inference thread
pub(crate) struct Worker {
    sender: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread. The slot moves onto it for good.
    pub fn spawn(name: &str, slot: ModelSlot) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(receiver, slot))
            .map_err(|e| BridgeError::WorkerUnavailable {
                message: format!("Failed to spawn worker thread: {}", e),
            })?;

        info!(thread = name, "Inference worker started");

        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    /// Queue a job without waiting for it
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut ModelSlot) + Send + 'static,
    {
        self.sender
            .as_ref()
            .ok_or_else(BridgeError::worker_gone)?
            .send(Box::new(job))
            .map_err(|_| BridgeError::worker_gone())
    }

    /// Queue a job and get a handle to its result
    pub fn call<T, F>(&self, job: F) -> Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut ModelSlot) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(move |slot| {
            let _ = tx.send(job(slot));
        })?;
        Ok(JobHandle { receiver: rx })
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain what is queued and exit.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == std::thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("Inference worker terminated abnormally");
            }
        }
    }
}

/// Handle for a job queued with [`Worker::call`]
#[derive(Debug)]
pub(crate) struct JobHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Wait for the job result
    pub async fn wait(self) -> Result<T> {
        self.receiver.await.map_err(|_| BridgeError::WorkerUnavailable {
            message: "job was dropped before it produced a result".to_string(),
        })
    }
}

/// Run `f`, turning a panic into its message.
///
/// Jobs use this around engine calls so a panicking engine still produces
/// a proper error and leaves the controller state consistent.
pub(crate) fn catch_panic<T>(f: impl FnOnce() -> T) -> std::result::Result<T, String> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| panic_message(panic.as_ref()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run(receiver: Receiver<Job>, mut slot: ModelSlot) {
    for job in receiver.iter() {
        if let Err(message) = catch_panic(|| job(&mut slot)) {
            error!(panic = %message, "Worker job panicked");
        }
    }

    debug!("Job channel closed, releasing model slot");
    slot.release();
    info!("Inference worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::ScriptedEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn worker() -> Worker {
        let slot = ModelSlot::new(Box::new(ScriptedEngine::new(&["a"])));
        Worker::spawn("test-worker", slot).unwrap()
    }

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let worker = worker();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            worker.submit(move |_| order.lock().push(i)).unwrap();
        }
        worker.call(|_| ()).unwrap().wait().await.unwrap();

        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_jobs_run_on_worker_thread() {
        let worker = worker();
        let name = worker
            .call(|_| std::thread::current().name().map(str::to_string))
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("test-worker"));
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let worker = worker();
        let handle = worker.call::<(), _>(|_| panic!("engine exploded")).unwrap();
        assert!(handle.wait().await.is_err());

        let value = worker.call(|_| 7).unwrap().wait().await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_catch_panic_reports_message() {
        assert_eq!(catch_panic(|| 3), Ok(3));
        assert_eq!(catch_panic::<()>(|| panic!("bad tensor shape")), Err("bad tensor shape".to_string()));

        let code = 42;
        let err = catch_panic::<()>(|| panic!("status {code}")).unwrap_err();
        assert_eq!(err, "status 42");
    }

    #[test]
    fn test_drop_drains_queue() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let worker = worker();
            for _ in 0..5 {
                let counter = counter.clone();
                worker
                    .submit(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
