use super::ThreadPool;
use crate::{Result, StoreErrorKind};
use crossbeam::channel::{self, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, trace};

trait FnBox {
    fn call_from_box(self: Box<Self>) -> Result<()>;
}

impl<F: FnOnce()> FnBox for F {
    fn call_from_box(self: Box<Self>) -> Result<()> {
        // here we catch panic so that worker can continue running other tasks
        let result = catch_unwind(AssertUnwindSafe(*self));
        if result.is_err() {
            return Err(StoreErrorKind::ThreadPanic.into());
        }
        Ok(())
    }
}

type Task = Box<dyn FnBox + Send + 'static>;

enum Message {
    NewTask(Task),
    Terminate,
}

struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Message>) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("storage-worker-{}", id))
            .spawn(move || {
                for message in receiver.iter() {
                    match message {
                        Message::NewTask(task) => {
                            if let Err(error) = task.call_from_box() {
                                error!("Worker: {}, Error: {}", id, error);
                            }
                        }
                        Message::Terminate => break,
                    }
                }
                trace!("worker {} exiting", id);
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }
}

struct Shared {
    sender: Sender<Message>,
    workers: Mutex<Vec<Worker>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let workers = match self.workers.get_mut() {
            Ok(workers) => workers,
            Err(poisoned) => poisoned.into_inner(),
        };

        for _ in 0..workers.len() {
            if self.sender.send(Message::Terminate).is_err() {
                error!("all workers already gone");
                break;
            }
        }

        for worker in workers.iter_mut() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    error!("worker {} died abnormally", worker.id);
                }
            }
        }
    }
}

/// Fixed set of workers pulling jobs from one multi-consumer queue.
///
/// Clones share the workers, which shut down once the last clone drops.
#[derive(Clone)]
pub struct SharedQueueThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(capacity: usize) -> Result<Self> {
        super::check_capacity(capacity)?;
        let (sender, receiver) = channel::unbounded();

        let mut workers = Vec::with_capacity(capacity);
        for i in 0..capacity {
            workers.push(Worker::new(i, receiver.clone())?);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                sender,
                workers: Mutex::new(workers),
            }),
        })
    }

    fn spawn<F: FnOnce() + Send + 'static>(&self, f: F) {
        let message = Message::NewTask(Box::new(f));
        if self.shared.sender.send(message).is_err() {
            error!("job dropped, no worker is listening");
        }
    }
}
