use crossbeam_channel::{unbounded, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of OS threads consuming jobs off an unbounded channel.
///
/// Exposes a live idle-worker count used by the crazy-looping check, and
/// drains its queue before joining every worker on shutdown.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let active = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let active = active.clone();
            let handle = thread::Builder::new()
                .name(format!("sfc-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        active.fetch_add(1, Ordering::SeqCst);
                        job();
                        active.fetch_sub(1, Ordering::SeqCst);
                    }
                })?;
            workers.push(handle);
        }
        Ok(Self {
            sender: Some(sender),
            workers,
            active,
            size,
        })
    }

    pub fn execute(&self, job: Job) {
        if let Some(sender) = &self.sender {
            // A worker stopping mid-send only happens during shutdown, in
            // which case dropping the job silently is correct: nothing is
            // left running to observe it.
            let _ = sender.send(job);
        }
    }

    /// Workers not currently running a job. Zero idle workers on a completed
    /// join is a crazy-looping condition.
    pub fn idle_count(&self) -> usize {
        self.size.saturating_sub(self.active.load(Ordering::SeqCst))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Closes the job channel and waits for every worker to drain its queue
    /// and exit.
    pub fn shutdown(mut self) {
        self.drain_and_join();
    }

    fn drain_and_join(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.drain_and_join();
    }
}
