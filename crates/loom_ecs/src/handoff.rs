//! Hand-off queue for work produced off the main thread
//!
//! Producers such as asset loaders finish their I/O elsewhere and submit a
//! closure that applies the result to the world. The owner of the world
//! drains the queue synchronously, once per tick.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::world::World;

type Job = Box<dyn FnOnce(&mut World) + Send>;

/// Receiving side, owned by whoever owns the [`World`]
pub struct HandoffQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
}

impl HandoffQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// A sender for producer threads
    pub fn sender(&self) -> HandoffSender {
        HandoffSender {
            sender: self.sender.clone(),
        }
    }

    /// Number of jobs waiting
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Apply every job submitted so far, in submission order.
    ///
    /// Jobs submitted while draining wait for the next call.
    pub fn drain_into(&self, world: &mut World) -> usize {
        let jobs: Vec<Job> = self.receiver.try_iter().collect();
        let count = jobs.len();
        for job in jobs {
            job(world);
        }
        if count > 0 {
            log::trace!("applied {} hand-off jobs", count);
        }
        count
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable, thread-safe submission handle
#[derive(Clone)]
pub struct HandoffSender {
    sender: Sender<Job>,
}

impl HandoffSender {
    /// Submit a job. Returns `false` if the queue has been dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.sender.send(Box::new(job)).is_ok()
    }
}
