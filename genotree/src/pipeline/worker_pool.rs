use crossbeam_channel::{Receiver, Sender};

/// Fixed set of jobs whose results are collected on join.
///
/// With zero threads every job runs on the calling thread as soon as it is
/// submitted.
pub(super) struct WorkerPool<T> {
    inner: Option<threadpool::ThreadPool>,
    result_sender: Sender<T>,
    result_receiver: Receiver<T>,
}

impl<T: Send + 'static> WorkerPool<T> {
    #[must_use]
    pub fn new(thread_num: usize, thread_name: &str) -> Self {
        let inner = if thread_num > 0 {
            let pool = threadpool::Builder::new()
                .num_threads(thread_num)
                .thread_name(thread_name.to_owned())
                .build();
            Some(pool)
        } else {
            None
        };
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();

        Self {
            inner,
            result_sender,
            result_receiver,
        }
    }

    #[must_use]
    pub fn is_foreground(&self) -> bool {
        self.inner.is_none()
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let result_sender = self.result_sender.clone();
        let job = move || {
            // The receiver lives as long as the pool
            let _ = result_sender.send(job());
        };

        match &self.inner {
            Some(pool) => pool.execute(job),
            None => job(),
        }
    }

    /// Waits for every job and returns the results in completion order.
    ///
    /// Returns the number of panicked jobs as the error.
    pub fn join(self) -> Result<Vec<T>, usize> {
        let panic_count = match &self.inner {
            Some(pool) => {
                pool.join();
                pool.panic_count()
            }
            None => 0,
        };

        if panic_count > 0 {
            return Err(panic_count);
        }

        Ok(self.result_receiver.try_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::pipeline::worker_pool::WorkerPool;

    #[test]
    fn test_foreground() {
        let pool = WorkerPool::new(0, "test");
        let current_id = thread::current().id();

        assert!(pool.is_foreground());
        pool.execute(move || thread::current().id());

        assert_eq!(pool.join().unwrap(), [current_id]);
    }

    #[test]
    fn test_background() {
        let pool = WorkerPool::new(2, "test");
        let current_id = thread::current().id();

        for i in 0..4 {
            pool.execute(move || (i, thread::current().id()));
        }
        let mut results = pool.join().unwrap();
        results.sort_by_key(|(i, _)| *i);

        assert_eq!(results.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert!(results.iter().all(|(_, id)| *id != current_id));
    }

    #[test]
    fn test_panicked_job() {
        let pool = WorkerPool::new(1, "test");

        pool.execute(|| 1);
        pool.execute(|| panic!("job failed"));

        assert_eq!(pool.join().unwrap_err(), 1);
    }
}
