use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

/// A single worker thread draining its own channel in FIFO order.
///
/// Items added from any thread are executed one at a time, in the order they
/// were added, by the closure given on construction. Disposing closes the
/// channel first and then joins the thread, so everything already added is
/// processed before the worker exits.
pub(crate) struct WorkQueue<T> {
    name: String,
    sender: Option<Sender<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkQueue<T> {
    pub(crate) fn new<F>(name: impl Into<String>, mut process: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = channel::unbounded::<T>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // `recv` fails only when every sender is gone and the channel is empty
                while let Ok(item) = receiver.recv() {
                    process(item);
                }
                // `process` (and everything it owns) is dropped here, on the worker
            })
            .unwrap_or_else(|e| panic!("could not spawn worker thread {}: {}", name, e));

        log::debug!("{}: worker started", name);

        Self {
            name,
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    pub(crate) fn add(&self, item: T) {
        match &self.sender {
            Some(sender) => {
                if sender.send(item).is_err() {
                    log::error!("{}: worker is gone, dropping work item", self.name);
                }
            }
            None => {
                log::error!("{}: queue already disposed, dropping work item", self.name);
            }
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Stops accepting items, waits for the queued ones to finish and joins
    /// the worker.
    pub(crate) fn dispose(&mut self) {
        assert!(self.sender.is_some(), "{}: disposed twice", self.name);

        // closing the channel lets the worker loop end after draining
        drop(self.sender.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{}: worker panicked", self.name);
            }
        }
        log::debug!("{}: worker stopped", self.name);
    }
}

impl<T> Drop for WorkQueue<T> {
    fn drop(&mut self) {
        // same as `dispose`, but without the double-dispose check
        if let Some(sender) = self.sender.take() {
            drop(sender);
            if let Some(handle) = self.handle.take() {
                if handle.join().is_err() {
                    log::error!("{}: worker panicked", self.name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[test]
    fn items_run_in_order_on_worker() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_worker = seen.clone();

        let mut queue = WorkQueue::new("test-order", move |item: u32| {
            let name = thread::current().name().map(str::to_owned);
            seen_in_worker.lock().unwrap().push((item, name));
        });

        for i in 0..100 {
            queue.add(i);
        }
        queue.dispose();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        for (i, (item, name)) in seen.iter().enumerate() {
            assert_eq!(*item, i as u32);
            assert_eq!(name.as_deref(), Some("test-order"));
        }
    }

    #[test]
    fn dispose_drains_slow_items() {
        let done = Arc::new(Mutex::new(0));
        let done_in_worker = done.clone();

        let mut queue = WorkQueue::new("test-drain", move |_: ()| {
            thread::sleep(Duration::from_millis(10));
            *done_in_worker.lock().unwrap() += 1;
        });

        for _ in 0..5 {
            queue.add(());
        }
        queue.dispose();

        assert_eq!(*done.lock().unwrap(), 5);
    }

    #[test]
    fn add_after_dispose_is_dropped() {
        let count = Arc::new(Mutex::new(0));
        let count_in_worker = count.clone();

        let mut queue = WorkQueue::new("test-closed", move |_: ()| {
            *count_in_worker.lock().unwrap() += 1;
        });
        queue.dispose();
        queue.add(());

        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    #[should_panic(expected = "disposed twice")]
    fn double_dispose_panics() {
        let mut queue = WorkQueue::new("test-twice", |_: ()| {});
        queue.dispose();
        queue.dispose();
    }

    #[test]
    fn worker_panic_is_reported_not_propagated() {
        let mut queue = WorkQueue::new("test-panic", |_: ()| panic!("device failure"));
        queue.add(());
        // join error is logged
        queue.dispose();
    }
}
