//! Single-threaded callback context.
//!
//! Every user-visible callback (load, error, cancellation, display) runs on
//! one dedicated thread so callbacks never race each other.

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::worker_pools::panic_message;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable handle that queues closures onto the callback thread.
#[derive(Clone)]
pub struct CallbackDispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl CallbackDispatcher {
    /// Spawns the callback thread.
    ///
    /// The thread exits once every dispatcher clone has been dropped and the
    /// queue is drained.
    ///
    /// # Errors
    /// Returns error if the OS refuses to spawn the thread.
    pub fn spawn(name: &str) -> std::io::Result<(Self, JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Callback thread started");
                while let Some(job) = rx.blocking_recv() {
                    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
                        error!(panic = %panic_message(payload.as_ref()), "Callback panicked");
                    }
                }
                debug!("Callback thread stopped");
            })?;
        Ok((Self { tx }, handle))
    }

    /// Queues a closure. Returns false if the callback thread is gone.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> bool {
        if self.tx.send(Box::new(job)).is_err() {
            error!("Callback thread is not running, dropping callback");
            return false;
        }
        true
    }
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_callbacks_run_in_order_on_one_thread() {
        let (dispatcher, handle) = CallbackDispatcher::spawn("test-callbacks").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = Arc::clone(&seen);
            dispatcher.dispatch(move || {
                let name = thread::current().name().map(String::from);
                seen.lock().push((i, name));
            });
        }

        drop(dispatcher);
        handle.join().unwrap();

        let seen = seen.lock();
        let order: Vec<_> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert!(
            seen.iter()
                .all(|(_, name)| name.as_deref() == Some("test-callbacks"))
        );
    }

    #[test]
    fn test_panicking_callback_does_not_stop_thread() {
        let (dispatcher, handle) = CallbackDispatcher::spawn("test-panics").unwrap();
        let ran = Arc::new(Mutex::new(false));

        dispatcher.dispatch(|| panic!("boom"));
        {
            let ran = Arc::clone(&ran);
            dispatcher.dispatch(move || *ran.lock() = true);
        }

        drop(dispatcher);
        handle.join().unwrap();
        assert!(*ran.lock());
    }

    #[test]
    fn test_result_reaches_async_receiver() {
        let (dispatcher, _handle) = CallbackDispatcher::spawn("test-async").unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        dispatcher.dispatch(move || {
            let _ = tx.send(thread::current().name().map(String::from));
        });

        let name = tokio_test::block_on(rx).unwrap();
        assert_eq!(name.as_deref(), Some("test-async"));
    }
}
