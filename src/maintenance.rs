use crate::handler::RecordHandler;
use crate::sender::RecordSender;
use crate::strategy::DedupStrategy;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

/// Periodic driver that keeps gap resolution moving during quiescence.
///
/// Runs a `check_cache` pass over every owned partition on the handler's
/// configured `check_interval_ms` from a dedicated thread. Per-partition
/// exclusion is inherited from the handler, so the timer never races
/// ingestion on the same partition.
pub struct CacheMaintenanceTimer {
    shared: Arc<TimerShared>,
    thread: Option<JoinHandle<()>>,
}

struct TimerShared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl CacheMaintenanceTimer {
    /// Spawns the maintenance thread on the handler's configured interval.
    pub fn start<S, R>(handler: Arc<RecordHandler<S, R>>) -> io::Result<Self>
    where
        S: DedupStrategy + 'static,
        R: RecordSender + 'static,
    {
        let interval = Duration::from_millis(handler.config().check_interval_ms);
        let shared = Arc::new(TimerShared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("dedup-maintenance".into())
            .spawn(move || loop {
                {
                    let stopped = thread_shared.stopped.lock().unwrap();
                    let (stopped, _) = thread_shared.wake.wait_timeout(stopped, interval).unwrap();
                    if *stopped {
                        return;
                    }
                }
                for partition in handler.partition_ids() {
                    if let Err(err) = handler.check_cache(partition) {
                        warn!(partition, %err, "cache maintenance pass failed");
                    }
                }
            })?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Stops the thread and waits for it to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            let mut stopped = self.shared.stopped.lock().unwrap();
            *stopped = true;
        }
        self.shared.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CacheMaintenanceTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
