//! Timer-based call coalescing.
//!
//! A [`Debouncer`] wraps an async function. Each call replaces whatever was
//! scheduled before it and schedules the function to run with the latest
//! arguments once the delay has passed without another call.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

type BoxedFn<A> = Arc<dyn Fn(A) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Default)]
struct Slot {
    task: Option<JoinHandle<()>>,
    pending: Arc<AtomicBool>,
}

impl Slot {
    fn clear(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.pending.store(false, Ordering::SeqCst);
    }
}

/// Coalesces rapid calls into one delayed call with the latest arguments.
///
/// A new call supersedes the previous one, including a previous call whose
/// function is already running: that run is aborted at its next await
/// point. Dropping the debouncer cancels everything.
///
/// Scheduling spawns onto the current Tokio runtime, so [`call`] and
/// [`call_after`] must be invoked from within one.
///
/// [`call`]: Debouncer::call
/// [`call_after`]: Debouncer::call_after
pub struct Debouncer<A> {
    delay: Duration,
    func: BoxedFn<A>,
    slot: Mutex<Slot>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new<F, Fut>(delay: Duration, func: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            func: Arc::new(move |args| {
                Box::pin(func(args)) as Pin<Box<dyn Future<Output = ()> + Send>>
            }),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// The default delay used by [`call`](Self::call).
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `func(args)` after the default delay.
    pub fn call(&self, args: A) {
        self.call_after(args, self.delay);
    }

    /// Schedule `func(args)` after `delay`.
    pub fn call_after(&self, args: A, delay: Duration) {
        let mut slot = self.slot.lock().expect("lock poisoned");
        slot.clear();

        let pending = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&pending);
        let func = Arc::clone(&self.func);
        slot.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(false, Ordering::SeqCst);
            func(args).await;
        }));
        slot.pending = pending;
        trace!(delay_ms = delay.as_millis() as u64, "debounced call scheduled");
    }

    /// Discard the pending call, if any.
    pub fn cancel(&self) {
        self.slot.lock().expect("lock poisoned").clear();
    }

    /// `true` while a call is scheduled and its delay has not elapsed.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .expect("lock poisoned")
            .pending
            .load(Ordering::SeqCst)
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Ok(slot) = self.slot.get_mut() {
            slot.clear();
        }
    }
}

impl<A> std::fmt::Debug for Debouncer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Debouncer<u32>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let debouncer = Debouncer::new(Duration::from_millis(100), move |n| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(n);
            }
        });
        (calls, debouncer)
    }

    #[tokio::test(start_paused = true)]
    async fn only_last_call_fires() {
        let (calls, debouncer) = recorder();
        for n in 1..=5 {
            debouncer.call(n);
            sleep(Duration::from_millis(20)).await;
        }
        sleep(Duration::from_millis(200)).await;
        assert_eq!(*calls.lock().unwrap(), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_calls_all_fire() {
        let (calls, debouncer) = recorder();
        debouncer.call(1);
        sleep(Duration::from_millis(150)).await;
        debouncer.call(2);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_call() {
        let (calls, debouncer) = recorder();
        debouncer.call(1);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        sleep(Duration::from_millis(200)).await;
        assert!(calls.lock().unwrap().is_empty());

        // Cancelling with nothing pending is a no-op.
        debouncer.cancel();
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_clears_when_fired() {
        let (calls, debouncer) = recorder();
        assert!(!debouncer.is_pending());
        debouncer.call(7);
        sleep(Duration::from_millis(50)).await;
        assert!(debouncer.is_pending());
        sleep(Duration::from_millis(100)).await;
        assert!(!debouncer.is_pending());
        assert_eq!(*calls.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn call_after_uses_explicit_delay() {
        let (calls, debouncer) = recorder();
        debouncer.call_after(3, Duration::from_millis(500));
        sleep(Duration::from_millis(200)).await;
        assert!(calls.lock().unwrap().is_empty());
        sleep(Duration::from_millis(400)).await;
        assert_eq!(*calls.lock().unwrap(), vec![3]);
        assert_eq!(debouncer.delay(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn new_call_aborts_running_function() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&finished);
        let debouncer = Debouncer::new(Duration::from_millis(10), move |n: u32| {
            let sink = Arc::clone(&sink);
            async move {
                sleep(Duration::from_millis(100)).await;
                sink.lock().unwrap().push(n);
            }
        });

        debouncer.call(1);
        sleep(Duration::from_millis(50)).await; // first call is mid-run
        debouncer.call(2);
        sleep(Duration::from_millis(500)).await;
        assert_eq!(*finished.lock().unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (calls, debouncer) = recorder();
        debouncer.call(1);
        drop(debouncer);
        sleep(Duration::from_millis(200)).await;
        assert!(calls.lock().unwrap().is_empty());
    }
}
