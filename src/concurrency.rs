//! Concurrency utilities: cancellation and bounded fan-out.

use crossbeam_channel::{Receiver, bounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, warn};

/// Cooperative cancellation flag shared between a caller and fan-out workers.
///
/// Clones observe the same flag; cancelling is sticky.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Runs `f` over every item using up to `workers` threads.
///
/// The first error cancels the token and is returned once all workers have
/// drained; a token cancelled externally stops the fan-out between items.
pub(crate) fn for_each_concurrent<T, E, F>(
    items: &[T],
    workers: usize,
    token: &CancelToken,
    f: F,
) -> Result<(), E>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<(), E> + Sync,
{
    if items.is_empty() {
        return Ok(());
    }

    let workers = workers.clamp(1, items.len());
    let first_err: Mutex<Option<E>> = Mutex::new(None);
    let (task_tx, task_rx) = bounded::<usize>(items.len());
    for idx in 0..items.len() {
        let _ = task_tx.send(idx);
    }
    drop(task_tx);

    let drain = |tasks: Receiver<usize>| {
        while let Ok(idx) = tasks.recv() {
            if token.is_cancelled() {
                break;
            }
            if let Err(err) = f(&items[idx]) {
                token.cancel();
                let mut slot = first_err.lock();
                if slot.is_none() {
                    *slot = Some(err);
                }
                break;
            }
        }
    };

    thread::scope(|scope| {
        let mut spawned = 0usize;
        for id in 0..workers {
            let tasks = task_rx.clone();
            let drain = &drain;
            let handle = thread::Builder::new()
                .name(format!("strata-fanout-{id}"))
                .spawn_scoped(scope, move || drain(tasks));
            match handle {
                Ok(_) => spawned += 1,
                Err(e) => error!("Failed to spawn fan-out worker {}: {}", id, e),
            }
        }

        if spawned == 0 {
            warn!("No fan-out workers could be spawned; draining on the caller thread");
            drain(task_rx.clone());
        }
    });

    match first_err.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn visits_every_item() {
        let items: Vec<usize> = (0..100).collect();
        let sum = AtomicUsize::new(0);
        let token = CancelToken::new();

        let result: Result<(), ()> = for_each_concurrent(&items, 4, &token, |item| {
            sum.fetch_add(*item, Ordering::AcqRel);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(sum.load(Ordering::Acquire), (0..100).sum());
    }

    #[test]
    fn first_error_cancels_the_group() {
        let items: Vec<usize> = (0..1000).collect();
        let visited = AtomicUsize::new(0);
        let token = CancelToken::new();

        let result = for_each_concurrent(&items, 2, &token, |item| {
            visited.fetch_add(1, Ordering::AcqRel);
            if *item == 3 { Err("boom") } else { Ok(()) }
        });

        assert_eq!(result, Err("boom"));
        assert!(token.is_cancelled());
        assert!(
            visited.load(Ordering::Acquire) < items.len(),
            "remaining items should be skipped after the failure"
        );
    }

    #[test]
    fn cancelled_token_skips_all_items() {
        let items: Vec<usize> = (0..10).collect();
        let visited = AtomicUsize::new(0);
        let token = CancelToken::new();
        token.cancel();

        let result: Result<(), ()> = for_each_concurrent(&items, 4, &token, |_| {
            visited.fetch_add(1, Ordering::AcqRel);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(visited.load(Ordering::Acquire), 0);
    }

    #[test]
    fn zero_workers_defaults_to_one() {
        let items = [1, 2, 3];
        let visited = AtomicUsize::new(0);
        let token = CancelToken::new();

        let result: Result<(), ()> = for_each_concurrent(&items, 0, &token, |_| {
            visited.fetch_add(1, Ordering::AcqRel);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(visited.load(Ordering::Acquire), 3);
    }
}
