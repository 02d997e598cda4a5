//! Bounded parallel fan-out on a dedicated rayon pool

use crate::error::{Error, Result};
use rayon::prelude::*;

/// Apply `f` to every item with at most `limit` running at once.
///
/// Results keep the input order. The first error wins and the remaining
/// items are abandoned; results of items that already finished are dropped.
pub fn try_map<T, R, F>(limit: usize, items: &[T], f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync + Send,
{
    if items.len() <= 1 || limit <= 1 {
        return items.iter().map(&f).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limit.min(items.len()))
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
    pool.install(|| items.par_iter().map(&f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_keeps_order() {
        let items: Vec<usize> = (0..20).collect();
        let doubled = try_map(5, &items, |i| Ok(i * 2)).unwrap();
        assert_eq!(doubled, (0..20).map(|i| i * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_first_error_wins() {
        let items = vec![1, 2, 3];
        let err = try_map(5, &items, |i| {
            if *i == 2 {
                Err(Error::Transport {
                    message: "two".to_string(),
                })
            } else {
                Ok(*i)
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("two"));
    }

    #[test]
    fn test_respects_limit() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let items: Vec<usize> = (0..16).collect();
        try_map(3, &items, |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(10));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
