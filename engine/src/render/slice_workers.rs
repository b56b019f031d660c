//! Depth-Slice Workers
//!
//! Synchronous fan-out/fan-in used by both clustering passes: one named,
//! scoped worker thread per depth slice, all joined before returning.
//!
//! Each worker receives one item (typically a disjoint `&mut` chunk of an
//! output array), so no locking is needed for the per-slice outputs. A worker
//! that fails to spawn or panics fails the whole pass; the caller never sees
//! a partially filled result as success.

use std::thread;

use crate::error::{ClusterError, Result};

/// Options for a fan-out.
#[derive(Clone, Copy, Debug, Default)]
pub struct SliceWorkerOptions {
    /// Pin worker `i` to core `i % core_count`
    pub pin_to_cores: bool,
}

/// Run `work(slice, item)` on its own scoped thread for every item, then
/// join all of them.
///
/// `expected` is the number of slices the pass covers; if `items` yields a
/// different number the pass fails with `IncompletePass`. Returns the number
/// of completed slices, which equals `expected` on success.
pub fn run_per_slice<T, I, F>(
    label: &str,
    items: I,
    expected: usize,
    options: SliceWorkerOptions,
    work: F,
) -> Result<usize>
where
    I: IntoIterator<Item = T>,
    T: Send,
    F: Fn(usize, T) + Sync,
{
    let core_ids = if options.pin_to_cores {
        core_affinity::get_core_ids().filter(|ids| !ids.is_empty())
    } else {
        None
    };

    let work = &work;
    let core_ids = core_ids.as_deref();

    thread::scope(|scope| {
        let mut handles = Vec::new();
        let mut spawn_error = None;

        for (slice, item) in items.into_iter().enumerate() {
            let builder = thread::Builder::new().name(format!("{label}-slice-{slice}"));
            let spawned = builder.spawn_scoped(scope, move || {
                if let Some(cores) = core_ids {
                    let _ = core_affinity::set_for_current(cores[slice % cores.len()]);
                }
                work(slice, item);
            });

            match spawned {
                Ok(handle) => handles.push((slice, handle)),
                Err(source) => {
                    spawn_error = Some(ClusterError::WorkerSpawn { slice, source });
                    break;
                }
            }
        }

        let mut completed = 0;
        let mut panicked = None;
        for (slice, handle) in handles {
            match handle.join() {
                Ok(()) => completed += 1,
                Err(_) => {
                    panicked.get_or_insert(slice);
                }
            }
        }

        if let Some(err) = spawn_error {
            return Err(err);
        }
        if let Some(slice) = panicked {
            return Err(ClusterError::WorkerPanicked { slice });
        }
        if completed != expected {
            return Err(ClusterError::IncompletePass { completed, expected });
        }
        Ok(completed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_every_slice_runs_once() {
        let mut out = vec![0usize; 40];
        let completed = run_per_slice(
            "test",
            out.chunks_mut(4),
            10,
            SliceWorkerOptions::default(),
            |slice: usize, chunk: &mut [usize]| {
                for v in chunk.iter_mut() {
                    *v = slice + 1;
                }
            },
        )
        .unwrap();

        assert_eq!(completed, 10);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, i / 4 + 1, "element {} written by wrong slice", i);
        }
    }

    #[test]
    fn test_no_items_completes_nothing() {
        let completed =
            run_per_slice("test", Vec::<u32>::new(), 0, SliceWorkerOptions::default(), |_, _| {})
                .unwrap();
        assert_eq!(completed, 0);
    }

    #[test]
    fn test_panicking_slice_fails_the_pass() {
        let ran = AtomicUsize::new(0);
        let result = run_per_slice("test", 0..6, 6, SliceWorkerOptions::default(), |slice, _| {
            ran.fetch_add(1, Ordering::SeqCst);
            if slice == 3 {
                panic!("slice 3 exploded");
            }
        });

        assert!(matches!(result, Err(ClusterError::WorkerPanicked { slice: 3 })));
        // The other slices still ran to completion before the error surfaced.
        assert_eq!(ran.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_pinned_workers_complete() {
        let completed = run_per_slice(
            "pinned",
            0..4,
            4,
            SliceWorkerOptions { pin_to_cores: true },
            |_, _| {},
        )
        .unwrap();
        assert_eq!(completed, 4);
    }

    #[test]
    fn test_short_item_count_is_incomplete() {
        let ran = AtomicUsize::new(0);
        let result = run_per_slice("test", 0..3, 4, SliceWorkerOptions::default(), |_, _| {
            ran.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(
            result,
            Err(ClusterError::IncompletePass { completed: 3, expected: 4 })
        ));
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_extra_items_are_incomplete() {
        let result = run_per_slice("test", 0..5, 4, SliceWorkerOptions::default(), |_, _| {});
        assert!(matches!(
            result,
            Err(ClusterError::IncompletePass { completed: 5, expected: 4 })
        ));
    }
}
