use async_storage::thread_pool::{
    NaiveThreadPool, RayonThreadPool, SharedQueueThreadPool, ThreadPool,
};
use async_storage::{Result, StoreErrorKind};
use crossbeam_utils::sync::WaitGroup;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn run_counter_jobs<P: ThreadPool>(pool: P) {
    const JOBS: usize = 20;
    const ADDS: usize = 1000;

    let counter = Arc::new(AtomicUsize::new(0));
    let wg = WaitGroup::new();

    for _ in 0..JOBS {
        let counter = Arc::clone(&counter);
        let wg = wg.clone();
        pool.spawn(move || {
            for _ in 0..ADDS {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            drop(wg);
        });
    }

    wg.wait();
    assert_eq!(counter.load(Ordering::SeqCst), JOBS * ADDS);
}

fn survives_panicking_jobs<P: ThreadPool>() -> Result<()> {
    let pool = P::new(4)?;
    for _ in 0..100 {
        pool.spawn(|| {
            // keeps the expected panics out of the test output
            panic_control::disable_hook_in_current_thread();
            panic!("job failed");
        });
    }
    run_counter_jobs(pool);
    Ok(())
}

#[test]
fn naive_thread_pool_runs_jobs() -> Result<()> {
    run_counter_jobs(NaiveThreadPool::new(4)?);
    Ok(())
}

#[test]
fn shared_queue_thread_pool_runs_jobs() -> Result<()> {
    run_counter_jobs(SharedQueueThreadPool::new(4)?);
    Ok(())
}

#[test]
fn rayon_thread_pool_runs_jobs() -> Result<()> {
    run_counter_jobs(RayonThreadPool::new(4)?);
    Ok(())
}

#[test]
fn shared_queue_thread_pool_survives_panics() -> Result<()> {
    survives_panicking_jobs::<SharedQueueThreadPool>()
}

#[test]
fn rayon_thread_pool_survives_panics() -> Result<()> {
    survives_panicking_jobs::<RayonThreadPool>()
}

#[test]
fn naive_thread_pool_survives_panics() -> Result<()> {
    survives_panicking_jobs::<NaiveThreadPool>()
}

#[test]
fn clones_share_workers() -> Result<()> {
    let pool = SharedQueueThreadPool::new(2)?;
    let clone = pool.clone();
    drop(pool);
    // the workers outlive the original handle
    run_counter_jobs(clone);
    Ok(())
}

#[test]
fn zero_workers_are_rejected() {
    fn kind_of<P: ThreadPool>() -> Option<StoreErrorKind> {
        P::new(0).err().map(|err| err.kind())
    }

    assert_eq!(kind_of::<NaiveThreadPool>(), Some(StoreErrorKind::InvalidConfig));
    assert_eq!(kind_of::<SharedQueueThreadPool>(), Some(StoreErrorKind::InvalidConfig));
    assert_eq!(kind_of::<RayonThreadPool>(), Some(StoreErrorKind::InvalidConfig));
}
