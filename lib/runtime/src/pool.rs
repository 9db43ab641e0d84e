use std::{
  sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicU64, Ordering},
  },
  time::{Duration, Instant},
};

/// Bounded reuse of engine invocation slots.
///
/// Contract: with `max_size` concurrent consumers the pool hands out
/// at most `max_size` pooled executors; demand beyond that is served
/// by ephemeral executors that are dropped after use. Idle pooled
/// executors are evicted once `idle_timeout` has passed with no
/// outstanding use.
pub struct ExecPool {
  inner: Arc<PoolInner>,
}

struct PoolInner {
  max_size: usize,
  idle_timeout: Duration,
  pooled: Mutex<Vec<PoolEntry>>,
}

struct PoolEntry {
  executor: Arc<Executor>,
  last_used: Instant,
}

/// One invocation slot. Counts how many invocations it served, which
/// the tests lean on to tell reuse from churn.
#[derive(Default)]
pub struct Executor {
  pooled: bool,
  uses: AtomicU64,
}

impl Executor {
  pub fn is_pooled(&self) -> bool {
    self.pooled
  }

  pub fn uses(&self) -> u64 {
    self.uses.load(Ordering::Relaxed)
  }
}

/// Holds the slot for the duration of one invocation. Pooled slots
/// return to the pool on drop.
pub struct ExecutorGuard {
  executor: Arc<Executor>,
  pool: Weak<PoolInner>,
}

impl std::ops::Deref for ExecutorGuard {
  type Target = Executor;
  fn deref(&self) -> &Executor {
    &self.executor
  }
}

impl Drop for ExecutorGuard {
  fn drop(&mut self) {
    let Some(pool) = self.pool.upgrade() else {
      return;
    };
    let mut pooled = pool.pooled.lock().unwrap();
    for entry in pooled.iter_mut() {
      if Arc::ptr_eq(&entry.executor, &self.executor) {
        entry.last_used = Instant::now();
        break;
      }
    }
  }
}

impl ExecPool {
  pub fn new(max_size: usize, idle_timeout: Duration) -> ExecPool {
    ExecPool {
      inner: Arc::new(PoolInner {
        max_size,
        idle_timeout,
        pooled: Mutex::new(Vec::new()),
      }),
    }
  }

  /// Grab a slot: an idle pooled one when available, a fresh pooled
  /// one while under capacity, otherwise an ephemeral overflow slot.
  pub fn acquire(&self) -> ExecutorGuard {
    let mut pooled = self.inner.pooled.lock().unwrap();

    let executor = if let Some(entry) = pooled
      .iter_mut()
      // strong_count == 1 means no guard is outstanding
      .find(|entry| Arc::strong_count(&entry.executor) == 1)
    {
      entry.last_used = Instant::now();
      entry.executor.clone()
    } else if pooled.len() < self.inner.max_size {
      let executor = Arc::new(Executor {
        pooled: true,
        uses: AtomicU64::new(0),
      });
      pooled.push(PoolEntry {
        executor: executor.clone(),
        last_used: Instant::now(),
      });
      executor
    } else {
      Arc::new(Executor {
        pooled: false,
        uses: AtomicU64::new(0),
      })
    };

    executor.uses.fetch_add(1, Ordering::Relaxed);
    ExecutorGuard {
      executor,
      pool: Arc::downgrade(&self.inner),
    }
  }

  /// Drop pooled slots that have sat idle past the timeout. Slots
  /// with an outstanding guard are never evicted.
  pub fn evict_idle(&self) {
    let idle_timeout = self.inner.idle_timeout;
    self.inner.pooled.lock().unwrap().retain(|entry| {
      Arc::strong_count(&entry.executor) > 1
        || entry.last_used.elapsed() < idle_timeout
    });
  }

  pub fn pooled_count(&self) -> usize {
    self.inner.pooled.lock().unwrap().len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reuses_pooled_slots() {
    let pool = ExecPool::new(2, Duration::from_secs(60));
    {
      let first = pool.acquire();
      assert!(first.is_pooled());
    }
    let again = pool.acquire();
    // the same slot served both invocations
    assert!(again.is_pooled());
    assert_eq!(again.uses(), 2);
    assert_eq!(pool.pooled_count(), 1);
  }

  #[test]
  fn overflow_is_ephemeral() {
    let pool = ExecPool::new(2, Duration::from_secs(60));
    let a = pool.acquire();
    let b = pool.acquire();
    let c = pool.acquire();
    assert!(a.is_pooled());
    assert!(b.is_pooled());
    assert!(!c.is_pooled());
    assert_eq!(pool.pooled_count(), 2);
  }

  #[test]
  fn eviction_requires_no_outstanding_use() {
    let pool = ExecPool::new(2, Duration::from_millis(0));
    let held = pool.acquire();
    {
      let _idle = pool.acquire();
    }
    // the idle slot goes, the held slot stays
    pool.evict_idle();
    assert_eq!(pool.pooled_count(), 1);
    drop(held);
    pool.evict_idle();
    assert_eq!(pool.pooled_count(), 0);
  }
}
