//! Admission-control gate bounding concurrent task execution
//!
//! Provides a primitive that admits at most `limit` concurrently-running
//! tasks, parks callers while the gate is full, and wakes them when a slot
//! frees up or the limit is raised. The limit is mutable at runtime and a
//! caller can block until the gate is quiescent (no task in flight).
//!
//! # Design
//!
//! - **Single monitor**: one mutex guards both the limit and the active
//!   count, with a condition variable for park/wake. The admission check and
//!   the park happen under the same lock, so a release cannot slip between
//!   them and be missed.
//! - **Broadcast wakeups**: every release and every limit change wakes all
//!   waiters. A woken caller re-checks state rather than assuming it was
//!   admitted; there is no FIFO fairness among waiters.
//! - **RAII permits**: `GatePermit` releases its slot on drop, so a slot is
//!   reclaimed on every exit path of a task, including panic unwinding.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

/// A concurrency limiter with a runtime-adjustable capacity
///
/// The gate tracks how many tasks are currently active and refuses new
/// admissions while `active >= limit`. Refused callers block until a running
/// task finishes or [`set_limit`](Gate::set_limit) raises the capacity.
///
/// Lowering the limit never preempts running tasks; it only prevents new
/// admissions, so the active count may transiently exceed the new limit until
/// enough tasks finish on their own.
///
/// Cloning the gate is cheap and all clones share the same state.
///
/// # Example
///
/// ```rust
/// use workgate::Gate;
///
/// let gate = Gate::with_limit(2);
///
/// let p1 = gate.try_acquire().unwrap();
/// let p2 = gate.try_acquire().unwrap();
/// assert!(gate.try_acquire().is_none()); // gate is full
///
/// drop(p1); // slot reclaimed
/// assert!(gate.try_acquire().is_some());
/// # drop(p2);
/// ```
#[derive(Clone)]
pub struct Gate {
    /// Shared state between all clones of this gate
    inner: Arc<GateInner>,
}

struct GateInner {
    /// Limit and active count, guarded together so the admission check and
    /// the park below cannot miss a wakeup
    state: Mutex<GateState>,
    /// Parked submitters and drain waiters; always notified by broadcast
    cond: Condvar,
}

struct GateState {
    limit: usize,
    active: usize,
}

impl Gate {
    /// Create a gate whose limit is the number of available processors
    ///
    /// # Example
    ///
    /// ```rust
    /// use workgate::Gate;
    ///
    /// let gate = Gate::new();
    /// assert!(gate.limit() >= 1);
    /// assert_eq!(gate.active(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(num_cpus::get().max(1))
    }

    /// Create a gate with an explicit capacity
    ///
    /// # Panics
    ///
    /// Panics if `limit` is 0 (a gate must be able to admit at least one
    /// task).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        assert!(limit > 0, "Gate must admit at least one task");
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState { limit, active: 0 }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Replace the concurrency limit and wake all parked callers
    ///
    /// Raising the limit admits blocked submitters immediately. Lowering it
    /// only affects new admissions; tasks already running are not preempted.
    /// A `limit` of 0 is silently ignored, so a misconfigured caller cannot
    /// wedge the gate shut.
    pub fn set_limit(&self, limit: usize) {
        if limit == 0 {
            debug!("ignoring request to set gate limit to 0");
            return;
        }
        let mut state = self.inner.state.lock();
        debug!("gate limit changed: {} -> {}", state.limit, limit);
        state.limit = limit;
        drop(state);
        // Broadcast so parked submitters re-evaluate against the new limit.
        self.inner.cond.notify_all();
    }

    /// Current concurrency limit
    ///
    /// Torn-free snapshot; a concurrent [`set_limit`](Gate::set_limit) may or
    /// may not be visible yet.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.inner.state.lock().limit
    }

    /// Number of tasks currently admitted and not yet finished
    ///
    /// Advisory snapshot only; it can change the moment the lock is dropped.
    #[must_use]
    pub fn active(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Acquire a slot, blocking until one is available
    ///
    /// Returns a [`GatePermit`] that releases the slot when dropped. Use this
    /// when the caller wants to run the work itself (on its own thread or
    /// inline) rather than have the gate spawn it.
    ///
    /// Wakeups are advisory: a woken caller re-checks `active < limit` and
    /// parks again if it lost the race, so spurious and batched wakeups are
    /// safe.
    #[must_use]
    pub fn acquire(&self) -> GatePermit {
        let mut state = self.inner.state.lock();
        while state.active >= state.limit {
            trace!(
                "gate full ({}/{}), parking caller",
                state.active,
                state.limit
            );
            self.inner.cond.wait(&mut state);
        }
        state.active += 1;
        GatePermit { gate: self.clone() }
    }

    /// Acquire a slot without blocking
    ///
    /// Returns `None` if the gate is full.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workgate::Gate;
    ///
    /// let gate = Gate::with_limit(1);
    /// let permit = gate.try_acquire();
    /// assert!(permit.is_some());
    /// assert!(gate.try_acquire().is_none());
    /// ```
    #[must_use]
    pub fn try_acquire(&self) -> Option<GatePermit> {
        let mut state = self.inner.state.lock();
        if state.active < state.limit {
            state.active += 1;
            Some(GatePermit { gate: self.clone() })
        } else {
            None
        }
    }

    /// Submit a task, blocking until it is admitted
    ///
    /// Once admitted the task runs on its own thread and `submit` returns
    /// immediately; it does not wait for the task to finish. The slot is
    /// released when the task exits, whether it returns normally or panics,
    /// so a failing task never permanently consumes capacity. The task's own
    /// outcome is not observed or reported by the gate.
    ///
    /// # Example
    ///
    /// ```rust
    /// use workgate::Gate;
    /// use std::sync::mpsc;
    ///
    /// let gate = Gate::with_limit(2);
    /// let (tx, rx) = mpsc::channel();
    ///
    /// for i in 0..4 {
    ///     let tx = tx.clone();
    ///     gate.submit(move || {
    ///         tx.send(i).unwrap();
    ///     });
    /// }
    ///
    /// let mut seen: Vec<i32> = rx.iter().take(4).collect();
    /// seen.sort_unstable();
    /// assert_eq!(seen, vec![0, 1, 2, 3]);
    /// gate.drain();
    /// ```
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let permit = self.acquire();
        thread::spawn(move || {
            // Moving the permit into the thread pins the release to the
            // task's exit, unwinding included.
            let _permit = permit;
            task();
        });
    }

    /// Block until no task is in flight
    ///
    /// Returns the first time the active count is observed to be zero under
    /// the gate's lock. This is a "wait for current quiescence" primitive,
    /// not a submission freeze: other callers may submit new work while this
    /// call is blocked (in which case it keeps waiting) or immediately after
    /// it returns (in which case [`active`](Gate::active) may already be
    /// non-zero again).
    pub fn drain(&self) {
        let mut state = self.inner.state.lock();
        while state.active > 0 {
            trace!("draining, {} task(s) still active", state.active);
            self.inner.cond.wait(&mut state);
        }
    }

    /// Block until no task is in flight, or until `timeout` elapses
    ///
    /// Returns `true` if quiescence was reached, `false` on timeout. This is
    /// the escape hatch [`drain`](Gate::drain) deliberately does not have.
    pub fn drain_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.active > 0 {
            if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                return state.active == 0;
            }
        }
        true
    }

    /// Release one slot and wake all waiters; called by `GatePermit::drop`
    fn release(&self) {
        let mut state = self.inner.state.lock();
        state.active -= 1;
        trace!("gate slot released, {} still active", state.active);
        drop(state);
        // Broadcast rather than signal: both parked submitters and drain
        // waiters need to re-check, and any of them may be eligible.
        self.inner.cond.notify_all();
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one occupied gate slot
///
/// Returned by [`Gate::acquire`] and [`Gate::try_acquire`], and held
/// internally by every task launched through [`Gate::submit`]. Dropping the
/// permit decrements the active count and wakes all waiters, on every exit
/// path.
#[must_use = "dropping the permit immediately releases the slot"]
pub struct GatePermit {
    gate: Gate,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}
