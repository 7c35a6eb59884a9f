//! Cooperative single-threaded reactor primitives: a signal/slot
//! primitive, one-shot/periodic timers, and fd watches.
//!
//! This module is deliberately a small, concrete, virtual-clock-driven
//! [`Reactor`] that the pipe and the state machine use internally for
//! back-pressure cleanup timers and timeout events, rather than a
//! general-purpose event loop. Real OS integration (epoll/kqueue, PTY
//! plumbing) stays out of scope; an embedder drives their own clock by
//! calling [`Reactor::advance`] from their actual event loop, or swaps
//! this reactor out entirely as long as the same `Signal`/`Timer` shapes
//! are honored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Handle returned by [`Signal::connect`], used to later [`Signal::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(u64);

/// An in-process signal/slot emitter.
///
/// Rather than a trackable multiple-inheritance base, each emitter owns a
/// list of callback closures with explicit deregistration. There is no
/// cross-thread synchronization;
/// emission runs every connected slot to completion, in connection order,
/// on the calling thread.
pub struct Signal<T> {
    next_id: Cell<u64>,
    slots: RefCell<Vec<(u64, Box<dyn FnMut(T)>)>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            slots: RefCell::new(Vec::new()),
        }
    }

    /// Register a slot. Returns a handle for later disconnection.
    pub fn connect(&self, slot: impl FnMut(T) + 'static) -> SlotId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.slots.borrow_mut().push((id, Box::new(slot)));
        SlotId(id)
    }

    /// Deregister a previously connected slot. Idempotent.
    pub fn disconnect(&self, id: SlotId) {
        self.slots.borrow_mut().retain(|(sid, _)| *sid != id.0);
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }
}

impl<T: Clone> Signal<T> {
    /// Emit `value` to every connected slot, in connection order.
    ///
    /// A slot must not reconnect or emit on this same signal from within its
    /// own callback; the contract is non-reentrant in the small. Doing so
    /// panics on the borrow — it is a programming error.
    pub fn emit(&self, value: T) {
        let mut slots = self.slots.borrow_mut();
        for (_, slot) in slots.iter_mut() {
            slot(value.clone());
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct TimerEntry {
    id: u64,
    interval: Duration,
    periodic: bool,
    enabled: bool,
    deadline: Duration,
    expired: Rc<Signal<()>>,
}

struct ReactorInner {
    now: Duration,
    next_id: u64,
    timers: Vec<TimerEntry>,
}

/// A cooperative, single-threaded, virtual-clock-driven event loop.
///
/// Cheap to clone: all clones share the same underlying timer list and
/// clock, matching the single reactor instance a real embedding would pass
/// around by reference.
#[derive(Clone)]
pub struct Reactor {
    inner: Rc<RefCell<ReactorInner>>,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ReactorInner {
                now: Duration::ZERO,
                next_id: 0,
                timers: Vec::new(),
            })),
        }
    }

    /// Create a disarmed timer. Call [`Timer::set_enable`] to arm it.
    pub fn create_timer(&self, initial_ms: u64, periodic: bool) -> Timer {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        let expired = Rc::new(Signal::new());
        let now = inner.now;
        inner.timers.push(TimerEntry {
            id,
            interval: Duration::from_millis(initial_ms),
            periodic,
            enabled: false,
            deadline: now,
            expired: expired.clone(),
        });
        Timer {
            reactor: self.inner.clone(),
            id,
            expired,
        }
    }

    /// Advance the virtual clock by `ms` and fire any timer whose deadline
    /// falls within the new `now`. Periodic timers are rescheduled relative
    /// to their missed deadline (not to `now`), so a burst of short
    /// `advance` calls doesn't let a periodic timer drift ahead of the
    /// clock, but a large single `advance` collapses any backlog to one
    /// firing and re-anchors at `now`.
    pub fn advance(&self, ms: u64) {
        let to_fire: Vec<Rc<Signal<()>>> = {
            let mut inner = self.inner.borrow_mut();
            inner.now += Duration::from_millis(ms);
            let now = inner.now;
            let mut fired = Vec::new();
            for timer in inner.timers.iter_mut() {
                if timer.enabled && timer.deadline <= now {
                    fired.push(timer.expired.clone());
                    if timer.periodic {
                        let mut next = timer.deadline + timer.interval;
                        if next <= now {
                            next = now + timer.interval;
                        }
                        timer.deadline = next;
                    } else {
                        timer.enabled = false;
                    }
                }
            }
            fired
        };
        for signal in to_fire {
            signal.emit(());
        }
    }

    /// Advance directly to the nearest armed timer's deadline and fire it
    /// (and any other timer sharing that deadline). Returns `false` if no
    /// timer is armed.
    pub fn run_once(&self) -> bool {
        let wait = {
            let inner = self.inner.borrow();
            inner
                .timers
                .iter()
                .filter(|t| t.enabled)
                .map(|t| t.deadline.saturating_sub(inner.now))
                .min()
        };
        match wait {
            Some(d) => {
                self.advance(d.as_millis() as u64);
                true
            }
            None => false,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.borrow().now.as_millis() as u64
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-shot or periodic timer bound to a [`Reactor`]: `set_enable(bool)`
/// arms or disarms it and `expired` fires on each deadline. Dropping a
/// `Timer` removes it from its reactor.
pub struct Timer {
    reactor: Rc<RefCell<ReactorInner>>,
    id: u64,
    expired: Rc<Signal<()>>,
}

impl Timer {
    /// Arm (`true`) or disarm (`false`) the timer. Arming resets the
    /// deadline to `now + interval`. Idempotent.
    pub fn set_enable(&self, enable: bool) {
        let mut inner = self.reactor.borrow_mut();
        let now = inner.now;
        if let Some(timer) = inner.timers.iter_mut().find(|t| t.id == self.id) {
            if enable && !timer.enabled {
                timer.deadline = now + timer.interval;
            }
            timer.enabled = enable;
        }
    }

    pub fn is_enabled(&self) -> bool {
        let inner = self.reactor.borrow();
        inner
            .timers
            .iter()
            .find(|t| t.id == self.id)
            .map(|t| t.enabled)
            .unwrap_or(false)
    }

    pub fn expired(&self) -> &Signal<()> {
        &self.expired
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.reactor.try_borrow_mut() {
            inner.timers.retain(|t| t.id != self.id);
        }
    }
}

/// Direction a byte-stream fd watch is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdDirection {
    Read,
    Write,
}

/// A watched file descriptor.
///
/// This is a plain data-plus-signal shim: actual readiness notification
/// (epoll/kqueue) is the platform adapter's job and stays out of scope.
/// Callers (or a platform adapter) call [`FdWatch::notify`] when the fd
/// becomes ready.
pub struct FdWatch {
    pub fd: i32,
    pub direction: FdDirection,
    pub activity: Signal<()>,
}

impl FdWatch {
    pub fn new(fd: i32, direction: FdDirection) -> Self {
        Self {
            fd,
            direction,
            activity: Signal::new(),
        }
    }

    pub fn notify(&self) {
        self.activity.emit(());
    }
}
