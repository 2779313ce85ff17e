//! Reactive State Runtime
//!
//! The contract generated components rely on, modeled natively so its ordering
//! rules can be exercised in tests. [`RUNTIME_JS`] is the browser implementation
//! that `henec --emit-runtime` writes out.
//!
//! Writes notify immediate watchers synchronously. Everyone else is queued on a
//! shared [`Scheduler`] and runs when the host calls [`Scheduler::flush`], which
//! stands in for the micro-task checkpoint.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

pub const RUNTIME_JS: &str = include_str!("../assets/runtime.js");

type Job = Box<dyn FnOnce()>;

struct Pending {
    active: Rc<Cell<bool>>,
    job: Job,
}

#[derive(Default)]
pub struct Scheduler {
    queue: RefCell<VecDeque<Pending>>,
    scheduled: Cell<bool>,
}

impl Scheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(Scheduler::default())
    }

    /// Queue `job`; it is skipped at flush time if `active` has been cleared.
    pub fn enqueue(&self, active: Rc<Cell<bool>>, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Pending {
            active,
            job: Box::new(job),
        });
        self.scheduled.set(true);
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.get()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run everything queued before this call, in insertion order. Jobs queued while
    /// flushing wait for the next flush. Returns the number of jobs run.
    pub fn flush(&self) -> usize {
        self.scheduled.set(false);
        let batch: VecDeque<Pending> = std::mem::take(&mut *self.queue.borrow_mut());
        let mut ran = 0;
        for pending in batch {
            if pending.active.get() {
                (pending.job)();
                ran += 1;
            }
        }
        if !self.queue.borrow().is_empty() {
            self.scheduled.set(true);
        }
        ran
    }
}

/// Handle returned by [`State::watch`].
#[derive(Debug, Clone)]
pub struct Unwatch {
    active: Rc<Cell<bool>>,
}

impl Unwatch {
    /// Safe to call any number of times, including from inside a flush.
    pub fn unwatch(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

struct Watcher<T> {
    callback: Rc<dyn Fn(&T)>,
    immediate: bool,
    active: Rc<Cell<bool>>,
}

struct StateInner<T> {
    value: RefCell<T>,
    watchers: RefCell<Vec<Watcher<T>>>,
    scheduler: Rc<Scheduler>,
}

pub struct State<T> {
    inner: Rc<StateInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        State {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> State<T> {
    pub fn new(scheduler: &Rc<Scheduler>, initial: T) -> Self {
        State {
            inner: Rc::new(StateInner {
                value: RefCell::new(initial),
                watchers: RefCell::new(Vec::new()),
                scheduler: Rc::clone(scheduler),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Store `value` and notify watchers; equal values are ignored.
    pub fn set(&self, value: T) {
        if *self.inner.value.borrow() == value {
            return;
        }
        *self.inner.value.borrow_mut() = value.clone();

        let watchers: Vec<(Rc<dyn Fn(&T)>, bool, Rc<Cell<bool>>)> = {
            let mut list = self.inner.watchers.borrow_mut();
            list.retain(|w| w.active.get());
            list.iter()
                .map(|w| (Rc::clone(&w.callback), w.immediate, Rc::clone(&w.active)))
                .collect()
        };

        for (callback, immediate, active) in watchers {
            if immediate {
                if active.get() {
                    callback(&value);
                }
            } else {
                let snapshot = value.clone();
                self.inner
                    .scheduler
                    .enqueue(active, move || callback(&snapshot));
            }
        }
    }

    pub fn watch(&self, callback: impl Fn(&T) + 'static, immediate: bool) -> Unwatch {
        let active = Rc::new(Cell::new(true));
        self.inner.watchers.borrow_mut().push(Watcher {
            callback: Rc::new(callback),
            immediate,
            active: Rc::clone(&active),
        });
        Unwatch { active }
    }

    pub fn watcher_count(&self) -> usize {
        self.inner
            .watchers
            .borrow()
            .iter()
            .filter(|w| w.active.get())
            .count()
    }
}
