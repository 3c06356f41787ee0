//! Minimal ordered event emitter.
//!
//! Listeners are kept per event name in registration order. Emission walks a
//! snapshot of the list, so listeners added or removed while an emission is
//! running only affect later emissions. A panicking listener is logged and
//! skipped; the remaining listeners still run and the panic never reaches the
//! caller of `emit`.
//!
//! The emitter is single-threaded (`Rc`/`RefCell`). Each instance belongs to
//! the coordinating thread that owns the process's message loop.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{trace, warn};

/// A registered callback. Identity (`Rc::ptr_eq`) is what `off` matches on.
pub type Listener<A> = Rc<dyn Fn(&A)>;

/// Wrap a closure as a `Listener`, inferring the argument type.
pub fn listener<A, F>(f: F) -> Listener<A>
where
    F: Fn(&A) + 'static,
{
    Rc::new(f)
}

struct Registration<A> {
    listener: Listener<A>,
    /// Set for `once` registrations; flipped on first dispatch.
    fired: Option<Rc<Cell<bool>>>,
}

impl<A> Clone for Registration<A> {
    fn clone(&self) -> Self {
        Self {
            listener: Rc::clone(&self.listener),
            fired: self.fired.clone(),
        }
    }
}

impl<A> Registration<A> {
    fn persistent(listener: Listener<A>) -> Self {
        Self {
            listener,
            fired: None,
        }
    }

    fn once(listener: Listener<A>) -> Self {
        Self {
            listener,
            fired: Some(Rc::new(Cell::new(false))),
        }
    }

    fn is_same_once(&self, flag: &Rc<Cell<bool>>) -> bool {
        self.fired.as_ref().is_some_and(|f| Rc::ptr_eq(f, flag))
    }
}

type ListenerList<A> = Rc<RefCell<Vec<Registration<A>>>>;

/// Live view of the listeners registered for one event.
///
/// Obtained from [`EventEmitter::listeners`]; reflects later registrations
/// and removals on the same event until the whole table is reset.
pub struct Listeners<A> {
    list: ListenerList<A>,
}

impl<A> Listeners<A> {
    pub fn len(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.borrow().is_empty()
    }

    /// Copy of the current callbacks, in dispatch order.
    pub fn to_vec(&self) -> Vec<Listener<A>> {
        self.list
            .borrow()
            .iter()
            .map(|r| Rc::clone(&r.listener))
            .collect()
    }

    pub fn contains(&self, listener: &Listener<A>) -> bool {
        self.list
            .borrow()
            .iter()
            .any(|r| Rc::ptr_eq(&r.listener, listener))
    }
}

/// Ordered per-event listener table.
pub struct EventEmitter<A> {
    table: RefCell<HashMap<String, ListenerList<A>>>,
}

impl<A> EventEmitter<A> {
    pub fn new() -> Self {
        Self {
            table: RefCell::new(HashMap::new()),
        }
    }

    fn list(&self, event: &str) -> ListenerList<A> {
        let mut table = self.table.borrow_mut();
        Rc::clone(table.entry(event.to_string()).or_default())
    }

    fn existing(&self, event: &str) -> Option<ListenerList<A>> {
        self.table.borrow().get(event).cloned()
    }

    /// Drop the entry for `event` once it has no listeners and nobody holds
    /// a live view of it.
    fn prune(&self, event: &str) {
        let mut table = self.table.borrow_mut();
        let idle = table
            .get(event)
            .is_some_and(|list| list.borrow().is_empty() && Rc::strong_count(list) == 1);
        if idle {
            table.remove(event);
        }
    }

    /// Append `listener` for `event`. Duplicates are kept and each runs.
    pub fn on(&self, event: &str, listener: Listener<A>) {
        self.list(event)
            .borrow_mut()
            .push(Registration::persistent(listener));
    }

    pub fn add_listener(&self, event: &str, listener: Listener<A>) {
        self.on(event, listener);
    }

    /// Append `listener` so that it runs at most once.
    ///
    /// The registration is removed before the callback is invoked, so a
    /// re-entrant `emit` from inside the callback does not run it again.
    pub fn once(&self, event: &str, listener: Listener<A>) {
        self.list(event)
            .borrow_mut()
            .push(Registration::once(listener));
    }

    pub fn prepend_listener(&self, event: &str, listener: Listener<A>) {
        self.list(event)
            .borrow_mut()
            .insert(0, Registration::persistent(listener));
    }

    pub fn prepend_once_listener(&self, event: &str, listener: Listener<A>) {
        self.list(event)
            .borrow_mut()
            .insert(0, Registration::once(listener));
    }

    /// Remove every registration of `listener` for `event`, including
    /// pending `once` registrations of it.
    pub fn off(&self, event: &str, listener: &Listener<A>) {
        let Some(list) = self.existing(event) else {
            return;
        };
        list.borrow_mut()
            .retain(|r| !Rc::ptr_eq(&r.listener, listener));
        drop(list);
        self.prune(event);
    }

    pub fn remove_listener(&self, event: &str, listener: &Listener<A>) {
        self.off(event, listener);
    }

    /// Clear the listeners of `event`, or reset the whole table when `None`.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        match event {
            Some(event) => {
                if let Some(list) = self.existing(event) {
                    list.borrow_mut().clear();
                }
                self.prune(event);
            }
            None => self.table.borrow_mut().clear(),
        }
    }

    /// Live listener view for `event`, creating an empty entry on first use.
    pub fn listeners(&self, event: &str) -> Listeners<A> {
        Listeners {
            list: self.list(event),
        }
    }

    /// Number of events that currently have a table entry.
    pub fn event_count(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.table
            .borrow()
            .get(event)
            .map_or(0, |list| list.borrow().len())
    }

    /// Invoke the listeners registered for `event` at the time of the call.
    ///
    /// Returns how many listeners ran to completion.
    pub fn emit(&self, event: &str, args: &A) -> usize {
        let Some(list) = self.existing(event) else {
            trace!(event, "emit with no listeners");
            return 0;
        };
        let snapshot: Vec<Registration<A>> = list.borrow().clone();
        trace!(event, listeners = snapshot.len(), "emit");

        let mut completed = 0;
        for registration in snapshot {
            if let Some(fired) = &registration.fired {
                if fired.replace(true) {
                    continue;
                }
                list.borrow_mut().retain(|r| !r.is_same_once(fired));
            }

            let callback = Rc::clone(&registration.listener);
            match panic::catch_unwind(AssertUnwindSafe(|| callback(args))) {
                Ok(()) => completed += 1,
                Err(payload) => {
                    warn!(
                        event,
                        reason = panic_message(payload.as_ref()),
                        "listener panicked; continuing dispatch"
                    );
                }
            }
        }
        drop(list);
        self.prune(event);
        completed
    }
}

impl<A> Default for EventEmitter<A> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
