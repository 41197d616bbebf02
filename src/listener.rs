// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Listener sets with RAII unsubscribe handles.
//!
//! Every emitter in the core owns a [`Subscribers<T>`]. Subscribing returns a
//! [`Subscription`] whose destruction unsubscribes, so a listener can never
//! outlive the state it captures. Groups of subscriptions whose lifetime is
//! tied to one owner (e.g. a process supervisor's live kind) are collected in
//! a [`SubscriptionSet`] and dropped together.
//!
//! All registration and firing happens on the single main task, so no locks
//! are needed; re-entrant subscribe/unsubscribe during an emit is supported
//! by swapping the slot list out for the duration of the call.

use std::{cell::RefCell,
          rc::{Rc, Weak}};

type Slot<T> = (u64, Box<dyn FnMut(&T)>);

struct Slots<T> {
    next_id: u64,
    listeners: Vec<Slot<T>>,
    /// Ids unsubscribed while an emit had the listener list checked out.
    dead: Vec<u64>,
}

/// A set of listeners for values of type `T`. Clones share the same
/// listener list.
pub struct Subscribers<T> {
    inner: Rc<RefCell<Slots<T>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Subscribers<T> {
    fn default() -> Self { Self::new() }
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.inner.borrow().listeners.len())
            .finish()
    }
}

impl<T: 'static> Subscribers<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
                dead: Vec::new(),
            })),
        }
    }

    /// Register a listener. Dropping the returned [`Subscription`]
    /// unregisters it.
    #[must_use]
    pub fn subscribe(&self, f: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut slots = self.inner.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, Box::new(f)));
            id
        };

        let weak = Rc::downgrade(&self.inner);
        Subscription {
            detach: Some(Box::new(move || Self::remove(&weak, id))),
        }
    }

    fn remove(weak: &Weak<RefCell<Slots<T>>>, id: u64) {
        if let Some(inner) = weak.upgrade() {
            let mut slots = inner.borrow_mut();
            if let Some(pos) = slots.listeners.iter().position(|(i, _)| *i == id) {
                drop(slots.listeners.remove(pos));
            } else {
                // The listener list is checked out by an in-flight emit;
                // record the removal so it is applied when the list returns.
                slots.dead.push(id);
            }
        }
    }

    /// Fire every registered listener with `value`.
    pub fn emit(&self, value: &T) {
        // Check the list out so listeners may subscribe/unsubscribe without
        // hitting the RefCell re-entrantly.
        let mut current = std::mem::take(&mut self.inner.borrow_mut().listeners);
        for (_, f) in &mut current {
            f(value);
        }

        let mut slots = self.inner.borrow_mut();
        let added = std::mem::take(&mut slots.listeners);
        current.extend(added);
        if !slots.dead.is_empty() {
            let dead = std::mem::take(&mut slots.dead);
            current.retain(|(id, _)| !dead.contains(id));
        }
        slots.listeners = current;
    }

    #[must_use]
    pub fn len(&self) -> usize { self.inner.borrow().listeners.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Owning handle for a registered listener; dropping it unsubscribes.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// A group of subscriptions dropped together, e.g. everything wired to a
/// process supervisor's live kind.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    subs: Vec<Subscription>,
}

impl SubscriptionSet {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, sub: Subscription) { self.subs.push(sub); }

    /// Drop every subscription in the set.
    pub fn clear(&mut self) { self.subs.clear(); }

    #[must_use]
    pub fn len(&self) -> usize { self.subs.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.subs.is_empty() }
}
