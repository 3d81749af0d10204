//! Synchronous observer plumbing for engine state.
//!
//! Listeners run on the caller's thread, in subscription order, after the
//! change they observe has been committed.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

pub struct Listeners<E> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener<E>)>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self, event: &E) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// A value plus the listeners that want to hear about every change to it.
#[derive(Debug, Default)]
pub struct Observable<T> {
    value: T,
    listeners: Listeners<T>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            listeners: Listeners::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn set(&mut self, value: T) {
        self.value = value;
        self.listeners.notify(&self.value);
    }

    /// Mutates the value in place, then notifies once.
    pub fn update<R>(&mut self, change: impl FnOnce(&mut T) -> R) -> R {
        let result = change(&mut self.value);
        self.listeners.notify(&self.value);
        result
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::reactive::Observable;

    #[test]
    fn listeners_see_committed_values_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut counter = Observable::new(0u32);

        let first = Rc::clone(&seen);
        counter.subscribe(move |value| first.borrow_mut().push(("first", *value)));
        let second = Rc::clone(&seen);
        counter.subscribe(move |value| second.borrow_mut().push(("second", *value)));

        counter.set(3);
        let doubled = counter.update(|value| {
            *value *= 2;
            *value
        });

        assert_eq!(doubled, 6);
        assert_eq!(*counter.get(), 6);
        assert_eq!(
            *seen.borrow(),
            vec![("first", 3), ("second", 3), ("first", 6), ("second", 6)]
        );
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut name = Observable::new(String::new());

        let sink = Rc::clone(&seen);
        let id = name.subscribe(move |value: &String| sink.borrow_mut().push(value.clone()));
        name.set("a".to_string());

        assert!(name.unsubscribe(id));
        assert!(!name.unsubscribe(id));
        name.set("b".to_string());

        assert_eq!(*seen.borrow(), vec!["a".to_string()]);
        assert_eq!(name.get(), "b");
    }
}
