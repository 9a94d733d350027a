//! Observable state cells.
//!
//! A [`Cell`] holds one value and lets any number of observers subscribe to
//! changes or wait until the value satisfies a predicate. Cells are backed by
//! `tokio::sync::watch`, so reads never block on writers for long and waiting
//! is cancellation-safe.

use tokio::sync::watch;

/// How a cell decides whether an assignment counts as a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeDetection {
    /// Every assignment notifies observers.
    #[default]
    Shallow,
    /// Assignments notify only when the new value differs from the old one.
    Deep,
}

/// An observable value.
#[derive(Debug)]
pub struct Cell<T> {
    tx: watch::Sender<T>,
}

impl<T> Cell<T> {
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    /// Replace the value and notify observers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Replace the value, notifying observers only if it changed.
    ///
    /// Returns whether observers were notified.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Assign according to `detection`.
    pub fn assign(&self, value: T, detection: ChangeDetection) -> bool
    where
        T: PartialEq,
    {
        match detection {
            ChangeDetection::Shallow => {
                self.set(value);
                true
            }
            ChangeDetection::Deep => self.set_if_changed(value),
        }
    }

    /// Mutate in place. `f` decides whether observers are notified.
    pub fn modify(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.tx.borrow())
    }

    /// Observe future changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Wait until `predicate` holds, checking the current value first.
    pub async fn wait_until(&self, mut predicate: impl FnMut(&T) -> bool) -> T
    where
        T: Clone,
    {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let value = match rx.wait_for(|value| predicate(value)).await {
            Ok(value) => value.clone(),
            Err(_) => self.get(),
        };
        value
    }
}

impl<T: Clone> Cell<T> {
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }
}

impl<T: Default> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn set_and_get() {
        let cell = Cell::new(1);
        cell.set(2);
        assert_eq!(cell.get(), 2);
        assert_eq!(cell.with(|v| v * 10), 20);
    }

    #[test]
    fn shallow_assignment_always_notifies() {
        let cell = Cell::new("a".to_string());
        let mut rx = cell.subscribe();

        assert!(cell.assign("a".to_string(), ChangeDetection::Shallow));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn deep_assignment_skips_equal_values() {
        let cell = Cell::new(vec![1, 2]);
        let mut rx = cell.subscribe();

        assert!(!cell.assign(vec![1, 2], ChangeDetection::Deep));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.assign(vec![1, 2, 3], ChangeDetection::Deep));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 2, 3]);
    }

    #[test]
    fn modify_respects_closure_verdict() {
        let cell = Cell::new(0u32);
        let mut rx = cell.subscribe();

        assert!(!cell.modify(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.modify(|v| {
            *v += 1;
            true
        }));
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn wait_until_returns_immediately_when_predicate_holds() {
        let cell = Cell::new(true);
        assert!(cell.wait_until(|done| *done).await);
    }

    #[tokio::test]
    async fn wait_until_observes_later_writes() {
        let cell = Arc::new(Cell::new(0));

        let waiter = tokio::spawn({
            let cell = cell.clone();
            async move { cell.wait_until(|v| *v >= 3).await }
        });

        for i in 1..=3 {
            tokio::task::yield_now().await;
            cell.set(i);
        }

        assert_eq!(waiter.await.unwrap(), 3);
    }
}
