//! Options for a [`UseRequest`](crate::UseRequest).

use std::sync::Arc;

use crate::cell::ChangeDetection;
use crate::error::RequestError;
use crate::notify::{LogNotifier, Notifier};

pub type SuccessCallback<T> = Arc<dyn Fn(Option<&T>) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&RequestError) + Send + Sync>;
pub type FinishCallback = Arc<dyn Fn() + Send + Sync>;

/// What to do with the outcome of a call that a newer call has superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    /// Superseded calls still write `data`/`response`/`error`, notify, and run
    /// `on_success`/`on_error`. The last response received wins.
    #[default]
    Apply,
    /// Superseded calls have no effect at all. The last call started wins.
    Discard,
}

/// Behaviour switches and callbacks for one request instance.
pub struct UseRequestOptions<T> {
    /// Fire a call during construction when an address is bound.
    pub immediate: bool,

    /// Shallow change detection on the `data` cell. Deep detection suppresses
    /// notifications for writes that leave the value unchanged.
    pub shallow: bool,

    /// Value of `data` before the first successful call.
    pub initial_data: Option<T>,

    /// Reset `data` to `initial_data` at the start of every call.
    pub reset_on_execute: bool,

    pub stale_responses: StalePolicy,

    pub on_success: Option<SuccessCallback<T>>,
    pub on_error: Option<ErrorCallback>,
    pub on_finish: Option<FinishCallback>,

    pub notifier: Arc<dyn Notifier>,
}

impl<T> Default for UseRequestOptions<T> {
    fn default() -> Self {
        Self {
            immediate: false,
            shallow: true,
            initial_data: None,
            reset_on_execute: false,
            stale_responses: StalePolicy::default(),
            on_success: None,
            on_error: None,
            on_finish: None,
            notifier: Arc::new(LogNotifier),
        }
    }
}

impl<T: Clone> Clone for UseRequestOptions<T> {
    fn clone(&self) -> Self {
        Self {
            immediate: self.immediate,
            shallow: self.shallow,
            initial_data: self.initial_data.clone(),
            reset_on_execute: self.reset_on_execute,
            stale_responses: self.stale_responses,
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_finish: self.on_finish.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T> UseRequestOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn reset_on_execute(mut self, reset: bool) -> Self {
        self.reset_on_execute = reset;
        self
    }

    pub fn stale_responses(mut self, policy: StalePolicy) -> Self {
        self.stale_responses = policy;
        self
    }

    pub fn on_success(mut self, f: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&RequestError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_finish(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub(crate) fn data_detection(&self) -> ChangeDetection {
        if self.shallow {
            ChangeDetection::Shallow
        } else {
            ChangeDetection::Deep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = UseRequestOptions::<u32>::default();
        assert!(!options.immediate);
        assert!(options.shallow);
        assert!(options.initial_data.is_none());
        assert!(!options.reset_on_execute);
        assert_eq!(options.stale_responses, StalePolicy::Apply);
        assert_eq!(options.data_detection(), ChangeDetection::Shallow);
    }

    #[test]
    fn builder_sets_fields() {
        let options = UseRequestOptions::new()
            .immediate(true)
            .shallow(false)
            .initial_data(vec![1u8])
            .reset_on_execute(true)
            .stale_responses(StalePolicy::Discard)
            .on_finish(|| {});

        assert!(options.immediate);
        assert_eq!(options.data_detection(), ChangeDetection::Deep);
        assert_eq!(options.initial_data, Some(vec![1u8]));
        assert!(options.reset_on_execute);
        assert_eq!(options.stale_responses, StalePolicy::Discard);
        assert!(options.on_finish.is_some());
        assert!(options.on_success.is_none());
    }
}
