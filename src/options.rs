use crate::{RetryPolicy, TimeoutPolicy};

/// Client-wide defaults applied when a request leaves timeout or retry unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: TimeoutPolicy,
    pub retry: RetryPolicy,
}

impl ClientOptions {
    pub fn new(timeout: TimeoutPolicy, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }
}
