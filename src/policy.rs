//! Retry and timeout policies.
//!
//! Policies are plain immutable records. The named presets cover the
//! request profiles the backend needs; custom policies go through the
//! validating constructors.

use std::borrow::Cow;
use std::time::Duration;

use crate::{RequestError, Result};

const TRANSIENT_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];
const EDGE_TRANSIENT_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504, 520, 521, 522, 523, 524];

/// Bounded retry behavior with optional exponential backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential: bool,
    retryable_statuses: Cow<'static, [u16]>,
}

impl RetryPolicy {
    /// General purpose writes: 3 retries, 1s doubling up to 10s.
    pub const DEFAULT: Self = Self::preset(3, 1_000, 10_000, true, TRANSIENT_STATUSES);
    /// Idempotent updates: 2 retries, 500ms doubling up to 5s.
    pub const IDEMPOTENT: Self = Self::preset(2, 500, 5_000, true, TRANSIENT_STATUSES);
    /// Uploads and payments: 5 retries, 2s doubling up to 30s, edge 52x included.
    pub const CRITICAL: Self = Self::preset(5, 2_000, 30_000, true, EDGE_TRANSIENT_STATUSES);
    /// Cheap reads: 1 retry after a fixed 500ms.
    pub const READ_ONLY: Self = Self::preset(1, 500, 2_000, false, TRANSIENT_STATUSES);

    const fn preset(
        max_retries: u32,
        base_ms: u64,
        max_ms: u64,
        exponential: bool,
        statuses: &'static [u16],
    ) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            exponential,
            retryable_statuses: Cow::Borrowed(statuses),
        }
    }

    /// Builds a validated policy.
    ///
    /// `base_delay` must be non-zero and `max_delay` must not be smaller
    /// than `base_delay`.
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        exponential: bool,
        retryable_statuses: impl IntoIterator<Item = u16>,
    ) -> Result<Self> {
        let policy = Self {
            max_retries,
            base_delay,
            max_delay,
            exponential,
            retryable_statuses: Cow::Owned(normalize_statuses(retryable_statuses)),
        };
        policy.validate()?;
        Ok(policy)
    }

    fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(RequestError::InvalidPolicy(
                "retry base delay must be greater than zero".to_owned(),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(RequestError::InvalidPolicy(format!(
                "retry max delay {:?} is below base delay {:?}",
                self.max_delay, self.base_delay
            )));
        }
        Ok(())
    }

    /// Applies the fields set in `overrides` on top of this policy.
    pub fn merged(&self, overrides: &RetryOverrides) -> Result<Self> {
        let policy = Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            exponential: overrides.exponential.unwrap_or(self.exponential),
            retryable_statuses: match &overrides.retryable_statuses {
                Some(statuses) => Cow::Owned(normalize_statuses(statuses.iter().copied())),
                None => self.retryable_statuses.clone(),
            },
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn exponential(&self) -> bool {
        self.exponential
    }

    pub fn retryable_statuses(&self) -> &[u16] {
        &self.retryable_statuses
    }

    /// Whether a response with `status` may be retried.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

fn normalize_statuses(statuses: impl IntoIterator<Item = u16>) -> Vec<u16> {
    let mut statuses: Vec<u16> = statuses.into_iter().collect();
    statuses.sort_unstable();
    statuses.dedup();
    statuses
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-request partial retry settings, merged field-by-field onto the
/// client default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryOverrides {
    pub max_retries: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub exponential: Option<bool>,
    pub retryable_statuses: Option<Vec<u16>>,
}

impl From<RetryPolicy> for RetryOverrides {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_retries: Some(policy.max_retries),
            base_delay: Some(policy.base_delay),
            max_delay: Some(policy.max_delay),
            exponential: Some(policy.exponential),
            retryable_statuses: Some(policy.retryable_statuses.into_owned()),
        }
    }
}

/// Per-phase timeouts for one request.
///
/// Only `connect + read` is enforced, as a single watchdog over the whole
/// call; `write` is carried for completeness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutPolicy {
    connect: Duration,
    read: Duration,
    write: Duration,
}

impl TimeoutPolicy {
    pub const FAST: Self = Self::preset(5_000, 10_000, 10_000);
    pub const NORMAL: Self = Self::preset(10_000, 30_000, 30_000);
    pub const SLOW: Self = Self::preset(15_000, 60_000, 60_000);
    pub const FILE_UPLOAD: Self = Self::preset(20_000, 120_000, 120_000);

    const fn preset(connect_ms: u64, read_ms: u64, write_ms: u64) -> Self {
        Self {
            connect: Duration::from_millis(connect_ms),
            read: Duration::from_millis(read_ms),
            write: Duration::from_millis(write_ms),
        }
    }

    /// Builds a validated policy; every phase must be non-zero.
    pub fn new(connect: Duration, read: Duration, write: Duration) -> Result<Self> {
        for (phase, value) in [("connect", connect), ("read", read), ("write", write)] {
            if value.is_zero() {
                return Err(RequestError::InvalidPolicy(format!(
                    "{phase} timeout must be greater than zero"
                )));
            }
        }
        Ok(Self {
            connect,
            read,
            write,
        })
    }

    pub fn connect(&self) -> Duration {
        self.connect
    }

    pub fn read(&self) -> Duration {
        self.read
    }

    pub fn write(&self) -> Duration {
        self.write
    }

    /// Total time a call may take before it is aborted.
    pub fn watchdog(&self) -> Duration {
        self.connect.saturating_add(self.read)
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{RetryOverrides, RetryPolicy, TimeoutPolicy};
    use crate::RequestError;

    #[test]
    fn presets_match_profiles() {
        assert_eq!(RetryPolicy::DEFAULT.max_retries(), 3);
        assert_eq!(RetryPolicy::IDEMPOTENT.base_delay(), Duration::from_millis(500));
        assert!(RetryPolicy::CRITICAL.is_retryable_status(522));
        assert!(!RetryPolicy::DEFAULT.is_retryable_status(522));
        assert!(!RetryPolicy::READ_ONLY.exponential());
        assert_eq!(TimeoutPolicy::FAST.watchdog(), Duration::from_secs(15));
        assert_eq!(TimeoutPolicy::FILE_UPLOAD.watchdog(), Duration::from_secs(140));
    }

    #[test]
    fn new_rejects_zero_base_delay() {
        let err = RetryPolicy::new(1, Duration::ZERO, Duration::from_secs(1), true, [503])
            .expect_err("zero base delay must be rejected");
        assert!(matches!(err, RequestError::InvalidPolicy(_)));
    }

    #[test]
    fn new_rejects_max_below_base() {
        let result = RetryPolicy::new(
            1,
            Duration::from_millis(500),
            Duration::from_millis(100),
            true,
            [503],
        );
        assert!(matches!(result, Err(RequestError::InvalidPolicy(_))));
    }

    #[test]
    fn new_dedups_statuses() {
        let policy = RetryPolicy::new(
            2,
            Duration::from_millis(10),
            Duration::from_millis(10),
            false,
            [503, 500, 503],
        )
        .expect("policy must be valid");
        assert_eq!(policy.retryable_statuses(), &[500, 503]);
    }

    #[test]
    fn merged_replaces_only_set_fields() {
        let overrides = RetryOverrides {
            max_retries: Some(7),
            exponential: Some(false),
            ..RetryOverrides::default()
        };
        let merged = RetryPolicy::DEFAULT
            .merged(&overrides)
            .expect("merge must succeed");

        assert_eq!(merged.max_retries(), 7);
        assert!(!merged.exponential());
        assert_eq!(merged.base_delay(), RetryPolicy::DEFAULT.base_delay());
        assert_eq!(
            merged.retryable_statuses(),
            RetryPolicy::DEFAULT.retryable_statuses()
        );
    }

    #[test]
    fn merged_normalizes_override_statuses() {
        let overrides = RetryOverrides {
            retryable_statuses: Some(vec![504, 429, 504, 500]),
            ..RetryOverrides::default()
        };
        let merged = RetryPolicy::DEFAULT
            .merged(&overrides)
            .expect("merge must succeed");
        assert_eq!(merged.retryable_statuses(), &[429, 500, 504]);

        let built = RetryPolicy::new(
            3,
            Duration::from_millis(1_000),
            Duration::from_millis(10_000),
            true,
            [504, 429, 504, 500],
        )
        .expect("policy must be valid");
        assert_eq!(merged, built);
    }

    #[test]
    fn merged_validates_result() {
        let overrides = RetryOverrides {
            max_delay: Some(Duration::from_millis(1)),
            ..RetryOverrides::default()
        };
        assert!(RetryPolicy::DEFAULT.merged(&overrides).is_err());
    }

    #[test]
    fn full_overrides_reproduce_policy() {
        let overrides = RetryOverrides::from(RetryPolicy::CRITICAL);
        let merged = RetryPolicy::READ_ONLY
            .merged(&overrides)
            .expect("merge must succeed");
        assert_eq!(merged, RetryPolicy::CRITICAL);
    }

    #[test]
    fn timeout_new_rejects_zero_phase() {
        let err = TimeoutPolicy::new(
            Duration::from_secs(1),
            Duration::ZERO,
            Duration::from_secs(1),
        )
        .expect_err("zero read timeout must be rejected");
        assert!(err.to_string().contains("read timeout"));
    }
}
