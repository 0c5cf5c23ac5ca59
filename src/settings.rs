//! Worker settings from environment variables.
//!
//! All knobs live under the `DRIFTWATCH_` prefix and every one has a
//! default, so a bare environment starts a working demo worker.

use std::time::Duration;

use uuid::Uuid;

use crate::error::{Result, SettingsError};
use crate::sources::RetryPolicy;

/// Which consumption style the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueBackend {
    /// Lease-based consumer with mid-flight renewal.
    Broker,
    /// Fixed-interval polling consumer.
    Polling,
}

/// Runtime configuration for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Consumption style.
    pub queue_backend: QueueBackend,
    /// Messages processed concurrently by the broker consumer.
    pub max_concurrency: usize,
    /// Deliveries after which transient failures stop being retried.
    pub max_delivery_count: u32,
    /// Lease duration for received messages.
    pub visibility_timeout: Duration,
    /// Poll cadence of the polling consumer.
    pub poll_interval: Duration,
    /// Wait between receives when the queue is empty.
    pub idle_delay: Duration,
    /// Time allowed for in-flight messages to finish on shutdown.
    pub shutdown_grace: Duration,
    /// Retry budget for collaborator calls inside an analysis.
    pub retry_policy: RetryPolicy,
    /// Pipelines of one request analyzed concurrently.
    pub max_parallel_pipelines: usize,
    /// Stable-ish identity of this worker, for logs.
    pub consumer_id: String,
}

impl WorkerSettings {
    /// Loads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] for unparsable values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let queue_backend = match lookup("DRIFTWATCH_QUEUE_BACKEND").as_deref() {
            None | Some("broker") => QueueBackend::Broker,
            Some("polling") => QueueBackend::Polling,
            Some(other) => {
                return Err(SettingsError::InvalidValue {
                    name: String::from("DRIFTWATCH_QUEUE_BACKEND"),
                    value: other.to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            queue_backend,
            max_concurrency: parse_or(&lookup, "DRIFTWATCH_MAX_CONCURRENCY", 4_usize)?.max(1),
            max_delivery_count: parse_or(&lookup, "DRIFTWATCH_MAX_DELIVERY_COUNT", 5_u32)?.max(1),
            visibility_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DRIFTWATCH_VISIBILITY_TIMEOUT_SECS",
                300,
            )?),
            poll_interval: Duration::from_secs(parse_or(
                &lookup,
                "DRIFTWATCH_POLL_INTERVAL_SECS",
                30,
            )?),
            idle_delay: Duration::from_millis(parse_or(
                &lookup,
                "DRIFTWATCH_IDLE_DELAY_MS",
                1000,
            )?),
            shutdown_grace: Duration::from_secs(parse_or(
                &lookup,
                "DRIFTWATCH_SHUTDOWN_GRACE_SECS",
                30,
            )?),
            retry_policy: RetryPolicy {
                max_attempts: parse_or(&lookup, "DRIFTWATCH_RETRY_MAX_ATTEMPTS", 3_u32)?.max(1),
                base_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "DRIFTWATCH_RETRY_BASE_DELAY_MS",
                    500,
                )?),
                max_delay: Duration::from_secs(parse_or(
                    &lookup,
                    "DRIFTWATCH_RETRY_MAX_DELAY_SECS",
                    30,
                )?),
            },
            max_parallel_pipelines: parse_or(&lookup, "DRIFTWATCH_MAX_PARALLEL_PIPELINES", 1_usize)?
                .max(1),
            consumer_id: consumer_id(),
        })
    }

    /// Lease renewal cadence for the broker consumer.
    #[must_use]
    pub fn lease_renewal_interval(&self) -> Duration {
        // Renew at half the lease so one missed renewal is survivable.
        (self.visibility_timeout / 2).max(Duration::from_secs(1))
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None).unwrap_or_else(|_| unreachable!("defaults always parse"))
    }
}

/// Builds a worker identity from the host name and a short random suffix.
fn consumer_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| String::from("unknown-host"));
    let suffix = Uuid::new_v4().to_string();
    format!("{host}-{}", &suffix[..8])
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            SettingsError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = WorkerSettings::default();

        assert_eq!(settings.queue_backend, QueueBackend::Broker);
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.max_delivery_count, 5);
        assert_eq!(settings.visibility_timeout, Duration::from_secs(300));
        assert_eq!(settings.retry_policy.max_attempts, 3);
        assert!(!settings.consumer_id.is_empty());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = WorkerSettings::from_lookup(lookup_from(&[
            ("DRIFTWATCH_QUEUE_BACKEND", "polling"),
            ("DRIFTWATCH_MAX_CONCURRENCY", "16"),
            ("DRIFTWATCH_POLL_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.queue_backend, QueueBackend::Polling);
        assert_eq!(settings.max_concurrency, 16);
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = WorkerSettings::from_lookup(lookup_from(&[(
            "DRIFTWATCH_MAX_CONCURRENCY",
            "many",
        )]))
        .unwrap_err();

        assert!(err.to_string().contains("DRIFTWATCH_MAX_CONCURRENCY"), "got: {err}");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = WorkerSettings::from_lookup(lookup_from(&[(
            "DRIFTWATCH_QUEUE_BACKEND",
            "carrier-pigeon",
        )]))
        .unwrap_err();

        assert!(err.to_string().contains("carrier-pigeon"), "got: {err}");
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let settings = WorkerSettings::from_lookup(lookup_from(&[
            ("DRIFTWATCH_MAX_CONCURRENCY", "0"),
            ("DRIFTWATCH_MAX_DELIVERY_COUNT", "0"),
        ]))
        .unwrap();

        assert_eq!(settings.max_concurrency, 1);
        assert_eq!(settings.max_delivery_count, 1);
    }

    #[test]
    fn test_lease_renewal_is_half_the_lease() {
        let settings = WorkerSettings::from_lookup(lookup_from(&[(
            "DRIFTWATCH_VISIBILITY_TIMEOUT_SECS",
            "60",
        )]))
        .unwrap();

        assert_eq!(settings.lease_renewal_interval(), Duration::from_secs(30));
    }
}
