//! Dispatch settings, loadable from YAML and overridable from the CLI.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::SettingsError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const SUCCESS_STATE: &str = "SUCCESS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSettings {
    /// Root URL of the job execution service, e.g. `https://jobs.example.com`.
    pub base_url: String,

    #[serde(
        rename = "poll_interval_secs",
        with = "poll_secs",
        default = "default_poll_interval"
    )]
    poll_interval: Duration,

    /// Overall limit on submit plus polling. `None` waits forever.
    #[serde(rename = "deadline_secs", with = "opt_secs", default)]
    deadline: Option<Duration>,

    /// Per-request HTTP timeout.
    #[serde(
        rename = "request_timeout_secs",
        with = "secs",
        default = "default_request_timeout"
    )]
    request_timeout: Duration,

    /// Reported states that end polling with a failure. Empty by default,
    /// in which case every state other than `SUCCESS` keeps polling.
    #[serde(default)]
    pub failure_states: Vec<String>,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl DispatchSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_states: Vec::new(),
        }
    }

    /// Replace the wait between status queries.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::ZeroPollInterval`] for a zero interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, SettingsError> {
        if interval.is_zero() {
            return Err(SettingsError::ZeroPollInterval);
        }
        self.poll_interval = interval;
        Ok(self)
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_failure_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure_states = states.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn is_failure_state(&self, state: &str) -> bool {
        self.failure_states.iter().any(|s| s == state)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        u64::deserialize(de).map(Duration::from_secs)
    }
}

mod poll_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserializer, Serializer};

    use super::SettingsError;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        super::secs::serialize(value, ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let interval = super::secs::deserialize(de)?;
        if interval.is_zero() {
            return Err(D::Error::custom(SettingsError::ZeroPollInterval));
        }
        Ok(interval)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => ser.serialize_some(&d.as_secs()),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(de).map(|v| v.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_when_only_base_url_given() {
        let settings: DispatchSettings =
            serde_yaml::from_str("base_url: http://localhost:8080").unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.deadline(), None);
        assert!(settings.failure_states.is_empty());
        assert_eq!(settings, DispatchSettings::new("http://localhost:8080"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let res: Result<DispatchSettings, _> =
            serde_yaml::from_str("base_url: x\npoll_every: 3");
        assert!(res.is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected_from_yaml() {
        let err = serde_yaml::from_str::<DispatchSettings>("base_url: x\npoll_interval_secs: 0")
            .unwrap_err();
        assert!(err.to_string().contains("poll interval"));
    }

    #[test]
    fn test_zero_poll_interval_rejected_by_builder() {
        let err = DispatchSettings::new("x")
            .with_poll_interval(Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, SettingsError::ZeroPollInterval));

        let settings = DispatchSettings::new("x")
            .with_poll_interval(Duration::from_millis(20))
            .unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_failure_state_lookup() {
        let settings = DispatchSettings::new("x").with_failure_states(["FAILED"]);
        assert!(settings.is_failure_state("FAILED"));
        assert!(!settings.is_failure_state("failed"));
        assert!(!settings.is_failure_state("RUNNING"));
    }
}
