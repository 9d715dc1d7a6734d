//! Common types: property bags, the reserved selector key, and
//! per-connection status reporting.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Opaque property bag forwarded verbatim to factories and to the store
pub type Props = HashMap<String, Value>;

/// Reserved property key naming the shared connection to attach to.
///
/// Present and string-typed: the request attaches to that named connection.
/// Absent (or empty, or not a string): the request is anonymous and
/// pipeline-local.
pub const CONNECTION_SELECTOR_KEY: &str = "connectionSelector";

/// Read the selector out of a property bag, if one is set
pub fn extract_selector(props: &Props) -> Option<&str> {
    match props.get(CONNECTION_SELECTOR_KEY) {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Health of a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Live and answering pings
    Running,
    /// Ping failed, or reconstruction failed on reload
    Fail,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Status entry returned by the registry's aggregate health query
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    /// Current state
    pub status: ConnectionState,
    /// Failure detail when `status` is [`ConnectionState::Fail`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl ConnectionStatus {
    /// A running entry
    pub fn running() -> Self {
        Self {
            status: ConnectionState::Running,
            err_msg: None,
        }
    }

    /// A failed entry with its message
    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            status: ConnectionState::Fail,
            err_msg: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_present() {
        let mut props = Props::new();
        props.insert(CONNECTION_SELECTOR_KEY.to_string(), json!("c1"));
        assert_eq!(extract_selector(&props), Some("c1"));
    }

    #[test]
    fn test_selector_absent_or_malformed() {
        assert_eq!(extract_selector(&Props::new()), None);

        let mut props = Props::new();
        props.insert(CONNECTION_SELECTOR_KEY.to_string(), json!(""));
        assert_eq!(extract_selector(&props), None);

        props.insert(CONNECTION_SELECTOR_KEY.to_string(), json!(42));
        assert_eq!(extract_selector(&props), None);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Running.to_string(), "running");
        assert_eq!(ConnectionState::Fail.to_string(), "fail");
    }

    #[test]
    fn test_status_serialization() {
        let running = serde_json::to_value(ConnectionStatus::running()).unwrap();
        assert_eq!(running, json!({"status": "running"}));

        let failed = serde_json::to_value(ConnectionStatus::fail("broker down")).unwrap();
        assert_eq!(failed, json!({"status": "fail", "err_msg": "broker down"}));
    }
}
