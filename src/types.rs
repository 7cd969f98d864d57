// src/types.rs

use std::fmt;

use serde::Serialize;

/// Environment variable consulted when the config does not say whether we
/// run inside the same container as the hosts.
pub const EXEC_IN_CONTAINER_ENV: &str = "EXEC_IN_CONTAINER";

/// Where the dispatcher runs relative to the hosts it controls.
///
/// Only changes the command rewriting policy, never the host list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExecutionContext {
    pub in_container: bool,
}

impl ExecutionContext {
    pub fn new(in_container: bool) -> Self {
        Self { in_container }
    }

    /// Resolve the context from an explicit setting, falling back to
    /// `EXEC_IN_CONTAINER`.
    pub fn resolve(explicit: Option<bool>) -> Self {
        let in_container = match explicit {
            Some(v) => v,
            None => std::env::var(EXEC_IN_CONTAINER_ENV)
                .map(|v| env_flag_set(&v))
                .unwrap_or(false),
        };
        Self { in_container }
    }
}

fn env_flag_set(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "" | "0" | "false" | "no"
    )
}

/// Ordered list of host identifiers for a run.
///
/// The order is the dispatch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostList(Vec<String>);

impl HostList {
    pub fn new(hosts: Vec<String>) -> Self {
        Self(hosts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of different hosts; a repeated entry counts once.
    pub fn distinct_len(&self) -> usize {
        self.iter().collect::<std::collections::BTreeSet<_>>().len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for HostList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(","))
    }
}

/// Whether a host is the controlling machine itself.
pub fn is_local_host(host: &str) -> bool {
    matches!(host.trim(), "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_setting_wins() {
        assert!(ExecutionContext::resolve(Some(true)).in_container);
        assert!(!ExecutionContext::resolve(Some(false)).in_container);
    }

    #[test]
    fn env_flag_values() {
        assert!(env_flag_set("1"));
        assert!(env_flag_set("True"));
        assert!(!env_flag_set("false"));
        assert!(!env_flag_set(" 0 "));
        assert!(!env_flag_set(""));
    }

    #[test]
    fn local_hosts() {
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("localhost"));
        assert!(!is_local_host("10.0.0.2"));
    }

    #[test]
    fn repeated_hosts_count_once() {
        let hosts = HostList::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(hosts.len(), 3);
        assert_eq!(hosts.distinct_len(), 2);
    }
}
