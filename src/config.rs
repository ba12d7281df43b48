//! Configuration value types consumed by the core (§6). Parsing (YAML or
//! otherwise) is out of scope — these are plain `serde`-derived data that
//! an external loader populates and hands to `crate::server::Server::boot`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::wait::IdleStrategy;

/// Serde can't derive for `IdleStrategy` directly (it's hand-rolled to
/// carry `Duration`s), so config files name a strategy and optional
/// parameters; `to_idle_strategy` resolves it the way the core needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdleStrategyConfig {
    BusySpin,
    Yielding,
    Sleeping { nanos: u64 },
    Backoff {
        spin: u32,
        yield_count: u32,
        park_min_nanos: u64,
        park_max_nanos: u64,
    },
}

impl Default for IdleStrategyConfig {
    fn default() -> Self {
        IdleStrategyConfig::Backoff {
            spin: 100,
            yield_count: 100,
            park_min_nanos: 1_000,
            park_max_nanos: 1_000_000,
        }
    }
}

impl IdleStrategyConfig {
    pub fn to_idle_strategy(&self) -> IdleStrategy {
        use std::time::Duration;
        match self {
            IdleStrategyConfig::BusySpin => IdleStrategy::BusySpin,
            IdleStrategyConfig::Yielding => IdleStrategy::Yielding,
            IdleStrategyConfig::Sleeping { nanos } => IdleStrategy::Sleeping(Duration::from_nanos(*nanos)),
            IdleStrategyConfig::Backoff {
                spin,
                yield_count,
                park_min_nanos,
                park_max_nanos,
            } => IdleStrategy::Backoff {
                spin: *spin,
                yield_count: *yield_count,
                park_min: Duration::from_nanos(*park_min_nanos),
                park_max: Duration::from_nanos(*park_max_nanos),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFeedConfig {
    pub name: String,
    #[serde(default)]
    pub broadcast: bool,
    #[serde(default)]
    pub wrap_with_named_event: bool,
    #[serde(default)]
    pub cache_event_log: bool,
    pub agent_name: String,
    #[serde(default = "IdleStrategyConfig::default")]
    pub idle_strategy: IdleStrategyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSinkConfig {
    pub name: String,
    #[serde(default)]
    pub agent_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProcessorConfig {
    pub name: String,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub config: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProcessorGroupConfig {
    pub agent_name: String,
    #[serde(default = "IdleStrategyConfig::default")]
    pub idle_strategy: IdleStrategyConfig,
    #[serde(default)]
    pub log_level: Option<String>,
    pub processors: Vec<EventProcessorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub agent_group: Option<String>,
    #[serde(default)]
    pub idle_strategy: Option<IdleStrategyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub agent_name: String,
    #[serde(default = "IdleStrategyConfig::default")]
    pub idle_strategy: IdleStrategyConfig,
    #[serde(default)]
    pub core_id: Option<usize>,
}

/// The fully assembled boot configuration (§6): everything `Server::boot`
/// needs, already parsed by an external loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub feeds: Vec<EventFeedConfig>,
    #[serde(default)]
    pub sinks: Vec<EventSinkConfig>,
    #[serde(default)]
    pub processor_groups: Vec<EventProcessorGroupConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub threads: Vec<ThreadConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_strategy_config_round_trips_through_json() {
        let cfg = IdleStrategyConfig::Backoff {
            spin: 10,
            yield_count: 20,
            park_min_nanos: 500,
            park_max_nanos: 5_000,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: IdleStrategyConfig = serde_json::from_str(&json).unwrap();
        match back {
            IdleStrategyConfig::Backoff { spin, .. } => assert_eq!(spin, 10),
            _ => panic!("expected backoff"),
        }
    }

    #[test]
    fn server_config_deserializes_with_defaults() {
        let json = r#"{"feeds":[{"name":"feed","agent_name":"a1"}]}"#;
        let cfg: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.feeds.len(), 1);
        assert!(!cfg.feeds[0].broadcast);
    }
}
