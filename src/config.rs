use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use tracing::warn;

use crate::planner::PlanConfig;
use crate::sort::SortBackend;
use crate::strategy::StrategyKind;
use crate::types::{MAX_THREADS, SafetyLimits, SortOrder};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerDefaults,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerDefaults::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "PACK_PLANNER_API_HOST";
    const PORT_VAR: &'static str = "PACK_PLANNER_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = parse_or_default(
            Self::PORT_VAR,
            port,
            Self::DEFAULT_PORT,
            |value| *value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_values(None, None)
    }
}

/// Planner settings used when a request or input file does not name them.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannerDefaults {
    pub strategy: StrategyKind,
    /// Explicit thread count; `None` uses the strategy's default.
    pub threads: Option<usize>,
    pub sort_backend: SortBackend,
    pub safety: SafetyLimits,
}

impl PlannerDefaults {
    const STRATEGY_VAR: &'static str = "PACK_PLANNER_STRATEGY";
    const THREADS_VAR: &'static str = "PACK_PLANNER_THREADS";
    const SORT_BACKEND_VAR: &'static str = "PACK_PLANNER_SORT_BACKEND";
    const MAX_PACKS_VAR: &'static str = "PACK_PLANNER_MAX_PACKS";
    const MAX_ITEM_ITERATIONS_VAR: &'static str = "PACK_PLANNER_MAX_ITEM_ITERATIONS";

    fn from_env() -> Self {
        let strategy = match env_string(Self::STRATEGY_VAR) {
            Some(raw) => StrategyKind::try_parse(&raw).unwrap_or_else(|| {
                warn!(
                    "Unknown strategy in {} ('{}'). Using {}.",
                    Self::STRATEGY_VAR,
                    raw,
                    StrategyKind::NextFit
                );
                StrategyKind::NextFit
            }),
            None => StrategyKind::default(),
        };

        let threads = env_string(Self::THREADS_VAR).map(|raw| {
            parse_or_default(
                Self::THREADS_VAR,
                Some(raw),
                strategy.default_threads(),
                |value| (1..=MAX_THREADS).contains(value),
                "must be between 1 and 32",
            )
        });

        let sort_backend = match env_string(Self::SORT_BACKEND_VAR) {
            Some(raw) => SortBackend::parse(&raw).unwrap_or_else(|| {
                warn!(
                    "Unknown sort backend in {} ('{}'). Using {}.",
                    Self::SORT_BACKEND_VAR,
                    raw,
                    SortBackend::Auto
                );
                SortBackend::Auto
            }),
            None => SortBackend::Auto,
        };

        let safety = SafetyLimits {
            max_packs: parse_or_default(
                Self::MAX_PACKS_VAR,
                env_string(Self::MAX_PACKS_VAR),
                SafetyLimits::DEFAULT_MAX_PACKS,
                |value| *value > 0,
                "must be greater than 0",
            ),
            max_item_iterations: parse_or_default(
                Self::MAX_ITEM_ITERATIONS_VAR,
                env_string(Self::MAX_ITEM_ITERATIONS_VAR),
                SafetyLimits::DEFAULT_MAX_ITEM_ITERATIONS,
                |value| *value > 0,
                "must be greater than 0",
            ),
        };

        Self {
            strategy,
            threads,
            sort_backend,
            safety,
        }
    }

    /// Plan configuration for the given order and limits, using these defaults
    /// unless a strategy or thread count is given explicitly.
    pub fn plan_config(
        &self,
        sort_order: SortOrder,
        max_items: i64,
        max_weight: f64,
        strategy: Option<StrategyKind>,
        threads: Option<usize>,
    ) -> PlanConfig {
        let kind = strategy.unwrap_or(self.strategy);
        let threads = threads
            .or(self.threads)
            .unwrap_or_else(|| kind.default_threads());
        PlanConfig::new(sort_order, max_items, max_weight)
            .with_strategy(kind)
            .with_threads(threads)
            .with_sort_backend(self.sort_backend)
            .with_safety(self.safety)
    }
}

impl Default for PlannerDefaults {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            threads: None,
            sort_backend: SortBackend::Auto,
            safety: SafetyLimits::default(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

/// Parses `raw`, falling back to `default` with a warning when it is
/// malformed or rejected by `validator`.
fn parse_or_default<T>(
    var_name: &str,
    raw: Option<String>,
    default: T,
    validator: impl Fn(&T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) if validator(&value) => value,
        Ok(_) => {
            warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_accepts_valid_values() {
        assert_eq!(
            parse_or_default("TEST_VAR", Some("42".into()), 7usize, |v| *v > 0, "positive"),
            42
        );
        assert_eq!(
            parse_or_default("TEST_VAR", None, 7usize, |v| *v > 0, "positive"),
            7
        );
    }

    #[test]
    fn test_parse_or_default_rejects_invalid_values() {
        assert_eq!(
            parse_or_default("TEST_VAR", Some("0".into()), 7usize, |v| *v > 0, "positive"),
            7
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("-3".into()), 7usize, |v| *v > 0, "positive"),
            7
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("many".into()), 7u16, |_| true, "number"),
            7
        );
    }

    #[test]
    fn test_api_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.display_host(), "0.0.0.0");
        assert!(config.binds_to_all_interfaces());
    }

    #[test]
    fn test_api_config_invalid_values_fall_back() {
        let config = ApiConfig::from_values(Some("not-an-ip".into()), Some("0".into()));
        assert_eq!(config.display_host(), "0.0.0.0");
        assert_eq!(config.port(), 8080);

        let config = ApiConfig::from_values(Some("127.0.0.1".into()), Some("9090".into()));
        assert!(!config.binds_to_all_interfaces());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
    }

    #[test]
    fn test_plan_config_prefers_explicit_values() {
        let defaults = PlannerDefaults {
            strategy: StrategyKind::BestFit,
            threads: Some(3),
            ..PlannerDefaults::default()
        };

        let config = defaults.plan_config(SortOrder::Natural, 10, 25.0, None, None);
        assert_eq!(config.strategy, StrategyKind::BestFit);
        assert_eq!(config.threads, 3);

        let config = defaults.plan_config(
            SortOrder::LongToShort,
            10,
            25.0,
            Some(StrategyKind::LockFree),
            Some(6),
        );
        assert_eq!(config.strategy, StrategyKind::LockFree);
        assert_eq!(config.threads, 6);
        assert_eq!(config.sort_order, SortOrder::LongToShort);
    }
}
