//! Configuration for the exercise run

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of one exercise run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Service type to register and browse for
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Instance name of the registered test service
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// Discovery domain; empty selects the default domain
    #[serde(default)]
    pub domain: String,

    /// Interface to operate on; 0 means all interfaces
    #[serde(default)]
    pub interface_index: u32,

    /// Port the test service advertises; the duplicate registration
    /// uses the next port up
    #[serde(default = "default_port")]
    pub port: u16,

    /// Skip resolving repeat appearances of an instance already seen
    #[serde(default)]
    pub dedup_resolves: bool,

    /// How long the driver waits for the run to conclude (seconds)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            instance_name: default_instance_name(),
            domain: String::new(),
            interface_index: 0,
            port: default_port(),
            dedup_resolves: false,
            run_timeout_secs: default_run_timeout(),
        }
    }
}

impl HarnessConfig {
    /// Returns the run timeout as a Duration
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Port used by the conflicting duplicate registration
    pub fn duplicate_port(&self) -> u16 {
        self.port.wrapping_add(1)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port cannot be 0".to_string());
        }

        if self.run_timeout_secs == 0 {
            return Err("run_timeout_secs cannot be 0".to_string());
        }

        let mut labels = self.service_type.trim_end_matches('.').split('.');
        let app = labels.next().unwrap_or_default();
        let proto = labels.next().unwrap_or_default();
        if !app.starts_with('_') || !(proto == "_udp" || proto == "_tcp") {
            return Err(format!(
                "service_type '{}' is not of the _name._udp/_name._tcp shape",
                self.service_type
            ));
        }

        Ok(())
    }
}

fn default_service_type() -> String {
    "_unittest._udp".to_string()
}

fn default_instance_name() -> String {
    "Test service".to_string()
}

fn default_port() -> u16 {
    5678
}

fn default_run_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_unittest_service() {
        let config = HarnessConfig::default();

        assert_eq!(config.service_type, "_unittest._udp");
        assert_eq!(config.instance_name, "Test service");
        assert_eq!(config.port, 5678);
        assert_eq!(config.duplicate_port(), 5679);
        assert!(!config.dedup_resolves);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let config = HarnessConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_service_type() {
        let config = HarnessConfig {
            service_type: "unittest".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: HarnessConfig =
            serde_yaml::from_str("service_type: _probe._tcp\ndedup_resolves: true\n").unwrap();

        assert_eq!(config.service_type, "_probe._tcp");
        assert!(config.dedup_resolves);
        assert_eq!(config.instance_name, "Test service");
        assert_eq!(config.port, 5678);
        assert_eq!(config.run_timeout_secs, 30);
    }

    #[test]
    fn accepts_tcp_service_types() {
        let config = HarnessConfig {
            service_type: "_http._tcp".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
