//! Host list configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::probe::AddressFamily;

use super::validation::{ConfigError, validate_host};

/// Hosts to probe, grouped by address family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    /// Hosts probed with `fping -4`.
    #[serde(alias = "v4hosts")]
    pub v4: Vec<String>,

    /// Hosts probed with `fping -6`.
    #[serde(alias = "v6hosts")]
    pub v6: Vec<String>,
}

impl HostsConfig {
    /// Hosts configured for `family`.
    pub fn for_family(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }

    /// Families with at least one host, in startup order.
    pub fn active_families(&self) -> Vec<AddressFamily> {
        AddressFamily::ALL
            .into_iter()
            .filter(|family| !self.for_family(*family).is_empty())
            .collect()
    }

    /// Total number of configured hosts.
    pub fn total(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    /// Validate all host lists.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if no family has hosts, an entry
    /// is not a single fping argument, or a family lists a host twice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total() == 0 {
            return Err(ConfigError::ValidationError(
                "no hosts configured: set hosts.v4 and/or hosts.v6".to_string(),
            ));
        }

        for family in AddressFamily::ALL {
            let mut seen = HashSet::new();
            for host in self.for_family(family) {
                validate_host(host)
                    .map_err(|e| ConfigError::ValidationError(format!("hosts.{}: {}", family, e)))?;
                if !seen.insert(host.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "hosts.{}: duplicate host '{}'",
                        family, host
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hosts() {
        let yaml = r#"
v4: [192.0.2.1, example.com]
v6:
  - "2001:db8::1"
"#;
        let hosts: HostsConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(hosts.v4, vec!["192.0.2.1", "example.com"]);
        assert_eq!(hosts.v6, vec!["2001:db8::1"]);
        assert_eq!(hosts.total(), 3);
        assert!(hosts.validate().is_ok());
    }

    #[test]
    fn test_parse_legacy_keys() {
        let yaml = r#"
v4hosts: [a, b]
v6hosts: [c]
"#;
        let hosts: HostsConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(hosts.for_family(AddressFamily::V4), &["a".to_string(), "b".to_string()]);
        assert_eq!(hosts.for_family(AddressFamily::V6), &["c".to_string()]);
    }

    #[test]
    fn test_active_families_skips_empty() {
        let hosts = HostsConfig {
            v4: vec![],
            v6: vec!["c".to_string()],
        };
        assert_eq!(hosts.active_families(), vec![AddressFamily::V6]);

        let hosts = HostsConfig {
            v4: vec!["a".to_string()],
            v6: vec!["c".to_string()],
        };
        assert_eq!(hosts.active_families(), AddressFamily::ALL.to_vec());
    }

    #[test]
    fn test_validate_no_hosts() {
        let err = HostsConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("no hosts configured"));
    }

    #[test]
    fn test_validate_duplicate_host() {
        let hosts = HostsConfig {
            v4: vec!["a".to_string(), "a".to_string()],
            v6: vec![],
        };
        let err = hosts.validate().unwrap_err();
        assert!(err.to_string().contains("hosts.v4: duplicate host 'a'"));
    }

    #[test]
    fn test_same_host_in_both_families_allowed() {
        let hosts = HostsConfig {
            v4: vec!["example.com".to_string()],
            v6: vec!["example.com".to_string()],
        };
        assert!(hosts.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_host() {
        let hosts = HostsConfig {
            v4: vec![],
            v6: vec!["-c".to_string()],
        };
        let err = hosts.validate().unwrap_err();
        assert!(err.to_string().contains("hosts.v6"));
    }
}
