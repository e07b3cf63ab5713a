use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the given configuration file, or fall back to the built-in tables
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using built-in region tables");
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Warn about regions that cannot complete a full onboarding.
///
/// A host needs an address block for its subnet and a policy plus DHCP
/// server for its scope. Returns the codes of incomplete regions.
pub fn check_region_coverage(config: &Config) -> Vec<String> {
    let mut incomplete = Vec::new();
    for (code, region) in &config.regions {
        let mut missing = Vec::new();
        if region.address_block.is_none() {
            missing.push("address_block");
        }
        if region.dhcp_policy.is_none() {
            missing.push("dhcp_policy");
        }
        if region.dhcp_server.is_none() {
            missing.push("dhcp_server");
        }
        if region.call_managers.is_empty() {
            missing.push("call_managers");
        }
        if !missing.is_empty() {
            warn!(
                "Region {} is missing {}; hosts in this region will not be fully onboarded",
                code,
                missing.join(", ")
            );
            incomplete.push(code.clone());
        }
    }
    incomplete
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_file() {
        let yaml = r#"
client:
  interpreter: "/usr/bin/perl"
  script: "/opt/am/eman-am.pl"
  ping_timeout: "2s"
regions:
  LAB:
    address_block: "10.20.0.0/22"
    dhcp_policy: "Lab LAN"
    dhcp_server: "dhcp-lab-1"
    call_managers: ["10.1.1.1", "10.1.1.2"]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.client.interpreter, "/usr/bin/perl");
        assert_eq!(config.client.ping_timeout, std::time::Duration::from_secs(2));
        assert_eq!(config.regions.len(), 1);
        assert!(check_region_coverage(&config).is_empty());
    }

    #[test]
    fn test_load_rejects_invalid_block() {
        let yaml = r#"
regions:
  BAD:
    address_block: "not-a-block"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_tables() {
        let config = load_or_default(None).unwrap();
        let incomplete = check_region_coverage(&config);
        // only TEST carries every table in the built-in data
        assert!(!incomplete.contains(&"TEST".to_string()));
        assert!(incomplete.contains(&"SJC".to_string()));
    }
}
