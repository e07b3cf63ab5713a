//! Device onboarding.
//!
//! For every host in the input list a small subnet is reserved (or an existing
//! one re-created), a DHCP scope is defined in it and the gateway plus DHCP
//! interfaces are registered.

pub mod input;
pub mod report;

use std::fmt;
use std::net::IpAddr;

use log::{error, info, warn};
use serde::Serialize;

use crate::am::{
    AmClient, AmError, AmResult, CommandRunner, InterfaceQuery, InterfaceRequest, ScopeRequest,
    SubnetRequest,
};
use crate::config::{Config, RegionConfig};
use crate::ip::allocator::{gateway_of, offset, subnet_for_gateway};

pub use input::{read_hosts, HostRow};
pub use report::{Report, ReportRow};

/// Final state of one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HostStatus {
    Onboarded,
    #[serde(rename = "Failed Subnet")]
    FailedSubnet,
    #[serde(rename = "Failed Scope")]
    FailedScope,
    #[serde(rename = "Failed Interface")]
    FailedInterface,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HostStatus::Onboarded => "Onboarded",
            HostStatus::FailedSubnet => "Failed Subnet",
            HostStatus::FailedScope => "Failed Scope",
            HostStatus::FailedInterface => "Failed Interface",
        };
        f.write_str(label)
    }
}

/// What happened to one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostOutcome {
    pub hostname: String,
    pub region: String,
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub status: HostStatus,
    /// Messages of every step that failed
    pub errors: Vec<String>,
}

/// Runs the onboarding steps against one address-management client.
pub struct Onboarder<'a, R: CommandRunner> {
    client: &'a AmClient<R>,
    config: &'a Config,
}

/// Keep going on ordinary failures, stop on bad credentials.
fn recover<T>(step: &str, result: AmResult<T>, errors: &mut Vec<String>) -> AmResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_unauthorized() => Err(e),
        Err(e) => {
            error!("{} failed: {}", step, e);
            errors.push(format!("{}: {}", step, e));
            Ok(None)
        }
    }
}

fn missing(region: &str, what: &str) -> AmError {
    AmError::UnableToReserve(format!("region '{}' has no {} configured", region, what))
}

impl<'a, R: CommandRunner> Onboarder<'a, R> {
    pub fn new(client: &'a AmClient<R>, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// Make a harmless lookup to find out whether the credentials work.
    ///
    /// Only an authorization failure is reported; anything else the tool
    /// says about the lookup is irrelevant here.
    pub fn check_auth(&self) -> AmResult<()> {
        info!("Verifying address management authentication");
        match self.client.find_interfaces(&InterfaceQuery::by_name("AnyDevice")) {
            Err(e) if e.is_unauthorized() => {
                error!("User {} is not authorized for address management", self.client.username());
                Err(e)
            }
            Err(e) => {
                warn!("Authentication check returned: {}", e);
                Ok(())
            }
            Ok(_) => Ok(()),
        }
    }

    /// Onboard a single host.
    ///
    /// Step failures end up in the returned outcome; only
    /// [`AmError::Unauthorized`] is returned as an error.
    pub fn onboard_host(&self, row: &HostRow) -> AmResult<HostOutcome> {
        info!("++++++++++++++ {} +++++++++++++++", row.hostname);
        let mut outcome = HostOutcome {
            hostname: row.hostname.clone(),
            region: row.region.clone(),
            subnet: None,
            gateway: None,
            status: HostStatus::FailedSubnet,
            errors: Vec::new(),
        };

        let region = self.config.region(&row.region);
        if region.is_none() {
            warn!("Unknown region '{}' for {}", row.region, row.hostname);
        }

        let subnet = match &row.device_ip {
            Some(device_ip) => self.recreate_subnet(&row.hostname, device_ip),
            None => self.create_subnet(&row.hostname, &row.region, region),
        };
        let Some(subnet) = recover("subnet", subnet, &mut outcome.errors)? else {
            return Ok(outcome);
        };
        let Some(gateway) = recover("subnet", gateway_of(&subnet), &mut outcome.errors)? else {
            return Ok(outcome);
        };
        outcome.subnet = Some(subnet.clone());
        outcome.gateway = Some(gateway.to_string());

        let scope = self.create_scope(&row.hostname, &subnet, gateway, &row.region, region);
        let scope_ok = recover("scope", scope, &mut outcome.errors)?.is_some();

        let interfaces_ok = self.add_interfaces(&row.hostname, gateway, &mut outcome.errors)?;

        outcome.status = if !interfaces_ok {
            HostStatus::FailedInterface
        } else if !scope_ok {
            HostStatus::FailedScope
        } else {
            HostStatus::Onboarded
        };
        info!("{}: {}", row.hostname, outcome.status);
        Ok(outcome)
    }

    /// Onboard every host and record each outcome in `report`.
    ///
    /// Stops at the first authorization failure, leaving the hosts processed
    /// so far in the report.
    pub fn run(&self, rows: &[HostRow], report: &mut Report) -> AmResult<()> {
        info!("+++++++++++++++++++++++++++++");
        info!("Starting new on-boarding run.");
        info!("+++++++++++++++++++++++++++++");

        for row in rows {
            let outcome = self.onboard_host(row)?;
            report.push(outcome);
        }

        info!("++++++++++++++++++++++++++++++");
        info!(
            "Completed on-boarding run: {} of {} hosts onboarded.",
            report.onboarded(),
            report.outcomes().len()
        );
        info!("++++++++++++++++++++++++++++++");
        Ok(())
    }

    fn subnet_request(&self, hostname: &str) -> SubnetRequest {
        SubnetRequest {
            prefix: Some(self.config.onboarding.subnet_prefix),
            description: hostname.to_string(),
            function: self.config.onboarding.function.clone(),
            contact: self.config.contact.name.clone(),
            contact_type: self.config.contact.kind.clone(),
            ..SubnetRequest::default()
        }
    }

    /// Reserve the next free subnet in the region's address block.
    fn create_subnet(
        &self,
        hostname: &str,
        code: &str,
        region: Option<&RegionConfig>,
    ) -> AmResult<String> {
        let address_block = region
            .and_then(|r| r.address_block.clone())
            .ok_or_else(|| missing(code, "address block"))?;

        info!("Creating new subnet in {}", address_block);
        let subnet = self.client.add_subnet(&SubnetRequest {
            address_block,
            ..self.subnet_request(hostname)
        })?;
        info!("Created subnet: {}", subnet);
        Ok(subnet)
    }

    /// Drop the host's scope and subnet, then add the subnet again.
    fn recreate_subnet(&self, hostname: &str, device_ip: &str) -> AmResult<String> {
        let existing = subnet_for_gateway(device_ip, self.config.onboarding.subnet_prefix)?;

        info!("Deleting existing scope: {}", hostname);
        let result = self.client.del_scope(hostname, true)?;
        info!("Tool output: {}", result);

        info!("Deleting existing subnet: {}", existing);
        let result = self.client.del_subnet(&existing)?;
        info!("Tool output: {}", result);

        info!("Re-creating subnet: {}", existing);
        let subnet = self.client.add_subnet(&SubnetRequest {
            subnet: existing,
            ..self.subnet_request(hostname)
        })?;
        info!("Created subnet: {}", subnet);
        Ok(subnet)
    }

    fn create_scope(
        &self,
        hostname: &str,
        subnet: &str,
        gateway: IpAddr,
        code: &str,
        region: Option<&RegionConfig>,
    ) -> AmResult<String> {
        let region = region.ok_or_else(|| missing(code, "DHCP settings"))?;
        let policy = region
            .dhcp_policy
            .clone()
            .ok_or_else(|| missing(code, "DHCP policy"))?;
        let dhcp_server = region
            .dhcp_server
            .clone()
            .ok_or_else(|| missing(code, "DHCP server"))?;

        let size = self.config.onboarding.scope_size;
        let (low, high) = self
            .client
            .get_range(subnet, size)?
            .ok_or_else(|| AmError::NoCongruentRange {
                subnet: subnet.to_string(),
                size,
            })?;

        info!("Creating scope for {}", hostname);
        let request = ScopeRequest {
            name: hostname.to_string(),
            description: hostname.to_string(),
            subnet: subnet.to_string(),
            range: format!("{}:{}", low, high),
            policy,
            dhcp_server,
            selection_tags: self.config.onboarding.selection_tags.clone(),
            default_router: gateway.to_string(),
            call_manager: region.call_manager_list(),
            ..ScopeRequest::default()
        };
        let result = self.client.add_scope(&request)?;
        info!("Tool output: {}", result);
        Ok(result)
    }

    /// Register the gateway and the DHCP interfaces that follow it.
    ///
    /// Every interface is attempted; returns whether all of them succeeded.
    fn add_interfaces(
        &self,
        hostname: &str,
        gateway: IpAddr,
        errors: &mut Vec<String>,
    ) -> AmResult<bool> {
        let mut all_ok = true;

        let mut interfaces = vec![(hostname.to_string(), Some(gateway))];
        for n in 1..=self.config.onboarding.scope_size {
            interfaces.push((format!("{}-ip{}", hostname, n), offset(gateway, n as i128)));
        }

        for (name, address) in interfaces {
            let Some(address) = address else {
                error!("No address left after {} for {}", gateway, name);
                errors.push(format!("interface {}: no address", name));
                all_ok = false;
                continue;
            };

            info!("Adding interface {}: {}", name, address);
            let request = InterfaceRequest {
                name: name.clone(),
                hostname: name.clone(),
                ip: address.to_string(),
                ptr: true,
                status: "Active".to_string(),
                description: name.clone(),
                contact: self.config.contact.name.clone(),
                contact_type: self.config.contact.kind.clone(),
                ..InterfaceRequest::default()
            };
            let step = format!("interface {}", name);
            match recover(&step, self.client.add_interface(&request), errors)? {
                Some(added) => info!("Tool output: {}", added),
                None => all_ok = false,
            }
        }

        Ok(all_ok)
    }
}
