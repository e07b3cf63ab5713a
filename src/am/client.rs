//! Client for the address-management command-line tool.
//!
//! Every operation renders a flag string, runs the tool once and inspects
//! what it printed. The tool signals failure only through its text, so each
//! operation decides for itself which markers count as an error.

use std::collections::BTreeMap;
use std::net::IpAddr;

use log::{debug, error, info, warn};

use super::error::{AmError, AmResult};
use super::flags::{double_quote, CommandFlags};
use super::requests::{
    AddressBlockRequest, Count, InterfaceQuery, InterfaceRequest, NextAvailableQuery,
    ScopeRequest, ScopeUpdate, SearchType, SubnetRequest,
};
use super::response::{
    self, ip_from_response, is_error, is_success, is_unauthorized, split_list, ScopeSummary,
};
use super::runner::{CommandRunner, ShellRunner};
use crate::config::{site_dhcp_server, ClientConfig, Config};
use crate::ip::allocator::{self, block_address, congruent_range, gateway_of, take_inactive};

/// Environment variable read by the tool's HTTPS client
pub const TLS_VERIFY_ENV: &str = "PERL_LWP_SSL_VERIFY_HOSTNAME";

/// One `key:value` record returned by an interface search.
///
/// Searching by address yields `ip:fqdn`, searching by name `fqdn:ip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub key: String,
    pub value: String,
}

/// Identifies an interface to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceKey {
    Address(String),
    Name(String),
}

/// Address-management client bound to one set of credentials.
pub struct AmClient<R: CommandRunner> {
    username: String,
    password: String,
    settings: ClientConfig,
    sites: BTreeMap<String, String>,
    runner: R,
}

impl AmClient<ShellRunner> {
    /// Client that runs the real tool through `sh`.
    pub fn with_shell(username: &str, password: &str, config: &Config) -> Self {
        let verify = if config.client.verify_tls_hostname { "1" } else { "0" };
        let runner = ShellRunner::new().with_env(TLS_VERIFY_ENV, verify);
        Self::new(username, password, config, runner)
    }
}

impl<R: CommandRunner> AmClient<R> {
    pub fn new(username: &str, password: &str, config: &Config, runner: R) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            settings: config.client.clone(),
            sites: config.sites.clone(),
            runner,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Run one tool command.
    ///
    /// Returns stdout when the tool printed anything there, stderr otherwise.
    /// `Unauthorized` on stderr is turned into [`AmError::Unauthorized`].
    pub fn send_command(&self, command: &str) -> AmResult<String> {
        let script = self.settings.resolve_script();
        let command_line = format!(
            "{} {} -username={} -password={} {}",
            self.settings.interpreter,
            double_quote(&script.to_string_lossy()),
            double_quote(&self.username),
            double_quote(&self.password),
            command
        );

        debug!("command: {}", command);
        let output = self.runner.run(&command_line)?;

        if is_unauthorized(&output.stderr) {
            return Err(AmError::Unauthorized(output.stderr));
        }

        if !output.stdout.is_empty() {
            info!("{}", command);
            Ok(output.stdout)
        } else {
            error!("{}", command);
            Ok(output.stderr)
        }
    }

    fn send(&self, flags: &CommandFlags) -> AmResult<String> {
        self.send_command(&flags.render())
    }

    /// Add an address block.
    pub fn add_address_block(&self, request: &AddressBlockRequest) -> AmResult<String> {
        let result = self.send(&request.to_flags())?;
        info!("add_address_block: {}", result);
        if is_error(&result) {
            return Err(AmError::UnableToReserve(result));
        }
        Ok(result)
    }

    /// Add a subnet and return it as the tool reports it (e.g. `10.34.182.128/26`).
    ///
    /// With only `address_block` set, the next free subnet of the requested
    /// prefix inside the block is reserved.
    pub fn add_subnet(&self, request: &SubnetRequest) -> AmResult<String> {
        let subnet = if request.subnet.is_empty() && !request.address_block.is_empty() {
            self.next_subnet_in_block(&request.address_block, request.prefix)?
        } else {
            request.subnet.clone()
        };

        let result = self.send(&request.to_flags(&subnet))?;
        info!("add_subnet: {}", result);

        if is_success(&result) {
            if let Some(added) = ip_from_response(&result) {
                return Ok(added);
            }
        }
        Err(AmError::UnableToReserve(result))
    }

    fn next_subnet_in_block(&self, address_block: &str, prefix: Option<u8>) -> AmResult<String> {
        let prefix = prefix.unwrap_or(if allocator::is_ipv6_block(address_block) { 126 } else { 30 });
        let query = NextAvailableQuery {
            address_block: address_block.to_string(),
            prefix_length: prefix,
            search_type: SearchType::Subnet,
            ..NextAvailableQuery::default()
        };
        let found = self.find_next_available(&query).map_err(|e| match e {
            AmError::UnableToFind(message) => AmError::UnableToReserve(message),
            other => other,
        })?;
        found.into_iter().next().ok_or_else(|| {
            AmError::UnableToReserve(format!("No /{} subnet available in {}", prefix, address_block))
        })
    }

    /// Add an interface and return its address.
    ///
    /// Without an explicit `ip`, the first free address of `subnet` that
    /// does not answer ping is used.
    pub fn add_interface(&self, request: &InterfaceRequest) -> AmResult<String> {
        let ip = if request.ip.is_empty() && !request.subnet.is_empty() {
            info!(
                "{} - No ipaddress was provided. Getting next available ipaddress based on subnet.",
                request.name
            );
            let free = self
                .find_next_ip(&request.subnet, Count::Exactly(1), true)
                .map_err(|e| match e {
                    AmError::UnableToFind(message) => AmError::UnableToReserve(message),
                    other => other,
                })?;
            free.into_iter().next().ok_or_else(|| {
                AmError::UnableToReserve(format!("No free address left in {}", request.subnet))
            })?
        } else {
            request.ip.clone()
        };

        let result = self.send(&request.to_flags(&ip))?;
        info!("add_interface: {}", result);

        if is_success(&result) {
            if let Some(added) = ip_from_response(&result) {
                return Ok(added);
            }
        }
        Err(AmError::UnableToReserve(result))
    }

    /// Assign `hostname` to the next free address of `subnet` in one call.
    pub fn add_next_ip(&self, hostname: &str, subnet: &str, multihomed: bool) -> AmResult<String> {
        let flags = CommandFlags::new()
            .text("f", "add-nextavail")
            .text("n", hostname)
            .text("s", subnet)
            .text("Ct1", self.username.as_str())
            .text("m", if multihomed { "Y" } else { "N" });
        let result = self.send(&flags)?;
        info!("add_next_ip: {}", result);
        Ok(result)
    }

    pub fn alias_add(&self, alias: &str, interface: &str) -> AmResult<String> {
        let flags = CommandFlags::new()
            .text("f", "alias-add")
            .text("a", alias)
            .text("i", interface);
        let result = self.send(&flags)?;
        info!("alias_add: {}", result);
        Ok(result)
    }

    pub fn alias_delete(&self, alias: &str) -> AmResult<String> {
        let flags = CommandFlags::new().text("f", "alias-del").text("a", alias);
        let result = self.send(&flags)?;
        info!("alias_delete: {}", result);
        Ok(result)
    }

    pub fn alias_mod(&self, old_alias: &str, new_alias: &str) -> AmResult<String> {
        let flags = CommandFlags::new()
            .text("f", "alias-mod")
            .text("oa", old_alias)
            .text("a", new_alias);
        let result = self.send(&flags)?;
        info!("alias_mod: {}", result);
        Ok(result)
    }

    /// Create a scope of `size` consecutive addresses inside `subnet`.
    ///
    /// The range, the default router (first address after the network) and
    /// the DHCP server for `site` are all worked out here.
    pub fn create_scope(
        &self,
        name: &str,
        description: &str,
        subnet: &str,
        size: usize,
        policy: &str,
        site: &str,
    ) -> AmResult<String> {
        info!(
            "create_scope - {}, {}, {}, {}, {}, {}",
            name, description, subnet, size, policy, site
        );

        let (low, high) = self.get_range(subnet, size)?.ok_or_else(|| AmError::NoCongruentRange {
            subnet: subnet.to_string(),
            size,
        })?;
        info!("Collected range: {}, {}", low, high);

        let gateway = gateway_of(subnet)?;
        let dhcp = site_dhcp_server(&self.sites, site).unwrap_or_default();
        if dhcp.is_empty() {
            warn!("No DHCP server known for site '{}'", site);
        }
        info!("Gateway: {}, DHCP server: {}", gateway, dhcp);

        let flags = CommandFlags::new()
            .text("f", "scope-add")
            .text("N", name)
            .text("D", description)
            .text("sn", subnet)
            .quoted("R", format!("{}:{}", low, high))
            .text("P", policy)
            .quoted("DS", dhcp)
            .quoted("DR", gateway.to_string())
            .text("Tr", "N");
        let result = self.send(&flags)?;
        info!("create_scope: {}", result);
        Ok(result)
    }

    /// Delete an address block.
    ///
    /// The tool answers `Successfully deleted an address block ...` or
    /// `ERROR: No address block found for ...`; the text is returned as is.
    pub fn del_address_block(&self, address_block: &str) -> AmResult<String> {
        let block = allocator::normalize_block(address_block)?;
        let flags = CommandFlags::new()
            .text("f", "address-block-del")
            .text("AddressBlock", block);
        let result = self.send(&flags)?;
        info!("del_address_block: {}", result);
        Ok(result)
    }

    /// Delete an interface given either its address or its name.
    ///
    /// The missing half is looked up first since the tool wants both.
    pub fn del_interface(&self, key: &InterfaceKey) -> AmResult<String> {
        let (ip, name) = match key {
            InterfaceKey::Address(ip) => {
                let query = InterfaceQuery {
                    count: Count::Exactly(1),
                    ..InterfaceQuery::by_ip(ip.as_str())
                };
                let record = self.first_interface(&query)?;
                (ip.clone(), record.value)
            }
            InterfaceKey::Name(name) => {
                let query = InterfaceQuery {
                    count: Count::Exactly(1),
                    ..InterfaceQuery::by_name(name.as_str())
                };
                let record = self.first_interface(&query)?;
                (record.value, name.clone())
            }
        };

        let flags = CommandFlags::function("int-del")
            .text("ipaddress", ip)
            .text("name", name);
        let result = self.send(&flags)?;
        info!("del_interface: {}", result);
        Ok(result)
    }

    fn first_interface(&self, query: &InterfaceQuery) -> AmResult<InterfaceRecord> {
        self.find_interfaces(query)?
            .into_iter()
            .next()
            .ok_or_else(|| AmError::UnableToFind(format!("No interface matched {}", query.to_flags())))
    }

    pub fn del_subnet(&self, subnet: &str) -> AmResult<String> {
        let flags = CommandFlags::new().text("f", "subnet-del").text("s", subnet);
        let result = self.send(&flags)?;
        info!("del_subnet: {}", result);
        Ok(result)
    }

    /// List the open subnets of an address block (IPv4 only).
    pub fn find_subnets_free(&self, address_block: &str) -> AmResult<String> {
        let address = block_address(address_block)?;
        let flags = CommandFlags::new()
            .text("f", "subnets-free")
            .text("addressblock", address.to_string());
        let result = self.send(&flags)?;
        info!("find_subnets_free: {}", result);
        Ok(result)
    }

    /// DHCP helpers for a site, e.g. `["dhcp-mtv1-1-l.example.com:10.68.48.165"]`.
    pub fn find_helpers(&self, site: &str) -> AmResult<Vec<String>> {
        let flags = CommandFlags::new()
            .text("f", "int-find")
            .quoted("n", format!("dhcp-{}*", site))
            .text("r", "2");
        let result = self.send(&flags)?;
        info!("find_helpers: {}", result);

        if is_error(&result) {
            return Err(AmError::UnableToFind(format!(
                "No dhcp helpers were found for {}.",
                site
            )));
        }
        Ok(split_list(&result))
    }

    /// Find interfaces by address, name, subnet or block.
    pub fn find_interfaces(&self, query: &InterfaceQuery) -> AmResult<Vec<InterfaceRecord>> {
        let result = self.send(&query.to_flags())?;

        if is_error(&result) {
            return Err(AmError::UnableToFind(result));
        }

        let records: Vec<InterfaceRecord> = split_list(&result)
            .into_iter()
            .map(|item| match response::split_pair(&item) {
                Some((key, value)) => InterfaceRecord { key, value },
                None => InterfaceRecord {
                    key: item,
                    value: String::new(),
                },
            })
            .collect();
        info!("find_interfaces: {:?}", records);
        Ok(records)
    }

    /// Details for one host name or address: `ip:fqdn` or `fqdn:ip`.
    pub fn find_interface(&self, interface: &str) -> AmResult<String> {
        let flags = if interface.contains('.') {
            CommandFlags::new().text("f", "int-find").text("i", interface)
        } else {
            CommandFlags::new().text("f", "int-find").text("n", interface)
        };
        let result = self.send(&flags)?;

        if is_error(&result) {
            info!("{} was not found.", interface);
            return Err(AmError::UnableToFind(format!("{} was not found.", interface)));
        }

        info!("find_interface: {}", result);
        Ok(result)
    }

    /// Next free addresses or subnets.
    pub fn find_next_available(&self, query: &NextAvailableQuery) -> AmResult<Vec<String>> {
        let result = self.send(&query.to_flags())?;
        info!("find_next_available: {}", result);

        if is_error(&result) {
            return Err(AmError::UnableToFind(result));
        }

        let found = addresses_in(&result);
        if found.is_empty() {
            return Err(AmError::UnableToFind(result));
        }
        Ok(found)
    }

    /// Next free addresses of a block or subnet, optionally dropping any
    /// that answer ping.
    pub fn find_list_of_next_available_ips(
        &self,
        address_block: &str,
        subnet: &str,
        count: Count,
        ping: bool,
    ) -> AmResult<Vec<String>> {
        let query = NextAvailableQuery {
            address_block: address_block.to_string(),
            subnet: subnet.to_string(),
            count,
            ..NextAvailableQuery::default()
        };
        let candidates = self.find_next_available(&query)?;

        if !ping {
            return Ok(candidates);
        }
        self.filter_by_ping(&candidates, candidates.len())
    }

    /// Free addresses of `subnet`.
    ///
    /// With `ping`, each candidate is pinged in order and only silent ones are
    /// kept until `count` have been collected. `Count::All` returns every free
    /// address without pinging.
    pub fn find_next_ip(&self, subnet: &str, count: Count, ping: bool) -> AmResult<Vec<String>> {
        let flags = CommandFlags::new()
            .text("f", "next-avail")
            .text("s", subnet)
            .text("t", "I")
            .text("r", "all")
            .switch("comma");
        let result = self.send(&flags)?;
        info!("find_next_ip - tool returned: {}", result);

        if is_error(&result) {
            return Err(AmError::UnableToFind(result));
        }

        let mut block = addresses_in(&result);
        let wanted = match count {
            Count::All => return Ok(block),
            Count::Exactly(n) => n,
        };

        if block.len() < wanted {
            info!("find_next_ip: Not enough ip's available");
            return Err(AmError::UnableToFind(format!(
                "Not enough ip's available in {}: wanted {}, found {}",
                subnet,
                wanted,
                block.len()
            )));
        }

        let ips = if ping {
            self.filter_by_ping(&block, wanted)?
        } else {
            block.truncate(wanted);
            block
        };
        info!("find_next_ip: {:?}", ips);
        Ok(ips)
    }

    fn filter_by_ping(&self, candidates: &[String], count: usize) -> AmResult<Vec<String>> {
        let mut failure: Option<AmError> = None;
        let free = take_inactive(candidates, count, |ip| {
            if failure.is_some() {
                return true;
            }
            match self.ping_ip(ip) {
                Ok(active) => active,
                Err(AmError::InvalidAddress(address)) => {
                    warn!("Skipping {}: not an address", address);
                    true
                }
                Err(e) => {
                    failure = Some(e);
                    true
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(free),
        }
    }

    /// Lowest and highest address of a run of `size` consecutive free
    /// addresses in `subnet`, or `None` when no such run exists.
    pub fn get_range(&self, subnet: &str, size: usize) -> AmResult<Option<(IpAddr, IpAddr)>> {
        let ips = self.find_next_ip(subnet, Count::All, false)?;
        info!("get_range - available ip's: {:?}", ips);

        let available = allocator::parse_addresses(&ips);
        info!("IP count and range: {}, {}", available.len(), size);

        let range = congruent_range(&available, size);
        if range.is_none() {
            info!("get_range: No congruent ip addresses in {}", subnet);
        }
        Ok(range)
    }

    /// Scopes defined in a subnet.
    pub fn get_scopes_by_subnet(&self, subnet: &str) -> AmResult<Vec<ScopeSummary>> {
        let flags = CommandFlags::new()
            .text("f", "scope-info")
            .switch("details")
            .text("s", subnet);
        let result = self.send(&flags)?;
        let scopes = response::parse_scope_info(&result);
        info!("get_scopes_by_subnet: {:?}", scopes);
        Ok(scopes)
    }

    pub fn add_scope(&self, request: &ScopeRequest) -> AmResult<String> {
        let result = self.send(&request.to_flags())?;
        info!("scope-add: {}", result);
        if is_error(&result) {
            return Err(AmError::UnableToReserve(result));
        }
        Ok(result)
    }

    /// Delete a scope, and with `delete_interfaces` the interfaces in it.
    pub fn del_scope(&self, scope_name: &str, delete_interfaces: bool) -> AmResult<String> {
        let mut flags = CommandFlags::function("scope-del");
        if delete_interfaces {
            flags = flags.switch("DI").switch("q");
        }
        let flags = flags.quoted("Name", scope_name);
        let result = self.send(&flags)?;
        info!("scope-del: {}", result);
        Ok(result)
    }

    pub fn mod_scope(&self, scope_name: &str, update: &ScopeUpdate) -> AmResult<String> {
        let result = self.send(&update.to_flags(scope_name))?;
        info!("mod_scope: {}", result);
        Ok(result)
    }

    /// Ping `address` once; `true` when something answered.
    pub fn ping_ip(&self, address: &str) -> AmResult<bool> {
        let ip: IpAddr = address
            .trim()
            .parse()
            .map_err(|_| AmError::InvalidAddress(address.to_string()))?;
        let timeout = self.settings.ping_timeout.as_secs().max(1);
        let program = if ip.is_ipv6() { "ping -6" } else { "ping" };

        let output = self
            .runner
            .run(&format!("{} -c 1 -W {} {}", program, timeout, ip))?;
        let active = !response::is_ping_inactive(&output.stdout)
            && !response::is_ping_inactive(&output.stderr);
        debug!("ping {}: {}", ip, if active { "active" } else { "silent" });
        Ok(active)
    }

    pub fn rename_interface(&self, old_name: &str, new_name: &str) -> AmResult<String> {
        let flags = CommandFlags::new()
            .text("f", "int-ren")
            .text("on", old_name)
            .text("nn", new_name);
        let result = self.send(&flags)?;
        info!("rename_interface: {}", result);
        Ok(result)
    }
}

/// Every address (with or without prefix) in a `-comma` list response.
fn addresses_in(result: &str) -> Vec<String> {
    split_list(result)
        .iter()
        .filter_map(|item| ip_from_response(item))
        .collect()
}
