//! Typed requests for the address-management tool.
//!
//! Each request carries the defaults the tool's operators use, and renders
//! itself into [`CommandFlags`]. Fields left empty never reach the command
//! line.

use std::fmt;
use std::str::FromStr;

use super::flags::CommandFlags;

/// How many results a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Count {
    #[default]
    All,
    Exactly(usize),
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Count::All => f.write_str("all"),
            Count::Exactly(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Count {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Count::All);
        }
        s.parse::<usize>()
            .map(Count::Exactly)
            .map_err(|_| format!("expected a number or 'all', got '{}'", s))
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Y"
    } else {
        "N"
    }
}

/// Narrow a search to blocks or subnets matching these attributes (`-B*` flags).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub description: String,
    pub function: String,
    pub technology: String,
    pub location: String,
    pub area: String,
    pub city: String,
    pub country: String,
    pub contact: String,
}

impl SearchFilters {
    fn apply(&self, flags: CommandFlags) -> CommandFlags {
        flags
            .text("Bdescr", self.description.as_str())
            .text("Bfunction", self.function.as_str())
            .text("Btechnology", self.technology.as_str())
            .text("Blocation", self.location.as_str())
            .text("Barea", self.area.as_str())
            .text("Bcity", self.city.as_str())
            .text("Bcountry", self.country.as_str())
            .text("Bcontact", self.contact.as_str())
    }
}

/// `address-block-add`
#[derive(Debug, Clone)]
pub struct AddressBlockRequest {
    /// Network and prefix, e.g. `171.23.41.0/24` or `2001:420::1:0:0:0:0/64`
    pub address_block: String,
    pub function: String,
    pub location: String,
    pub route_point: String,
    pub description: String,
    pub status: String,
    pub block_type: String,
    /// Lab ID from the lab registration tool
    pub lab: String,
    pub contact: String,
    pub contact_type: String,
}

impl Default for AddressBlockRequest {
    fn default() -> Self {
        Self {
            address_block: String::new(),
            function: String::new(),
            location: "inherit".to_string(),
            route_point: "inherit".to_string(),
            description: String::new(),
            status: "Active".to_string(),
            block_type: "Primary".to_string(),
            lab: String::new(),
            contact: String::new(),
            contact_type: String::new(),
        }
    }
}

impl AddressBlockRequest {
    pub fn to_flags(&self) -> CommandFlags {
        CommandFlags::function("address-block-add")
            .text("AddressBlock", self.address_block.as_str())
            .text("Function", self.function.as_str())
            .text("Location", self.location.as_str())
            .text("Routepoint", self.route_point.as_str())
            .text("Descr", self.description.as_str())
            .text("Status", self.status.as_str())
            .text("Type", self.block_type.as_str())
            .text("lab", self.lab.as_str())
            .text("Contact1", self.contact.as_str())
            .text("Contact1type", self.contact_type.as_str())
    }
}

/// `subnet-add`.
///
/// Set `subnet` to reserve a specific network, or leave it empty and set
/// `address_block` to take the next free subnet of `prefix` length from the
/// block.
#[derive(Debug, Clone)]
pub struct SubnetRequest {
    pub address_block: String,
    pub subnet: String,
    /// Prefix length searched for inside `address_block` (30 for IPv4, 126 for IPv6 when unset)
    pub prefix: Option<u8>,
    pub function: String,
    pub status: String,
    pub subnet_type: String,
    pub description: String,
    pub location: String,
    pub dhcp_server: String,
    pub route_point: String,
    pub area: String,
    pub city: String,
    pub country: String,
    pub ping_before_offer: String,
    pub trend: String,
    pub failover_backup_percentage: String,
    pub alert_percent_used: String,
    pub selection_tags: Vec<String>,
    pub default_router: String,
    pub call_manager: String,
    pub lab: String,
    pub contact: String,
    pub contact_type: String,
}

impl Default for SubnetRequest {
    fn default() -> Self {
        Self {
            address_block: String::new(),
            subnet: String::new(),
            prefix: None,
            function: String::new(),
            status: "Active".to_string(),
            subnet_type: "Primary".to_string(),
            description: String::new(),
            location: "inherit".to_string(),
            dhcp_server: String::new(),
            route_point: "inherit".to_string(),
            area: "HQ".to_string(),
            city: "San Jose".to_string(),
            country: "United States".to_string(),
            ping_before_offer: "Yes".to_string(),
            trend: "Yes".to_string(),
            failover_backup_percentage: "5".to_string(),
            alert_percent_used: "95".to_string(),
            selection_tags: vec!["OtherDevices".to_string()],
            default_router: String::new(),
            call_manager: String::new(),
            lab: String::new(),
            contact: String::new(),
            contact_type: String::new(),
        }
    }
}

impl SubnetRequest {
    /// Render the request for a concrete `subnet` (resolved by the caller
    /// when only an address block was given).
    pub fn to_flags(&self, subnet: &str) -> CommandFlags {
        CommandFlags::function("subnet-add")
            .text("subnet", subnet)
            .text("Function", self.function.as_str())
            .quoted("Descr", self.description.as_str())
            .text("Location", self.location.as_str())
            .text("DhcpServer", self.dhcp_server.as_str())
            .text("Area", self.area.as_str())
            .text("City", self.city.as_str())
            .text("Country", self.country.as_str())
            .text("Routepoint", self.route_point.as_str())
            .text("Status", self.status.as_str())
            .text("type", self.subnet_type.as_str())
            .text("PingBeforeOffer", self.ping_before_offer.as_str())
            .text("Trend", self.trend.as_str())
            .text("FailoverBackupPercentage", self.failover_backup_percentage.as_str())
            .text("AlertPercentUsed", self.alert_percent_used.as_str())
            .tags("SelectionTags", &self.selection_tags)
            .text("DefaultRouter", self.default_router.as_str())
            .text("CallManager", self.call_manager.as_str())
            .text("lab", self.lab.as_str())
            .text("Contact1", self.contact.as_str())
            .text("Contact1type", self.contact_type.as_str())
    }
}

/// `int-add`.
///
/// Leave `ip` empty and set `subnet` to take the first free, non-responding
/// address of the subnet.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRequest {
    pub name: String,
    pub hostname: String,
    pub ip: String,
    pub subnet: String,
    pub multihomed: bool,
    /// Add a PTR record for the interface
    pub ptr: bool,
    pub status: String,
    pub description: String,
    pub contact: String,
    pub contact_type: String,
}

impl InterfaceRequest {
    pub fn to_flags(&self, ip: &str) -> CommandFlags {
        CommandFlags::function("int-add")
            .text("name", self.name.as_str())
            .text("hostname", self.hostname.as_str())
            .text("ipaddress", ip)
            .text("multihomed", yes_no(self.multihomed))
            .text("Contact1", self.contact.as_str())
            .text("Contact1type", self.contact_type.as_str())
            .text("Status", self.status.as_str())
            .text("PTR", yes_no(self.ptr))
            .quoted("Descr", self.description.as_str())
    }
}

/// `scope-add`
#[derive(Debug, Clone)]
pub struct ScopeRequest {
    pub name: String,
    pub description: String,
    pub subnet: String,
    /// `low:high`
    pub range: String,
    pub policy: String,
    pub dhcp_server: String,
    pub status: String,
    pub scope_type: String,
    pub ping_before_offer: String,
    pub failover_backup_percentage: String,
    pub trend: String,
    pub alert_percent_used: String,
    pub selection_tags: Vec<String>,
    pub default_router: String,
    pub call_manager: String,
    pub primary_scope: String,
    pub add_interfaces: String,
    pub ddns_enabled: String,
    pub ddns_domain: String,
}

impl Default for ScopeRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            subnet: String::new(),
            range: String::new(),
            policy: String::new(),
            dhcp_server: String::new(),
            status: "Active".to_string(),
            scope_type: "Primary".to_string(),
            ping_before_offer: "N".to_string(),
            failover_backup_percentage: "5".to_string(),
            trend: "Y".to_string(),
            alert_percent_used: "95".to_string(),
            selection_tags: vec!["OtherDevices".to_string()],
            default_router: String::new(),
            call_manager: String::new(),
            primary_scope: String::new(),
            add_interfaces: String::new(),
            ddns_enabled: "N".to_string(),
            ddns_domain: String::new(),
        }
    }
}

impl ScopeRequest {
    pub fn to_flags(&self) -> CommandFlags {
        CommandFlags::function("scope-add")
            .quoted("Name", self.name.as_str())
            .quoted("Descr", self.description.as_str())
            .text("subnet", self.subnet.as_str())
            .quoted("R", self.range.as_str())
            .quoted("Policy", self.policy.as_str())
            .quoted("DhcpServer", self.dhcp_server.as_str())
            .text("Status", self.status.as_str())
            .text("Type", self.scope_type.as_str())
            .text("PingBeforeOffer", self.ping_before_offer.as_str())
            .text("FailoverBackupPercentage", self.failover_backup_percentage.as_str())
            .text("Trend", self.trend.as_str())
            .text("AlertPercentUsed", self.alert_percent_used.as_str())
            .tags("SelectionTags", &self.selection_tags)
            .text("DefaultRouter", self.default_router.as_str())
            .quoted("CallManager", self.call_manager.as_str())
            .text("PrimaryScope", self.primary_scope.as_str())
            .text("AddInterfaces", self.add_interfaces.as_str())
            .text("DdnsEnabled", self.ddns_enabled.as_str())
            .text("DdnsDomain", self.ddns_domain.as_str())
    }
}

/// Changes applied by `scope-mod`; empty fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ScopeUpdate {
    pub policy: String,
    pub call_manager: String,
    pub ddns_enabled: String,
    pub ddns_domain: String,
    pub selection_tags: Vec<String>,
}

impl ScopeUpdate {
    pub fn to_flags(&self, scope_name: &str) -> CommandFlags {
        CommandFlags::function("scope-mod")
            .quoted("name", scope_name)
            .text("Policy", self.policy.as_str())
            .text("CallManager", self.call_manager.as_str())
            .text("DdnsEnabled", self.ddns_enabled.as_str())
            .text("DdnsDomain", self.ddns_domain.as_str())
            .tags("SelectionTags", &self.selection_tags)
    }
}

/// `int-find`: interfaces by address, name, subnet or block.
#[derive(Debug, Clone, Default)]
pub struct InterfaceQuery {
    /// Network and prefix of the block (prefix required)
    pub address_block: String,
    pub subnet: String,
    pub ip: String,
    pub name: String,
    pub count: Count,
    pub filters: SearchFilters,
}

impl InterfaceQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn by_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    pub fn to_flags(&self) -> CommandFlags {
        let block_type = if self.address_block.is_empty() { "S" } else { "A" };
        let flags = CommandFlags::new()
            .switch("comma")
            .text("function", "int-find")
            .text("addressblock", self.address_block.as_str())
            .text("subnet", self.subnet.as_str())
            .text("ipaddress", self.ip.as_str())
            .text("name", self.name.as_str())
            .text("return", self.count.to_string());
        self.filters.apply(flags).text("type", block_type)
    }
}

/// What `next-avail` should look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    #[default]
    Address,
    Subnet,
}

impl SearchType {
    fn code(self) -> &'static str {
        match self {
            SearchType::Address => "I",
            SearchType::Subnet => "S",
        }
    }
}

/// `next-avail`: free addresses in a subnet or free subnets in a block.
#[derive(Debug, Clone)]
pub struct NextAvailableQuery {
    pub address_block: String,
    pub subnet: String,
    /// Size of the subnet to find room for (only sent with `address_block`)
    pub prefix_length: u8,
    pub search_type: SearchType,
    pub show_total: bool,
    pub count: Count,
    pub filters: SearchFilters,
}

impl Default for NextAvailableQuery {
    fn default() -> Self {
        Self {
            address_block: String::new(),
            subnet: String::new(),
            prefix_length: 30,
            search_type: SearchType::Address,
            show_total: false,
            count: Count::Exactly(1),
            filters: SearchFilters::default(),
        }
    }
}

impl NextAvailableQuery {
    pub fn to_flags(&self) -> CommandFlags {
        let flags = CommandFlags::new()
            .switch("comma")
            .text("function", "next-avail")
            .text("addressblock", self.address_block.as_str())
            .text("subnet", self.subnet.as_str())
            .text("type", self.search_type.code())
            .text_if(self.show_total, "Total", "Y")
            .text("return", self.count.to_string());
        self.filters.apply(flags).text_if(
            !self.address_block.is_empty(),
            "length",
            self.prefix_length.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_parsing() {
        assert_eq!("all".parse::<Count>().unwrap(), Count::All);
        assert_eq!("ALL".parse::<Count>().unwrap(), Count::All);
        assert_eq!("5".parse::<Count>().unwrap(), Count::Exactly(5));
        assert!("five".parse::<Count>().is_err());
        assert_eq!(Count::Exactly(3).to_string(), "3");
    }

    #[test]
    fn test_address_block_request() {
        let request = AddressBlockRequest {
            address_block: "10.34.182.128/26".to_string(),
            location: "San Jose".to_string(),
            route_point: "RTP".to_string(),
            function: "LAN".to_string(),
            contact: "netops".to_string(),
            contact_type: "Employee".to_string(),
            ..AddressBlockRequest::default()
        };

        assert_eq!(
            request.to_flags().render(),
            "-function=address-block-add -AddressBlock=10.34.182.128/26 -Function=LAN \
             -Location=\"San Jose\" -Routepoint=RTP -Status=Active -Type=Primary \
             -Contact1=netops -Contact1type=Employee"
        );
    }

    #[test]
    fn test_subnet_request_defaults() {
        let request = SubnetRequest {
            description: "branch-01".to_string(),
            function: "LAN".to_string(),
            contact: "ete-sec".to_string(),
            contact_type: "Mail Alias".to_string(),
            ..SubnetRequest::default()
        };

        assert_eq!(
            request.to_flags("192.168.137.8/29").render(),
            "-function=subnet-add -subnet=192.168.137.8/29 -Function=LAN -Descr=\"branch-01\" \
             -Location=inherit -Area=HQ -City=\"San Jose\" -Country=\"United States\" \
             -Routepoint=inherit -Status=Active -type=Primary -PingBeforeOffer=Yes -Trend=Yes \
             -FailoverBackupPercentage=5 -AlertPercentUsed=95 -SelectionTags=OtherDevices \
             -Contact1=ete-sec -Contact1type=\"Mail Alias\""
        );
    }

    #[test]
    fn test_interface_request() {
        let request = InterfaceRequest {
            name: "branch-01-ip1".to_string(),
            hostname: "branch-01-ip1".to_string(),
            ptr: true,
            status: "Active".to_string(),
            description: "branch-01-ip1".to_string(),
            ..InterfaceRequest::default()
        };

        assert_eq!(
            request.to_flags("192.168.137.10").render(),
            "-function=int-add -name=branch-01-ip1 -hostname=branch-01-ip1 \
             -ipaddress=192.168.137.10 -multihomed=N -Status=Active -PTR=Y -Descr=\"branch-01-ip1\""
        );
    }

    #[test]
    fn test_scope_request() {
        let request = ScopeRequest {
            name: "branch-01".to_string(),
            description: "branch-01".to_string(),
            subnet: "10.35.105.0/29".to_string(),
            range: "10.35.105.2:10.35.105.6".to_string(),
            policy: "San Jose Wireless LAN".to_string(),
            dhcp_server: "dhcp-mtv1-1-l".to_string(),
            selection_tags: vec!["IPPhones".to_string(), "OtherDevices".to_string()],
            default_router: "10.35.105.1".to_string(),
            call_manager: "10.70.146.221,10.36.131.161".to_string(),
            ..ScopeRequest::default()
        };

        assert_eq!(
            request.to_flags().render(),
            "-function=scope-add -Name=\"branch-01\" -Descr=\"branch-01\" -subnet=10.35.105.0/29 \
             -R=\"10.35.105.2:10.35.105.6\" -Policy=\"San Jose Wireless LAN\" \
             -DhcpServer=\"dhcp-mtv1-1-l\" -Status=Active -Type=Primary -PingBeforeOffer=N \
             -FailoverBackupPercentage=5 -Trend=Y -AlertPercentUsed=95 \
             -SelectionTags='IPPhones','OtherDevices' -DefaultRouter=10.35.105.1 \
             -CallManager=\"10.70.146.221,10.36.131.161\" -DdnsEnabled=N"
        );
    }

    #[test]
    fn test_scope_update_only_sends_changes() {
        let update = ScopeUpdate {
            selection_tags: vec!["IPPhones".to_string(), "OtherDevices".to_string()],
            ..ScopeUpdate::default()
        };

        assert_eq!(
            update.to_flags("branch-01").render(),
            "-function=scope-mod -name=\"branch-01\" -SelectionTags='IPPhones','OtherDevices'"
        );
    }

    #[test]
    fn test_interface_query_block_type() {
        let query = InterfaceQuery::by_name("AnyDevice");
        assert_eq!(
            query.to_flags().render(),
            "-comma -function=int-find -name=AnyDevice -return=all -type=S"
        );

        let query = InterfaceQuery {
            address_block: "10.34.182.128/27".to_string(),
            count: Count::Exactly(1),
            ..InterfaceQuery::default()
        };
        assert_eq!(
            query.to_flags().render(),
            "-comma -function=int-find -addressblock=10.34.182.128/27 -return=1 -type=A"
        );
    }

    #[test]
    fn test_next_available_length_only_with_block() {
        let query = NextAvailableQuery {
            subnet: "10.34.182.128/27".to_string(),
            ..NextAvailableQuery::default()
        };
        assert_eq!(
            query.to_flags().render(),
            "-comma -function=next-avail -subnet=10.34.182.128/27 -type=I -return=1"
        );

        let query = NextAvailableQuery {
            address_block: "192.168.137.0/24".to_string(),
            prefix_length: 29,
            search_type: SearchType::Subnet,
            ..NextAvailableQuery::default()
        };
        assert_eq!(
            query.to_flags().render(),
            "-comma -function=next-avail -addressblock=192.168.137.0/24 -type=S -return=1 -length=29"
        );
    }
}
