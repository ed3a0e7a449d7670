//! Linux hosts over SSH.
//!
//! Everything comes from standard userland tools. Hardware identity needs
//! `dmidecode`, which is run through `sudo`; the credential's secret answers
//! the elevation prompt.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use super::ipv4_netmask;
use crate::error::Result;
use crate::inventory::{Category, Record, Value};
use crate::profiler::{Context, Family, ProfilerDescriptor};
use crate::session::Session;
use crate::transport::TransportKind;

const DMI_FIELDS: [(&str, &str); 6] = [
    ("vendor", "system-manufacturer"),
    ("model", "system-product-name"),
    ("serial_number", "system-serial-number"),
    ("uuid", "system-uuid"),
    ("bios_vendor", "bios-vendor"),
    ("bios_version", "bios-version"),
];

const DPKG_QUERY: &str = r"dpkg-query -W -f='${Package}\t${Version}\t${Maintainer}\n'";
const RPM_QUERY: &str = r"rpm -qa --queryformat '%{NAME}\t%{VERSION}-%{RELEASE}\t%{VENDOR}\t%{INSTALLTIME}\n'";

/// Linux family, matched by `uname -s`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linux;

#[async_trait]
impl ProfilerDescriptor for Linux {
    fn name(&self) -> &str {
        "linux"
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }

    async fn matches(&self, session: &mut Session) -> Result<bool> {
        let row = session.value_at("uname -s").await?;
        Ok(row
            .and_then(|r| r.get(crate::session::LINE_FIELD).cloned())
            .is_some_and(|line| line.trim() == "Linux"))
    }

    fn family(&self) -> Arc<dyn Family> {
        Arc::new(Linux)
    }
}

#[async_trait]
impl Family for Linux {
    async fn file_systems(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        parse_df(&cx.lines("df -PT").await?)
    }

    async fn hardware(&self, cx: &mut Context<'_>) -> Result<Record> {
        let mut record = Record::new(Category::Hardware);

        for (field, keyword) in DMI_FIELDS {
            let value = cx
                .lines(&format!("sudo dmidecode -s {keyword}"))
                .await?
                .into_iter()
                .find(|line| !line.trim().is_empty() && !line.starts_with('#'));
            record.set(field, value)?;
        }

        let cpu = parse_cpuinfo(&cx.lines("cat /proc/cpuinfo").await?);
        record
            .set("cpu_model", cpu.model)?
            .set("cpu_count", cpu.sockets)?
            .set("cpu_cores", cpu.cores)?
            .set("cpu_speed", cpu.mhz)?;

        let memory = parse_meminfo(&cx.lines("cat /proc/meminfo").await?);
        record.set("memory", memory)?;

        Ok(record)
    }

    async fn shares(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        parse_exports(&cx.lines("cat /etc/exports").await?)
    }

    async fn applications(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let lines = cx.lines(DPKG_QUERY).await?;
        if !lines.is_empty() {
            return parse_packages(&lines);
        }
        parse_packages(&cx.lines(RPM_QUERY).await?)
    }

    async fn local_accounts(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let passwd = cx.lines("getent passwd").await?;
        let group = cx.lines("getent group").await?;
        parse_accounts(&passwd, &group)
    }

    async fn services(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let units = cx
            .lines("systemctl list-units --type=service --all --no-legend --no-pager --plain")
            .await?;
        let files = cx
            .lines("systemctl list-unit-files --type=service --no-legend --no-pager")
            .await?;
        parse_services(&units, &files)
    }

    async fn network_identity(&self, cx: &mut Context<'_>) -> Result<Record> {
        let hostname = cx.line("hostname").await?;
        let fqdn = cx.line("hostname -f").await?;
        let resolv = cx.lines("cat /etc/resolv.conf").await?;
        let route = cx.lines("ip route show default").await?;
        identity(hostname, fqdn, &resolv, &route)
    }

    async fn network_interfaces(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let links = cx.lines("ip -o link show").await?;
        let addrs = cx.lines("ip -o addr show").await?;
        let route = cx.lines("ip route show default").await?;
        parse_interfaces(&links, &addrs, &route)
    }

    async fn operating_system(&self, cx: &mut Context<'_>) -> Result<Record> {
        let release = cx.lines("cat /etc/os-release").await?;
        let kernel = cx.line("uname -r").await?;
        let architecture = cx.line("uname -m").await?;
        let last_boot = cx.line("uptime -s").await?;

        let release = parse_os_release(&release);
        let mut record = Record::new(Category::OperatingSystem);
        record
            .set(
                "name",
                release.get("PRETTY_NAME").or_else(|| release.get("NAME")).cloned(),
            )?
            .set("version", release.get("VERSION_ID").cloned())?
            .set("kernel", kernel)?
            .set("architecture", architecture)?
            .set("last_boot", last_boot)?;
        Ok(record)
    }
}

fn kib_to_bytes(s: &str) -> Value {
    s.parse::<i64>()
        .ok()
        .and_then(|k| k.checked_mul(1024))
        .map(Value::Integer)
        .unwrap_or_default()
}

/// `df -PT`: device, type, 1024-blocks, used, available, capacity, mount.
fn parse_df(lines: &[String]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for line in lines.iter().filter(|l| !l.starts_with("Filesystem")) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 7 {
            continue;
        }
        let mut record = Record::new(Category::FileSystems);
        record
            .set("name", cols[0])?
            .set("file_system", cols[1])?
            .set("size", kib_to_bytes(cols[2]))?
            .set("free_space", kib_to_bytes(cols[4]))?
            .set("mount_point", cols[6..].join(" "))?;
        records.push(record);
    }
    Ok(records)
}

#[derive(Debug, Default, PartialEq)]
struct CpuInfo {
    model: Option<String>,
    sockets: Option<usize>,
    cores: Option<usize>,
    mhz: Option<i64>,
}

fn parse_cpuinfo(lines: &[String]) -> CpuInfo {
    let mut info = CpuInfo::default();
    let mut processors = 0usize;
    let mut sockets = BTreeSet::new();
    let mut cores_per_socket = None;

    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key {
            "processor" => processors += 1,
            "model name" if info.model.is_none() => info.model = Some(value.to_string()),
            "physical id" => {
                sockets.insert(value.to_string());
            }
            "cpu cores" => cores_per_socket = value.parse::<usize>().ok(),
            "cpu MHz" if info.mhz.is_none() => {
                info.mhz = value.parse::<f64>().ok().map(|mhz| mhz.round() as i64);
            }
            _ => {}
        }
    }

    if processors > 0 {
        let socket_count = sockets.len().max(1);
        info.sockets = Some(socket_count);
        info.cores = Some(cores_per_socket.map_or(processors, |c| c * socket_count));
    }
    info
}

fn parse_meminfo(lines: &[String]) -> Value {
    lines
        .iter()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .map(kib_to_bytes)
        .unwrap_or_default()
}

/// `/etc/exports`: path followed by client specifications.
fn parse_exports(lines: &[String]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (path, clients) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let mut record = Record::new(Category::Shares);
        record
            .set("name", path)?
            .set("path", path)?
            .set("description", clients)?;
        records.push(record);
    }
    Ok(records)
}

/// Tab-separated name, version, vendor and optional install time.
fn parse_packages(lines: &[String]) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for line in lines {
        let mut cols = line.split('\t');
        let Some(name) = cols.next().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        let mut record = Record::new(Category::Applications);
        record
            .set("name", name)?
            .set("version", cols.next())?
            .set("vendor", cols.next().filter(|v| *v != "(none)"))?
            .set("install_date", cols.next())?;
        records.push(record);
    }
    Ok(records)
}

fn parse_accounts(passwd: &[String], group: &[String]) -> Result<Vec<Record>> {
    let mut group_names: HashMap<&str, &str> = HashMap::new();
    let mut memberships: HashMap<&str, Vec<&str>> = HashMap::new();
    for line in group {
        let cols: Vec<&str> = line.split(':').collect();
        if cols.len() < 4 {
            continue;
        }
        group_names.insert(cols[2], cols[0]);
        for member in cols[3].split(',').filter(|m| !m.is_empty()) {
            memberships.entry(member).or_default().push(cols[0]);
        }
    }

    let mut records = Vec::new();
    for line in passwd {
        let cols: Vec<&str> = line.split(':').collect();
        if cols.len() < 7 {
            continue;
        }
        let (name, uid, gid, gecos, shell) = (cols[0], cols[2], cols[3], cols[4], cols[6]);

        let mut groups: Vec<String> = Vec::new();
        if let Some(primary) = group_names.get(gid) {
            groups.push(primary.to_string());
        }
        for extra in memberships.get(name).into_iter().flatten() {
            if !groups.iter().any(|g| g == extra) {
                groups.push(extra.to_string());
            }
        }

        let disabled = shell.ends_with("nologin") || shell.ends_with("/false");
        let mut record = Record::new(Category::LocalAccounts);
        record
            .set("name", name)?
            .set("full_name", gecos.split(',').next().unwrap_or_default())?
            .set("sid", uid)?
            .set("disabled", disabled)?
            .set("groups", groups)?;
        records.push(record);
    }
    Ok(records)
}

/// `systemctl list-units --plain`: unit, load, active, sub, description.
fn parse_services(units: &[String], files: &[String]) -> Result<Vec<Record>> {
    let start_modes: HashMap<&str, &str> = files
        .iter()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            Some((cols.next()?, cols.next()?))
        })
        .collect();

    let mut records = Vec::new();
    for line in units {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 || !cols[0].ends_with(".service") {
            continue;
        }
        let unit = cols[0];
        let mut record = Record::new(Category::Services);
        record
            .set("name", unit.trim_end_matches(".service"))?
            .set("display_name", cols[4..].join(" "))?
            .set("state", cols[3])?
            .set("start_mode", start_modes.get(unit).copied())?;
        records.push(record);
    }
    Ok(records)
}

/// Gateway and device from `ip route show default`.
fn default_route(route: &[String]) -> Option<(String, Option<String>)> {
    let line = route.iter().find(|l| l.starts_with("default"))?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let after = |key: &str| {
        tokens
            .iter()
            .position(|t| *t == key)
            .and_then(|i| tokens.get(i + 1))
            .map(|t| t.to_string())
    };
    Some((after("via")?, after("dev")))
}

fn identity(
    hostname: Option<String>,
    fqdn: Option<String>,
    resolv: &[String],
    route: &[String],
) -> Result<Record> {
    let mut dns_servers = Vec::new();
    let mut search_domain = None;
    for line in resolv {
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some("nameserver"), Some(server)) => dns_servers.push(server.to_string()),
            (Some("domain"), Some(domain)) => search_domain = Some(domain.to_string()),
            (Some("search"), Some(domain)) if search_domain.is_none() => {
                search_domain = Some(domain.to_string())
            }
            _ => {}
        }
    }

    let short = hostname
        .as_deref()
        .or(fqdn.as_deref())
        .map(|h| h.split('.').next().unwrap_or(h).to_string());
    let domain = fqdn
        .as_deref()
        .and_then(|f| f.split_once('.'))
        .map(|(_, d)| d.to_string())
        .or(search_domain);
    let fqdn = fqdn.filter(|f| f.contains('.')).or_else(|| match (&short, &domain) {
        (Some(host), Some(domain)) => Some(format!("{host}.{domain}")),
        _ => None,
    });

    let mut record = Record::new(Category::NetworkIdentity);
    record
        .set("hostname", short)?
        .set("domain", domain)?
        .set("fqdn", fqdn)?
        .set("dns_servers", dns_servers)?
        .set("default_gateway", default_route(route).map(|(via, _)| via))?;
    Ok(record)
}

#[derive(Default)]
struct Interface {
    mac: Option<String>,
    addresses: Vec<String>,
    netmasks: Vec<String>,
    dynamic: bool,
}

/// `ip -o link show` and `ip -o addr show`, one record per non-loopback link.
fn parse_interfaces(links: &[String], addrs: &[String], route: &[String]) -> Result<Vec<Record>> {
    let mut order = Vec::new();
    let mut interfaces: HashMap<String, Interface> = HashMap::new();

    for line in links {
        let mut parts = line.splitn(3, ": ");
        let (Some(_), Some(name), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let name = name.split('@').next().unwrap_or(name).to_string();
        if rest.contains("link/loopback") {
            continue;
        }
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let mac = tokens
            .iter()
            .position(|t| *t == "link/ether")
            .and_then(|i| tokens.get(i + 1))
            .map(|m| m.to_string());
        order.push(name.clone());
        interfaces.insert(name, Interface { mac, ..Interface::default() });
    }

    for line in addrs {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 4 {
            continue;
        }
        let Some(interface) = interfaces.get_mut(tokens[1]) else {
            continue;
        };
        let (address, prefix) = tokens[3].split_once('/').unwrap_or((tokens[3], ""));
        let netmask = match (tokens[2], prefix.parse::<u8>()) {
            ("inet", Ok(bits)) => ipv4_netmask(bits),
            (_, Ok(bits)) => Some(format!("/{bits}")),
            _ => None,
        };
        interface.addresses.push(address.to_string());
        interface.netmasks.extend(netmask);
        interface.dynamic |= tokens.contains(&"dynamic");
    }

    let gateway = default_route(route);
    let mut records = Vec::new();
    for name in order {
        let Some(interface) = interfaces.remove(&name) else {
            continue;
        };
        let gateway = gateway
            .as_ref()
            .filter(|(_, dev)| dev.as_deref() == Some(name.as_str()))
            .map(|(via, _)| via.clone());
        let mut record = Record::new(Category::NetworkInterfaces);
        record
            .set("name", name)?
            .set("mac_address", interface.mac)?
            .set("ip_addresses", interface.addresses)?
            .set("netmasks", interface.netmasks)?
            .set("gateway", gateway)?
            .set("dhcp_enabled", interface.dynamic)?;
        records.push(record);
    }
    Ok(records)
}

fn parse_os_release(lines: &[String]) -> HashMap<String, String> {
    lines
        .iter()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        .collect()
}
