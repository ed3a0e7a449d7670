//! Windows hosts over WMI.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::field;
use crate::error::Result;
use crate::inventory::{Category, Record, Value};
use crate::profiler::{Context, Family, ProfilerDescriptor};
use crate::session::Session;
use crate::transport::{Row, TransportKind};

const COMPUTER_SYSTEM: &str = "SELECT * FROM Win32_ComputerSystem";
const OPERATING_SYSTEM: &str = "SELECT * FROM Win32_OperatingSystem";
const ADAPTER_CONFIG: &str = "SELECT Index, Description, MACAddress, IPAddress, IPSubnet, \
     DefaultIPGateway, DHCPEnabled, DNSServerSearchOrder FROM Win32_NetworkAdapterConfiguration \
     WHERE IPEnabled = True";

const UNINSTALL_ROOTS: [&str; 2] = [
    r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
];

/// Windows family, matched by the operating system caption.
#[derive(Debug, Clone, Copy, Default)]
pub struct Windows;

#[async_trait]
impl ProfilerDescriptor for Windows {
    fn name(&self) -> &str {
        "windows"
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Wmi
    }

    async fn matches(&self, session: &mut Session) -> Result<bool> {
        let row = session.value_at("SELECT Caption FROM Win32_OperatingSystem").await?;
        Ok(row
            .as_ref()
            .and_then(|r| field(r, "Caption"))
            .is_some_and(|caption| caption.contains("Windows")))
    }

    fn family(&self) -> Arc<dyn Family> {
        Arc::new(Windows)
    }
}

fn integer(row: &Row, name: &str) -> Value {
    field(row, name).map(Value::parse_integer).unwrap_or_default()
}

fn text(row: &Row, name: &str) -> Value {
    field(row, name).map(Value::from).unwrap_or_default()
}

fn list(row: &Row, name: &str) -> Value {
    field(row, name).map(|v| Value::split(v, ';')).unwrap_or_default()
}

fn boolean(row: &Row, name: &str) -> Value {
    match field(row, name).map(str::to_ascii_lowercase).as_deref() {
        Some("true") => Value::Bool(true),
        Some("false") => Value::Bool(false),
        _ => Value::Absent,
    }
}

/// `Name="..."` from a WMI object path.
fn path_name(path: &str) -> Option<&str> {
    let start = path.find("Name=\"")? + "Name=\"".len();
    let len = path[start..].find('"')?;
    Some(&path[start..start + len])
}

#[async_trait]
impl Family for Windows {
    async fn file_systems(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let rows = cx
            .run(
                "SELECT Name, FileSystem, Size, FreeSpace, VolumeName, VolumeSerialNumber \
                 FROM Win32_LogicalDisk WHERE DriveType = 3",
            )
            .await?;

        let mut records = Vec::new();
        for row in &rows {
            let mut record = Record::new(Category::FileSystems);
            record
                .set("name", text(row, "Name"))?
                .set("mount_point", field(row, "Name").map(|n| format!("{n}\\")))?
                .set("file_system", text(row, "FileSystem"))?
                .set("size", integer(row, "Size"))?
                .set("free_space", integer(row, "FreeSpace"))?
                .set("label", text(row, "VolumeName"))?
                .set("serial_number", text(row, "VolumeSerialNumber"))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn hardware(&self, cx: &mut Context<'_>) -> Result<Record> {
        let system = cx.cached_value_at(COMPUTER_SYSTEM).await?.unwrap_or_default();
        let product = cx
            .value_at("SELECT IdentifyingNumber, UUID FROM Win32_ComputerSystemProduct")
            .await?
            .unwrap_or_default();
        let bios = cx
            .value_at("SELECT Manufacturer, SMBIOSBIOSVersion, SerialNumber FROM Win32_BIOS")
            .await?
            .unwrap_or_default();
        let processors = cx
            .run("SELECT Name, NumberOfCores, MaxClockSpeed FROM Win32_Processor")
            .await?;

        let cores: Option<i64> = if processors.is_empty() {
            None
        } else {
            processors
                .iter()
                .map(|p| field(p, "NumberOfCores").and_then(|c| c.parse::<i64>().ok()))
                .sum()
        };
        let first = processors.first();

        let mut record = Record::new(Category::Hardware);
        record
            .set("vendor", text(&system, "Manufacturer"))?
            .set("model", text(&system, "Model"))?
            .set(
                "serial_number",
                field(&bios, "SerialNumber").or_else(|| field(&product, "IdentifyingNumber")),
            )?
            .set("uuid", text(&product, "UUID"))?
            .set("cpu_model", first.map(|p| text(p, "Name")))?
            .set("cpu_count", integer(&system, "NumberOfProcessors"))?
            .set("cpu_cores", cores)?
            .set("cpu_speed", first.map(|p| integer(p, "MaxClockSpeed")))?
            .set("memory", integer(&system, "TotalPhysicalMemory"))?
            .set("bios_vendor", text(&bios, "Manufacturer"))?
            .set("bios_version", text(&bios, "SMBIOSBIOSVersion"))?;
        Ok(record)
    }

    async fn shares(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let rows = cx.run("SELECT Name, Path, Description FROM Win32_Share").await?;
        let mut records = Vec::new();
        for row in &rows {
            let mut record = Record::new(Category::Shares);
            record
                .set("name", text(row, "Name"))?
                .set("path", text(row, "Path"))?
                .set("description", text(row, "Description"))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn applications(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for root in UNINSTALL_ROOTS {
            for key in cx.registry_keys(root).await? {
                let values = cx.registry_values(&format!(r"{root}\{key}")).await?;
                // System components and updates carry no display name
                if field(&values, "DisplayName").is_none() {
                    continue;
                }
                let mut record = Record::new(Category::Applications);
                record
                    .set("name", text(&values, "DisplayName"))?
                    .set("version", text(&values, "DisplayVersion"))?
                    .set("vendor", text(&values, "Publisher"))?
                    .set("install_date", text(&values, "InstallDate"))?;
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn local_accounts(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let accounts = cx
            .run("SELECT Name, FullName, SID, Disabled FROM Win32_UserAccount WHERE LocalAccount = True")
            .await?;
        let links = cx
            .run("SELECT GroupComponent, PartComponent FROM Win32_GroupUser")
            .await?;

        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for link in &links {
            let member = link.get("PartComponent").and_then(|p| path_name(p));
            let group = link.get("GroupComponent").and_then(|g| path_name(g));
            if let (Some(member), Some(group)) = (member, group) {
                groups
                    .entry(member.to_ascii_lowercase())
                    .or_default()
                    .push(group.to_string());
            }
        }

        let mut records = Vec::new();
        for row in &accounts {
            let member_of = field(row, "Name")
                .and_then(|n| groups.get(&n.to_ascii_lowercase()))
                .cloned()
                .unwrap_or_default();
            let mut record = Record::new(Category::LocalAccounts);
            record
                .set("name", text(row, "Name"))?
                .set("full_name", text(row, "FullName"))?
                .set("sid", text(row, "SID"))?
                .set("disabled", boolean(row, "Disabled"))?
                .set("groups", member_of)?;
            records.push(record);
        }
        Ok(records)
    }

    async fn patches(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let rows = cx
            .run("SELECT HotFixID, Description, InstalledOn, InstalledBy FROM Win32_QuickFixEngineering")
            .await?;

        let mut records = Vec::new();
        for row in &rows {
            let installed_by = match field(row, "InstalledBy") {
                Some(sid) if sid.starts_with("S-1-") => account_name(cx, sid).await?.or(Some(sid.to_string())),
                other => other.map(str::to_string),
            };
            let mut record = Record::new(Category::Patches);
            record
                .set("name", text(row, "HotFixID"))?
                .set("description", text(row, "Description"))?
                .set("installed_on", text(row, "InstalledOn"))?
                .set("installed_by", installed_by)?;
            records.push(record);
        }
        Ok(records)
    }

    async fn services(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let rows = cx
            .run("SELECT Name, DisplayName, State, StartMode, StartName FROM Win32_Service")
            .await?;
        let mut records = Vec::new();
        for row in &rows {
            let mut record = Record::new(Category::Services);
            record
                .set("name", text(row, "Name"))?
                .set("display_name", text(row, "DisplayName"))?
                .set("state", text(row, "State"))?
                .set("start_mode", text(row, "StartMode"))?
                .set("account", text(row, "StartName"))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn network_identity(&self, cx: &mut Context<'_>) -> Result<Record> {
        let system = cx.cached_value_at(COMPUTER_SYSTEM).await?.unwrap_or_default();
        let adapters = cx.run(ADAPTER_CONFIG).await?;

        let hostname = field(&system, "DNSHostName").or_else(|| field(&system, "Name"));
        let domain = field(&system, "Domain").filter(|d| d.contains('.'));
        let fqdn = hostname.zip(domain).map(|(h, d)| format!("{h}.{d}"));
        let dns = adapters
            .iter()
            .find_map(|a| field(a, "DNSServerSearchOrder"))
            .map(|v| Value::split(v, ';'))
            .unwrap_or_default();
        let gateway = adapters
            .iter()
            .find_map(|a| field(a, "DefaultIPGateway"))
            .and_then(|v| v.split(';').next())
            .map(str::trim);

        let mut record = Record::new(Category::NetworkIdentity);
        record
            .set("hostname", hostname)?
            .set("domain", domain.or_else(|| field(&system, "Workgroup")))?
            .set("fqdn", fqdn)?
            .set("dns_servers", dns)?
            .set("default_gateway", gateway)?;
        Ok(record)
    }

    async fn network_interfaces(&self, cx: &mut Context<'_>) -> Result<Vec<Record>> {
        let configs = cx.run(ADAPTER_CONFIG).await?;
        let adapters = cx
            .run("SELECT Index, NetConnectionID, Speed, Manufacturer, ProductName FROM Win32_NetworkAdapter")
            .await?;
        let by_index: HashMap<&str, &Row> = adapters
            .iter()
            .filter_map(|a| Some((field(a, "Index")?, a)))
            .collect();

        let mut records = Vec::new();
        for config in &configs {
            let adapter = field(config, "Index").and_then(|i| by_index.get(i).copied());
            let name = adapter
                .and_then(|a| field(a, "NetConnectionID"))
                .or_else(|| field(config, "Description"));

            let mut record = Record::new(Category::NetworkInterfaces);
            record
                .set("name", name)?
                .set("mac_address", text(config, "MACAddress"))?
                .set("ip_addresses", list(config, "IPAddress"))?
                .set("netmasks", list(config, "IPSubnet"))?
                .set(
                    "gateway",
                    field(config, "DefaultIPGateway").and_then(|g| g.split(';').next()),
                )?
                .set("dhcp_enabled", boolean(config, "DHCPEnabled"))?
                .set("speed", adapter.map(|a| integer(a, "Speed")))?
                .set("vendor", adapter.map(|a| text(a, "Manufacturer")))?
                .set("model", adapter.map(|a| text(a, "ProductName")))?;
            records.push(record);
        }
        Ok(records)
    }

    async fn operating_system(&self, cx: &mut Context<'_>) -> Result<Record> {
        let os = cx.cached_value_at(OPERATING_SYSTEM).await?.unwrap_or_default();
        let mut record = Record::new(Category::OperatingSystem);
        record
            .set("name", text(&os, "Caption"))?
            .set("version", text(&os, "Version"))?
            .set("kernel", text(&os, "BuildNumber"))?
            .set("architecture", text(&os, "OSArchitecture"))?
            .set("service_pack", text(&os, "CSDVersion"))?
            .set("install_date", text(&os, "InstallDate"))?
            .set("last_boot", text(&os, "LastBootUpTime"))?;
        Ok(record)
    }
}

/// `DOMAIN\name` for a SID, memoised per profiler.
async fn account_name(cx: &mut Context<'_>, sid: &str) -> Result<Option<String>> {
    let query = format!("SELECT Name, Domain FROM Win32_Account WHERE SID = '{sid}'");
    let Some(row) = cx.cached_value_at(&query).await? else {
        return Ok(None);
    };
    Ok(match (field(&row, "Domain"), field(&row, "Name")) {
        (Some(domain), Some(name)) => Some(format!(r"{domain}\{name}")),
        (None, Some(name)) => Some(name.to_string()),
        _ => None,
    })
}
