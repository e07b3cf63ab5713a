//! Host list input.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// One device to onboard, as listed in the input CSV.
///
/// Only three columns are read; any others are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRow {
    #[serde(rename = "REGION")]
    pub region: String,
    #[serde(rename = "csv-host-name")]
    pub hostname: String,
    /// Gateway of a subnet the device already owns
    #[serde(rename = "csv-deviceIP", default)]
    pub device_ip: Option<String>,
}

/// Read hosts from the first `max_rows` data rows of a CSV file.
pub fn read_hosts(path: &Path, max_rows: usize) -> Result<Vec<HostRow>> {
    info!("Reading hosts from: {:?}", path);
    let file = File::open(path)
        .wrap_err_with(|| format!("Failed to open host list '{}'", path.display()))?;
    parse_hosts(file, max_rows)
        .wrap_err_with(|| format!("Failed to parse host list '{}'", path.display()))
}

/// Parse hosts from any CSV source.
///
/// Regions are upper-cased and blank device IPs become `None`. Rows without
/// a host name are skipped but still count against `max_rows`.
pub fn parse_hosts<R: Read>(source: R, max_rows: usize) -> Result<Vec<HostRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);

    let mut hosts = Vec::new();
    for (index, record) in reader.deserialize::<HostRow>().enumerate() {
        if index >= max_rows {
            warn!("Host list has more than {} rows; the rest are ignored", max_rows);
            break;
        }
        // header is line 1
        let mut row = record.wrap_err_with(|| format!("Invalid host row on line {}", index + 2))?;

        if row.hostname.is_empty() {
            warn!("Skipping line {}: no host name", index + 2);
            continue;
        }
        row.region = row.region.to_uppercase();
        row.device_ip = row.device_ip.filter(|ip| !ip.trim().is_empty());
        hosts.push(row);
    }

    info!("Read {} hosts", hosts.len());
    Ok(hosts)
}
