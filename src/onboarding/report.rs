//! Onboarding results: the xlsx sheet handed to the device team and an
//! optional JSON summary.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;

use super::{HostOutcome, HostStatus};

/// Column headers expected by the device provisioning template.
pub const HEADERS: [&str; 4] = [
    "csv-deviceIP",
    "csv-host-name",
    "/100/irb1/interface/ip/address",
    "//system/system-ip",
];

/// The four cells written for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub device_ip: String,
    pub hostname: String,
    pub interface_address: String,
    pub system_ip: String,
}

impl ReportRow {
    /// Gateway based cells for an onboarded host. A failed host gets its
    /// failure label in place of the gateway.
    pub fn from_outcome(outcome: &HostOutcome, prefix: u8) -> Self {
        match (&outcome.status, &outcome.gateway) {
            (HostStatus::Onboarded, Some(gateway)) => Self {
                device_ip: gateway.clone(),
                hostname: outcome.hostname.clone(),
                interface_address: format!("{}/{}", gateway, prefix),
                system_ip: gateway.clone(),
            },
            (status, _) => {
                let label = status.to_string();
                Self {
                    device_ip: label.clone(),
                    hostname: outcome.hostname.clone(),
                    interface_address: format!("{}/{}", label, prefix),
                    system_ip: label,
                }
            }
        }
    }

    fn cells(&self) -> [&str; 4] {
        [
            &self.device_ip,
            &self.hostname,
            &self.interface_address,
            &self.system_ip,
        ]
    }
}

/// Results collected over one onboarding run.
#[derive(Debug, Clone)]
pub struct Report {
    started: DateTime<Local>,
    prefix: u8,
    outcomes: Vec<HostOutcome>,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    started: String,
    finished: String,
    total: usize,
    onboarded: usize,
    failed: usize,
    hosts: &'a [HostOutcome],
}

impl Report {
    /// Empty report; `prefix` is the subnet size shown next to each gateway.
    pub fn new(prefix: u8) -> Self {
        Self {
            started: Local::now(),
            prefix,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: HostOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[HostOutcome] {
        &self.outcomes
    }

    pub fn onboarded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == HostStatus::Onboarded)
            .count()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.outcomes
            .iter()
            .map(|o| ReportRow::from_outcome(o, self.prefix))
            .collect()
    }

    /// `<prefix>-<YYYYmmdd-HHMMSS-micros>.xlsx`, timestamped with the run start.
    pub fn file_name(&self, report_prefix: &str) -> String {
        format!(
            "{}-{}.xlsx",
            report_prefix,
            self.started.format("%Y%m%d-%H%M%S-%6f")
        )
    }

    /// Write the xlsx sheet into `output_dir` and return its path.
    ///
    /// An existing report is never overwritten; a `-<n>` suffix is added
    /// instead.
    pub fn write_xlsx(&self, output_dir: &Path, report_prefix: &str) -> Result<PathBuf> {
        fs::create_dir_all(output_dir).wrap_err_with(|| {
            format!("Failed to create report directory '{}'", output_dir.display())
        })?;
        let path = unused_path(output_dir, &self.file_name(report_prefix));

        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();

        for (col, title) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header)?;
        }
        for (index, row) in self.rows().iter().enumerate() {
            let line = index as u32 + 1;
            for (col, value) in row.cells().iter().enumerate() {
                worksheet.write_string(line, col as u16, *value)?;
            }
        }

        workbook
            .save(&path)
            .wrap_err_with(|| format!("Failed to write report '{}'", path.display()))?;
        info!("Report written to {:?}", path);
        Ok(path)
    }

    /// Write every host outcome plus run totals as pretty JSON.
    pub fn write_summary(&self, path: &Path) -> Result<()> {
        let summary = Summary {
            started: self.started.to_rfc3339(),
            finished: Local::now().to_rfc3339(),
            total: self.outcomes.len(),
            onboarded: self.onboarded(),
            failed: self.outcomes.len() - self.onboarded(),
            hosts: &self.outcomes,
        };

        let json = serde_json::to_string_pretty(&summary)
            .wrap_err("Failed to serialize onboarding summary")?;
        fs::write(path, json)
            .wrap_err_with(|| format!("Failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
        Ok(())
    }
}

fn unused_path(dir: &Path, file_name: &str) -> PathBuf {
    let stem = file_name.trim_end_matches(".xlsx");
    let mut candidate = dir.join(file_name);
    let mut n = 1;
    while candidate.exists() {
        candidate = dir.join(format!("{}-{}.xlsx", stem, n));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(hostname: &str, status: HostStatus, gateway: Option<&str>) -> HostOutcome {
        HostOutcome {
            hostname: hostname.to_string(),
            region: "TEST".to_string(),
            subnet: gateway.map(|g| format!("{}/29", g)),
            gateway: gateway.map(str::to_string),
            status,
            errors: Vec::new(),
        }
    }

    #[test]
    fn test_rows_for_success_and_failure() {
        let mut report = Report::new(29);
        report.push(outcome("branch-01", HostStatus::Onboarded, Some("10.35.105.1")));
        report.push(outcome("branch-02", HostStatus::FailedSubnet, None));
        report.push(outcome("branch-03", HostStatus::FailedScope, Some("10.35.105.9")));

        let rows = report.rows();
        assert_eq!(
            rows[0],
            ReportRow {
                device_ip: "10.35.105.1".to_string(),
                hostname: "branch-01".to_string(),
                interface_address: "10.35.105.1/29".to_string(),
                system_ip: "10.35.105.1".to_string(),
            }
        );
        assert_eq!(rows[1].cells(), ["Failed Subnet", "branch-02", "Failed Subnet/29", "Failed Subnet"]);
        assert_eq!(rows[2].cells(), ["Failed Scope", "branch-03", "Failed Scope/29", "Failed Scope"]);
        assert_eq!(report.onboarded(), 1);
    }

    #[test]
    fn test_file_name() {
        let report = Report::new(29);
        let name = report.file_name("onboarding");
        assert!(name.starts_with("onboarding-"));
        assert!(name.ends_with(".xlsx"));
        assert_eq!(name.len(), "onboarding-20260101-120000-123456.xlsx".len());
    }

    #[test]
    fn test_reports_from_the_same_instant_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut report = Report::new(29);
        report.push(outcome("branch-01", HostStatus::Onboarded, Some("10.35.105.1")));

        let first = report.write_xlsx(dir.path(), "onboarding").unwrap();
        let second = report.write_xlsx(dir.path(), "onboarding").unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
        assert!(second.to_string_lossy().ends_with("-1.xlsx"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_write_xlsx_and_summary() {
        let dir = TempDir::new().unwrap();
        let mut report = Report::new(29);
        report.push(outcome("branch-01", HostStatus::Onboarded, Some("10.35.105.1")));
        report.push(outcome("branch-02", HostStatus::FailedInterface, Some("10.35.105.9")));

        let xlsx = report.write_xlsx(&dir.path().join("reports"), "onboarding").unwrap();
        assert!(xlsx.exists());
        assert!(fs::metadata(&xlsx).unwrap().len() > 0);

        let summary_path = dir.path().join("summary.json");
        report.write_summary(&summary_path).unwrap();
        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(summary["total"], 2);
        assert_eq!(summary["onboarded"], 1);
        assert_eq!(summary["hosts"][1]["status"], "Failed Interface");
    }
}
