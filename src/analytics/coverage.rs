//! IP coverage of completed scans.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::ScanStatus;

/// Maximum addresses listed in a coverage report.
pub const MAX_REPORTED_IPS: usize = 100;

/// Distinct, trimmed, non-empty scan IPs in ascending string order.
pub fn discovered_ips(scans: &[ScanStatus]) -> Vec<String> {
    scans
        .iter()
        .map(|s| s.ip_address.trim())
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Discovered addresses against the configured ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub schedule_sys_id: String,
    pub total_scans_analyzed: usize,
    pub unique_ips_discovered: usize,
    pub configured_ranges: usize,
    pub discovered_ips: Vec<String>,
}

impl CoverageReport {
    pub fn new(schedule_sys_id: impl Into<String>, scans: &[ScanStatus], configured_ranges: usize) -> Self {
        let ips = discovered_ips(scans);
        CoverageReport {
            schedule_sys_id: schedule_sys_id.into(),
            total_scans_analyzed: scans.len(),
            unique_ips_discovered: ips.len(),
            configured_ranges,
            discovered_ips: ips.into_iter().take(MAX_REPORTED_IPS).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan_at(ip: &str) -> ScanStatus {
        ScanStatus {
            ip_address: ip.to_string(),
            ..ScanStatus::default()
        }
    }

    #[test]
    fn test_discovered_ips_dedupes_and_sorts() {
        let scans = vec![scan_at("10.0.0.5"), scan_at(" 10.0.0.1 "), scan_at(""), scan_at("10.0.0.5")];
        assert_eq!(discovered_ips(&scans), vec!["10.0.0.1", "10.0.0.5"]);
    }

    #[test]
    fn test_report_caps_listed_ips() {
        let scans: Vec<ScanStatus> = (0..150).map(|i| scan_at(&format!("10.0.{}.{}", i / 100, i % 100))).collect();
        let report = CoverageReport::new("abc", &scans, 3);
        assert_eq!(report.total_scans_analyzed, 150);
        assert_eq!(report.unique_ips_discovered, 150);
        assert_eq!(report.discovered_ips.len(), MAX_REPORTED_IPS);
        assert_eq!(report.configured_ranges, 3);
    }
}
