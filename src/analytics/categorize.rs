//! Keyword classification of discovery log messages.
//!
//! Matching is a case-insensitive substring test. Categories are checked in
//! declaration order and the first hit wins, so a message that mentions
//! both a credential and a timeout is a credential failure.

use std::fmt;

use serde::Serialize;

const CREDENTIAL_KEYWORDS: &[&str] = &["credential", "authentication", "login", "password", "access denied"];
const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out", "unreachable", "connection refused"];
const CLASSIFICATION_KEYWORDS: &[&str] = &["classification", "pattern", "classify", "unclassified"];
const PORT_SCAN_KEYWORDS: &[&str] = &["port scan", "port closed", "port unreachable"];
const SNMP_KEYWORDS: &[&str] = &["snmp", "community string", "snmp timeout"];
const SSH_KEYWORDS: &[&str] = &["ssh", "key exchange", "host key"];
const WMI_KEYWORDS: &[&str] = &["wmi", "windows management", "dcom"];

fn matches_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| lower.contains(kw))
}

/// Fine-grained failure categories reported by scan analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    CredentialFailure,
    NetworkTimeout,
    ClassificationFailure,
    PortScanFailure,
    SnmpFailure,
    SshFailure,
    WmiFailure,
    Other,
}

impl ErrorCategory {
    const RULES: [(ErrorCategory, &'static [&'static str]); 7] = [
        (ErrorCategory::CredentialFailure, CREDENTIAL_KEYWORDS),
        (ErrorCategory::NetworkTimeout, TIMEOUT_KEYWORDS),
        (ErrorCategory::ClassificationFailure, CLASSIFICATION_KEYWORDS),
        (ErrorCategory::PortScanFailure, PORT_SCAN_KEYWORDS),
        (ErrorCategory::SnmpFailure, SNMP_KEYWORDS),
        (ErrorCategory::SshFailure, SSH_KEYWORDS),
        (ErrorCategory::WmiFailure, WMI_KEYWORDS),
    ];

    /// Classifies a log message.
    pub fn of(message: &str) -> Self {
        let lower = message.to_lowercase();
        Self::RULES
            .iter()
            .find(|(_, keywords)| matches_any(&lower, keywords))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::CredentialFailure => "credential_failure",
            ErrorCategory::NetworkTimeout => "network_timeout",
            ErrorCategory::ClassificationFailure => "classification_failure",
            ErrorCategory::PortScanFailure => "port_scan_failure",
            ErrorCategory::SnmpFailure => "snmp_failure",
            ErrorCategory::SshFailure => "ssh_failure",
            ErrorCategory::WmiFailure => "wmi_failure",
            ErrorCategory::Other => "other",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse categories that drive remediation suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationCategory {
    Credential,
    Network,
    Classification,
    PortScan,
    Other,
}

impl RemediationCategory {
    /// Classifies a log message. Network also matches the bare word
    /// "network".
    pub fn of(message: &str) -> Self {
        let lower = message.to_lowercase();
        if matches_any(&lower, CREDENTIAL_KEYWORDS) {
            RemediationCategory::Credential
        } else if matches_any(&lower, TIMEOUT_KEYWORDS) || lower.contains("network") {
            RemediationCategory::Network
        } else if matches_any(&lower, CLASSIFICATION_KEYWORDS) {
            RemediationCategory::Classification
        } else if matches_any(&lower, PORT_SCAN_KEYWORDS) {
            RemediationCategory::PortScan
        } else {
            RemediationCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationCategory::Credential => "credential",
            RemediationCategory::Network => "network",
            RemediationCategory::Classification => "classification",
            RemediationCategory::PortScan => "port_scan",
            RemediationCategory::Other => "other",
        }
    }
}

impl fmt::Display for RemediationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_category_keywords() {
        let cases = [
            ("Authentication failed for user admin", ErrorCategory::CredentialFailure),
            ("Connection timed out after 30s", ErrorCategory::NetworkTimeout),
            ("Device remained Unclassified", ErrorCategory::ClassificationFailure),
            ("Port scan found no open ports", ErrorCategory::PortScanFailure),
            ("SNMP community string error", ErrorCategory::SnmpFailure),
            ("Host key verification failed", ErrorCategory::SshFailure),
            ("DCOM error 0x80070005", ErrorCategory::WmiFailure),
            ("Disk almost full", ErrorCategory::Other),
        ];
        for (message, expected) in cases {
            assert_eq!(ErrorCategory::of(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_first_match_wins() {
        // Mentions both a password and a timeout.
        assert_eq!(
            ErrorCategory::of("Password prompt timeout"),
            ErrorCategory::CredentialFailure
        );
        // "port unreachable" contains "unreachable", which network checks first.
        assert_eq!(
            ErrorCategory::of("Port unreachable on 10.0.0.1"),
            ErrorCategory::NetworkTimeout
        );
    }

    #[test]
    fn test_snmp_message_not_swallowed_by_timeout_rule() {
        assert_eq!(
            ErrorCategory::of("SNMP community string rejected"),
            ErrorCategory::SnmpFailure
        );
    }

    #[test]
    fn test_remediation_category() {
        assert_eq!(RemediationCategory::of("Login denied"), RemediationCategory::Credential);
        assert_eq!(RemediationCategory::of("Network is down"), RemediationCategory::Network);
        assert_eq!(
            RemediationCategory::of("No pattern matched"),
            RemediationCategory::Classification
        );
        assert_eq!(RemediationCategory::of("port closed"), RemediationCategory::PortScan);
        assert_eq!(RemediationCategory::of("SSH banner"), RemediationCategory::Other);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_value(ErrorCategory::PortScanFailure).unwrap(),
            "port_scan_failure"
        );
        assert_eq!(RemediationCategory::PortScan.to_string(), "port_scan");
    }
}
