//! Classification of engine output lines

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static ACCESS_LOG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"accepted (tcp|udp):.+:\d+ \[.+\] email: .+").expect("valid access log regex")
});

static SEVERITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)? )?\[([A-Za-z]+)\] (.*)$")
        .expect("valid severity regex")
});

/// Destination file of an engine output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Access,
    Error,
}

impl LogKind {
    /// Successful connection lines go to the access log, everything else to the error log
    pub fn classify(line: &str) -> Self {
        if ACCESS_LOG_PATTERN.is_match(line) {
            LogKind::Access
        } else {
            LogKind::Error
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Unknown,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A line split into its bracketed severity and message, when it has one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine<'a> {
    pub severity: Severity,
    pub message: &'a str,
}

impl<'a> LogLine<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let caps = SEVERITY_PATTERN.captures(line)?;
        let severity = match caps.get(1).map(|m| m.as_str()) {
            Some("Debug") => Severity::Debug,
            Some("Info") => Severity::Info,
            Some("Warning") => Severity::Warning,
            Some("Error") => Severity::Error,
            _ => Severity::Unknown,
        };
        let message = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        Some(Self { severity, message })
    }
}
