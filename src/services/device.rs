use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Device metadata derived from the login request, stored on the session row
/// so users can recognize their own sessions in the active-sessions list.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetadata {
    pub fingerprint: String,
    pub device_type: String,
    pub browser: String,
    pub operating_system: String,
}

lazy_static! {
    static ref MOBILE_RE: Regex = Regex::new(r"(?i)mobile|android|iphone").unwrap();
    static ref TABLET_RE: Regex = Regex::new(r"(?i)ipad").unwrap();

    // Ordered: first match wins. Edge/Opera carry "Chrome" in their UA and
    // Chrome carries "Safari", so the more specific entries come first.
    static ref BROWSER_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("Edge", Regex::new(r"Edg(?:e|A|iOS)?/([0-9.]+)").unwrap()),
        ("Opera", Regex::new(r"OPR/([0-9.]+)").unwrap()),
        ("Chrome", Regex::new(r"Chrome/([0-9.]+)").unwrap()),
        ("Firefox", Regex::new(r"Firefox/([0-9.]+)").unwrap()),
        ("Safari", Regex::new(r"Version/([0-9.]+).*Safari").unwrap()),
        ("Internet Explorer", Regex::new(r"MSIE ([0-9.]+)").unwrap()),
    ];

    static ref OS_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("Windows", Regex::new(r"Windows NT ([0-9.]+)").unwrap()),
        ("Android", Regex::new(r"Android ([0-9.]+)").unwrap()),
        ("iOS", Regex::new(r"OS ([0-9_]+) like Mac OS X").unwrap()),
        ("macOS", Regex::new(r"Mac OS X ([0-9_.]+)").unwrap()),
        ("Linux", Regex::new(r"(Linux)").unwrap()),
    ];
}

pub fn derive(ip_address: &str, user_agent: &str) -> DeviceMetadata {
    DeviceMetadata {
        fingerprint: fingerprint(ip_address, user_agent),
        device_type: classify_device_type(user_agent).to_string(),
        browser: match_pattern(&BROWSER_PATTERNS, user_agent),
        operating_system: match_pattern(&OS_PATTERNS, user_agent),
    }
}

/// `mobile` for phone UAs, `tablet` for iPad, `desktop` otherwise. The iPad
/// check runs first since iPad UAs also say "Mobile".
pub fn classify_device_type(user_agent: &str) -> &'static str {
    if TABLET_RE.is_match(user_agent) {
        "tablet"
    } else if MOBILE_RE.is_match(user_agent) {
        "mobile"
    } else {
        "desktop"
    }
}

fn match_pattern(patterns: &[(&'static str, Regex)], user_agent: &str) -> String {
    for (name, re) in patterns {
        if let Some(caps) = re.captures(user_agent) {
            let version = caps.get(1).map(|m| m.as_str().replace('_', ".")).unwrap_or_default();
            if version.is_empty() || version == "Linux" {
                return (*name).to_string();
            }
            return format!("{name} {version}");
        }
    }
    "unknown".to_string()
}

/// Hash of `ip|user agent|calendar day`. Rolls over once per UTC day even
/// for an unchanged device — a coarse anti-replay signal, not a stable ID.
pub fn fingerprint(ip_address: &str, user_agent: &str) -> String {
    fingerprint_for_day(ip_address, user_agent, &Utc::now().format("%Y-%m-%d").to_string())
}

fn fingerprint_for_day(ip_address: &str, user_agent: &str, day: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{ip_address}|{user_agent}|{day}"));
    hex::encode(hasher.finalize())
}
