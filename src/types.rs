//! Shared value types for DNS records and hostnames.
//!
//! See [`crate::diff`] for how [`Record`] identity is used to compute
//! create/update/delete actions, and [`crate::instance`] for how ownership
//! markers are derived from a [`Hostname`].

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Prefix under which ownership TXT markers are created: `_dnsweaver.<hostname>`.
pub const OWNERSHIP_PREFIX: &str = "_dnsweaver";
/// Exact byte sequence an ownership TXT record must hold to count as a marker.
pub const OWNERSHIP_VALUE: &str = "heritage=dnsweaver";

/// A hostname. Compared and hashed case-insensitively; the original case is
/// retained for display and for what gets sent to backends.
#[derive(Debug, Clone, Eq)]
pub struct Hostname {
    original: String,
    lower: String,
}

impl Hostname {
    pub fn new(name: impl Into<String>) -> Self {
        let original = name.into();
        let lower = original.to_lowercase();
        Hostname { original, lower }
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// The lower-cased form used for comparisons and as cache/diff keys.
    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// The hostname of this record's ownership marker: `_dnsweaver.<hostname>`.
    pub fn ownership_marker_name(&self) -> Hostname {
        Hostname::new(format!("{OWNERSHIP_PREFIX}.{}", self.lower))
    }
}

impl PartialEq for Hostname {
    fn eq(&self, other: &Self) -> bool {
        self.lower == other.lower
    }
}
impl Hash for Hostname {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower.hash(state);
    }
}
impl Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}
impl serde::Serialize for Hostname {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}
impl From<&str> for Hostname {
    fn from(s: &str) -> Self {
        Hostname::new(s)
    }
}
impl From<String> for Hostname {
    fn from(s: String) -> Self {
        Hostname::new(s)
    }
}

/// The record types this core manages. TXT is only ever an ownership marker;
/// any other TXT record is ignored by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "SRV")]
    Srv,
    #[serde(rename = "TXT")]
    Txt,
}
impl Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        };
        write!(f, "{s}")
    }
}

/// `{priority, weight, port}`, present iff `type = SRV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
pub struct SrvTuple {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
}
impl Display for SrvTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.priority, self.weight, self.port)
    }
}

/// The content/target of a record, carrying its type with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordTarget {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Cname(String),
    Srv { target: String, srv: SrvTuple },
    /// Free text. Only meaningful as an ownership marker when the value is
    /// exactly [`OWNERSHIP_VALUE`]; any other TXT content is inert to the core.
    Txt(String),
}

impl RecordTarget {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordTarget::A(_) => RecordType::A,
            RecordTarget::Aaaa(_) => RecordType::Aaaa,
            RecordTarget::Cname(_) => RecordType::Cname,
            RecordTarget::Srv { .. } => RecordType::Srv,
            RecordTarget::Txt(_) => RecordType::Txt,
        }
    }

    pub fn srv(&self) -> Option<SrvTuple> {
        match self {
            RecordTarget::Srv { srv, .. } => Some(*srv),
            _ => None,
        }
    }

    /// The value used for diff identity and logging: the string form of
    /// whatever this target points at (IP literal, hostname, or text).
    pub fn value(&self) -> String {
        match self {
            RecordTarget::A(ip) => ip.to_string(),
            RecordTarget::Aaaa(ip) => ip.to_string(),
            RecordTarget::Cname(h) => h.clone(),
            RecordTarget::Srv { target, .. } => target.clone(),
            RecordTarget::Txt(v) => v.clone(),
        }
    }

    pub fn is_ownership_marker_value(&self) -> bool {
        matches!(self, RecordTarget::Txt(v) if v == OWNERSHIP_VALUE)
    }
}
impl Display for RecordTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTarget::Srv { target, srv } => write!(f, "{} {}", srv, target),
            other => write!(f, "{}", other.value()),
        }
    }
}

/// The unit of DNS state the core manages.
///
/// Identity for diffing is `(hostname.lower(), type, target value, srv?)` —
/// TTL is explicitly excluded from identity (a TTL-only change is an update,
/// not a different record).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub hostname: Hostname,
    pub target: RecordTarget,
    pub ttl: u32,
    /// Opaque, used only for logging.
    pub provider_id: String,
}

/// The tuple used to key a [`Record`] for diffing and cache lookups.
pub type RecordIdentity = (String, RecordType, String, Option<SrvTuple>);

impl Record {
    pub fn new(hostname: impl Into<Hostname>, target: RecordTarget, ttl: u32) -> Self {
        Record {
            hostname: hostname.into(),
            target,
            ttl,
            provider_id: String::new(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.target.record_type()
    }

    pub fn identity(&self) -> RecordIdentity {
        (
            self.hostname.lower().to_string(),
            self.target.record_type(),
            self.target.value(),
            self.target.srv(),
        )
    }

    /// True iff this is the ownership marker TXT record for `hostname`,
    /// holding the exact expected value. Any other TXT at the same name,
    /// or a TXT at a different name, does not count.
    pub fn is_ownership_marker(&self) -> bool {
        self.target.record_type() == RecordType::Txt
            && self.hostname.lower().starts_with(&format!("{OWNERSHIP_PREFIX}."))
            && self.target.is_ownership_marker_value()
    }

    /// Builds the ownership marker record that accompanies a data record at `hostname`.
    pub fn ownership_marker_for(hostname: &Hostname, ttl: u32, provider_id: &str) -> Record {
        Record {
            hostname: hostname.ownership_marker_name(),
            target: RecordTarget::Txt(OWNERSHIP_VALUE.to_string()),
            ttl,
            provider_id: provider_id.to_string(),
        }
    }
}
impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} (ttl={})",
            self.hostname,
            self.target.record_type(),
            self.target,
            self.ttl
        )
    }
}
