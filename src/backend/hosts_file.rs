//! A file-backed local resolver backend, in the spirit of dnsmasq/Pi-hole
//! file-mode backends. Records are stored one per line in a flat file; every
//! mutation reads the whole file, applies the change, and rewrites it
//! atomically via a temp-file-then-rename to avoid a torn write on crash.

use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{BackendError, Capabilities, ProviderBackend};
use crate::types::{Record, RecordTarget, RecordType, SrvTuple};

const SUPPORTED_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::Aaaa,
    RecordType::Cname,
    RecordType::Srv,
    RecordType::Txt,
];

pub struct HostsFileBackend {
    name: String,
    path: PathBuf,
    // Serializes read-modify-write cycles; the file itself is the source of truth.
    lock: Mutex<()>,
}

impl HostsFileBackend {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        HostsFileBackend {
            name: name.into(),
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn op_err(&self, op: &'static str, reason: impl ToString) -> BackendError {
        BackendError::Unavailable {
            provider: self.name.clone(),
            op,
            reason: reason.to_string(),
        }
    }

    fn read_all(&self, op: &'static str) -> Result<Vec<Record>, BackendError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.op_err(op, e))?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            .map(|l| parse_line(l).map_err(|e| self.op_err(op, e)))
            .collect()
    }

    fn write_all(&self, records: &[Record], op: &'static str) -> Result<(), BackendError> {
        let body = records.iter().map(format_line).collect::<Vec<_>>().join("\n");
        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, body).map_err(|e| self.op_err(op, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| self.op_err(op, e))?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn format_line(r: &Record) -> String {
    match &r.target {
        RecordTarget::Srv { target, srv } => format!(
            "{} SRV {} {} {} {} {}",
            r.hostname.lower(),
            target,
            r.ttl,
            srv.priority,
            srv.weight,
            srv.port
        ),
        other => format!(
            "{} {} {} {}",
            r.hostname.lower(),
            other.record_type(),
            other.value(),
            r.ttl
        ),
    }
}

fn parse_line(line: &str) -> Result<Record, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let (hostname, rtype, rest) = match fields.as_slice() {
        [hostname, rtype, rest @ ..] => (*hostname, *rtype, rest),
        _ => return Err(format!("malformed record line: `{line}`")),
    };
    let target = match rtype.to_ascii_uppercase().as_str() {
        "A" => {
            let [value, ttl] = rest else {
                return Err(format!("malformed A record: `{line}`"));
            };
            let ip = Ipv4Addr::from_str(value).map_err(|e| e.to_string())?;
            (RecordTarget::A(ip), parse_ttl(ttl)?)
        }
        "AAAA" => {
            let [value, ttl] = rest else {
                return Err(format!("malformed AAAA record: `{line}`"));
            };
            let ip = Ipv6Addr::from_str(value).map_err(|e| e.to_string())?;
            (RecordTarget::Aaaa(ip), parse_ttl(ttl)?)
        }
        "CNAME" => {
            let [value, ttl] = rest else {
                return Err(format!("malformed CNAME record: `{line}`"));
            };
            (RecordTarget::Cname((*value).to_string()), parse_ttl(ttl)?)
        }
        "TXT" => {
            let [value, ttl] = rest else {
                return Err(format!("malformed TXT record: `{line}`"));
            };
            (RecordTarget::Txt((*value).to_string()), parse_ttl(ttl)?)
        }
        "SRV" => {
            let [target, ttl, priority, weight, port] = rest else {
                return Err(format!("malformed SRV record: `{line}`"));
            };
            let srv = SrvTuple {
                priority: priority.parse().map_err(|_| "bad SRV priority")?,
                weight: weight.parse().map_err(|_| "bad SRV weight")?,
                port: port.parse().map_err(|_| "bad SRV port")?,
            };
            (
                RecordTarget::Srv {
                    target: (*target).to_string(),
                    srv,
                },
                parse_ttl(ttl)?,
            )
        }
        other => return Err(format!("unsupported record type `{other}`")),
    };
    Ok(Record::new(hostname, target.0, target.1))
}

fn parse_ttl(raw: &str) -> Result<u32, String> {
    raw.parse().map_err(|_| format!("bad ttl `{raw}`"))
}

#[async_trait]
impl ProviderBackend for HostsFileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "hosts-file"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            ownership_txt_supported: true,
            native_update_supported: false,
            supported_types: SUPPORTED_TYPES,
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(self.op_err("ping", "parent directory does not exist"));
            }
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        let _guard = self.lock.lock();
        self.read_all("list")
    }

    async fn create(&self, record: &Record) -> Result<(), BackendError> {
        let _guard = self.lock.lock();
        let mut records = self.read_all("create")?;
        if records.iter().any(|r| r.identity() == record.identity()) {
            return Err(BackendError::Conflict {
                provider: self.name.clone(),
                op: "create",
            });
        }
        records.push(record.clone());
        self.write_all(&records, "create")
    }

    async fn delete(&self, record: &Record) -> Result<(), BackendError> {
        let _guard = self.lock.lock();
        let mut records = self.read_all("delete")?;
        let before = records.len();
        records.retain(|r| r.identity() != record.identity());
        if records.len() == before {
            return Err(BackendError::NotFound {
                provider: self.name.clone(),
                op: "delete",
            });
        }
        self.write_all(&records, "delete")
    }
}
