//! Compares an existing record set to a desired one.
//!
//! Identity for diffing is `(hostname, type, target, srv?)` — see
//! [`crate::types::Record::identity`]. A TTL-only difference on a matching
//! identity is the only case treated as an update; any other change to the
//! target or SRV tuple changes the identity and so appears as a delete/create
//! pair instead.

use std::collections::HashMap;

use crate::types::{Hostname, Record, RecordIdentity};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffResult {
    pub to_create: Vec<Record>,
    pub to_update: Vec<(Record, Record)>,
    pub to_delete: Vec<Record>,
    pub unchanged: Vec<Record>,
}

/// Computes the four disjoint groups between `existing` and `desired`.
pub fn diff(existing: &[Record], desired: &[Record]) -> DiffResult {
    let existing_by_id: HashMap<RecordIdentity, &Record> =
        existing.iter().map(|r| (r.identity(), r)).collect();
    let desired_by_id: HashMap<RecordIdentity, &Record> =
        desired.iter().map(|r| (r.identity(), r)).collect();

    let mut result = DiffResult::default();

    for (id, desired_record) in &desired_by_id {
        match existing_by_id.get(id) {
            None => result.to_create.push((*desired_record).clone()),
            Some(existing_record) if existing_record.ttl == desired_record.ttl => {
                result.unchanged.push((*desired_record).clone())
            }
            Some(existing_record) => {
                result
                    .to_update
                    .push(((*existing_record).clone(), (*desired_record).clone()));
            }
        }
    }

    for (id, existing_record) in &existing_by_id {
        if !desired_by_id.contains_key(id) {
            result.to_delete.push((*existing_record).clone());
        }
    }

    result
}

/// Filters both sides to `hostname` before diffing — used when reconciling
/// one hostname instead of a full sweep.
pub fn compare_for_hostname(existing: &[Record], desired: &[Record], hostname: &Hostname) -> DiffResult {
    let existing: Vec<Record> = existing.iter().filter(|r| r.hostname == *hostname).cloned().collect();
    let desired: Vec<Record> = desired.iter().filter(|r| r.hostname == *hostname).cloned().collect();
    diff(&existing, &desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordTarget;
    use std::net::Ipv4Addr;

    fn a(host: &str, ip: [u8; 4], ttl: u32) -> Record {
        Record::new(host, RecordTarget::A(Ipv4Addr::from(ip)), ttl)
    }

    #[test]
    fn new_record_is_to_create() {
        let desired = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let result = diff(&[], &desired);
        assert_eq!(result.to_create, desired);
        assert!(result.to_delete.is_empty());
    }

    #[test]
    fn missing_record_is_to_delete() {
        let existing = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let result = diff(&existing, &[]);
        assert_eq!(result.to_delete, existing);
        assert!(result.to_create.is_empty());
    }

    #[test]
    fn ttl_only_change_is_to_update() {
        let existing = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let desired = vec![a("app.example.com", [10, 0, 0, 1], 600)];
        let result = diff(&existing, &desired);
        assert_eq!(result.to_update, vec![(existing[0].clone(), desired[0].clone())]);
        assert!(result.to_create.is_empty());
        assert!(result.to_delete.is_empty());
    }

    #[test]
    fn target_change_is_delete_and_create_pair() {
        let existing = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let desired = vec![a("app.example.com", [10, 0, 0, 2], 300)];
        let result = diff(&existing, &desired);
        assert_eq!(result.to_delete, existing);
        assert_eq!(result.to_create, desired);
        assert!(result.to_update.is_empty());
    }

    #[test]
    fn identical_record_is_unchanged() {
        let rec = a("app.example.com", [10, 0, 0, 1], 300);
        let result = diff(std::slice::from_ref(&rec), std::slice::from_ref(&rec));
        assert_eq!(result.unchanged, vec![rec]);
    }

    #[test]
    fn hostname_comparison_is_case_insensitive() {
        let existing = vec![a("App.Example.com", [10, 0, 0, 1], 300)];
        let desired = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let result = diff(&existing, &desired);
        assert_eq!(result.unchanged.len(), 1);
    }

    #[test]
    fn compare_for_hostname_filters_both_sides() {
        let existing = vec![
            a("app.example.com", [10, 0, 0, 1], 300),
            a("other.example.com", [10, 0, 0, 9], 300),
        ];
        let desired = vec![a("app.example.com", [10, 0, 0, 1], 300)];
        let result = compare_for_hostname(&existing, &desired, &Hostname::new("app.example.com"));
        assert_eq!(result.unchanged.len(), 1);
        assert!(result.to_delete.is_empty());
    }
}
