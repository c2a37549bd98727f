//! Identity digest computation for check instances
//!
//! Deterministic SHA256 digests over canonical JSON of sorted inputs.
//! Order-independence is what keeps recomputation idempotent: the same
//! matched-constraint set produces the same digest regardless of the
//! order constraints were evaluated in.

use canopy_errors::Result;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

fn hash_canonical<T: serde::Serialize>(value: &T) -> Result<String> {
    let canonical = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Digest over the sorted ids of all matched constraints
pub fn constraint_hash(check_id: &str, matched_ids: &[String]) -> Result<String> {
    let mut ids: Vec<&str> = matched_ids.iter().map(String::as_str).collect();
    ids.sort_unstable();
    hash_canonical(&(check_id, ids))
}

/// Digest additionally covering the matched constraint values
pub fn constraint_val_hash(check_id: &str, matched: &[(String, String)]) -> Result<String> {
    let mut pairs: Vec<(&str, &str)> = matched
        .iter()
        .map(|(id, value)| (id.as_str(), value.as_str()))
        .collect();
    pairs.sort_unstable();
    hash_canonical(&(check_id, pairs))
}

/// Digest over one concrete service-attribute assignment
pub fn svc_cfg_hash(
    check_id: &str,
    service: &str,
    assignment: &BTreeMap<String, String>,
) -> Result<String> {
    // BTreeMap serializes in key order, already canonical
    hash_canonical(&(check_id, service, assignment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_constraint_hash_deterministic() {
        let ids = vec!["native/environment".to_string(), "system/os".to_string()];
        let h1 = constraint_hash("check-1", &ids).unwrap();
        let h2 = constraint_hash("check-1", &ids).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_constraint_hash_differs_per_check() {
        let ids = vec!["system/os".to_string()];
        assert_ne!(
            constraint_hash("check-1", &ids).unwrap(),
            constraint_hash("check-2", &ids).unwrap()
        );
    }

    #[test]
    fn test_val_hash_sees_values() {
        let a = vec![("system/os".to_string(), "linux".to_string())];
        let b = vec![("system/os".to_string(), "freebsd".to_string())];
        assert_ne!(
            constraint_val_hash("c", &a).unwrap(),
            constraint_val_hash("c", &b).unwrap()
        );
    }

    #[test]
    fn test_svc_cfg_hash_sees_assignment() {
        let mut one = BTreeMap::new();
        one.insert("path".to_string(), "/var/log".to_string());
        let mut two = BTreeMap::new();
        two.insert("path".to_string(), "/var/tmp".to_string());
        assert_ne!(
            svc_cfg_hash("c", "monitoring", &one).unwrap(),
            svc_cfg_hash("c", "monitoring", &two).unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_constraint_hash_order_independent(mut ids in proptest::collection::vec("[a-z/]{1,12}", 1..8)) {
            let forward = constraint_hash("check", &ids).unwrap();
            ids.reverse();
            let backward = constraint_hash("check", &ids).unwrap();
            prop_assert_eq!(forward, backward);
        }

        #[test]
        fn prop_val_hash_order_independent(mut pairs in proptest::collection::vec(("[a-z/]{1,8}", "[a-z0-9]{1,8}"), 1..8)) {
            let forward = constraint_val_hash("check", &pairs).unwrap();
            pairs.reverse();
            let backward = constraint_val_hash("check", &pairs).unwrap();
            prop_assert_eq!(forward, backward);
        }
    }
}
