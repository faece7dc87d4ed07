use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::ServiceError;

/// Permission from the closed vocabulary {READ, WRITE}.
///
/// Names are matched exactly (upper-case); anything else is rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::Read, Permission::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Permission::Read),
            "WRITE" => Ok(Permission::Write),
            other => Err(PermissionError::Invalid(other.to_string())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("Invalid permission: {0}")]
    Invalid(String),

    #[error("malformed permission list: {0}")]
    Malformed(String),
}

impl From<PermissionError> for ServiceError {
    fn from(value: PermissionError) -> Self {
        ServiceError::validation(value.to_string())
    }
}

/// Validate raw entries against the vocabulary, in input order.
///
/// Stops at the first offender and reports only that entry.
pub fn validate_permissions<S: AsRef<str>>(entries: &[S]) -> Result<Vec<Permission>, PermissionError> {
    entries.iter().map(|e| e.as_ref().parse()).collect()
}

/// Canonical storage encoding: a compact JSON array, e.g. `["READ","WRITE"]`.
pub fn serialize_permissions(permissions: &[Permission]) -> Result<String, PermissionError> {
    serde_json::to_string(permissions).map_err(|e| PermissionError::Malformed(e.to_string()))
}

/// Inverse of [`serialize_permissions`]; order and duplicates are preserved.
pub fn deserialize_permissions(raw: &str) -> Result<Vec<Permission>, PermissionError> {
    let entries: Vec<String> =
        serde_json::from_str(raw).map_err(|e| PermissionError::Malformed(e.to_string()))?;
    validate_permissions(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_the_vocabulary_in_order() {
        let perms = validate_permissions(&["WRITE", "READ"]).unwrap();
        assert_eq!(perms, vec![Permission::Write, Permission::Read]);
    }

    #[test]
    fn reports_first_offender_only() {
        let err = validate_permissions(&["READ", "DELETE", "ADMIN"]).unwrap_err();
        assert_eq!(err, PermissionError::Invalid("DELETE".to_string()));
        assert_eq!(err.to_string(), "Invalid permission: DELETE");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let err = validate_permissions(&["read"]).unwrap_err();
        assert_eq!(err, PermissionError::Invalid("read".to_string()));
    }

    #[test]
    fn empty_list_is_valid() {
        let empty: [&str; 0] = [];
        assert!(validate_permissions(&empty).unwrap().is_empty());
    }

    #[test]
    fn serialization_matches_json_array() {
        let raw = serialize_permissions(&[Permission::Read, Permission::Write]).unwrap();
        assert_eq!(raw, r#"["READ","WRITE"]"#);
        assert_eq!(serialize_permissions(&[]).unwrap(), "[]");
    }

    #[test]
    fn serialization_keeps_duplicates_and_order() {
        let raw = serialize_permissions(&[Permission::Write, Permission::Read, Permission::Write]).unwrap();
        assert_eq!(raw, r#"["WRITE","READ","WRITE"]"#);
    }

    #[test]
    fn deserialize_rejects_garbage_and_unknown_names() {
        assert!(matches!(deserialize_permissions("READ"), Err(PermissionError::Malformed(_))));
        assert_eq!(
            deserialize_permissions(r#"["READ","EXECUTE"]"#),
            Err(PermissionError::Invalid("EXECUTE".to_string()))
        );
    }

    #[test]
    fn serde_uses_upper_case_names() {
        let json = serde_json::to_string(&vec![Permission::Write]).unwrap();
        assert_eq!(json, r#"["WRITE"]"#);
    }

    proptest! {
        #[test]
        fn round_trip_preserves_order(picks in prop::collection::vec(0usize..2, 0..16)) {
            let perms: Vec<Permission> = picks.into_iter().map(|i| Permission::ALL[i]).collect();
            let back = deserialize_permissions(&serialize_permissions(&perms).unwrap()).unwrap();
            prop_assert_eq!(back, perms);
        }

        #[test]
        fn any_foreign_entry_is_reported(
            prefix in prop::collection::vec(0usize..2, 0..4),
            bad in "[a-zA-Z]{1,8}".prop_filter("outside vocabulary", |s| s != "READ" && s != "WRITE"),
        ) {
            let mut entries: Vec<String> = prefix
                .into_iter()
                .map(|i| Permission::ALL[i].as_str().to_string())
                .collect();
            entries.push(bad.clone());
            entries.push("ALSO_BAD".to_string());

            prop_assert_eq!(validate_permissions(&entries), Err(PermissionError::Invalid(bad)));
        }
    }
}
