use serde::{Deserialize, Serialize};
use tracing::warn;

/// User as stored by the identity service and as shipped in the `user` field of a
/// session lookup. Every optional field may be absent on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub has_password: Option<bool>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Resolved identity for one session at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub credential_set: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Principal {
    /// The single interpretation of a [`UserRecord`], shared by the server-side and
    /// HTTP resolvers. The `has_password` column is authoritative; a disagreeing
    /// `metadata.has_password` is reported, not used.
    pub fn from_record(rec: &UserRecord) -> Self {
        let credential_set = rec.has_password.unwrap_or(false);
        if let Some(meta) = rec.metadata.get("has_password").and_then(|v| v.as_bool()) {
            if meta != credential_set {
                warn!(
                    target: "identity",
                    user_id = %rec.id,
                    column = credential_set,
                    metadata = meta,
                    "credential flag diverges between user record and metadata"
                );
            }
        }
        Self {
            id: rec.id.clone(),
            email: rec.email.clone(),
            display_name: rec.name.clone(),
            credential_set,
            avatar_url: rec.avatar_url.clone(),
        }
    }

    /// Display name with surrounding whitespace removed; `None` when blank.
    pub fn trimmed_name(&self) -> Option<&str> {
        self.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

impl From<&UserRecord> for Principal {
    fn from(rec: &UserRecord) -> Self { Principal::from_record(rec) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_wire_record_degrades_to_missing_fields() {
        let rec: UserRecord = serde_json::from_value(serde_json::json!({ "id": "u1" })).unwrap();
        let p = Principal::from_record(&rec);
        assert_eq!(p.id, "u1");
        assert!(!p.credential_set);
        assert_eq!(p.display_name, None);
        assert_eq!(p.trimmed_name(), None);
    }

    #[test]
    fn column_wins_over_metadata() {
        let mut rec = UserRecord { id: "u2".into(), has_password: Some(true), ..Default::default() };
        rec.metadata.insert("has_password".into(), serde_json::Value::Bool(false));
        assert!(Principal::from_record(&rec).credential_set);
    }

    #[test]
    fn blank_names_trim_to_none() {
        let p = Principal { display_name: Some("   ".into()), ..Default::default() };
        assert_eq!(p.trimmed_name(), None);
        let p = Principal { display_name: Some("  Ada ".into()), ..Default::default() };
        assert_eq!(p.trimmed_name(), Some("Ada"));
    }
}
