//! Group members.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque member identifier as handed out by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MemberId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A `{member_id, display_name}` membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Member {
    pub fn new(member_id: impl Into<MemberId>, display_name: Option<&str>) -> Self {
        Self {
            member_id: member_id.into(),
            display_name: display_name.map(str::to_string),
        }
    }

    /// Display name, or `Member <first 6 chars of id>` when none is set.
    pub fn label(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let short: String = self.member_id.as_str().chars().take(6).collect();
                format!("Member {short}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_falls_back_to_short_id() {
        let m = Member::new("8f3a2c91-77", None);
        assert_eq!(m.label(), "Member 8f3a2c");

        let named = Member::new("8f3a2c91-77", Some("Priya"));
        assert_eq!(named.label(), "Priya");

        let blank = Member::new("abc", Some("  "));
        assert_eq!(blank.label(), "Member abc");
    }

    #[test]
    fn test_member_id_is_transparent_in_json() {
        let id = MemberId::new("u-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u-1\"");
    }
}
