use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RecordId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberRole {
    Admin,
    CoManager,
    #[default]
    Viewer,
}

impl MemberRole {
    /// Permissions granted by the role.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            MemberRole::Admin => &["view", "edit", "admin"],
            MemberRole::CoManager => &["view", "edit"],
            MemberRole::Viewer => &["view"],
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRole::Admin => write!(f, "admin"),
            MemberRole::CoManager => write!(f, "co-manager"),
            MemberRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(MemberRole::Admin),
            "co-manager" | "comanager" => Ok(MemberRole::CoManager),
            "viewer" => Ok(MemberRole::Viewer),
            _ => Err(format!(
                "Invalid role '{}'. Valid options: admin, co-manager, viewer",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub relationship: String,
    pub joined_date: Option<NaiveDate>,
    pub status: String,
    pub permissions: Vec<String>,
}

impl FamilyMember {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>, role: MemberRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            status: "active".to_string(),
            permissions: role.permissions().iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn can(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_member_gets_role_permissions() {
        let member = FamilyMember::new("2", "Sam", MemberRole::CoManager);
        assert!(member.can("edit"));
        assert!(!member.can("admin"));
        assert_eq!(member.status, "active");
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_value(MemberRole::CoManager).unwrap(),
            json!("co-manager")
        );
        assert_eq!(MemberRole::from_str("Admin").unwrap(), MemberRole::Admin);
        assert!(MemberRole::from_str("owner").is_err());
    }
}
