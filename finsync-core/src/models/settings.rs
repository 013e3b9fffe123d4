use serde::{Deserialize, Serialize};

/// User preferences stored under `financeAppSettings`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub profile: Profile,
    pub notifications: NotificationSettings,
    pub security: SecuritySettings,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub budget_alerts: bool,
    pub weekly_reports: bool,
    pub push_notifications: bool,
    pub email_notifications: bool,
    pub sms_notifications: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            budget_alerts: true,
            weekly_reports: true,
            push_notifications: false,
            email_notifications: true,
            sms_notifications: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SecuritySettings {
    pub two_factor: bool,
    pub login_alerts: bool,
    /// Minutes of inactivity before sign-out
    pub session_timeout: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            two_factor: false,
            login_alerts: true,
            session_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// ISO 4217 code
    pub currency: String,
    pub date_format: String,
    pub dark_mode: bool,
    pub privacy_mode: bool,
    pub budgeting_method: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency: "GBP".to_string(),
            date_format: "DD/MM/YYYY".to_string(),
            dark_mode: false,
            privacy_mode: false,
            budgeting_method: "50/30/20".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_settings_merge_with_defaults() {
        let settings: Settings = serde_json::from_value(json!({
            "preferences": {"currency": "USD", "darkMode": true}
        }))
        .unwrap();

        assert_eq!(settings.preferences.currency, "USD");
        assert!(settings.preferences.dark_mode);
        assert_eq!(settings.preferences.budgeting_method, "50/30/20");
        assert_eq!(settings.security.session_timeout, 30);
        assert!(settings.notifications.budget_alerts);
    }

    #[test]
    fn test_settings_wire_names() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["preferences"]["dateFormat"], "DD/MM/YYYY");
        assert_eq!(value["security"]["twoFactor"], false);
        assert_eq!(value["profile"]["firstName"], "");
    }
}
