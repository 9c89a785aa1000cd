// User-facing app settings

use crate::storage::Storage;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Storage key the settings live under
pub const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Notification toggles. Stored only; nothing is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationSettings {
    pub task_reminders: bool,
    pub due_date_alerts: bool,
    pub overdue_alerts: bool,
    pub collaboration_updates: bool,
    pub daily_summary: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            task_reminders: true,
            due_date_alerts: true,
            overdue_alerts: true,
            collaboration_updates: true,
            daily_summary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub auto_sync: bool,
    pub wifi_only: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            wifi_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrivacySettings {
    pub biometric_login: bool,
    /// Leave completed tasks out of task listings
    pub hide_completed_tasks: bool,
    pub private_collaboration: bool,
    pub data_collection: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            biometric_login: false,
            hide_completed_tasks: false,
            private_collaboration: true,
            data_collection: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: ThemeMode,
    pub notifications: NotificationSettings,
    pub sync: SyncSettings,
    pub privacy: PrivacySettings,
    pub profile: Profile,
}

impl Settings {
    /// Load settings from storage, falling back to defaults on any failure
    pub fn load(storage: &dyn Storage) -> Self {
        match Self::try_load(storage) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = ?e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    fn try_load(storage: &dyn Storage) -> Result<Option<Self>> {
        let Some(text) = storage.get(SETTINGS_KEY)? else {
            return Ok(None);
        };
        let settings = serde_json::from_str(&text).context("Failed to parse settings")?;
        Ok(Some(settings))
    }

    pub fn save(&self, storage: &mut dyn Storage) -> Result<()> {
        let text = serde_json::to_string(self).context("Failed to serialize settings")?;
        storage.put(SETTINGS_KEY, &text)
    }

    /// Set one setting by its dotted name, e.g. `notifications.daily_summary`
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "theme" => {
                self.theme = match value {
                    "light" => ThemeMode::Light,
                    "dark" => ThemeMode::Dark,
                    "system" => ThemeMode::System,
                    other => return Err(eyre!("Unknown theme: {} (expected light, dark or system)", other)),
                }
            }
            "notifications.task_reminders" => self.notifications.task_reminders = parse_bool(value)?,
            "notifications.due_date_alerts" => self.notifications.due_date_alerts = parse_bool(value)?,
            "notifications.overdue_alerts" => self.notifications.overdue_alerts = parse_bool(value)?,
            "notifications.collaboration_updates" => {
                self.notifications.collaboration_updates = parse_bool(value)?
            }
            "notifications.daily_summary" => self.notifications.daily_summary = parse_bool(value)?,
            "sync.auto_sync" => self.sync.auto_sync = parse_bool(value)?,
            "sync.wifi_only" => self.sync.wifi_only = parse_bool(value)?,
            "privacy.biometric_login" => self.privacy.biometric_login = parse_bool(value)?,
            "privacy.hide_completed_tasks" => self.privacy.hide_completed_tasks = parse_bool(value)?,
            "privacy.private_collaboration" => self.privacy.private_collaboration = parse_bool(value)?,
            "privacy.data_collection" => self.privacy.data_collection = parse_bool(value)?,
            "profile.name" => self.profile.name = value.to_string(),
            "profile.email" => self.profile.email = value.to_string(),
            other => return Err(eyre!("Unknown setting: {}", other)),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(eyre!("Expected a boolean, got: {}", other)),
    }
}
