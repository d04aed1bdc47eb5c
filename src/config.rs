use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::{PortalError, Result};
use crate::months::RESERVED_MONTH_SLOTS;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "PORTAL_CONFIG";
/// Config file used when `PORTAL_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/portal.json";

/// Read-only configuration and secrets bundle
///
/// Loaded once at start-up and shared behind an `Arc` for the lifetime of
/// the process. Field names follow the keys of the JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Main-user accounts: normalized username -> plain or argon2 secret
    pub accounts: HashMap<String, String>,

    /// SHA-256 hex digest of the normalized admin username
    pub admin_user: String,

    /// SHA-256 hex digest of the normalized admin password
    pub admin_pass: String,

    /// Months offered to main users, including the two reserved slots
    pub avail_months_main: Vec<String>,

    /// Months offered to admins, including the two reserved slots
    pub avail_months_admin: Vec<String>,

    pub main_cols: Vec<String>,
    pub main_cols_disp: Vec<String>,
    pub admin_cols: Vec<String>,
    pub admin_cols_disp: Vec<String>,

    /// Column matched against a main user's identity
    pub col_user: String,

    /// Column matched against the account an admin picks
    pub col_account: String,

    /// Account id -> display name shown in the admin account picker
    #[serde(default)]
    pub selections: BTreeMap<String, String>,

    /// Destination folder for uploads
    pub folder_id: String,

    #[serde(default)]
    pub simple: Option<SimpleConfig>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub google: GoogleConfig,
}

/// Settings for the passphrase-only page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleConfig {
    /// SHA-256 hex digest of the normalized passphrase
    pub passphrase: String,
    pub avail_months: Vec<String>,
    pub cols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session_hours: u64,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            session_hours: 24,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Environment variable holding the OAuth bearer token
    pub token_env: String,
    pub drive_api: String,
    pub sheets_api: String,
    pub upload_api: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            token_env: "GOOGLE_ACCESS_TOKEN".to_string(),
            drive_api: "https://www.googleapis.com/drive/v3".to_string(),
            sheets_api: "https://sheets.googleapis.com/v4".to_string(),
            upload_api: "https://www.googleapis.com/upload/drive/v2".to_string(),
        }
    }
}

impl PortalConfig {
    /// Load the config from the path in `PORTAL_CONFIG`, or the default path
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    /// Read, parse and validate a config file
    ///
    /// # Errors
    /// * `PortalError::Config` if the file cannot be read, is not valid JSON
    ///   for this schema, or fails [`PortalConfig::validate`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            PortalError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: PortalConfig = serde_json::from_str(contents)
            .map_err(|e| PortalError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<()> {
        check_rename("main_cols", &self.main_cols, &self.main_cols_disp)?;
        check_rename("admin_cols", &self.admin_cols, &self.admin_cols_disp)?;

        for (name, months) in [
            ("avail_months_main", &self.avail_months_main),
            ("avail_months_admin", &self.avail_months_admin),
        ] {
            if months.len() < RESERVED_MONTH_SLOTS {
                return Err(PortalError::Config(format!(
                    "{} needs at least {} reserved entries",
                    name, RESERVED_MONTH_SLOTS
                )));
            }
        }

        if self.admin_user.len() != 64 || self.admin_pass.len() != 64 {
            return Err(PortalError::Config(
                "admin_user and admin_pass must be SHA-256 hex digests".to_string(),
            ));
        }

        if let Some(simple) = &self.simple {
            if simple.cols.is_empty() {
                return Err(PortalError::Config("simple.cols cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Reverse of `selections`: display name -> account id
    pub fn account_for_selection(&self, display: &str) -> Option<&str> {
        self.selections
            .iter()
            .find(|(_, shown)| shown.as_str() == display)
            .map(|(id, _)| id.as_str())
    }
}

fn check_rename(name: &str, cols: &[String], disp: &[String]) -> Result<()> {
    if cols.len() != disp.len() {
        return Err(PortalError::Config(format!(
            "{} has {} entries but {}_disp has {}",
            name,
            cols.len(),
            name,
            disp.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// A small but complete config used across the crate's tests
    pub(crate) fn sample_json() -> String {
        serde_json::json!({
            "accounts": { "alice": "secret", "bob": "hunter2" },
            "admin_user": crate::login::sha256_hex("root"),
            "admin_pass": crate::login::sha256_hex("toor"),
            "avail_months_main": ["", "All", "April 2021", "May 2021"],
            "avail_months_admin": ["", "All", "March 2021", "April 2021", "May 2021"],
            "main_cols": ["User", "Hours", "Pay"],
            "main_cols_disp": ["Name", "Hours worked", "Pay (USD)"],
            "admin_cols": ["Account", "User", "Hours"],
            "admin_cols_disp": ["Account", "Name", "Hours worked"],
            "col_user": "User",
            "col_account": "Account",
            "selections": { "A-100": "North shop", "A-200": "South shop" },
            "folder_id": "folder-xyz",
            "simple": {
                "passphrase": crate::login::sha256_hex("open sesame"),
                "avail_months": ["April 2021", "May 2021"],
                "cols": ["User", "Hours"]
            }
        })
        .to_string()
    }

    pub(crate) fn sample() -> PortalConfig {
        PortalConfig::from_json(&sample_json()).unwrap()
    }

    #[test]
    fn loads_from_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.server.session_hours, 24);
        assert_eq!(config.google.token_env, "GOOGLE_ACCESS_TOKEN");
        assert_eq!(config.accounts.get("alice").map(String::as_str), Some("secret"));
    }

    #[test]
    fn rejects_mismatched_display_names() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_json()).unwrap();
        value["main_cols_disp"] = serde_json::json!(["Name"]);
        let err = PortalConfig::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, PortalError::Config(msg) if msg.contains("main_cols")));
    }

    #[test]
    fn rejects_month_list_without_reserved_slots() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_json()).unwrap();
        value["avail_months_admin"] = serde_json::json!(["All"]);
        assert!(PortalConfig::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = PortalConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[test]
    fn maps_selection_back_to_account() {
        let config = sample();
        assert_eq!(config.account_for_selection("South shop"), Some("A-200"));
        assert_eq!(config.account_for_selection("Nowhere"), None);
    }
}
