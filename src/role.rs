use serde::Serialize;

use crate::config::PortalConfig;

/// What a logged-in user is allowed to see and do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees only rows matching their own identity
    Main,
    /// Sees every account and may upload images
    Admin,
}

/// The slice of configuration a role works with
#[derive(Debug, Clone, Copy)]
pub struct RoleView<'a> {
    pub role: Role,
    pub months: &'a [String],
    pub keep_columns: &'a [String],
    pub display_names: &'a [String],
    pub match_column: &'a str,
}

impl Role {
    pub fn view<'a>(&self, config: &'a PortalConfig) -> RoleView<'a> {
        match self {
            Role::Main => RoleView {
                role: *self,
                months: &config.avail_months_main,
                keep_columns: &config.main_cols,
                display_names: &config.main_cols_disp,
                match_column: &config.col_user,
            },
            Role::Admin => RoleView {
                role: *self,
                months: &config.avail_months_admin,
                keep_columns: &config.admin_cols,
                display_names: &config.admin_cols_disp,
                match_column: &config.col_account,
            },
        }
    }

    pub fn can_upload(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_pick_account(&self) -> bool {
        matches!(self, Role::Admin)
    }
}
