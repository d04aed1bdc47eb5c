#![cfg(feature = "web")]

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{PortalError, Result};
use crate::table::{MergedTable, ProjectedTable};

/// Flash shown under a form
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// `error` or `success`, used as the CSS class
    pub kind: &'static str,
    pub text: String,
}

impl Message {
    pub fn error(text: impl Into<String>) -> Self {
        Message {
            kind: "error",
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Message {
            kind: "success",
            text: text.into(),
        }
    }
}

impl From<&PortalError> for Message {
    fn from(err: &PortalError) -> Self {
        Message::error(err.to_string())
    }
}

/// One `<option>` of a select box
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: String,
    pub selected: bool,
}

/// Turn `values` into options, marking those in `selected`
pub fn choices(values: &[String], selected: &[String]) -> Vec<Choice> {
    values
        .iter()
        .map(|value| Choice {
            value: value.clone(),
            selected: selected.contains(value),
        })
        .collect()
}

#[derive(Debug, Default, Serialize)]
pub struct LoginView {
    pub error: Option<String>,
    pub show_simple: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardView {
    pub months: Vec<Choice>,
    pub accounts: Vec<Choice>,
    pub can_upload: bool,
    pub data_message: Option<Message>,
    pub merged: Option<MergedTable>,
    pub tables: Vec<ProjectedTable>,
    pub upload_message: Option<Message>,
}

#[derive(Debug, Default, Serialize)]
pub struct SimpleView {
    pub months: Vec<Choice>,
    pub data_open: bool,
    pub data_message: Option<Message>,
    pub table: Option<ProjectedTable>,
    pub upload_open: bool,
    pub upload_message: Option<Message>,
}

/// Handlebars registry holding every page template
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        for (name, source) in [
            ("login", include_str!("./templates/login.hbs")),
            ("dashboard", include_str!("./templates/dashboard.hbs")),
            ("simple", include_str!("./templates/simple.hbs")),
        ] {
            registry
                .register_template_string(name, source)
                .map_err(|e| PortalError::Config(format!("template {}: {}", name, e)))?;
        }

        Ok(Pages { registry })
    }

    pub fn login(&self, view: &LoginView) -> std::result::Result<String, String> {
        self.render("login", view)
    }

    pub fn dashboard(&self, view: &DashboardView) -> std::result::Result<String, String> {
        self.render("dashboard", view)
    }

    pub fn simple(&self, view: &SimpleView) -> std::result::Result<String, String> {
        self.render("simple", view)
    }

    fn render<T: Serialize>(&self, name: &str, view: &T) -> std::result::Result<String, String> {
        self.registry
            .render(name, view)
            .map_err(|e| format!("failed to render {}: {}", name, e))
    }
}
