use serde::Serialize;
use thiserror::Error;

/// Broad category of a portal failure
///
/// Handlers use the kind to decide where a message is rendered; the JSON
/// endpoint reports it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Validation,
    Forbidden,
    Fetch,
    Filter,
    Upload,
    Config,
}

/// Every failure a portal action can produce
///
/// The `Display` text is the message shown to the user in place of data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PortalError {
    #[error("Incorrect username-password combination.")]
    Authentication,

    #[error("Incorrect passphrase.")]
    Passphrase,

    #[error("Please select a set of months.")]
    EmptySelection,

    #[error("Unknown month: {0}")]
    UnknownMonth(String),

    #[error("Please provide a file to upload.")]
    MissingFile,

    #[error("ERROR uploading file. \n\n only jpg/jpeg images are accepted ({0})")]
    InvalidFile(String),

    #[error("You are not allowed to do that.")]
    Forbidden,

    #[error("ERROR obtaining data. \n\n {period}: {message}")]
    Fetch { period: String, message: String },

    #[error("ERROR filtering data. \n\n {0}")]
    Filter(String),

    #[error("ERROR writing data. \n\n {0}")]
    Projection(String),

    #[error("ERROR uploading file. \n\n {0}")]
    Upload(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Authentication | PortalError::Passphrase => ErrorKind::Authentication,
            PortalError::EmptySelection
            | PortalError::UnknownMonth(_)
            | PortalError::MissingFile
            | PortalError::InvalidFile(_) => ErrorKind::Validation,
            PortalError::Forbidden => ErrorKind::Forbidden,
            PortalError::Fetch { .. } => ErrorKind::Fetch,
            PortalError::Filter(_) | PortalError::Projection(_) => ErrorKind::Filter,
            PortalError::Upload(_) => ErrorKind::Upload,
            PortalError::Config(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_message_carries_period_and_cause() {
        let err = PortalError::Fetch {
            period: "May 2021".to_string(),
            message: "spreadsheet not found".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("ERROR obtaining data."));
        assert!(text.contains("May 2021"));
        assert!(text.contains("spreadsheet not found"));
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[test]
    fn authentication_message_is_generic() {
        assert_eq!(
            PortalError::Authentication.to_string(),
            "Incorrect username-password combination."
        );
        assert_eq!(PortalError::Passphrase.kind(), ErrorKind::Authentication);
    }
}
