use crate::error::{PortalError, Result};

/// Selection sentinel meaning "every month available to this role"
pub const ALL: &str = "All";

/// Leading entries of a configured month list that are not real months
///
/// Slot 0 is a UI-only placeholder, slot 1 is the `All` entry itself.
pub const RESERVED_MONTH_SLOTS: usize = 2;

/// Months offered in the selector: everything after the placeholder slot
pub fn selectable_months(configured: &[String]) -> &[String] {
    configured.get(1..).unwrap_or(&[])
}

/// Every real month in a configured list
pub fn all_months(configured: &[String]) -> &[String] {
    configured.get(RESERVED_MONTH_SLOTS..).unwrap_or(&[])
}

/// Expand an `All` selection into the role's full month list
///
/// Without `All` the selection is returned in its own order. Repeated
/// labels are kept once, at their first position.
pub fn resolve_months(selection: &[String], configured: &[String]) -> Vec<String> {
    let months = if selection.iter().any(|month| month == ALL) {
        all_months(configured)
    } else {
        selection
    };

    let mut resolved: Vec<String> = Vec::with_capacity(months.len());
    for month in months {
        if !resolved.contains(month) {
            resolved.push(month.clone());
        }
    }
    resolved
}

/// Reject empty selections and labels the selector never offered, then resolve
///
/// # Errors
/// * `PortalError::EmptySelection` if nothing but blanks was picked
/// * `PortalError::UnknownMonth` for the first label outside
///   [`selectable_months`] of `configured`
pub fn checked_months(selection: &[String], configured: &[String]) -> Result<Vec<String>> {
    let picked: Vec<String> = selection
        .iter()
        .filter(|month| !month.trim().is_empty())
        .cloned()
        .collect();
    if picked.is_empty() {
        return Err(PortalError::EmptySelection);
    }

    let offered = selectable_months(configured);
    if let Some(unknown) = picked.iter().find(|month| !offered.contains(month)) {
        return Err(PortalError::UnknownMonth(unknown.clone()));
    }

    Ok(resolve_months(&picked, configured))
}
