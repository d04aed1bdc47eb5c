use crate::error::{PortalError, Result};
use crate::fetcher::PeriodBatch;
use crate::table::{MergedRow, MergedTable, PeriodTable, ProjectedTable};

/// Placeholder cell used when a period has no matching row
pub const NOT_FOUND: &str = "data not found";

/// Which rows to keep and how to show their columns
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    target_value: String,
    match_column: String,
    keep_columns: Vec<String>,
    display_names: Vec<String>,
}

impl FilterSpec {
    /// Build a filter; `display_names` renames `keep_columns` by position
    ///
    /// # Errors
    /// * `PortalError::Filter` if the two lists differ in length
    pub fn new(
        target_value: impl Into<String>,
        match_column: impl Into<String>,
        keep_columns: &[String],
        display_names: &[String],
    ) -> Result<Self> {
        if keep_columns.len() != display_names.len() {
            return Err(PortalError::Filter(format!(
                "{} display names for {} columns",
                display_names.len(),
                keep_columns.len()
            )));
        }
        Ok(FilterSpec {
            target_value: target_value.into(),
            match_column: match_column.into(),
            keep_columns: keep_columns.to_vec(),
            display_names: display_names.to_vec(),
        })
    }

    pub fn target_value(&self) -> &str {
        &self.target_value
    }
}

/// Filter every period to the target rows, then merge and transpose
///
/// A period without a match contributes one row of [`NOT_FOUND`] cells so
/// that every period still shows up as a column.
///
/// # Errors
/// * `PortalError::Filter` if a needed column is missing from a period or
///   the batch is empty
pub fn filter_periods(batch: &PeriodBatch, spec: &FilterSpec) -> Result<MergedTable> {
    if batch.is_empty() {
        return Err(PortalError::Filter("no objects to concatenate".to_string()));
    }

    let mut stacked: Vec<(&str, Vec<String>)> = Vec::new();
    for (period, table) in batch.iter() {
        for row in filter_one(table, spec).map_err(|e| in_period(period, e))? {
            stacked.push((period, row));
        }
    }

    Ok(transpose(&spec.display_names, &stacked))
}

/// Project every period to the display columns without filtering rows
///
/// # Errors
/// * `PortalError::Projection` if a needed column is missing
pub fn project_periods(
    batch: &PeriodBatch,
    keep_columns: &[String],
    display_names: &[String],
) -> Result<Vec<ProjectedTable>> {
    batch
        .iter()
        .map(|(period, table)| {
            let indices = table
                .column_indices(keep_columns)
                .map_err(|e| PortalError::Projection(format!("{}: {}", period, e)))?;
            Ok(ProjectedTable {
                period: period.to_string(),
                columns: display_names.to_vec(),
                rows: table.rows.iter().map(|row| pick(row, &indices)).collect(),
            })
        })
        .collect()
}

fn filter_one(table: &PeriodTable, spec: &FilterSpec) -> std::result::Result<Vec<Vec<String>>, String> {
    let match_idx = table
        .column_index(&spec.match_column)
        .ok_or_else(|| format!("column '{}' not found", spec.match_column))?;
    let keep = table.column_indices(&spec.keep_columns)?;

    let matching: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|row| row[match_idx] == spec.target_value)
        .collect();

    if matching.is_empty() {
        let placeholder = vec![NOT_FOUND.to_string(); table.width()];
        return Ok(vec![pick(&placeholder, &keep)]);
    }

    Ok(matching.into_iter().map(|row| pick(row, &keep)).collect())
}

fn pick(row: &[String], indices: &[usize]) -> Vec<String> {
    indices.iter().map(|&i| row[i].clone()).collect()
}

fn transpose(fields: &[String], stacked: &[(&str, Vec<String>)]) -> MergedTable {
    let columns = stacked.iter().map(|(period, _)| period.to_string()).collect();
    let rows = fields
        .iter()
        .enumerate()
        .map(|(i, field)| MergedRow {
            field: field.clone(),
            cells: stacked.iter().map(|(_, row)| row[i].clone()).collect(),
        })
        .collect();
    MergedTable { columns, rows }
}

fn in_period(period: &str, message: String) -> PortalError {
    PortalError::Filter(format!("{}: {}", period, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table(rows: &[&[&str]]) -> Arc<PeriodTable> {
        let values = rows.iter().map(|row| strings(row)).collect();
        Arc::new(PeriodTable::from_values(values).unwrap())
    }

    fn april() -> Arc<PeriodTable> {
        table(&[
            &["User", "Hours", "Pay", "Notes"],
            &["alice", "10", "100", "x"],
            &["bob", "5", "50", "y"],
            &["alice", "2", "20", "z"],
        ])
    }

    fn spec(target: &str) -> FilterSpec {
        FilterSpec::new(
            target,
            "User",
            &strings(&["Pay", "User"]),
            &strings(&["Pay (USD)", "Name"]),
        )
        .unwrap()
    }

    #[test]
    fn keeps_only_matching_rows_in_display_order() {
        let mut batch = PeriodBatch::default();
        batch.push("April 2021".to_string(), april());

        let merged = filter_periods(&batch, &spec("alice")).unwrap();
        assert_eq!(merged.columns, vec!["April 2021", "April 2021"]);
        let fields: Vec<&str> = merged.rows.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(fields, vec!["Pay (USD)", "Name"]);
        assert_eq!(merged.rows[0].cells, vec!["100", "20"]);
        assert_eq!(merged.rows[1].cells, vec!["alice", "alice"]);
    }

    #[test]
    fn missing_target_gives_one_placeholder_row() {
        let mut batch = PeriodBatch::default();
        batch.push("April 2021".to_string(), april());

        let merged = filter_periods(&batch, &spec("carol")).unwrap();
        assert_eq!(merged.columns.len(), 1);
        assert_eq!(merged.rows.len(), 2);
        assert!(merged.rows.iter().all(|r| r.cells == vec![NOT_FOUND]));
    }

    #[test]
    fn one_column_per_period_after_transpose() {
        let mut batch = PeriodBatch::default();
        batch.push(
            "March 2021".to_string(),
            table(&[&["User", "Hours", "Pay"], &["bob", "1", "10"]]),
        );
        batch.push(
            "April 2021".to_string(),
            table(&[&["User", "Pay", "Hours"], &["bob", "70", "7"]]),
        );
        batch.push(
            "May 2021".to_string(),
            table(&[&["User", "Pay"], &["alice", "1"]]),
        );

        let merged = filter_periods(&batch, &spec("bob")).unwrap();
        assert_eq!(merged.columns, vec!["March 2021", "April 2021", "May 2021"]);
        assert_eq!(merged.rows.len(), 2);
        assert_eq!(merged.cell("Pay (USD)", 1), Some("70"));
        assert_eq!(merged.cell("Name", 2), Some(NOT_FOUND));
    }

    #[test]
    fn missing_column_is_reported_not_raised() {
        let mut batch = PeriodBatch::default();
        batch.push("April 2021".to_string(), table(&[&["User"], &["alice"]]));

        let err = filter_periods(&batch, &spec("alice")).unwrap_err();
        match err {
            PortalError::Filter(msg) => {
                assert!(msg.contains("April 2021"));
                assert!(msg.contains("'Pay'"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_batch_is_a_filter_error() {
        let err = filter_periods(&PeriodBatch::default(), &spec("alice")).unwrap_err();
        assert!(matches!(err, PortalError::Filter(_)));
    }

    #[test]
    fn spec_rejects_mismatched_rename() {
        let err = FilterSpec::new("a", "User", &strings(&["Pay"]), &strings(&[])).unwrap_err();
        assert!(matches!(err, PortalError::Filter(_)));
    }

    #[test]
    fn projection_keeps_every_row() {
        let mut batch = PeriodBatch::default();
        batch.push("April 2021".to_string(), april());

        let tables =
            project_periods(&batch, &strings(&["User", "Hours"]), &strings(&["Name", "Hours"]))
                .unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns, vec!["Name", "Hours"]);
        assert_eq!(tables[0].rows.len(), 3);
        assert_eq!(tables[0].rows[1], vec!["bob", "5"]);

        let err = project_periods(&batch, &strings(&["Missing"]), &strings(&["M"])).unwrap_err();
        assert!(matches!(err, PortalError::Projection(_)));
    }
}
