use serde::Serialize;

/// One worksheet of string cells with a named header
///
/// Built from the raw values of a worksheet; row 0 becomes the column
/// names. Every row holds exactly one cell per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PeriodTable {
    /// Build a table from worksheet values, header first
    ///
    /// The Sheets API drops trailing empty cells, so short rows are padded
    /// with empty strings; cells beyond the header width are dropped.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Result<Self, String> {
        if values.is_empty() {
            return Err("worksheet is empty".to_string());
        }
        let columns = values.remove(0);
        if columns.is_empty() {
            return Err("worksheet has no header row".to_string());
        }

        let width = columns.len();
        let rows = values
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(PeriodTable { columns, rows })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Indices of `names`, or the first name that is missing
    pub fn column_indices(&self, names: &[String]) -> Result<Vec<usize>, String> {
        names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| format!("column '{}' not found", name))
            })
            .collect()
    }
}

/// Combined per-period result, transposed for display
///
/// `columns` holds one period label per stacked source row; `rows` holds
/// one entry per display field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub rows: Vec<MergedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub field: String,
    pub cells: Vec<String>,
}

impl MergedTable {
    /// Cell for display field `field` under the `index`th column
    pub fn cell(&self, field: &str, index: usize) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.field == field)
            .and_then(|row| row.cells.get(index))
            .map(String::as_str)
    }
}

/// One period shown as-is after column projection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedTable {
    pub period: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    #[test]
    fn first_row_becomes_header() {
        let table =
            PeriodTable::from_values(values(&[&["User", "Hours"], &["alice", "10"]])).unwrap();
        assert_eq!(table.columns, vec!["User", "Hours"]);
        assert_eq!(table.rows, vec![vec!["alice", "10"]]);
        assert_eq!(table.column_index("Hours"), Some(1));
    }

    #[test]
    fn ragged_rows_are_squared_to_header() {
        let table = PeriodTable::from_values(values(&[
            &["User", "Hours", "Pay"],
            &["alice"],
            &["bob", "3", "30", "extra"],
        ]))
        .unwrap();
        assert_eq!(table.rows[0], vec!["alice", "", ""]);
        assert_eq!(table.rows[1], vec!["bob", "3", "30"]);
    }

    #[test]
    fn empty_worksheet_is_an_error() {
        assert!(PeriodTable::from_values(Vec::new()).is_err());
        assert!(PeriodTable::from_values(vec![Vec::new()]).is_err());
    }

    #[test]
    fn missing_column_is_named() {
        let table = PeriodTable::from_values(values(&[&["User"]])).unwrap();
        let err = table
            .column_indices(&["User".to_string(), "Pay".to_string()])
            .unwrap_err();
        assert!(err.contains("'Pay'"));
    }
}
