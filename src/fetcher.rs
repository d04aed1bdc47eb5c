use async_trait::async_trait;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{PortalError, Result};
use crate::table::PeriodTable;

/// A remote source of worksheets, looked up by resource name
#[async_trait]
pub trait TableSource: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// All values of the first worksheet of `resource`, header row first
    async fn worksheet_values(
        &self,
        resource: &str,
    ) -> std::result::Result<Vec<Vec<String>>, String>;
}

/// Resource name for a period label ("April 2021" -> "April_2021")
pub fn resource_name(period: &str) -> String {
    period.replace(' ', "_")
}

/// Fetched tables in the order their periods were requested
#[derive(Debug, Clone, Default)]
pub struct PeriodBatch {
    entries: Vec<(String, Arc<PeriodTable>)>,
}

impl PeriodBatch {
    /// Append a period; a label already in the batch keeps its first table
    pub fn push(&mut self, period: String, table: Arc<PeriodTable>) {
        if self.entries.iter().any(|(label, _)| *label == period) {
            return;
        }
        self.entries.push((period, table));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PeriodTable)> {
        self.entries
            .iter()
            .map(|(period, table)| (period.as_str(), table.as_ref()))
    }

    pub fn periods(&self) -> Vec<&str> {
        self.entries.iter().map(|(period, _)| period.as_str()).collect()
    }

    pub fn get(&self, period: &str) -> Option<&PeriodTable> {
        self.iter()
            .find(|(label, _)| *label == period)
            .map(|(_, table)| table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide cache of fetched tables, keyed by period label
///
/// Cleared on logout.
#[derive(Default)]
pub struct FetchCache {
    tables: RwLock<HashMap<String, Arc<PeriodTable>>>,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, period: &str) -> Option<Arc<PeriodTable>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(period).cloned()
    }

    pub fn insert(&self, period: &str, table: Arc<PeriodTable>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.insert(period.to_string(), table);
    }

    pub fn clear(&self) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch one table per period, stopping at the first failure
///
/// Cached tables are reused; freshly fetched ones are cached. A failure on
/// any period discards the whole batch.
///
/// # Errors
/// * `PortalError::Fetch` naming the failing period with the source's
///   message, or the reason its values could not form a table
pub async fn fetch_periods(
    source: &dyn TableSource,
    cache: &FetchCache,
    periods: &[String],
) -> Result<PeriodBatch> {
    let mut batch = PeriodBatch::default();

    for period in periods {
        if let Some(table) = cache.get(period) {
            debug!("cache hit for {}", period);
            batch.push(period.clone(), table);
            continue;
        }

        let resource = resource_name(period);
        let table = source
            .worksheet_values(&resource)
            .await
            .and_then(PeriodTable::from_values)
            .map_err(|message| {
                error!(
                    "fetch of {} from {} failed: {}",
                    resource,
                    source.backend_tag(),
                    message
                );
                PortalError::Fetch {
                    period: period.clone(),
                    message,
                }
            })?;

        let table = Arc::new(table);
        cache.insert(period, table.clone());
        batch.push(period.clone(), table);
    }

    info!(
        "fetched {} period(s) from {}",
        batch.len(),
        source.backend_tag()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::MemorySource;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn source() -> MemorySource {
        let source = MemorySource::new();
        source.put(
            "April_2021",
            vec![
                vec!["User".to_string(), "Hours".to_string()],
                vec!["alice".to_string(), "10".to_string()],
            ],
        );
        source
    }

    #[test]
    fn spaces_become_underscores() {
        assert_eq!(resource_name("April 2021"), "April_2021");
        assert_eq!(resource_name("Q1"), "Q1");
    }

    #[tokio::test]
    async fn failure_on_second_period_yields_single_error() {
        let source = source();
        source.fail("May_2021", "permission denied");
        let cache = FetchCache::new();

        let err = fetch_periods(&source, &cache, &labels(&["April 2021", "May 2021"]))
            .await
            .unwrap_err();
        match err {
            PortalError::Fetch { period, message } => {
                assert_eq!(period, "May 2021");
                assert_eq!(message, "permission denied");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_keeps_request_order_and_uses_cache() {
        let source = source();
        source.put(
            "May_2021",
            vec![vec!["User".to_string()], vec!["bob".to_string()]],
        );
        let cache = FetchCache::new();

        let batch = fetch_periods(&source, &cache, &labels(&["May 2021", "April 2021"]))
            .await
            .unwrap();
        assert_eq!(batch.periods(), vec!["May 2021", "April 2021"]);
        assert_eq!(source.calls(), 2);

        let again = fetch_periods(&source, &cache, &labels(&["April 2021"]))
            .await
            .unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(source.calls(), 2);

        cache.clear();
        fetch_periods(&source, &cache, &labels(&["April 2021"]))
            .await
            .unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn repeated_period_gives_one_entry() {
        let source = source();
        let cache = FetchCache::new();

        let batch = fetch_periods(&source, &cache, &labels(&["April 2021", "April 2021"]))
            .await
            .unwrap();
        assert_eq!(batch.periods(), vec!["April 2021"]);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn empty_worksheet_is_a_fetch_error() {
        let source = source();
        source.put("June_2021", Vec::new());
        let err = fetch_periods(&source, &FetchCache::new(), &labels(&["June 2021"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Fetch { .. }));
    }
}
