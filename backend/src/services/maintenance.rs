//! Data maintenance: UUID backfill for legacy rows

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use shared::batch::{plan_uuid_backfill, BatchDecision, BatchReport};

/// Tables carrying a public `uuid` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UuidTable {
    Cotizaciones,
    Proveedores,
}

impl UuidTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            UuidTable::Cotizaciones => "contenedor_consolidado_cotizacion",
            UuidTable::Proveedores => "contenedor_consolidado_cotizacion_proveedores",
        }
    }
}

/// Row access for the uuid backfill
#[async_trait]
pub trait UuidStore: Send + Sync {
    /// Ids of rows with a null or blank uuid, ascending
    async fn missing_ids(&self, table: UuidTable) -> AppResult<Vec<i64>>;

    /// Write all assignments in one transaction
    async fn assign_uuids(&self, table: UuidTable, assignments: &[(i64, String)]) -> AppResult<()>;

    async fn count_missing(&self, table: UuidTable) -> AppResult<i64>;
}

pub struct PgUuidStore {
    db: PgPool,
}

impl PgUuidStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UuidStore for PgUuidStore {
    async fn missing_ids(&self, table: UuidTable) -> AppResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE uuid IS NULL OR TRIM(uuid) = '' ORDER BY id",
            table.table_name()
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }

    async fn assign_uuids(&self, table: UuidTable, assignments: &[(i64, String)]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        for (id, uuid) in assignments {
            sqlx::query(&format!(
                "UPDATE {} SET uuid = $2, updated_at = NOW() WHERE id = $1",
                table.table_name()
            ))
            .bind(id)
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count_missing(&self, table: UuidTable) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE uuid IS NULL OR TRIM(uuid) = ''",
            table.table_name()
        ))
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }
}

#[derive(Clone)]
pub struct MaintenanceService {
    store: Arc<dyn UuidStore>,
}

impl MaintenanceService {
    pub fn new(db: PgPool) -> Self {
        Self::with_store(Arc::new(PgUuidStore::new(db)))
    }

    pub fn with_store(store: Arc<dyn UuidStore>) -> Self {
        Self { store }
    }

    pub async fn count_missing_uuids(&self, table: UuidTable) -> AppResult<i64> {
        self.store.count_missing(table).await
    }

    /// Give every row without a uuid a fresh, distinct v4 UUID.
    ///
    /// All writes happen in one transaction. In dry-run the planned values
    /// are only reported. Rows that appear while the run is in progress
    /// surface as a conflict.
    pub async fn backfill_uuids(&self, table: UuidTable, dry_run: bool) -> AppResult<BatchReport> {
        let ids = self.store.missing_ids(table).await?;

        let plan = plan_uuid_backfill(&ids);
        let mut report = BatchReport::new(dry_run);
        report.scanned = ids.len();
        report.decisions = plan
            .iter()
            .map(|(id, uuid)| BatchDecision {
                entity_id: *id,
                from: None,
                to: uuid.clone(),
                reason: "missing uuid".to_string(),
            })
            .collect();

        if dry_run {
            report.changed = plan.len();
            tracing::info!(table = table.table_name(), rows = plan.len(), "Dry-run uuid backfill");
            return Ok(report);
        }

        self.store.assign_uuids(table, &plan).await?;
        report.changed = plan.len();

        let remaining = self.count_missing_uuids(table).await?;
        if remaining > 0 {
            // Rows inserted while the backfill ran
            tracing::warn!(table = table.table_name(), remaining, "Rows still missing uuid");
            return Err(AppError::Conflict {
                resource: table.table_name().to_string(),
                message: format!("{} rows still without uuid", remaining),
                message_es: format!("{} filas siguen sin uuid", remaining),
            });
        }

        tracing::info!(table = table.table_name(), rows = plan.len(), "UUID backfill finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::Mutex;

    /// Rows of one table, with an optional row that shows up mid-run
    #[derive(Default)]
    struct MemoryRows {
        rows: Mutex<BTreeMap<i64, Option<String>>>,
        late_insert: Option<i64>,
    }

    impl MemoryRows {
        fn with(rows: &[(i64, Option<&str>)]) -> Self {
            Self {
                rows: Mutex::new(
                    rows.iter()
                        .map(|(id, uuid)| (*id, uuid.map(str::to_string)))
                        .collect(),
                ),
                late_insert: None,
            }
        }

        fn snapshot(&self) -> BTreeMap<i64, Option<String>> {
            self.rows.lock().unwrap().clone()
        }
    }

    fn is_missing(uuid: &Option<String>) -> bool {
        uuid.as_deref().map_or(true, |u| u.trim().is_empty())
    }

    #[async_trait]
    impl UuidStore for MemoryRows {
        async fn missing_ids(&self, _table: UuidTable) -> AppResult<Vec<i64>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, uuid)| is_missing(uuid))
                .map(|(id, _)| *id)
                .collect())
        }

        async fn assign_uuids(
            &self,
            _table: UuidTable,
            assignments: &[(i64, String)],
        ) -> AppResult<()> {
            let mut rows = self.rows.lock().unwrap();
            for (id, uuid) in assignments {
                rows.insert(*id, Some(uuid.clone()));
            }
            if let Some(id) = self.late_insert {
                rows.insert(id, None);
            }
            Ok(())
        }

        async fn count_missing(&self, _table: UuidTable) -> AppResult<i64> {
            Ok(self.rows.lock().unwrap().values().filter(|u| is_missing(u)).count() as i64)
        }
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_assigning() {
        let rows = Arc::new(MemoryRows::with(&[(1, None), (2, Some("  ")), (3, Some("kept"))]));
        let before = rows.snapshot();
        let service = MaintenanceService::with_store(rows.clone());

        let report = service
            .backfill_uuids(UuidTable::Proveedores, true)
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.changed, 2);
        assert_eq!(
            report.decisions.iter().map(|d| d.entity_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(rows.snapshot(), before);
    }

    #[tokio::test]
    async fn test_backfill_leaves_no_row_without_uuid() {
        let rows = Arc::new(MemoryRows::with(&[(1, None), (2, Some("")), (3, Some("kept")), (4, None)]));
        let service = MaintenanceService::with_store(rows.clone());

        let report = service
            .backfill_uuids(UuidTable::Cotizaciones, false)
            .await
            .unwrap();
        assert_eq!(report.changed, 3);
        assert_eq!(service.count_missing_uuids(UuidTable::Cotizaciones).await.unwrap(), 0);

        let after = rows.snapshot();
        assert_eq!(after[&3].as_deref(), Some("kept"));
        let distinct: HashSet<&str> = after.values().filter_map(|u| u.as_deref()).collect();
        assert_eq!(distinct.len(), 4);
        for id in [1, 2, 4] {
            let uuid = after[&id].as_deref().unwrap();
            assert!(uuid::Uuid::parse_str(uuid).is_ok());
        }
    }

    #[tokio::test]
    async fn test_rows_added_during_backfill_are_a_conflict() {
        let rows = Arc::new(MemoryRows {
            late_insert: Some(9),
            ..MemoryRows::with(&[(1, None)])
        });
        let service = MaintenanceService::with_store(rows);

        let err = service
            .backfill_uuids(UuidTable::Proveedores, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }
}
