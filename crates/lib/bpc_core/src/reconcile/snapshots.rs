// @awa-component: REC-SnapshotRepository
//
//! Stored blueprint snapshots and the event log.
//!
//! `corporation_blueprints` holds the current snapshot per corporation, with
//! `sort_order` preserving fetch order. `reconciliation_events` is
//! append-only; `before`/`after` are JSONB copies of the records.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::Mutex;

use super::ReconcileError;
use crate::models::{Blueprint, CorporationId, ReconciliationEvent};

/// Durable side of reconciliation.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Stored snapshot for a corporation, in stored order. Empty when none.
    async fn load_snapshot(
        &self,
        corporation_id: CorporationId,
    ) -> Result<Vec<Blueprint>, ReconcileError>;

    /// Replace the snapshot and append `events`, all or nothing.
    async fn commit(
        &self,
        corporation_id: CorporationId,
        snapshot: &[Blueprint],
        events: &[ReconciliationEvent],
    ) -> Result<(), ReconcileError>;
}

/// Postgres-backed snapshots.
#[derive(Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type BlueprintRow = (i64, i32, i64, String, i32, i32, i32, i32);

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn load_snapshot(
        &self,
        corporation_id: CorporationId,
    ) -> Result<Vec<Blueprint>, ReconcileError> {
        let rows = sqlx::query_as::<_, BlueprintRow>(
            r#"
            SELECT item_id, type_id, location_id, location_flag, quantity,
                   material_efficiency, time_efficiency, runs
            FROM corporation_blueprints
            WHERE corporation_id = $1
            ORDER BY sort_order
            "#,
        )
        .bind(corporation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(item_id, type_id, location_id, location_flag, quantity, me, te, runs)| Blueprint {
                    item_id,
                    type_id,
                    location_id,
                    location_flag,
                    quantity,
                    material_efficiency: me,
                    time_efficiency: te,
                    runs,
                },
            )
            .collect())
    }

    async fn commit(
        &self,
        corporation_id: CorporationId,
        snapshot: &[Blueprint],
        events: &[ReconciliationEvent],
    ) -> Result<(), ReconcileError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM corporation_blueprints WHERE corporation_id = $1")
            .bind(corporation_id)
            .execute(&mut *tx)
            .await?;

        for (i, bp) in snapshot.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO corporation_blueprints
                    (corporation_id, sort_order, item_id, type_id, location_id, location_flag,
                     quantity, material_efficiency, time_efficiency, runs)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(corporation_id)
            .bind(i as i32)
            .bind(bp.item_id)
            .bind(bp.type_id)
            .bind(bp.location_id)
            .bind(&bp.location_flag)
            .bind(bp.quantity)
            .bind(bp.material_efficiency)
            .bind(bp.time_efficiency)
            .bind(bp.runs)
            .execute(&mut *tx)
            .await?;
        }

        for event in events {
            let before = to_json(corporation_id, &event.before)?;
            let after = to_json(corporation_id, &event.after)?;
            sqlx::query(
                r#"
                INSERT INTO reconciliation_events
                    (id, corporation_id, kind, before, after, observed_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.id)
            .bind(event.corporation_id)
            .bind(event.kind.as_str())
            .bind(before)
            .bind(after)
            .bind(event.observed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn to_json(
    corporation_id: CorporationId,
    record: &Option<Blueprint>,
) -> Result<serde_json::Value, ReconcileError> {
    serde_json::to_value(record).map_err(|e| ReconcileError::Corrupt {
        corporation_id,
        message: e.to_string(),
    })
}

/// Snapshots kept in process memory.
#[derive(Default)]
pub struct InMemorySnapshotRepository {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    snapshots: HashMap<CorporationId, Vec<Blueprint>>,
    events: Vec<ReconciliationEvent>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a corporation's stored snapshot.
    pub async fn seed(&self, corporation_id: CorporationId, snapshot: Vec<Blueprint>) {
        self.inner
            .lock()
            .await
            .snapshots
            .insert(corporation_id, snapshot);
    }

    /// Every committed event, in commit order.
    pub async fn events(&self) -> Vec<ReconciliationEvent> {
        self.inner.lock().await.events.clone()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load_snapshot(
        &self,
        corporation_id: CorporationId,
    ) -> Result<Vec<Blueprint>, ReconcileError> {
        Ok(self
            .inner
            .lock()
            .await
            .snapshots
            .get(&corporation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(
        &self,
        corporation_id: CorporationId,
        snapshot: &[Blueprint],
        events: &[ReconciliationEvent],
    ) -> Result<(), ReconcileError> {
        let mut state = self.inner.lock().await;
        state.snapshots.insert(corporation_id, snapshot.to_vec());
        state.events.extend_from_slice(events);
        Ok(())
    }
}
