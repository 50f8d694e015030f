use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, OrderId, Reservation, ResourceKind, SlotId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::ledger::{Ledger, check_selector, record_reserve};
use crate::{ItemAvailability, LedgerError, ReservationSlot, Result, SlotCounts, SlotStatus};

/// SQL for one slot table.
struct Queries {
    lock_free_for_item: Option<&'static str>,
    lock_free_any: &'static str,
    lock_reserved: &'static str,
    mark_reserved: &'static str,
    mark_booked: &'static str,
    mark_free: &'static str,
    sweep_expired: &'static str,
    select_slot: &'static str,
    count_by_status: &'static str,
    insert_slot: &'static str,
}

const STORE_ITEM_QUERIES: Queries = Queries {
    lock_free_for_item: Some(
        r#"
        SELECT id FROM store_item_reservations
        WHERE status = 'free' AND current_order_id IS NULL AND store_item_id = $1
        ORDER BY id
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    ),
    lock_free_any: r#"
        SELECT id FROM store_item_reservations
        WHERE status = 'free' AND current_order_id IS NULL
        ORDER BY id
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    lock_reserved: r#"
        SELECT id FROM store_item_reservations
        WHERE id = $1 AND status = 'reserved' AND lease = $2
        FOR UPDATE
        "#,
    mark_reserved: r#"
        UPDATE store_item_reservations
        SET status = 'reserved', reserved_at = $2, lease = lease + 1, updated_at = NOW()
        WHERE id = $1
        RETURNING lease
        "#,
    mark_booked: r#"
        UPDATE store_item_reservations
        SET status = 'booked', current_order_id = $2, reserved_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    mark_free: r#"
        UPDATE store_item_reservations
        SET status = 'free', reserved_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    sweep_expired: r#"
        UPDATE store_item_reservations
        SET status = 'free', reserved_at = NULL, updated_at = NOW()
        WHERE id IN (
            SELECT id FROM store_item_reservations
            WHERE status = 'reserved' AND reserved_at < $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id
        "#,
    select_slot: r#"
        SELECT id, store_item_id AS owner_id, status, current_order_id, reserved_at, lease
        FROM store_item_reservations
        WHERE id = $1
        "#,
    count_by_status: r#"
        SELECT status, COUNT(*) AS n FROM store_item_reservations GROUP BY status
        "#,
    insert_slot: r#"
        INSERT INTO store_item_reservations (store_item_id) VALUES ($1) RETURNING id
        "#,
};

const DELIVERY_AGENT_QUERIES: Queries = Queries {
    lock_free_for_item: None,
    lock_free_any: r#"
        SELECT id FROM delivery_agent_reservations
        WHERE status = 'free' AND current_order_id IS NULL
        ORDER BY id
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    lock_reserved: r#"
        SELECT id FROM delivery_agent_reservations
        WHERE id = $1 AND status = 'reserved' AND lease = $2
        FOR UPDATE
        "#,
    mark_reserved: r#"
        UPDATE delivery_agent_reservations
        SET status = 'reserved', reserved_at = $2, lease = lease + 1, updated_at = NOW()
        WHERE id = $1
        RETURNING lease
        "#,
    mark_booked: r#"
        UPDATE delivery_agent_reservations
        SET status = 'booked', current_order_id = $2, reserved_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    mark_free: r#"
        UPDATE delivery_agent_reservations
        SET status = 'free', reserved_at = NULL, updated_at = NOW()
        WHERE id = $1
        "#,
    sweep_expired: r#"
        UPDATE delivery_agent_reservations
        SET status = 'free', reserved_at = NULL, updated_at = NOW()
        WHERE id IN (
            SELECT id FROM delivery_agent_reservations
            WHERE status = 'reserved' AND reserved_at < $1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id
        "#,
    select_slot: r#"
        SELECT id, NULL::BIGINT AS owner_id, status, current_order_id, reserved_at, lease
        FROM delivery_agent_reservations
        WHERE id = $1
        "#,
    count_by_status: r#"
        SELECT status, COUNT(*) AS n FROM delivery_agent_reservations GROUP BY status
        "#,
    insert_slot: r#"
        INSERT INTO delivery_agent_reservations DEFAULT VALUES RETURNING id
        "#,
};

/// PostgreSQL-backed ledger.
///
/// Each operation runs in its own transaction and takes `FOR UPDATE` row
/// locks; reserve and sweep use `SKIP LOCKED` so contenders never wait on
/// each other.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
    kind: ResourceKind,
}

impl PostgresLedger {
    /// Creates a ledger over the slot table of `kind`.
    pub fn new(pool: PgPool, kind: ResourceKind) -> Self {
        Self { pool, kind }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn queries(&self) -> &'static Queries {
        match self.kind {
            ResourceKind::StoreItem => &STORE_ITEM_QUERIES,
            ResourceKind::DeliveryAgent => &DELIVERY_AGENT_QUERIES,
        }
    }

    fn row_to_slot(row: PgRow) -> Result<ReservationSlot> {
        let status: String = row.try_get("status")?;
        Ok(ReservationSlot {
            id: SlotId::new(row.try_get("id")?),
            owner_resource_id: row.try_get::<Option<i64>, _>("owner_id")?.map(ItemId::new),
            status: status.parse()?,
            current_order_id: row
                .try_get::<Option<String>, _>("current_order_id")?
                .map(OrderId::from),
            reserved_at: row.try_get("reserved_at")?,
            lease: row.try_get("lease")?,
        })
    }

    async fn try_reserve(&self, selector: Option<ItemId>) -> Result<Reservation> {
        let queries = self.queries();
        let mut tx = self.pool.begin().await?;

        let candidate: Option<i64> = match selector {
            Some(item_id) => {
                let sql = queries
                    .lock_free_for_item
                    .ok_or(LedgerError::UnsupportedSelector(self.kind))?;
                sqlx::query_scalar(sql)
                    .bind(item_id.as_i64())
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query_scalar(queries.lock_free_any)
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        // Dropping the transaction without commit rolls it back.
        let Some(id) = candidate else {
            return Err(LedgerError::NoAvailability {
                resource: self.kind,
                item_id: selector,
            });
        };

        let lease: Option<i64> = sqlx::query_scalar(queries.mark_reserved)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| LedgerError::Persistence(format!("failed to reserve slot {id}: {e}")))?;
        let Some(lease) = lease else {
            return Err(LedgerError::Persistence(format!(
                "failed to reserve slot {id}"
            )));
        };

        tx.commit().await?;
        Ok(Reservation::new(SlotId::new(id), lease))
    }

    /// Locks the row `reservation` holds and applies `update` to it in one
    /// transaction. Rows reserved under another lease are left untouched.
    async fn transition_reserved(
        &self,
        reservation: Reservation,
        update: &'static str,
        order_id: Option<&OrderId>,
    ) -> Result<()> {
        let slot_id = reservation.slot_id;
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar(self.queries().lock_reserved)
            .bind(slot_id.as_i64())
            .bind(reservation.lease)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(LedgerError::InvalidReservation(slot_id));
        }

        let mut query = sqlx::query(update).bind(slot_id.as_i64());
        if let Some(order_id) = order_id {
            query = query.bind(order_id.as_str());
        }
        let updated = query.execute(&mut *tx).await.map_err(|e| {
            LedgerError::Persistence(format!("failed to update slot {slot_id}: {e}"))
        })?;
        if updated.rows_affected() != 1 {
            return Err(LedgerError::Persistence(format!(
                "failed to update slot {slot_id}"
            )));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn reserve(&self, selector: Option<ItemId>) -> Result<Reservation> {
        check_selector(self.kind, selector)?;
        let result = self.try_reserve(selector).await;
        record_reserve(self.kind, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn book(&self, reservation: Reservation, order_id: &OrderId) -> Result<()> {
        self.transition_reserved(reservation, self.queries().mark_booked, Some(order_id))
            .await?;
        metrics::counter!("ledger_bookings_total", "resource" => self.kind.as_str()).increment(1);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn release(&self, reservation: Reservation) -> Result<()> {
        self.transition_reserved(reservation, self.queries().mark_free, None)
            .await?;
        metrics::counter!("ledger_releases_total", "resource" => self.kind.as_str()).increment(1);
        Ok(())
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SlotId>> {
        let ids: Vec<i64> = sqlx::query_scalar(self.queries().sweep_expired)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        if !ids.is_empty() {
            metrics::counter!("ledger_expired_total", "resource" => self.kind.as_str())
                .increment(ids.len() as u64);
        }
        Ok(ids.into_iter().map(SlotId::new).collect())
    }

    async fn lookup_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>> {
        if !self.kind.has_units() {
            return Ok(None);
        }

        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT i.id, i.name,
                   COUNT(r.id) FILTER (
                       WHERE r.status = 'free' AND r.current_order_id IS NULL
                   ) AS free_slots
            FROM store_items i
            LEFT JOIN store_item_reservations r ON r.store_item_id = i.id
            WHERE i.id = $1
            GROUP BY i.id, i.name
            "#,
        )
        .bind(item_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ItemAvailability {
                item_id: ItemId::new(row.try_get("id")?),
                name: row.try_get("name")?,
                free_slots: row.try_get("free_slots")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_slot(&self, slot_id: SlotId) -> Result<Option<ReservationSlot>> {
        let row: Option<PgRow> = sqlx::query(self.queries().select_slot)
            .bind(slot_id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_slot).transpose()
    }

    async fn counts(&self) -> Result<SlotCounts> {
        let rows = sqlx::query(self.queries().count_by_status)
            .fetch_all(&self.pool)
            .await?;

        let mut counts = SlotCounts::default();
        for row in rows {
            let status: SlotStatus = row.try_get::<String, _>("status")?.parse()?;
            let n: i64 = row.try_get("n")?;
            match status {
                SlotStatus::Free => counts.free = n as u64,
                SlotStatus::Reserved => counts.reserved = n as u64,
                SlotStatus::Booked => counts.booked = n as u64,
            }
        }
        Ok(counts)
    }

    async fn add_item(&self, name: &str) -> Result<ItemId> {
        if !self.kind.has_units() {
            return Err(LedgerError::UnsupportedSelector(self.kind));
        }
        let id: i64 = sqlx::query_scalar("INSERT INTO store_items (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(ItemId::new(id))
    }

    async fn provision(&self, owner: Option<ItemId>, count: usize) -> Result<Vec<SlotId>> {
        check_selector(self.kind, owner)?;
        let mut tx = self.pool.begin().await?;

        if let Some(item_id) = owner {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM store_items WHERE id = $1)")
                    .bind(item_id.as_i64())
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(LedgerError::ItemNotFound(item_id));
            }
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let mut query = sqlx::query_scalar::<_, i64>(self.queries().insert_slot);
            if let Some(item_id) = owner {
                query = query.bind(item_id.as_i64());
            }
            let id: i64 = query.fetch_one(&mut *tx).await?;
            ids.push(SlotId::new(id));
        }

        tx.commit().await?;
        Ok(ids)
    }
}
