// Postgres-backed persistence gateway

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

use fieldops_shared::{
    Client, ContactPerson, Contract, EquipmentUnit, Location, RecurrenceUnit, WorkOrder,
    WORK_TYPE_RECURRING_REVIEW,
};

use super::{PersistenceGateway, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ContractRow {
    id: Uuid,
    client_id: Uuid,
    name: String,
    recurrence_interval: Option<i32>,
    recurrence_unit: Option<String>,
    recurrence_day_of_month: Option<i32>,
    start_date: Option<NaiveDate>,
    days_before_work: i32,
    equipment_ids: Vec<Uuid>,
    location_names: Vec<String>,
    location_name: Option<String>,
    last_auto_work_generated: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl ContractRow {
    fn into_contract(self) -> Contract {
        let recurrence_unit = match self.recurrence_unit.as_deref() {
            Some(raw) => match raw.parse::<RecurrenceUnit>() {
                Ok(unit) => Some(unit),
                Err(_) => {
                    warn!("Contract {} has unknown recurrence unit '{}'", self.id, raw);
                    None
                }
            },
            None => None,
        };

        Contract {
            id: self.id,
            client_id: self.client_id,
            name: self.name,
            recurrence_interval: self.recurrence_interval,
            recurrence_unit,
            recurrence_day_of_month: self
                .recurrence_day_of_month
                .and_then(|d| u32::try_from(d).ok()),
            start_date: self.start_date,
            days_before_work: self.days_before_work,
            equipment_ids: self.equipment_ids.into_iter().collect::<HashSet<_>>(),
            location_names: self.location_names,
            location_name: self.location_name,
            last_auto_work_generated: self.last_auto_work_generated,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    email: Option<String>,
}

#[derive(Debug, FromRow)]
struct EquipmentRow {
    id: Uuid,
    location_id: Uuid,
    code: String,
    description: Option<String>,
}

#[derive(Debug, FromRow)]
struct ContactRow {
    location_id: Uuid,
    name: String,
    phone: Option<String>,
    email: Option<String>,
}

const CONTRACT_COLUMNS: &str = "id, client_id, name, recurrence_interval, recurrence_unit, \
     recurrence_day_of_month, start_date, days_before_work, equipment_ids, \
     location_names, location_name, last_auto_work_generated, is_active, created_at";

const WORK_ORDER_COLUMNS: &str = "id, contract_id, client_id, location_name, equipment_ids, \
     work_type, status, scheduled_for, auto_generated, contact_name, contact_phone, \
     contact_email, generated_at";

#[async_trait]
impl PersistenceGateway for PostgresGateway {
    async fn list_contracts_with_recurrence(&self) -> Result<Vec<Contract>, StoreError> {
        let rows = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts
             WHERE is_active = true AND recurrence_interval IS NOT NULL
             ORDER BY created_at ASC",
            CONTRACT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ContractRow::into_contract).collect())
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError> {
        let row = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {} FROM contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ContractRow::into_contract))
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        let client = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT id, name, created_at FROM clients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((client_id, client_name, created_at)) = client else {
            return Ok(None);
        };

        let location_rows = sqlx::query_as::<_, LocationRow>(
            "SELECT id, name, email FROM locations WHERE client_id = $1 ORDER BY position ASC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        let location_ids: Vec<Uuid> = location_rows.iter().map(|l| l.id).collect();

        let equipment_rows = sqlx::query_as::<_, EquipmentRow>(
            "SELECT id, location_id, code, description FROM location_equipment
             WHERE location_id = ANY($1) ORDER BY position ASC",
        )
        .bind(&location_ids)
        .fetch_all(&self.pool)
        .await?;

        let contact_rows = sqlx::query_as::<_, ContactRow>(
            "SELECT location_id, name, phone, email FROM location_contacts
             WHERE location_id = ANY($1) ORDER BY position ASC",
        )
        .bind(&location_ids)
        .fetch_all(&self.pool)
        .await?;

        let locations = location_rows
            .into_iter()
            .map(|loc| Location {
                equipment: equipment_rows
                    .iter()
                    .filter(|e| e.location_id == loc.id)
                    .map(|e| EquipmentUnit {
                        id: e.id,
                        code: e.code.clone(),
                        description: e.description.clone(),
                    })
                    .collect(),
                contacts: contact_rows
                    .iter()
                    .filter(|c| c.location_id == loc.id)
                    .map(|c| ContactPerson {
                        name: c.name.clone(),
                        phone: c.phone.clone(),
                        email: c.email.clone(),
                    })
                    .collect(),
                name: loc.name,
                email: loc.email,
            })
            .collect();

        Ok(Some(Client {
            id: client_id,
            name: client_name,
            locations,
            created_at,
        }))
    }

    async fn find_auto_generated_work_order(
        &self,
        contract_id: Uuid,
        location_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<WorkOrder>, StoreError> {
        let order = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {} FROM work_orders
             WHERE contract_id = $1
               AND location_name = $2
               AND auto_generated = true
               AND work_type = $3
               AND scheduled_for >= $4
               AND scheduled_for < $5
             LIMIT 1",
            WORK_ORDER_COLUMNS
        ))
        .bind(contract_id)
        .bind(location_name)
        .bind(WORK_TYPE_RECURRING_REVIEW)
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn create_work_order(&self, order: &WorkOrder) -> Result<Uuid, StoreError> {
        let result = sqlx::query(
            "INSERT INTO work_orders
             (id, contract_id, client_id, location_name, equipment_ids, work_type, status,
              scheduled_for, auto_generated, contact_name, contact_phone, contact_email,
              generated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(order.id)
        .bind(order.contract_id)
        .bind(order.client_id)
        .bind(&order.location_name)
        .bind(&order.equipment_ids)
        .bind(&order.work_type)
        .bind(&order.status)
        .bind(order.scheduled_for)
        .bind(order.auto_generated)
        .bind(&order.contact_name)
        .bind(&order.contact_phone)
        .bind(&order.contact_email)
        .bind(order.generated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(order.id),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                Err(StoreError::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_contract_cursor(
        &self,
        contract_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // Forward-only: an older timestamp never overwrites a newer cursor.
        sqlx::query(
            "UPDATE contracts
             SET last_auto_work_generated = $2
             WHERE id = $1
               AND (last_auto_work_generated IS NULL OR last_auto_work_generated < $2)",
        )
        .bind(contract_id)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
