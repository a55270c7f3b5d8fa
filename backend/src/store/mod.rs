// Persistence Gateway
//
// Every read/write the generation engine performs against the record store
// goes through this trait, so the engine itself owns no storage state and the
// store can be swapped out (Postgres in production, in-memory in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use fieldops_shared::{Client, Contract, WorkOrder};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryGateway;
pub use postgres::PostgresGateway;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// An auto-generated work order already exists for this contract,
    /// location and day. Raised by the store-level uniqueness backstop.
    #[error("Duplicate auto-generated work order")]
    Duplicate,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// All active contracts that declare a recurrence interval.
    async fn list_contracts_with_recurrence(&self) -> Result<Vec<Contract>, StoreError>;

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError>;

    /// The owning client with its locations, equipment and contacts loaded.
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError>;

    /// Any auto-generated recurring-review work order for this contract and
    /// location whose intervention date falls in `[day_start, day_end)`.
    async fn find_auto_generated_work_order(
        &self,
        contract_id: Uuid,
        location_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<WorkOrder>, StoreError>;

    async fn create_work_order(&self, order: &WorkOrder) -> Result<Uuid, StoreError>;

    /// Advance a contract's generation cursor. The cursor only ever moves
    /// forward; an older timestamp is a no-op.
    async fn update_contract_cursor(
        &self,
        contract_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
