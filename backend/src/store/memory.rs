// In-memory persistence gateway.
//
// Intended for tests/dev. Not optimized for performance. Enforces the same
// per-day uniqueness rule for auto-generated work orders as the Postgres
// schema, so engine behavior matches across both stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use fieldops_shared::{Client, Contract, WorkOrder, WORK_TYPE_RECURRING_REVIEW};

use super::{PersistenceGateway, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    contracts: HashMap<Uuid, Contract>,
    clients: HashMap<Uuid, Client>,
    work_orders: Vec<WorkOrder>,
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: RwLock<MemoryState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contract(&self, contract: Contract) {
        self.state.write().await.contracts.insert(contract.id, contract);
    }

    pub async fn insert_client(&self, client: Client) {
        self.state.write().await.clients.insert(client.id, client);
    }

    pub async fn work_orders(&self) -> Vec<WorkOrder> {
        self.state.read().await.work_orders.clone()
    }

    pub async fn contract(&self, id: Uuid) -> Option<Contract> {
        self.state.read().await.contracts.get(&id).cloned()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn list_contracts_with_recurrence(&self) -> Result<Vec<Contract>, StoreError> {
        let state = self.state.read().await;
        let mut contracts: Vec<Contract> = state
            .contracts
            .values()
            .filter(|c| c.is_active && c.recurrence_interval.is_some())
            .cloned()
            .collect();
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError> {
        Ok(self.state.read().await.contracts.get(&id).cloned())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        Ok(self.state.read().await.clients.get(&id).cloned())
    }

    async fn find_auto_generated_work_order(
        &self,
        contract_id: Uuid,
        location_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<WorkOrder>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .work_orders
            .iter()
            .find(|o| {
                o.contract_id == contract_id
                    && o.location_name == location_name
                    && o.auto_generated
                    && o.work_type == WORK_TYPE_RECURRING_REVIEW
                    && o.scheduled_for >= day_start
                    && o.scheduled_for < day_end
            })
            .cloned())
    }

    async fn create_work_order(&self, order: &WorkOrder) -> Result<Uuid, StoreError> {
        let mut state = self.state.write().await;

        // Same rule as the partial unique index on work_orders.
        if order.auto_generated {
            let day = order.scheduled_for.date_naive();
            let duplicate = state.work_orders.iter().any(|o| {
                o.auto_generated
                    && o.contract_id == order.contract_id
                    && o.location_name == order.location_name
                    && o.scheduled_for.date_naive() == day
            });
            if duplicate {
                return Err(StoreError::Duplicate);
            }
        }

        state.work_orders.push(order.clone());
        Ok(order.id)
    }

    async fn update_contract_cursor(
        &self,
        contract_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(contract) = state.contracts.get_mut(&contract_id) {
            // Forward-only, as in the Postgres gateway.
            let advances = contract
                .last_auto_work_generated
                .map(|cursor| cursor < timestamp)
                .unwrap_or(true);
            if advances {
                contract.last_auto_work_generated = Some(timestamp);
            }
        }
        Ok(())
    }
}
