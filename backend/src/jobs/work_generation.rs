// Recurring Work Generation Job
//
// Scans service contracts carrying a recurrence rule and, when a contract's
// next occurrence falls inside its lead-time window, creates one work order
// per applicable location. Invocations are at-least-once: the periodic
// trigger and the manual trigger may fire repeatedly or overlap, so every
// run re-checks the work order store before creating anything, and whole
// runs are serialized behind a run-level lock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fieldops_shared::{
    Client, Contract, Location, WorkOrder, WORK_STATUS_LISTED, WORK_TYPE_RECURRING_REVIEW,
};

use super::recurrence;
use super::scheduler::JobError;
use crate::store::{PersistenceGateway, StoreError};

pub struct RecurringWorkJob {
    gateway: Arc<dyn PersistenceGateway>,
    // Serializes whole runs so overlapping ticks cannot race the
    // check-then-create sequence. The store's unique index is the backstop.
    run_lock: Mutex<()>,
}

#[derive(Debug, Default, Serialize)]
pub struct WorkGenerationResult {
    pub contracts_processed: i32,
    pub work_orders_created: i32,
    pub work_orders_skipped: i32,
    pub errors: Vec<String>,
}

struct LocationTarget<'a> {
    location: &'a Location,
    equipment_ids: Vec<Uuid>,
}

impl RecurringWorkJob {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            gateway,
            run_lock: Mutex::new(()),
        }
    }

    /// Periodic entry point: process every active contract with a recurrence
    /// rule. One bad contract never halts the run; its error is recorded and
    /// the remaining contracts still process.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<WorkGenerationResult, JobError> {
        let _guard = self.run_lock.lock().await;

        let mut result = WorkGenerationResult::default();
        let contracts = self.gateway.list_contracts_with_recurrence().await?;

        for contract in &contracts {
            result.contracts_processed += 1;
            if let Err(e) = self.process_contract(contract, now, &mut result).await {
                error!(
                    "Work generation failed for contract {} ({}): {}",
                    contract.name, contract.id, e
                );
                result.errors.push(format!("Contract {}: {}", contract.id, e));
            }
        }

        Ok(result)
    }

    /// Manual entry point: identical logic restricted to one contract.
    /// Errors surface to the caller instead of being swallowed.
    pub async fn run_contract(
        &self,
        contract_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WorkGenerationResult, JobError> {
        let _guard = self.run_lock.lock().await;

        let contract = self
            .gateway
            .get_contract(contract_id)
            .await?
            .ok_or(JobError::ContractNotFound(contract_id))?;

        let mut result = WorkGenerationResult::default();
        result.contracts_processed = 1;
        self.process_contract(&contract, now, &mut result).await?;
        Ok(result)
    }

    async fn process_contract(
        &self,
        contract: &Contract,
        now: DateTime<Utc>,
        result: &mut WorkGenerationResult,
    ) -> Result<(), StoreError> {
        if !contract.is_active || contract.equipment_ids.is_empty() {
            debug!("Contract {} not eligible for generation, skipping", contract.id);
            return Ok(());
        }

        // Also None when the recurrence fields are missing or non-positive.
        let Some(next_due) = recurrence::next_due_date(contract, now) else {
            debug!("Contract {} has no usable recurrence rule, skipping", contract.id);
            return Ok(());
        };

        if !recurrence::generation_window_open(contract, next_due, now) {
            debug!(
                "Contract {} next due {} is outside the generation window",
                contract.id, next_due
            );
            return Ok(());
        }

        let Some(client) = self.gateway.get_client(contract.client_id).await? else {
            // No cursor advance: the contract stays due and is retried on
            // every subsequent tick.
            warn!(
                "Client {} not found for contract {}, skipping until next run",
                contract.client_id, contract.id
            );
            return Ok(());
        };

        for target in resolve_targets(contract, &client) {
            match self
                .generate_for_location(contract, &target, next_due, now)
                .await
            {
                Ok(true) => result.work_orders_created += 1,
                Ok(false) => result.work_orders_skipped += 1,
                Err(e) => {
                    // Collect and continue: the remaining locations of this
                    // contract still get their attempt.
                    error!(
                        "Failed to generate work order for contract {} at '{}': {}",
                        contract.id, target.location.name, e
                    );
                    result.errors.push(format!(
                        "Contract {} location '{}': {}",
                        contract.id, target.location.name, e
                    ));
                }
            }
        }

        // The cycle counts as done once the window passed and the client
        // resolved, however many locations were skipped.
        self.gateway.update_contract_cursor(contract.id, now).await?;
        info!(
            "Contract {} generation cycle complete, cursor advanced to {}",
            contract.id, now
        );

        Ok(())
    }

    /// Create the work order for one location unless one already exists for
    /// this contract, location and occurrence day. Returns whether a new
    /// order was created.
    async fn generate_for_location(
        &self,
        contract: &Contract,
        target: &LocationTarget<'_>,
        next_due: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let day_start = recurrence::day_start_utc(next_due);
        let day_end = day_start + Duration::days(1);

        let existing = self
            .gateway
            .find_auto_generated_work_order(contract.id, &target.location.name, day_start, day_end)
            .await?;
        if existing.is_some() {
            info!(
                "Work order already exists for contract {} at '{}' on {}, skipping",
                contract.id, target.location.name, next_due
            );
            return Ok(false);
        }

        let order = build_work_order(contract, target, day_start, now);
        match self.gateway.create_work_order(&order).await {
            Ok(id) => {
                info!(
                    "Created work order {} for contract {} at '{}' due {}",
                    id, contract.id, target.location.name, next_due
                );
                Ok(true)
            }
            // A concurrent run won the race; the store's uniqueness rule
            // turned it into a duplicate, which is just a skip here.
            Err(StoreError::Duplicate) => {
                info!(
                    "Concurrent run already created the work order for contract {} at '{}' on {}",
                    contract.id, target.location.name, next_due
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Expand a contract into its (location, equipment subset) targets.
///
/// Never fails the whole contract over one malformed location: unknown names
/// and empty equipment intersections are logged and skipped individually.
fn resolve_targets<'a>(contract: &Contract, client: &'a Client) -> Vec<LocationTarget<'a>> {
    let names = contract.target_location_names();
    if names.is_empty() {
        warn!("Contract {} has no target locations, skipping", contract.id);
        return Vec::new();
    }

    let mut targets = Vec::new();
    for name in &names {
        let Some(location) = client.location_by_name(name) else {
            warn!(
                "Location '{}' not found on client '{}' for contract {}, skipping",
                name, client.name, contract.id
            );
            continue;
        };

        let equipment_ids: Vec<Uuid> = location
            .equipment
            .iter()
            .map(|e| e.id)
            .filter(|id| contract.equipment_ids.contains(id))
            .collect();
        if equipment_ids.is_empty() {
            warn!(
                "Contract {} covers no equipment at location '{}', skipping",
                contract.id, name
            );
            continue;
        }

        targets.push(LocationTarget {
            location,
            equipment_ids,
        });
    }
    targets
}

fn build_work_order(
    contract: &Contract,
    target: &LocationTarget<'_>,
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> WorkOrder {
    let contact = target.location.contacts.first();
    WorkOrder {
        id: Uuid::new_v4(),
        contract_id: contract.id,
        client_id: contract.client_id,
        location_name: target.location.name.clone(),
        equipment_ids: target.equipment_ids.clone(),
        work_type: WORK_TYPE_RECURRING_REVIEW.to_string(),
        status: WORK_STATUS_LISTED.to_string(),
        scheduled_for,
        auto_generated: true,
        contact_name: contact.map(|c| c.name.clone()).unwrap_or_default(),
        contact_phone: contact.and_then(|c| c.phone.clone()),
        contact_email: contact.and_then(|c| c.email.clone()),
        generated_at: now,
    }
}
