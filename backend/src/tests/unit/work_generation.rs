// Unit tests for the recurring work generation engine.
//
// Everything runs against the in-memory gateway; the wrapper gateway below
// injects the failure modes (stuck cursor, racing reads) that the duplicate
// guard has to survive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::jobs::{JobError, RecurringWorkJob};
use crate::store::{InMemoryGateway, PersistenceGateway, StoreError};
use crate::tests::fixtures::{
    client_with_locations, contact_person, equipment_unit, location, monthly_contract, utc,
    utc_at,
};
use fieldops_shared::{Client, Contract, WorkOrder, WORK_STATUS_LISTED, WORK_TYPE_RECURRING_REVIEW};

/// Delegates to the in-memory gateway while simulating a store that cannot
/// persist cursor updates and, optionally, a reader that never sees existing
/// work orders (two runs racing past the existence check).
struct FlakyGateway {
    inner: Arc<InMemoryGateway>,
    fail_cursor_updates: bool,
    blind_duplicate_reads: bool,
}

#[async_trait]
impl PersistenceGateway for FlakyGateway {
    async fn list_contracts_with_recurrence(&self) -> Result<Vec<Contract>, StoreError> {
        self.inner.list_contracts_with_recurrence().await
    }

    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, StoreError> {
        self.inner.get_contract(id).await
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        self.inner.get_client(id).await
    }

    async fn find_auto_generated_work_order(
        &self,
        contract_id: Uuid,
        location_name: &str,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<WorkOrder>, StoreError> {
        if self.blind_duplicate_reads {
            return Ok(None);
        }
        self.inner
            .find_auto_generated_work_order(contract_id, location_name, day_start, day_end)
            .await
    }

    async fn create_work_order(&self, order: &WorkOrder) -> Result<Uuid, StoreError> {
        self.inner.create_work_order(order).await
    }

    async fn update_contract_cursor(
        &self,
        contract_id: Uuid,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_cursor_updates {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.update_contract_cursor(contract_id, timestamp).await
    }
}

#[tokio::test]
async fn test_end_to_end_generation_cycle() {
    let eq_a = equipment_unit();
    let eq_b = equipment_unit();
    let mut headquarters = location("Headquarters", vec![eq_a.clone()]);
    headquarters.contacts.push(contact_person("Alice Ramos"));
    let plant = location("Plant", vec![eq_b.clone()]);

    let client = client_with_locations(vec![headquarters, plant]);
    let mut contract = monthly_contract(client.id, [eq_a.id, eq_b.id], &["Headquarters", "Plant"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract.clone()).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let now = utc(2024, 3, 25);
    let result = engine.run(now).await.unwrap();

    assert_eq!(result.contracts_processed, 1);
    assert_eq!(result.work_orders_created, 2);
    assert!(result.errors.is_empty());

    // Cursor 2024-01-01 + 3 months = due 2024-04-01; window opened 2024-03-22.
    let orders = gateway.work_orders().await;
    assert_eq!(orders.len(), 2);
    for order in &orders {
        assert_eq!(order.contract_id, contract.id);
        assert_eq!(order.scheduled_for, utc(2024, 4, 1));
        assert!(order.auto_generated);
        assert_eq!(order.work_type, WORK_TYPE_RECURRING_REVIEW);
        assert_eq!(order.status, WORK_STATUS_LISTED);
        assert_eq!(order.generated_at, now);
    }

    let hq_order = orders.iter().find(|o| o.location_name == "Headquarters").unwrap();
    assert_eq!(hq_order.contact_name, "Alice Ramos");
    assert_eq!(hq_order.equipment_ids, vec![eq_a.id]);

    // No contacts at the plant: empty snapshot, not an error.
    let plant_order = orders.iter().find(|o| o.location_name == "Plant").unwrap();
    assert_eq!(plant_order.contact_name, "");
    assert_eq!(plant_order.equipment_ids, vec![eq_b.id]);

    let stored = gateway.contract(contract.id).await.unwrap();
    assert_eq!(stored.last_auto_work_generated, Some(now));
}

#[tokio::test]
async fn test_second_tick_creates_nothing_new() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let first = engine.run(utc(2024, 3, 25)).await.unwrap();
    assert_eq!(first.work_orders_created, 1);

    let second = engine.run(utc_at(2024, 3, 25, 0, 5)).await.unwrap();
    assert_eq!(second.work_orders_created, 0);
    assert!(second.errors.is_empty());

    assert_eq!(gateway.work_orders().await.len(), 1);
}

#[tokio::test]
async fn test_duplicate_guard_holds_when_cursor_cannot_advance() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));
    let contract_id = contract.id;

    let inner = Arc::new(InMemoryGateway::new());
    inner.insert_client(client).await;
    inner.insert_contract(contract).await;

    let gateway = Arc::new(FlakyGateway {
        inner: inner.clone(),
        fail_cursor_updates: true,
        blind_duplicate_reads: false,
    });
    let engine = RecurringWorkJob::new(gateway);

    let first = engine.run(utc(2024, 3, 25)).await.unwrap();
    assert_eq!(first.work_orders_created, 1);
    assert_eq!(first.errors.len(), 1);

    // Cursor never advanced, so the window is still open; the work order
    // store check is what prevents the duplicate.
    let second = engine.run(utc_at(2024, 3, 25, 0, 5)).await.unwrap();
    assert_eq!(second.work_orders_created, 0);
    assert_eq!(second.work_orders_skipped, 1);

    assert_eq!(inner.work_orders().await.len(), 1);
    assert_eq!(
        inner.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(utc(2024, 1, 1))
    );
}

#[tokio::test]
async fn test_store_backstop_turns_racing_create_into_skip() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));

    let inner = Arc::new(InMemoryGateway::new());
    inner.insert_client(client).await;
    inner.insert_contract(contract).await;

    // Reads never see existing orders, as if two runs both passed the
    // existence check; only the store's uniqueness rule is left.
    let gateway = Arc::new(FlakyGateway {
        inner: inner.clone(),
        fail_cursor_updates: true,
        blind_duplicate_reads: true,
    });
    let engine = RecurringWorkJob::new(gateway);

    let first = engine.run(utc(2024, 3, 25)).await.unwrap();
    assert_eq!(first.work_orders_created, 1);

    let second = engine.run(utc_at(2024, 3, 25, 0, 5)).await.unwrap();
    assert_eq!(second.work_orders_created, 0);
    assert_eq!(second.work_orders_skipped, 1);

    assert_eq!(inner.work_orders().await.len(), 1);
}

#[tokio::test]
async fn test_client_not_found_leaves_cursor_for_retry() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));
    let contract_id = contract.id;

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let first = engine.run(utc(2024, 3, 25)).await.unwrap();
    assert_eq!(first.contracts_processed, 1);
    assert_eq!(first.work_orders_created, 0);
    assert!(first.errors.is_empty());
    assert_eq!(
        gateway.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(utc(2024, 1, 1))
    );

    // Client shows up later: the contract is still due and now generates.
    gateway.insert_client(client).await;
    let now = utc(2024, 3, 26);
    let second = engine.run(now).await.unwrap();
    assert_eq!(second.work_orders_created, 1);
    assert_eq!(
        gateway.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(now)
    );
}

#[tokio::test]
async fn test_partial_fanout_skips_unmatched_locations() {
    let covered = equipment_unit();
    let uncovered = equipment_unit();
    let north = location("North", vec![covered.clone()]);
    let south = location("South", vec![uncovered.clone()]);

    let client = client_with_locations(vec![north, south]);
    // "Ghost" is not a location of this client at all.
    let mut contract = monthly_contract(client.id, [covered.id], &["North", "South", "Ghost"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let result = engine.run(utc(2024, 3, 25)).await.unwrap();

    assert_eq!(result.work_orders_created, 1);
    assert!(result.errors.is_empty());

    let orders = gateway.work_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].location_name, "North");
    assert_eq!(orders[0].equipment_ids, vec![covered.id]);
}

#[tokio::test]
async fn test_legacy_single_location_fallback() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &[]);
    contract.location_name = Some("Main".to_string());
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let result = engine.run(utc(2024, 3, 25)).await.unwrap();

    assert_eq!(result.work_orders_created, 1);
    assert_eq!(gateway.work_orders().await[0].location_name, "Main");
}

#[tokio::test]
async fn test_ineligible_contracts_are_skipped_silently() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);

    let mut no_unit = monthly_contract(client.id, [eq.id], &["Main"]);
    no_unit.recurrence_unit = None;

    let mut no_equipment = monthly_contract(client.id, [], &["Main"]);
    no_equipment.recurrence_interval = Some(1);

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(no_unit.clone()).await;
    gateway.insert_contract(no_equipment.clone()).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let result = engine.run(utc(2024, 3, 25)).await.unwrap();

    assert_eq!(result.contracts_processed, 2);
    assert_eq!(result.work_orders_created, 0);
    assert!(result.errors.is_empty());
    assert!(gateway.work_orders().await.is_empty());

    // Skipping is not a generation cycle: cursors stay untouched.
    assert_eq!(
        gateway.contract(no_unit.id).await.unwrap().last_auto_work_generated,
        None
    );
}

#[tokio::test]
async fn test_cursor_only_moves_forward() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.last_auto_work_generated = Some(utc(2024, 1, 1));
    let contract_id = contract.id;

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let t1 = utc(2024, 3, 25);
    engine.run(t1).await.unwrap();
    assert_eq!(
        gateway.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(t1)
    );

    // A stale timestamp never rewinds the cursor.
    gateway
        .update_contract_cursor(contract_id, utc(2024, 2, 1))
        .await
        .unwrap();
    assert_eq!(
        gateway.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(t1)
    );

    // A tick outside the window changes nothing.
    engine.run(utc(2024, 3, 26)).await.unwrap();
    assert_eq!(
        gateway.contract(contract_id).await.unwrap().last_auto_work_generated,
        Some(t1)
    );
}

#[tokio::test]
async fn test_start_date_first_occurrence_generates_on_start_date() {
    let eq = equipment_unit();
    let client = client_with_locations(vec![location("Main", vec![eq.clone()])]);
    let mut contract = monthly_contract(client.id, [eq.id], &["Main"]);
    contract.start_date = Some(chrono::NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(contract).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let result = engine.run(utc(2024, 3, 25)).await.unwrap();

    assert_eq!(result.work_orders_created, 1);
    assert_eq!(gateway.work_orders().await[0].scheduled_for, utc(2024, 4, 1));
}

#[tokio::test]
async fn test_run_contract_unknown_id_is_not_found() {
    let gateway = Arc::new(InMemoryGateway::new());
    let engine = RecurringWorkJob::new(gateway);

    let err = engine
        .run_contract(Uuid::new_v4(), utc(2024, 3, 25))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::ContractNotFound(_)));
}

#[tokio::test]
async fn test_run_contract_touches_only_that_contract() {
    let eq_a = equipment_unit();
    let eq_b = equipment_unit();
    let client = client_with_locations(vec![
        location("North", vec![eq_a.clone()]),
        location("South", vec![eq_b.clone()]),
    ]);
    let mut first = monthly_contract(client.id, [eq_a.id], &["North"]);
    first.last_auto_work_generated = Some(utc(2024, 1, 1));
    let mut second = monthly_contract(client.id, [eq_b.id], &["South"]);
    second.last_auto_work_generated = Some(utc(2024, 1, 1));

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.insert_client(client).await;
    gateway.insert_contract(first.clone()).await;
    gateway.insert_contract(second.clone()).await;

    let engine = RecurringWorkJob::new(gateway.clone());
    let result = engine.run_contract(first.id, utc(2024, 3, 25)).await.unwrap();

    assert_eq!(result.contracts_processed, 1);
    assert_eq!(result.work_orders_created, 1);

    let orders = gateway.work_orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].contract_id, first.id);
    assert_eq!(
        gateway.contract(second.id).await.unwrap().last_auto_work_generated,
        Some(utc(2024, 1, 1))
    );
}
