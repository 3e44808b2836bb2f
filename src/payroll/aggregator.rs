//! Payroll generation.
//!
//! Generation folds the component ledger into the open batch. Totals are
//! accumulated, never replaced, so repeated uploads and generations within a
//! cycle add up. The ledger is always empty after a successful generation.
//! A decided result that receives new components goes back to pending.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Text};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{
    Component, Employee, PayrollResult, PayrollResultDetail, PayrollStatus,
};
use crate::store::{self, PayrollStore};

/// What one generation changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// The open batch the results belong to.
    pub batch_id: Uuid,
    /// Employees that received their first result in this batch.
    pub results_created: usize,
    /// Employees whose existing result was extended.
    pub results_updated: usize,
    /// Approved or rejected results sent back to pending.
    pub results_reopened: usize,
    /// Ledger components folded in and removed.
    pub components_consumed: usize,
}

/// Folds every ledger component into its employee's result.
///
/// Employees without ledger components are untouched. Each touched result
/// records the employee's current base salary. The whole generation is one
/// transaction: if any total overflows, nothing is changed.
///
/// # Example
///
/// ```
/// use payroll_engine::payroll::generate_or_update;
/// use payroll_engine::store::PayrollStore;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = PayrollStore::in_memory().await?;
/// let summary = generate_or_update(&store).await?;
/// assert_eq!(summary.components_consumed, 0);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// # }).unwrap();
/// ```
pub async fn generate_or_update(store: &PayrollStore) -> EngineResult<GenerationSummary> {
    let mut tx = store.begin().await?;
    let batch = store::open_batch(&mut tx).await?;
    let now = Utc::now();

    let ledger: Vec<Component> = sqlx::query_as("SELECT * FROM components ORDER BY id")
        .fetch_all(&mut *tx)
        .await?;
    let components_consumed = ledger.len();

    let mut by_employee: BTreeMap<String, Vec<Component>> = BTreeMap::new();
    for component in ledger {
        by_employee
            .entry(component.employee_id.clone())
            .or_default()
            .push(component);
    }

    let mut results_created = 0;
    let mut results_updated = 0;
    let mut results_reopened = 0;

    for (employee_id, components) in by_employee {
        let employee = store::employee(&mut tx, &employee_id).await?;

        let existing: Option<PayrollResult> = sqlx::query_as(
            "SELECT * FROM payroll_results WHERE batch_id = ? AND employee_id = ?",
        )
        .bind(batch.id)
        .bind(&employee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (mut result, is_new) = match existing {
            Some(result) => {
                results_updated += 1;
                (result, false)
            }
            None => {
                results_created += 1;
                (PayrollResult::open(batch.id, &employee, now), true)
            }
        };

        result.absorb(employee.base_salary, &components)?;

        let previous_status = result.status;
        if result.reopen() {
            results_reopened += 1;
            warn!(
                employee_id = %employee_id,
                result_id = result.id,
                previous_status = %previous_status,
                "New components reopened a decided result"
            );
        }

        if is_new {
            result.id = sqlx::query_scalar(
                "INSERT INTO payroll_results
                     (batch_id, employee_id, base_salary, total_incentives, total_deductions,
                      final_salary, status, rejection_reason, components_snapshot, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 RETURNING id",
            )
            .bind(result.batch_id)
            .bind(&result.employee_id)
            .bind(Text(result.base_salary))
            .bind(Text(result.total_incentives))
            .bind(Text(result.total_deductions))
            .bind(Text(result.final_salary))
            .bind(result.status)
            .bind(&result.rejection_reason)
            .bind(Json(&result.components_snapshot))
            .bind(result.created_at)
            .fetch_one(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE payroll_results
                 SET base_salary = ?, total_incentives = ?, total_deductions = ?,
                     final_salary = ?, status = ?, rejection_reason = ?, components_snapshot = ?
                 WHERE id = ?",
            )
            .bind(Text(result.base_salary))
            .bind(Text(result.total_incentives))
            .bind(Text(result.total_deductions))
            .bind(Text(result.final_salary))
            .bind(result.status)
            .bind(&result.rejection_reason)
            .bind(Json(&result.components_snapshot))
            .bind(result.id)
            .execute(&mut *tx)
            .await?;
        }

        debug!(
            employee_id = %employee_id,
            result_id = result.id,
            total_incentives = %result.total_incentives,
            total_deductions = %result.total_deductions,
            final_salary = %result.final_salary,
            "Payroll result updated"
        );
    }

    sqlx::query("DELETE FROM components").execute(&mut *tx).await?;
    tx.commit().await?;

    let summary = GenerationSummary {
        batch_id: batch.id,
        results_created,
        results_updated,
        results_reopened,
        components_consumed,
    };
    info!(
        batch_id = %summary.batch_id,
        created = summary.results_created,
        updated = summary.results_updated,
        reopened = summary.results_reopened,
        consumed = summary.components_consumed,
        "Payroll generated"
    );
    Ok(summary)
}

/// Filters for listing open results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResultFilter {
    /// Only results in this status.
    #[serde(default)]
    pub status: Option<PayrollStatus>,
    /// Case-insensitive substring of employee name or id.
    #[serde(default)]
    pub search: Option<String>,
}

/// Lists the open batch's results with their employees, newest first.
pub async fn list_results(
    store: &PayrollStore,
    filter: &ResultFilter,
) -> EngineResult<Vec<PayrollResultDetail>> {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut sql = String::from(
        "SELECT * FROM payroll_results
         WHERE batch_id = (SELECT id FROM payroll_batches WHERE closed_at IS NULL)",
    );
    if filter.status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");

    let mut query = sqlx::query_as::<_, PayrollResult>(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status);
    }
    let results = query.fetch_all(store.pool()).await?;

    let employees: BTreeMap<String, Employee> = sqlx::query_as::<_, Employee>(
        "SELECT * FROM employees WHERE employee_id IN (
             SELECT employee_id FROM payroll_results
             WHERE batch_id = (SELECT id FROM payroll_batches WHERE closed_at IS NULL))",
    )
    .fetch_all(store.pool())
    .await?
    .into_iter()
    .map(|employee| (employee.employee_id.clone(), employee))
    .collect();

    let details = results
        .into_iter()
        .filter_map(|result| {
            let employee = employees.get(&result.employee_id)?;
            if let Some(needle) = &needle {
                if !employee.matches_search(needle) {
                    return None;
                }
            }
            Some(PayrollResultDetail {
                result,
                employee: employee.clone(),
            })
        })
        .collect();
    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::ingest::read_sheet;
    use crate::models::ComponentKind;
    use crate::payroll::approval::{approve, reject};
    use crate::payroll::directory::{list_employees, upsert_from_sheet};
    use crate::payroll::ledger::{ingest_components, list_components, LoadedSheet};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn setup(master_csv: &str) -> PayrollStore {
        let store = PayrollStore::in_memory().await.unwrap();
        let master = read_sheet("master.csv", master_csv.as_bytes()).unwrap();
        upsert_from_sheet(&store, &master).await.unwrap();
        store
    }

    async fn upload(store: &PayrollStore, kind: ComponentKind, csv: &str) {
        let sheet = LoadedSheet {
            source_file: format!("{}.csv", kind),
            sheet: read_sheet("upload.csv", csv.as_bytes()),
        };
        ingest_components(store, vec![sheet], kind).await.unwrap();
    }

    async fn results(store: &PayrollStore) -> Vec<PayrollResultDetail> {
        list_results(store, &ResultFilter::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_generate_example_totals() {
        let store = setup("employee_id,name,base_salary\nE001,Asha,5000.00\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,300.50\n").await;
        upload(&store, ComponentKind::Deduction, "employee_id,amount\nE001,50.25\n").await;

        let summary = generate_or_update(&store).await.unwrap();

        assert_eq!(summary.results_created, 1);
        assert_eq!(summary.components_consumed, 2);
        let result = &results(&store).await[0].result;
        assert_eq!(result.base_salary, dec("5000.00"));
        assert_eq!(result.total_incentives, dec("300.50"));
        assert_eq!(result.total_deductions, dec("50.25"));
        assert_eq!(result.final_salary, dec("5250.25"));
        assert_eq!(result.status, PayrollStatus::Pending);
        assert!(list_components(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_employees_without_components_get_no_result() {
        let store = setup("employee_id,base_salary\nE001,100\nE002,200\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10\n").await;

        generate_or_update(&store).await.unwrap();

        let results = results(&store).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].employee.employee_id, "E001");
    }

    #[tokio::test]
    async fn test_second_generation_on_empty_ledger_is_a_no_op() {
        let store = setup("employee_id,base_salary\nE001,1000\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10\n").await;
        generate_or_update(&store).await.unwrap();
        let before = results(&store).await;

        let summary = generate_or_update(&store).await.unwrap();

        assert_eq!(summary.components_consumed, 0);
        assert_eq!(summary.results_updated, 0);
        assert_eq!(results(&store).await, before);
    }

    #[tokio::test]
    async fn test_generations_accumulate_incrementally() {
        let store = setup("employee_id,base_salary\nE001,1000.00\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10.10\nE001,5\n").await;
        upload(&store, ComponentKind::Deduction, "employee_id,amount\nE001,1.01\n").await;
        generate_or_update(&store).await.unwrap();

        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,0.90\n").await;
        upload(&store, ComponentKind::Deduction, "employee_id,amount\nE001,2.99\n").await;
        let summary = generate_or_update(&store).await.unwrap();

        assert_eq!(summary.results_updated, 1);
        assert_eq!(summary.results_created, 0);
        let results = results(&store).await;
        assert_eq!(results.len(), 1);
        let result = &results[0].result;
        assert_eq!(result.total_incentives, dec("16.00"));
        assert_eq!(result.total_deductions, dec("4.00"));
        assert_eq!(result.final_salary, dec("1012.00"));
        assert_eq!(result.components_snapshot.incentives.len(), 3);
        assert_eq!(result.components_snapshot.deductions.len(), 2);
        assert_eq!(result.components_snapshot.incentives[0].amount, dec("10.10"));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_source_and_reason() {
        let store = setup("employee_id,base_salary\nE001,1000\n").await;
        upload(
            &store,
            ComponentKind::Deduction,
            "employee_id,amount,reason\nE001,15,Uniform\n",
        )
        .await;
        generate_or_update(&store).await.unwrap();

        let snapshot = &results(&store).await[0].result.components_snapshot;
        assert_eq!(snapshot.deductions[0].reason.as_deref(), Some("Uniform"));
        assert_eq!(snapshot.deductions[0].source_file.as_deref(), Some("deduction.csv"));
        assert!(snapshot.incentives.is_empty());
    }

    #[tokio::test]
    async fn test_overflow_rolls_back_and_store_stays_usable() {
        let store = setup("employee_id,base_salary\nE001,1000\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10\n").await;
        let now = Utc::now();
        let mut tx = store.begin().await.unwrap();
        for _ in 0..2 {
            sqlx::query(
                "INSERT INTO components (employee_id, kind, amount, created_at, updated_at)
                 VALUES ('E001', 'incentive', ?, ?, ?)",
            )
            .bind(Text(Decimal::MAX))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let err = generate_or_update(&store).await.unwrap_err();

        assert!(matches!(err, EngineError::AmountOverflow { employee_id } if employee_id == "E001"));
        assert!(results(&store).await.is_empty());
        assert_eq!(store.ledger_len().await.unwrap(), 3);
        assert_eq!(list_employees(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_results_filters_by_status_and_search() {
        let store =
            setup("employee_id,name,base_salary\nE001,Asha Rao,100\nE002,Ben Ode,200\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,1\nE002,2\n").await;
        generate_or_update(&store).await.unwrap();
        let ben = results(&store)
            .await
            .into_iter()
            .find(|d| d.employee.employee_id == "E002")
            .unwrap();
        approve(&store, ben.result.id).await.unwrap();

        let approved = list_results(
            &store,
            &ResultFilter {
                status: Some(PayrollStatus::Approved),
                search: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].employee.employee_id, "E002");

        let by_name = list_results(
            &store,
            &ResultFilter {
                status: None,
                search: Some("ASHA".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].employee.employee_id, "E001");
    }

    #[tokio::test]
    async fn test_results_carry_open_batch_id() {
        let store = setup("employee_id,base_salary\nE001,100\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,1\n").await;
        let summary = generate_or_update(&store).await.unwrap();

        assert_eq!(results(&store).await[0].result.batch_id, summary.batch_id);
        assert_eq!(store.open_batch().await.unwrap().id, summary.batch_id);
    }

    #[tokio::test]
    async fn test_new_components_reopen_decided_results() {
        let store = setup("employee_id,base_salary\nE001,1000\nE002,2000\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10\nE002,20\n").await;
        generate_or_update(&store).await.unwrap();
        let first = results(&store).await;
        let asha = first.iter().find(|d| d.employee.employee_id == "E001").unwrap();
        let ben = first.iter().find(|d| d.employee.employee_id == "E002").unwrap();
        approve(&store, asha.result.id).await.unwrap();
        reject(&store, ben.result.id, "Wrong amount").await.unwrap();

        upload(&store, ComponentKind::Deduction, "employee_id,amount\nE001,5\nE002,5\n").await;
        let summary = generate_or_update(&store).await.unwrap();

        assert_eq!(summary.results_reopened, 2);
        for detail in results(&store).await {
            assert_eq!(detail.result.status, PayrollStatus::Pending);
            assert!(detail.result.rejection_reason.is_none());
        }
        let reapproved = approve(&store, asha.result.id).await.unwrap();
        assert_eq!(reapproved.final_salary, dec("1005"));
    }

    #[tokio::test]
    async fn test_generation_picks_up_new_base_salary() {
        let store = setup("employee_id,base_salary\nE001,1000\n").await;
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,10\n").await;
        generate_or_update(&store).await.unwrap();

        let master = read_sheet("master.csv", b"employee_id,base_salary\nE001,1200\n").unwrap();
        upsert_from_sheet(&store, &master).await.unwrap();
        upload(&store, ComponentKind::Incentive, "employee_id,amount\nE001,5\n").await;
        generate_or_update(&store).await.unwrap();

        let result = &results(&store).await[0].result;
        assert_eq!(result.base_salary, dec("1200"));
        assert_eq!(result.final_salary, dec("1215"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_final_salary_is_exact_and_totals_accumulate(
            base in 0i64..10_000_000,
            first in proptest::collection::vec((any::<bool>(), -100_000i64..100_000), 1..8),
            second in proptest::collection::vec((any::<bool>(), -100_000i64..100_000), 0..8),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let base_salary = Decimal::new(base, 2);

            let (result, ledger_empty, expected_incentives, expected_deductions) =
                runtime.block_on(async {
                    let store =
                        setup(&format!("employee_id,base_salary\nE001,{}\n", base_salary)).await;

                    let mut expected_incentives = Decimal::ZERO;
                    let mut expected_deductions = Decimal::ZERO;
                    for batch in [&first, &second] {
                        for (is_incentive, cents) in batch.iter() {
                            let amount = Decimal::new(*cents, 2);
                            let kind = if *is_incentive {
                                expected_incentives += amount;
                                ComponentKind::Incentive
                            } else {
                                expected_deductions += amount;
                                ComponentKind::Deduction
                            };
                            upload(&store, kind, &format!("employee_id,amount\nE001,{}\n", amount))
                                .await;
                        }
                        generate_or_update(&store).await.unwrap();
                    }

                    let result = results(&store).await[0].result.clone();
                    let ledger_empty = list_components(&store).await.unwrap().is_empty();
                    (result, ledger_empty, expected_incentives, expected_deductions)
                });

            prop_assert_eq!(result.total_incentives, expected_incentives);
            prop_assert_eq!(result.total_deductions, expected_deductions);
            prop_assert_eq!(
                result.final_salary,
                base_salary + expected_incentives - expected_deductions
            );
            prop_assert!(ledger_empty);
        }
    }
}
