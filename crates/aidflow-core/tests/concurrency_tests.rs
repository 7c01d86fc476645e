use aidflow_core::{AllocationWorkflow, Outcome, WorkflowConfig};
use aidflow_test_utils::{FaultyStore, Fixture, Op};
use std::sync::Arc;
use std::time::Duration;

const ATTEMPTS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_submissions_commit_once() {
    let fx = Arc::new(Fixture::with_recency_guard(WorkflowConfig::default()).await);
    let workflow = Arc::new(fx.workflow());

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let workflow = Arc::clone(&workflow);
            let request = fx.request(&[fx.water]);
            tokio::spawn(async move { workflow.submit_allocation(request).await })
        })
        .collect();

    let mut reports = Vec::with_capacity(ATTEMPTS);
    for handle in handles {
        reports.push(handle.await.unwrap());
    }

    let successes = reports.iter().filter(|r| r.outcome == Outcome::Success).count();
    let blocked = reports
        .iter()
        .filter(|r| r.outcome == Outcome::FraudBlocked)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(blocked, ATTEMPTS - 1);
    assert_eq!(fx.store.allocation_count(), 1);
    assert_eq!(fx.store.fraud_alert_count(), ATTEMPTS - 1);
    assert_eq!(fx.quantity(fx.water), 2);
}

#[tokio::test]
async fn backend_guard_catches_submissions_past_eligibility() {
    let fx = Fixture::with_recency_guard(WorkflowConfig::default()).await;
    let store = Arc::new(FaultyStore::new(fx.store.clone()));
    store.rendezvous_at(Op::InsertAllocation, 2);
    let workflow =
        AllocationWorkflow::with_clock(store.clone(), WorkflowConfig::default(), fx.clock.clone());

    // both attempts pass the eligibility read before either insert runs
    let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
        futures::join!(
            workflow.submit_allocation(fx.request(&[fx.water])),
            workflow.submit_allocation(fx.request(&[fx.hygiene_kit])),
        )
    })
    .await
    .expect("both submissions reach the allocation insert");

    let mut outcomes = [a.outcome, b.outcome];
    outcomes.sort_by_key(|o| *o != Outcome::Success);
    assert_eq!(outcomes, [Outcome::Success, Outcome::FraudBlocked]);
    assert_eq!(fx.store.allocation_count(), 1);
    assert_eq!(fx.store.fraud_alert_count(), 1);
    assert_eq!(fx.quantity(fx.water) + fx.quantity(fx.hygiene_kit), 3 + 5 - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_beneficiaries_all_succeed() {
    let fx = Fixture::with_recency_guard(WorkflowConfig::default()).await;
    let mut beneficiaries = Vec::with_capacity(ATTEMPTS);
    for i in 0..ATTEMPTS {
        beneficiaries.push(fx.add_beneficiary(&format!("Household {i}")).await);
    }
    let workflow = Arc::new(fx.workflow());

    let handles: Vec<_> = beneficiaries
        .iter()
        .map(|&b| {
            let workflow = Arc::clone(&workflow);
            let request = fx.request_for(b, &[fx.hygiene_kit]);
            tokio::spawn(async move { workflow.submit_allocation(request).await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().outcome, Outcome::Success);
    }
    assert_eq!(fx.store.allocation_count(), ATTEMPTS);
    assert_eq!(fx.store.fraud_alert_count(), 0);
}
