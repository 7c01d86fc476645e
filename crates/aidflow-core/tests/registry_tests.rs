use aidflow_core::{
    BeneficiaryUpdate, DisburserSignup, MemoryStore, NewBeneficiary, Outcome, Registry,
    RegistryError, RegistryStore,
};
use aidflow_test_utils::Fixture;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;

fn signup(region: aidflow_core::RegionId, phone: &str) -> DisburserSignup {
    DisburserSignup {
        name: "Mary Akai".to_string(),
        phone: phone.to_string(),
        region_id: region,
        password: "correct horse".to_string(),
    }
}

#[tokio::test]
async fn region_names_are_unique_ignoring_case() {
    let registry = Registry::new(Arc::new(MemoryStore::new()));
    registry.create_region("Turkana").await.unwrap();

    let err = registry.create_region("  turkana ").await.unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate { entity: "region", .. }));
    assert_eq!(registry.list_regions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn login_checks_password_and_active_flag() {
    let store = Arc::new(MemoryStore::new());
    let registry = Registry::new(store);
    let region = registry.create_region("Marsabit").await.unwrap();
    let disburser = registry
        .create_disburser(signup(region.id, "+254 711 222 333"))
        .await
        .unwrap();
    assert_eq!(disburser.phone, "+254711222333");
    assert_ne!(disburser.password_hash, "correct horse");

    let ok = registry
        .verify_login("+254-711-222-333", "correct horse")
        .await
        .unwrap();
    assert_eq!(ok.map(|d| d.id), Some(disburser.id));
    assert!(registry
        .verify_login("+254711222333", "wrong horse")
        .await
        .unwrap()
        .is_none());
    assert!(registry
        .verify_login("+254799999999", "correct horse")
        .await
        .unwrap()
        .is_none());

    registry.set_disburser_active(disburser.id, false).await.unwrap();
    assert!(registry
        .verify_login("+254711222333", "correct horse")
        .await
        .unwrap()
        .is_none());

    registry.set_disburser_active(disburser.id, true).await.unwrap();
    registry
        .reset_password(disburser.id, "battery staple")
        .await
        .unwrap();
    assert!(registry
        .verify_login("+254711222333", "battery staple")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn duplicate_phone_and_short_password_are_rejected() {
    let registry = Registry::new(Arc::new(MemoryStore::new()));
    let region = registry.create_region("Wajir").await.unwrap();
    registry
        .create_disburser(signup(region.id, "0722000111"))
        .await
        .unwrap();

    let err = registry
        .create_disburser(signup(region.id, "0722 000 111"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate { entity: "disburser", .. }));

    let mut short = signup(region.id, "0722000222");
    short.password = "short".to_string();
    assert!(matches!(
        registry.create_disburser(short).await.unwrap_err(),
        RegistryError::Validation(_)
    ));
}

#[tokio::test]
async fn reassigning_to_missing_region_fails() {
    let registry = Registry::new(Arc::new(MemoryStore::new()));
    let region = registry.create_region("Isiolo").await.unwrap();
    let disburser = registry
        .create_disburser(signup(region.id, "0733000111"))
        .await
        .unwrap();

    let err = registry
        .reassign_disburser(disburser.id, aidflow_core::RegionId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { entity: "region", .. }));

    let other = registry.create_region("Garissa").await.unwrap();
    let moved = registry
        .reassign_disburser(disburser.id, other.id)
        .await
        .unwrap();
    assert_eq!(moved.region_id, other.id);
}

#[tokio::test]
async fn beneficiary_registration_and_update() {
    let fx = Fixture::new().await;
    let registry = Registry::new(fx.store.clone());

    let mut ids = BTreeMap::new();
    ids.insert("national_id".to_string(), "12345678".to_string());
    ids.insert("ration_card".to_string(), "  ".to_string());
    let registered = registry
        .register_beneficiary(NewBeneficiary {
            name: "  Grace Nakuru ".to_string(),
            estimated_age: 41,
            height_cm: None,
            region_id: fx.region,
            registered_by: fx.disburser,
            unique_identifiers: ids,
        })
        .await
        .unwrap();
    assert_eq!(registered.name, "Grace Nakuru");
    assert_eq!(registered.unique_identifiers.len(), 1);

    let updated = registry
        .update_beneficiary(
            registered.id,
            BeneficiaryUpdate {
                estimated_age: Some(42),
                ..BeneficiaryUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.estimated_age, 42);
    assert_eq!(updated.name, "Grace Nakuru");

    let err = registry
        .update_beneficiary(
            registered.id,
            BeneficiaryUpdate {
                estimated_age: Some(200),
                ..BeneficiaryUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    let in_region = registry.list_beneficiaries(Some(fx.region)).await.unwrap();
    assert_eq!(in_region.len(), 2);
}

#[tokio::test]
async fn delete_beneficiary_cascades_history() {
    let fx = Fixture::new().await;
    let workflow = fx.workflow();
    assert_eq!(
        workflow.submit_allocation(fx.request(&[fx.water])).await.outcome,
        Outcome::Success
    );
    workflow.submit_allocation(fx.request(&[fx.water])).await;
    workflow.submit_allocation(fx.request(&[fx.hygiene_kit])).await;

    // the store refuses to orphan history on its own
    assert!(fx.store.delete_beneficiary(fx.beneficiary).await.is_err());

    let registry = Registry::new(fx.store.clone());
    let summary = registry.delete_beneficiary(fx.beneficiary).await.unwrap();
    assert_eq!(summary.allocations, 1);
    assert_eq!(summary.fraud_alerts, 2);
    assert_eq!(fx.store.allocation_count(), 0);
    assert_eq!(fx.store.fraud_alert_count(), 0);

    let err = registry.beneficiary(fx.beneficiary).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
    // stock is not restored by deleting history
    assert_eq!(fx.quantity(fx.water), 2);
}

#[tokio::test]
async fn goods_types_and_stock() {
    let fx = Fixture::new().await;
    let registry = Registry::new(fx.store.clone());

    let blanket = registry
        .create_goods_type("Blanket", Some("  wool, double  "))
        .await
        .unwrap();
    assert_eq!(blanket.description.as_deref(), Some("wool, double"));
    assert!(matches!(
        registry.create_goods_type("blanket", None).await.unwrap_err(),
        RegistryError::Duplicate { .. }
    ));

    let row = registry.set_stock(blanket.id, fx.region, 40).await.unwrap();
    let again = registry.set_stock(blanket.id, fx.region, 25).await.unwrap();
    assert_eq!(row.id, again.id);
    assert_eq!(fx.quantity(row.id), 25);

    let err = registry.delete_goods_type(blanket.id).await.unwrap_err();
    assert!(matches!(err, RegistryError::InUse { .. }));

    let unused = registry.create_goods_type("Soap", None).await.unwrap();
    registry.delete_goods_type(unused.id).await.unwrap();
    assert!(registry
        .list_goods_types()
        .await
        .unwrap()
        .iter()
        .all(|g| g.id != unused.id));

    let stock = registry.stock(Some(fx.region)).await.unwrap();
    assert_eq!(stock.len(), 4);
}

#[tokio::test]
async fn history_is_newest_first() {
    let fx = Fixture::new().await;
    let workflow = fx.workflow();
    workflow.submit_allocation(fx.request(&[fx.water])).await;
    fx.clock.advance(chrono::Duration::hours(1));
    workflow.submit_allocation(fx.request(&[fx.water])).await;
    fx.clock.advance(chrono::Duration::hours(1));
    workflow.submit_allocation(fx.request(&[fx.hygiene_kit])).await;

    let registry = Registry::new(fx.store.clone());
    let alerts = registry.fraud_alerts(Some(fx.beneficiary)).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[0].created_at > alerts[1].created_at);
    assert!(alerts[0].details.contains("Hygiene Kit"));
    assert_eq!(registry.allocations(None).await.unwrap().len(), 1);
}
