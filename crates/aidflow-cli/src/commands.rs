//! Subcommand implementations, generic over the store so they run against
//! the hosted backend or the in-memory store alike

use aidflow_core::{
    AllocationWorkflow, BeneficiaryId, GeoLocation, Outcome, RegionId, Registry, RegistryStore,
    SubmitAllocation, WorkflowStore,
};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

/// Process exit status for an allocation outcome
#[must_use]
pub fn exit_status(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Success => 0,
        Outcome::FraudBlocked => 2,
        Outcome::Failed => 1,
    }
}

/// Run one submission and print the user-facing message
pub async fn submit<S, W>(
    workflow: &AllocationWorkflow<S>,
    request: SubmitAllocation,
    out: &mut W,
) -> Result<Outcome>
where
    S: WorkflowStore + ?Sized,
    W: Write,
{
    let report = workflow.submit_allocation(request).await;

    writeln!(out, "{}", report.message)?;
    for warning in &report.inventory_warnings {
        writeln!(out, "  stock not updated: {} ({})", warning.goods_name, warning.reason)?;
    }
    if let Some(id) = report.allocation_id {
        writeln!(out, "allocation: {id}")?;
    }
    if let Some(id) = report.fraud_alert_id {
        writeln!(out, "fraud alert: {id}")?;
    }
    Ok(report.outcome)
}

/// Stock lines of one region, one per line
pub async fn stock<S, W>(store: Arc<S>, region: RegionId, out: &mut W) -> Result<()>
where
    S: RegistryStore + 'static,
    W: Write,
{
    let registry = Registry::new(store);
    let names: HashMap<_, _> = registry
        .list_goods_types()
        .await
        .context("failed to load goods types")?
        .into_iter()
        .map(|g| (g.id, g.name))
        .collect();
    let mut rows = registry
        .stock(Some(region))
        .await
        .context("failed to load regional stock")?;
    rows.sort_by(|a, b| names.get(&a.goods_type_id).cmp(&names.get(&b.goods_type_id)));

    for row in rows {
        let name = names
            .get(&row.goods_type_id)
            .map_or("<unknown goods type>", String::as_str);
        writeln!(out, "{}\t{}\t{}", row.id, name, row.quantity)?;
    }
    Ok(())
}

/// Fraud alerts, newest first
pub async fn alerts<S, W>(
    store: Arc<S>,
    beneficiary: Option<BeneficiaryId>,
    out: &mut W,
) -> Result<()>
where
    S: RegistryStore + 'static,
    W: Write,
{
    let alerts = Registry::new(store)
        .fraud_alerts(beneficiary)
        .await
        .context("failed to load fraud alerts")?;
    if alerts.is_empty() {
        writeln!(out, "no fraud alerts")?;
    }
    for alert in alerts {
        writeln!(
            out,
            "{}\t{}\t{}",
            alert.created_at.format("%Y-%m-%d %H:%M"),
            alert.beneficiary_id,
            alert.details
        )?;
    }
    Ok(())
}

pub async fn delete_beneficiary<S, W>(store: Arc<S>, id: BeneficiaryId, out: &mut W) -> Result<()>
where
    S: RegistryStore + 'static,
    W: Write,
{
    let summary = Registry::new(store)
        .delete_beneficiary(id)
        .await
        .with_context(|| format!("failed to delete beneficiary {id}"))?;
    writeln!(
        out,
        "deleted beneficiary {id} ({} allocations, {} fraud alerts)",
        summary.allocations, summary.fraud_alerts
    )?;
    Ok(())
}

/// Device fix from `--lat`/`--lon`; both or neither
pub fn location(lat: Option<f64>, lon: Option<f64>) -> Result<Option<GeoLocation>> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Some(GeoLocation::new(lat, lon)?)),
        (None, None) => Ok(None),
        _ => anyhow::bail!("--lat and --lon must be given together"),
    }
}
