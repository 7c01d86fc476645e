//! Inventory adjuster: one unit off each allocated stock line

use crate::store::WorkflowStore;
use crate::types::RegionalGoodsId;
use serde::{Deserialize, Serialize};

/// Stock line the adjuster could not decrement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryWarning {
    /// Line that was not decremented
    pub regional_goods_id: RegionalGoodsId,
    /// Goods name shown to the user
    pub goods_name: String,
    /// Store error text
    pub reason: String,
}

/// Stock line to decrement, with the name used in warnings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    /// Line to decrement
    pub regional_goods_id: RegionalGoodsId,
    /// Goods name used in warnings
    pub goods_name: String,
}

/// Decrements stock after a committed allocation
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryAdjuster;

impl InventoryAdjuster {
    /// Decrement each line by one, floored at zero, in order
    ///
    /// Reads the current quantity right before each write. A failed line is
    /// reported and the remaining lines are still processed; earlier
    /// decrements are not rolled back.
    pub async fn adjust<S>(&self, store: &S, lines: &[StockLine]) -> Vec<InventoryWarning>
    where
        S: WorkflowStore + ?Sized,
    {
        let mut warnings = Vec::new();
        for line in lines {
            if let Err(reason) = decrement(store, line.regional_goods_id).await {
                tracing::warn!(
                    regional_goods = %line.regional_goods_id,
                    goods = %line.goods_name,
                    %reason,
                    "stock decrement failed"
                );
                warnings.push(InventoryWarning {
                    regional_goods_id: line.regional_goods_id,
                    goods_name: line.goods_name.clone(),
                    reason,
                });
            }
        }
        warnings
    }
}

async fn decrement<S>(store: &S, id: RegionalGoodsId) -> Result<u32, String>
where
    S: WorkflowStore + ?Sized,
{
    let row = store
        .get_regional_goods(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "stock line no longer exists".to_string())?;
    let next = row.quantity.saturating_sub(1);
    store
        .update_regional_goods_quantity(id, next)
        .await
        .map_err(|e| e.to_string())?;
    tracing::debug!(regional_goods = %id, from = row.quantity, to = next, "stock decremented");
    Ok(next)
}
