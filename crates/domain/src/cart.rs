//! Cart validation.

use common::ProductId;
use serde::Serialize;
use storage::{CartItemRecord, ProductRecord, StoreTx};

use crate::error::DomainError;

/// Availability classification of a single cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// The requested quantity can be fulfilled right now.
    Available,
    /// The product exists but has zero stock.
    OutOfStock,
    /// Some stock exists, but less than the requested quantity.
    InsufficientStock,
    /// The product no longer exists or has been deactivated.
    Unavailable,
}

/// Validation outcome for one cart line.
#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    pub product_id: ProductId,
    pub status: LineStatus,
    /// Human-readable description of the problem, if any.
    pub issue: Option<String>,
    /// Stock level observed under the lock, when the product still exists.
    pub stock: Option<i64>,
}

/// Validation outcome for the whole cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartReport {
    pub valid: bool,
    pub lines: Vec<LineReport>,
}

/// A cart line joined to its product and observed stock, ready for the
/// checkout orchestrator. Only produced for available lines.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product: ProductRecord,
    pub quantity: u32,
    pub stock: i64,
}

/// Validates cart lines against the current product and stock state.
///
/// Stock rows are locked in ascending product id order — the same order
/// the checkout orchestrator uses — so the observed levels stay exact for
/// the rest of the caller's transaction. Callers that only want a report
/// (the cart-review endpoint) drop their transaction right after; the
/// checkout path keeps it open, which is what makes its re-check under
/// the same locks authoritative.
///
/// An empty cart produces an invalid report with no lines; distinguishing
/// "empty" from "has problems" is the caller's concern.
pub async fn validate<T: StoreTx>(
    tx: &mut T,
    items: &[CartItemRecord],
) -> Result<(Vec<CartLine>, CartReport), DomainError> {
    let mut sorted: Vec<&CartItemRecord> = items.iter().collect();
    sorted.sort_by_key(|item| item.product_id);

    let mut lines = Vec::new();
    let mut reports = Vec::new();

    for item in sorted {
        let product = tx.get_product(item.product_id).await?;
        let stock = tx.lock_stock(item.product_id).await?;

        let (status, issue, stock_level) = match (product, stock) {
            (Some(product), Some(stock)) if product.active => {
                if stock.stock == 0 {
                    (
                        LineStatus::OutOfStock,
                        Some(format!("{} is out of stock", product.name)),
                        Some(stock.stock),
                    )
                } else if (item.quantity as i64) > stock.stock {
                    (
                        LineStatus::InsufficientStock,
                        Some(format!(
                            "only {} of {} left, {} requested",
                            stock.stock, product.name, item.quantity
                        )),
                        Some(stock.stock),
                    )
                } else {
                    lines.push(CartLine {
                        product,
                        quantity: item.quantity,
                        stock: stock.stock,
                    });
                    (LineStatus::Available, None, Some(stock.stock))
                }
            }
            _ => (
                LineStatus::Unavailable,
                Some("product is no longer available".to_string()),
                None,
            ),
        };

        reports.push(LineReport {
            product_id: item.product_id,
            status,
            issue,
            stock: stock_level,
        });
    }

    let valid = !reports.is_empty() && reports.iter().all(|r| r.status == LineStatus::Available);
    let report = CartReport {
        valid,
        lines: reports,
    };
    Ok((lines, report))
}
