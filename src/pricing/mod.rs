use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::promotion::PromotionRejection;
use crate::error::DomainError;
use crate::storage::Storage;

// ============================================================================
// Pricing Engine - Stateless Subtotal / Discount Computation
// ============================================================================
//
// Pure preview: repeatable, persists nothing, never bumps a promotion's
// usage_count. An invalid promotion is a soft outcome carried in the quote,
// not an error, so the same computation can back both the simulation endpoint
// and order creation without aborting either.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub promotion_code: Option<String>,
    pub promotion_valid: bool,
    pub promotion_error: Option<String>,
}

pub struct PricingEngine {
    storage: Arc<dyn Storage>,
}

impl PricingEngine {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn quote(
        &self,
        lines: &[OrderLineRequest],
        promotion_code: Option<&str>,
    ) -> Result<Quote, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::validation("Order must contain at least one item"));
        }

        let mut quote_lines = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;

        for line in lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "Invalid quantity {} for product {}",
                    line.quantity, line.product_id
                )));
            }

            let product = self
                .storage
                .fetch_product(line.product_id)
                .await?
                .ok_or_else(|| {
                    DomainError::not_found(format!("Product {} not found", line.product_id))
                })?;

            if !product.is_active {
                return Err(DomainError::conflict(format!(
                    "Product {} is not active",
                    product.name
                )));
            }
            if product.price <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "Product {} has no valid price",
                    product.name
                )));
            }

            let line_total = product.price * Decimal::from(line.quantity);
            subtotal += line_total;
            quote_lines.push(QuoteLine {
                product_id: product.id,
                product_name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
                line_total,
            });
        }

        let mut quote = Quote {
            lines: quote_lines,
            subtotal,
            discount: Decimal::ZERO,
            total_amount: subtotal,
            promotion_code: promotion_code.map(str::to_string),
            promotion_valid: false,
            promotion_error: None,
        };

        let Some(code) = promotion_code else {
            return Ok(quote);
        };

        // Promotion failures are soft: the quote stays usable either way.
        let Some(promotion) = self.storage.fetch_promotion(code).await? else {
            quote.promotion_error = Some(format!("Invalid promotion code: {code}"));
            return Ok(quote);
        };

        if let Err(rejection) = promotion.check_valid(Utc::now()) {
            quote.promotion_error = Some(rejection.to_string());
            return Ok(quote);
        }

        if let Some(minimum) = promotion.minimum_order_amount {
            if subtotal < minimum {
                quote.promotion_error =
                    Some(PromotionRejection::BelowMinimum { minimum }.to_string());
                return Ok(quote);
            }
        }

        quote.discount = promotion.discount_for(subtotal);
        quote.total_amount = subtotal - quote.discount;
        quote.promotion_valid = true;

        tracing::debug!(
            code = %promotion.code,
            subtotal = %subtotal,
            discount = %quote.discount,
            "Promotion applied to quote"
        );

        Ok(quote)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
