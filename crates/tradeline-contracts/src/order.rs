//! Order rules: placement and delivery.
//!
//! Both commands move money in the same transition, so after the order
//! checks pass the balance outputs go through [`verify_payment`].
//!
//! ```text
//! ORDER_PLACING:   [O(Placed)?, B]  → [O(Placed),    B, B?]
//! ORDER_DELIVERED: [O(Placed),  B]  → [O(Delivered), B, B?]
//! ```

use rust_decimal::Decimal;
use tradeline_types::{Intent, OrderRecord, OrderStatus, ValidationError};

use crate::balance::verify_payment;
use crate::view::TransitionView;

type Result<T> = std::result::Result<T, ValidationError>;

pub(crate) fn verify_placing(view: &TransitionView<'_>, intent: &Intent) -> Result<()> {
    let (consumed, produced) = order_pair(view, intent, 0..=1)?;

    if produced.status != OrderStatus::Placed {
        return Err(ValidationError::InvalidStatusTransition {
            order: produced.logical_id.clone(),
            from: consumed.map(|o| o.status),
            to: produced.status,
        });
    }

    if let Some(previous) = consumed {
        if previous.status != OrderStatus::Placed {
            return Err(ValidationError::InvalidStatusTransition {
                order: previous.logical_id.clone(),
                from: Some(previous.status),
                to: produced.status,
            });
        }
        if previous.logical_id != produced.logical_id {
            return Err(ValidationError::LogicalIdentityViolation {
                consumed: previous.logical_id.clone(),
                produced: produced.logical_id.clone(),
            });
        }
        require_buyer(previous, intent)?;
    }

    require_buyer(produced, intent)?;
    require_seller(produced, intent)?;
    verify_terms(produced, intent)?;

    verify_payment(view, intent, intent.command.change_owner())
}

pub(crate) fn verify_delivered(view: &TransitionView<'_>, intent: &Intent) -> Result<()> {
    let (consumed, produced) = order_pair(view, intent, 1..=1)?;
    let Some(consumed) = consumed else {
        return Err(malformed(intent, "missing consumed order record".to_string()));
    };

    if consumed.logical_id != produced.logical_id {
        return Err(ValidationError::LogicalIdentityViolation {
            consumed: consumed.logical_id.clone(),
            produced: produced.logical_id.clone(),
        });
    }

    if !consumed.status.can_transition_to(produced.status) {
        return Err(ValidationError::InvalidStatusTransition {
            order: consumed.logical_id.clone(),
            from: Some(consumed.status),
            to: produced.status,
        });
    }

    if !consumed.same_terms(produced) {
        return Err(ValidationError::OrderTermsAltered {
            order: consumed.logical_id.clone(),
        });
    }

    require_buyer(produced, intent)?;
    require_seller(produced, intent)?;

    verify_payment(view, intent, intent.command.change_owner())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the (optional) consumed order and the single produced order,
/// with the number of consumed orders restricted to `allowed`.
fn order_pair<'a>(
    view: &TransitionView<'a>,
    intent: &Intent,
    allowed: std::ops::RangeInclusive<usize>,
) -> Result<(Option<&'a OrderRecord>, &'a OrderRecord)> {
    if !allowed.contains(&view.consumed_orders.len()) {
        return Err(malformed(
            intent,
            format!(
                "consumes {} order records, expected {} to {}",
                view.consumed_orders.len(),
                allowed.start(),
                allowed.end()
            ),
        ));
    }
    let [produced] = view.produced_orders.as_slice() else {
        return Err(malformed(
            intent,
            format!(
                "must produce exactly 1 order record, produces {}",
                view.produced_orders.len()
            ),
        ));
    };
    Ok((view.consumed_orders.first().copied(), produced))
}

fn require_buyer(order: &OrderRecord, intent: &Intent) -> Result<()> {
    if intent.is_signed_by(&order.buyer) {
        Ok(())
    } else {
        Err(ValidationError::UnauthorizedBuyer { buyer: order.buyer })
    }
}

fn require_seller(order: &OrderRecord, intent: &Intent) -> Result<()> {
    if intent.is_signed_by(&order.seller) {
        Ok(())
    } else {
        Err(ValidationError::UnauthorizedSeller {
            seller: order.seller,
        })
    }
}

fn verify_terms(order: &OrderRecord, intent: &Intent) -> Result<()> {
    if order.buyer == order.seller {
        return Err(malformed(intent, "buyer and seller are the same party".to_string()));
    }
    if order.price <= Decimal::ZERO {
        return Err(malformed(intent, format!("price must be positive, got {}", order.price)));
    }
    if order.down_payment_fraction < Decimal::ZERO || order.down_payment_fraction > Decimal::ONE {
        return Err(malformed(
            intent,
            format!(
                "down payment fraction {} outside 0..=1",
                order.down_payment_fraction
            ),
        ));
    }
    // Both legs move money, and a payment leg must be positive.
    match (order.down_payment(), order.balance_due()) {
        (Some(down), Some(due)) if down > 0 && due > 0 => Ok(()),
        (Some(down), Some(due)) => Err(malformed(
            intent,
            format!("down payment {down} and balance due {due} must both be positive"),
        )),
        _ => Err(malformed(intent, format!("price {} out of range", order.price))),
    }
}

fn malformed(intent: &Intent, reason: String) -> ValidationError {
    ValidationError::MalformedTransition {
        command: intent.command.to_string(),
        reason,
    }
}
