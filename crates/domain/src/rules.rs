//! The order transition rule table.
//!
//! Pure functions only: the [`orders`](crate::orders) executor calls
//! [`check_transition`] twice per transition — once on entry and once
//! after re-reading the rows under their locks — so the rules must not
//! touch the store.

use chrono::{DateTime, Utc};
use common::{FulfillmentMethod, OrderStatus, PaymentMethod};
use storage::{OrderGroupRecord, OrderRecord};

use crate::error::DomainError;

/// A requested order status transition.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    /// Required when shipping; must be in the future.
    pub delivery_date: Option<DateTime<Utc>>,
    /// Explicit confirmation that a cash order was paid on completion.
    pub mark_paid: bool,
}

impl TransitionRequest {
    /// A plain transition with no extra fields.
    pub fn to(target: OrderStatus) -> Self {
        Self {
            target,
            delivery_date: None,
            mark_paid: false,
        }
    }

    /// Attaches a delivery date (for shipping).
    pub fn with_delivery_date(mut self, date: DateTime<Utc>) -> Self {
        self.delivery_date = Some(date);
        self
    }

    /// Marks a cash order paid as part of completion.
    pub fn with_mark_paid(mut self) -> Self {
        self.mark_paid = true;
        self
    }
}

/// Checks whether `request` is legal for `order` within `group`.
///
/// | Target     | Allowed source(s)                      | Extra precondition |
/// |------------|----------------------------------------|--------------------|
/// | processing | pending                                | digital group paid |
/// | shipped    | processing                             | delivery only; digital group paid; future delivery date |
/// | completed  | processing (pickup) / shipped (delivery) | digital group paid; cash paid or `mark_paid` |
/// | cancelled  | pending, processing                    | — |
///
/// A transition to the order's current status is always rejected.
pub fn check_transition(
    order: &OrderRecord,
    group: &OrderGroupRecord,
    request: &TransitionRequest,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    if request.target == order.status {
        return Err(DomainError::AlreadyInState {
            status: order.status,
        });
    }

    let illegal = || DomainError::InvalidStatusTransition {
        from: order.status,
        to: request.target,
    };

    match request.target {
        OrderStatus::Pending => Err(illegal()),

        OrderStatus::Processing => {
            if order.status != OrderStatus::Pending {
                return Err(illegal());
            }
            require_digital_paid(order, group)?;
            Ok(())
        }

        OrderStatus::Shipped => {
            if order.status != OrderStatus::Processing {
                return Err(illegal());
            }
            if group.fulfillment_method == FulfillmentMethod::Pickup {
                // pickup orders never ship
                return Err(illegal());
            }
            require_digital_paid(order, group)?;
            match request.delivery_date {
                None => Err(DomainError::InvalidDeliveryDate {
                    reason: "a delivery date is required to ship",
                }),
                Some(date) if date <= now => Err(DomainError::InvalidDeliveryDate {
                    reason: "the delivery date is in the past",
                }),
                Some(_) => Ok(()),
            }
        }

        OrderStatus::Completed => {
            let required_source = match group.fulfillment_method {
                FulfillmentMethod::Pickup => OrderStatus::Processing,
                FulfillmentMethod::Delivery => OrderStatus::Shipped,
            };
            if order.status != required_source {
                return Err(illegal());
            }
            match group.payment_method {
                PaymentMethod::Digital => require_digital_paid(order, group),
                PaymentMethod::Cash => {
                    if order.is_paid || request.mark_paid {
                        Ok(())
                    } else {
                        Err(DomainError::InvalidPaymentStatus {
                            reason: "a cash order must be confirmed paid to complete",
                        })
                    }
                }
            }
        }

        OrderStatus::Cancelled => {
            if order.status.can_cancel() {
                Ok(())
            } else {
                Err(illegal())
            }
        }
    }
}

fn require_digital_paid(
    order: &OrderRecord,
    group: &OrderGroupRecord,
) -> Result<(), DomainError> {
    if group.payment_method == PaymentMethod::Digital && !order.is_paid {
        return Err(DomainError::InvalidPaymentStatus {
            reason: "the order group has not been paid",
        });
    }
    Ok(())
}
