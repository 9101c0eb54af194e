//! Centralized capability checks.
//!
//! Every endpoint asks the same question the same way: may `actor`
//! perform `action` on `resource`? Keeping the table in one place keeps
//! permission logic out of route wiring.

use common::{ShopId, UserId};
use storage::{OrderGroupRecord, OrderRecord};

/// Who is acting. Identity is established by the upstream auth layer;
/// this module only decides what an identity may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A customer account.
    Customer(UserId),
    /// A shop staff account, carrying the shop it manages.
    ShopOwner { user_id: UserId, shop_id: ShopId },
    /// Internal jobs (scheduler, dispatcher).
    System,
}

/// What is being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ValidateCart,
    Checkout,
    CancelGroup,
    InitializePayment,
    TransitionOrder,
    CancelCustomerPending,
    CancelShopPending,
}

/// What it is being attempted on.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A customer's own cart / account-scoped operations.
    Customer(UserId),
    Group(&'a OrderGroupRecord),
    Order(&'a OrderRecord),
    Shop(ShopId),
}

/// Returns true if `actor` may perform `action` on `resource`.
pub fn allowed(actor: &Actor, action: Action, resource: &Resource<'_>) -> bool {
    match (actor, action, resource) {
        (Actor::System, _, _) => true,

        (
            Actor::Customer(user_id),
            Action::ValidateCart | Action::Checkout | Action::CancelCustomerPending,
            Resource::Customer(target),
        ) => user_id == target,

        (
            Actor::Customer(user_id),
            Action::CancelGroup | Action::InitializePayment,
            Resource::Group(group),
        ) => group.user_id == *user_id,

        (Actor::ShopOwner { shop_id, .. }, Action::TransitionOrder, Resource::Order(order)) => {
            order.shop_id == *shop_id
        }

        // The owner of a shop may bulk-cancel that shop's pending orders
        // (e.g. when closing up). Granting it to everyone *except* the
        // owner would make the operation unusable; pending product-owner
        // confirmation, the owner-only reading is the one implemented.
        (Actor::ShopOwner { shop_id, .. }, Action::CancelShopPending, Resource::Shop(target)) => {
            shop_id == target
        }

        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{
        FulfillmentMethod, GroupStatus, Money, OrderGroupId, OrderId, OrderStatus, PaymentMethod,
    };

    fn group(user_id: UserId) -> OrderGroupRecord {
        OrderGroupRecord {
            id: OrderGroupId::new(),
            user_id,
            shipping_address: None,
            fulfillment_method: FulfillmentMethod::Pickup,
            payment_method: PaymentMethod::Cash,
            status: GroupStatus::Pending,
            total: Money::zero(),
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    fn shop_order(shop_id: ShopId) -> OrderRecord {
        OrderRecord {
            id: OrderId::new(),
            group_id: OrderGroupId::new(),
            shop_id,
            status: OrderStatus::Pending,
            total: Money::zero(),
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            is_picked_up: false,
            delivery_date: None,
            created_at: Utc::now(),
            processing_at: None,
            shipped_at: None,
            completed_at: None,
            cancelled_at: None,
            restocked_at: None,
        }
    }

    #[test]
    fn customer_acts_only_on_own_group() {
        let user = UserId::new();
        let own = group(user);
        let other = group(UserId::new());

        let actor = Actor::Customer(user);
        assert!(allowed(&actor, Action::CancelGroup, &Resource::Group(&own)));
        assert!(!allowed(&actor, Action::CancelGroup, &Resource::Group(&other)));
        assert!(allowed(
            &actor,
            Action::InitializePayment,
            &Resource::Group(&own)
        ));
    }

    #[test]
    fn customer_checkout_is_self_scoped() {
        let user = UserId::new();
        let actor = Actor::Customer(user);
        assert!(allowed(&actor, Action::Checkout, &Resource::Customer(user)));
        assert!(!allowed(
            &actor,
            Action::Checkout,
            &Resource::Customer(UserId::new())
        ));
    }

    #[test]
    fn shop_owner_transitions_only_own_orders() {
        let shop = ShopId::new();
        let actor = Actor::ShopOwner {
            user_id: UserId::new(),
            shop_id: shop,
        };
        let own = shop_order(shop);
        let other = shop_order(ShopId::new());

        assert!(allowed(&actor, Action::TransitionOrder, &Resource::Order(&own)));
        assert!(!allowed(
            &actor,
            Action::TransitionOrder,
            &Resource::Order(&other)
        ));
    }

    #[test]
    fn shop_owner_bulk_cancels_own_shop() {
        let shop = ShopId::new();
        let actor = Actor::ShopOwner {
            user_id: UserId::new(),
            shop_id: shop,
        };
        assert!(allowed(&actor, Action::CancelShopPending, &Resource::Shop(shop)));
        assert!(!allowed(
            &actor,
            Action::CancelShopPending,
            &Resource::Shop(ShopId::new())
        ));
    }

    #[test]
    fn customers_cannot_touch_orders_or_shops() {
        let actor = Actor::Customer(UserId::new());
        let o = shop_order(ShopId::new());
        assert!(!allowed(&actor, Action::TransitionOrder, &Resource::Order(&o)));
        assert!(!allowed(
            &actor,
            Action::CancelShopPending,
            &Resource::Shop(ShopId::new())
        ));
    }

    #[test]
    fn system_may_do_anything() {
        let o = shop_order(ShopId::new());
        assert!(allowed(
            &Actor::System,
            Action::TransitionOrder,
            &Resource::Order(&o)
        ));
        assert!(allowed(
            &Actor::System,
            Action::CancelShopPending,
            &Resource::Shop(ShopId::new())
        ));
    }
}
