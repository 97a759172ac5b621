use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::errors::ServiceError;

/// Order lifecycle status. Persisted by name; the id mapping for the admin
/// console comes from the dictionary cache, never from string inspection in
/// the core.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum OrderStatus {
    Placed,
    AwaitingPayment,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Expired,
    Refunded,
}

impl OrderStatus {
    /// Parses the persisted status name.
    pub fn parse(name: &str) -> Result<Self, ServiceError> {
        name.parse()
            .map_err(|_| ServiceError::InternalError(format!("unknown order status '{name}'")))
    }

    /// Permitted transitions:
    ///
    /// ```text
    /// Placed -> AwaitingPayment -> Confirmed -> Shipped -> Delivered
    /// Cancelled from Placed, AwaitingPayment
    /// Expired   from AwaitingPayment
    /// Refunded  from Confirmed, Shipped, Delivered
    /// ```
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Placed, AwaitingPayment)
                | (Placed, Cancelled)
                | (AwaitingPayment, Confirmed)
                | (AwaitingPayment, Cancelled)
                | (AwaitingPayment, Expired)
                | (Confirmed, Shipped)
                | (Confirmed, Refunded)
                | (Shipped, Delivered)
                | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Validates a transition, producing the error surfaced to callers.
    pub fn ensure_transition(self, to: OrderStatus) -> Result<(), ServiceError> {
        if self.can_transition_to(to) {
            Ok(())
        } else {
            Err(ServiceError::InvalidTransition { from: self, to })
        }
    }

    /// A terminal status permits no further transitions. Delivered is not
    /// terminal: a delivered order can still be refunded.
    pub fn is_terminal(self) -> bool {
        use OrderStatus::*;
        matches!(self, Cancelled | Expired | Refunded)
    }

    /// Statuses from which a promo may still be applied or items edited.
    pub fn is_pre_confirmation(self) -> bool {
        matches!(self, OrderStatus::Placed | OrderStatus::AwaitingPayment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn happy_path_transitions_are_permitted() {
        use OrderStatus::*;
        assert!(Placed.can_transition_to(AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_and_expiry_edges() {
        use OrderStatus::*;
        assert!(Placed.can_transition_to(Cancelled));
        assert!(AwaitingPayment.can_transition_to(Cancelled));
        assert!(AwaitingPayment.can_transition_to(Expired));
        assert!(!Placed.can_transition_to(Expired));
        assert!(!Confirmed.can_transition_to(Cancelled));
    }

    #[test]
    fn refund_only_after_confirmation() {
        use OrderStatus::*;
        assert!(Confirmed.can_transition_to(Refunded));
        assert!(Shipped.can_transition_to(Refunded));
        assert!(Delivered.can_transition_to(Refunded));
        assert!(!Placed.can_transition_to(Refunded));
        assert!(!AwaitingPayment.can_transition_to(Refunded));
    }

    #[test]
    fn terminal_statuses_permit_nothing() {
        for from in OrderStatus::iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::iter() {
                assert!(
                    !from.can_transition_to(to),
                    "{from} should not transition to {to}"
                );
            }
        }
    }

    #[test]
    fn ensure_transition_reports_both_endpoints() {
        let err = OrderStatus::Delivered
            .ensure_transition(OrderStatus::Shipped)
            .unwrap_err();
        match err {
            ServiceError::InvalidTransition { from, to } => {
                assert_eq!(from, OrderStatus::Delivered);
                assert_eq!(to, OrderStatus::Shipped);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn names_round_trip_through_persistence() {
        for status in OrderStatus::iter() {
            assert_eq!(OrderStatus::parse(&status.to_string()).unwrap(), status);
        }
    }
}
