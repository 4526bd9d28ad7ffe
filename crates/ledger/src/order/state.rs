//! Order state machine.

use std::str::FromStr;

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, stock is held.
    #[default]
    Pending,

    /// Sale realized (terminal state).
    Confirmed,

    /// Stock returned (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed in this state.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }

    /// Checks that an order in this state may move to `target`.
    ///
    /// Terminal states report `AlreadyTerminal`; any other disallowed move
    /// reports `InvalidTransition`.
    pub fn ensure_transition(&self, order_id: OrderId, target: OrderStatus) -> Result<()> {
        if self.is_terminal() {
            return Err(LedgerError::AlreadyTerminal {
                order_id,
                status: *self,
            });
        }

        let allowed = match target {
            OrderStatus::Confirmed => self.can_confirm(),
            OrderStatus::Cancelled => self.can_cancel(),
            OrderStatus::Pending => false,
        };
        if !allowed {
            return Err(LedgerError::InvalidTransition {
                order_id,
                current: *self,
                action: target.action(),
            });
        }
        Ok(())
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "reopen",
            OrderStatus::Confirmed => "confirm",
            OrderStatus::Cancelled => "cancel",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_only_pending_can_confirm_or_cancel() {
        assert!(OrderStatus::Pending.can_confirm());
        assert!(!OrderStatus::Confirmed.can_confirm());
        assert!(!OrderStatus::Cancelled.can_confirm());

        assert!(OrderStatus::Pending.can_cancel());
        assert!(!OrderStatus::Confirmed.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Confirmed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transition_from_terminal_is_already_terminal() {
        let id = OrderId::new();
        for status in [OrderStatus::Confirmed, OrderStatus::Cancelled] {
            for target in [OrderStatus::Confirmed, OrderStatus::Cancelled] {
                assert!(matches!(
                    status.ensure_transition(id, target),
                    Err(LedgerError::AlreadyTerminal { .. })
                ));
            }
        }
    }

    #[test]
    fn test_pending_to_pending_is_invalid() {
        let result = OrderStatus::Pending.ensure_transition(OrderId::new(), OrderStatus::Pending);
        assert!(matches!(
            result,
            Err(LedgerError::InvalidTransition { action: "reopen", .. })
        ));
        assert!(
            OrderStatus::Pending
                .ensure_transition(OrderId::new(), OrderStatus::Confirmed)
                .is_ok()
        );
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert_eq!("Canceled".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&OrderStatus::Confirmed).unwrap();
        assert_eq!(json, "\"confirmed\"");
        let deserialized: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, OrderStatus::Confirmed);
    }
}
