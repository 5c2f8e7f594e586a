//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PLACED ──► SHIPPED
/// ```
/// Transitions are monotonic: a shipped order never returns to placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order is persisted and announced, awaiting shipment.
    #[default]
    Placed,

    /// A shipment was created for the order (terminal state).
    Shipped,
}

impl OrderStatus {
    /// Returns true if a shipment confirmation moves the order forward.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Placed)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns the status as stored and rendered.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Shipped => "SHIPPED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLACED" => Ok(OrderStatus::Placed),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}
