//! Topic and consumer group names.

/// Topic carrying [`OrderPlacedEvent`](crate::OrderPlacedEvent)s.
pub const ORDERS_PLACED: &str = "orders.placed";

/// Topic carrying [`OrderShippedEvent`](crate::OrderShippedEvent)s.
pub const ORDERS_SHIPPED: &str = "orders.shipped";

/// Consumer group of the shipping service on `orders.placed`.
pub const SHIPPING_GROUP: &str = "shipping-group";

/// Consumer group of the order service on `orders.shipped`.
pub const ORDER_GROUP: &str = "order-group";

/// Suffix appended to a topic name to form its dead-letter topic.
pub const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// Resolved topic names for one deployment.
///
/// Every name carries the same prefix (for example `prod.`), so environments
/// sharing a broker stay isolated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub orders_placed: String,
    pub orders_shipped: String,
}

impl Topics {
    /// Builds topic names with the given prefix prepended.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            orders_placed: format!("{prefix}{ORDERS_PLACED}"),
            orders_shipped: format!("{prefix}{ORDERS_SHIPPED}"),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::with_prefix("")
    }
}

/// Returns the dead-letter topic for `topic`.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{topic}{DEAD_LETTER_SUFFIX}")
}
