use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier value.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

integer_id!(
    /// Identifier of an order, assigned by the order store on creation.
    ///
    /// Also used as the partition key for every event about the order, so
    /// all events of one order land on the same partition.
    OrderId
);

integer_id!(
    /// Reference to a product in the external catalog.
    ProductId
);

integer_id!(
    /// Identifier of a shipment, assigned by the shipment store.
    ShipmentId
);

impl OrderId {
    /// Returns the partition key used when publishing events for this order.
    pub fn partition_key(&self) -> String {
        self.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_parses_plain_digits() {
        let id: OrderId = "7".parse().unwrap();
        assert_eq!(id, OrderId::new(7));
    }

    #[test]
    fn order_id_parse_trims_whitespace() {
        let id: OrderId = " 42\n".parse().unwrap();
        assert_eq!(id.as_i64(), 42);
    }

    #[test]
    fn order_id_rejects_non_numeric() {
        assert!("seven".parse::<OrderId>().is_err());
    }

    #[test]
    fn partition_key_is_decimal_string() {
        assert_eq!(OrderId::new(123).partition_key(), "123");
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ProductId::new(5)).unwrap();
        assert_eq!(json, "5");
    }
}
