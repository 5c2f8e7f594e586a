//! Types shared across service boundaries.
//!
//! The order and shipping services share no database; everything they agree
//! on lives here: identifiers, topic names and the wire events.

pub mod events;
pub mod topics;
mod types;

pub use events::{EventCodecError, OrderPlacedEvent, OrderShippedEvent};
pub use topics::{Topics, dead_letter_topic};
pub use types::{OrderId, ProductId, ShipmentId};
