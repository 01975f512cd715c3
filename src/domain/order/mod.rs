// ============================================================================
// Order Domain - Aggregate, Value Objects, Outbound Events
// ============================================================================

pub mod aggregate;
pub mod events;
pub mod value_objects;

pub use aggregate::{generate_qr_code, generate_reference, Order, OrderDetails, OrderItem};
pub use events::*;
pub use value_objects::{OrderItemStatus, OrderStatus, Priority};
