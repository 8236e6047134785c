//! Domain models: orders as the exchange reports them and as we place them.

mod order;

pub use order::{OrderEvent, OrderRequest, OrderSide, OrderStatus, OrderType};
