//! Exchange API clients: signed REST per account and the order stream.

mod rest;
mod sign;
mod stream;

pub use rest::{ApiError, RestClient, TradingApi};
pub use stream::{Envelope, OrderStream, StreamHandle};
