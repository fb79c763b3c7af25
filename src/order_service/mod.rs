pub mod client;
pub mod models;

pub use client::{ForwardBody, OrderServiceClient, OrderServiceError};
pub use models::{CreateOrderRequest, Order, OrderListing, OrderStats, PaymentLink};
