pub mod order_bridge;
pub mod order_listing;
pub mod reconciler;
pub mod session;

pub use order_bridge::OrderCreationBridge;
pub use order_listing::{ListingOutcome, OrderListingService};
pub use reconciler::{
    AcknowledgeResponder, CallbackChannel, CallbackOutcome, CallbackReconciler, RedirectResponder,
};
pub use session::SessionSigner;
