pub mod codec;
pub mod models;

pub use codec::{CodecError, TextEncoding, TradeCodec};
pub use models::{DecryptedOutcome, PaymentRequest, TradeEnvelope, TradeResult};
