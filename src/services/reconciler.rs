//! Gateway callback reconciliation.
//!
//! Both the browser return and the server-to-server notify run through
//! [`CallbackReconciler::reconcile`]; they differ only in the
//! [`CallbackResponder`] that turns the result into an HTTP response.
//! The payload is always forwarded to the order service, even when it cannot
//! be parsed locally, so a payment confirmation is never dropped here.

use std::fmt;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::order_service::{ForwardBody, OrderServiceClient, OrderServiceError};
use crate::trade::models::is_success_status;
use crate::trade::{CodecError, DecryptedOutcome, TradeCodec};

pub const MESSAGE_SUCCESS: &str = "付款成功";
pub const MESSAGE_FAILURE: &str = "付款失敗";
pub const MESSAGE_BACKEND_PENDING: &str = "付款資料處理中，請稍後確認";
pub const MESSAGE_TRANSPORT_PENDING: &str = "系統處理中，請稍後確認付款狀態";
pub const MESSAGE_CONTACT_SUPPORT: &str = "系統處理中，請聯繫客服確認付款狀態";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackChannel {
    Return,
    Notify,
}

impl fmt::Display for CallbackChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackChannel::Return => f.write_str("return"),
            CallbackChannel::Notify => f.write_str("notify"),
        }
    }
}

/// Flat form fields in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackFields(Vec<(String, String)>);

impl CallbackFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    Decoded(CallbackFields),
    Failed(String),
}

/// Result of checking the encrypted `TradeInfo`, when one was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeCheck {
    Absent,
    Verified(Box<DecryptedOutcome>),
    Rejected(CodecError),
}

#[derive(Debug)]
pub enum ForwardStatus {
    Forwarded,
    Failed(OrderServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success { order_no: String, raw_status: String },
    Failure { raw_status: String },
    ProcessingError { reason: String },
}

#[derive(Debug)]
pub struct Reconciliation {
    pub channel: CallbackChannel,
    pub decode: DecodeStatus,
    pub trade: TradeCheck,
    pub forward: ForwardStatus,
    pub outcome: CallbackOutcome,
}

impl Reconciliation {
    pub fn forwarded(&self) -> bool {
        matches!(self.forward, ForwardStatus::Forwarded)
    }
}

/// Terminal step of the callback flow.
pub trait CallbackResponder {
    fn respond(&self, reconciliation: &Reconciliation) -> Response;
}

/// Browser return: 302 to the result page with `status`, `orderNo`, `message`.
#[derive(Debug, Clone)]
pub struct RedirectResponder {
    result_path: String,
}

impl RedirectResponder {
    pub fn new(result_path: impl Into<String>) -> Self {
        Self {
            result_path: result_path.into(),
        }
    }

    pub fn location(&self, outcome: &CallbackOutcome) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        match outcome {
            CallbackOutcome::Success { order_no, .. } => {
                query.append_pair("status", "success");
                if !order_no.is_empty() {
                    query.append_pair("orderNo", order_no);
                }
                query.append_pair("message", MESSAGE_SUCCESS);
            }
            CallbackOutcome::Failure { .. } => {
                query.append_pair("status", "failure");
                query.append_pair("message", MESSAGE_FAILURE);
            }
            CallbackOutcome::ProcessingError { reason } => {
                query.append_pair("status", "error");
                query.append_pair("message", reason);
            }
        }

        format!("{}?{}", self.result_path, query.finish())
    }
}

impl CallbackResponder for RedirectResponder {
    fn respond(&self, reconciliation: &Reconciliation) -> Response {
        let location = self.location(&reconciliation.outcome);
        (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
    }
}

/// Notify: plain-text acknowledgment that depends only on the forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcknowledgeResponder;

impl CallbackResponder for AcknowledgeResponder {
    fn respond(&self, reconciliation: &Reconciliation) -> Response {
        if reconciliation.forwarded() {
            (StatusCode::OK, "OK").into_response()
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "Error").into_response()
        }
    }
}

#[derive(Clone)]
pub struct CallbackReconciler {
    client: OrderServiceClient,
    codec: TradeCodec,
}

impl CallbackReconciler {
    pub fn new(client: OrderServiceClient, codec: TradeCodec) -> Self {
        Self { client, codec }
    }

    pub async fn handle<R: CallbackResponder>(
        &self,
        channel: CallbackChannel,
        body: &[u8],
        responder: &R,
    ) -> Response {
        let reconciliation = self.reconcile(channel, body).await;
        responder.respond(&reconciliation)
    }

    pub async fn reconcile(&self, channel: CallbackChannel, body: &[u8]) -> Reconciliation {
        let decode = decode_fields(body);

        let (trade, forward_body) = match &decode {
            DecodeStatus::Decoded(fields) => {
                tracing::info!(
                    %channel,
                    status = fields.get("Status").unwrap_or("-"),
                    order_no = fields.get("MerchantOrderNo").unwrap_or("-"),
                    "gateway callback received"
                );
                (
                    self.check_trade(fields),
                    ForwardBody::Fields(fields.pairs().to_vec()),
                )
            }
            DecodeStatus::Failed(reason) => {
                tracing::warn!(%channel, reason = %reason, "undecodable gateway callback, forwarding raw body");
                (TradeCheck::Absent, ForwardBody::Raw(body.to_vec()))
            }
        };

        if let TradeCheck::Rejected(err) = &trade {
            tracing::warn!(%channel, error = %err, "gateway callback failed integrity check");
        }

        let forward = match self.client.forward_notify(forward_body).await {
            Ok(()) => ForwardStatus::Forwarded,
            Err(err) => {
                tracing::error!(%channel, error = %err, "failed to forward gateway callback");
                ForwardStatus::Failed(err)
            }
        };

        let outcome = resolve_outcome(&decode, &trade, &forward);
        tracing::info!(%channel, outcome = ?outcome, "gateway callback reconciled");

        Reconciliation {
            channel,
            decode,
            trade,
            forward,
            outcome,
        }
    }

    /// Verifies `TradeSha`, decrypts `TradeInfo`, and matches merchant and
    /// version against our configuration.
    pub fn check_trade(&self, fields: &CallbackFields) -> TradeCheck {
        match self.verify_trade(fields) {
            Ok(Some(outcome)) => TradeCheck::Verified(Box::new(outcome)),
            Ok(None) => TradeCheck::Absent,
            Err(err) => TradeCheck::Rejected(err),
        }
    }

    fn verify_trade(&self, fields: &CallbackFields) -> Result<Option<DecryptedOutcome>, CodecError> {
        self.match_origin(fields.get("MerchantID"), fields.get("Version"))?;

        let Some(trade_info) = fields.get("TradeInfo") else {
            return Ok(None);
        };
        if let Some(trade_sha) = fields.get("TradeSha") {
            self.codec.verify(trade_info, trade_sha)?;
        }

        let outcome = self.codec.decode(trade_info)?;
        match outcome.merchant_id() {
            Some(_) => self.match_origin(outcome.merchant_id(), outcome.version())?,
            None => {
                return Err(CodecError::Integrity(
                    "decrypted payload has no MerchantID".to_string(),
                ))
            }
        }
        match_flat_field("Status", fields.get("Status"), outcome.status())?;
        match_flat_field(
            "MerchantOrderNo",
            fields.get("MerchantOrderNo"),
            outcome.merchant_order_no(),
        )?;

        Ok(Some(outcome))
    }

    fn match_origin(&self, merchant_id: Option<&str>, version: Option<&str>) -> Result<(), CodecError> {
        if let Some(merchant_id) = merchant_id {
            if merchant_id != self.codec.merchant_id() {
                return Err(CodecError::Integrity(format!(
                    "unexpected MerchantID {}",
                    merchant_id
                )));
            }
        }
        if let Some(version) = version {
            if version != self.codec.version() {
                return Err(CodecError::Integrity(format!(
                    "unexpected Version {}",
                    version
                )));
            }
        }
        Ok(())
    }
}

/// Flat fields ride outside the signature, so they must agree with the
/// decrypted payload.
fn match_flat_field(name: &str, flat: Option<&str>, decrypted: Option<&str>) -> Result<(), CodecError> {
    match (flat, decrypted) {
        (Some(flat), Some(decrypted)) if flat != decrypted => Err(CodecError::Integrity(format!(
            "flat {} {} disagrees with TradeInfo {}",
            name, flat, decrypted
        ))),
        _ => Ok(()),
    }
}

/// A gateway payload is form-encoded UTF-8 carrying `Status` or `TradeInfo`.
pub fn decode_fields(body: &[u8]) -> DecodeStatus {
    let text = match std::str::from_utf8(body) {
        Ok(text) => text.trim(),
        Err(_) => return DecodeStatus::Failed("body is not valid UTF-8".to_string()),
    };
    if text.is_empty() {
        return DecodeStatus::Failed("empty body".to_string());
    }

    let fields = CallbackFields(
        url::form_urlencoded::parse(text.as_bytes())
            .into_owned()
            .filter(|(key, _)| !key.is_empty())
            .collect(),
    );

    if fields.get("Status").is_none() && fields.get("TradeInfo").is_none() {
        return DecodeStatus::Failed("neither Status nor TradeInfo present".to_string());
    }

    DecodeStatus::Decoded(fields)
}

pub fn resolve_outcome(
    decode: &DecodeStatus,
    trade: &TradeCheck,
    forward: &ForwardStatus,
) -> CallbackOutcome {
    let fields = match (decode, forward) {
        (DecodeStatus::Failed(_), ForwardStatus::Failed(_)) => {
            return processing_error(MESSAGE_CONTACT_SUPPORT)
        }
        (_, ForwardStatus::Failed(err)) if err.is_transport() => {
            return processing_error(MESSAGE_TRANSPORT_PENDING)
        }
        (_, ForwardStatus::Failed(_)) => return processing_error(MESSAGE_BACKEND_PENDING),
        (DecodeStatus::Failed(_), ForwardStatus::Forwarded) => {
            return processing_error(MESSAGE_BACKEND_PENDING)
        }
        (DecodeStatus::Decoded(fields), ForwardStatus::Forwarded) => fields,
    };

    let decrypted = match trade {
        TradeCheck::Rejected(_) => return processing_error(MESSAGE_BACKEND_PENDING),
        TradeCheck::Verified(outcome) => Some(outcome.as_ref()),
        TradeCheck::Absent => None,
    };

    // A verified TradeInfo is authoritative over the unsigned flat fields.
    let raw_status = decrypted
        .and_then(|outcome| outcome.status())
        .or_else(|| fields.get("Status"))
        .unwrap_or_default()
        .to_string();

    if is_success_status(&raw_status) {
        let order_no = decrypted
            .and_then(|outcome| outcome.merchant_order_no())
            .or_else(|| fields.get("MerchantOrderNo"))
            .unwrap_or_default()
            .to_string();
        CallbackOutcome::Success {
            order_no,
            raw_status,
        }
    } else {
        CallbackOutcome::Failure { raw_status }
    }
}

fn processing_error(reason: &str) -> CallbackOutcome {
    CallbackOutcome::ProcessingError {
        reason: reason.to_string(),
    }
}
