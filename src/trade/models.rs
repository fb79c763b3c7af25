use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::codec::CodecError;

pub const RESPOND_TYPE_JSON: &str = "JSON";
pub const MERCHANT_ORDER_NO_MAX_LEN: usize = 30;

/// Outbound trade intent, serialized with the gateway's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "RespondType")]
    pub respond_type: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "MerchantOrderNo")]
    pub merchant_order_no: String,
    #[serde(rename = "Amt")]
    pub amount: u64,
    #[serde(rename = "ItemDesc")]
    pub item_desc: String,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "LoginType",
        skip_serializing_if = "Option::is_none",
        serialize_with = "flag"
    )]
    pub login_type: Option<bool>,
    #[serde(
        rename = "CREDIT",
        skip_serializing_if = "Option::is_none",
        serialize_with = "flag"
    )]
    pub credit: Option<bool>,
    #[serde(
        rename = "VACC",
        skip_serializing_if = "Option::is_none",
        serialize_with = "flag"
    )]
    pub vacc: Option<bool>,
    #[serde(rename = "ReturnURL", skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(rename = "NotifyURL", skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
    #[serde(rename = "ClientBackURL", skip_serializing_if = "Option::is_none")]
    pub client_back_url: Option<String>,
    #[serde(rename = "OrderComment", skip_serializing_if = "Option::is_none")]
    pub order_comment: Option<String>,
}

impl PaymentRequest {
    /// Creates a JSON-response request stamped with the current epoch seconds.
    pub fn new(
        merchant_id: impl Into<String>,
        version: impl Into<String>,
        merchant_order_no: impl Into<String>,
        amount: u64,
        item_desc: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            respond_type: RESPOND_TYPE_JSON.to_string(),
            timestamp: chrono::Utc::now().timestamp().to_string(),
            version: version.into(),
            merchant_order_no: merchant_order_no.into(),
            amount,
            item_desc: item_desc.into(),
            email: None,
            login_type: None,
            credit: None,
            vacc: None,
            return_url: None,
            notify_url: None,
            client_back_url: None,
            order_comment: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp.to_string();
        self
    }

    /// Amount must be positive; the order number is 1 to 30 ASCII letters,
    /// digits or underscores.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.amount == 0 {
            return Err(CodecError::InvalidRequest(
                "amount must be greater than 0".to_string(),
            ));
        }

        let order_no = &self.merchant_order_no;
        if order_no.is_empty() || order_no.len() > MERCHANT_ORDER_NO_MAX_LEN {
            return Err(CodecError::InvalidRequest(format!(
                "merchant order number must be 1 to {} characters",
                MERCHANT_ORDER_NO_MAX_LEN
            )));
        }
        if !order_no
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(CodecError::InvalidRequest(format!(
                "merchant order number {:?} must be ASCII letters, digits or underscores",
                order_no
            )));
        }

        Ok(())
    }
}

fn flag<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(enabled) => serializer.serialize_u8(u8::from(*enabled)),
        None => serializer.serialize_none(),
    }
}

/// The object actually posted to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEnvelope {
    #[serde(rename = "MerchantID")]
    pub merchant_id: String,
    #[serde(rename = "TradeInfo")]
    pub trade_info: String,
    #[serde(rename = "TradeSha")]
    pub trade_sha: String,
    #[serde(rename = "Version")]
    pub version: String,
}

/// Nested `Result` object of a decrypted gateway payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResult {
    #[serde(rename = "MerchantID", default)]
    pub merchant_id: Option<String>,
    #[serde(rename = "Amt", default, deserialize_with = "lenient_amount")]
    pub amount: Option<u64>,
    #[serde(rename = "TradeNo", default)]
    pub trade_no: Option<String>,
    #[serde(rename = "MerchantOrderNo", default)]
    pub merchant_order_no: Option<String>,
    #[serde(rename = "ItemDesc", default)]
    pub item_desc: Option<String>,
    #[serde(rename = "PaymentType", default)]
    pub payment_type: Option<String>,
    #[serde(rename = "RespondType", default)]
    pub respond_type: Option<String>,
    #[serde(rename = "PayTime", default)]
    pub pay_time: Option<String>,
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,
    #[serde(rename = "EscrowBank", default)]
    pub escrow_bank: Option<String>,
    #[serde(rename = "PayBankCode", default)]
    pub pay_bank_code: Option<String>,
    #[serde(rename = "PayerAccount5Code", default)]
    pub payer_account5_code: Option<String>,
    #[serde(rename = "CodeNo", default)]
    pub code_no: Option<String>,
}

/// Decrypted inbound `TradeInfo`. The gateway sends trade fields either flat
/// or nested under `Result`; accessors look at both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedOutcome {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub trade: TradeResult,
    #[serde(rename = "Result", default, deserialize_with = "lenient_result")]
    pub result: Option<TradeResult>,
}

impl DecryptedOutcome {
    pub fn is_success(&self) -> bool {
        is_success_status(&self.status)
    }

    pub fn status(&self) -> Option<&str> {
        Some(self.status.trim()).filter(|status| !status.is_empty())
    }

    pub fn merchant_id(&self) -> Option<&str> {
        self.trade
            .merchant_id
            .as_deref()
            .or_else(|| self.result.as_ref()?.merchant_id.as_deref())
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn merchant_order_no(&self) -> Option<&str> {
        self.trade
            .merchant_order_no
            .as_deref()
            .or_else(|| self.result.as_ref()?.merchant_order_no.as_deref())
    }

    pub fn amount(&self) -> Option<u64> {
        self.trade
            .amount
            .or_else(|| self.result.as_ref()?.amount)
    }

    pub fn trade_no(&self) -> Option<&str> {
        self.trade
            .trade_no
            .as_deref()
            .or_else(|| self.result.as_ref()?.trade_no.as_deref())
    }
}

/// The gateway reports success as `SUCCESS`; some channels send `1`.
pub fn is_success_status(status: &str) -> bool {
    status == "SUCCESS" || status == "1"
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_result<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TradeResult>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(object @ serde_json::Value::Object(_)) => serde_json::from_value(object).ok(),
        _ => None,
    })
}
