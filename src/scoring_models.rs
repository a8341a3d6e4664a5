//! Scoring Provider wire types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat transaction record accepted by the Scoring Provider.
///
/// Address and identity fields are always sent (possibly empty); card and bank
/// fields are omitted when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub trans_id: String,
    /// RFC 3339 UTC with millisecond precision.
    pub trans_ts: String,
    /// Major currency units.
    pub trans_amt: f64,
    pub trans_currency: String,
    pub platform_id: String,
    pub seller_id: String,

    pub cust_first_name: String,
    pub cust_last_name: String,
    pub cust_id: String,
    pub cust_email: String,

    pub bill_ad_first_name: String,
    pub bill_ad_last_name: String,
    pub bill_ad_name: String,

    pub pmt_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc_bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc_last_4_dig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_brand: Option<String>,

    pub bill_ad_city: String,
    pub bill_ad_ctry: String,
    pub bill_ad_line1: String,
    pub bill_ad_line2: String,
    pub bill_ad_state: String,
    pub bill_ad_zip: String,

    pub ship_ad_city: String,
    pub ship_ad_ctry: String,
    pub ship_ad_line1: String,
    pub ship_ad_line2: String,
    pub ship_ad_state: String,
    pub ship_ad_zip: String,

    pub order_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ba_iban: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ba_bic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ba_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidationIssue {
    pub datapoint: String,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScoringValidation {
    #[serde(default = "default_ok")]
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
}

impl Default for ScoringValidation {
    fn default() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }
}

fn default_ok() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub related_to: Vec<String>,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Evidence {
    #[serde(default)]
    pub signals: Vec<Signal>,
}

/// Scoring decision. Vendor-prefixed field spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ScoringResponse {
    #[serde(default, alias = "fraugster_approved", alias = "fraud_approved")]
    pub approved: Option<i64>,
    #[serde(
        default,
        alias = "frg_trans_id",
        alias = "fraugster_trans_id",
        alias = "fraud_trans_id"
    )]
    pub trans_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub is_liable: Option<bool>,
    #[serde(default)]
    pub liability_reason: Option<String>,
    #[serde(default)]
    pub validation: ScoringValidation,
    #[serde(default)]
    pub evidence: Option<Evidence>,
    #[serde(default, alias = "frg_device_id", alias = "fraud_device_id")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

impl ScoringResponse {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_code(self.approved)
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation.ok && !self.validation.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Declined,
    Approved,
    ManualReview,
    CustomAction,
    Unknown,
}

impl Verdict {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Verdict::Declined,
            Some(1) => Verdict::Approved,
            Some(2) => Verdict::ManualReview,
            Some(3) => Verdict::CustomAction,
            _ => Verdict::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Declined => "DECLINED",
            Verdict::Approved => "APPROVED",
            Verdict::ManualReview => "MANUAL_REVIEW",
            Verdict::CustomAction => "CUSTOM_ACTION",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
