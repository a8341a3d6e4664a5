//! Transaction Mapper: canonical record plus enrichment → Scoring Provider request.
//!
//! Pure and deterministic. Identical inputs always serialize to identical bytes.

use crate::enrichment::strip_whitespace;
use crate::models::{non_empty, BillingAddress, CustomerInfo, TransactionRecord};
use crate::scoring_models::ScoringRequest;
use bigdecimal::ToPrimitive;

const DEFAULT_PAYMENT_METHOD: &str = "bank_transfer";
const SEPA_PAYMENT_METHOD: &str = "sepa_transfer";
const SEPA_BRAND: &str = "SEPA";

#[derive(Debug, Clone)]
pub struct TransactionMapper {
    platform_id: String,
    seller_id: String,
}

impl TransactionMapper {
    pub fn new(platform_id: impl Into<String>, seller_id: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            seller_id: seller_id.into(),
        }
    }

    /// Builds the scoring request.
    ///
    /// `country` is the resolved transaction country and backs up an empty
    /// billing city or country.
    pub fn map(
        &self,
        record: &TransactionRecord,
        customer: &CustomerInfo,
        billing: &BillingAddress,
        country: &str,
    ) -> ScoringRequest {
        let bank = BankFields::from_record(record);

        let (pmt_method, bin_brand) = if is_sepa(record.payment_scheme.as_deref()) {
            (SEPA_PAYMENT_METHOD, Some(SEPA_BRAND.to_string()))
        } else {
            (DEFAULT_PAYMENT_METHOD, None)
        };

        let city = or_fallback(&billing.city, country);
        let billing_country = or_fallback(&billing.country, country);
        let name = customer.full_name();
        let bill_ad_name = if name.is_empty() {
            customer.first_name.clone()
        } else {
            name
        };

        ScoringRequest {
            trans_id: record.id.clone(),
            trans_ts: record
                .created_at
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            trans_amt: record.amount.to_f64().unwrap_or_default(),
            trans_currency: record.currency.clone(),
            platform_id: self.platform_id.clone(),
            seller_id: self.seller_id.clone(),

            cust_first_name: customer.first_name.clone(),
            cust_last_name: customer.last_name.clone(),
            cust_id: customer.customer_id.clone(),
            cust_email: customer.email.clone(),

            bill_ad_first_name: customer.first_name.clone(),
            bill_ad_last_name: customer.last_name.clone(),
            bill_ad_name,

            pmt_method: pmt_method.to_string(),
            cc_bin: bank.cc_bin,
            cc_last_4_dig: bank.cc_last_4,
            bin_brand,

            bill_ad_city: city.clone(),
            bill_ad_ctry: billing_country.clone(),
            bill_ad_line1: billing.line1.clone(),
            bill_ad_line2: billing.line2.clone(),
            bill_ad_state: billing.state.clone(),
            bill_ad_zip: billing.zip.clone(),

            ship_ad_city: city,
            ship_ad_ctry: billing_country,
            ship_ad_line1: billing.line1.clone(),
            ship_ad_line2: billing.line2.clone(),
            ship_ad_state: billing.state.clone(),
            ship_ad_zip: billing.zip.clone(),

            order_id: record.reference.clone().unwrap_or_else(|| record.id.clone()),

            ba_iban: bank.iban,
            ba_bic: bank.bic,
            ba_name: bank.holder,
        }
    }
}

/// Bank-account fields taken from the last party carrying an IBAN.
#[derive(Debug, Default)]
struct BankFields {
    cc_bin: Option<String>,
    cc_last_4: Option<String>,
    iban: Option<String>,
    bic: Option<String>,
    holder: Option<String>,
}

impl BankFields {
    fn from_record(record: &TransactionRecord) -> Self {
        let Some((details, iban)) = record
            .parties
            .bank_details_by_iban_order()
            .into_iter()
            .filter_map(|d| d.iban().map(|iban| (d, iban)))
            .last()
        else {
            return Self::default();
        };

        let clean: Vec<char> = strip_whitespace(iban).chars().collect();
        let cc_bin: String = clean.iter().take(6).collect();
        let cc_last_4: String = clean[clean.len().saturating_sub(4)..].iter().collect();

        Self {
            cc_bin: Some(cc_bin).filter(|s| !s.is_empty()),
            cc_last_4: Some(cc_last_4).filter(|s| !s.is_empty()),
            iban: Some(iban.to_string()),
            bic: non_empty(details.bic.as_deref()).map(str::to_string),
            holder: non_empty(details.account_holder_name.as_deref()).map(str::to_string),
        }
    }
}

fn is_sepa(scheme: Option<&str>) -> bool {
    matches!(scheme, Some("SCT") | Some("SEPA"))
}

fn or_fallback(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use serde_json::json;

    fn mapper() -> TransactionMapper {
        TransactionMapper::new("PayRepublic", "PayRepublic")
    }

    #[test]
    fn test_string_amount_and_iban_fields() {
        let record = normalize(&json!({
            "id": "evt_1",
            "event": "PAYMENT.CREATED",
            "data": {
                "id": "pmt_1",
                "amount": "150.00",
                "currency": "EUR",
                "status": "COMPLETED",
                "createdAt": "2024-02-14T12:00:00Z",
                "payer": {
                    "id": "pyr_1",
                    "bankDetails": {
                        "iban": "LT12 1000 0111 0100 1000",
                        "bic": "LIABLT2XXXX",
                        "accountHolderName": "Nikita Buzov"
                    }
                }
            }
        }))
        .unwrap();
        let customer = CustomerInfo::fallback("pyr_1");

        let request = mapper().map(&record, &customer, &BillingAddress::default(), "LT");

        assert_eq!(request.trans_amt, 150.0);
        assert_eq!(request.trans_ts, "2024-02-14T12:00:00.000Z");
        assert_eq!(request.pmt_method, "bank_transfer");
        assert_eq!(request.cc_bin.as_deref(), Some("LT1210"));
        assert_eq!(request.cc_last_4_dig.as_deref(), Some("1000"));
        assert_eq!(request.ba_iban.as_deref(), Some("LT12 1000 0111 0100 1000"));
        assert_eq!(request.ba_name.as_deref(), Some("Nikita Buzov"));
        assert_eq!(request.bill_ad_city, "LT");
        assert_eq!(request.ship_ad_ctry, "LT");
        assert_eq!(request.order_id, "pmt_1");
        assert_eq!(request.bin_brand, None);
    }

    #[test]
    fn test_sct_scheme_is_sepa_transfer() {
        let record = normalize(&json!({
            "id": "evt_2",
            "event": "PAYMENT.CREATED",
            "data": {
                "id": "pmt_2",
                "amount": 1000,
                "currency": "EUR",
                "status": "PENDING",
                "createdAt": 1_700_000_000_000_i64,
                "reference": "INV-42",
                "paymentScheme": "SCT"
            }
        }))
        .unwrap();

        let request = mapper().map(
            &record,
            &CustomerInfo::fallback(""),
            &BillingAddress::default(),
            "",
        );

        assert_eq!(request.pmt_method, "sepa_transfer");
        assert_eq!(request.bin_brand.as_deref(), Some("SEPA"));
        assert_eq!(request.trans_amt, 10.0);
        assert_eq!(request.order_id, "INV-42");
        assert_eq!(request.cc_bin, None);
    }

    #[test]
    fn test_bill_ad_name_without_last_name() {
        let record = normalize(&json!({
            "id": "evt_3",
            "event": "PAYMENT.CREATED",
            "data": {"id": "p", "amount": 1, "currency": "EUR", "status": "S", "createdAt": 0}
        }))
        .unwrap();
        let mut customer = CustomerInfo::fallback("c");
        customer.set_name("Cher");

        let request = mapper().map(&record, &customer, &BillingAddress::default(), "");
        assert_eq!(request.bill_ad_name, "Cher");
        assert_eq!(request.cust_last_name, "");
    }
}
