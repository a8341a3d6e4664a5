/// Enrichment Engine
///
/// Derives the fields the Scoring Provider needs that the webhook itself does
/// not reliably carry:
/// 1. Country, from explicit bank-detail countries, then IBAN prefixes, then
///    the Identity Provider record
/// 2. Billing address, from payload bank data overlaid with the Identity
///    Provider address
/// 3. Customer identity (name, email, id)
///
/// Counterparty lookups go through a per-request [`CustomerDataCache`], so a
/// single webhook triggers at most one Identity Provider call per counterparty.
/// Lookup failures are logged and degrade to payload-only data.
use crate::errors::AppError;
use crate::models::{
    non_empty, BankDetails, BillingAddress, CustomerInfo, Party, PartyKind, TransactionRecord,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Lookup of counterparty records by id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when the party does not exist.
    async fn get_party_by_id(&self, id: &str, kind: PartyKind) -> Result<Option<Value>, AppError>;
}

/// Identity Provider responses for the lifetime of one webhook request.
///
/// Failed and not-found lookups are stored as `None` so they are not retried.
#[derive(Debug, Default)]
pub struct CustomerDataCache {
    entries: HashMap<(String, PartyKind), Option<Value>>,
}

impl CustomerDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer `None` means "never looked up".
    pub fn get(&self, id: &str, kind: PartyKind) -> Option<&Option<Value>> {
        self.entries.get(&(id.to_string(), kind))
    }

    pub fn insert(&mut self, id: &str, kind: PartyKind, value: Option<Value>) {
        self.entries.insert((id.to_string(), kind), value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the engine derived for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    /// ISO-2 or empty.
    pub country: String,
    pub billing_address: BillingAddress,
    pub customer: CustomerInfo,
}

pub struct EnrichmentEngine<'a> {
    provider: &'a dyn IdentityProvider,
    cache: &'a mut CustomerDataCache,
}

impl<'a> EnrichmentEngine<'a> {
    pub fn new(provider: &'a dyn IdentityProvider, cache: &'a mut CustomerDataCache) -> Self {
        Self { provider, cache }
    }

    /// Runs every enrichment step. Never fails.
    pub async fn enrich(&mut self, record: &TransactionRecord) -> Enrichment {
        let identity = self.lookup_counterparty(record).await;
        let identity = identity.as_ref();

        let enrichment = Enrichment {
            country: resolve_country(record, identity),
            billing_address: resolve_billing_address(record, identity),
            customer: resolve_customer_info(record, identity),
        };

        tracing::debug!(
            transaction_id = %record.id,
            identity_found = identity.is_some(),
            country = %enrichment.country,
            city = %enrichment.billing_address.city,
            customer_id = %enrichment.customer.customer_id,
            "Enrichment complete"
        );

        enrichment
    }

    /// Fetches the counterparty record, consulting the cache first.
    ///
    /// Parties without an id, or whose type has no Identity Provider
    /// collection, are never looked up.
    pub async fn lookup_counterparty(&mut self, record: &TransactionRecord) -> Option<Value> {
        let id = non_empty(record.counterparty_id.as_deref())?;
        let kind = record.counterparty_kind()?;

        if let Some(cached) = self.cache.get(id, kind) {
            tracing::debug!("Identity cache hit for {} {}", kind.as_str(), id);
            return cached.clone();
        }

        let value = match self.provider.get_party_by_id(id, kind).await {
            Ok(value) => value,
            Err(e) => {
                let err = AppError::Enrichment(format!(
                    "lookup of {} {} failed: {}",
                    kind.as_str(),
                    id,
                    e
                ));
                tracing::warn!("{}", err);
                None
            }
        };

        self.cache.insert(id, kind, value.clone());
        value
    }
}

/// Maps a free-form country name to ISO-2.
///
/// Known names come from a fixed table; other 2-letter inputs pass through
/// uppercased, and anything longer is truncated to its first two letters.
pub fn normalize_country_to_iso(country: &str) -> String {
    let trimmed = country.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_lowercase();
    if let Some(iso) = country_table(&lower) {
        return iso.to_string();
    }

    trimmed.chars().take(2).collect::<String>().to_uppercase()
}

fn country_table(name: &str) -> Option<&'static str> {
    let iso = match name {
        "lithuania" => "LT",
        "germany" | "germany branch" => "DE",
        "united states" | "usa" => "US",
        "united kingdom" | "uk" => "GB",
        "france" => "FR",
        "spain" => "ES",
        "italy" => "IT",
        "netherlands" => "NL",
        "belgium" => "BE",
        "austria" => "AT",
        "switzerland" => "CH",
        "poland" => "PL",
        "czech republic" => "CZ",
        "slovakia" => "SK",
        "hungary" => "HU",
        "slovenia" => "SI",
        "croatia" => "HR",
        "romania" => "RO",
        "bulgaria" => "BG",
        "latvia" => "LV",
        "estonia" => "EE",
        "finland" => "FI",
        "sweden" => "SE",
        "norway" => "NO",
        "denmark" => "DK",
        _ => return None,
    };
    Some(iso)
}

/// Country prefix of an IBAN, ignoring whitespace. Empty when too short.
pub fn extract_country_from_iban(iban: &str) -> String {
    let clean = strip_whitespace(iban);
    if clean.chars().count() < 2 {
        return String::new();
    }
    clean.chars().take(2).collect::<String>().to_uppercase()
}

pub fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Explicit bank-detail country, first found wins.
fn explicit_country(record: &TransactionRecord) -> Option<String> {
    record
        .parties
        .bank_details_by_precedence()
        .into_iter()
        .find_map(BankDetails::explicit_country)
        .map(normalize_country_to_iso)
}

/// IBAN-derived country, last found wins.
fn iban_country(record: &TransactionRecord) -> Option<String> {
    record
        .parties
        .bank_details_by_iban_order()
        .into_iter()
        .filter_map(BankDetails::iban)
        .last()
        .map(extract_country_from_iban)
        .filter(|c| !c.is_empty())
}

const IDENTITY_COUNTRY_PATHS: [&[&str]; 4] = [
    &["additionalDetails", "addressCountry"],
    &["bankDetails", "bankCountry"],
    &["payAccount", "country"],
    &["country"],
];

fn identity_country(identity: &Value) -> Option<String> {
    IDENTITY_COUNTRY_PATHS
        .iter()
        .find_map(|path| json_text(identity, path))
        .map(normalize_country_to_iso)
}

pub fn resolve_country(record: &TransactionRecord, identity: Option<&Value>) -> String {
    explicit_country(record)
        .or_else(|| iban_country(record))
        .or_else(|| identity.and_then(identity_country))
        .unwrap_or_default()
}

pub fn resolve_billing_address(record: &TransactionRecord, identity: Option<&Value>) -> BillingAddress {
    fn party_details(party: &Option<Party>) -> Option<&BankDetails> {
        party.as_ref().and_then(Party::bank_details)
    }

    let parties = &record.parties;

    let mut address = BillingAddress {
        city: [
            parties.bank_details.as_ref(),
            party_details(&parties.payee),
            party_details(&parties.payer),
        ]
        .into_iter()
        .flatten()
        .find_map(BankDetails::bank_address)
        .unwrap_or_default()
        .to_string(),
        line1: parties
            .bank_details_by_precedence()
            .into_iter()
            .find_map(BankDetails::bank_address)
            .unwrap_or_default()
            .to_string(),
        country: explicit_country(record)
            .or_else(|| iban_country(record))
            .unwrap_or_default(),
        ..Default::default()
    };

    let Some(identity) = identity else {
        return address;
    };

    if let Some(details) = identity.get("additionalDetails").filter(|v| v.is_object()) {
        let line1 = json_text(details, &["addressLine1"])
            .or_else(|| json_text(details, &["address"]));
        overlay(&mut address.line1, line1);
        overlay(&mut address.line2, json_text(details, &["addressLine2"]));
        overlay(&mut address.city, json_text(details, &["addressCity"]));
        overlay(&mut address.state, json_text(details, &["addressState"]));
        overlay(&mut address.zip, json_text(details, &["addressPostalCode"]));
        overlay_country(&mut address.country, json_text(details, &["addressCountry"]));
    } else if let Some(flat) = identity.get("address").filter(|v| v.is_object()) {
        let line1 = json_text(flat, &["line1"]).or_else(|| json_text(flat, &["street"]));
        overlay(&mut address.line1, line1);
        overlay(&mut address.line2, json_text(flat, &["line2"]));
        overlay(&mut address.city, json_text(flat, &["city"]));
        overlay(&mut address.state, json_text(flat, &["state"]));
        overlay(&mut address.zip, json_text(flat, &["postalCode"]));
        overlay_country(&mut address.country, json_text(flat, &["country"]));
    } else if address.country.is_empty() {
        overlay_country(
            &mut address.country,
            json_text(identity, &["payAccount", "country"]),
        );
    }

    address
}

pub fn resolve_customer_info(record: &TransactionRecord, identity: Option<&Value>) -> CustomerInfo {
    let customer_id = non_empty(record.counterparty_id.as_deref()).unwrap_or_default();
    let mut info = CustomerInfo::fallback(customer_id);

    if let Some(name) = record.counterparty().and_then(Party::name) {
        info.set_name(name);
    }

    if customer_id.is_empty() {
        return info;
    }

    if let Some(identity) = identity {
        let name = json_text(identity, &["name"])
            .or_else(|| json_text(identity, &["bankDetails", "accountHolderName"]));
        if let Some(name) = name {
            info.set_name(name);
        }
        if let Some(email) = json_text(identity, &["email"]) {
            info.email = email.to_string();
        }
    }

    info
}

fn overlay(field: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        *field = value.to_string();
    }
}

fn overlay_country(field: &mut String, value: Option<&str>) {
    let iso = value.map(normalize_country_to_iso).unwrap_or_default();
    if !iso.is_empty() {
        *field = iso;
    }
}

/// Non-empty string at `path` inside a JSON object.
fn json_text<'v>(value: &'v Value, path: &[&str]) -> Option<&'v str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    non_empty(current.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticProvider {
        response: Result<Option<Value>, AppError>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(response: Result<Option<Value>, AppError>) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn get_party_by_id(&self, _id: &str, _kind: PartyKind) -> Result<Option<Value>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn record(data: Value) -> TransactionRecord {
        let mut base = json!({
            "id": "pmt_1",
            "amount": "10.00",
            "currency": "EUR",
            "status": "COMPLETED",
            "createdAt": "2024-02-14T12:00:00Z"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), data.as_object()) {
            base.extend(extra.clone());
        }
        normalize(&json!({"id": "evt_1", "event": "PAYMENT.CREATED", "data": base})).unwrap()
    }

    #[test]
    fn test_normalize_country_to_iso() {
        assert_eq!(normalize_country_to_iso("Lithuania"), "LT");
        assert_eq!(normalize_country_to_iso("  germany branch "), "DE");
        assert_eq!(normalize_country_to_iso("UK"), "GB");
        assert_eq!(normalize_country_to_iso("de"), "DE");
        assert_eq!(normalize_country_to_iso("Portugal"), "PO");
        assert_eq!(normalize_country_to_iso(""), "");
    }

    #[test]
    fn test_extract_country_from_iban() {
        assert_eq!(extract_country_from_iban("lt12 1000 0111 0100 1000"), "LT");
        assert_eq!(extract_country_from_iban(" "), "");
        assert_eq!(extract_country_from_iban("D"), "");
    }

    #[test]
    fn test_explicit_country_beats_iban() {
        let record = record(json!({
            "bankDetails": {"country": "Germany"},
            "payer": {"id": "pyr_1", "bankDetails": {"iban": "FR7630006000011234567890189"}}
        }));
        assert_eq!(resolve_country(&record, None), "DE");
    }

    #[test]
    fn test_iban_last_found_wins() {
        let record = record(json!({
            "direction": "PAYIN",
            "from": {"id": "pyr_1", "bankDetails": {"iban": "DE89370400440532013000"}},
            "payee": {"id": "pye_1", "bankDetails": {"iban": "ES9121000418450200051332"}}
        }));
        assert_eq!(resolve_country(&record, None), "ES");
    }

    #[test]
    fn test_identity_country_is_last_resort() {
        let record = record(json!({"direction": "PAYIN", "from": {"id": "pyr_1"}}));
        let identity = json!({"payAccount": {"country": "Latvia"}, "country": "EE"});
        assert_eq!(resolve_country(&record, Some(&identity)), "LV");
        assert_eq!(resolve_country(&record, None), "");
    }

    #[test]
    fn test_billing_defaults_from_payload() {
        let record = record(json!({
            "payee": {"id": "pye_1", "bankDetails": {"bankAddress": "Vilnius", "country": "Lithuania"}}
        }));
        let address = resolve_billing_address(&record, None);
        assert_eq!(address.city, "Vilnius");
        assert_eq!(address.line1, "Vilnius");
        assert_eq!(address.country, "LT");
    }

    #[test]
    fn test_billing_overlay_prefers_additional_details() {
        let record = record(json!({
            "direction": "PAYIN",
            "from": {"id": "pyr_1", "bankDetails": {"iban": "LT121000011101001000"}}
        }));
        let identity = json!({
            "additionalDetails": {
                "addressLine1": "Gedimino pr. 1",
                "addressCity": "Vilnius",
                "addressPostalCode": "01103",
                "addressCountry": ""
            },
            "address": {"line1": "ignored", "city": "ignored"}
        });
        let address = resolve_billing_address(&record, Some(&identity));
        assert_eq!(address.line1, "Gedimino pr. 1");
        assert_eq!(address.city, "Vilnius");
        assert_eq!(address.zip, "01103");
        assert_eq!(address.country, "LT");
    }

    #[test]
    fn test_billing_pay_account_fills_empty_country() {
        let record = record(json!({"direction": "PAYIN", "from": {"id": "pyr_1"}}));
        let identity = json!({"payAccount": {"country": "Sweden"}});
        assert_eq!(resolve_billing_address(&record, Some(&identity)).country, "SE");
    }

    #[test]
    fn test_customer_info_fallbacks_and_identity_override() {
        let record = record(json!({
            "direction": "PAYIN",
            "from": {"id": "pyr_1", "name": "Nikita Buzov"}
        }));

        let info = resolve_customer_info(&record, None);
        assert_eq!(info.first_name, "Nikita");
        assert_eq!(info.last_name, "Buzov");
        assert_eq!(info.email, "pyr_1@placeholder.com");

        let identity = json!({"bankDetails": {"accountHolderName": "Jane van Dijk"}, "email": "jane@example.com"});
        let info = resolve_customer_info(&record, Some(&identity));
        assert_eq!(info.first_name, "Jane");
        assert_eq!(info.last_name, "van Dijk");
        assert_eq!(info.email, "jane@example.com");
        assert_eq!(info.customer_id, "pyr_1");
    }

    #[tokio::test]
    async fn test_lookup_is_cached_including_failures() {
        let provider = StaticProvider::new(Err(AppError::UpstreamApi("boom".to_string())));
        let mut cache = CustomerDataCache::new();
        let record = record(json!({"direction": "PAYIN", "from": {"id": "pyr_1", "type": "PAYER"}}));

        let mut engine = EnrichmentEngine::new(&provider, &mut cache);
        assert_eq!(engine.lookup_counterparty(&record).await, None);
        assert_eq!(engine.lookup_counterparty(&record).await, None);
        let enrichment = engine.enrich(&record).await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(enrichment.customer.first_name, "Unknown");
        assert_eq!(cache.get("pyr_1", PartyKind::Payer), Some(&None));
    }

    #[tokio::test]
    async fn test_pay_account_is_not_looked_up() {
        let provider = StaticProvider::new(Ok(Some(json!({"name": "Never Used"}))));
        let mut cache = CustomerDataCache::new();
        let record = record(json!({
            "direction": "PAYOUT",
            "to": {"id": "fac_1", "type": "PAY_ACCOUNT"}
        }));

        let enrichment = EnrichmentEngine::new(&provider, &mut cache).enrich(&record).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(enrichment.customer.customer_id, "fac_1");
        assert!(cache.is_empty());
    }
}
