//! Canonical, shape-independent types produced by normalization and enrichment.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Bank details attached to a party. Any subset may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub bic: Option<String>,
    #[serde(default)]
    pub account_holder_name: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub bank_address: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Alternate spelling some payloads use for `country`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_country: Option<String>,
}

impl BankDetails {
    /// Explicit country, preferring `country` over `bankCountry`.
    pub fn explicit_country(&self) -> Option<&str> {
        non_empty(self.country.as_deref()).or_else(|| non_empty(self.bank_country.as_deref()))
    }

    pub fn iban(&self) -> Option<&str> {
        non_empty(self.iban.as_deref())
    }

    pub fn bank_address(&self) -> Option<&str> {
        non_empty(self.bank_address.as_deref())
    }
}

/// A party object (`from`, `to`, `payer`, `payee`) as found in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default)]
    pub id: Option<String>,
    /// Upstream party kind, e.g. `PAYER`, `PAYEE`, `PAY_ACCOUNT`.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
}

impl Party {
    pub fn id(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(self.name.as_deref())
    }

    pub fn bank_details(&self) -> Option<&BankDetails> {
        self.bank_details.as_ref()
    }
}

/// Every party location a payload may carry, regardless of its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parties {
    /// Flat `data.bankDetails` (legacy shape).
    pub bank_details: Option<BankDetails>,
    pub payee: Option<Party>,
    pub payer: Option<Party>,
    pub from: Option<Party>,
    pub to: Option<Party>,
}

impl Parties {
    /// Bank details in explicit-country scan order:
    /// `bankDetails`, `payee`, `payer`, `from`, `to`.
    pub fn bank_details_by_precedence(&self) -> Vec<&BankDetails> {
        let mut all = Vec::with_capacity(5);
        all.extend(self.bank_details.as_ref());
        for party in [&self.payee, &self.payer, &self.from, &self.to] {
            all.extend(party.as_ref().and_then(Party::bank_details));
        }
        all
    }

    /// Bank details in IBAN scan order: `from`, `payer`, `to`, `payee`.
    pub fn bank_details_by_iban_order(&self) -> Vec<&BankDetails> {
        [&self.from, &self.payer, &self.to, &self.payee]
            .into_iter()
            .filter_map(|party| party.as_ref().and_then(Party::bank_details))
            .collect()
    }

    pub fn get(&self, role: CounterpartyRole) -> Option<&Party> {
        match role {
            CounterpartyRole::From => self.from.as_ref(),
            CounterpartyRole::To => self.to.as_ref(),
            CounterpartyRole::Payer => self.payer.as_ref(),
            CounterpartyRole::Payee => self.payee.as_ref(),
        }
    }
}

/// Which party of the payload is the customer being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterpartyRole {
    From,
    To,
    Payer,
    Payee,
}

impl CounterpartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterpartyRole::From => "from",
            CounterpartyRole::To => "to",
            CounterpartyRole::Payer => "payer",
            CounterpartyRole::Payee => "payee",
        }
    }

    /// Identity Provider collection a party in this role is looked up in
    /// when the payload does not state the party type.
    pub fn default_kind(&self) -> PartyKind {
        match self {
            CounterpartyRole::From | CounterpartyRole::Payer => PartyKind::Payer,
            CounterpartyRole::To | CounterpartyRole::Payee => PartyKind::Payee,
        }
    }
}

impl fmt::Display for CounterpartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity Provider collection (`/payers` or `/payees`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartyKind {
    Payer,
    Payee,
}

impl PartyKind {
    /// Maps an upstream party `type`. Unknown types (e.g. `PAY_ACCOUNT`) have no lookup.
    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "PAYER" => Some(PartyKind::Payer),
            "PAYEE" => Some(PartyKind::Payee),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Payer => "PAYER",
            PartyKind::Payee => "PAYEE",
        }
    }
}

/// Canonical transaction record, independent of the inbound payload shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub event_type: String,
    /// Major currency units.
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub reference: Option<String>,
    pub counterparty_role: CounterpartyRole,
    pub counterparty_id: Option<String>,
    /// Counterparty object exactly as received, when the payload had one.
    pub raw_party_snapshot: Option<Value>,
    pub payment_scheme: Option<String>,
    pub parties: Parties,
}

impl TransactionRecord {
    pub fn counterparty(&self) -> Option<&Party> {
        self.parties.get(self.counterparty_role)
    }

    /// Identity Provider collection for the counterparty, if it should be looked up at all.
    pub fn counterparty_kind(&self) -> Option<PartyKind> {
        match self.counterparty().and_then(|p| non_empty(p.kind.as_deref())) {
            Some(kind) => PartyKind::from_type(kind),
            None => Some(self.counterparty_role.default_kind()),
        }
    }
}

/// Billing address derived from payload bank data and the Identity Provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingAddress {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// ISO-2 or empty.
    pub country: String,
}

/// Customer identity sent to the Scoring Provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub customer_id: String,
}

impl CustomerInfo {
    /// Identity used when nothing better is known about the customer.
    pub fn fallback(customer_id: &str) -> Self {
        Self {
            first_name: "Unknown".to_string(),
            last_name: String::new(),
            email: placeholder_email(customer_id),
            customer_id: customer_id.to_string(),
        }
    }

    /// Replaces first/last name with a whitespace split of `full_name`.
    pub fn set_name(&mut self, full_name: &str) {
        let mut parts = full_name.split_whitespace();
        self.first_name = parts.next().unwrap_or("Unknown").to_string();
        self.last_name = parts.collect::<Vec<_>>().join(" ");
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

pub fn placeholder_email(customer_id: &str) -> String {
    format!("{}@placeholder.com", customer_id)
}

/// Treats `""` like an absent value, as the upstream payloads do.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
