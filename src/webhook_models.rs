use crate::errors::ValidationError;
use crate::models::{non_empty, BankDetails, CounterpartyRole, Parties, Party};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys whose presence in `data` marks the directional payload shape.
const DIRECTIONAL_KEYS: [&str; 5] = ["direction", "from", "to", "fromId", "toId"];

/// `data` of a payload carrying `payee`/`payer` and a flat `bankDetails`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyShape {
    #[serde(default)]
    pub payee: Option<Party>,
    #[serde(default)]
    pub payer: Option<Party>,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub payee_id: Option<String>,
}

/// `data` of a payload carrying `direction` with `from`/`to` parties.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionalShape {
    /// `PAYIN` or `PAYOUT`.
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub from: Option<Party>,
    #[serde(default)]
    pub to: Option<Party>,
    #[serde(default)]
    pub payer: Option<Party>,
    #[serde(default)]
    pub payee: Option<Party>,
    #[serde(default)]
    pub bank_details: Option<BankDetails>,
    #[serde(default)]
    pub from_id: Option<String>,
    #[serde(default)]
    pub to_id: Option<String>,
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub payee_id: Option<String>,
}

impl DirectionalShape {
    pub fn is_payout(&self) -> bool {
        self.direction.as_deref() == Some("PAYOUT")
    }
}

/// The two observed payload shapes, resolved once at the entry boundary.
#[derive(Debug, Clone)]
pub enum PayloadShape {
    Legacy(LegacyShape),
    Directional(DirectionalShape),
}

impl PayloadShape {
    /// Detects the shape of a `data` object and parses its party fields.
    pub fn detect(data: &Value) -> Result<Self, ValidationError> {
        let is_directional = DIRECTIONAL_KEYS
            .iter()
            .any(|key| data.get(key).is_some_and(|v| !v.is_null()));

        let parsed = if is_directional {
            serde_json::from_value(data.clone()).map(PayloadShape::Directional)
        } else {
            serde_json::from_value(data.clone()).map(PayloadShape::Legacy)
        };

        parsed.map_err(|e| ValidationError::InvalidField {
            field: "data".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            PayloadShape::Legacy(_) => "legacy",
            PayloadShape::Directional(_) => "directional",
        }
    }

    /// All party locations, regardless of shape.
    pub fn parties(&self) -> Parties {
        match self {
            PayloadShape::Legacy(shape) => Parties {
                bank_details: shape.bank_details.clone(),
                payee: shape.payee.clone(),
                payer: shape.payer.clone(),
                from: None,
                to: None,
            },
            PayloadShape::Directional(shape) => Parties {
                bank_details: shape.bank_details.clone(),
                payee: shape.payee.clone(),
                payer: shape.payer.clone(),
                from: shape.from.clone(),
                to: shape.to.clone(),
            },
        }
    }

    /// Counterparty role and id.
    ///
    /// Payouts score the receiving side (`to`, then `payeeId`, then `toId`).
    /// Everything else scores the sending side, falling back to the id fields
    /// in the order `fromId`, `toId`, `payerId`, `payeeId`.
    pub fn counterparty(&self) -> (CounterpartyRole, Option<String>) {
        match self {
            PayloadShape::Directional(shape) if shape.is_payout() => {
                let id = party_id(&shape.to)
                    .or_else(|| non_empty(shape.payee_id.as_deref()))
                    .or_else(|| non_empty(shape.to_id.as_deref()));
                (CounterpartyRole::To, id.map(str::to_string))
            }
            PayloadShape::Directional(shape) => {
                let id = party_id(&shape.from).or_else(|| {
                    first_id(&[
                        &shape.from_id,
                        &shape.to_id,
                        &shape.payer_id,
                        &shape.payee_id,
                    ])
                });
                (CounterpartyRole::From, id.map(str::to_string))
            }
            PayloadShape::Legacy(shape) => {
                let role = if shape.payer.is_some() || shape.payee.is_none() {
                    CounterpartyRole::Payer
                } else {
                    CounterpartyRole::Payee
                };
                let party = match role {
                    CounterpartyRole::Payee => &shape.payee,
                    _ => &shape.payer,
                };
                let id = party_id(party)
                    .or_else(|| first_id(&[&shape.payer_id, &shape.payee_id]));
                (role, id.map(str::to_string))
            }
        }
    }
}

fn party_id(party: &Option<Party>) -> Option<&str> {
    party.as_ref().and_then(Party::id)
}

fn first_id<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .find_map(|candidate| non_empty(candidate.as_deref()))
}

/// Response sent back to the webhook caller on success.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub verdict: String,
}
