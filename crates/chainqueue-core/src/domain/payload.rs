//! Typed payloads for each [`TaskKind`] and the tagged union that carries them.
//!
//! The payload is immutable once a task is created. Decoding happens at
//! submission time so a malformed payload never enters the registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::kind::TaskKind;
use crate::typed::Task;

/// A signing key that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMarket {
    pub application_id: String,
    /// Application record as fetched by the caller; forwarded untouched.
    pub application_details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceBet {
    pub market_id: String,
    pub amount_usd: f64,
    pub outcome: String,
    pub from_private_key: PrivateKey,
    #[serde(default)]
    pub safe_address: Option<String>,
    #[serde(default = "default_auto_deposit")]
    pub auto_deposit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswer {
    pub market_id: String,
    pub outcome: String,
    pub confidence: f64,
    pub reasoning: String,
    pub from_private_key: PrivateKey,
    #[serde(default = "default_bond_amount")]
    pub bond_amount_xdai: f64,
    #[serde(default)]
    pub safe_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchAndSubmit {
    pub market_id: String,
    pub application_id: String,
    pub funding_program_name: String,
    #[serde(default)]
    pub funding_program_twitter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResolution {
    pub market_id: String,
    pub from_private_key: PrivateKey,
    #[serde(default)]
    pub safe_address: Option<String>,
}

fn default_auto_deposit() -> bool {
    true
}

fn default_bond_amount() -> f64 {
    0.01
}

/// One submitted operation: the kind plus its strongly-typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TaskRequest {
    CreateMarket(CreateMarket),
    PlaceBet(PlaceBet),
    SubmitAnswer(SubmitAnswer),
    ResearchAndSubmit(ResearchAndSubmit),
    FinalizeResolution(FinalizeResolution),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskRequest::CreateMarket(_) => TaskKind::CreateMarket,
            TaskRequest::PlaceBet(_) => TaskKind::PlaceBet,
            TaskRequest::SubmitAnswer(_) => TaskKind::SubmitAnswer,
            TaskRequest::ResearchAndSubmit(_) => TaskKind::ResearchAndSubmit,
            TaskRequest::FinalizeResolution(_) => TaskKind::FinalizeResolution,
        }
    }

    /// Decode an untyped JSON payload into the payload type of `kind`.
    pub fn decode(kind: TaskKind, payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            TaskKind::CreateMarket => TaskRequest::CreateMarket(serde_json::from_value(payload)?),
            TaskKind::PlaceBet => TaskRequest::PlaceBet(serde_json::from_value(payload)?),
            TaskKind::SubmitAnswer => TaskRequest::SubmitAnswer(serde_json::from_value(payload)?),
            TaskKind::ResearchAndSubmit => {
                TaskRequest::ResearchAndSubmit(serde_json::from_value(payload)?)
            }
            TaskKind::FinalizeResolution => {
                TaskRequest::FinalizeResolution(serde_json::from_value(payload)?)
            }
        })
    }

    /// The entity the operation targets, for log correlation.
    pub fn subject(&self) -> &str {
        match self {
            TaskRequest::CreateMarket(p) => &p.application_id,
            TaskRequest::PlaceBet(p) => &p.market_id,
            TaskRequest::SubmitAnswer(p) => &p.market_id,
            TaskRequest::ResearchAndSubmit(p) => &p.market_id,
            TaskRequest::FinalizeResolution(p) => &p.market_id,
        }
    }
}

macro_rules! impl_task {
    ($ty:ident) => {
        impl Task for $ty {
            const KIND: TaskKind = TaskKind::$ty;

            fn into_request(self) -> TaskRequest {
                TaskRequest::$ty(self)
            }

            fn from_request(request: &TaskRequest) -> Option<&Self> {
                match request {
                    TaskRequest::$ty(payload) => Some(payload),
                    _ => None,
                }
            }
        }
    };
}

impl_task!(CreateMarket);
impl_task!(PlaceBet);
impl_task!(SubmitAnswer);
impl_task!(ResearchAndSubmit);
impl_task!(FinalizeResolution);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_applies_defaults() {
        let request = TaskRequest::decode(
            TaskKind::PlaceBet,
            json!({
                "market_id": "0x8637",
                "amount_usd": 0.01,
                "outcome": "Yes",
                "from_private_key": "0xdeadbeef",
            }),
        )
        .unwrap();

        let TaskRequest::PlaceBet(bet) = &request else {
            panic!("expected PlaceBet, got {request:?}");
        };
        assert!(bet.auto_deposit);
        assert_eq!(bet.safe_address, None);
        assert_eq!(request.kind(), TaskKind::PlaceBet);
        assert_eq!(request.subject(), "0x8637");
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let err = TaskRequest::decode(TaskKind::SubmitAnswer, json!({ "market_id": "0x1" }));
        assert!(err.is_err());
    }

    #[test]
    fn private_key_is_redacted_in_debug() {
        let payload = FinalizeResolution {
            market_id: "0x1".into(),
            from_private_key: PrivateKey::new("0xsecret"),
            safe_address: None,
        };
        let debug = format!("{payload:?}");
        assert!(!debug.contains("0xsecret"));
        assert!(debug.contains("PrivateKey(***)"));
        assert_eq!(payload.from_private_key.expose(), "0xsecret");
    }

    #[test]
    fn tagged_wire_shape() {
        let request = CreateMarket {
            application_id: "app-1".into(),
            application_details: json!({ "name": "Supafund" }),
        }
        .into_request();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "create_market");
        assert_eq!(value["payload"]["application_id"], "app-1");
    }

    #[test]
    fn from_request_matches_only_its_own_variant() {
        let request = ResearchAndSubmit {
            market_id: "0x2".into(),
            application_id: "app-2".into(),
            funding_program_name: "Grants".into(),
            funding_program_twitter: None,
        }
        .into_request();
        assert!(ResearchAndSubmit::from_request(&request).is_some());
        assert!(CreateMarket::from_request(&request).is_none());
    }
}
