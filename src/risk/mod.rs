//! Risk gate over fraud-scoring results.
//!
//! A scoring result carries two rule groups, `warn` and `deny`, each mapping a rule name
//! to whether it fired. Deny wins over warn; with nothing fired the attempt is allowed.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::warn;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
pub enum Determination {
    Allow,
    Warn,
    Deny,
}

impl Determination {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Warn => "Warn",
            Self::Deny => "Deny",
        }
    }
}

impl fmt::Display for Determination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Scoring services disagree on casing ("deny", "Deny"); accept any.
impl FromStr for Determination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "warn" => Ok(Self::Warn),
            "deny" => Ok(Self::Deny),
            other => Err(Error::InvalidInput(format!("unknown determination: {other}"))),
        }
    }
}

impl Serialize for Determination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Determination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

/// Rule groups produced by the fraud-scoring collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RiskParameters {
    pub warn: BTreeMap<String, bool>,
    pub deny: BTreeMap<String, bool>,
}

impl RiskParameters {
    /// Read rule groups from an untyped scoring result.
    ///
    /// Missing or `null` groups are empty. Only a literal `true` counts as fired; any
    /// other flag value is recorded as `false`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] if `value` is not an object, or a group is neither
    /// an object nor `null`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(groups) = value else {
            return Err(Error::InvalidInput(
                "risk parameters must be an object".to_string(),
            ));
        };

        Ok(Self {
            warn: read_group(groups, "warn")?,
            deny: read_group(groups, "deny")?,
        })
    }
}

fn read_group(groups: &Map<String, Value>, name: &str) -> Result<BTreeMap<String, bool>> {
    match groups.get(name) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(flags)) => Ok(flags
            .iter()
            .map(|(rule, fired)| (rule.clone(), matches!(fired, Value::Bool(true))))
            .collect()),
        Some(_) => Err(Error::InvalidInput(format!(
            "risk parameter group '{name}' must be an object"
        ))),
    }
}

impl<'de> Deserialize<'de> for RiskParameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

#[must_use]
pub fn classify(params: &RiskParameters) -> Determination {
    if params.deny.values().any(|fired| *fired) {
        return Determination::Deny;
    }
    if params.warn.values().any(|fired| *fired) {
        return Determination::Warn;
    }
    Determination::Allow
}

/// Classify an untyped scoring result.
///
/// # Errors
/// Returns [`Error::InvalidInput`] if `value` is not a two-group object.
pub fn classify_value(value: &Value) -> Result<Determination> {
    RiskParameters::from_value(value).map(|params| classify(&params))
}

/// Risk envelope delivered by the fraud-scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RiskEvent {
    #[serde(default)]
    pub signals: Vec<String>,
    /// Required: an envelope without rule groups cannot be classified.
    pub risk_params: RiskParameters,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub location: Value,
    #[serde(default, alias = "deviceId")]
    pub fingerprint_id: String,
    /// The collaborator's own verdict; informational, never authoritative.
    #[serde(
        default,
        alias = "riskSummary",
        deserialize_with = "lenient_determination",
        skip_serializing_if = "Option::is_none"
    )]
    pub risk_determination: Option<Determination>,
}

// An unrecognised collaborator verdict is dropped, never fatal to the envelope.
fn lenient_determination<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Determination>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let verdict = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(verdict)) => verdict,
        Some(other) => other.to_string(),
    };

    match verdict.parse() {
        Ok(determination) => Ok(Some(determination)),
        Err(err) => {
            warn!("ignoring collaborator verdict: {err}");
            Ok(None)
        }
    }
}

impl RiskEvent {
    #[must_use]
    pub fn classify(&self) -> Determination {
        classify(&self.risk_params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deny_takes_precedence() -> Result<()> {
        let value = json!({ "deny": { "a": false, "b": true }, "warn": { "c": true } });
        assert_eq!(classify_value(&value)?, Determination::Deny);
        Ok(())
    }

    #[test]
    fn warn_without_deny() -> Result<()> {
        let value = json!({ "deny": { "a": false }, "warn": { "c": true } });
        assert_eq!(classify_value(&value)?, Determination::Warn);
        Ok(())
    }

    #[test]
    fn empty_groups_allow() -> Result<()> {
        assert_eq!(
            classify_value(&json!({ "deny": {}, "warn": {} }))?,
            Determination::Allow
        );
        assert_eq!(classify(&RiskParameters::default()), Determination::Allow);
        Ok(())
    }

    #[test]
    fn missing_groups_are_empty() -> Result<()> {
        assert_eq!(classify_value(&json!({}))?, Determination::Allow);
        assert_eq!(
            classify_value(&json!({ "warn": { "vpn": true }, "deny": null }))?,
            Determination::Warn
        );
        Ok(())
    }

    #[test]
    fn only_literal_true_fires() -> Result<()> {
        let value = json!({ "deny": { "a": "true", "b": 1 }, "warn": {} });
        assert_eq!(classify_value(&value)?, Determination::Allow);
        Ok(())
    }

    #[test]
    fn non_object_is_invalid_input() {
        for value in [json!(null), json!([]), json!("deny"), json!(3)] {
            assert!(matches!(
                classify_value(&value),
                Err(Error::InvalidInput(_))
            ));
        }
        assert!(matches!(
            classify_value(&json!({ "deny": [true] })),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn determination_parses_any_case() -> Result<()> {
        assert_eq!("deny".parse::<Determination>()?, Determination::Deny);
        assert_eq!("Warn".parse::<Determination>()?, Determination::Warn);
        assert_eq!(" ALLOW ".parse::<Determination>()?, Determination::Allow);
        assert!("maybe".parse::<Determination>().is_err());
        Ok(())
    }

    #[test]
    fn risk_event_accepts_vendor_aliases() -> Result<(), serde_json::Error> {
        let event: RiskEvent = serde_json::from_value(json!({
            "signals": ["vpn", "new_device"],
            "riskParams": { "warn": { "vpn": true }, "deny": { "tor": false } },
            "location": { "city": "Lisbon" },
            "deviceId": "fp-123",
            "riskSummary": "warn"
        }))?;
        assert_eq!(event.fingerprint_id, "fp-123");
        assert_eq!(event.risk_determination, Some(Determination::Warn));
        assert_eq!(event.classify(), Determination::Warn);

        let rendered = serde_json::to_value(&event)?;
        assert_eq!(rendered["riskDetermination"], json!("Warn"));
        assert_eq!(rendered["fingerprintId"], json!("fp-123"));
        Ok(())
    }

    #[test]
    fn risk_event_rejects_malformed_params() {
        let result: Result<RiskEvent, _> =
            serde_json::from_value(json!({ "riskParams": ["deny"] }));
        assert!(result.is_err());
    }

    #[test]
    fn risk_event_requires_params() {
        for envelope in [
            json!({}),
            json!({ "signals": [], "fingerprintId": "fp" }),
            json!({ "riskParams": null }),
        ] {
            let result: Result<RiskEvent, _> = serde_json::from_value(envelope.clone());
            assert!(result.is_err(), "classified {envelope}");
        }
    }

    #[test]
    fn unknown_collaborator_verdict_is_ignored() -> Result<(), serde_json::Error> {
        let event: RiskEvent = serde_json::from_value(json!({
            "riskParams": { "warn": {}, "deny": {} },
            "riskSummary": "review"
        }))?;
        assert_eq!(event.risk_determination, None);
        assert_eq!(event.classify(), Determination::Allow);

        let event: RiskEvent = serde_json::from_value(json!({
            "riskParams": { "deny": { "tor": true } },
            "riskDetermination": 7
        }))?;
        assert_eq!(event.risk_determination, None);
        assert_eq!(event.classify(), Determination::Deny);
        Ok(())
    }
}
