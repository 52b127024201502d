// selector.rs — The `applies_to` agent selector.
//
// Policies carry a selector deciding which agents they cover. The selector is
// stored and exchanged as a short string ("all", "agent_id:<id>", ...), but is
// parsed exactly once, when the policy is loaded, into the `AppliesTo` enum.
// Evaluation never sees a raw string, so a malformed selector cannot silently
// degrade into "applies to everyone": it is rejected at load time instead.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// The attributes of an agent a selector can inspect.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySubject {
    pub agent_id: String,
    /// Agent kind, e.g. "ai_agent" or "mcp_server".
    pub agent_type: String,
    pub trust_score: f64,
}

/// Which agents a policy applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppliesTo {
    /// Every agent in the organization.
    All,
    /// Exactly one agent.
    AgentId(String),
    /// Agents of the given type.
    AgentType(String),
    /// Agents whose trust score is strictly below the threshold.
    TrustScoreBelow(f64),
}

impl AppliesTo {
    /// Does this selector cover the given agent?
    pub fn matches(&self, subject: &PolicySubject) -> bool {
        match self {
            AppliesTo::All => true,
            AppliesTo::AgentId(id) => subject.agent_id == *id,
            AppliesTo::AgentType(t) => subject.agent_type == *t,
            AppliesTo::TrustScoreBelow(threshold) => subject.trust_score < *threshold,
        }
    }
}

fn invalid(selector: &str, reason: impl Into<String>) -> PolicyError {
    PolicyError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

fn non_empty<'a>(selector: &str, value: &'a str) -> Result<&'a str, PolicyError> {
    let value = value.trim();
    if value.is_empty() {
        Err(invalid(selector, "missing value after ':'"))
    } else {
        Ok(value)
    }
}

impl FromStr for AppliesTo {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "all" {
            return Ok(AppliesTo::All);
        }
        if let Some(id) = trimmed.strip_prefix("agent_id:") {
            return Ok(AppliesTo::AgentId(non_empty(s, id)?.to_string()));
        }
        if let Some(t) = trimmed.strip_prefix("agent_type:") {
            return Ok(AppliesTo::AgentType(non_empty(s, t)?.to_string()));
        }
        if let Some(raw) = trimmed.strip_prefix("trust_score_below:") {
            let threshold: f64 = non_empty(s, raw)?
                .parse()
                .map_err(|_| invalid(s, format!("'{}' is not a number", raw.trim())))?;
            if !threshold.is_finite() {
                return Err(invalid(s, "threshold must be finite"));
            }
            return Ok(AppliesTo::TrustScoreBelow(threshold));
        }
        Err(invalid(
            s,
            "expected 'all', 'agent_id:<id>', 'agent_type:<type>' or 'trust_score_below:<n>'",
        ))
    }
}

impl TryFrom<String> for AppliesTo {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AppliesTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppliesTo::All => write!(f, "all"),
            AppliesTo::AgentId(id) => write!(f, "agent_id:{}", id),
            AppliesTo::AgentType(t) => write!(f, "agent_type:{}", t),
            AppliesTo::TrustScoreBelow(threshold) => write!(f, "trust_score_below:{}", threshold),
        }
    }
}

impl From<AppliesTo> for String {
    fn from(value: AppliesTo) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(agent_id: &str, agent_type: &str, trust_score: f64) -> PolicySubject {
        PolicySubject {
            agent_id: agent_id.to_string(),
            agent_type: agent_type.to_string(),
            trust_score,
        }
    }

    #[test]
    fn parses_every_selector_form() {
        assert_eq!("all".parse::<AppliesTo>().unwrap(), AppliesTo::All);
        assert_eq!(
            "agent_id:agent-7".parse::<AppliesTo>().unwrap(),
            AppliesTo::AgentId("agent-7".to_string())
        );
        assert_eq!(
            "agent_type:mcp_server".parse::<AppliesTo>().unwrap(),
            AppliesTo::AgentType("mcp_server".to_string())
        );
        assert_eq!(
            "trust_score_below:30".parse::<AppliesTo>().unwrap(),
            AppliesTo::TrustScoreBelow(30.0)
        );
    }

    #[test]
    fn rejects_unknown_syntax() {
        let err = "everyone".parse::<AppliesTo>().unwrap_err();
        assert!(err.to_string().contains("everyone"));
        assert!("agent_name:bob".parse::<AppliesTo>().is_err());
        assert!("".parse::<AppliesTo>().is_err());
    }

    #[test]
    fn rejects_missing_or_bad_values() {
        assert!("agent_id:".parse::<AppliesTo>().is_err());
        assert!("agent_type:  ".parse::<AppliesTo>().is_err());
        assert!("trust_score_below:low".parse::<AppliesTo>().is_err());
        assert!("trust_score_below:NaN".parse::<AppliesTo>().is_err());
    }

    #[test]
    fn trust_threshold_is_strict() {
        let sel = AppliesTo::TrustScoreBelow(30.0);
        assert!(sel.matches(&subject("a", "ai_agent", 29.9)));
        assert!(!sel.matches(&subject("a", "ai_agent", 30.0)));
    }

    #[test]
    fn id_and_type_selectors_compare_exactly() {
        let by_id = AppliesTo::AgentId("agent-1".to_string());
        assert!(by_id.matches(&subject("agent-1", "ai_agent", 50.0)));
        assert!(!by_id.matches(&subject("agent-10", "ai_agent", 50.0)));

        let by_type = AppliesTo::AgentType("mcp_server".to_string());
        assert!(by_type.matches(&subject("x", "mcp_server", 50.0)));
        assert!(!by_type.matches(&subject("x", "ai_agent", 50.0)));
    }

    #[test]
    fn serializes_as_selector_string() {
        let json = serde_json::to_string(&AppliesTo::TrustScoreBelow(30.0)).unwrap();
        assert_eq!(json, "\"trust_score_below:30\"");
        let restored: AppliesTo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, AppliesTo::TrustScoreBelow(30.0));
        assert!(serde_json::from_str::<AppliesTo>("\"nobody\"").is_err());
    }
}
