//! Gateway policy document generation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Decision;

/// Policy language version understood by the gateway
pub const POLICY_VERSION: &str = "2012-10-17";

/// Gateway action the statement grants or denies
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Context key carrying the resolved principal
pub const PRINCIPAL_CONTEXT_KEY: &str = "username";

/// Single allow/deny statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: String,
    pub effect: String,
    pub resource: String,
}

/// Statement container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyBody {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// Authorizer response returned to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub principal_id: String,
    pub policy_document: PolicyBody,
    pub context: Map<String, Value>,
}

impl PolicyDocument {
    /// Effect of the single statement
    pub fn effect(&self) -> &str {
        self.policy_document
            .statement
            .first()
            .map(|s| s.effect.as_str())
            .unwrap_or("Deny")
    }

    pub fn is_allowed(&self) -> bool {
        self.effect() == Decision::Allow.as_effect()
    }

    /// Principal recorded in the context map
    pub fn context_principal(&self) -> Option<&str> {
        self.context.get(PRINCIPAL_CONTEXT_KEY).and_then(Value::as_str)
    }
}

/// Build the gateway policy for a decision
///
/// Caller-supplied context is kept, except that the principal key is
/// always overwritten with `principal_id`.
pub fn generate_policy(
    principal_id: &str,
    decision: Decision,
    resource: &str,
    extra_context: Option<Map<String, Value>>,
) -> PolicyDocument {
    let mut context = extra_context.unwrap_or_default();
    context.insert(
        PRINCIPAL_CONTEXT_KEY.to_string(),
        Value::String(principal_id.to_string()),
    );

    PolicyDocument {
        principal_id: principal_id.to_string(),
        policy_document: PolicyBody {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                action: INVOKE_ACTION.to_string(),
                effect: decision.as_effect().to_string(),
                resource: resource.to_string(),
            }],
        },
        context,
    }
}
