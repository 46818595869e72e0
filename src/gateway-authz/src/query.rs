//! Authorization query construction
//!
//! Serializes to the policy store's `IsAuthorized` request shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::claims::PrincipalIdentity;
use crate::config::AuthorizerConfig;

/// Attribute key that always carries the principal's group
pub const GROUP_ATTRIBUTE: &str = "group";

/// Typed attribute value
///
/// Only strings are produced today. Numeric and boolean variants belong
/// here once the identity provider emits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::String(value.into())
    }

    /// Wrap a raw claim value
    ///
    /// Non-string JSON values are carried as their JSON text.
    pub fn from_claim(value: &Value) -> Self {
        match value {
            Value::String(s) => AttributeValue::String(s.clone()),
            other => {
                debug!(value_type = json_type_name(other), "Wrapping non-string attribute as string");
                AttributeValue::String(other.to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::String(s) => s,
        }
    }
}

/// Entity reference (type + id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityIdentifier {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityIdentifier {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// Action reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionIdentifier {
    pub action_type: String,
    pub action_id: String,
}

/// Entity with attributes supplied alongside the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityItem {
    pub identifier: EntityIdentifier,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// Auxiliary entity list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesDefinition {
    pub entity_list: Vec<EntityItem>,
}

/// Query submitted to the policy decision service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationQuery {
    pub policy_store_id: String,
    pub principal: EntityIdentifier,
    pub action: ActionIdentifier,
    pub resource: EntityIdentifier,
    pub entities: EntitiesDefinition,
}

impl AuthorizationQuery {
    /// Auxiliary entry describing the principal
    pub fn principal_entity(&self) -> Option<&EntityItem> {
        self.entities
            .entity_list
            .iter()
            .find(|item| item.identifier == self.principal)
    }

    /// Principal attributes as plain strings
    pub fn principal_attributes(&self) -> BTreeMap<&str, &str> {
        self.principal_entity()
            .map(|item| {
                item.attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builds queries for one policy store and entity namespace
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    policy_store_id: String,
    user_type: String,
    action_type: String,
    resource_type: String,
}

impl QueryBuilder {
    pub fn new(policy_store_id: impl Into<String>, namespace: &str) -> Self {
        Self {
            policy_store_id: policy_store_id.into(),
            user_type: format!("{}::User", namespace),
            action_type: format!("{}::Action", namespace),
            resource_type: format!("{}::Resource", namespace),
        }
    }

    pub fn from_config(config: &AuthorizerConfig) -> Self {
        Self::new(config.policy_store_id.clone(), &config.entity_namespace)
    }

    /// Build the query for an extracted identity
    ///
    /// The principal reference and its auxiliary entity share one identifier
    /// value, so the two always match.
    pub fn build(
        &self,
        identity: &PrincipalIdentity,
        action_id: &str,
        resource_id: &str,
    ) -> AuthorizationQuery {
        let principal = EntityIdentifier::new(&self.user_type, &identity.principal_id);

        let mut attributes = BTreeMap::new();
        attributes.insert(GROUP_ATTRIBUTE.to_string(), AttributeValue::string(&identity.group));
        for (key, value) in &identity.custom_attributes {
            attributes.insert(key.clone(), AttributeValue::from_claim(value));
        }

        AuthorizationQuery {
            policy_store_id: self.policy_store_id.clone(),
            action: ActionIdentifier {
                action_type: self.action_type.clone(),
                action_id: action_id.to_string(),
            },
            resource: EntityIdentifier::new(&self.resource_type, resource_id),
            entities: EntitiesDefinition {
                entity_list: vec![EntityItem {
                    identifier: principal.clone(),
                    attributes,
                }],
            },
            principal,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
