//! Keyword entity extraction driven by a versioned rule table

use crate::error::{CitelineError, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const DEFAULT_RULES: &str = include_str!("../../config-templates/entities.toml");

/// Entity categories recognized by the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Company,
    Segment,
    Product,
    Metric,
    Risk,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "Company",
            EntityType::Segment => "Segment",
            EntityType::Product => "Product",
            EntityType::Metric => "Metric",
            EntityType::Risk => "Risk",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = CitelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Company" => Ok(EntityType::Company),
            "Segment" => Ok(EntityType::Segment),
            "Product" => Ok(EntityType::Product),
            "Metric" => Ok(EntityType::Metric),
            "Risk" => Ok(EntityType::Risk),
            other => Err(CitelineError::GraphStore(format!(
                "Unknown entity type: {}",
                other
            ))),
        }
    }
}

/// Extracted entity; identity is (type, normalized name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Surface form as written in the rule table
    pub name: String,
}

impl Entity {
    pub fn new(entity_type: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity_type,
            name: name.into(),
        }
    }

    /// Lowercased, whitespace-collapsed name used as the identity key
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn key(&self) -> (EntityType, String) {
        (self.entity_type, self.normalized_name())
    }
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One row of the rule table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRule {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub names: Vec<String>,
}

/// Versioned (type -> surface forms) table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRuleTable {
    pub version: String,
    #[serde(rename = "rule", default)]
    pub rules: Vec<EntityRule>,
}

impl EntityRuleTable {
    /// Table shipped in config-templates/entities.toml
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_RULES)
    }

    /// TOML source of the built-in table, for `config init`
    pub fn builtin_source() -> &'static str {
        DEFAULT_RULES
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CitelineError::io(e, format!("Failed to read entity rules: {:?}", path))
        })?;
        Self::from_toml(&content)
    }

    /// Load from `path` when given, otherwise the built-in table
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn surface_form_count(&self) -> usize {
        self.rules.iter().map(|r| r.names.len()).sum()
    }
}

/// Capability interface for entity extraction
pub trait EntityExtractor: Send + Sync {
    /// Deduplicated entities found in `text`, in first-seen order
    fn extract(&self, text: &str) -> Vec<Entity>;

    /// Identity of the rule set or model, recorded with the index
    fn version(&self) -> &str;
}

/// Case-insensitive substring matcher over an `EntityRuleTable`
///
/// A surface form either occurs in the text or it does not; there is no
/// scoring.
pub struct KeywordExtractor {
    version: String,
    /// (entity, lowercased surface form) in table order
    patterns: Vec<(Entity, String)>,
}

impl KeywordExtractor {
    pub fn new(table: EntityRuleTable) -> Self {
        let patterns = table
            .rules
            .iter()
            .flat_map(|rule| {
                rule.names
                    .iter()
                    .filter(|name| !name.trim().is_empty())
                    .map(move |name| (Entity::new(rule.entity_type, name.clone()), name.to_lowercase()))
            })
            .collect();

        Self {
            version: table.version,
            patterns,
        }
    }

    pub fn with_builtin_rules() -> Result<Self> {
        Ok(Self::new(EntityRuleTable::builtin()?))
    }
}

impl EntityExtractor for KeywordExtractor {
    fn extract(&self, text: &str) -> Vec<Entity> {
        let lower = text.to_lowercase();
        let mut seen = AHashSet::new();

        self.patterns
            .iter()
            .filter(|(_, needle)| lower.contains(needle.as_str()))
            .filter(|(entity, _)| seen.insert(entity.key()))
            .map(|(entity, _)| entity.clone())
            .collect()
    }

    fn version(&self) -> &str {
        &self.version
    }
}
