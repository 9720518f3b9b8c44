//! Entity extraction
//!
//! Entities are typed names found in chunk text by rule-based keyword
//! matching. The rule table is configuration (see
//! config-templates/entities.toml); the extractor sits behind the
//! `EntityExtractor` trait so a statistical extractor can replace it without
//! touching the graph-write path.

mod extractor;

pub use extractor::{
    Entity, EntityExtractor, EntityRule, EntityRuleTable, EntityType, KeywordExtractor,
};
