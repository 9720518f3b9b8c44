//! Synthesized research draft: the tree the verifier walks

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A claim-bearing record (driver, risk, related evidence, assumption)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Display name; assumptions carry theirs as `name`
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Numeric or textual value for assumptions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
    #[serde(default)]
    pub sql_evidence_ids: Vec<String>,
}

impl Claim {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn cite(mut self, evidence_id: impl Into<String>) -> Self {
        self.evidence_ids.push(evidence_id.into());
        self
    }

    pub fn cite_sql(mut self, sql_evidence_id: impl Into<String>) -> Self {
        self.sql_evidence_ids.push(sql_evidence_id.into());
        self
    }

    /// Every reference this claim carries, text evidence first
    pub fn references(&self) -> impl Iterator<Item = &String> {
        self.evidence_ids.iter().chain(self.sql_evidence_ids.iter())
    }

    pub fn is_cited(&self) -> bool {
        !self.evidence_ids.is_empty() || !self.sql_evidence_ids.is_empty()
    }
}

/// Quarterly financial panel backed by SQL results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialsSummary {
    /// Period labels, most recent first
    #[serde(default)]
    pub periods: Vec<String>,
    /// period -> line item -> value
    #[serde(default)]
    pub panel: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub sql_evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financials_summary: Option<FinancialsSummary>,
    #[serde(default)]
    pub drivers: Vec<Claim>,
    #[serde(default)]
    pub risks: Vec<Claim>,
    #[serde(default)]
    pub related_evidence: Vec<Claim>,
}

/// Market inputs backed by SQL results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationInputs {
    #[serde(default)]
    pub last_close: Option<f64>,
    #[serde(default)]
    pub eps_ttm_proxy: Option<f64>,
    #[serde(default)]
    pub sql_evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationRange {
    pub low: Option<f64>,
    pub base: Option<f64>,
    pub high: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<ValuationInputs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation_range: Option<ValuationRange>,
    #[serde(default)]
    pub assumptions: Vec<Claim>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchDraft {
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamentals: Option<FundamentalsSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let draft: ResearchDraft = serde_json::from_str(r#"{"ticker": "AAPL"}"#).unwrap();
        assert_eq!(draft.ticker, "AAPL");
        assert!(draft.fundamentals.is_none());
        assert!(draft.valuation.is_none());
    }

    #[test]
    fn test_assumption_name_alias() {
        let claim: Claim = serde_json::from_str(
            r#"{"name": "P/E multiple", "value": 28.5, "evidence_ids": ["sql:abc123abc123"]}"#,
        )
        .unwrap();
        assert_eq!(claim.label.as_deref(), Some("P/E multiple"));
        assert_eq!(claim.value, Some(serde_json::json!(28.5)));
        assert!(claim.is_cited());
    }

    #[test]
    fn test_claim_builder() {
        let claim = Claim::new("Services mix lifts margin")
            .with_label("Mix")
            .cite("seed:doc:0:aaaaaaaaaa")
            .cite_sql("sql:0123456789ab");
        assert_eq!(claim.references().count(), 2);
        assert!(!Claim::new("bare").is_cited());
    }
}
