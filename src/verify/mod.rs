//! Citation-integrity checks over synthesized research drafts
//!
//! `verify` is a pure walk of a `ResearchDraft`: every claim must carry at
//! least one evidence reference and every SQL-backed block at least one SQL
//! evidence id. Findings are reported, never raised. `Verifier::with_sources`
//! additionally checks that each reference resolves against the evidence
//! packs and SQL results it was minted from.

mod draft;
mod note;

pub use draft::{
    Claim, FinancialsSummary, FundamentalsSection, ResearchDraft, ValuationInputs,
    ValuationRange, ValuationSection,
};
pub use note::render_note;

use crate::ids::EvidenceRef;
use crate::retrieval::EvidencePack;
use crate::sql::SqlResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Verifier output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub passed: bool,
    /// One entry per offending record, in walk order
    pub issues: Vec<String>,
    /// References found across all records
    pub evidence_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimKind {
    Driver,
    Risk,
    RelatedEvidence,
    Assumption,
}

impl ClaimKind {
    fn describe(self, index: usize, claim: &Claim) -> String {
        match (self, &claim.label) {
            (ClaimKind::Assumption, Some(label)) => format!("Assumption '{}'", label),
            (ClaimKind::Assumption, None) => format!("Assumption #{}", index + 1),
            (ClaimKind::Driver, _) => format!("Driver #{}", index + 1),
            (ClaimKind::Risk, _) => format!("Risk #{}", index + 1),
            (ClaimKind::RelatedEvidence, _) => format!("Related evidence #{}", index + 1),
        }
    }
}

/// Structural verifier, optionally aware of the minted evidence
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    known: Option<HashSet<EvidenceRef>>,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also flag references that do not resolve against `packs` or `sql`
    pub fn with_sources(packs: &[EvidencePack], sql: &[SqlResult]) -> Self {
        let known = packs
            .iter()
            .flat_map(|pack| pack.evidence_ids())
            .chain(sql.iter().map(|r| r.sql_evidence_id.clone()))
            .collect();
        Self { known: Some(known) }
    }

    pub fn verify(&self, draft: &ResearchDraft) -> VerificationReport {
        let mut walk = Walk {
            known: self.known.as_ref(),
            issues: Vec::new(),
            evidence_count: 0,
        };

        if let Some(fundamentals) = &draft.fundamentals {
            const SECTION: &str = "Fundamentals";
            if let Some(summary) = &fundamentals.financials_summary {
                walk.sql_block(SECTION, "financials", &summary.sql_evidence_ids);
            }
            walk.claims(SECTION, ClaimKind::Driver, &fundamentals.drivers);
            walk.claims(SECTION, ClaimKind::Risk, &fundamentals.risks);
            walk.claims(
                SECTION,
                ClaimKind::RelatedEvidence,
                &fundamentals.related_evidence,
            );
        }

        if let Some(valuation) = &draft.valuation {
            const SECTION: &str = "Valuation";
            if let Some(inputs) = &valuation.inputs {
                walk.sql_block(SECTION, "inputs", &inputs.sql_evidence_ids);
            }
            walk.claims(SECTION, ClaimKind::Assumption, &valuation.assumptions);
        }

        if !walk.issues.is_empty() {
            tracing::warn!("Verification found {} issues", walk.issues.len());
        }

        VerificationReport {
            passed: walk.issues.is_empty(),
            issues: walk.issues,
            evidence_count: walk.evidence_count,
        }
    }
}

/// Verify with structural checks only
pub fn verify(draft: &ResearchDraft) -> VerificationReport {
    Verifier::new().verify(draft)
}

struct Walk<'a> {
    known: Option<&'a HashSet<EvidenceRef>>,
    issues: Vec<String>,
    evidence_count: usize,
}

impl Walk<'_> {
    fn sql_block(&mut self, section: &str, what: &str, ids: &[String]) {
        if ids.is_empty() {
            self.issues
                .push(format!("{}: Missing SQL evidence IDs for {}.", section, what));
            return;
        }
        self.evidence_count += ids.len();
        let subject = format!("{} {}", section, what);
        self.resolve_all(section, &subject, ids.iter());
    }

    fn claims(&mut self, section: &str, kind: ClaimKind, claims: &[Claim]) {
        for (index, claim) in claims.iter().enumerate() {
            let subject = kind.describe(index, claim);
            if !claim.is_cited() {
                self.issues
                    .push(format!("{}: {} has no evidence IDs.", section, subject));
                continue;
            }
            self.evidence_count += claim.references().count();
            self.resolve_all(section, &subject, claim.references());
        }
    }

    fn resolve_all<'r>(
        &mut self,
        section: &str,
        subject: &str,
        references: impl Iterator<Item = &'r String>,
    ) {
        let Some(known) = self.known else {
            return;
        };

        for raw in references {
            match raw.parse::<EvidenceRef>() {
                Ok(reference) if known.contains(&reference) => {}
                Ok(_) => self.issues.push(format!(
                    "{}: {} cites unresolved evidence '{}'.",
                    section, subject, raw
                )),
                Err(_) => self.issues.push(format!(
                    "{}: {} cites malformed evidence '{}'.",
                    section, subject, raw
                )),
            }
        }
    }
}
