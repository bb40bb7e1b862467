// The structured report of everything that did not make it into the merged dataset.

use serde::Serialize;

use crate::boundary::{ResolveDiagnostics, TierReport};
use crate::parser::{ParseStats, RejectReason, RejectedRow};
use crate::reconcile::{AmbiguityKind, Reconciliation};
use crate::records::UnitRef;

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedEntry {
    pub line: usize,
    pub raw: String,
    pub reason: String,
    pub detail: RejectReason,
}

impl From<&RejectedRow> for RejectedEntry {
    fn from(r: &RejectedRow) -> Self {
        RejectedEntry {
            line: r.line,
            raw: r.raw.clone(),
            reason: r.reason.to_string(),
            detail: r.reason.clone(),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousEntry {
    pub key: String,
    pub kind: AmbiguityKind,
    pub candidates: Vec<UnitRef>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    pub rows: usize,
    pub rejected_rows: usize,
    pub features: usize,
    pub matched: usize,
    pub unmatched_geometries: usize,
    pub unmatched_electoral: usize,
    pub ambiguous_features: usize,
    pub ambiguous_records: usize,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub counts: Counts,
    pub parse: ParseStats,
    pub rejected_rows: Vec<RejectedEntry>,
    pub unmatched_geometries: Vec<UnitRef>,
    pub unmatched_electoral: Vec<UnitRef>,
    pub ambiguous: Vec<AmbiguousEntry>,
    pub tiers: Vec<TierReport>,
    pub provenance: Vec<UnitRef>,
}

impl DiagnosticsReport {
    pub fn build(
        stats: &ParseStats,
        rejected: &[RejectedRow],
        resolve: &ResolveDiagnostics,
        rec: &Reconciliation,
    ) -> DiagnosticsReport {
        let counts = Counts {
            rows: stats.rows,
            rejected_rows: rejected.len(),
            features: resolve.provenance.len(),
            matched: rec.matched.len(),
            unmatched_geometries: rec.unmatched_geometry.len(),
            unmatched_electoral: rec.unmatched_electoral.len(),
            ambiguous_features: rec.ambiguous_features(),
            ambiguous_records: rec.ambiguous_records(),
        };
        DiagnosticsReport {
            counts,
            parse: stats.clone(),
            rejected_rows: rejected.iter().map(RejectedEntry::from).collect(),
            unmatched_geometries: rec.unmatched_geometry.iter().map(UnitRef::from).collect(),
            unmatched_electoral: rec.unmatched_electoral.iter().map(UnitRef::from).collect(),
            ambiguous: rec
                .ambiguous
                .iter()
                .map(|a| AmbiguousEntry {
                    key: a.key.to_string(),
                    kind: a.kind,
                    candidates: a.candidates.clone(),
                })
                .collect(),
            tiers: resolve.tiers.clone(),
            provenance: resolve.provenance.clone(),
        }
    }

    /// True when every input item ended up merged.
    pub fn is_clean(&self) -> bool {
        self.rejected_rows.is_empty()
            && self.unmatched_electoral.is_empty()
            && self.ambiguous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Field;

    #[test]
    fn rejected_rows_keep_reason_text_and_kind() {
        let row = RejectedRow {
            line: 3,
            raw: "Santiago,120,44.5".to_string(),
            reason: RejectReason::OutOfRange {
                field: Field::JaraPct,
                value: 120.0,
            },
        };
        let js = serde_json::to_value(RejectedEntry::from(&row)).unwrap();
        assert_eq!(js["line"], 3);
        assert_eq!(js["detail"]["kind"], "out-of-range");
        assert_eq!(js["detail"]["field"], "jara_pct");
        assert!(js["reason"].as_str().unwrap().starts_with("out of range"));
    }
}
