use intel_core::ValidationWarning;
use intel_providers::FinancialSnapshot;

/// Sanity-checks a financial snapshot for improbable values, per
/// `core/pipeline/ranking.py::_validate_financial_snapshot` ("the math bug fix").
pub fn validate_financial_snapshot(snapshot: &FinancialSnapshot) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for (field, value) in [("revenue_growth", snapshot.revenue_growth), ("earnings_growth", snapshot.earnings_growth)] {
        if let Some(v) = value {
            if v > 5.0 {
                warnings.push(ValidationWarning {
                    field: field.to_string(),
                    message: format!("EXTREME_VALUE: {field} > 500% ({:.1}%). Verify source.", v * 100.0),
                });
            } else if v < -0.9 {
                warnings.push(ValidationWarning {
                    field: field.to_string(),
                    message: format!("EXTREME_VALUE: {field} < -90% ({:.1}%). Verify source.", v * 100.0),
                });
            }
        }
    }

    if let (Some(gross), Some(operating)) = (snapshot.gross_margin, snapshot.operating_margin) {
        if operating > gross {
            warnings.push(ValidationWarning {
                field: "operating_margin".to_string(),
                message: format!(
                    "LOGIC_ERROR: Operating Margin ({:.1}%) > Gross Margin ({:.1}%).",
                    operating * 100.0,
                    gross * 100.0
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> FinancialSnapshot {
        FinancialSnapshot { source: "test".to_string(), ..Default::default() }
    }

    #[test]
    fn flags_extreme_positive_growth() {
        let mut snap = snapshot();
        snap.revenue_growth = Some(6.0);
        let warnings = validate_financial_snapshot(&snap);
        assert!(warnings.iter().any(|w| w.field == "revenue_growth"));
    }

    #[test]
    fn flags_operating_margin_above_gross_margin() {
        let mut snap = snapshot();
        snap.gross_margin = Some(0.3);
        snap.operating_margin = Some(0.4);
        let warnings = validate_financial_snapshot(&snap);
        assert!(warnings.iter().any(|w| w.field == "operating_margin"));
    }

    #[test]
    fn clean_snapshot_has_no_warnings() {
        let mut snap = snapshot();
        snap.revenue_growth = Some(0.1);
        snap.gross_margin = Some(0.5);
        snap.operating_margin = Some(0.2);
        assert!(validate_financial_snapshot(&snap).is_empty());
    }
}
