//! Priority scoring: pure functions from triage + aggregation state to a
//! bounded, auditable 0–100 score with a component breakdown.
//!
//! Component shapes: urgency linear in the 0–1 score; impact logarithmic in
//! total report count (the 2nd report matters far more than the 50th);
//! frequency linear in the 30-minute velocity; environmental a binary bonus.
//! The raw sum is gated by classifier confidence, then the single-report
//! escalation floor is applied: a lone report flagged for immediate action
//! or reporter welfare must surface above the mandatory-review threshold no
//! matter how small its impact and frequency components are.

use reportline_common::{PriorityBreakdown, MANDATORY_REVIEW_SCORE};

/// Each component's ceiling. Four components, total raw max 100.
const COMPONENT_CAP: f64 = 25.0;
/// Impact log scaling: ln(report_count + 1) × this.
const IMPACT_LOG_SCALE: f64 = 10.0;
/// Frequency scaling: reports in the last 30 minutes × this.
const FREQUENCY_SCALE: f64 = 2.5;
/// Escalated totals land here: above the review threshold, below a
/// hand-assigned 100.
const ESCALATION_FLOOR: f64 = 92.0;

#[derive(Debug, Clone, Copy)]
pub struct PriorityInputs {
    pub urgency_score: f32,
    pub is_environmental: bool,
    /// Total reports linked to the canonical issue.
    pub report_count: u32,
    pub reports_last_30_min: u32,
    pub confidence_score: f32,
    pub requires_immediate_action: bool,
    pub reporter_welfare_flag: bool,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the breakdown. Pure; same inputs, same score, forever.
pub fn score(inputs: PriorityInputs) -> PriorityBreakdown {
    let urgency_component = f64::from(inputs.urgency_score).clamp(0.0, 1.0) * COMPONENT_CAP;

    let impact_component =
        (f64::from(inputs.report_count + 1).ln() * IMPACT_LOG_SCALE).min(COMPONENT_CAP);

    let frequency_component =
        (f64::from(inputs.reports_last_30_min) * FREQUENCY_SCALE).min(COMPONENT_CAP);

    let environmental_component = if inputs.is_environmental {
        COMPONENT_CAP
    } else {
        0.0
    };

    let raw = urgency_component + impact_component + frequency_component + environmental_component;

    // Confidence gate: zero-confidence results keep half weight rather than
    // vanishing; low trust is a reason for review, not for silence.
    let confidence = f64::from(inputs.confidence_score).clamp(0.0, 1.0);
    let mut total = raw * (0.5 + 0.5 * confidence);

    // Single-report escalation: severity alone must clear the mandatory
    // review threshold even when count and velocity are near zero.
    if inputs.requires_immediate_action || inputs.reporter_welfare_flag {
        total = total.max(ESCALATION_FLOOR);
    }

    PriorityBreakdown {
        urgency_component: round2(urgency_component),
        impact_component: round2(impact_component),
        frequency_component: round2(frequency_component),
        environmental_component: round2(environmental_component),
        total_score: round2(total.clamp(0.0, 100.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PriorityInputs {
        PriorityInputs {
            urgency_score: 0.5,
            is_environmental: false,
            report_count: 1,
            reports_last_30_min: 0,
            confidence_score: 1.0,
            requires_immediate_action: false,
            reporter_welfare_flag: false,
        }
    }

    #[test]
    fn urgency_component_scales_linearly() {
        let low = score(PriorityInputs { urgency_score: 0.2, ..inputs() });
        let high = score(PriorityInputs { urgency_score: 0.8, ..inputs() });
        assert!((low.urgency_component - 5.0).abs() < 1e-9);
        assert!((high.urgency_component - 20.0).abs() < 1e-9);
    }

    #[test]
    fn urgency_out_of_range_is_clamped() {
        let b = score(PriorityInputs { urgency_score: 7.0, ..inputs() });
        assert!((b.urgency_component - 25.0).abs() < 1e-9);
    }

    #[test]
    fn impact_is_logarithmic_and_monotonic() {
        let mut previous = -1.0;
        for count in [0u32, 1, 2, 5, 10, 50, 500, 50_000] {
            let b = score(PriorityInputs { report_count: count, ..inputs() });
            assert!(b.impact_component >= previous, "impact dropped at count {count}");
            assert!(b.impact_component <= 25.0);
            previous = b.impact_component;
        }
    }

    #[test]
    fn second_report_matters_more_than_fiftieth() {
        let first = score(PriorityInputs { report_count: 1, ..inputs() });
        let second = score(PriorityInputs { report_count: 2, ..inputs() });
        let forty_ninth = score(PriorityInputs { report_count: 49, ..inputs() });
        let fiftieth = score(PriorityInputs { report_count: 50, ..inputs() });
        let early_gain = second.impact_component - first.impact_component;
        let late_gain = fiftieth.impact_component - forty_ninth.impact_component;
        assert!(early_gain > late_gain * 5.0);
    }

    #[test]
    fn frequency_is_linear_monotonic_and_capped() {
        let mut previous = -1.0;
        for velocity in [0u32, 1, 2, 4, 8, 10, 12, 100] {
            let b = score(PriorityInputs { reports_last_30_min: velocity, ..inputs() });
            assert!(b.frequency_component >= previous);
            assert!(b.frequency_component <= 25.0);
            previous = b.frequency_component;
        }
        let at_four = score(PriorityInputs { reports_last_30_min: 4, ..inputs() });
        assert!((at_four.frequency_component - 10.0).abs() < 1e-9);
    }

    #[test]
    fn environmental_is_binary() {
        let on = score(PriorityInputs { is_environmental: true, ..inputs() });
        let off = score(inputs());
        assert!((on.environmental_component - 25.0).abs() < 1e-9);
        assert!((off.environmental_component - 0.0).abs() < 1e-9);
    }

    #[test]
    fn total_is_bounded() {
        let max = score(PriorityInputs {
            urgency_score: 1.0,
            is_environmental: true,
            report_count: 100_000,
            reports_last_30_min: 1_000,
            confidence_score: 1.0,
            requires_immediate_action: true,
            reporter_welfare_flag: true,
        });
        assert!(max.total_score <= 100.0);
        let min = score(PriorityInputs {
            urgency_score: 0.0,
            report_count: 0,
            confidence_score: 0.0,
            ..inputs()
        });
        assert!(min.total_score >= 0.0);
    }

    #[test]
    fn confidence_gates_the_total() {
        let trusted = score(PriorityInputs { confidence_score: 1.0, ..inputs() });
        let untrusted = score(PriorityInputs { confidence_score: 0.0, ..inputs() });
        assert!(untrusted.total_score < trusted.total_score);
        // Half weight, not zero.
        assert!(untrusted.total_score > 0.0);
    }

    #[test]
    fn single_report_escalation_clears_review_threshold() {
        let b = score(PriorityInputs {
            urgency_score: 1.0,
            report_count: 1,
            reports_last_30_min: 0,
            confidence_score: 0.3,
            requires_immediate_action: true,
            ..inputs()
        });
        assert!(b.total_score >= MANDATORY_REVIEW_SCORE);
    }

    #[test]
    fn welfare_flag_alone_also_escalates() {
        let b = score(PriorityInputs {
            reporter_welfare_flag: true,
            confidence_score: 0.0,
            ..inputs()
        });
        assert!(b.total_score >= MANDATORY_REVIEW_SCORE);
    }

    #[test]
    fn unflagged_single_report_does_not_escalate() {
        let b = score(PriorityInputs { urgency_score: 1.0, ..inputs() });
        assert!(b.total_score < MANDATORY_REVIEW_SCORE);
    }

    #[test]
    fn components_round_to_two_decimals() {
        let b = score(PriorityInputs { report_count: 2, ..inputs() });
        for value in [
            b.urgency_component,
            b.impact_component,
            b.frequency_component,
            b.environmental_component,
            b.total_score,
        ] {
            assert!((value * 100.0 - (value * 100.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn breakdown_serde_round_trip_is_exact() {
        let b = score(PriorityInputs {
            report_count: 7,
            reports_last_30_min: 3,
            is_environmental: true,
            ..inputs()
        });
        let json = serde_json::to_string(&b).unwrap();
        let back: reportline_common::PriorityBreakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
