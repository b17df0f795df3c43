//! Weighted confidence scoring and the decision rule

use sandgate_core::{Decision, EndpointOutcome, LintOutcome, ScoringWeights, TestOutcome};
use tracing::info;

/// Combines check signals into a confidence score and a discrete decision.
///
/// Stateless across runs: the same outcomes always yield the same
/// (decision, confidence) pair. Tests carry the highest weight because
/// they are the strongest correctness signal; a hard test failure can
/// never reach `merge` even with perfect lint, endpoint, and coverage
/// scores.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    weights: ScoringWeights,
}

impl DecisionEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score the outcomes and decide.
    ///
    /// Confidence is clamped to 0.0..=1.0 so the record always carries a
    /// valid probability-like value.
    pub fn decide(
        &self,
        tests: &TestOutcome,
        lint: &LintOutcome,
        endpoints: &EndpointOutcome,
        coverage: Option<f64>,
    ) -> (Decision, f64) {
        let w = &self.weights;
        let mut confidence = 0.0_f64;

        if tests.success {
            confidence += w.tests;
        }

        if lint.success {
            confidence += w.lint;
        } else {
            confidence -= w.lint_penalty;
        }

        if endpoints.success {
            confidence += w.endpoints;
        } else {
            confidence -= w.endpoints_penalty;
        }

        let coverage = coverage.unwrap_or(0.0);
        if coverage > w.coverage_floor {
            confidence += w.coverage_bonus;
        }

        let confidence = confidence.clamp(0.0, 1.0);

        let decision = if confidence >= w.merge_threshold && tests.success && lint.success {
            Decision::Merge
        } else if confidence >= w.review_threshold && tests.success {
            Decision::Review
        } else {
            Decision::Revert
        };

        info!(
            "Decision: {} (confidence {:.2}, tests={}, lint={}, endpoints={}, coverage={:.2})",
            decision, confidence, tests.success, lint.success, endpoints.success, coverage
        );

        (decision, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandgate_core::{ProbeMethod, RouteResult, RouteStatus};

    fn engine() -> DecisionEngine {
        DecisionEngine::default()
    }

    fn passing_tests() -> TestOutcome {
        TestOutcome {
            passed: 20,
            failed: 0,
            coverage: Some(0.9),
            success: true,
            ..TestOutcome::default()
        }
    }

    fn failing_tests(failed: u32) -> TestOutcome {
        TestOutcome {
            passed: 18,
            failed,
            success: false,
            ..TestOutcome::default()
        }
    }

    fn failing_lint() -> LintOutcome {
        LintOutcome {
            unresolved: vec!["ruff: E501 line too long".to_string()],
            success: false,
            ..LintOutcome::default()
        }
    }

    fn endpoints_ok() -> EndpointOutcome {
        EndpointOutcome::from_routes(vec![RouteResult {
            path: "/health".to_string(),
            method: ProbeMethod::Get,
            status: RouteStatus::Ok,
        }])
    }

    fn endpoints_unreachable() -> EndpointOutcome {
        EndpointOutcome::from_routes(vec![RouteResult {
            path: "/health".to_string(),
            method: ProbeMethod::Get,
            status: RouteStatus::Unreachable,
        }])
    }

    #[test]
    fn scenario_a_everything_green_merges() {
        let (decision, confidence) =
            engine().decide(&passing_tests(), &LintOutcome::clean(), &endpoints_ok(), Some(0.9));
        assert!((confidence - 1.0).abs() < 1e-9);
        assert_eq!(decision, Decision::Merge);
    }

    #[test]
    fn scenario_b_lint_failure_reverts() {
        // 0.40 - 0.10 + 0.25 = 0.55, below the review tier
        let (decision, confidence) =
            engine().decide(&passing_tests(), &failing_lint(), &endpoints_ok(), Some(0.5));
        assert!((confidence - 0.55).abs() < 1e-9);
        assert_eq!(decision, Decision::Revert);
    }

    #[test]
    fn scenario_c_test_failure_reverts_despite_high_coverage() {
        // 0.25 + 0.25 + 0.10 = 0.60; no test credit
        let (decision, confidence) =
            engine().decide(&failing_tests(2), &LintOutcome::clean(), &endpoints_ok(), Some(0.9));
        assert!((confidence - 0.60).abs() < 1e-9);
        assert_eq!(decision, Decision::Revert);
    }

    #[test]
    fn scenario_d_unreachable_endpoints_still_merge() {
        let (decision, confidence) = engine().decide(
            &passing_tests(),
            &LintOutcome::clean(),
            &endpoints_unreachable(),
            Some(0.72),
        );
        assert!((confidence - 1.0).abs() < 1e-9);
        assert_eq!(decision, Decision::Merge);
    }

    #[test]
    fn test_merge_requires_tests_and_lint() {
        // Even a hand-tuned weight set cannot merge over failing tests
        let weights = ScoringWeights {
            lint: 0.5,
            endpoints: 0.5,
            ..ScoringWeights::default()
        };
        let engine = DecisionEngine::new(weights);

        let (decision, _) = engine.decide(
            &failing_tests(1),
            &LintOutcome::clean(),
            &endpoints_ok(),
            Some(0.95),
        );
        assert_ne!(decision, Decision::Merge);
    }

    #[test]
    fn test_confidence_clamped_to_zero() {
        let failing_endpoints = EndpointOutcome::from_routes(vec![RouteResult {
            path: "/health".to_string(),
            method: ProbeMethod::Get,
            status: RouteStatus::Failed { code: 500 },
        }]);

        let (decision, confidence) =
            engine().decide(&failing_tests(5), &failing_lint(), &failing_endpoints, None);
        assert_eq!(confidence, 0.0);
        assert_eq!(decision, Decision::Revert);
    }

    #[test]
    fn test_endpoint_failure_drops_below_review() {
        let failing_endpoints = EndpointOutcome::from_routes(vec![RouteResult {
            path: "/insights".to_string(),
            method: ProbeMethod::Get,
            status: RouteStatus::Failed { code: 503 },
        }]);
        let (decision, confidence) = engine().decide(
            &passing_tests(),
            &LintOutcome::clean(),
            &failing_endpoints,
            Some(0.9),
        );
        // 0.40 + 0.25 - 0.15 + 0.10 = 0.60
        assert!((confidence - 0.60).abs() < 1e-9);
        assert_eq!(decision, Decision::Revert);
    }

    #[test]
    fn test_review_tier_never_merges_over_failed_lint() {
        // Softened lint penalty keeps confidence in the review band, but
        // unresolved lint issues still block an automatic merge
        let weights = ScoringWeights {
            lint_penalty: 0.0,
            ..ScoringWeights::default()
        };
        let engine = DecisionEngine::new(weights);

        let (decision, confidence) =
            engine.decide(&passing_tests(), &failing_lint(), &endpoints_ok(), Some(0.9));
        // 0.40 + 0.25 + 0.10 = 0.75
        assert!((confidence - 0.75).abs() < 1e-9);
        assert_eq!(decision, Decision::Review);
    }

    #[test]
    fn test_determinism() {
        let a = engine().decide(&passing_tests(), &failing_lint(), &endpoints_ok(), Some(0.8));
        let b = engine().decide(&passing_tests(), &failing_lint(), &endpoints_ok(), Some(0.8));
        assert_eq!(a.0, b.0);
        assert!((a.1 - b.1).abs() < 1e-12);
    }
}
