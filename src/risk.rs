//! Risk aggregation
//!
//! Combines keyword, dissonance, emotion, and baseline-deviation signals
//! into a weighted composite score, applies the fail-safe overrides, and
//! emits a risk level, escalation decision, and ordered explanation.
//!
//! This component holds no cross-call state: it is a pure function of its
//! inputs plus configuration. Overrides can only raise the assessed risk,
//! never lower it.

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RiskConfig;
use crate::lexicon::PhraseMatcher;
use crate::types::{
    ContributingFactor, DeviationRecord, DeviationSeverity, DissonanceResult, EmotionObservation,
    Interpretation, MicroSignal, RiskAssessment, RiskLevel,
};

/// Name recorded when the crisis-keyword floor fires
pub const OVERRIDE_CRISIS_KEYWORD: &str = "crisis_keyword_floor";
/// Name recorded when the post-decision calm pattern fires
pub const OVERRIDE_POST_DECISION_CALM: &str = "post_decision_calm";

/// Inputs for one risk assessment
#[derive(Debug, Clone, Copy)]
pub struct RiskInput<'a> {
    pub transcript: &'a str,
    pub dissonance: Option<&'a DissonanceResult>,
    pub emotion: Option<EmotionObservation>,
    pub deviations: &'a [DeviationRecord],
    pub user_id: &'a str,
    pub session_id: &'a str,
}

/// Stateless risk aggregator configured with weights, thresholds, and the
/// crisis/finality phrase tables
pub struct RiskAggregator {
    config: RiskConfig,
    crisis: PhraseMatcher,
    finality: PhraseMatcher,
}

impl RiskAggregator {
    pub fn new(config: RiskConfig, crisis: PhraseMatcher, finality: PhraseMatcher) -> Self {
        Self {
            config,
            crisis,
            finality,
        }
    }

    /// Produce a risk assessment for one utterance
    pub fn assess(&self, input: RiskInput<'_>) -> RiskAssessment {
        let keyword_score = self.keyword_score(input.transcript);
        let dissonance_score = input.dissonance.map(|d| self.dissonance_score(d));
        let emotion_score = input.emotion.map(|e| self.emotion_score(e));
        let deviation_score = self.deviation_score(input.deviations);

        let mut factors = vec![
            factor("keyword", Some(keyword_score), self.config.keyword_weight),
            factor(
                "dissonance",
                dissonance_score,
                self.config.dissonance_weight,
            ),
            factor("emotion", emotion_score, self.config.emotion_weight),
            factor(
                "baseline_deviation",
                Some(deviation_score),
                self.config.deviation_weight,
            ),
        ];

        for f in factors.iter().filter(|f| !f.available) {
            warn!(
                user_id = input.user_id,
                session_id = input.session_id,
                signal = f.name.as_str(),
                "upstream signal unavailable, excluded from composite"
            );
        }

        let weight_sum: f64 = factors.iter().filter(|f| f.available).map(|f| f.weight).sum();
        let weighted_sum: f64 = factors.iter().map(|f| f.weighted).sum();
        let composite_score = if weight_sum > 0.0 {
            (weighted_sum / weight_sum).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut risk_level = self.level_of(composite_score);
        let mut overrides_applied = Vec::new();
        let mut forced_escalation = false;

        // Fail-safe overrides: evaluated after the weighted score, raise-only
        if keyword_score >= 1.0 {
            overrides_applied.push(OVERRIDE_CRISIS_KEYWORD.to_string());
            if risk_level < RiskLevel::High {
                risk_level = RiskLevel::High;
            }
        }

        if self.post_decision_calm(input.transcript, input.dissonance) {
            forced_escalation = true;
            overrides_applied.push(OVERRIDE_POST_DECISION_CALM.to_string());
        }

        if !overrides_applied.is_empty() {
            warn!(
                user_id = input.user_id,
                session_id = input.session_id,
                overrides = ?overrides_applied,
                composite_score,
                "fail-safe override applied"
            );
        }

        let escalation_required = forced_escalation || risk_level >= RiskLevel::High;

        factors.sort_by(|a, b| {
            b.weighted
                .partial_cmp(&a.weighted)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            user_id = input.user_id,
            session_id = input.session_id,
            composite_score,
            risk_level = risk_level.as_str(),
            escalation_required,
            "risk assessment complete"
        );

        RiskAssessment {
            assessment_id: Uuid::new_v4(),
            user_id: input.user_id.to_string(),
            session_id: input.session_id.to_string(),
            composite_score,
            risk_level,
            escalation_required,
            contributing_factors: factors,
            dissonance: input.dissonance.cloned(),
            overrides_applied,
            assessed_at: Utc::now(),
        }
    }

    /// 1.0 on any crisis-phrase match, else 0
    fn keyword_score(&self, transcript: &str) -> f64 {
        if self.crisis.matches(transcript) {
            1.0
        } else {
            0.0
        }
    }

    /// Gap score shaped by interpretation: concealment and mixed signals
    /// amplify the gap, congruence caps the contribution near zero
    fn dissonance_score(&self, dissonance: &DissonanceResult) -> f64 {
        let gap = dissonance.gap_score;
        let score = match dissonance.interpretation {
            Interpretation::Congruent => gap.min(self.config.congruent_contribution_cap),
            Interpretation::DefensiveConcealment | Interpretation::MixedSignals => {
                gap * self.config.dissonance_amplification
            }
            Interpretation::Exaggeration | Interpretation::Minimization => gap,
        };
        score.clamp(0.0, 1.0)
    }

    /// Fixed per-category base risk scaled by classifier confidence
    fn emotion_score(&self, emotion: EmotionObservation) -> f64 {
        (self.config.emotion_base_risk.base_risk(emotion.category)
            * emotion.confidence.clamp(0.0, 1.0))
        .clamp(0.0, 1.0)
    }

    /// Maximum deviation score across records of at least medium severity
    fn deviation_score(&self, deviations: &[DeviationRecord]) -> f64 {
        deviations
            .iter()
            .filter(|d| d.severity >= DeviationSeverity::Medium)
            .map(|d| d.deviation_score)
            .fold(0.0, f64::max)
    }

    fn level_of(&self, composite: f64) -> RiskLevel {
        if composite >= self.config.level_critical_threshold {
            RiskLevel::Critical
        } else if composite >= self.config.level_high_threshold {
            RiskLevel::High
        } else if composite >= self.config.level_medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// High dissonance + flat prosody + resolution/finality language: the
    /// pattern of someone calm because the decision is already made
    fn post_decision_calm(
        &self,
        transcript: &str,
        dissonance: Option<&DissonanceResult>,
    ) -> bool {
        let Some(dissonance) = dissonance else {
            return false;
        };
        dissonance.gap_score >= self.config.calm_gap_threshold
            && dissonance.micro_signals.contains(MicroSignal::FlatProsody)
            && self.finality.matches(transcript)
    }
}

fn factor(name: &str, score: Option<f64>, weight: f64) -> ContributingFactor {
    match score {
        Some(sub_score) => ContributingFactor {
            name: name.to_string(),
            sub_score,
            weight,
            weighted: sub_score * weight,
            available: true,
        },
        // Missing signal: zero-weighted but recorded for transparency
        None => ContributingFactor {
            name: name.to_string(),
            sub_score: 0.0,
            weight: 0.0,
            weighted: 0.0,
            available: false,
        },
    }
}
