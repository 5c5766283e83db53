use rayon::prelude::*;

use crate::{
    preprocess::{ImageTensor, CHANNELS, CHANNEL_MEANS},
    types::{InfectionRiskAssessment, PhotoRecord, RiskLevel, SymptomLog},
};

/// A color-dominance heuristic over the image.
#[derive(Debug, Clone, Copy)]
pub struct ColorRule {
    pub factor: &'static str,
    /// Minimum per-pixel lead (0..=255 scale) of the dominant channels.
    pub margin: f32,
    /// Fraction of matching pixels at which the rule starts contributing.
    pub min_fraction: f64,
    /// Maximum contribution, reached at twice `min_fraction`.
    pub weight: f64,
    pub kind: ColorDominance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDominance {
    /// Red leads both green and blue.
    Red,
    /// Red and green both lead blue (yellow slough).
    RedGreenOverBlue,
}

pub const COLOR_RULES: [ColorRule; 2] = [
    ColorRule {
        factor: "Image shows dominant redness",
        margin: 40.0,
        min_fraction: 0.15,
        weight: 0.25,
        kind: ColorDominance::Red,
    },
    ColorRule {
        factor: "Image shows yellow slough-like tissue",
        margin: 50.0,
        min_fraction: 0.10,
        weight: 0.15,
        kind: ColorDominance::RedGreenOverBlue,
    },
];

pub const COLOR_CONTRIBUTION_CAP: f64 = 0.4;

pub const SYMPTOM_REDNESS: (&str, f64) = ("Redness detected", 0.3);
pub const SYMPTOM_SWELLING: (&str, f64) = ("Swelling present", 0.2);
pub const SYMPTOM_PURULENT: (&str, f64) = ("Purulent drainage", 0.4);

pub const SYMPTOM_CONTRIBUTION_CAP: f64 = 0.9;

pub const PREVIOUS_HIGH_RISK_FACTOR: &str = "Previous assessment indicated high risk";

/// Lower bounds of each risk band, highest first.
pub const RISK_BANDS: [(f64, RiskLevel); 3] = [
    (0.7, RiskLevel::High),
    (0.4, RiskLevel::Moderate),
    (0.2, RiskLevel::Low),
];

pub fn risk_level(score: f64) -> RiskLevel {
    RISK_BANDS
        .iter()
        .find(|(lower, _)| score >= *lower)
        .map_or(RiskLevel::VeryLow, |(_, level)| *level)
}

pub fn recommendations(level: RiskLevel) -> Vec<String> {
    let list: &[&str] = match level {
        RiskLevel::High => &[
            "Seek immediate medical attention",
            "Monitor for worsening symptoms",
        ],
        RiskLevel::Moderate => &[
            "Consult with healthcare provider",
            "Increase monitoring frequency",
        ],
        RiskLevel::Low | RiskLevel::VeryLow => {
            &["Continue current care routine", "Monitor for changes"]
        }
        RiskLevel::Unknown => &["Please consult a healthcare professional"],
    };
    list.iter().map(|s| s.to_string()).collect()
}

impl InfectionRiskAssessment {
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            risk_score: 0.0,
            risk_level: RiskLevel::Unknown,
            risk_factors: Vec::new(),
            recommendations: recommendations(RiskLevel::Unknown),
            error_message: Some(message.into()),
        }
    }
}

/// Fraction of pixels matching `rule`, on the de-centered 0..=255 scale.
pub fn dominance_fraction(tensor: &ImageTensor, rule: &ColorRule) -> f64 {
    let pixels = tensor.as_slice();
    if pixels.is_empty() {
        return 0.0;
    }
    let matching = pixels
        .par_chunks_exact(CHANNELS)
        .filter(|px| {
            let r = px[0] + CHANNEL_MEANS[0];
            let g = px[1] + CHANNEL_MEANS[1];
            let b = px[2] + CHANNEL_MEANS[2];
            match rule.kind {
                ColorDominance::Red => r > g + rule.margin && r > b + rule.margin,
                ColorDominance::RedGreenOverBlue => {
                    r > b + rule.margin && g > b + rule.margin
                }
            }
        })
        .count();
    matching as f64 / (pixels.len() / CHANNELS) as f64
}

fn color_contribution(tensor: &ImageTensor, factors: &mut Vec<String>) -> f64 {
    let mut total = 0.0;
    for rule in &COLOR_RULES {
        let fraction = dominance_fraction(tensor, rule);
        if fraction < rule.min_fraction {
            continue;
        }
        let scale = (fraction / (2.0 * rule.min_fraction)).min(1.0);
        total += rule.weight * scale;
        factors.push(format!("{} ({:.0}% of image)", rule.factor, fraction * 100.0));
    }
    total.clamp(0.0, COLOR_CONTRIBUTION_CAP)
}

fn symptom_contribution(log: &SymptomLog, factors: &mut Vec<String>) -> f64 {
    let signals = [
        (log.has_redness, SYMPTOM_REDNESS),
        (log.has_swelling, SYMPTOM_SWELLING),
        (log.has_purulent_drainage(), SYMPTOM_PURULENT),
    ];
    let mut total = 0.0;
    for (present, (factor, weight)) in signals {
        if present {
            factors.push(factor.to_string());
            total += weight;
        }
    }
    total.clamp(0.0, SYMPTOM_CONTRIBUTION_CAP)
}

/// Combine image color heuristics with the latest symptom log.
///
/// A missing log adds nothing. The most recent history record only
/// contributes an informational factor, never score.
pub fn assess_risk(
    tensor: &ImageTensor,
    latest_log: Option<&SymptomLog>,
    latest_photo: Option<&PhotoRecord>,
) -> InfectionRiskAssessment {
    let mut risk_factors = Vec::new();
    let mut score = color_contribution(tensor, &mut risk_factors);
    if let Some(log) = latest_log {
        score += symptom_contribution(log, &mut risk_factors);
    }
    let risk_score = score.clamp(0.0, 1.0);

    let high = RISK_BANDS[0].0;
    if latest_photo
        .and_then(|photo| photo.infection_risk_score)
        .is_some_and(|previous| previous >= high)
    {
        risk_factors.push(PREVIOUS_HIGH_RISK_FACTOR.to_string());
    }

    let risk_level = risk_level(risk_score);
    InfectionRiskAssessment {
        risk_score,
        risk_level,
        risk_factors,
        recommendations: recommendations(risk_level),
        error_message: None,
    }
}
