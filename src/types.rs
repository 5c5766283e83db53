use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Wound classes, in the classification model's output index order.
///
/// `Unknown` is a sentinel for fallback results and has no output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WoundType {
    Abrasions,
    Bruises,
    Burns,
    Cut,
    DiabeticWounds,
    Laceration,
    Normal,
    PressureWounds,
    SurgicalWounds,
    VenousWounds,
    Unknown,
}

impl WoundType {
    /// Labels addressable by a model output index.
    pub const CLASSES: [WoundType; 10] = [
        WoundType::Abrasions,
        WoundType::Bruises,
        WoundType::Burns,
        WoundType::Cut,
        WoundType::DiabeticWounds,
        WoundType::Laceration,
        WoundType::Normal,
        WoundType::PressureWounds,
        WoundType::SurgicalWounds,
        WoundType::VenousWounds,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::CLASSES.get(index).copied()
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            WoundType::Abrasions => "Abrasion",
            WoundType::Bruises => "Bruise",
            WoundType::Burns => "Burn",
            WoundType::Cut => "Cut",
            WoundType::DiabeticWounds => "Diabetic wound",
            WoundType::Laceration => "Laceration",
            WoundType::Normal => "Normal skin",
            WoundType::PressureWounds => "Pressure wound",
            WoundType::SurgicalWounds => "Surgical wound",
            WoundType::VenousWounds => "Venous wound",
            WoundType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for WoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundClassification {
    pub primary_type: WoundType,
    pub confidence: f64,
    /// Every non-primary label with its probability.
    pub alternatives: BTreeMap<WoundType, f64>,
    pub error_message: Option<String>,
}

impl WoundClassification {
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            primary_type: WoundType::Unknown,
            confidence: 0.0,
            alternatives: BTreeMap::new(),
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    /// Fallback only.
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectionRiskAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealingTrend {
    Excellent,
    Good,
    Moderate,
    Slow,
    Worsening,
    InsufficientData,
}

impl HealingTrend {
    pub const fn description(self) -> &'static str {
        match self {
            HealingTrend::Excellent => "Excellent healing progress",
            HealingTrend::Good => "Good healing progress",
            HealingTrend::Moderate => "Moderate healing progress",
            HealingTrend::Slow => "Slow healing progress",
            HealingTrend::Worsening => "Wound appears to be getting larger",
            HealingTrend::InsufficientData => "Insufficient data for prediction",
        }
    }
}

impl fmt::Display for HealingTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingPrediction {
    pub predicted_days: u32,
    pub confidence: f64,
    pub trend: HealingTrend,
    /// cm² per day; negative when the wound is growing.
    pub daily_reduction_rate: f64,
}

impl HealingPrediction {
    pub const fn insufficient_data() -> Self {
        Self {
            predicted_days: 0,
            confidence: 0.0,
            trend: HealingTrend::InsufficientData,
            daily_reduction_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundAnalysisResult {
    pub wound_id: i64,
    pub area_cm2: f64,
    pub classification: WoundClassification,
    pub infection_risk: InfectionRiskAssessment,
    pub healing: HealingPrediction,
    pub confidence_score: f64,
    pub analyzed_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// A previously captured photo, owned by the surrounding application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub area_cm2: Option<f64>,
    #[serde(default)]
    pub infection_risk_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrainageType {
    Clear,
    Bloody,
    Pus,
}

/// Latest patient-reported symptoms for a wound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomLog {
    pub logged_at: DateTime<Utc>,
    #[serde(default)]
    pub pain_level: u8,
    pub has_redness: bool,
    pub has_swelling: bool,
    pub has_drainage: bool,
    #[serde(default)]
    pub drainage_type: Option<DrainageType>,
}

impl SymptomLog {
    pub fn has_purulent_drainage(&self) -> bool {
        self.has_drainage && self.drainage_type == Some(DrainageType::Pus)
    }
}
