use chrono::{DateTime, Utc};

use crate::types::{HealingPrediction, HealingTrend, PhotoRecord};

/// Lower bound for the daily rate when projecting days to closure.
pub const MIN_DAILY_RATE: f64 = 0.001;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const CONFIDENCE_BAND: (f64, f64) = (0.1, 0.95);

/// Lower bounds (percent area reduction) of each trend band, best first.
pub const TREND_BANDS: [(f64, HealingTrend); 4] = [
    (30.0, HealingTrend::Excellent),
    (15.0, HealingTrend::Good),
    (5.0, HealingTrend::Moderate),
    (0.0, HealingTrend::Slow),
];

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Project healing from the area measurements in `history`.
///
/// Records without an area are ignored. Fewer than two measurements yield
/// [`HealingPrediction::insufficient_data`]. A flat or growing wound
/// projects against [`MIN_DAILY_RATE`], so very large day counts mean the
/// trend is inconclusive.
pub fn predict_healing(history: &[PhotoRecord]) -> HealingPrediction {
    let mut measurements: Vec<(DateTime<Utc>, f64)> = history
        .iter()
        .filter_map(|photo| photo.area_cm2.map(|area| (photo.taken_at, area)))
        .filter(|(_, area)| area.is_finite())
        .collect();
    if measurements.len() < 2 {
        return HealingPrediction::insufficient_data();
    }
    measurements.sort_by_key(|(taken_at, _)| *taken_at);

    let (first_at, first_area) = measurements[0];
    let (last_at, last_area) = measurements[measurements.len() - 1];

    let elapsed_days = (last_at - first_at).num_seconds() as f64 / SECONDS_PER_DAY;
    let daily_reduction_rate = (first_area - last_area) / elapsed_days.max(1.0);

    let projected = last_area / daily_reduction_rate.max(MIN_DAILY_RATE);
    let predicted_days = projected.max(0.0).round().min(u32::MAX as f64) as u32;

    let areas: Vec<f64> = measurements.iter().map(|(_, area)| *area).collect();
    HealingPrediction {
        predicted_days,
        confidence: prediction_confidence(&areas),
        trend: trend(first_area, last_area),
        daily_reduction_rate,
    }
}

/// Consistency of successive area changes: `1 / (1 + variance)`, clamped
/// into [`CONFIDENCE_BAND`].
pub fn prediction_confidence(areas: &[f64]) -> f64 {
    if areas.len() < 3 {
        return DEFAULT_CONFIDENCE;
    }
    let differences: Vec<f64> = areas.windows(2).map(|w| w[0] - w[1]).collect();
    let n = differences.len() as f64;
    let mean = differences.iter().sum::<f64>() / n;
    let variance = differences.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
    (1.0 / (1.0 + variance)).clamp(CONFIDENCE_BAND.0, CONFIDENCE_BAND.1)
}

pub fn trend(first_area: f64, last_area: f64) -> HealingTrend {
    let reduction_pct = if first_area > 0.0 {
        (first_area - last_area) / first_area * 100.0
    } else if last_area > first_area {
        -100.0
    } else {
        0.0
    };
    TREND_BANDS
        .iter()
        .find(|(lower, _)| reduction_pct >= *lower)
        .map_or(HealingTrend::Worsening, |(_, trend)| *trend)
}
