use crate::models::ActivityKind;

pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Metabolic equivalent per activity kind.
pub fn met_for(kind: ActivityKind) -> f64 {
    match kind {
        ActivityKind::Strength => 6.0,
        ActivityKind::Bodyweight => 8.0,
        ActivityKind::Cardio => 7.0,
        ActivityKind::Yoga => 3.0,
        ActivityKind::Running => 9.5,
        ActivityKind::Mobility => 2.5,
        ActivityKind::Unspecified => 5.0,
    }
}

/// `round(MET × weight × hours)`. Missing or nonsensical weights fall back to
/// 70 kg; non-positive durations burn nothing.
pub fn estimate_calories(duration_minutes: f64, kind: ActivityKind, weight_kg: Option<f64>) -> u32 {
    if !duration_minutes.is_finite() || duration_minutes <= 0.0 {
        return 0;
    }

    let weight = weight_kg
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or(DEFAULT_WEIGHT_KG);

    let calories = met_for(kind) * weight * (duration_minutes / 60.0);
    calories.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
