//! Alert text for drifted features.

use super::FeatureDrift;

pub const ALERT_HEADER: &str = "Data drift detected in the following features:";

/// Render one line per drifted feature, in input order, under [`ALERT_HEADER`].
pub fn compose_alert(features: &[FeatureDrift]) -> String {
    let lines: Vec<String> = features
        .iter()
        .filter(|f| f.drift)
        .map(describe)
        .collect();

    format!("{}\n{}", ALERT_HEADER, lines.join("\n"))
}

fn describe(feature: &FeatureDrift) -> String {
    let mut parts = vec![format!("Feature '{}':", feature.column)];

    if feature.missing_flag {
        parts.push(format!(
            "Missingness drift detected (Δ missing rate = {:.2}%).",
            feature.missing_delta * 100.0
        ));
    }

    if let (true, Some(d), Some(p)) = (feature.distribution_flag, feature.statistic, feature.p_value) {
        parts.push(format!(
            "KS test indicates drift (D = {:.4}, p-value = {:.4}).",
            d, p
        ));
    }

    parts.join(" ")
}
