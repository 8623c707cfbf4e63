//! Column catalogues for the daily weather tables.

/// Name of the calendar date column carried by every table.
pub const DATE_COLUMN: &str = "date";

/// Daily variables requested from the weather API.
pub const FEATURES: &[&str] = &[
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "apparent_temperature_max",
    "apparent_temperature_min",
    "sunrise",
    "sunset",
    "daylight_duration",
    "sunshine_duration",
    "uv_index_max",
    "uv_index_clear_sky_max",
    "rain_sum",
    "showers_sum",
    "snowfall_sum",
    "precipitation_sum",
    "precipitation_hours",
    "precipitation_probability_max",
    "wind_speed_10m_max",
    "wind_gusts_10m_max",
    "wind_direction_10m_dominant",
    "shortwave_radiation_sum",
    "et0_fao_evapotranspiration",
    "apparent_temperature_mean",
    "temperature_2m_mean",
    "cape_mean",
    "cape_max",
    "cape_min",
    "cloud_cover_mean",
    "cloud_cover_max",
    "cloud_cover_min",
    "dew_point_2m_mean",
    "dew_point_2m_max",
    "dew_point_2m_min",
    "et0_fao_evapotranspiration_sum",
    "growing_degree_days_base_0_limit_50",
    "leaf_wetness_probability_mean",
    "precipitation_probability_mean",
    "precipitation_probability_min",
    "relative_humidity_2m_mean",
    "relative_humidity_2m_max",
    "relative_humidity_2m_min",
    "snowfall_water_equivalent_sum",
    "pressure_msl_mean",
    "pressure_msl_max",
    "pressure_msl_min",
    "surface_pressure_mean",
    "surface_pressure_max",
    "surface_pressure_min",
    "updraft_max",
    "visibility_mean",
    "visibility_min",
    "visibility_max",
    "winddirection_10m_dominant",
    "wind_gusts_10m_mean",
    "wind_speed_10m_mean",
    "wind_gusts_10m_min",
    "wind_speed_10m_min",
    "wet_bulb_temperature_2m_mean",
    "wet_bulb_temperature_2m_max",
    "wet_bulb_temperature_2m_min",
    "vapour_pressure_deficit_max",
    "soil_moisture_0_to_100cm_mean",
    "soil_moisture_0_to_10cm_mean",
    "soil_moisture_0_to_7cm_mean",
    "soil_moisture_28_to_100cm_mean",
    "soil_moisture_7_to_28cm_mean",
    "soil_temperature_0_to_100cm_mean",
    "soil_temperature_0_to_7cm_mean",
    "soil_temperature_28_to_100cm_mean",
    "soil_temperature_7_to_28cm_mean",
];

/// Mostly-empty variables dropped during transformation.
pub const REMOVED: &[&str] = &[
    "sunrise",
    "sunset",
    "uv_index_max",
    "uv_index_clear_sky_max",
    "precipitation_probability_max",
    "growing_degree_days_base_0_limit_50",
    "leaf_wetness_probability_mean",
    "precipitation_probability_mean",
    "precipitation_probability_min",
    "updraft_max",
    "soil_moisture_0_to_100cm_mean",
    "soil_moisture_0_to_10cm_mean",
    "soil_moisture_0_to_7cm_mean",
    "soil_moisture_28_to_100cm_mean",
    "soil_moisture_7_to_28cm_mean",
    "soil_temperature_0_to_100cm_mean",
    "soil_temperature_0_to_7cm_mean",
    "soil_temperature_28_to_100cm_mean",
    "soil_temperature_7_to_28cm_mean",
];

/// Calendar features appended by the transform step, in output order.
pub const DERIVED: &[&str] = &[
    "year",
    "month",
    "day_of_month",
    "day_of_week",
    "day_of_year",
    "month_sin",
    "month_cos",
    "year_sin",
    "year_cos",
];

/// Features whose distribution is monitored for drift.
pub const DRIFT_COLUMNS: &[&str] = &[
    "temperature_2m_max",
    "temperature_2m_min",
    "apparent_temperature_max",
    "apparent_temperature_min",
    "daylight_duration",
    "sunshine_duration",
    "rain_sum",
    "showers_sum",
    "snowfall_sum",
    "precipitation_sum",
    "precipitation_hours",
    "wind_speed_10m_max",
    "wind_gusts_10m_max",
    "wind_direction_10m_dominant",
    "shortwave_radiation_sum",
    "et0_fao_evapotranspiration",
    "apparent_temperature_mean",
    "temperature_2m_mean",
    "cape_mean",
    "cape_max",
    "cape_min",
    "cloud_cover_mean",
    "cloud_cover_max",
    "cloud_cover_min",
    "dew_point_2m_mean",
    "dew_point_2m_max",
    "dew_point_2m_min",
    "et0_fao_evapotranspiration_sum",
    "relative_humidity_2m_mean",
    "relative_humidity_2m_max",
    "relative_humidity_2m_min",
    "snowfall_water_equivalent_sum",
    "pressure_msl_mean",
    "pressure_msl_max",
    "pressure_msl_min",
    "surface_pressure_mean",
    "surface_pressure_max",
    "surface_pressure_min",
    "visibility_mean",
    "visibility_min",
    "visibility_max",
    "winddirection_10m_dominant",
    "wind_gusts_10m_mean",
    "wind_speed_10m_mean",
    "wind_gusts_10m_min",
    "wind_speed_10m_min",
    "wet_bulb_temperature_2m_mean",
    "wet_bulb_temperature_2m_max",
    "wet_bulb_temperature_2m_min",
    "vapour_pressure_deficit_max",
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_removed_columns_are_features() {
        for column in REMOVED {
            assert!(FEATURES.contains(column), "{column} is not a feature");
        }
    }

    #[test]
    fn test_drift_columns_survive_transform() {
        for column in DRIFT_COLUMNS {
            assert!(FEATURES.contains(column), "{column} is not a feature");
            assert!(!REMOVED.contains(column), "{column} is dropped by transform");
        }
    }

    #[test]
    fn test_catalogues_have_no_duplicates() {
        for list in [FEATURES, REMOVED, DERIVED, DRIFT_COLUMNS] {
            let unique: HashSet<_> = list.iter().collect();
            assert_eq!(unique.len(), list.len());
        }
    }
}
