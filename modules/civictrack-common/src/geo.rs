use crate::error::CivicTrackError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Reject coordinates outside the valid WGS84 range before they reach a query.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), CivicTrackError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CivicTrackError::Validation(format!(
            "Latitude out of range: {lat}"
        )));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(CivicTrackError::Validation(format!(
            "Longitude out of range: {lng}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sf_city_hall_to_ferry_building() {
        let d = haversine_km(37.7793, -122.4193, 37.7955, -122.3937);
        assert!((1.0..4.0).contains(&d), "Expected ~2.9 km, got {d}");
    }

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(haversine_km(37.7749, -122.4194, 37.7749, -122.4194), 0.0);
    }

    #[test]
    fn sf_to_sacramento_is_well_over_100km() {
        let d = haversine_km(37.7749, -122.4194, 38.5816, -121.4944);
        assert!(d > 100.0, "Expected >100 km, got {d}");
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(-91.0, 0.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
    }

    #[test]
    fn accepts_boundary_coordinates() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
    }
}
