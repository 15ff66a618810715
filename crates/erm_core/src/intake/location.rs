use crate::domain::{Location, ValidationWarning};
use crate::error::AppError;

/// Optional reverse-geocoding enrichment. Intake never blocks on it.
pub trait Geocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, AppError>;
}

fn placeholder(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6}, {longitude:.6}")
}

fn parse_coordinate(raw: &str, min: f64, max: f64) -> Option<f64> {
    let v = raw.trim().parse::<f64>().ok()?;
    if v.is_finite() && (min..=max).contains(&v) {
        Some(v)
    } else {
        None
    }
}

/// Build the stored location from reporter input.
///
/// Coordinates never reject a report: if they are incomplete, unparseable or out of range,
/// the raw input is preserved and a warning is returned instead.
pub fn normalize_location(
    text: &str,
    latitude_raw: Option<&str>,
    longitude_raw: Option<&str>,
    geocoder: Option<&dyn Geocoder>,
    warnings: &mut Vec<ValidationWarning>,
) -> Location {
    let mut location = Location {
        text: text.to_string(),
        latitude: None,
        longitude: None,
        coordinates_raw: None,
        resolved_address: None,
    };

    let (lat_raw, lon_raw) = match (latitude_raw, longitude_raw) {
        (None, None) => return location,
        (Some(lat), Some(lon)) => (lat, lon),
        (lat, lon) => {
            let raw = format!("lat={};lon={}", lat.unwrap_or(""), lon.unwrap_or(""));
            warnings.push(
                ValidationWarning::new(
                    "LOCATION_COORDINATES_INCOMPLETE",
                    "Only one coordinate was supplied; coordinates were not stored",
                )
                .with_details(raw.clone()),
            );
            location.coordinates_raw = Some(raw);
            return location;
        }
    };

    let parsed = (
        parse_coordinate(lat_raw, -90.0, 90.0),
        parse_coordinate(lon_raw, -180.0, 180.0),
    );
    let (Some(latitude), Some(longitude)) = parsed else {
        let raw = format!("lat={lat_raw};lon={lon_raw}");
        warnings.push(
            ValidationWarning::new(
                "LOCATION_COORDINATES_INVALID",
                "Coordinates could not be parsed or are out of range; raw value preserved",
            )
            .with_details(raw.clone()),
        );
        location.coordinates_raw = Some(raw);
        return location;
    };

    location.latitude = Some(latitude);
    location.longitude = Some(longitude);

    location.resolved_address = Some(match geocoder {
        None => placeholder(latitude, longitude),
        Some(g) => match g.reverse(latitude, longitude) {
            Ok(addr) if !addr.trim().is_empty() => addr.trim().to_string(),
            Ok(_) => placeholder(latitude, longitude),
            Err(e) => {
                tracing::warn!(
                    code = %e.code,
                    error = %e,
                    "reverse geocoding failed; using placeholder"
                );
                warnings.push(
                    ValidationWarning::new(
                        "LOCATION_GEOCODE_FAILED",
                        "Address lookup failed; coordinates used as placeholder",
                    )
                    .with_details(e.to_string()),
                );
                placeholder(latitude, longitude)
            }
        },
    });

    location
}
