//! Device location and reverse geocoding.

use std::sync::Arc;
use std::time::Duration;

use civic_common::config::GeocodingConfig;
use civic_common::{AppError, AppResult, Coordinates};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::report::{ReportDraft, ReportEnricher};

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
    #[error("unknown geolocation error")]
    Unknown,
}

impl GeolocationError {
    /// Message suitable for showing to the user.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Please allow location access in your settings."
            }
            Self::PositionUnavailable => {
                "Your location could not be determined. Make sure GPS is turned on."
            }
            Self::Timeout => "Getting your location took too long. Please try again.",
            Self::Unknown => "An unknown error occurred while getting your location.",
        }
    }
}

impl From<GeolocationError> for AppError {
    fn from(err: GeolocationError) -> Self {
        Self::Geolocation(err.user_message().to_string())
    }
}

/// A located position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub coordinates: Coordinates,
    /// Accuracy radius in metres.
    pub accuracy_m: f64,
}

/// Source of the device position.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Position, GeolocationError>;
}

/// Provider returning a fixed outcome.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    outcome: Result<Position, GeolocationError>,
}

impl FixedLocationProvider {
    #[must_use]
    pub const fn at(position: Position) -> Self {
        Self {
            outcome: Ok(position),
        }
    }

    #[must_use]
    pub const fn failing(error: GeolocationError) -> Self {
        Self {
            outcome: Err(error),
        }
    }
}

#[async_trait::async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_position(&self) -> Result<Position, GeolocationError> {
        self.outcome
    }
}

/// Turns coordinates into a human-readable address.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the service knows no address for the point.
    async fn reverse(&self, coordinates: &Coordinates) -> AppResult<Option<String>>;
}

/// Geocoder that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeocoder;

#[async_trait::async_trait]
impl Geocoder for NoopGeocoder {
    async fn reverse(&self, _coordinates: &Coordinates) -> AppResult<Option<String>> {
        Ok(None)
    }
}

/// Reverse geocoding against a Nominatim-compatible endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimResponse {
    display_name: Option<String>,
    #[serde(default)]
    address: NominatimAddress,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    village: Option<String>,
    suburb: Option<String>,
    city_district: Option<String>,
    county: Option<String>,
    city: Option<String>,
    town: Option<String>,
}

impl NominatimGeocoder {
    /// Build a geocoder from configuration.
    pub fn new(config: &GeocodingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn reverse_url(&self, coordinates: &Coordinates) -> AppResult<Url> {
        Url::parse_with_params(
            &format!("{}/reverse", self.base_url),
            &[
                ("format", "json".to_string()),
                ("lat", coordinates.lat.to_string()),
                ("lon", coordinates.lng.to_string()),
                ("zoom", "18".to_string()),
                ("addressdetails", "1".to_string()),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid geocoding URL: {e}")))
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coordinates: &Coordinates) -> AppResult<Option<String>> {
        let url = self.reverse_url(coordinates)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Geocoding request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Geocoding returned {}",
                response.status()
            )));
        }

        let body: NominatimResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid geocoding response: {e}")))?;

        Ok(format_address(&body))
    }
}

/// Up to three address parts, most specific first, else the display name.
fn format_address(response: &NominatimResponse) -> Option<String> {
    let address = &response.address;
    let street = address.road.as_ref().map(|road| match &address.house_number {
        Some(number) => format!("{road} No.{number}"),
        None => road.clone(),
    });

    let parts: Vec<String> = [
        street,
        address.village.clone().or_else(|| address.suburb.clone()),
        address
            .city_district
            .clone()
            .or_else(|| address.county.clone()),
        address.city.clone().or_else(|| address.town.clone()),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.trim().is_empty())
    .take(3)
    .collect();

    if parts.is_empty() {
        response.display_name.clone().filter(|n| !n.is_empty())
    } else {
        Some(parts.join(", "))
    }
}

/// Best-effort address for `coordinates`, falling back to the coordinate string.
pub async fn describe_location(geocoder: &dyn Geocoder, coordinates: &Coordinates) -> String {
    match geocoder.reverse(coordinates).await {
        Ok(Some(address)) => address,
        Ok(None) => coordinates.display(),
        Err(e) => {
            warn!(error = %e, "Reverse geocoding failed, using coordinates");
            coordinates.display()
        }
    }
}

/// A position with its best-effort address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocatedPosition {
    pub coordinates: Coordinates,
    pub accuracy_m: f64,
    pub address: String,
}

/// Locates the device and describes where it is.
#[derive(Clone)]
pub struct GpsService {
    provider: Arc<dyn LocationProvider>,
    geocoder: Arc<dyn Geocoder>,
}

impl GpsService {
    #[must_use]
    pub fn new(provider: Arc<dyn LocationProvider>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { provider, geocoder }
    }

    /// Current position with an address.
    pub async fn locate(&self) -> AppResult<LocatedPosition> {
        let position = self.provider.current_position().await.map_err(|e| {
            debug!(error = %e, "Position unavailable");
            AppError::from(e)
        })?;
        let address = describe_location(self.geocoder.as_ref(), &position.coordinates).await;

        Ok(LocatedPosition {
            coordinates: position.coordinates,
            accuracy_m: position.accuracy_m,
            address,
        })
    }

    /// Geocoder in use.
    #[must_use]
    pub fn geocoder(&self) -> Arc<dyn Geocoder> {
        Arc::clone(&self.geocoder)
    }
}

/// Fills an empty location from the draft's coordinates.
#[derive(Clone)]
pub struct GpsEnricher {
    geocoder: Arc<dyn Geocoder>,
}

impl GpsEnricher {
    #[must_use]
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }
}

#[async_trait::async_trait]
impl ReportEnricher for GpsEnricher {
    fn name(&self) -> &'static str {
        "gps"
    }

    async fn enrich(&self, draft: &mut ReportDraft) -> AppResult<()> {
        let Some(coordinates) = draft.data.gps_coordinates else {
            return Ok(());
        };
        if draft.data.location.trim().is_empty() {
            draft.data.location = describe_location(self.geocoder.as_ref(), &coordinates).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use civic_db::test_utils::new_report;

    struct FailingGeocoder;

    #[async_trait::async_trait]
    impl Geocoder for FailingGeocoder {
        async fn reverse(&self, _coordinates: &Coordinates) -> AppResult<Option<String>> {
            Err(AppError::ExternalService("offline".to_string()))
        }
    }

    struct FixedGeocoder(&'static str);

    #[async_trait::async_trait]
    impl Geocoder for FixedGeocoder {
        async fn reverse(&self, _coordinates: &Coordinates) -> AppResult<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    const SQUARE: Coordinates = Coordinates::new(-6.2, 106.816_666);

    #[test]
    fn test_format_address_prefers_parts() {
        let response: NominatimResponse = serde_json::from_str(
            r#"{
                "display_name": "Somewhere long",
                "address": {
                    "road": "Jalan Mawar",
                    "house_number": "12",
                    "suburb": "Menteng",
                    "county": "Central",
                    "city": "Jakarta"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(
            format_address(&response).as_deref(),
            Some("Jalan Mawar No.12, Menteng, Central")
        );
    }

    #[test]
    fn test_format_address_falls_back_to_display_name() {
        let response: NominatimResponse =
            serde_json::from_str(r#"{"display_name": "Open field"}"#).unwrap();
        assert_eq!(format_address(&response).as_deref(), Some("Open field"));
        assert_eq!(format_address(&NominatimResponse::default()), None);
    }

    #[test]
    fn test_reverse_url() {
        let geocoder = NominatimGeocoder::new(&GeocodingConfig::default()).unwrap();
        let url = geocoder.reverse_url(&Coordinates::new(1.5, 2.25)).unwrap();
        assert!(url.path().ends_with("/reverse"));
        let query = url.query().unwrap();
        assert!(query.contains("format=json"));
        assert!(query.contains("lat=1.5"));
        assert!(query.contains("lon=2.25"));
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let messages = [
            GeolocationError::PermissionDenied,
            GeolocationError::PositionUnavailable,
            GeolocationError::Timeout,
            GeolocationError::Unknown,
        ]
        .map(GeolocationError::user_message);
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_describe_location_falls_back_on_error() {
        assert_eq!(
            describe_location(&FailingGeocoder, &SQUARE).await,
            "-6.200000, 106.816666"
        );
        assert_eq!(
            describe_location(&NoopGeocoder, &SQUARE).await,
            "-6.200000, 106.816666"
        );
    }

    #[tokio::test]
    async fn test_locate() {
        let service = GpsService::new(
            Arc::new(FixedLocationProvider::at(Position {
                coordinates: SQUARE,
                accuracy_m: 12.0,
            })),
            Arc::new(FixedGeocoder("Village square")),
        );
        let located = service.locate().await.unwrap();
        assert_eq!(located.address, "Village square");
        assert_eq!(located.accuracy_m, 12.0);

        let denied = GpsService::new(
            Arc::new(FixedLocationProvider::failing(GeolocationError::PermissionDenied)),
            Arc::new(NoopGeocoder),
        );
        let err = denied.locate().await.unwrap_err();
        assert_eq!(err.error_code(), "GEOLOCATION_ERROR");
    }

    #[tokio::test]
    async fn test_gps_enricher_fills_only_empty_location() {
        let enricher = GpsEnricher::new(Arc::new(FixedGeocoder("Jalan Mawar, Menteng")));

        let mut data = new_report("Broken street lamp");
        data.location = "  ".to_string();
        data.gps_coordinates = Some(SQUARE);
        let mut draft = ReportDraft::new(data);
        enricher.enrich(&mut draft).await.unwrap();
        assert_eq!(draft.data.location, "Jalan Mawar, Menteng");

        let mut data = new_report("Broken street lamp");
        data.gps_coordinates = Some(SQUARE);
        let mut draft = ReportDraft::new(data);
        enricher.enrich(&mut draft).await.unwrap();
        assert_eq!(draft.data.location, "Jl. Mawar RT 02");
    }
}
