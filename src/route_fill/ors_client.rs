use super::{FetchError, RouteFillClient};
use crate::config::ProviderConfig;
use crate::types::Coord;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    /// `[lon, lat]` or `[lon, lat, elevation]`
    coordinates: Vec<Vec<f64>>,
}

/// Parse an OpenRouteService GeoJSON directions response into ordered coordinates.
pub fn parse_directions_json(body: &str) -> Result<Vec<Coord>, FetchError> {
    let response: DirectionsResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Unavailable(format!("Invalid response: {}", e)))?;

    let feature = response
        .features
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Unavailable("No route returned".to_string()))?;

    let coords: Vec<Coord> = feature
        .geometry
        .coordinates
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Coord::new(c[1], c[0]))
        .collect();

    if coords.is_empty() {
        return Err(FetchError::Unavailable("Empty route geometry".to_string()));
    }
    Ok(coords)
}

/// OpenRouteService directions client
///
/// # Request
/// `GET {base_url}/{profile}?api_key=KEY&start=lon,lat&end=lon,lat`
///
/// # Error Handling
/// - Client timeout (default 5s): `FetchError::Timeout`
/// - Non-2xx status: `FetchError::HttpError(status)`, including 429
/// - Connection failures and unusable bodies: `FetchError::Unavailable`
/// - No retries; one request per call
pub struct OrsClient {
    client: reqwest::Client,
    base_url: String,
    profile: String,
    api_key: Option<String>,
}

impl OrsClient {
    pub fn new(config: &ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("route_gapfill/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        OrsClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            profile: config.profile.clone(),
            api_key: config.credential().map(str::to_string),
        }
    }

    fn directions_url(&self) -> String {
        format!("{}/{}", self.base_url, self.profile)
    }

    fn query(&self, key: &str, origin: Coord, destination: Coord) -> [(&'static str, String); 3] {
        [
            ("api_key", key.to_string()),
            ("start", format!("{},{}", origin.lon, origin.lat)),
            ("end", format!("{},{}", destination.lon, destination.lat)),
        ]
    }
}

impl RouteFillClient for OrsClient {
    async fn fetch_walking_path(
        &self,
        origin: Coord,
        destination: Coord,
    ) -> Result<Vec<Coord>, FetchError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::Unavailable("No API key configured".to_string()))?;

        let response = self
            .client
            .get(self.directions_url())
            .query(&self.query(key, origin, destination))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Routing provider returned HTTP {}", status.as_u16());
            return Err(FetchError::HttpError(status.as_u16()));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        parse_directions_json(&body)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &str {
        "openrouteservice"
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    fn configured() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("test-key".to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_directions_url() {
        let client = OrsClient::new(&ProviderConfig {
            base_url: "https://example.test/v2/directions/".to_string(),
            ..configured()
        });
        assert_eq!(
            client.directions_url(),
            "https://example.test/v2/directions/foot-walking"
        );
    }

    #[test]
    fn test_query_uses_lon_lat_order() {
        let client = OrsClient::new(&configured());
        let query = client.query("k", Coord::new(40.5, -74.25), Coord::new(40.75, -74.0));

        assert_eq!(query[0], ("api_key", "k".to_string()));
        assert_eq!(query[1], ("start", "-74.25,40.5".to_string()));
        assert_eq!(query[2], ("end", "-74,40.75".to_string()));
    }

    #[test]
    fn test_is_configured() {
        assert!(OrsClient::new(&configured()).is_configured());
        assert!(!OrsClient::new(&ProviderConfig::default()).is_configured());
    }

    #[test]
    fn test_parse_directions() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"summary": {"distance": 512.3, "duration": 368.8}},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[-74.001, 40.001], [-74.02, 40.02, 12.5], [-74.05, 40.05]]
                }
            }]
        }"#;

        let coords = parse_directions_json(body).unwrap();
        assert_eq!(coords.len(), 3);
        assert_eq!(coords[0], Coord::new(40.001, -74.001));
        assert_eq!(coords[1], Coord::new(40.02, -74.02));
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(matches!(
            parse_directions_json(r#"{"features": []}"#),
            Err(FetchError::Unavailable(_))
        ));
        assert!(matches!(
            parse_directions_json("<html>Bad gateway</html>"),
            Err(FetchError::Unavailable(_))
        ));
        assert!(matches!(
            parse_directions_json(
                r#"{"features": [{"geometry": {"coordinates": []}}]}"#
            ),
            Err(FetchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_without_request() {
        let client = OrsClient::new(&ProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ProviderConfig::default()
        });
        let result = client
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.1, -74.1))
            .await;
        assert!(matches!(result, Err(FetchError::Unavailable(_))));
    }

    /// Serve `router` on an ephemeral local port, returning its directions base URL
    async fn local_provider(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v2/directions", addr)
    }

    fn client_for(base_url: String, timeout_secs: u64) -> OrsClient {
        OrsClient::new(&ProviderConfig {
            base_url,
            timeout_secs,
            ..configured()
        })
    }

    async fn directions(Query(params): Query<HashMap<String, String>>) -> axum::response::Response {
        if params.get("api_key").map(String::as_str) != Some("test-key") {
            return StatusCode::FORBIDDEN.into_response();
        }
        let (Some(start), Some(end)) = (params.get("start"), params.get("end")) else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        let body = format!(
            r#"{{"features": [{{"geometry": {{"coordinates": [[{}], [-74.02, 40.02], [{}]]}}}}]}}"#,
            start, end
        );
        body.into_response()
    }

    #[tokio::test]
    async fn test_fetch_from_local_provider() {
        let base = local_provider(Router::new().route("/v2/directions/foot-walking", get(directions))).await;
        let client = client_for(base, 5);

        let path = client
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.05, -74.05))
            .await
            .unwrap();

        assert_eq!(
            path,
            vec![
                Coord::new(40.0, -74.0),
                Coord::new(40.02, -74.02),
                Coord::new(40.05, -74.05),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let router = Router::new()
            .route(
                "/v2/directions/foot-walking",
                get(|| async { StatusCode::TOO_MANY_REQUESTS }),
            )
            .route(
                "/v2/directions/foot-hiking",
                get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
            );
        let base = local_provider(router).await;

        let walking = client_for(base.clone(), 5);
        let result = walking
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.05, -74.05))
            .await;
        assert_eq!(result, Err(FetchError::HttpError(429)));

        let hiking = OrsClient::new(&ProviderConfig {
            base_url: base,
            profile: "foot-hiking".to_string(),
            ..configured()
        });
        let result = hiking
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.05, -74.05))
            .await;
        assert_eq!(result, Err(FetchError::HttpError(503)));
    }

    #[tokio::test]
    async fn test_stalled_provider_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = client_for(format!("http://{}/v2/directions", addr), 1);
        let result = client
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.05, -74.05))
            .await;
        assert_eq!(result, Err(FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_unusable_body_is_unavailable() {
        let router = Router::new().route(
            "/v2/directions/foot-walking",
            get(|| async { "<html>maintenance</html>" }),
        );
        let client = client_for(local_provider(router).await, 5);

        let result = client
            .fetch_walking_path(Coord::new(40.0, -74.0), Coord::new(40.05, -74.05))
            .await;
        assert!(matches!(result, Err(FetchError::Unavailable(_))));
    }

    // Requires network and ORS_API_KEY
    #[tokio::test]
    #[ignore]
    async fn test_fetch_walking_path_integration() {
        let key = std::env::var(crate::config::API_KEY_ENV).unwrap_or_default();
        let client = OrsClient::new(&ProviderConfig {
            api_key: Some(key),
            ..ProviderConfig::default()
        });

        match client
            .fetch_walking_path(Coord::new(40.7128, -74.0060), Coord::new(40.7180, -74.0010))
            .await
        {
            Ok(path) => {
                assert!(path.len() >= 2);
                println!("Fetched {} path points", path.len());
            }
            Err(e) => panic!("Fetch failed: {}", e),
        }
    }
}
