use super::*;
use crate::errors::ErrorKind;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> GooglePlaces {
    GooglePlaces::new(&ServicesConfig {
        places_base_url: server.uri(),
        ..ServicesConfig::default()
    })
}

#[tokio::test]
async fn test_search_maps_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("query", "Tian Tian Chicken Rice"))
        .and(query_param("region", "sg"))
        .and(query_param("key", "maps-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": [{
                "name": "Tian Tian Hainanese Chicken Rice",
                "formatted_address": "1 Kadayanallur St, #01-10, Singapore 069184",
                "place_id": "ChIJ123",
                "rating": 4.3
            }]
        })))
        .mount(&server)
        .await;

    let places = provider(&server)
        .search("maps-key", "Tian Tian Chicken Rice", None)
        .await
        .unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].place_id, "ChIJ123");
    assert_eq!(places[0].rating, Some(4.3));
    assert!(places[0].phone.is_none());
}

#[tokio::test]
async fn test_search_with_location_bias() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/textsearch/json"))
        .and(query_param("location", "1.3,103.8"))
        .and(query_param("radius", "3000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ZERO_RESULTS", "results": []})))
        .mount(&server)
        .await;

    let places = provider(&server)
        .search("k", "food deals", Some((1.3, 103.8)))
        .await
        .unwrap();
    assert!(places.is_empty());
}

#[tokio::test]
async fn test_denied_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."
        })))
        .mount(&server)
        .await;

    let err = provider(&server).search("k", "x", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_missing_key_short_circuits() {
    let server = MockServer::start().await;
    let err = provider(&server).search("", "x", None).await.unwrap_err();
    assert!(matches!(err, WahubError::Config(_)));
}
