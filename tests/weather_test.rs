mod common;

use chrono::NaiveDate;
use common::{itinerary_text, ok, ScriptedModel};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use trip_planner_rs::{GenerationRequest, TravelService, WeatherService};

fn geocoding_body() -> String {
    json!({
        "results": [{"name": "Lisbon", "latitude": 38.72, "longitude": -9.14, "country": "Portugal"}]
    })
    .to_string()
}

fn forecast_body() -> String {
    json!({
        "daily": {
            "time": ["2026-05-01", "2026-05-02", "2026-05-03"],
            "weather_code": [0, 63, 2],
            "temperature_2m_max": [24.4, 19.6, 22.0],
            "temperature_2m_min": [15.1, 14.0, 13.8],
            "precipitation_probability_max": [5, 85, 20]
        }
    })
    .to_string()
}

fn weather_service(server: &ServerGuard) -> WeatherService {
    WeatherService::standalone()
        .unwrap()
        .with_geocoding_url(format!("{}/v1/search", server.url()))
        .with_forecast_url(format!("{}/v1/forecast", server.url()))
}

#[tokio::test]
async fn test_weather_context_from_open_meteo() {
    let mut server = Server::new_async().await;
    let geocode = server
        .mock("GET", Matcher::Regex(r"^/v1/search".to_string()))
        .match_query(Matcher::UrlEncoded("name".into(), "Lisbon, Portugal".into()))
        .with_status(200)
        .with_body(geocoding_body())
        .expect(1)
        .create_async()
        .await;
    let forecast = server
        .mock("GET", Matcher::Regex(r"^/v1/forecast".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start_date".into(), "2026-05-01".into()),
            Matcher::UrlEncoded("end_date".into(), "2026-05-03".into()),
        ]))
        .with_status(200)
        .with_body(forecast_body())
        .expect(1)
        .create_async()
        .await;

    let service = weather_service(&server);
    let start = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

    let context = service
        .weather_context_from("Lisbon, Portugal", 3, start)
        .await
        .unwrap();

    assert_eq!(context.forecasts.len(), 3);
    assert_eq!(context.forecasts[1].condition, "Rain");
    assert_eq!(context.forecasts[0].temp_max, 24);
    assert!(context.has_rain);
    assert_eq!(context.rainy_days, vec![2]);
    assert!(context
        .summary
        .contains("Day 2: Rain, High 20°C (85% chance of rain)"));

    // Second lookup is served from the weather cache
    let again = service
        .weather_context_from("lisbon, portugal", 3, start)
        .await
        .unwrap();
    assert_eq!(again, context);

    geocode.assert_async().await;
    forecast.assert_async().await;
    assert_eq!(service.cache().stats().hits, 2);
}

#[tokio::test]
async fn test_unknown_destination_is_weather_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/search".to_string()))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let service = weather_service(&server);
    let err = service.weather_context("Atlantis", 3).await.unwrap_err();

    assert_eq!(err.error_code(), "WEATHER_ERROR");
}

#[tokio::test]
async fn test_plan_includes_weather_summary() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/search".to_string()))
        .with_status(200)
        .with_body(geocoding_body())
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/forecast".to_string()))
        .with_status(200)
        .with_body(forecast_body())
        .create_async()
        .await;

    let model = Arc::new(ScriptedModel::new(vec![ok(itinerary_text(900.0))]));
    let service = TravelService::new(model.clone())
        .unwrap()
        .with_weather_service(weather_service(&server));

    let request = GenerationRequest::new("Lisbon, Portugal", 3, 1000.0, ["food"]).unwrap();
    let plan = service.plan(&request).await.unwrap();

    assert!(plan.weather.is_some());
    assert!(model.prompts()[0].contains("Weather Forecast:"));
    assert!(model.prompts()[0].contains("Prioritize indoor activities"));
    assert_eq!(service.cache_stats().weather.size, 2);
}

#[tokio::test]
async fn test_plan_degrades_when_weather_fails() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/search".to_string()))
        .with_status(500)
        .create_async()
        .await;

    let model = Arc::new(ScriptedModel::new(vec![ok(itinerary_text(900.0))]));
    let service = TravelService::new(model.clone())
        .unwrap()
        .with_weather_service(weather_service(&server));

    let request = GenerationRequest::new("Lisbon, Portugal", 3, 1000.0, ["food"]).unwrap();
    let plan = service.plan(&request).await.unwrap();

    assert!(plan.weather.is_none());
    assert!(!model.prompts()[0].contains("Weather Forecast:"));
    assert_eq!(model.calls(), 1);
}
