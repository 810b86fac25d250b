//! Open-Meteo weather context for itinerary prompts.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::cache::{
    forecast_key, geocode_key, ResponseCache, FORECAST_TTL, GEOCODE_TTL, WEATHER_CACHE_SIZE,
};
use crate::error::{PlannerError, Result};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RAIN_MENTION_THRESHOLD: u32 = 30;

const RAINY_KEYWORDS: [&str; 4] = ["rain", "drizzle", "shower", "thunderstorm"];
const INDOOR_KEYWORDS: [&str; 6] = ["rain", "drizzle", "shower", "thunderstorm", "snow", "heavy"];

/// Values held by the weather cache.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherCacheValue {
    Coordinates { latitude: f64, longitude: f64 },
    Forecast(Vec<DailyForecast>),
}

pub type WeatherCache = ResponseCache<WeatherCacheValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub day: u32,
    pub date: String,
    pub condition: String,
    pub temp_max: i64,
    pub temp_min: i64,
    pub precipitation_probability: u32,
    pub is_rainy: bool,
    pub is_indoor_preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherContext {
    pub forecasts: Vec<DailyForecast>,
    pub summary: String,
    pub has_rain: bool,
    pub rainy_days: Vec<u32>,
    pub indoor_preferred_days: Vec<u32>,
}

impl WeatherContext {
    pub fn from_forecasts(forecasts: Vec<DailyForecast>) -> Self {
        let summary = format_summary(&forecasts);
        let rainy_days = forecasts
            .iter()
            .filter(|forecast| forecast.is_rainy)
            .map(|forecast| forecast.day)
            .collect::<Vec<_>>();
        let indoor_preferred_days = forecasts
            .iter()
            .filter(|forecast| forecast.is_indoor_preferred)
            .map(|forecast| forecast.day)
            .collect();
        Self {
            has_rain: !rainy_days.is_empty(),
            forecasts,
            summary,
            rainy_days,
            indoor_preferred_days,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    daily: Option<DailySeries>,
}

#[derive(Debug, Default, Deserialize)]
struct DailySeries {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct WeatherService {
    http: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
    cache: Arc<WeatherCache>,
}

impl WeatherService {
    pub fn new(cache: Arc<WeatherCache>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| PlannerError::Http(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            cache,
        })
    }

    /// A service with its own weather cache of the default size.
    pub fn standalone() -> Result<Self> {
        Self::new(Arc::new(ResponseCache::new("weather", WEATHER_CACHE_SIZE)))
    }

    pub fn with_geocoding_url(mut self, url: impl Into<String>) -> Self {
        self.geocoding_url = url.into();
        self
    }

    pub fn with_forecast_url(mut self, url: impl Into<String>) -> Self {
        self.forecast_url = url.into();
        self
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    pub async fn coordinates(&self, destination: &str) -> Result<(f64, f64)> {
        let key = geocode_key(destination);
        if let Some(WeatherCacheValue::Coordinates {
            latitude,
            longitude,
        }) = self.cache.get(&key)
        {
            return Ok((latitude, longitude));
        }

        let response = self
            .http
            .get(&self.geocoding_url)
            .query(&[
                ("name", destination),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|err| PlannerError::Weather(format!("geocoding request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlannerError::Weather(format!(
                "geocoding returned HTTP {status}"
            )));
        }

        let body: GeocodingResponse = response
            .json()
            .await
            .map_err(|err| PlannerError::Weather(format!("invalid geocoding payload: {err}")))?;

        let first = body.results.first().ok_or_else(|| {
            PlannerError::Weather(format!("no coordinates found for {destination}"))
        })?;

        debug!(
            target: "planner::weather",
            destination,
            latitude = first.latitude,
            longitude = first.longitude,
            "geocoded destination"
        );
        self.cache.set(
            key,
            WeatherCacheValue::Coordinates {
                latitude: first.latitude,
                longitude: first.longitude,
            },
            GEOCODE_TTL,
        );
        Ok((first.latitude, first.longitude))
    }

    pub async fn forecast(
        &self,
        destination: &str,
        duration_days: u32,
        start: NaiveDate,
    ) -> Result<Vec<DailyForecast>> {
        let (latitude, longitude) = self.coordinates(destination).await?;
        let start_date = start.format("%Y-%m-%d").to_string();
        let key = forecast_key(latitude, longitude, &start_date, duration_days);
        if let Some(WeatherCacheValue::Forecast(forecasts)) = self.cache.get(&key) {
            return Ok(forecasts);
        }

        let end = start + chrono::Duration::days(i64::from(duration_days.max(1)) - 1);
        let end_date = end.format("%Y-%m-%d").to_string();
        let latitude_param = latitude.to_string();
        let longitude_param = longitude.to_string();

        let response = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude_param.as_str()),
                ("longitude", longitude_param.as_str()),
                (
                    "daily",
                    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max",
                ),
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("timezone", "auto"),
            ])
            .send()
            .await
            .map_err(|err| PlannerError::Weather(format!("forecast request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlannerError::Weather(format!(
                "forecast returned HTTP {status}"
            )));
        }

        let body: ForecastResponse = response
            .json()
            .await
            .map_err(|err| PlannerError::Weather(format!("invalid forecast payload: {err}")))?;

        let forecasts = daily_forecasts(body.daily.unwrap_or_default());
        info!(
            target: "planner::weather",
            destination,
            days = forecasts.len(),
            "fetched forecast"
        );
        self.cache.set(
            key,
            WeatherCacheValue::Forecast(forecasts.clone()),
            FORECAST_TTL,
        );
        Ok(forecasts)
    }

    /// Forecast and prompt summary for a trip starting today.
    pub async fn weather_context(
        &self,
        destination: &str,
        duration_days: u32,
    ) -> Result<WeatherContext> {
        let today = chrono::Local::now().date_naive();
        self.weather_context_from(destination, duration_days, today)
            .await
    }

    pub async fn weather_context_from(
        &self,
        destination: &str,
        duration_days: u32,
        start: NaiveDate,
    ) -> Result<WeatherContext> {
        let forecasts = self.forecast(destination, duration_days, start).await?;
        if forecasts.is_empty() {
            warn!(target: "planner::weather", destination, "forecast contained no days");
        }
        Ok(WeatherContext::from_forecasts(forecasts))
    }
}

fn daily_forecasts(series: DailySeries) -> Vec<DailyForecast> {
    series
        .time
        .iter()
        .enumerate()
        .map(|(index, date)| {
            let condition = series
                .weather_code
                .get(index)
                .copied()
                .flatten()
                .map(condition_for_code)
                .unwrap_or("Unknown");
            DailyForecast {
                day: index as u32 + 1,
                date: date.clone(),
                condition: condition.to_string(),
                temp_max: reading(&series.temperature_2m_max, index).round() as i64,
                temp_min: reading(&series.temperature_2m_min, index).round() as i64,
                precipitation_probability: reading(&series.precipitation_probability_max, index)
                    .round()
                    .max(0.0) as u32,
                is_rainy: is_rainy(condition),
                is_indoor_preferred: is_indoor_preferred(condition),
            }
        })
        .collect()
}

fn reading(values: &[Option<f64>], index: usize) -> f64 {
    values.get(index).copied().flatten().unwrap_or_default()
}

/// WMO weather interpretation codes.
pub fn condition_for_code(code: i64) -> &'static str {
    match code {
        0 => "Clear",
        1 => "Mostly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 | 48 => "Foggy",
        51 => "Light Drizzle",
        53 => "Drizzle",
        55 => "Heavy Drizzle",
        61 => "Light Rain",
        63 => "Rain",
        65 => "Heavy Rain",
        71 => "Light Snow",
        73 => "Snow",
        75 => "Heavy Snow",
        77 => "Snow Grains",
        80 => "Light Showers",
        81 => "Showers",
        82 => "Heavy Showers",
        85 => "Light Snow Showers",
        86 => "Snow Showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with Hail",
        99 => "Heavy Thunderstorm",
        _ => "Unknown",
    }
}

pub fn is_rainy(condition: &str) -> bool {
    let condition = condition.to_lowercase();
    RAINY_KEYWORDS.iter().any(|keyword| condition.contains(keyword))
}

pub fn is_indoor_preferred(condition: &str) -> bool {
    let condition = condition.to_lowercase();
    INDOOR_KEYWORDS.iter().any(|keyword| condition.contains(keyword))
}

/// Render forecasts as the weather block interpolated into the prompt.
pub fn format_summary(forecasts: &[DailyForecast]) -> String {
    if forecasts.is_empty() {
        return "Weather data unavailable.".to_string();
    }

    let mut lines = vec!["Weather Forecast:".to_string()];
    for forecast in forecasts {
        let mut line = format!(
            "Day {}: {}, High {}°C",
            forecast.day, forecast.condition, forecast.temp_max
        );
        if forecast.precipitation_probability > RAIN_MENTION_THRESHOLD {
            line.push_str(&format!(
                " ({}% chance of rain)",
                forecast.precipitation_probability
            ));
        }
        lines.push(line);
    }

    let indoor_days: Vec<String> = forecasts
        .iter()
        .filter(|forecast| forecast.is_indoor_preferred)
        .map(|forecast| forecast.day.to_string())
        .collect();

    lines.push(String::new());
    if indoor_days.is_empty() {
        lines.push("Good weather expected".to_string());
        lines.push(
            "Recommendation: Include outdoor sightseeing, parks, and walking tours".to_string(),
        );
    } else {
        lines.push(format!("Rain expected on Day(s) {}", indoor_days.join(", ")));
        lines.push(
            "Recommendation: Prioritize indoor activities (museums, temples, shopping, covered markets)"
                .to_string(),
        );
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(day: u32, code: i64, precipitation: u32) -> DailyForecast {
        let condition = condition_for_code(code);
        DailyForecast {
            day,
            date: format!("2026-05-0{day}"),
            condition: condition.to_string(),
            temp_max: 24,
            temp_min: 15,
            precipitation_probability: precipitation,
            is_rainy: is_rainy(condition),
            is_indoor_preferred: is_indoor_preferred(condition),
        }
    }

    #[test]
    fn test_condition_flags() {
        assert!(is_rainy("Light Showers"));
        assert!(!is_rainy("Heavy Snow"));
        assert!(is_indoor_preferred("Heavy Snow"));
        assert!(!is_indoor_preferred("Partly Cloudy"));
        assert_eq!(condition_for_code(42), "Unknown");
    }

    #[test]
    fn test_summary_with_rain() {
        let summary = format_summary(&[day(1, 0, 10), day(2, 63, 80)]);
        assert!(summary.starts_with("Weather Forecast:"));
        assert!(summary.contains("Day 1: Clear, High 24°C\n"));
        assert!(summary.contains("Day 2: Rain, High 24°C (80% chance of rain)"));
        assert!(summary.contains("Rain expected on Day(s) 2"));
        assert!(summary.contains("Prioritize indoor activities"));
    }

    #[test]
    fn test_summary_good_weather_and_empty() {
        let summary = format_summary(&[day(1, 1, 31)]);
        assert!(summary.contains("(31% chance of rain)"));
        assert!(summary.contains("Good weather expected"));
        assert_eq!(format_summary(&[]), "Weather data unavailable.");
    }

    #[test]
    fn test_context_flags() {
        let context = WeatherContext::from_forecasts(vec![day(1, 71, 0), day(2, 95, 60)]);
        assert!(context.has_rain);
        assert_eq!(context.rainy_days, vec![2]);
        assert_eq!(context.indoor_preferred_days, vec![1, 2]);
    }

    #[test]
    fn test_daily_series_tolerates_gaps() {
        let series: DailySeries = serde_json::from_value(serde_json::json!({
            "time": ["2026-05-01", "2026-05-02"],
            "weather_code": [61, null],
            "temperature_2m_max": [20.6, 18.2],
            "temperature_2m_min": [11.4, null]
        }))
        .unwrap();
        let forecasts = daily_forecasts(series);
        assert_eq!(forecasts.len(), 2);
        assert_eq!(forecasts[0].temp_max, 21);
        assert!(forecasts[0].is_rainy);
        assert_eq!(forecasts[1].condition, "Unknown");
        assert_eq!(forecasts[1].precipitation_probability, 0);
    }
}
