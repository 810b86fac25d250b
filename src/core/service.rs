//! Service root owning the shared caches, usage counters and collaborators.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::budget::{summarize, BudgetSummary, BudgetValidator};
use super::cache::{CacheStats, ResponseCache, GENERATION_CACHE_SIZE, WEATHER_CACHE_SIZE};
use super::parse_debug::FileDebugSink;
use super::parser::ResponseParser;
use super::planner::{GenerationCache, ItineraryPlanner, DEFAULT_MAX_RETRIES};
use super::prompt::PromptTemplate;
use super::usage::{UsageStats, UsageTracker};
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::services::model::CompletionModel;
use crate::services::openai_client::OpenAIClient;
use crate::services::weather::{WeatherCache, WeatherContext, WeatherService};
use crate::types::{BudgetStatus, GeneratedDocument, GenerationRequest};

/// A generated itinerary together with its budget report.
#[derive(Debug, Clone, Serialize)]
pub struct TripPlan {
    pub document: GeneratedDocument,
    pub status: BudgetStatus,
    pub budget_summary: BudgetSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherContext>,
    pub model_calls: usize,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCacheStats {
    pub weather: CacheStats,
    pub generation: CacheStats,
}

#[derive(Debug)]
pub struct TravelService {
    planner: ItineraryPlanner,
    weather: Option<WeatherService>,
    weather_cache: Arc<WeatherCache>,
    generation_cache: Arc<GenerationCache>,
    usage: Arc<UsageTracker>,
    max_retries: usize,
}

impl TravelService {
    /// Fresh caches and counters around `model`, with live weather lookups.
    pub fn new(model: Arc<dyn CompletionModel>) -> Result<Self> {
        let weather_cache = Arc::new(ResponseCache::new("weather", WEATHER_CACHE_SIZE));
        let generation_cache = Arc::new(ResponseCache::new("generation", GENERATION_CACHE_SIZE));
        let usage = Arc::new(UsageTracker::default());
        let planner = ItineraryPlanner::new(model)
            .with_cache(generation_cache.clone())
            .with_usage_tracker(usage.clone());
        let weather = WeatherService::new(weather_cache.clone())?;

        Ok(Self {
            planner,
            weather: Some(weather),
            weather_cache,
            generation_cache,
            usage,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    pub fn from_config(config: &PlannerConfig) -> Result<Self> {
        let client = OpenAIClient::new(config.api_key.clone())
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone())
            .with_timeout(config.timeout);

        let template = match &config.prompt_template {
            Some(path) => PromptTemplate::from_file(path)?,
            None => PromptTemplate::default(),
        };
        let mut parser = ResponseParser::new();
        if let Some(dir) = &config.debug_dir {
            parser = parser.with_debug_sink(Arc::new(FileDebugSink::new(dir)?));
        }

        info!(
            target: "planner::generate",
            model = %config.model,
            base_url = %config.base_url,
            max_retries = config.max_retries,
            "travel service configured"
        );

        let service = Self::new(Arc::new(client))?
            .with_usage_tracker(Arc::new(UsageTracker::new(config.cost_per_1k_tokens)))
            .with_max_retries(config.max_retries)
            .configure_planner(|planner| {
                planner
                    .with_template(template)
                    .with_parser(parser)
                    .with_validator(BudgetValidator::new(config.budget_tolerance_percent))
                    .with_params(config.params)
                    .with_timeout(config.timeout)
            });
        Ok(service)
    }

    /// Adjust the planner. The service's caches and counters stay attached.
    pub fn configure_planner<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(ItineraryPlanner) -> ItineraryPlanner,
    {
        self.planner = configure(self.planner)
            .with_cache(self.generation_cache.clone())
            .with_usage_tracker(self.usage.clone());
        self
    }

    pub fn with_usage_tracker(mut self, usage: Arc<UsageTracker>) -> Self {
        self.planner = self.planner.with_usage_tracker(usage.clone());
        self.usage = usage;
        self
    }

    /// Use `weather` and adopt its cache.
    pub fn with_weather_service(mut self, weather: WeatherService) -> Self {
        self.weather_cache = weather.cache().clone();
        self.weather = Some(weather);
        self
    }

    pub fn without_weather(mut self) -> Self {
        self.weather = None;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn planner(&self) -> &ItineraryPlanner {
        &self.planner
    }

    /// Generate an itinerary and its budget report.
    ///
    /// A weather summary already present on the request is used as-is. A
    /// failed weather lookup degrades to planning without weather.
    pub async fn plan(&self, request: &GenerationRequest) -> Result<TripPlan> {
        let weather = match (&self.weather, request.weather_summary()) {
            (Some(service), None) if request.weather_aware() => {
                match service
                    .weather_context(request.destination(), request.duration_days())
                    .await
                {
                    Ok(context) => Some(context),
                    Err(err) => {
                        warn!(
                            target: "planner::weather",
                            destination = request.destination(),
                            error = %err,
                            "weather unavailable, planning without it"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let summary = weather.as_ref().map(|context| context.summary.as_str());
        let generation = self
            .planner
            .generate(request, summary, self.max_retries)
            .await?;

        let budget_summary = match &generation.validation {
            Some(validation) => summarize(validation, request.budget()),
            None => self
                .planner
                .validator()
                .summary(&generation.document, request.budget()),
        };

        Ok(TripPlan {
            document: generation.document,
            status: generation.status,
            budget_summary,
            weather,
            model_calls: generation.model_calls,
            from_cache: generation.from_cache,
        })
    }

    pub fn validate(&self, document: &GeneratedDocument, budget: f64) -> BudgetSummary {
        self.planner.validator().summary(document, budget)
    }

    /// Budget report for an itinerary supplied as raw JSON.
    pub fn validate_value(&self, value: &Value, budget: f64) -> Result<BudgetSummary> {
        let document = GeneratedDocument::from_value(value, &value.to_string())?;
        Ok(self.validate(&document, budget))
    }

    pub fn cache_stats(&self) -> ServiceCacheStats {
        ServiceCacheStats {
            weather: self.weather_cache.stats(),
            generation: self.generation_cache.stats(),
        }
    }

    pub fn token_stats(&self) -> UsageStats {
        self.usage.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::{GenerationParams, ModelResponse};
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl CompletionModel for Unreachable {
        async fn complete(&self, _prompt: &str, _params: &GenerationParams) -> Result<ModelResponse> {
            Err(crate::error::PlannerError::Unknown("not expected".to_string()))
        }
    }

    #[test]
    fn test_validate_value_reports_summary() {
        let service = TravelService::new(Arc::new(Unreachable)).unwrap();
        let value = json!({
            "destination": "Porto, Portugal",
            "duration": 2,
            "itinerary": [],
            "budget_breakdown": {
                "accommodation_total": 300,
                "transportation_total": 100,
                "activities_total": 50,
                "food_total": 50,
                "miscellaneous": 50
            }
        });

        let summary = service.validate_value(&value, 500.0).unwrap();
        assert!(!summary.is_within_budget);
        assert_eq!(summary.estimated_total_cost, 550.0);
        assert_eq!(summary.percentage_used, 110.0);
        assert_eq!(summary.status, BudgetStatus::OverBudget);
    }

    #[test]
    fn test_validate_value_rejects_non_itinerary() {
        let service = TravelService::new(Arc::new(Unreachable)).unwrap();
        let err = service
            .validate_value(&json!({"destination": "Porto"}), 500.0)
            .unwrap_err();
        assert_eq!(err.error_code(), "PARSE_ERROR");
    }

    #[test]
    fn test_fresh_service_has_empty_stats() {
        let service = TravelService::new(Arc::new(Unreachable)).unwrap();
        let stats = service.cache_stats();
        assert_eq!(stats.weather.max_size, WEATHER_CACHE_SIZE);
        assert_eq!(stats.generation.max_size, GENERATION_CACHE_SIZE);
        assert_eq!(service.token_stats().total_requests, 0);
    }
}
