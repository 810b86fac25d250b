//! Generation loop: cache check, model call, parse, budget validation, retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use super::budget::{utilization, BudgetValidation, BudgetValidator};
use super::cache::{generation_key, ResponseCache, GENERATION_CACHE_SIZE, GENERATION_TTL};
use super::parser::{looks_truncated, ResponseParser};
use super::prompt::{optimization_notice, over_budget_notice, PromptTemplate};
use super::usage::UsageTracker;
use crate::error::{PlannerError, Result};
use crate::services::model::{CompletionModel, GenerationParams};
use crate::types::{BudgetStatus, GeneratedDocument, GenerationRequest, TokenUsage};

/// Below this utilization (percent) a valid plan gets one upgrade attempt.
pub const LOW_UTILIZATION_PERCENT: f64 = 75.0;
pub const DEFAULT_MAX_RETRIES: usize = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub type GenerationCache = ResponseCache<GeneratedDocument>;

/// Result of one [`ItineraryPlanner::generate`] call.
#[derive(Debug, Clone)]
pub struct Generation {
    pub document: GeneratedDocument,
    pub status: BudgetStatus,
    /// `None` when the document came from the cache
    pub validation: Option<BudgetValidation>,
    /// Model calls made for this result
    pub model_calls: usize,
    pub from_cache: bool,
}

#[derive(Debug)]
struct Evaluated {
    document: GeneratedDocument,
    validation: BudgetValidation,
}

#[derive(Debug)]
enum AttemptOutcome {
    WithinBudget(Evaluated),
    OverBudget(Evaluated),
    Rejected(PlannerError),
}

#[derive(Debug)]
pub struct ItineraryPlanner {
    model: Arc<dyn CompletionModel>,
    cache: Arc<GenerationCache>,
    usage: Arc<UsageTracker>,
    validator: BudgetValidator,
    parser: ResponseParser,
    template: PromptTemplate,
    params: GenerationParams,
    timeout: Duration,
    cache_ttl: Duration,
}

impl ItineraryPlanner {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            cache: Arc::new(ResponseCache::new("generation", GENERATION_CACHE_SIZE)),
            usage: Arc::new(UsageTracker::default()),
            validator: BudgetValidator::default(),
            parser: ResponseParser::new(),
            template: PromptTemplate::default(),
            params: GenerationParams::default(),
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: GENERATION_TTL,
        }
    }

    pub fn with_cache(mut self, cache: Arc<GenerationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_usage_tracker(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_validator(mut self, validator: BudgetValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn cache(&self) -> &Arc<GenerationCache> {
        &self.cache
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn validator(&self) -> &BudgetValidator {
        &self.validator
    }

    /// Produce an itinerary for `request`, retrying up to `max_retries` times.
    ///
    /// `weather_summary` falls back to the summary carried by the request.
    /// Running out of attempts while over budget is not an error: the last
    /// document is returned tagged [`BudgetStatus::OverBudget`].
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        weather_summary: Option<&str>,
        max_retries: usize,
    ) -> Result<Generation> {
        let weather = weather_summary.or_else(|| request.weather_summary());
        let key = generation_key(request, weather.is_some());

        if let Some(document) = self.cache.get(&key) {
            info!(
                target: "planner::generate",
                destination = request.destination(),
                "serving itinerary from cache"
            );
            return Ok(Generation {
                status: document.budget_status,
                document,
                validation: None,
                model_calls: 0,
                from_cache: true,
            });
        }

        let base_prompt = self.template.render(request, weather);
        let mut over_budget_seen = false;
        let mut optimization_used = false;
        let mut model_calls = 0;

        for attempt in 0..=max_retries {
            let is_last = attempt == max_retries;
            let prompt = if over_budget_seen {
                format!("{base_prompt}{}", over_budget_notice(request))
            } else {
                base_prompt.clone()
            };

            model_calls += 1;
            match self
                .attempt(request, &prompt, attempt == 0 && !is_last)
                .await
            {
                AttemptOutcome::Rejected(err) => {
                    if is_last || !err.is_retryable() {
                        error!(
                            target: "planner::generate",
                            attempt,
                            code = err.error_code(),
                            error = %err,
                            "generation failed"
                        );
                        return Err(err);
                    }
                    warn!(
                        target: "planner::generate",
                        attempt,
                        code = err.error_code(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                }
                AttemptOutcome::OverBudget(evaluated) => {
                    if is_last {
                        warn!(
                            target: "planner::generate",
                            attempt,
                            total_cost = evaluated.validation.total_cost,
                            budget = request.budget(),
                            "retries exhausted, returning over-budget itinerary"
                        );
                        return Ok(finish(evaluated, model_calls));
                    }
                    over_budget_seen = true;
                    warn!(
                        target: "planner::generate",
                        attempt,
                        total_cost = evaluated.validation.total_cost,
                        budget = request.budget(),
                        "itinerary over budget, retrying"
                    );
                }
                AttemptOutcome::WithinBudget(evaluated) => {
                    let mut accepted = evaluated;
                    let used = utilization(accepted.validation.total_cost, request.budget());

                    if used < LOW_UTILIZATION_PERCENT && !optimization_used && !is_last {
                        optimization_used = true;
                        info!(
                            target: "planner::generate",
                            attempt,
                            utilization = used,
                            "budget underused, requesting an upgraded itinerary"
                        );
                        let optimized_prompt = format!(
                            "{base_prompt}{}",
                            optimization_notice(request, accepted.validation.total_cost, used)
                        );
                        model_calls += 1;
                        match self.attempt(request, &optimized_prompt, false).await {
                            AttemptOutcome::WithinBudget(optimized) => {
                                info!(
                                    target: "planner::generate",
                                    total_cost = optimized.validation.total_cost,
                                    "using upgraded itinerary"
                                );
                                accepted = optimized;
                            }
                            AttemptOutcome::OverBudget(optimized) => {
                                info!(
                                    target: "planner::generate",
                                    total_cost = optimized.validation.total_cost,
                                    "upgraded itinerary over budget, keeping original"
                                );
                            }
                            AttemptOutcome::Rejected(err) => {
                                warn!(
                                    target: "planner::generate",
                                    error = %err,
                                    "upgrade attempt failed, keeping original"
                                );
                            }
                        }
                    }

                    self.cache
                        .set(key, accepted.document.clone(), self.cache_ttl);
                    return Ok(finish(accepted, model_calls));
                }
            }
        }

        Err(PlannerError::Unknown(
            "generation ended without an outcome".to_string(),
        ))
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        prompt: &str,
        reject_truncated: bool,
    ) -> AttemptOutcome {
        match self.evaluate(request, prompt, reject_truncated).await {
            Ok(evaluated) if evaluated.validation.is_valid => {
                AttemptOutcome::WithinBudget(evaluated)
            }
            Ok(evaluated) => AttemptOutcome::OverBudget(evaluated),
            Err(err) => AttemptOutcome::Rejected(err),
        }
    }

    async fn evaluate(
        &self,
        request: &GenerationRequest,
        prompt: &str,
        reject_truncated: bool,
    ) -> Result<Evaluated> {
        let response = timeout(self.timeout, self.model.complete(prompt, &self.params))
            .await
            .map_err(|_| {
                PlannerError::Timeout(format!(
                    "model call exceeded {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let usage = response
            .usage
            .unwrap_or_else(|| TokenUsage::estimate(prompt));
        self.usage.record_usage(&usage);

        // Only a first attempt with retries left fails fast on a truncated reply
        if reject_truncated && looks_truncated(&response.text) {
            return Err(PlannerError::Truncated {
                length: response.text.len(),
            });
        }

        let mut document = self.parser.parse(&response.text)?;
        let validation = self.validator.validate(&document, request.budget());
        document.budget_status = validation.status();
        Ok(Evaluated {
            document,
            validation,
        })
    }
}

fn finish(evaluated: Evaluated, model_calls: usize) -> Generation {
    Generation {
        status: evaluated.validation.status(),
        document: evaluated.document,
        validation: Some(evaluated.validation),
        model_calls,
        from_cache: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::ModelResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedModel {
        text: String,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CompletionModel for FixedModel {
        async fn complete(&self, _prompt: &str, _params: &GenerationParams) -> Result<ModelResponse> {
            *self.calls.lock().unwrap() += 1;
            Ok(ModelResponse::new(self.text.clone()))
        }
    }

    fn document_json(total: f64) -> String {
        json!({
            "destination": "Lisbon, Portugal",
            "duration": 2,
            "itinerary": [],
            "budget_breakdown": {
                "accommodation_total": total,
                "transportation_total": 0,
                "activities_total": 0,
                "food_total": 0,
                "miscellaneous": 0
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_estimated_usage_is_recorded() {
        let model = Arc::new(FixedModel {
            text: document_json(900.0),
            calls: Mutex::new(0),
        });
        let planner = ItineraryPlanner::new(model.clone());
        let request = GenerationRequest::new("Lisbon, Portugal", 2, 1000.0, ["food"]).unwrap();

        let generation = planner.generate(&request, None, 0).await.unwrap();

        assert_eq!(generation.status, BudgetStatus::WithinBudget);
        assert_eq!(generation.model_calls, 1);
        let stats = planner.usage().stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.estimated_requests, 1);
    }

    #[tokio::test]
    async fn test_over_budget_result_is_not_cached() {
        let model = Arc::new(FixedModel {
            text: document_json(2000.0),
            calls: Mutex::new(0),
        });
        let planner = ItineraryPlanner::new(model.clone());
        let request = GenerationRequest::new("Lisbon, Portugal", 2, 1000.0, ["food"]).unwrap();

        let generation = planner.generate(&request, None, 0).await.unwrap();
        assert_eq!(generation.status, BudgetStatus::OverBudget);
        assert_eq!(generation.document.budget_status, BudgetStatus::OverBudget);
        assert!(planner.cache().is_empty());
    }
}
