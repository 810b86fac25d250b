#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use trip_planner_rs::{
    CompletionModel, GenerationParams, GenerationRequest, ModelResponse, PlannerError, Result,
};

/// Model double that replays a fixed script of responses and records prompts.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ModelResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<ModelResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PlannerError::Unknown("script exhausted".to_string())))
    }
}

pub fn ok(text: impl Into<String>) -> Result<ModelResponse> {
    Ok(ModelResponse::new(text))
}

/// Itinerary whose provided breakdown sums to `total`.
pub fn itinerary(total: f64) -> Value {
    json!({
        "destination": "Lisbon, Portugal",
        "duration": 3,
        "estimated_total_cost": total,
        "currency": "USD",
        "itinerary": [
            {
                "day": 1,
                "title": "Alfama and the castle",
                "activities": [
                    {
                        "time": "09:00",
                        "name": "Castelo de Sao Jorge",
                        "description": "Hilltop castle with city views",
                        "estimated_cost": 15,
                        "location": "Alfama"
                    }
                ],
                "food_recommendations": [
                    {
                        "meal_type": "lunch",
                        "restaurant": "Time Out Market",
                        "dish": "Bifana",
                        "estimated_cost": 12
                    }
                ],
                "estimated_day_cost": 27
            }
        ],
        "budget_breakdown": {
            "accommodation_total": total * 0.5,
            "transportation_total": total * 0.2,
            "activities_total": total * 0.1,
            "food_total": total * 0.15,
            "miscellaneous": total * 0.05
        },
        "travel_tips": ["Buy a Viva Viagem card"]
    })
}

pub fn itinerary_text(total: f64) -> String {
    itinerary(total).to_string()
}

pub fn request(budget: f64) -> GenerationRequest {
    GenerationRequest::new("Lisbon, Portugal", 3, budget, ["food", "history"])
        .unwrap()
        .with_weather_aware(false)
}
