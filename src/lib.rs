//! trip-planner-rs: budget-constrained travel itinerary generation on top of LLM chat completions
//!
//! A [`TravelService`] fetches an optional weather forecast, prompts a
//! [`CompletionModel`] for a JSON itinerary, recovers the document from the
//! raw text, checks it against the traveller's budget and retries when the
//! plan is broken, over budget or leaves most of the budget unused. Accepted
//! plans are cached for a day.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trip_planner_rs::{GenerationRequest, PlannerConfig, TravelService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlannerConfig::from_env()?;
//!     let service = TravelService::from_config(&config)?;
//!
//!     let request = GenerationRequest::new("Lisbon, Portugal", 4, 1500.0, ["food", "history"])?;
//!     let plan = service.plan(&request).await?;
//!     println!("{} ({})", plan.document.destination, plan.status);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod types;

pub use config::PlannerConfig;
pub use core::{
    BudgetSummary, BudgetValidator, Generation, ItineraryPlanner, PromptTemplate, ResponseCache,
    ResponseParser, TravelService, TripPlan, UsageTracker,
};
pub use error::{ParseError, PlannerError, Result};
pub use services::{CompletionModel, GenerationParams, ModelResponse, OpenAIClient, WeatherService};
pub use types::{BudgetStatus, GeneratedDocument, GenerationRequest, TokenUsage};

#[cfg(feature = "cli")]
pub mod cli;
