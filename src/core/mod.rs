pub mod budget;
pub mod cache;
pub mod parse_debug;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod repair;
pub mod service;
pub mod usage;

pub use budget::{BudgetSummary, BudgetValidation, BudgetValidator};
pub use cache::{CacheStats, ResponseCache};
pub use parse_debug::{FileDebugSink, ParseDebugSink, TracingDebugSink};
pub use parser::ResponseParser;
pub use planner::{Generation, ItineraryPlanner};
pub use prompt::PromptTemplate;
pub use service::{ServiceCacheStats, TravelService, TripPlan};
pub use usage::{UsageStats, UsageTracker};
