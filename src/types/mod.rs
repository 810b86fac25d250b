pub mod document;
pub mod request;
pub mod usage;

pub use document::{
    Accommodation, Activity, BudgetBreakdown, BudgetStatus, DayPlan, FoodRecommendation,
    GeneratedDocument, TransportOption, Transportation,
};
pub use request::GenerationRequest;
pub use usage::TokenUsage;
