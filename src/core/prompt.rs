//! Prompt construction.
//!
//! Every function here returns a fresh `String`; nothing mutates the loaded
//! template, so concurrent generations never see each other's addenda.

use std::path::Path;
use std::sync::OnceLock;

use crate::error::{PlannerError, Result};
use crate::types::{GeneratedDocument, GenerationRequest};

const BUILTIN_TEMPLATE: &str = include_str!("../../prompts/itinerary_prompt.txt");
const REQUIRED_PLACEHOLDERS: [&str; 4] = ["{destination}", "{duration}", "{budget}", "{interests}"];

/// Spend split requested when a plan leaves too much budget unused.
pub const LODGING_SHARE: f64 = 0.40;
pub const ACTIVITIES_SHARE: f64 = 0.25;
pub const FOOD_SHARE: f64 = 0.20;
pub const TRANSPORT_SHARE: f64 = 0.12;
pub const TARGET_UTILIZATION: (f64, f64) = (85.0, 95.0);

#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: BUILTIN_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let missing: Vec<&str> = REQUIRED_PLACEHOLDERS
            .iter()
            .copied()
            .filter(|placeholder| !text.contains(placeholder))
            .collect();
        if !missing.is_empty() {
            return Err(PlannerError::Config(format!(
                "prompt template is missing placeholders: {}",
                missing.join(", ")
            )));
        }
        Ok(Self { text })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            PlannerError::Config(format!(
                "cannot read prompt template {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::new(text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fill the template for `request`. Missing weather renders as an empty string.
    pub fn render(&self, request: &GenerationRequest, weather_summary: Option<&str>) -> String {
        self.text
            .replace("{destination}", request.destination())
            .replace("{duration}", &request.duration_days().to_string())
            .replace("{budget}", &format_amount(request.budget()))
            .replace("{currency}", request.currency())
            .replace("{interests}", &request.interests().join(", "))
            .replace("{weather_context}", weather_summary.unwrap_or_default())
            .replace("{schema}", document_schema())
    }
}

/// Appended once an attempt has come back over budget.
pub fn over_budget_notice(request: &GenerationRequest) -> String {
    format!(
        "\n\nIMPORTANT: The previous plan went over budget. The total cost of this plan must stay strictly BELOW {} {}.",
        request.currency(),
        format_amount(request.budget())
    )
}

/// Appended for the single low-utilization retry.
pub fn optimization_notice(request: &GenerationRequest, total_cost: f64, utilization: f64) -> String {
    let budget = request.budget();
    let currency = request.currency();
    let (low, high) = TARGET_UTILIZATION;
    format!(
        "\n\nBUDGET OPTIMIZATION: The previous plan only used {utilization:.0}% of the budget \
({currency} {spent} of {currency} {total}). Upgrade the experience so the total lands between \
{low:.0}% and {high:.0}% of the budget, roughly:\n\
- Accommodation: {currency} {lodging}\n\
- Activities: {currency} {activities}\n\
- Food: {currency} {food}\n\
- Transportation: {currency} {transport}\n\
Never exceed {currency} {total}.",
        spent = format_amount(total_cost.round()),
        total = format_amount(budget),
        lodging = format_amount((budget * LODGING_SHARE).round()),
        activities = format_amount((budget * ACTIVITIES_SHARE).round()),
        food = format_amount((budget * FOOD_SHARE).round()),
        transport = format_amount((budget * TRANSPORT_SHARE).round()),
    )
}

/// JSON Schema of [`GeneratedDocument`], rendered once.
pub fn document_schema() -> &'static str {
    static SCHEMA: OnceLock<String> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = schemars::schema_for!(GeneratedDocument);
        serde_json::to_string_pretty(&schema).unwrap_or_default()
    })
}

/// Whole amounts without decimals, everything else with two.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
