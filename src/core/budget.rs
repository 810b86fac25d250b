//! Cost breakdown and budget conformance for generated itineraries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{BudgetBreakdown, BudgetStatus, GeneratedDocument};

pub const DEFAULT_TOLERANCE_PERCENT: f64 = 5.0;
/// Share of the itemised subtotal added for unexpected costs.
pub const MISCELLANEOUS_RATE: f64 = 0.10;
/// Relative gap between stated total and provided breakdown worth logging.
const STATED_TOTAL_DRIFT: f64 = 0.01;

/// Where a breakdown came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    Provided,
    Itemized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetValidation {
    pub is_valid: bool,
    /// Always equal to `breakdown.total()`
    pub total_cost: f64,
    pub breakdown: BudgetBreakdown,
    pub source: BreakdownSource,
}

impl BudgetValidation {
    pub fn status(&self) -> BudgetStatus {
        BudgetStatus::from_validity(self.is_valid)
    }
}

/// Reporting view over a [`BudgetValidation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub is_within_budget: bool,
    pub budget: f64,
    pub estimated_total_cost: f64,
    pub remaining_budget: f64,
    pub percentage_used: f64,
    pub breakdown: BudgetBreakdown,
    pub breakdown_source: BreakdownSource,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetValidator {
    tolerance_percent: f64,
}

impl Default for BudgetValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_PERCENT)
    }
}

impl BudgetValidator {
    pub fn new(tolerance_percent: f64) -> Self {
        Self {
            tolerance_percent: tolerance_percent.max(0.0),
        }
    }

    pub fn tolerance_percent(&self) -> f64 {
        self.tolerance_percent
    }

    /// Highest total still accepted for `budget`.
    pub fn max_allowed(&self, budget: f64) -> f64 {
        budget + budget * self.tolerance_percent / 100.0
    }

    pub fn validate(&self, document: &GeneratedDocument, budget: f64) -> BudgetValidation {
        let (breakdown, source) = match document.budget_breakdown {
            Some(provided) => {
                check_stated_total(document, &provided);
                (provided, BreakdownSource::Provided)
            }
            None => (itemized_breakdown(document), BreakdownSource::Itemized),
        };

        let total_cost = breakdown.total();
        BudgetValidation {
            is_valid: total_cost <= self.max_allowed(budget),
            total_cost,
            breakdown,
            source,
        }
    }

    pub fn summary(&self, document: &GeneratedDocument, budget: f64) -> BudgetSummary {
        let validation = self.validate(document, budget);
        summarize(&validation, budget)
    }
}

pub fn summarize(validation: &BudgetValidation, budget: f64) -> BudgetSummary {
    BudgetSummary {
        is_within_budget: validation.is_valid,
        budget,
        estimated_total_cost: validation.total_cost,
        remaining_budget: budget - validation.total_cost,
        percentage_used: round2(utilization(validation.total_cost, budget)),
        breakdown: validation.breakdown,
        breakdown_source: validation.source,
        status: validation.status(),
    }
}

/// Total cost as a percentage of budget; zero when there is no budget.
pub fn utilization(total_cost: f64, budget: f64) -> f64 {
    if budget > 0.0 {
        total_cost / budget * 100.0
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive a breakdown from the itemised costs of the document.
pub fn itemized_breakdown(document: &GeneratedDocument) -> BudgetBreakdown {
    let days = document.duration as f64;

    let activities_total: f64 = document
        .itinerary
        .iter()
        .flat_map(|day| &day.activities)
        .map(|activity| activity.estimated_cost)
        .sum();
    let food_total: f64 = document
        .itinerary
        .iter()
        .flat_map(|day| &day.food_recommendations)
        .map(|food| food.estimated_cost)
        .sum();

    let accommodations = &document.accommodation_suggestions;
    let accommodation_total = if accommodations.is_empty() {
        0.0
    } else {
        let nightly: f64 = accommodations.iter().map(|acc| acc.price_per_night).sum();
        nightly / accommodations.len() as f64 * days
    };

    let transport = &document.transportation;
    let to_destination: f64 = transport
        .to_destination
        .iter()
        .map(|leg| leg.estimated_cost)
        .sum();
    let local_daily: f64 = transport
        .local_transport
        .iter()
        .map(|option| option.estimated_daily_cost.unwrap_or(option.estimated_cost))
        .sum();
    let transportation_total = to_destination + local_daily * days;

    let subtotal = accommodation_total + transportation_total + activities_total + food_total;
    BudgetBreakdown {
        accommodation_total,
        transportation_total,
        activities_total,
        food_total,
        miscellaneous: subtotal * MISCELLANEOUS_RATE,
    }
}

fn check_stated_total(document: &GeneratedDocument, provided: &BudgetBreakdown) {
    let Some(stated) = document.estimated_total_cost else {
        return;
    };
    let sum = provided.total();
    if stated > 0.0 && ((sum - stated) / stated).abs() > STATED_TOTAL_DRIFT {
        warn!(
            target: "planner::budget",
            stated_total = stated,
            breakdown_total = sum,
            "provided breakdown disagrees with the stated total; using the breakdown"
        );
    }
}
