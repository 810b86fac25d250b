//! Typed itinerary document recovered from model output.
//!
//! Models drift: costs arrive as `"$45"`, optional sections go missing, the
//! status tag is free text. Monetary fields therefore accept a number, a money
//! string (`"$45"`, `"$40-60"` read as its upper bound) or nothing at all (0),
//! while the skeleton (`destination`, `duration`, `itinerary`) stays mandatory.
//! A cost string that cannot be read unambiguously fails the whole document.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

use crate::error::ParseError;

/// Outcome tag of the most recent budget validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    #[default]
    WithinBudget,
    OverBudget,
}

impl BudgetStatus {
    pub fn from_validity(is_valid: bool) -> Self {
        if is_valid {
            BudgetStatus::WithinBudget
        } else {
            BudgetStatus::OverBudget
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::WithinBudget => "within_budget",
            BudgetStatus::OverBudget => "over_budget",
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete generated itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedDocument {
    /// Destination city and country (e.g., "Lisbon, Portugal")
    pub destination: String,
    /// Trip length in days
    #[serde(alias = "duration_days", deserialize_with = "lenient_u32")]
    #[schemars(with = "u32")]
    pub duration: u32,
    /// Model-stated total cost of the trip
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    #[schemars(with = "Option<f64>")]
    pub estimated_total_cost: Option<f64>,
    /// Currency code used for all monetary fields
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Day-by-day plan
    pub itinerary: Vec<DayPlan>,
    /// Lodging options with nightly prices
    #[serde(default)]
    pub accommodation_suggestions: Vec<Accommodation>,
    /// Getting there and getting around
    #[serde(default)]
    pub transportation: Transportation,
    /// Category totals; dropped to `None` unless all five are present and numeric
    #[serde(
        default,
        deserialize_with = "complete_breakdown",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<BudgetBreakdown>")]
    pub budget_breakdown: Option<BudgetBreakdown>,
    /// Practical advice for the traveller
    #[serde(default)]
    pub travel_tips: Vec<String>,
    /// Result of the latest budget validation
    #[serde(default, deserialize_with = "lenient_status")]
    #[schemars(with = "BudgetStatus")]
    pub budget_status: BudgetStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DayPlan {
    /// 1-based day counter
    #[serde(default)]
    pub day: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub food_recommendations: Vec<FoodRecommendation>,
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schemars(with = "f64")]
    pub estimated_day_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schemars(with = "f64")]
    pub estimated_cost: f64,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FoodRecommendation {
    #[serde(default)]
    pub meal_type: String,
    #[serde(default)]
    pub restaurant: String,
    #[serde(default)]
    pub dish: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schemars(with = "f64")]
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Accommodation {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schemars(with = "f64")]
    pub price_per_night: f64,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransportOption {
    #[serde(default)]
    pub mode: String,
    /// One-off cost (to-destination legs)
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schemars(with = "f64")]
    pub estimated_cost: f64,
    /// Per-day cost (local transport)
    #[serde(
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<f64>")]
    pub estimated_daily_cost: Option<f64>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub tips: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transportation {
    #[serde(default)]
    pub to_destination: Vec<TransportOption>,
    #[serde(default)]
    pub local_transport: Vec<TransportOption>,
}

/// Five-category cost split. Always sums to the validated total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetBreakdown {
    pub accommodation_total: f64,
    pub transportation_total: f64,
    pub activities_total: f64,
    pub food_total: f64,
    pub miscellaneous: f64,
}

impl BudgetBreakdown {
    pub const FIELDS: [&'static str; 5] = [
        "accommodation_total",
        "transportation_total",
        "activities_total",
        "food_total",
        "miscellaneous",
    ];

    pub fn total(&self) -> f64 {
        self.accommodation_total
            + self.transportation_total
            + self.activities_total
            + self.food_total
            + self.miscellaneous
    }

    /// Build from a JSON object only when every field is a finite, non-negative number.
    pub fn from_complete_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut amounts = [0.0; 5];
        for (slot, field) in amounts.iter_mut().zip(Self::FIELDS) {
            let amount = object.get(field).and_then(amount_from_value)?;
            if amount < 0.0 {
                return None;
            }
            *slot = amount;
        }

        Some(Self {
            accommodation_total: amounts[0],
            transportation_total: amounts[1],
            activities_total: amounts[2],
            food_total: amounts[3],
            miscellaneous: amounts[4],
        })
    }
}

impl GeneratedDocument {
    /// Decode a parsed JSON value, reporting the failing path on structural errors.
    pub fn from_value(value: &Value, raw: &str) -> Result<Self, ParseError> {
        let encoded = value.to_string();
        let mut deserializer = serde_json::Deserializer::from_str(&encoded);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let location = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            ParseError::new(
                format!("document does not match the itinerary shape at {location}: {err}"),
                raw,
            )
        })
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Interpret a JSON number or a money string such as `"$1,250.50"` or `"$40-60"`.
pub(crate) fn amount_from_value(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => parse_amount(text)?,
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

fn numeric_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d.,]*").expect("numeric token pattern"))
}

/// Read a money string. A range resolves to its upper bound; `"free"` is zero.
/// Comma decimals and any other unclear grouping yield `None`.
fn parse_amount(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("free") {
        return Some(0.0);
    }

    let tokens: Vec<_> = numeric_token().find_iter(text).collect();
    match tokens.as_slice() {
        [single] => {
            let amount = parse_number(single.as_str())?;
            let negative = text[..single.start()].trim_end().ends_with('-');
            Some(if negative { -amount } else { amount })
        }
        [low, high] => {
            let between: String = text[low.end()..high.start()]
                .chars()
                .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
                .collect::<String>()
                .to_lowercase();
            if !RANGE_SEPARATORS.contains(&between.as_str()) {
                return None;
            }
            Some(parse_number(low.as_str())?.max(parse_number(high.as_str())?))
        }
        _ => None,
    }
}

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];
const RANGE_SEPARATORS: [&str; 4] = ["-", "–", "—", "to"];

/// `1,250.50` and `45` are accepted; `1.250,50`, `12,50` and `1.250.000` are not.
fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim_end_matches([',', '.']);
    let (integer, fraction) = match token.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (token, None),
    };
    if fraction.is_some_and(|fraction| fraction.contains(['.', ','])) {
        return None;
    }

    let mut groups = integer.split(',');
    let lead = groups.next()?;
    let grouped = integer.contains(',');
    if lead.is_empty() || (grouped && lead.len() > 3) {
        return None;
    }
    if groups.any(|group| group.len() != 3) {
        return None;
    }

    let digits = integer.replace(',', "");
    match fraction {
        Some(fraction) => format!("{digits}.{fraction}").parse().ok(),
        None => digits.parse().ok(),
    }
}

/// Absent or `null` reads as `None`; anything present must be a readable amount.
fn present_amount<E: serde::de::Error>(value: &Value) -> Result<Option<f64>, E> {
    if value.is_null() {
        return Ok(None);
    }
    amount_from_value(value)
        .map(Some)
        .ok_or_else(|| E::custom(format!("unreadable amount {value}")))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(present_amount::<D::Error>(&value)?.unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    present_amount(&value)
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    amount_from_value(&value)
        .filter(|days| *days >= 0.0 && *days <= u32::MAX as f64)
        .map(|days| days.round() as u32)
        .ok_or_else(|| serde::de::Error::custom(format!("expected a day count, found {value}")))
}

fn complete_breakdown<'de, D>(deserializer: D) -> Result<Option<BudgetBreakdown>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(BudgetBreakdown::from_complete_value(&value))
}

fn lenient_status<'de, D>(deserializer: D) -> Result<BudgetStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str() {
        Some("over_budget") => BudgetStatus::OverBudget,
        _ => BudgetStatus::WithinBudget,
    })
}
