use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

pub const MAX_DURATION_DAYS: u32 = 30;
pub const MAX_INTERESTS: usize = 10;
const DESTINATION_LEN: std::ops::RangeInclusive<usize> = 2..=100;

/// Validated input to a generation call.
///
/// Construct through [`GenerationRequest::new`]; the fields are read-only after that.
/// Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RequestFields")]
pub struct GenerationRequest {
    destination: String,
    duration_days: u32,
    budget: f64,
    currency: String,
    interests: Vec<String>,
    weather_aware: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    weather_summary: Option<String>,
}

#[derive(Deserialize)]
struct RequestFields {
    destination: String,
    duration_days: u32,
    budget: f64,
    #[serde(default)]
    currency: Option<String>,
    interests: Vec<String>,
    #[serde(default = "default_weather_aware")]
    weather_aware: bool,
    #[serde(default)]
    weather_summary: Option<String>,
}

fn default_weather_aware() -> bool {
    true
}

impl TryFrom<RequestFields> for GenerationRequest {
    type Error = PlannerError;

    fn try_from(fields: RequestFields) -> Result<Self> {
        let mut request = Self::new(
            fields.destination,
            fields.duration_days,
            fields.budget,
            fields.interests,
        )?
        .with_weather_aware(fields.weather_aware);
        if let Some(currency) = fields.currency {
            request = request.with_currency(currency);
        }
        if let Some(summary) = fields.weather_summary {
            request = request.with_weather_summary(summary);
        }
        Ok(request)
    }
}

impl GenerationRequest {
    pub fn new<I, S>(
        destination: impl Into<String>,
        duration_days: u32,
        budget: f64,
        interests: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let destination = destination.into().trim().to_string();
        let destination_len = destination.chars().count();
        if !DESTINATION_LEN.contains(&destination_len) {
            return Err(PlannerError::InvalidRequest(format!(
                "destination must be between {} and {} characters",
                DESTINATION_LEN.start(),
                DESTINATION_LEN.end()
            )));
        }

        if duration_days == 0 || duration_days > MAX_DURATION_DAYS {
            return Err(PlannerError::InvalidRequest(format!(
                "duration must be between 1 and {} days",
                MAX_DURATION_DAYS
            )));
        }

        if !budget.is_finite() || budget <= 0.0 {
            return Err(PlannerError::InvalidRequest(
                "budget must be a positive amount".to_string(),
            ));
        }

        let interests: Vec<String> = interests
            .into_iter()
            .map(|interest| interest.as_ref().trim().to_string())
            .filter(|interest| !interest.is_empty())
            .collect();
        if interests.is_empty() || interests.len() > MAX_INTERESTS {
            return Err(PlannerError::InvalidRequest(format!(
                "between 1 and {} non-empty interests are required",
                MAX_INTERESTS
            )));
        }

        Ok(Self {
            destination,
            duration_days,
            budget,
            currency: "USD".to_string(),
            interests,
            weather_aware: true,
            weather_summary: None,
        })
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        let currency = currency.into().trim().to_uppercase();
        if !currency.is_empty() {
            self.currency = currency;
        }
        self
    }

    pub fn with_weather_aware(mut self, weather_aware: bool) -> Self {
        self.weather_aware = weather_aware;
        self
    }

    pub fn with_weather_summary(mut self, summary: impl Into<String>) -> Self {
        self.weather_summary = Some(summary.into());
        self
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn duration_days(&self) -> u32 {
        self.duration_days
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    pub fn weather_aware(&self) -> bool {
        self.weather_aware
    }

    pub fn weather_summary(&self) -> Option<&str> {
        self.weather_summary.as_deref()
    }
}
