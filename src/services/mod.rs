pub mod model;
pub mod openai_client;
pub mod weather;

pub use model::{CompletionModel, GenerationParams, ModelResponse};
pub use openai_client::OpenAIClient;
pub use weather::{DailyForecast, WeatherCache, WeatherCacheValue, WeatherContext, WeatherService};
