use crate::{
    config::{PlannerConfig, ENV_API_KEY},
    core::{BudgetValidator, ResponseParser, TravelService},
    types::{GeneratedDocument, GenerationRequest},
};
use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// CLI entry point for the trip-planner tool
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();
    match matches.subcommand() {
        Some(("plan", sub)) => plan(sub).await,
        Some(("validate", sub)) => validate(sub),
        _ => bail!("unknown subcommand"),
    }
}

fn command() -> Command {
    Command::new("trip-planner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Budget-aware travel itinerary generation with OpenRouter")
        .subcommand_required(true)
        .subcommand(
            Command::new("plan")
                .about("Generate an itinerary")
                .arg(
                    Arg::new("destination")
                        .help("Destination, e.g. \"Tokyo, Japan\"")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("days")
                        .short('d')
                        .long("days")
                        .value_name("DAYS")
                        .help("Trip length in days")
                        .required(true),
                )
                .arg(
                    Arg::new("budget")
                        .short('b')
                        .long("budget")
                        .value_name("AMOUNT")
                        .help("Total budget")
                        .required(true),
                )
                .arg(
                    Arg::new("currency")
                        .short('c')
                        .long("currency")
                        .value_name("CODE")
                        .help("Currency code")
                        .default_value("USD"),
                )
                .arg(
                    Arg::new("interests")
                        .short('i')
                        .long("interests")
                        .value_name("LIST")
                        .help("Comma-separated interests")
                        .required(true),
                )
                .arg(
                    Arg::new("no-weather")
                        .long("no-weather")
                        .help("Skip the weather forecast")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("max-retries")
                        .short('r')
                        .long("max-retries")
                        .value_name("COUNT")
                        .help("Regeneration attempts after the first (or set PLANNER_MAX_RETRIES)"),
                )
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .value_name("MODEL")
                        .help("The OpenRouter model to use (or set PLANNER_MODEL)"),
                )
                .arg(
                    Arg::new("api-key")
                        .short('k')
                        .long("api-key")
                        .value_name("KEY")
                        .help("OpenRouter API key (or set OPENAI_API_KEY env var)"),
                )
                .arg(
                    Arg::new("base-url")
                        .short('u')
                        .long("base-url")
                        .value_name("URL")
                        .help(
                            "OpenRouter base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL env vars)",
                        ),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("SECONDS")
                        .help("Model call timeout in seconds (or set PLANNER_TIMEOUT_SECS)"),
                )
                .arg(
                    Arg::new("prompt-template")
                        .long("prompt-template")
                        .value_name("FILE")
                        .help("Prompt template file (or set PLANNER_PROMPT_TEMPLATE)"),
                )
                .arg(
                    Arg::new("debug-dir")
                        .long("debug-dir")
                        .value_name("DIR")
                        .help("Write unparseable responses here (or set PLANNER_DEBUG_DIR)"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check an itinerary JSON file against a budget")
                .arg(
                    Arg::new("file")
                        .help("Itinerary JSON file")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("budget")
                        .short('b')
                        .long("budget")
                        .value_name("AMOUNT")
                        .help("Total budget")
                        .required(true),
                )
                .arg(
                    Arg::new("tolerance")
                        .long("tolerance")
                        .value_name("PERCENT")
                        .help("Allowed overshoot in percent")
                        .default_value("5"),
                ),
        )
}

async fn plan(matches: &ArgMatches) -> anyhow::Result<()> {
    let api_key = matches.get_one::<String>("api-key").cloned();
    let mut config = PlannerConfig::from_lookup(|name| {
        if name == ENV_API_KEY {
            if let Some(key) = &api_key {
                return Some(key.clone());
            }
        }
        env::var(name).ok()
    })
    .context("OpenRouter API key is required. Set OPENAI_API_KEY environment variable or use --api-key")?;

    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.base_url = base_url.clone();
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.model = model.clone();
    }
    if let Some(retries) = matches.get_one::<String>("max-retries") {
        config.max_retries = retries.parse().context("--max-retries must be a number")?;
    }
    if let Some(timeout) = matches.get_one::<String>("timeout") {
        let secs: u64 = timeout.parse().context("--timeout must be a number of seconds")?;
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(template) = matches.get_one::<String>("prompt-template") {
        config.prompt_template = Some(PathBuf::from(template));
    }
    if let Some(dir) = matches.get_one::<String>("debug-dir") {
        config.debug_dir = Some(PathBuf::from(dir));
    }

    let request = build_request(matches)?;
    let service = TravelService::from_config(&config)?;

    info!(
        destination = request.destination(),
        days = request.duration_days(),
        budget = request.budget(),
        model = %config.model,
        "Planning trip"
    );

    match service.plan(&request).await {
        Ok(plan) => {
            let output = json!({
                "plan": plan,
                "cache_stats": service.cache_stats(),
                "token_stats": service.token_stats(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            info!(status = %plan.status, "Planning completed");
            Ok(())
        }
        Err(e) => {
            error!("Planning failed: {}", e);
            println!("{}", serde_json::to_string_pretty(&e.to_error_payload())?);
            Err(e.into())
        }
    }
}

fn build_request(matches: &ArgMatches) -> anyhow::Result<GenerationRequest> {
    let destination = required(matches, "destination")?;
    let days: u32 = required(matches, "days")?
        .parse()
        .context("--days must be a whole number")?;
    let budget: f64 = required(matches, "budget")?
        .parse()
        .context("--budget must be a number")?;
    let interests = required(matches, "interests")?.split(',');

    let mut request = GenerationRequest::new(destination, days, budget, interests)?
        .with_weather_aware(!matches.get_flag("no-weather"));
    if let Some(currency) = matches.get_one::<String>("currency") {
        request = request.with_currency(currency.as_str());
    }
    Ok(request)
}

fn validate(matches: &ArgMatches) -> anyhow::Result<()> {
    let path = PathBuf::from(required(matches, "file")?);
    let budget: f64 = required(matches, "budget")?
        .parse()
        .context("--budget must be a number")?;
    let tolerance: f64 = required(matches, "tolerance")?
        .parse()
        .context("--tolerance must be a number")?;

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let value = ResponseParser::new().parse_value(&raw)?;
    let document = GeneratedDocument::from_value(&value, &raw)?;

    let summary = BudgetValidator::new(tolerance).summary(&document, budget);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing --{id}"))
}
