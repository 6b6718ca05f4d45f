use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{config::AppConfig, error::FetchError, prompt::truncate_chars, source::html_to_text};

/// Fetch `url` and return its visible text
///
/// Non-success statuses are errors. `max_chars` truncates the text, which
/// keeps whole pages from crowding out the rest of a prompt.
pub async fn read_url_content(
    client: &Client,
    url: &str,
    max_chars: Option<usize>,
) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "url fetch failed");
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    let text = html_to_text(&body);
    debug!(url, chars = text.len(), "fetched url content");
    Ok(match max_chars {
        Some(max) => truncate_chars(&text, max).to_string(),
        None => text,
    })
}

/// Current conditions, temperatures in °C
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub min_temp: f64,
    pub max_temp: f64,
    pub humidity: f64,
}

#[derive(Deserialize)]
struct OpenWeatherBody {
    main: OpenWeatherMain,
}

#[derive(Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
}

#[inline]
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[inline]
fn kelvin_to_celsius(k: f64) -> f64 {
    round2(k - 273.15)
}

/// City part of inputs like "London, England"
pub fn clean_city(input: &str) -> &str {
    input.split(',').next().unwrap_or_default().trim()
}

impl WeatherReport {
    /// Parse an OpenWeather `weather` response body (Kelvin)
    pub fn from_openweather(city: &str, body: &str) -> Result<Self, FetchError> {
        let parsed: OpenWeatherBody =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let main = parsed.main;
        Ok(Self {
            city: city.to_string(),
            temperature: kelvin_to_celsius(main.temp),
            feels_like: kelvin_to_celsius(main.feels_like),
            min_temp: kelvin_to_celsius(main.temp_min),
            max_temp: kelvin_to_celsius(main.temp_max),
            humidity: round2(main.humidity),
        })
    }
}

/// OpenWeather current-conditions client
#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Client for the configured OpenWeather key and endpoint
    ///
    /// A missing or blank key is an error here, before any request is made.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let api_key = config
            .weather_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(FetchError::MissingApiKey("OpenWeather"))?;
        Ok(Self::new(api_key, config.weather_base_url.as_str()))
    }

    /// Current weather for `city`
    ///
    /// Anything after the first comma is dropped before the lookup.
    pub async fn current(&self, city: &str) -> Result<WeatherReport, FetchError> {
        let city = clean_city(city);
        let response = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(city, status = status.as_u16(), "weather lookup failed");
            return Err(FetchError::Status(status.as_u16()));
        }
        WeatherReport::from_openweather(city, &response.text().await?)
    }
}
