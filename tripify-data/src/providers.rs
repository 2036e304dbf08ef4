//! Third-party data providers: weather, flights, hotels, destination images,
//! exchange rates and destination info. Every read goes through the tiered
//! cache; a provider without a configured API key (or whose upstream call
//! fails) answers with its mock payload instead, so the surface stays up
//! while the real integrations are wired in one by one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use tripify_store::app_config::ExternalApis;
use tripify_store::TieredCache;

use crate::metrics::DataMetrics;

// Cache TTLs per resource type, in seconds.
pub const FLIGHTS_TTL: u64 = 300;
pub const HOTELS_TTL: u64 = 300;
pub const WEATHER_TTL: u64 = 1800;
pub const IMAGES_TTL: u64 = 3600;
pub const EXCHANGE_TTL: u64 = 3600;
pub const DESTINATION_TTL: u64 = 86400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: String,
    pub airline: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub price: Money,
    pub stops: u32,
    pub aircraft: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub city: String,
    pub address: String,
    pub rating: f64,
    pub review_count: u32,
    pub price_per_night: Money,
    pub amenities: Vec<String>,
    pub image_url: String,
    pub cancellation_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u32,
    pub pressure: u32,
    pub weather_condition: String,
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: u32,
    pub visibility: u32,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationImage {
    pub id: String,
    pub url: String,
    pub thumbnail: String,
    pub alt_description: String,
    pub photographer: String,
    pub photographer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base_currency: String,
    pub rates: std::collections::HashMap<String, f64>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationInfo {
    pub name: String,
    pub country: String,
    pub description: String,
    pub best_time_to_visit: String,
    pub time_zone: String,
    pub language: String,
    pub currency: String,
    pub population: u64,
    pub attractions: Vec<String>,
    pub activities: Vec<String>,
    pub transportation: Vec<String>,
}

pub struct Providers {
    http: reqwest::Client,
    keys: ExternalApis,
    cache: Arc<TieredCache>,
    metrics: Arc<DataMetrics>,
}

impl Providers {
    pub fn new(keys: ExternalApis, cache: Arc<TieredCache>, metrics: Arc<DataMetrics>) -> Self {
        Self {
            http: reqwest::Client::new(),
            keys,
            cache,
            metrics,
        }
    }

    /// Cache-aside wrapper that also keeps the hit/fetch counters honest.
    async fn cached<T, F, Fut>(&self, key: &str, ttl: u64, fetch: F) -> Result<T>
    where
        T: Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.metrics.data_requests_total.inc();
        let fetched = AtomicBool::new(false);

        let value = self
            .cache
            .get_or_compute(key, Duration::from_secs(ttl), || async {
                fetched.store(true, Ordering::SeqCst);
                let payload = fetch().await?;
                Ok(serde_json::to_value(payload)?)
            })
            .await?;

        if !fetched.load(Ordering::SeqCst) {
            self.metrics.cache_hits_total.inc();
        }

        Ok(serde_json::from_value(value)?)
    }

    pub async fn weather(&self, city: &str, country_code: &str) -> Result<Weather> {
        let key = format!("weather:{}:{}", city, country_code);
        let city = city.to_string();
        let country = country_code.to_string();
        self.cached(&key, WEATHER_TTL, || async move {
            match &self.keys.weather_api_key {
                Some(api_key) => match self.fetch_weather(&city, &country, api_key).await {
                    Ok(weather) => Ok(weather),
                    Err(err) => {
                        warn!(%city, error = %err, "weather API error, using mock data");
                        Ok(mock_weather(&city, &country))
                    }
                },
                None => Ok(mock_weather(&city, &country)),
            }
        })
        .await
    }

    async fn fetch_weather(&self, city: &str, country: &str, api_key: &str) -> Result<Weather> {
        self.metrics.external_api_calls_total.inc();
        let resp: Value = self
            .http
            .get("https://api.openweathermap.org/data/2.5/weather")
            .query(&[
                ("q", format!("{},{}", city, country)),
                ("appid", api_key.to_string()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Weather {
            city: resp["name"].as_str().unwrap_or(city).to_string(),
            country: resp["sys"]["country"].as_str().unwrap_or(country).to_string(),
            temperature: resp["main"]["temp"].as_f64().unwrap_or_default(),
            feels_like: resp["main"]["feels_like"].as_f64().unwrap_or_default(),
            humidity: resp["main"]["humidity"].as_u64().unwrap_or_default() as u32,
            pressure: resp["main"]["pressure"].as_u64().unwrap_or_default() as u32,
            weather_condition: resp["weather"][0]["main"].as_str().unwrap_or_default().to_string(),
            description: resp["weather"][0]["description"].as_str().unwrap_or_default().to_string(),
            wind_speed: resp["wind"]["speed"].as_f64().unwrap_or_default(),
            wind_direction: resp["wind"]["deg"].as_u64().unwrap_or_default() as u32,
            visibility: resp["visibility"].as_u64().unwrap_or(10000) as u32,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    pub async fn flights(
        &self,
        origin: &str,
        destination: &str,
        departure_date: &str,
        return_date: &str,
        adults: u32,
    ) -> Result<Vec<Flight>> {
        let key = format!(
            "flights:{}:{}:{}:{}:{}",
            origin, destination, departure_date, return_date, adults
        );
        let origin = origin.to_string();
        let destination = destination.to_string();
        self.cached(&key, FLIGHTS_TTL, || async move {
            // TODO: replace the mock with the Amadeus flight-offers call once
            // the account is provisioned; the key is already in config.
            Ok(mock_flights(&origin, &destination))
        })
        .await
    }

    pub async fn hotels(
        &self,
        city: &str,
        check_in: &str,
        check_out: &str,
        guests: u32,
        rooms: u32,
    ) -> Result<Vec<Hotel>> {
        let key = format!("hotels:{}:{}:{}:{}:{}", city, check_in, check_out, guests, rooms);
        let city = city.to_string();
        self.cached(&key, HOTELS_TTL, || async move { Ok(mock_hotels(&city)) })
            .await
    }

    pub async fn images(&self, destination: &str, count: u32) -> Result<Vec<DestinationImage>> {
        let count = if count == 0 { 5 } else { count };
        let key = format!("images:{}:{}", destination, count);
        let destination = destination.to_string();
        self.cached(&key, IMAGES_TTL, || async move {
            match &self.keys.unsplash_api_key {
                Some(api_key) => match self.fetch_images(&destination, count, api_key).await {
                    Ok(images) => Ok(images),
                    Err(err) => {
                        warn!(%destination, error = %err, "image API error, using mock data");
                        Ok(mock_images(&destination, count))
                    }
                },
                None => Ok(mock_images(&destination, count)),
            }
        })
        .await
    }

    async fn fetch_images(
        &self,
        destination: &str,
        count: u32,
        api_key: &str,
    ) -> Result<Vec<DestinationImage>> {
        self.metrics.external_api_calls_total.inc();
        let resp: Value = self
            .http
            .get("https://api.unsplash.com/search/photos")
            .query(&[
                ("query", destination.to_string()),
                ("per_page", count.to_string()),
                ("orientation", "landscape".to_string()),
            ])
            .header("Authorization", format!("Client-ID {}", api_key))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let images = resp["results"]
            .as_array()
            .map(|photos| {
                photos
                    .iter()
                    .map(|photo| DestinationImage {
                        id: photo["id"].as_str().unwrap_or_default().to_string(),
                        url: photo["urls"]["regular"].as_str().unwrap_or_default().to_string(),
                        thumbnail: photo["urls"]["thumb"].as_str().unwrap_or_default().to_string(),
                        alt_description: photo["alt_description"]
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("{} photo", destination)),
                        photographer: photo["user"]["name"].as_str().unwrap_or_default().to_string(),
                        photographer_url: photo["user"]["links"]["html"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(images)
    }

    pub async fn exchange_rates(&self, base: &str, targets: &[String]) -> Result<ExchangeRates> {
        let key = format!("exchange:{}:{}", base, targets.join(","));
        let base = base.to_string();
        let targets = targets.to_vec();
        self.cached(&key, EXCHANGE_TTL, || async move {
            Ok(mock_exchange_rates(&base, &targets))
        })
        .await
    }

    pub async fn destination_info(&self, destination: &str) -> Result<DestinationInfo> {
        let key = format!("destination:{}", destination);
        let destination = destination.to_string();
        self.cached(&key, DESTINATION_TTL, || async move {
            Ok(mock_destination_info(&destination))
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Mock payloads
// ---------------------------------------------------------------------------

fn mock_flights(origin: &str, destination: &str) -> Vec<Flight> {
    let mut rng = rand::thread_rng();
    vec![
        Flight {
            id: "FL001".to_string(),
            airline: "Emirates".to_string(),
            flight_number: "EK203".to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: "2024-02-15T08:00:00Z".to_string(),
            arrival_time: "2024-02-15T16:30:00Z".to_string(),
            duration: "8h 30m".to_string(),
            price: Money {
                amount: rng.gen_range(200.0..700.0f64).round(),
                currency: "USD".to_string(),
            },
            stops: 0,
            aircraft: "Boeing 777".to_string(),
        },
        Flight {
            id: "FL002".to_string(),
            airline: "Lufthansa".to_string(),
            flight_number: "LH441".to_string(),
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_time: "2024-02-15T14:20:00Z".to_string(),
            arrival_time: "2024-02-15T22:45:00Z".to_string(),
            duration: "8h 25m".to_string(),
            price: Money {
                amount: rng.gen_range(250.0..750.0f64).round(),
                currency: "USD".to_string(),
            },
            stops: 1,
            aircraft: "Airbus A330".to_string(),
        },
    ]
}

fn mock_hotels(city: &str) -> Vec<Hotel> {
    vec![
        Hotel {
            id: "HT001".to_string(),
            name: "Grand Luxury Hotel".to_string(),
            city: city.to_string(),
            address: "123 Main Street, Downtown".to_string(),
            rating: 4.8,
            review_count: 1250,
            price_per_night: Money { amount: 280.0, currency: "USD".to_string() },
            amenities: ["WiFi", "Pool", "Gym", "Spa", "Restaurant"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            image_url: "https://images.unsplash.com/photo-1566073771259-6a8506099945".to_string(),
            cancellation_policy: "Free cancellation until 24 hours before check-in".to_string(),
        },
        Hotel {
            id: "HT002".to_string(),
            name: "Boutique City Hotel".to_string(),
            city: city.to_string(),
            address: "456 Central Avenue".to_string(),
            rating: 4.5,
            review_count: 890,
            price_per_night: Money { amount: 180.0, currency: "USD".to_string() },
            amenities: ["WiFi", "Restaurant", "Bar", "Business Center"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            image_url: "https://images.unsplash.com/photo-1551882547-ff40c63fe5fa".to_string(),
            cancellation_policy: "Free cancellation until 48 hours before check-in".to_string(),
        },
    ]
}

fn mock_weather(city: &str, country_code: &str) -> Weather {
    let mut rng = rand::thread_rng();
    Weather {
        city: city.to_string(),
        country: country_code.to_string(),
        temperature: rng.gen_range(5..35) as f64,
        feels_like: rng.gen_range(5..35) as f64,
        humidity: rng.gen_range(40..80),
        pressure: rng.gen_range(1000..1050),
        weather_condition: "Clear".to_string(),
        description: "clear sky".to_string(),
        wind_speed: rng.gen_range(2..12) as f64,
        wind_direction: rng.gen_range(0..360),
        visibility: 10000,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn mock_images(destination: &str, count: u32) -> Vec<DestinationImage> {
    (0..count)
        .map(|i| DestinationImage {
            id: format!("img_{}", i + 1),
            url: format!("https://images.unsplash.com/photo-{}?w=800&h=600", 1_500_000_000_000u64 + i as u64),
            thumbnail: format!("https://images.unsplash.com/photo-{}?w=300&h=200", 1_500_000_000_000u64 + i as u64),
            alt_description: format!("Beautiful {} photo {}", destination, i + 1),
            photographer: format!("Photographer {}", i + 1),
            photographer_url: format!("https://unsplash.com/@photographer{}", i + 1),
        })
        .collect()
}

fn mock_exchange_rates(base: &str, targets: &[String]) -> ExchangeRates {
    let mut rng = rand::thread_rng();
    let rates = targets
        .iter()
        .map(|currency| (currency.clone(), rng.gen_range(0.5..2.5f64)))
        .collect();
    ExchangeRates {
        base_currency: base.to_string(),
        rates,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn mock_destination_info(destination: &str) -> DestinationInfo {
    DestinationInfo {
        name: destination.to_string(),
        country: "Demo Country".to_string(),
        description: format!(
            "{} is a beautiful destination with rich culture and stunning landscapes.",
            destination
        ),
        best_time_to_visit: "April to October".to_string(),
        time_zone: "UTC+1".to_string(),
        language: "English".to_string(),
        currency: "USD".to_string(),
        population: 1_500_000,
        attractions: vec![
            format!("{} Old Town", destination),
            format!("{} Museum", destination),
            format!("{} Cathedral", destination),
            format!("{} Park", destination),
        ],
        activities: ["Sightseeing", "Museums", "Walking Tours", "Food Tours", "Shopping"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        transportation: ["Metro", "Bus", "Taxi", "Walking", "Bicycle"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DataMetrics;

    fn providers() -> Providers {
        Providers::new(
            ExternalApis::default(),
            Arc::new(TieredCache::new(None)),
            Arc::new(DataMetrics::new().expect("metrics")),
        )
    }

    #[tokio::test]
    async fn weather_falls_back_to_mock_without_a_key() {
        let p = providers();
        let weather = p.weather("Paris", "FR").await.unwrap();
        assert_eq!(weather.city, "Paris");
        assert_eq!(weather.country, "FR");
        assert!(weather.temperature >= 5.0 && weather.temperature < 35.0);
    }

    #[tokio::test]
    async fn repeated_reads_within_ttl_hit_the_cache() {
        let p = providers();
        let first = p.destination_info("Lisbon").await.unwrap();
        let second = p.destination_info("Lisbon").await.unwrap();
        // Identical payloads prove the second read came from cache, because
        // a re-fetch is the only thing that could change the value.
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
        assert_eq!(p.metrics.cache_hits_total.get(), 1);
        assert_eq!(p.metrics.data_requests_total.get(), 2);
    }

    #[tokio::test]
    async fn exchange_rates_cover_all_targets() {
        let p = providers();
        let targets = vec!["EUR".to_string(), "GBP".to_string(), "JPY".to_string()];
        let rates = p.exchange_rates("USD", &targets).await.unwrap();
        assert_eq!(rates.base_currency, "USD");
        for t in &targets {
            assert!(rates.rates.contains_key(t));
        }
    }

    #[tokio::test]
    async fn image_count_defaults_to_five() {
        let p = providers();
        let images = p.images("Rome", 0).await.unwrap();
        assert_eq!(images.len(), 5);
    }
}
