//! gRPC surface of the data service, mirroring the REST routes.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use tripify_proto::v1::data_service_server::DataService;
use tripify_proto::v1::{
    DestinationImage, DestinationInfoRequest, DestinationInfoResponse, ExchangeRatesRequest,
    ExchangeRatesResponse, Flight, FlightsRequest, FlightsResponse, Hotel, HotelsRequest,
    HotelsResponse, ImagesRequest, ImagesResponse, Money, WeatherRequest, WeatherResponse,
};

use crate::metrics::DataMetrics;
use crate::providers::{self, Providers};

pub struct DataGrpc {
    providers: Arc<Providers>,
    metrics: Arc<DataMetrics>,
}

impl DataGrpc {
    pub fn new(providers: Arc<Providers>, metrics: Arc<DataMetrics>) -> Self {
        Self { providers, metrics }
    }

    fn record(&self, method: &str, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        self.metrics
            .grpc_requests_total
            .with_label_values(&[method, status])
            .inc();
    }
}

fn internal(err: anyhow::Error) -> Status {
    tracing::error!(error = %err, "data provider failed");
    Status::internal(err.to_string())
}

impl From<providers::Money> for Money {
    fn from(m: providers::Money) -> Self {
        Self {
            amount: m.amount,
            currency: m.currency,
        }
    }
}

impl From<providers::Flight> for Flight {
    fn from(f: providers::Flight) -> Self {
        Self {
            id: f.id,
            airline: f.airline,
            flight_number: f.flight_number,
            origin: f.origin,
            destination: f.destination,
            departure_time: f.departure_time,
            arrival_time: f.arrival_time,
            duration: f.duration,
            price: Some(f.price.into()),
            stops: f.stops,
            aircraft: f.aircraft,
        }
    }
}

impl From<providers::Hotel> for Hotel {
    fn from(h: providers::Hotel) -> Self {
        Self {
            id: h.id,
            name: h.name,
            city: h.city,
            address: h.address,
            rating: h.rating,
            review_count: h.review_count,
            price_per_night: Some(h.price_per_night.into()),
            amenities: h.amenities,
            image_url: h.image_url,
            cancellation_policy: h.cancellation_policy,
        }
    }
}

impl From<providers::DestinationImage> for DestinationImage {
    fn from(i: providers::DestinationImage) -> Self {
        Self {
            id: i.id,
            url: i.url,
            thumbnail: i.thumbnail,
            alt_description: i.alt_description,
            photographer: i.photographer,
            photographer_url: i.photographer_url,
        }
    }
}

#[tonic::async_trait]
impl DataService for DataGrpc {
    async fn get_flights(
        &self,
        request: Request<FlightsRequest>,
    ) -> Result<Response<FlightsResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .providers
            .flights(
                &req.origin,
                &req.destination,
                &req.departure_date,
                &req.return_date,
                req.adults.max(1),
            )
            .await;
        self.record("GetFlights", result.is_ok());
        let flights = result.map_err(internal)?;
        Ok(Response::new(FlightsResponse {
            flights: flights.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_hotels(
        &self,
        request: Request<HotelsRequest>,
    ) -> Result<Response<HotelsResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .providers
            .hotels(
                &req.city,
                &req.check_in,
                &req.check_out,
                req.guests.max(1),
                req.rooms.max(1),
            )
            .await;
        self.record("GetHotels", result.is_ok());
        let hotels = result.map_err(internal)?;
        Ok(Response::new(HotelsResponse {
            hotels: hotels.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_weather(
        &self,
        request: Request<WeatherRequest>,
    ) -> Result<Response<WeatherResponse>, Status> {
        let req = request.into_inner();
        let result = self.providers.weather(&req.city, &req.country_code).await;
        self.record("GetWeather", result.is_ok());
        let w = result.map_err(internal)?;
        Ok(Response::new(WeatherResponse {
            city: w.city,
            country: w.country,
            temperature: w.temperature,
            feels_like: w.feels_like,
            humidity: w.humidity,
            pressure: w.pressure,
            weather_condition: w.weather_condition,
            description: w.description,
            wind_speed: w.wind_speed,
            wind_direction: w.wind_direction,
            visibility: w.visibility,
            timestamp: w.timestamp,
        }))
    }

    async fn get_destination_images(
        &self,
        request: Request<ImagesRequest>,
    ) -> Result<Response<ImagesResponse>, Status> {
        let req = request.into_inner();
        let result = self.providers.images(&req.destination, req.count).await;
        self.record("GetDestinationImages", result.is_ok());
        let images = result.map_err(internal)?;
        Ok(Response::new(ImagesResponse {
            images: images.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_exchange_rates(
        &self,
        request: Request<ExchangeRatesRequest>,
    ) -> Result<Response<ExchangeRatesResponse>, Status> {
        let req = request.into_inner();
        let result = self
            .providers
            .exchange_rates(&req.base_currency, &req.target_currencies)
            .await;
        self.record("GetExchangeRates", result.is_ok());
        let rates = result.map_err(internal)?;
        Ok(Response::new(ExchangeRatesResponse {
            base_currency: rates.base_currency,
            rates: rates.rates.into_iter().collect(),
            timestamp: rates.timestamp,
        }))
    }

    async fn get_destination_info(
        &self,
        request: Request<DestinationInfoRequest>,
    ) -> Result<Response<DestinationInfoResponse>, Status> {
        let req = request.into_inner();
        let result = self.providers.destination_info(&req.destination).await;
        self.record("GetDestinationInfo", result.is_ok());
        let info = result.map_err(internal)?;
        Ok(Response::new(DestinationInfoResponse {
            name: info.name,
            country: info.country,
            description: info.description,
            best_time_to_visit: info.best_time_to_visit,
            time_zone: info.time_zone,
            language: info.language,
            currency: info.currency,
            population: info.population,
            attractions: info.attractions,
            activities: info.activities,
            transportation: info.transportation,
        }))
    }
}
