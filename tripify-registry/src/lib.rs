//! Thin HTTP client for the service registry (Consul agent/catalog API).
//!
//! Registration failures are never fatal to the owning process: callers use
//! [`RegistryClient::register_with_retry`], which retries a bounded number of
//! times with a fixed backoff and then gives up with a logged warning. A
//! service that cannot register stays reachable directly, it is just not
//! discoverable.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Health check definition attached to a registration. Exactly one of
/// `http`/`grpc` is normally set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthCheck {
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(rename = "GRPC", skip_serializing_if = "Option::is_none")]
    pub grpc: Option<String>,
    #[serde(rename = "Interval")]
    pub interval: String,
    #[serde(rename = "Timeout")]
    pub timeout: String,
}

impl HealthCheck {
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            http: Some(url.into()),
            grpc: None,
            interval: "10s".to_string(),
            timeout: "3s".to_string(),
        }
    }

    pub fn grpc(endpoint: impl Into<String>) -> Self {
        Self {
            http: None,
            grpc: Some(endpoint.into()),
            interval: "10s".to_string(),
            timeout: "5s".to_string(),
        }
    }
}

/// What a service tells the registry about itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<HealthCheck>,
    #[serde(rename = "Meta", default, skip_serializing_if = "HashMap::is_empty")]
    pub meta: HashMap<String, String>,
}

/// One discovered instance of a service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInstance {
    #[serde(rename = "ServiceID", default)]
    pub id: String,
    #[serde(rename = "ServiceName", default)]
    pub name: String,
    #[serde(rename = "ServiceAddress", default)]
    pub service_address: String,
    #[serde(rename = "Address", default)]
    pub node_address: String,
    #[serde(rename = "ServicePort", default)]
    pub port: u16,
    #[serde(rename = "ServiceTags", default)]
    pub tags: Vec<String>,
}

impl ServiceInstance {
    /// Service-level address, falling back to the node address.
    pub fn address(&self) -> &str {
        if self.service_address.is_empty() {
            &self.node_address
        } else {
            &self.service_address
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address(), self.port)
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{}:{}", host, port),
            http: reqwest::Client::new(),
        }
    }

    pub async fn register(&self, service: &ServiceRegistration) -> Result<(), RegistryError> {
        let resp = self
            .http
            .put(format!("{}/v1/agent/service/register", self.base_url))
            .json(service)
            .send()
            .await?;
        Self::ensure_ok(resp).await?;
        info!(service = %service.name, id = %service.id, "registered with service registry");
        Ok(())
    }

    pub async fn deregister(&self, service_id: &str) -> Result<(), RegistryError> {
        let resp = self
            .http
            .put(format!(
                "{}/v1/agent/service/deregister/{}",
                self.base_url, service_id
            ))
            .send()
            .await?;
        Self::ensure_ok(resp).await?;
        info!(id = %service_id, "deregistered from service registry");
        Ok(())
    }

    /// All instances the catalog knows under `name`, reachable or not.
    pub async fn discover(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        let resp = self
            .http
            .get(format!("{}/v1/catalog/service/{}", self.base_url, name))
            .send()
            .await?;
        let resp = Self::ensure_ok(resp).await?;
        let instances: Vec<ServiceInstance> = resp.json().await?;
        Ok(instances
            .into_iter()
            .filter(|i| !i.address().is_empty())
            .collect())
    }

    /// Instances whose health checks are currently passing.
    pub async fn healthy(&self, name: &str) -> Result<Vec<ServiceInstance>, RegistryError> {
        #[derive(Deserialize)]
        struct HealthEntry {
            #[serde(rename = "Service")]
            service: HealthService,
        }
        #[derive(Deserialize)]
        struct HealthService {
            #[serde(rename = "ID", default)]
            id: String,
            #[serde(rename = "Service", default)]
            name: String,
            #[serde(rename = "Address", default)]
            address: String,
            #[serde(rename = "Port", default)]
            port: u16,
            #[serde(rename = "Tags", default)]
            tags: Vec<String>,
        }

        let resp = self
            .http
            .get(format!(
                "{}/v1/health/service/{}?passing=true",
                self.base_url, name
            ))
            .send()
            .await?;
        let resp = Self::ensure_ok(resp).await?;
        let entries: Vec<HealthEntry> = resp.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| ServiceInstance {
                id: e.service.id,
                name: e.service.name,
                service_address: e.service.address,
                node_address: String::new(),
                port: e.service.port,
                tags: e.service.tags,
            })
            .collect())
    }

    /// Catalog listing: service name → tags.
    pub async fn services(&self) -> Result<HashMap<String, Vec<String>>, RegistryError> {
        let resp = self
            .http
            .get(format!("{}/v1/catalog/services", self.base_url))
            .send()
            .await?;
        let resp = Self::ensure_ok(resp).await?;
        Ok(resp.json().await?)
    }

    /// Register with a bounded number of attempts and a fixed backoff.
    /// Returns whether registration eventually succeeded; failure is logged
    /// and swallowed so the caller keeps serving.
    pub async fn register_with_retry(
        &self,
        service: &ServiceRegistration,
        attempts: u32,
        backoff: Duration,
    ) -> bool {
        for attempt in 1..=attempts {
            match self.register(service).await {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        service = %service.name,
                        attempt,
                        attempts,
                        error = %err,
                        "service registration failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        warn!(
            service = %service.name,
            "giving up on registry registration; service stays reachable directly"
        );
        false
    }

    async fn ensure_ok(resp: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(RegistryError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_serializes_with_registry_field_names() {
        let reg = ServiceRegistration {
            id: "tripify-api-1".to_string(),
            name: "tripify-api".to_string(),
            address: "tripify-api".to_string(),
            port: 3000,
            tags: vec!["http".to_string()],
            check: Some(HealthCheck::http("http://tripify-api:3000/health")),
            meta: HashMap::new(),
        };
        let json = serde_json::to_value(&reg).unwrap();
        assert_eq!(json["ID"], "tripify-api-1");
        assert_eq!(json["Name"], "tripify-api");
        assert_eq!(json["Port"], 3000);
        assert_eq!(json["Check"]["HTTP"], "http://tripify-api:3000/health");
        assert_eq!(json["Check"]["Interval"], "10s");
        assert!(json["Check"].get("GRPC").is_none());
    }

    #[test]
    fn instance_address_falls_back_to_node() {
        let inst: ServiceInstance = serde_json::from_value(serde_json::json!({
            "ServiceID": "data-1",
            "ServiceName": "tripify-data",
            "ServiceAddress": "",
            "Address": "10.0.0.7",
            "ServicePort": 4000
        }))
        .unwrap();
        assert_eq!(inst.address(), "10.0.0.7");
        assert_eq!(inst.base_url(), "http://10.0.0.7:4000");
    }
}
