//! Device registry client
//!
//! Resolves a device group's conditions into the concrete list of matching
//! devices for a tenant.

use std::time::Duration;

use asa_model::{Condition, DeviceListResult};
use async_trait::async_trait;
use errors::{AsaError, Result};
use reqwest::header::HeaderName;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::RegistrySection;

/// Header carrying the continuation token between pages
pub const CONTINUATION_HEADER: &str = "x-ms-continuation";

// Error bodies are cut to this many characters before landing in reports
const MAX_ERROR_BODY: usize = 256;

/// Resolves device-group conditions to device ids
#[async_trait]
pub trait DeviceRegistry: Send + Sync + 'static {
    /// All devices of `tenant_id` matching every condition
    async fn resolve(&self, conditions: &[Condition], tenant_id: &str)
        -> Result<DeviceListResult>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicePage {
    #[serde(default)]
    items: Vec<DeviceItem>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceItem {
    id: String,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

/// HTTP client for the device registry's `/devices` query endpoint
#[derive(Debug, Clone)]
pub struct HttpDeviceRegistry {
    http_client: HttpClient,
    devices_url: String,
    tenant_header: HeaderName,
    page_size: Option<u32>,
    max_pages: usize,
}

impl HttpDeviceRegistry {
    pub fn new(config: &RegistrySection) -> Result<Self> {
        let tenant_header =
            HeaderName::from_bytes(config.tenant_header.as_bytes()).map_err(|e| {
                AsaError::InvalidConfig {
                    field: "device_registry.tenant_header".to_string(),
                    reason: e.to_string(),
                }
            })?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http_client,
            devices_url: format!("{}/devices", config.url.trim_end_matches('/')),
            tenant_header,
            page_size: config.page_size,
            max_pages: config.max_pages.max(1),
        })
    }

    pub fn devices_url(&self) -> &str {
        &self.devices_url
    }

    async fn fetch_page(
        &self,
        query: &str,
        tenant_id: &str,
        continuation: Option<&str>,
    ) -> Result<DevicePage> {
        let mut request = self
            .http_client
            .get(&self.devices_url)
            .query(&[("query", query)])
            .header(self.tenant_header.clone(), tenant_id);
        if let Some(page_size) = self.page_size {
            request = request.query(&[("pageSize", page_size)]);
        }
        if let Some(token) = continuation {
            request = request.header(CONTINUATION_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, &self.devices_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AsaError::Registry {
                status: status.as_u16(),
                message: truncate(&body),
            });
        }

        response
            .json::<DevicePage>()
            .await
            .map_err(|e| transport_error(e, &self.devices_url))
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn resolve(
        &self,
        conditions: &[Condition],
        tenant_id: &str,
    ) -> Result<DeviceListResult> {
        let query = serde_json::to_string(conditions)?;
        let mut devices = DeviceListResult::new();
        let mut continuation: Option<String> = None;

        for page_no in 1..=self.max_pages {
            let page = self
                .fetch_page(&query, tenant_id, continuation.as_deref())
                .await?;
            debug!(
                "Device registry page {} for tenant {}: {} devices",
                page_no,
                tenant_id,
                page.items.len()
            );

            for item in page.items {
                devices.insert(item.id, Value::Object(item.metadata));
            }

            match page.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) => continuation = Some(token),
                None => return Ok(devices),
            }
        }

        Err(AsaError::Registry {
            status: 200,
            message: format!(
                "continuation not exhausted after {} pages",
                self.max_pages
            ),
        })
    }
}

fn transport_error(e: reqwest::Error, url: &str) -> AsaError {
    if e.is_timeout() {
        AsaError::Timeout(format!("device registry request to {}", url))
    } else {
        AsaError::Http(e)
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_devices_url() {
        let config = RegistrySection {
            url: "http://registry.local/v1/".to_string(),
            ..RegistrySection::default()
        };
        let registry = HttpDeviceRegistry::new(&config).unwrap();
        assert_eq!(registry.devices_url(), "http://registry.local/v1/devices");
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        let config = RegistrySection {
            tenant_header: "Tenant Id".to_string(),
            ..RegistrySection::default()
        };
        assert!(matches!(
            HttpDeviceRegistry::new(&config),
            Err(AsaError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_page_deserialization() {
        let page: DevicePage = serde_json::from_str(
            r#"{"items":[{"id":"d1","tags":{"type":"truck"}},{"id":"d2"}],"continuationToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "d1");
        assert!(page.items[0].metadata.contains_key("tags"));
        assert_eq!(page.continuation_token.as_deref(), Some("abc"));

        let page: DevicePage = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.continuation_token.is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.len(), MAX_ERROR_BODY + 3);
    }
}
