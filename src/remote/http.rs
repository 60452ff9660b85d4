//! HTTP transport for the appliance management API.
//!
//! # Responsibilities
//! - Build the API base URL (`<url>/control` or `<url>/<api_path>`)
//! - Authenticate with HTTP basic auth
//! - Map responses onto `RemoteError` (setup redirect, non-200, decode)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::validation::validate_instance;
use crate::config::{InstanceConfig, ValidationError};
use crate::model::client::Clients;
use crate::model::settings::EnableConfig;
use crate::model::{
    AccessList, BlockedService, Client, DhcpConfig, DhcpStaticLease, DhcpStatus, DnsConfig,
    Filter, FilteringConfig, FilteringStatus, InitialSetup, QueryLogConfig, RewriteEntry,
    StatsConfig, Status,
};
use crate::remote::{Appliance, Connector, ProtectionFeature, RemoteError, RemoteResult};

const SETUP_PAGE: &str = "/install.html";

#[derive(Serialize)]
struct FilterRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    url: &'a str,
    whitelist: bool,
}

#[derive(Serialize)]
struct FilterData<'a> {
    id: i64,
    name: &'a str,
    url: &'a str,
    whitelist: bool,
    enabled: bool,
}

#[derive(Serialize)]
struct FilterUpdate<'a> {
    url: &'a str,
    whitelist: bool,
    data: FilterData<'a>,
}

#[derive(Serialize)]
struct RefreshFilter {
    whitelist: bool,
}

#[derive(Serialize)]
struct UserRules<'a> {
    rules: &'a [String],
}

#[derive(Serialize)]
struct Protection {
    protection_enabled: bool,
}

#[derive(Serialize)]
struct ClientUpdate<'a> {
    name: &'a str,
    data: &'a Client,
}

#[derive(Serialize)]
struct ClientDelete<'a> {
    name: &'a str,
}

/// `Appliance` implementation over the appliance's REST API.
#[derive(Debug, Clone)]
pub struct HttpAppliance {
    client: reqwest::Client,
    /// API base, always ending in '/'.
    base: Url,
    host: String,
    credentials: Option<(String, String)>,
}

impl HttpAppliance {
    /// Create a client for one instance. Fails before any call is made when
    /// the instance configuration is invalid.
    pub fn new(instance: &InstanceConfig, request_timeout: Duration) -> Result<Self, Vec<ValidationError>> {
        let url = validate_instance(&instance.url, instance)?;
        let base = api_base(&url, instance.api_path.as_deref());
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let redirect = match instance.redirect_limit {
            Some(limit) => Policy::limited(limit),
            None => Policy::none(),
        };

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(redirect)
            .danger_accept_invalid_certs(instance.insecure_skip_verify)
            .build()
            .map_err(|e| {
                vec![ValidationError::ClientBuild {
                    instance: instance.url.clone(),
                    reason: e.to_string(),
                }]
            })?;

        let credentials = instance
            .credentials()
            .map(|(u, p)| (u.to_string(), p.to_string()));

        Ok(Self {
            client,
            base,
            host,
            credentials,
        })
    }

    /// The resolved API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, format!("{}{}", self.base, path));
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> RemoteResult<T> {
        tracing::debug!(host = %self.host, method = "GET", path, "do get");
        let resp = self.request(Method::GET, path).send().await?;
        let resp = check(resp).await?;
        let body = resp.text().await?;
        tracing::trace!(host = %self.host, path, body = %body, "got response");
        serde_json::from_str(&body).map_err(|e| RemoteError::Decode(format!("{}: {}", path, e)))
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RemoteResult<()> {
        tracing::debug!(host = %self.host, method = "POST", path, "do post");
        let resp = self.request(Method::POST, path).json(body).send().await?;
        check(resp).await.map(|_| ())
    }

    async fn post_empty(&self, path: &str) -> RemoteResult<()> {
        tracing::debug!(host = %self.host, method = "POST", path, "do post");
        let resp = self.request(Method::POST, path).send().await?;
        check(resp).await.map(|_| ())
    }
}

/// `<url>/control/` or `<url>/<api_path>/`, with duplicate slashes removed.
fn api_base(url: &Url, api_path: Option<&str>) -> Url {
    let api_path = api_path.unwrap_or("control").trim_matches('/');
    let segments: Vec<&str> = url
        .path()
        .split('/')
        .chain(api_path.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    if segments.is_empty() {
        base.set_path("/");
    } else {
        base.set_path(&format!("/{}/", segments.join("/")));
    }
    base
}

/// Map a response to the error taxonomy; only 200 counts as success.
async fn check(resp: Response) -> RemoteResult<Response> {
    let status = resp.status();
    if resp.url().path().ends_with(SETUP_PAGE) {
        return Err(RemoteError::SetupRequired);
    }
    if status == StatusCode::FOUND {
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if location.ends_with(SETUP_PAGE) {
            return Err(RemoteError::SetupRequired);
        }
    }
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(RemoteError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

#[async_trait]
impl Appliance for HttpAppliance {
    fn host(&self) -> &str {
        &self.host
    }

    async fn status(&self) -> RemoteResult<Status> {
        self.get("status").await
    }

    async fn setup(&self, setup: &InitialSetup) -> RemoteResult<()> {
        tracing::info!(host = %self.host, "Setup new appliance");
        // The first-run endpoint is unauthenticated.
        let resp = self
            .client
            .post(format!("{}install/configure", self.base))
            .json(setup)
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    async fn set_protection(&self, enabled: bool) -> RemoteResult<()> {
        self.post("dns_config", &Protection { protection_enabled: enabled }).await
    }

    async fn rewrites(&self) -> RemoteResult<Vec<RewriteEntry>> {
        let entries: Option<Vec<RewriteEntry>> = self.get("rewrite/list").await?;
        Ok(entries.unwrap_or_default())
    }

    async fn add_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()> {
        self.post("rewrite/add", entry).await
    }

    async fn delete_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()> {
        self.post("rewrite/delete", entry).await
    }

    async fn filtering(&self) -> RemoteResult<FilteringStatus> {
        self.get("filtering/status").await
    }

    async fn add_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        let body = FilterRef {
            name: Some(&filter.name),
            url: &filter.url,
            whitelist,
        };
        self.post("filtering/add_url", &body).await
    }

    async fn remove_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        let body = FilterRef {
            name: None,
            url: &filter.url,
            whitelist,
        };
        self.post("filtering/remove_url", &body).await
    }

    async fn update_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        let body = FilterUpdate {
            url: &filter.url,
            whitelist,
            data: FilterData {
                id: filter.id,
                name: &filter.name,
                url: &filter.url,
                whitelist,
                enabled: filter.enabled,
            },
        };
        self.post("filtering/set_url", &body).await
    }

    async fn refresh_filters(&self, whitelist: bool) -> RemoteResult<()> {
        self.post("filtering/refresh", &RefreshFilter { whitelist }).await
    }

    async fn set_user_rules(&self, rules: &[String]) -> RemoteResult<()> {
        self.post("filtering/set_rules", &UserRules { rules }).await
    }

    async fn set_filtering_config(&self, config: &FilteringConfig) -> RemoteResult<()> {
        self.post("filtering/config", config).await
    }

    async fn protection_feature(&self, feature: ProtectionFeature) -> RemoteResult<bool> {
        let status: EnableConfig = self.get(&format!("{}/status", feature.as_str())).await?;
        Ok(status.enabled)
    }

    async fn set_protection_feature(&self, feature: ProtectionFeature, enabled: bool) -> RemoteResult<()> {
        let target = if enabled { "enable" } else { "disable" };
        self.post_empty(&format!("{}/{}", feature.as_str(), target)).await
    }

    async fn blocked_services(&self) -> RemoteResult<Vec<BlockedService>> {
        let services: Option<Vec<BlockedService>> = self.get("blocked_services/list").await?;
        Ok(services.unwrap_or_default())
    }

    async fn set_blocked_services(&self, services: &[BlockedService]) -> RemoteResult<()> {
        self.post("blocked_services/set", services).await
    }

    async fn clients(&self) -> RemoteResult<Vec<Client>> {
        let clients: Clients = self.get("clients").await?;
        Ok(clients.clients)
    }

    async fn add_client(&self, client: &Client) -> RemoteResult<()> {
        self.post("clients/add", client).await
    }

    async fn update_client(&self, client: &Client) -> RemoteResult<()> {
        let body = ClientUpdate {
            name: &client.name,
            data: client,
        };
        self.post("clients/update", &body).await
    }

    async fn delete_client(&self, name: &str) -> RemoteResult<()> {
        self.post("clients/delete", &ClientDelete { name }).await
    }

    async fn query_log_config(&self) -> RemoteResult<QueryLogConfig> {
        self.get("querylog_info").await
    }

    async fn set_query_log_config(&self, config: &QueryLogConfig) -> RemoteResult<()> {
        self.post("querylog_config", config).await
    }

    async fn stats_config(&self) -> RemoteResult<StatsConfig> {
        self.get("stats_info").await
    }

    async fn set_stats_config(&self, config: &StatsConfig) -> RemoteResult<()> {
        self.post("stats_config", config).await
    }

    async fn access_list(&self) -> RemoteResult<AccessList> {
        self.get("access/list").await
    }

    async fn set_access_list(&self, list: &AccessList) -> RemoteResult<()> {
        self.post("access/set", list).await
    }

    async fn dns_config(&self) -> RemoteResult<DnsConfig> {
        self.get("dns_info").await
    }

    async fn set_dns_config(&self, config: &DnsConfig) -> RemoteResult<()> {
        self.post("dns_config", config).await
    }

    async fn dhcp_status(&self) -> RemoteResult<DhcpStatus> {
        self.get("dhcp/status").await
    }

    async fn set_dhcp_config(&self, config: &DhcpConfig) -> RemoteResult<()> {
        self.post("dhcp/set_config", config).await
    }

    async fn add_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()> {
        self.post("dhcp/add_static_lease", lease).await
    }

    async fn remove_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()> {
        self.post("dhcp/remove_static_lease", lease).await
    }
}

/// Builds `HttpAppliance`s with a shared per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Connector for HttpConnector {
    fn connect(&self, instance: &InstanceConfig) -> Result<Arc<dyn Appliance>, Vec<ValidationError>> {
        let appliance = HttpAppliance::new(instance, self.request_timeout)?;
        Ok(Arc::new(appliance))
    }
}
