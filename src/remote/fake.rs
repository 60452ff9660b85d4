//! In-memory appliance.
//!
//! # Responsibilities
//! - Hold one appliance's state and apply mutations the way the real API does
//! - Record every call so tests can count operations
//! - Inject failures, first-run setup and latency

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::validation::validate_instance;
use crate::config::{InstanceConfig, ValidationError};
use crate::model::{
    AccessList, BlockedService, Client, DhcpConfig, DhcpStaticLease, DhcpStatus, DnsConfig,
    Filter, FilteringConfig, FilteringStatus, InitialSetup, QueryLogConfig, RewriteEntry,
    StatsConfig, Status,
};
use crate::reconcile::Keyed;
use crate::remote::{Appliance, Connector, ProtectionFeature, RemoteError, RemoteResult};

/// Everything an appliance stores.
#[derive(Debug, Clone, Default)]
pub struct FakeState {
    pub status: Status,
    pub rewrites: Vec<RewriteEntry>,
    pub filtering: FilteringStatus,
    pub safebrowsing: bool,
    pub parental: bool,
    pub safesearch: bool,
    pub blocked_services: Vec<BlockedService>,
    pub clients: Vec<Client>,
    pub query_log: QueryLogConfig,
    pub stats: StatsConfig,
    pub access_list: AccessList,
    pub dns: DnsConfig,
    pub dhcp: DhcpStatus,
}

#[derive(Debug, Default)]
struct SetupState {
    pending: bool,
    /// Setup calls succeed but the appliance keeps asking for setup.
    sticky: bool,
    calls: usize,
    received: Option<InitialSetup>,
}

#[derive(Debug)]
struct FailureRule {
    pattern: String,
    error: RemoteError,
}

/// Calls in progress across every appliance sharing the gauge.
#[derive(Debug, Default)]
pub struct CallGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl CallGauge {
    /// Highest number of calls seen in progress at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }
}

struct InFlight<'a>(&'a CallGauge);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `Appliance` backed by `FakeState`.
///
/// Call labels look like `"get rewrites"`, `"add_rewrite a.lan -> 10.0.0.1"`
/// or `"set_protection true"`.
#[derive(Debug)]
pub struct FakeAppliance {
    host: String,
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<Vec<FailureRule>>,
    setup: Mutex<SetupState>,
    delay: Option<Duration>,
    gauge: Option<Arc<CallGauge>>,
}

impl FakeAppliance {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_state(host, FakeState::default())
    }

    pub fn with_state(host: impl Into<String>, state: FakeState) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            setup: Mutex::new(SetupState::default()),
            delay: None,
            gauge: None,
        }
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Count this appliance's calls in `gauge`.
    pub fn with_gauge(mut self, gauge: Arc<CallGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    /// Answer every call with setup-required until `setup` is called. With
    /// `sticky`, setup never takes effect.
    pub fn require_setup(&self, sticky: bool) {
        let mut setup = self.setup.lock().expect("fake setup state poisoned");
        setup.pending = true;
        setup.sticky = sticky;
    }

    /// Fail every call whose label contains `pattern`.
    pub fn fail_when(&self, pattern: impl Into<String>, error: RemoteError) {
        self.failures
            .lock()
            .expect("fake failure rules poisoned")
            .push(FailureRule {
                pattern: pattern.into(),
                error,
            });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().expect("fake failure rules poisoned").clear();
    }

    /// Copy of the current state.
    pub fn state(&self) -> FakeState {
        self.state.lock().expect("fake state poisoned").clone()
    }

    /// Modify the state without recording a call.
    pub fn update_state(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().expect("fake state poisoned"));
    }

    /// Every call label, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fake call log poisoned").clone()
    }

    /// Calls other than reads.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("get "))
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().expect("fake call log poisoned").clear();
    }

    pub fn setup_calls(&self) -> usize {
        self.setup.lock().expect("fake setup state poisoned").calls
    }

    pub fn received_setup(&self) -> Option<InitialSetup> {
        self.setup.lock().expect("fake setup state poisoned").received.clone()
    }

    async fn begin(&self, label: String) -> RemoteResult<()> {
        let in_flight = self.gauge.as_deref().map(CallGauge::enter);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        drop(in_flight);
        self.calls.lock().expect("fake call log poisoned").push(label.clone());

        if self.setup.lock().expect("fake setup state poisoned").pending {
            return Err(RemoteError::SetupRequired);
        }

        let failures = self.failures.lock().expect("fake failure rules poisoned");
        match failures.iter().find(|r| label.contains(&r.pattern)) {
            Some(rule) => Err(rule.error.clone()),
            None => Ok(()),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> RemoteResult<T>) -> RemoteResult<T> {
        f(&mut self.state.lock().expect("fake state poisoned"))
    }
}

fn bad_request(message: impl Into<String>) -> RemoteError {
    RemoteError::Api {
        status: 400,
        body: message.into(),
    }
}

fn filter_list(state: &mut FakeState, whitelist: bool) -> &mut Vec<Filter> {
    if whitelist {
        &mut state.filtering.whitelist_filters
    } else {
        &mut state.filtering.filters
    }
}

#[async_trait]
impl Appliance for FakeAppliance {
    fn host(&self) -> &str {
        &self.host
    }

    async fn status(&self) -> RemoteResult<Status> {
        self.begin("get status".into()).await?;
        self.with(|s| Ok(s.status.clone()))
    }

    async fn setup(&self, setup: &InitialSetup) -> RemoteResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().expect("fake call log poisoned").push("setup".into());
        let mut state = self.setup.lock().expect("fake setup state poisoned");
        state.calls += 1;
        state.received = Some(setup.clone());
        if !state.sticky {
            state.pending = false;
        }
        Ok(())
    }

    async fn set_protection(&self, enabled: bool) -> RemoteResult<()> {
        self.begin(format!("set_protection {}", enabled)).await?;
        self.with(|s| {
            s.status.protection_enabled = enabled;
            Ok(())
        })
    }

    async fn rewrites(&self) -> RemoteResult<Vec<RewriteEntry>> {
        self.begin("get rewrites".into()).await?;
        self.with(|s| Ok(s.rewrites.clone()))
    }

    async fn add_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()> {
        self.begin(format!("add_rewrite {}", entry.label())).await?;
        self.with(|s| {
            if s.rewrites.contains(entry) {
                return Err(bad_request("rewrite already exists"));
            }
            s.rewrites.push(entry.clone());
            Ok(())
        })
    }

    async fn delete_rewrite(&self, entry: &RewriteEntry) -> RemoteResult<()> {
        self.begin(format!("delete_rewrite {}", entry.label())).await?;
        self.with(|s| {
            s.rewrites.retain(|r| r != entry);
            Ok(())
        })
    }

    async fn filtering(&self) -> RemoteResult<FilteringStatus> {
        self.begin("get filtering".into()).await?;
        self.with(|s| Ok(s.filtering.clone()))
    }

    async fn add_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        self.begin(format!("add_filter[{}] {}", whitelist, filter.url)).await?;
        self.with(|s| {
            let next_id = s
                .filtering
                .filters
                .iter()
                .chain(s.filtering.whitelist_filters.iter())
                .map(|f| f.id)
                .max()
                .unwrap_or(0)
                + 1;
            let list = filter_list(s, whitelist);
            if list.iter().any(|f| f.url == filter.url) {
                return Err(bad_request("filter URL already added"));
            }
            // New subscriptions start enabled, like the real API.
            list.push(Filter {
                id: next_id,
                ..Filter::new(filter.name.clone(), filter.url.clone(), true)
            });
            Ok(())
        })
    }

    async fn remove_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        self.begin(format!("remove_filter[{}] {}", whitelist, filter.url)).await?;
        self.with(|s| {
            filter_list(s, whitelist).retain(|f| f.url != filter.url);
            Ok(())
        })
    }

    async fn update_filter(&self, whitelist: bool, filter: &Filter) -> RemoteResult<()> {
        self.begin(format!("update_filter[{}] {}", whitelist, filter.url)).await?;
        self.with(|s| {
            let existing = filter_list(s, whitelist)
                .iter_mut()
                .find(|f| f.url == filter.url)
                .ok_or_else(|| bad_request("filter not found"))?;
            existing.name = filter.name.clone();
            existing.enabled = filter.enabled;
            Ok(())
        })
    }

    async fn refresh_filters(&self, whitelist: bool) -> RemoteResult<()> {
        self.begin(format!("refresh_filters[{}]", whitelist)).await
    }

    async fn set_user_rules(&self, rules: &[String]) -> RemoteResult<()> {
        self.begin(format!("set_user_rules {}", rules.len())).await?;
        self.with(|s| {
            s.filtering.user_rules = rules.to_vec();
            Ok(())
        })
    }

    async fn set_filtering_config(&self, config: &FilteringConfig) -> RemoteResult<()> {
        self.begin(format!("set_filtering_config {:?}", config)).await?;
        self.with(|s| {
            s.filtering.enabled = config.enabled;
            s.filtering.interval = config.interval;
            Ok(())
        })
    }

    async fn protection_feature(&self, feature: ProtectionFeature) -> RemoteResult<bool> {
        self.begin(format!("get {}", feature.as_str())).await?;
        self.with(|s| {
            Ok(match feature {
                ProtectionFeature::SafeBrowsing => s.safebrowsing,
                ProtectionFeature::Parental => s.parental,
                ProtectionFeature::SafeSearch => s.safesearch,
            })
        })
    }

    async fn set_protection_feature(&self, feature: ProtectionFeature, enabled: bool) -> RemoteResult<()> {
        self.begin(format!("set_{} {}", feature.as_str(), enabled)).await?;
        self.with(|s| {
            match feature {
                ProtectionFeature::SafeBrowsing => s.safebrowsing = enabled,
                ProtectionFeature::Parental => s.parental = enabled,
                ProtectionFeature::SafeSearch => s.safesearch = enabled,
            }
            Ok(())
        })
    }

    async fn blocked_services(&self) -> RemoteResult<Vec<BlockedService>> {
        self.begin("get blocked_services".into()).await?;
        self.with(|s| Ok(s.blocked_services.clone()))
    }

    async fn set_blocked_services(&self, services: &[BlockedService]) -> RemoteResult<()> {
        self.begin(format!("set_blocked_services {}", services.len())).await?;
        self.with(|s| {
            s.blocked_services = services.to_vec();
            Ok(())
        })
    }

    async fn clients(&self) -> RemoteResult<Vec<Client>> {
        self.begin("get clients".into()).await?;
        self.with(|s| Ok(s.clients.clone()))
    }

    async fn add_client(&self, client: &Client) -> RemoteResult<()> {
        self.begin(format!("add_client {}", client.name)).await?;
        self.with(|s| {
            if s.clients.iter().any(|c| c.name == client.name) {
                return Err(bad_request("client already exists"));
            }
            s.clients.push(client.clone());
            Ok(())
        })
    }

    async fn update_client(&self, client: &Client) -> RemoteResult<()> {
        self.begin(format!("update_client {}", client.name)).await?;
        self.with(|s| {
            let existing = s
                .clients
                .iter_mut()
                .find(|c| c.name == client.name)
                .ok_or_else(|| bad_request("client not found"))?;
            *existing = client.clone();
            Ok(())
        })
    }

    async fn delete_client(&self, name: &str) -> RemoteResult<()> {
        self.begin(format!("delete_client {}", name)).await?;
        self.with(|s| {
            s.clients.retain(|c| c.name != name);
            Ok(())
        })
    }

    async fn query_log_config(&self) -> RemoteResult<QueryLogConfig> {
        self.begin("get query_log_config".into()).await?;
        self.with(|s| Ok(s.query_log))
    }

    async fn set_query_log_config(&self, config: &QueryLogConfig) -> RemoteResult<()> {
        self.begin("set_query_log_config".into()).await?;
        self.with(|s| {
            s.query_log = *config;
            Ok(())
        })
    }

    async fn stats_config(&self) -> RemoteResult<StatsConfig> {
        self.begin("get stats_config".into()).await?;
        self.with(|s| Ok(s.stats))
    }

    async fn set_stats_config(&self, config: &StatsConfig) -> RemoteResult<()> {
        self.begin("set_stats_config".into()).await?;
        self.with(|s| {
            s.stats = *config;
            Ok(())
        })
    }

    async fn access_list(&self) -> RemoteResult<AccessList> {
        self.begin("get access_list".into()).await?;
        self.with(|s| Ok(s.access_list.clone()))
    }

    async fn set_access_list(&self, list: &AccessList) -> RemoteResult<()> {
        self.begin("set_access_list".into()).await?;
        self.with(|s| {
            s.access_list = list.clone();
            Ok(())
        })
    }

    async fn dns_config(&self) -> RemoteResult<DnsConfig> {
        self.begin("get dns_config".into()).await?;
        self.with(|s| Ok(s.dns.clone()))
    }

    async fn set_dns_config(&self, config: &DnsConfig) -> RemoteResult<()> {
        self.begin("set_dns_config".into()).await?;
        self.with(|s| {
            let mut merged = serde_json::to_value(&s.dns).map_err(|e| RemoteError::Decode(e.to_string()))?;
            let patch = serde_json::to_value(config).map_err(|e| RemoteError::Decode(e.to_string()))?;
            if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            s.dns = serde_json::from_value(merged).map_err(|e| RemoteError::Decode(e.to_string()))?;
            Ok(())
        })
    }

    async fn dhcp_status(&self) -> RemoteResult<DhcpStatus> {
        self.begin("get dhcp_status".into()).await?;
        self.with(|s| Ok(s.dhcp.clone()))
    }

    async fn set_dhcp_config(&self, config: &DhcpConfig) -> RemoteResult<()> {
        self.begin("set_dhcp_config".into()).await?;
        self.with(|s| {
            s.dhcp.enabled = config.enabled;
            s.dhcp.interface_name = config.interface_name.clone();
            s.dhcp.v4 = config.v4.clone();
            s.dhcp.v6 = config.v6.clone();
            Ok(())
        })
    }

    async fn add_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()> {
        self.begin(format!("add_static_lease {}", lease.mac)).await?;
        self.with(|s| {
            if s.dhcp.static_leases.iter().any(|l| l.key() == lease.key()) {
                return Err(bad_request("static lease already exists"));
            }
            s.dhcp.static_leases.push(lease.clone());
            Ok(())
        })
    }

    async fn remove_static_lease(&self, lease: &DhcpStaticLease) -> RemoteResult<()> {
        self.begin(format!("remove_static_lease {}", lease.mac)).await?;
        self.with(|s| {
            s.dhcp.static_leases.retain(|l| l.key() != lease.key());
            Ok(())
        })
    }
}

/// Hands out registered `FakeAppliance`s by URL.
#[derive(Debug, Default)]
pub struct FakeConnector {
    appliances: HashMap<String, Arc<FakeAppliance>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, url: impl Into<String>, appliance: Arc<FakeAppliance>) {
        self.appliances.insert(url.into(), appliance);
    }
}

impl Connector for FakeConnector {
    fn connect(&self, instance: &InstanceConfig) -> Result<Arc<dyn Appliance>, Vec<ValidationError>> {
        validate_instance(&instance.url, instance)?;
        match self.appliances.get(&instance.url) {
            Some(appliance) => Ok(appliance.clone() as Arc<dyn Appliance>),
            None => Err(vec![ValidationError::InvalidUrl {
                instance: instance.url.clone(),
                url: instance.url.clone(),
                reason: "no appliance registered".to_string(),
            }]),
        }
    }
}
