//! Item sinks mapping generic operations onto appliance calls.

use async_trait::async_trait;

use crate::model::{Client, DhcpStaticLease, Filter, RewriteEntry};
use crate::reconcile::apply::ItemSink;
use crate::reconcile::diff::Update;
use crate::remote::{Appliance, RemoteResult};

/// Rewrites have no update call; their whole content is the key.
pub struct RewriteSink<'a> {
    pub appliance: &'a dyn Appliance,
}

#[async_trait]
impl ItemSink<RewriteEntry> for RewriteSink<'_> {
    async fn add(&self, item: &RewriteEntry) -> RemoteResult<()> {
        self.appliance.add_rewrite(item).await
    }

    async fn update(&self, update: &Update<RewriteEntry>) -> RemoteResult<()> {
        self.appliance.delete_rewrite(&update.current).await?;
        self.appliance.add_rewrite(&update.desired).await
    }

    async fn delete(&self, item: &RewriteEntry) -> RemoteResult<()> {
        self.appliance.delete_rewrite(item).await
    }
}

/// Filters of one polarity.
pub struct FilterSink<'a> {
    pub appliance: &'a dyn Appliance,
    pub whitelist: bool,
}

#[async_trait]
impl ItemSink<Filter> for FilterSink<'_> {
    /// New subscriptions come up enabled; a disabled origin filter needs a
    /// follow-up update.
    async fn add(&self, item: &Filter) -> RemoteResult<()> {
        self.appliance.add_filter(self.whitelist, item).await?;
        if !item.enabled {
            self.appliance.update_filter(self.whitelist, item).await?;
        }
        Ok(())
    }

    async fn update(&self, update: &Update<Filter>) -> RemoteResult<()> {
        let filter = Filter {
            id: update.current.id,
            ..update.desired.clone()
        };
        self.appliance.update_filter(self.whitelist, &filter).await
    }

    async fn delete(&self, item: &Filter) -> RemoteResult<()> {
        self.appliance.remove_filter(self.whitelist, item).await
    }
}

pub struct ClientSink<'a> {
    pub appliance: &'a dyn Appliance,
}

#[async_trait]
impl ItemSink<Client> for ClientSink<'_> {
    async fn add(&self, item: &Client) -> RemoteResult<()> {
        self.appliance.add_client(item).await
    }

    async fn update(&self, update: &Update<Client>) -> RemoteResult<()> {
        self.appliance.update_client(&update.desired).await
    }

    async fn delete(&self, item: &Client) -> RemoteResult<()> {
        self.appliance.delete_client(&item.name).await
    }
}

/// Leases have no update call: the old lease is removed, the new one added.
pub struct LeaseSink<'a> {
    pub appliance: &'a dyn Appliance,
}

#[async_trait]
impl ItemSink<DhcpStaticLease> for LeaseSink<'_> {
    async fn add(&self, item: &DhcpStaticLease) -> RemoteResult<()> {
        self.appliance.add_static_lease(item).await
    }

    async fn update(&self, update: &Update<DhcpStaticLease>) -> RemoteResult<()> {
        self.appliance.remove_static_lease(&update.current).await?;
        self.appliance.add_static_lease(&update.desired).await
    }

    async fn delete(&self, item: &DhcpStaticLease) -> RemoteResult<()> {
        self.appliance.remove_static_lease(item).await
    }
}
