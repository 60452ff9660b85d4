//! Lists replaced with a single call.
//!
//! # Responsibilities
//! - Blocked services: diffed by id for counts and the protect policy, then
//!   written back as one list
//! - Access list: compared order-insensitively and replaced as a whole

use crate::model::{AccessList, BlockedService, EntityKind};
use crate::reconcile::apply::{ApplyResult, Operation};
use crate::reconcile::diff::{dedup_last_wins, diff, Keyed};
use crate::reconcile::report::EntityReport;
use crate::remote::Appliance;

/// Converge the blocked services list. Every planned item shares the outcome
/// of the one `set` call.
pub async fn reconcile_blocked_services(
    appliance: &dyn Appliance,
    origin: &[BlockedService],
    replica: &[BlockedService],
    protect_additional: bool,
    dry_run: bool,
) -> EntityReport {
    let kind = EntityKind::BlockedServices;
    let plan = diff(origin, replica, protect_additional);
    if plan.is_empty() || dry_run {
        return EntityReport::planned(&plan);
    }

    let mut desired = dedup_last_wins(origin);
    if protect_additional {
        let keys: Vec<String> = desired.iter().map(|s| s.key()).collect();
        desired.extend(
            dedup_last_wins(replica)
                .into_iter()
                .filter(|s| !keys.contains(&s.key())),
        );
    }

    let outcome = appliance.set_blocked_services(&desired).await;

    let mut result = ApplyResult::default();
    for service in &plan.to_delete {
        result.record(kind, Operation::Delete, service.label(), outcome.clone());
    }
    for service in &plan.to_add {
        result.record(kind, Operation::Add, service.label(), outcome.clone());
    }
    EntityReport::applied(&plan, &result)
}

/// Replace the replica's access list when it differs from the origin's.
pub async fn reconcile_access_list(
    appliance: &dyn Appliance,
    origin: &AccessList,
    replica: &AccessList,
    dry_run: bool,
) -> EntityReport {
    if origin.equivalent(replica) {
        return EntityReport {
            unchanged: 1,
            ..Default::default()
        };
    }
    if dry_run {
        return EntityReport {
            updated: 1,
            ..Default::default()
        };
    }

    let mut result = ApplyResult::default();
    let outcome = appliance.set_access_list(origin).await;
    result.record(EntityKind::AccessList, Operation::Update, "access_list".to_string(), outcome);

    let mut report = EntityReport {
        updated: result.succeeded(Operation::Update),
        ..Default::default()
    };
    report.absorb_failures(&result);
    report
}
