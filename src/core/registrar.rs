//! Registration of operations and their enforcement filters
//!
//! The host hands a [`MetadataDiscovery`] to the [`Registrar`] before any route
//! becomes reachable. Every invocable operation of every group is resolved
//! exactly once and bound into a [`Route`]. Operations that fail to resolve are
//! never exposed: depending on [`FailurePolicy`] either the whole registration
//! is aborted or just the affected operations are left out.

use crate::descriptor::{GroupDescriptor, HttpMethod, OperationDescriptor, OperationId};
use crate::discovery::{CachedDiscovery, MetadataDiscovery};
use crate::enforcement::{Decision, EnforcementFilter, SecurityIdentity};
use crate::error::{RbacError, Result};
use crate::resolver::{PolicyResolver, PolicySource, Resolution, ResolvedPolicy};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do when an operation cannot be resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Fail the whole registration, listing every failure
    #[default]
    AbortStartup,
    /// Leave the failed operations unexposed and keep the rest
    RejectOperation,
}

/// Registration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrarConfig {
    pub failure_policy: FailurePolicy,
    /// Worker threads for [`Registrar::register_parallel`]
    pub workers: usize,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        RegistrarConfig {
            failure_policy: FailurePolicy::AbortStartup,
            workers: 4,
        }
    }
}

/// A registered operation with its bound filter
#[derive(Debug, Clone)]
pub struct Route {
    pub id: OperationId,
    pub method: Option<HttpMethod>,
    pub resolution: Resolution,
    filter: Option<Arc<EnforcementFilter>>,
}

impl Route {
    fn bind(operation: &OperationDescriptor, resolution: Resolution) -> Self {
        let filter = resolution.policy.clone().map(EnforcementFilter::shared);
        Route {
            id: operation.id(),
            method: operation.http_method,
            resolution,
            filter,
        }
    }

    pub fn policy(&self) -> Option<&ResolvedPolicy> {
        self.resolution.policy.as_ref()
    }

    pub fn source(&self) -> PolicySource {
        self.resolution.source
    }

    /// `None` when the operation is unconstrained
    pub fn filter(&self) -> Option<&Arc<EnforcementFilter>> {
        self.filter.as_ref()
    }

    /// Run the bound filter; an unconstrained route allows without lookups
    pub fn check<I: SecurityIdentity + ?Sized>(&self, identity: &I) -> Decision {
        match &self.filter {
            Some(filter) => filter.check(identity),
            None => Decision::Allow,
        }
    }
}

/// An operation that failed to resolve
#[derive(Debug)]
pub struct RejectedOperation {
    pub id: OperationId,
    pub error: RbacError,
}

/// Result of a registration run
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<OperationId, Route>,
    rejected: Vec<RejectedOperation>,
}

impl RouteTable {
    pub fn get(&self, id: &OperationId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.routes.contains_key(id)
    }

    /// Routes in `group:operation` order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Operations left out under [`FailurePolicy::RejectOperation`]
    pub fn rejected(&self) -> &[RejectedOperation] {
        &self.rejected
    }

    /// Number of routes with an installed filter
    pub fn constrained(&self) -> usize {
        self.routes.values().filter(|r| r.filter.is_some()).count()
    }

    /// Per-request check; operations that are not registered are denied
    pub fn authorize<I: SecurityIdentity + ?Sized>(
        &self,
        id: &OperationId,
        identity: &I,
    ) -> Decision {
        match self.routes.get(id) {
            Some(route) => route.check(identity),
            None => {
                warn!("Denying request to unregistered operation {}", id);
                Decision::Deny
            }
        }
    }
}

type Outcome = (OperationId, Result<Route>);

/// Resolves and binds filters for every invocable operation
#[derive(Debug, Clone, Copy, Default)]
pub struct Registrar {
    resolver: PolicyResolver,
    config: RegistrarConfig,
}

impl Registrar {
    pub fn new(resolver: PolicyResolver) -> Self {
        Registrar {
            resolver,
            config: RegistrarConfig::default(),
        }
    }

    pub fn with_config(resolver: PolicyResolver, config: RegistrarConfig) -> Self {
        Registrar { resolver, config }
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// Registration hook for a single operation
    ///
    /// `group` is the declaring group, `group_operations` the invocable
    /// operations of the exposing group.
    pub fn register_operation(
        &self,
        operation: &OperationDescriptor,
        group: &GroupDescriptor,
        group_operations: &[OperationDescriptor],
    ) -> Result<Route> {
        let resolution = self.resolver.explain(operation, group, group_operations)?;
        debug!(
            "Registered {} -> {} ({})",
            operation.id(),
            resolution
                .policy
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "none".to_string()),
            resolution.source
        );
        Ok(Route::bind(operation, resolution))
    }

    /// Register every group sequentially
    pub fn register<D: MetadataDiscovery>(&self, discovery: D) -> Result<RouteTable> {
        let discovery = CachedDiscovery::new(discovery);
        let mut outcomes = Vec::new();
        for group in discovery.groups() {
            outcomes.extend(self.register_group(&discovery, &group));
        }
        self.finish(outcomes)
    }

    /// Register groups across a pool of scoped worker threads
    ///
    /// Produces the same table as [`register`](Self::register).
    pub fn register_parallel<D>(&self, discovery: D) -> Result<RouteTable>
    where
        D: MetadataDiscovery + Sync,
    {
        let discovery = CachedDiscovery::new(discovery);
        let groups = discovery.groups();
        let workers = self.config.workers.clamp(1, groups.len().max(1));
        let next = AtomicUsize::new(0);
        let outcomes = Mutex::new(Vec::new());

        crossbeam::thread::scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(group) = groups.get(i) else {
                        break;
                    };
                    let batch = self.register_group(&discovery, group);
                    outcomes.lock().extend(batch);
                });
            }
        })
        .map_err(|_| RbacError::Config("registration worker panicked".to_string()))?;

        self.finish(outcomes.into_inner())
    }

    fn register_group<D: MetadataDiscovery>(
        &self,
        discovery: &CachedDiscovery<D>,
        group: &GroupDescriptor,
    ) -> Vec<Outcome> {
        let operations = discovery.operations_of(group);
        operations
            .iter()
            .map(|operation| {
                let outcome = discovery
                    .declaring_group(operation)
                    .ok_or_else(|| RbacError::UnknownGroup(operation.declaring_group.clone()))
                    .and_then(|declaring| {
                        self.register_operation(operation, &declaring, &operations)
                    });
                (operation.id(), outcome)
            })
            .collect()
    }

    fn finish(&self, outcomes: Vec<Outcome>) -> Result<RouteTable> {
        let mut table = RouteTable::default();

        for (id, outcome) in outcomes {
            match outcome {
                Ok(route) => {
                    table.routes.insert(id, route);
                }
                Err(error) => {
                    warn!("Rejecting operation {}: {}", id, error);
                    table.rejected.push(RejectedOperation { id, error });
                }
            }
        }
        table.rejected.sort_by(|a, b| a.id.cmp(&b.id));

        if !table.rejected.is_empty() && self.config.failure_policy == FailurePolicy::AbortStartup {
            return Err(RbacError::RegistrationAborted {
                rejected: table.rejected.into_iter().map(|r| r.error).collect(),
            });
        }

        info!(
            "Registered {} operations ({} constrained, {} rejected)",
            table.len(),
            table.constrained(),
            table.rejected.len()
        );
        Ok(table)
    }
}
