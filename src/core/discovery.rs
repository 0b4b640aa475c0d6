//! Metadata discovery seam
//!
//! The resolver never inspects handlers itself. A discovery implementation
//! enumerates groups, tells which group declares an operation, and decides what
//! counts as an invocable operation (public and request-routable, including
//! inherited members if the implementation supports inheritance).

use crate::descriptor::{GroupDescriptor, OperationDescriptor};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of security metadata for registration
pub trait MetadataDiscovery {
    /// Every group known to the host
    fn groups(&self) -> Vec<GroupDescriptor>;

    /// The group that declares `operation`, whose annotations act as the
    /// class-level fallback for it
    fn declaring_group(&self, operation: &OperationDescriptor) -> Option<GroupDescriptor>;

    /// All invocable operations exposed on `group`
    fn invocable_operations_of(&self, group: &GroupDescriptor) -> Vec<OperationDescriptor>;
}

impl<D: MetadataDiscovery + ?Sized> MetadataDiscovery for &D {
    fn groups(&self) -> Vec<GroupDescriptor> {
        (**self).groups()
    }

    fn declaring_group(&self, operation: &OperationDescriptor) -> Option<GroupDescriptor> {
        (**self).declaring_group(operation)
    }

    fn invocable_operations_of(&self, group: &GroupDescriptor) -> Vec<OperationDescriptor> {
        (**self).invocable_operations_of(group)
    }
}

/// Memoizes `invocable_operations_of` per group name
///
/// Registration asks for the operation list of a group once per operation in
/// it (sibling scan), so the underlying discovery is consulted once per group.
pub struct CachedDiscovery<D> {
    inner: D,
    operations: RwLock<HashMap<String, Arc<[OperationDescriptor]>>>,
}

impl<D: MetadataDiscovery> CachedDiscovery<D> {
    pub fn new(inner: D) -> Self {
        CachedDiscovery {
            inner,
            operations: RwLock::new(HashMap::new()),
        }
    }

    /// Shared operation list for `group`
    pub fn operations_of(&self, group: &GroupDescriptor) -> Arc<[OperationDescriptor]> {
        if let Some(cached) = self.operations.read().get(&group.name) {
            return Arc::clone(cached);
        }

        let computed: Arc<[OperationDescriptor]> = self.inner.invocable_operations_of(group).into();
        let mut operations = self.operations.write();
        // Another registration worker may have filled it in meanwhile
        Arc::clone(
            operations
                .entry(group.name.clone())
                .or_insert(computed),
        )
    }

    /// Number of groups with a cached operation list
    pub fn cached_groups(&self) -> usize {
        self.operations.read().len()
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: MetadataDiscovery> MetadataDiscovery for CachedDiscovery<D> {
    fn groups(&self) -> Vec<GroupDescriptor> {
        self.inner.groups()
    }

    fn declaring_group(&self, operation: &OperationDescriptor) -> Option<GroupDescriptor> {
        self.inner.declaring_group(operation)
    }

    fn invocable_operations_of(&self, group: &GroupDescriptor) -> Vec<OperationDescriptor> {
        self.operations_of(group).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::HttpMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDiscovery {
        calls: AtomicUsize,
    }

    impl MetadataDiscovery for CountingDiscovery {
        fn groups(&self) -> Vec<GroupDescriptor> {
            vec![GroupDescriptor::new("Orders")]
        }

        fn declaring_group(&self, _operation: &OperationDescriptor) -> Option<GroupDescriptor> {
            Some(GroupDescriptor::new("Orders"))
        }

        fn invocable_operations_of(&self, group: &GroupDescriptor) -> Vec<OperationDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![OperationDescriptor::new(&group.name, "list").with_method(HttpMethod::Get)]
        }
    }

    #[test]
    fn test_operations_computed_once_per_group() {
        let cached = CachedDiscovery::new(CountingDiscovery {
            calls: AtomicUsize::new(0),
        });
        let group = GroupDescriptor::new("Orders");

        for _ in 0..5 {
            assert_eq!(cached.invocable_operations_of(&group).len(), 1);
        }

        assert_eq!(cached.cached_groups(), 1);
        assert_eq!(cached.into_inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_list_is_same_allocation() {
        let cached = CachedDiscovery::new(CountingDiscovery {
            calls: AtomicUsize::new(0),
        });
        let group = GroupDescriptor::new("Orders");

        let a = cached.operations_of(&group);
        let b = cached.operations_of(&group);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
