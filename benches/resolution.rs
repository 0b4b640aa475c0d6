use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use endpoint_rbac::{
    EnforcementFilter, GlobalConfig, GroupDescriptor, HttpMethod, OperationDescriptor,
    PolicyResolver, Registrar, RegistrarConfig, RequestIdentity, ResolvedPolicy,
    SecurityAnnotationKind, StaticCatalog,
};

/// Group with one annotated operation and `size - 1` unannotated siblings
fn create_group(size: usize) -> (GroupDescriptor, Vec<OperationDescriptor>) {
    let group = GroupDescriptor::new("Orders");
    let mut operations = vec![OperationDescriptor::new("Orders", "op0")
        .with_method(HttpMethod::Get)
        .with_annotation(SecurityAnnotationKind::roles_allowed(["admin"]))];
    for i in 1..size {
        operations.push(
            OperationDescriptor::new("Orders", format!("op{}", i)).with_method(HttpMethod::Post),
        );
    }
    (group, operations)
}

/// Benchmark resolution of an unannotated operation (full sibling scan)
fn bench_resolve_default_deny(c: &mut Criterion) {
    let sizes = vec![4, 32, 256];

    let mut group = c.benchmark_group("resolve_default_deny");

    for size in sizes {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let (descriptor, operations) = create_group(size);
            let resolver = PolicyResolver::new(GlobalConfig::new(true));
            let target = operations.last().unwrap().clone();

            b.iter(|| {
                let resolved = resolver.resolve(&target, &descriptor, &operations);
                black_box(resolved.unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark registering a whole catalog, sequential vs parallel
fn bench_register_catalog(c: &mut Criterion) {
    let group_counts = vec![16, 128];

    let mut group = c.benchmark_group("register_catalog");

    for count in group_counts {
        let catalog = StaticCatalog::from_groups((0..count).map(|g| {
            let name = format!("Group{}", g);
            let (_, ops) = create_group(8);
            let ops = ops
                .into_iter()
                .map(|op| OperationDescriptor::new(&name, op.name.clone()).with_method(HttpMethod::Get))
                .collect();
            (GroupDescriptor::new(&name), ops)
        }))
        .unwrap();

        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &catalog, |b, catalog| {
            let registrar = Registrar::new(PolicyResolver::new(GlobalConfig::new(true)));
            b.iter(|| black_box(registrar.register(catalog).unwrap().len()));
        });

        group.bench_with_input(BenchmarkId::new("parallel", count), &catalog, |b, catalog| {
            let registrar = Registrar::with_config(
                PolicyResolver::new(GlobalConfig::new(true)),
                RegistrarConfig {
                    workers: 4,
                    ..RegistrarConfig::default()
                },
            );
            b.iter(|| black_box(registrar.register_parallel(catalog).unwrap().len()));
        });
    }

    group.finish();
}

/// Benchmark per-request checks (hot path)
fn bench_enforcement_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforcement_check");

    let roles = EnforcementFilter::new(ResolvedPolicy::RequireRoles(
        ["admin", "ops", "support"].into_iter().collect(),
    ));
    let deny = EnforcementFilter::deny_all();
    let identity = RequestIdentity::authenticated("alice")
        .with_role("user")
        .with_role("support");

    group.bench_function("require_roles", |b| {
        b.iter(|| black_box(roles.check(black_box(&identity))));
    });

    group.bench_function("deny_all", |b| {
        b.iter(|| black_box(deny.check(black_box(&identity))));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve_default_deny,
    bench_register_catalog,
    bench_enforcement_check
);
criterion_main!(benches);
