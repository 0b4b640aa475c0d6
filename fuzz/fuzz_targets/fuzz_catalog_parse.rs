#![no_main]
use endpoint_rbac::{GlobalConfig, PolicyResolver, Registrar, RegistrarConfig, FailurePolicy, StaticCatalog};
use libfuzzer_sys::fuzz_target;

// Arbitrary catalog documents must either be rejected or register without panicking

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let catalog = match StaticCatalog::from_toml_str(text).or_else(|_| StaticCatalog::from_json_str(text)) {
        Ok(c) => c,
        Err(_) => return,
    };

    let registrar = Registrar::with_config(
        PolicyResolver::new(GlobalConfig::new(true)),
        RegistrarConfig {
            failure_policy: FailurePolicy::RejectOperation,
            workers: 2,
        },
    );

    let sequential = registrar.register(&catalog).expect("reject mode never aborts");
    let parallel = registrar.register_parallel(&catalog).expect("reject mode never aborts");
    assert_eq!(sequential.len(), parallel.len());
});
