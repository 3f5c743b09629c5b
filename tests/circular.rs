use jobscope::{DiError, ProviderOptions, Resolver, ServiceCollection};
use std::sync::Arc;
use std::thread;

/// Helper: assert that `result` is a circular dependency error whose path
/// ends with the given type-name suffixes, in order.
fn assert_circular<T>(result: Result<T, DiError>, expected_suffixes: &[&str]) {
    match result {
        Err(DiError::Circular(path)) => {
            assert_eq!(path.len(), expected_suffixes.len(), "wrong path: {:?}", path);
            for (segment, suffix) in path.iter().zip(expected_suffixes) {
                assert!(segment.ends_with(suffix), "path {:?} does not match {:?}", path, expected_suffixes);
            }
        }
        Err(other) => panic!("expected circular dependency error, got {}", other),
        Ok(_) => panic!("expected circular dependency error, got a value"),
    }
}

#[test]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<SelfReferencing, _>(|r| {
        r.get::<SelfReferencing>()?; // Self-reference
        Ok(SelfReferencing)
    })
    .unwrap();

    let sp = sc.build();
    assert_circular(sp.get::<SelfReferencing>(), &["SelfReferencing", "SelfReferencing"]);
}

#[test]
fn test_two_level_circular() {
    struct ServiceA {
        _b: Arc<ServiceB>,
    }
    struct ServiceB {
        _a: Arc<ServiceA>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<ServiceA, _>(|r| Ok(ServiceA { _b: r.get()? }))
        .unwrap();
    sc.add_transient_factory::<ServiceB, _>(|r| Ok(ServiceB { _a: r.get()? }))
        .unwrap();

    let sp = sc.build();
    assert_circular(sp.get::<ServiceA>(), &["ServiceA", "ServiceB", "ServiceA"]);
    assert_circular(sp.get::<ServiceB>(), &["ServiceB", "ServiceA", "ServiceB"]);

    let err = sp.get::<ServiceA>().err().unwrap();
    assert!(err.to_string().starts_with("Circular dependency: "));
}

#[test]
fn test_three_level_circular_across_lifetimes() {
    struct ServiceA {
        _b: Arc<ServiceB>,
    }
    struct ServiceB {
        _c: Arc<ServiceC>,
    }
    struct ServiceC {
        _a: Arc<ServiceA>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<ServiceA, _>(|r| Ok(ServiceA { _b: r.get()? }))
        .unwrap();
    sc.add_transient_factory::<ServiceB, _>(|r| Ok(ServiceB { _c: r.get()? }))
        .unwrap();
    sc.add_scoped_factory::<ServiceC, _>(|r| Ok(ServiceC { _a: r.get()? }))
        .unwrap();

    let sp = sc.build();
    let scope = sp.create_scope().unwrap();
    assert_circular(scope.get::<ServiceA>(), &["ServiceA", "ServiceB", "ServiceC", "ServiceA"]);

    // The failed construction left nothing cached; the cycle is reported again
    assert_circular(scope.get::<ServiceC>(), &["ServiceC", "ServiceA", "ServiceB", "ServiceC"]);
}

#[test]
fn test_circular_through_singleton() {
    struct Registry {
        _audit: Arc<Audit>,
    }
    struct Audit {
        _registry: Arc<Registry>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory::<Registry, _>(|r| Ok(Registry { _audit: r.get()? }))
        .unwrap();
    sc.add_transient_factory::<Audit, _>(|r| Ok(Audit { _registry: r.get()? }))
        .unwrap();

    let sp = sc.build();
    let scope = sp.create_scope().unwrap();
    assert_circular(scope.get::<Audit>(), &["Audit", "Registry", "Audit"]);
}

#[test]
fn test_diamond_is_not_circular() {
    struct Base;
    struct Left {
        _base: Arc<Base>,
    }
    struct Right {
        _base: Arc<Base>,
    }
    struct Top {
        _left: Arc<Left>,
        _right: Arc<Right>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Base, _>(|_| Ok(Base)).unwrap();
    sc.add_transient_factory::<Left, _>(|r| Ok(Left { _base: r.get()? })).unwrap();
    sc.add_transient_factory::<Right, _>(|r| Ok(Right { _base: r.get()? })).unwrap();
    sc.add_transient_factory::<Top, _>(|r| {
        Ok(Top {
            _left: r.get()?,
            _right: r.get()?,
        })
    })
    .unwrap();

    let sp = sc.build();
    assert!(sp.get::<Top>().is_ok());
}

#[test]
fn test_cycle_detection_is_per_call_path() {
    struct ServiceA {
        _b: Arc<ServiceB>,
    }
    struct ServiceB {
        _a: Arc<ServiceA>,
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<ServiceA, _>(|r| Ok(ServiceA { _b: r.get()? }))
        .unwrap();
    sc.add_transient_factory::<ServiceB, _>(|r| Ok(ServiceB { _a: r.get()? }))
        .unwrap();
    sc.add_singleton(1u8).unwrap();

    let sp = sc.build();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sp = sp.clone();
            thread::spawn(move || {
                assert_circular(sp.get::<ServiceA>(), &["ServiceA", "ServiceB", "ServiceA"]);
                // An unrelated resolution on the same thread is unaffected
                assert_eq!(*sp.get_required::<u8>(), 1);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_depth_exceeded() {
    struct L0;
    struct L1;
    struct L2;
    struct L3;

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<L3, _>(|_| Ok(L3)).unwrap();
    sc.add_transient_factory::<L2, _>(|r| {
        r.get::<L3>()?;
        Ok(L2)
    })
    .unwrap();
    sc.add_transient_factory::<L1, _>(|r| {
        r.get::<L2>()?;
        Ok(L1)
    })
    .unwrap();
    sc.add_transient_factory::<L0, _>(|r| {
        r.get::<L1>()?;
        Ok(L0)
    })
    .unwrap();

    let sp = sc.build_with_options(ProviderOptions::default().with_max_depth(3));
    assert!(matches!(sp.get::<L0>(), Err(DiError::DepthExceeded(3))));
    assert!(sp.get::<L1>().is_ok());
}

#[test]
fn test_zero_max_depth_still_resolves_leaf_services() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(5u8).unwrap();

    let mut options = ProviderOptions::default();
    options.max_depth = 0;
    let sp = sc.build_with_options(options);

    assert_eq!(sp.options().max_depth, 1);
    assert_eq!(*sp.get_required::<u8>(), 5);
}
