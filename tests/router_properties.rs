//! Behavioural properties of the routing core, exercised through the public API.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use routekit::middleware::{from_fn, MiddlewarePipeline};
use routekit::routing::PartitionKey;
use routekit::security::{ManualClock, RateWindow};
use routekit::{
    NamedRouteError, Reply, RequestContext, RouteDeclaration, RouteGroup, RouteTable, Router,
    RouterError,
};

mod common;

fn bare_router(declarations: Vec<RouteDeclaration>) -> Router {
    Router::builder().routes(declarations).build().unwrap()
}

#[test]
fn test_static_lookup_independent_of_table_size() {
    let declarations: Vec<_> = (0..10_000)
        .map(|i| RouteDeclaration::get(format!("/static/route/{}", i), "h"))
        .collect();
    let router = bare_router(declarations);

    let time = |path: &str| {
        let start = Instant::now();
        for _ in 0..2_000 {
            router.match_route("GET", path).unwrap();
        }
        start.elapsed()
    };

    // warm up
    time("/static/route/0");
    let first = time("/static/route/0");
    let last = time("/static/route/9999");
    assert!(
        last < first * 5 + Duration::from_millis(5),
        "last={:?} first={:?}",
        last,
        first
    );
}

#[test]
fn test_match_priority_chain() {
    let router = bare_router(vec![
        RouteDeclaration::get("/users/{id}", "users.show"),
        RouteDeclaration::get("/users/new", "users.new"),
        RouteDeclaration::get("/items/{id}", "items.numeric").where_param("id", r"\d+"),
        RouteDeclaration::get("/items/{slug}", "items.slug"),
    ]);

    assert_eq!(router.match_route("GET", "/users/new").unwrap().route.handler(), "users.new");

    let matched = router.match_route("GET", "/items/42").unwrap();
    assert_eq!(matched.route.handler(), "items.numeric");
    assert_eq!(matched.params["id"], "42");

    assert!(matches!(
        router.match_route("POST", "/users/new"),
        Err(RouterError::MethodNotAllowed { .. })
    ));
    assert!(matches!(
        router.match_route("GET", "/totally/unknown"),
        Err(RouterError::RouteNotFound { .. })
    ));
}

#[test]
fn test_snapshot_round_trip_mixed_table() {
    let mut declarations = Vec::new();
    for i in 0..50 {
        declarations.push(RouteDeclaration::get(format!("/s/{}", i), format!("static.{}", i)).named(format!("s{}", i)));
        declarations.push(
            RouteDeclaration::put(format!("/d/{}/{{id}}", i), format!("dynamic.{}", i))
                .where_param("id", "[a-z]+")
                .named(format!("d{}", i)),
        );
    }
    let original = RouteTable::from_declarations(declarations).unwrap();
    let restored = RouteTable::deserialize(&original.serialize().unwrap()).unwrap();

    assert_eq!(restored.len(), original.len());
    for route in original.all() {
        let name = route.name().unwrap();
        assert_eq!(restored.find_by_name(name).unwrap().uri(), route.uri());
        if route.is_static() {
            let found = restored.find_exact(route.method(), route.uri()).unwrap();
            assert_eq!(found.handler(), route.handler());
        }
    }

    let before: Vec<_> = original.find_dynamic(routekit::Method::Put).map(|r| r.uri().to_string()).collect();
    let after: Vec<_> = restored.find_dynamic(routekit::Method::Put).map(|r| r.uri().to_string()).collect();
    assert_eq!(before, after);

    let matched = restored
        .find_dynamic(routekit::Method::Put)
        .find_map(|r| r.matcher().and_then(|m| m.captures("/d/7/abc")))
        .unwrap();
    assert_eq!(matched["id"], "abc");
}

#[test]
fn test_rate_window_sequence_and_reset() {
    let clock = Arc::new(ManualClock::new(10_000));
    let window = RateWindow::with_clock(clock.clone());

    for expected in [2, 1, 0] {
        assert_eq!(window.check("route|ip:1.2.3.4", 3, 60).unwrap().remaining, expected);
    }
    match window.check("route|ip:1.2.3.4", 3, 60) {
        Err(RouterError::RateLimitExceeded { retry_after_secs, .. }) => {
            assert!(retry_after_secs > 0 && retry_after_secs <= 60)
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    clock.advance(61);
    assert_eq!(window.check("route|ip:1.2.3.4", 3, 60).unwrap().remaining, 2);
}

#[test]
fn test_parallel_requests_respect_ceiling() {
    let router = Arc::new(
        Router::builder()
            .route(RouteDeclaration::get("/burst", "burst").with_rate_limit(10, 60, PartitionKey::Ip))
            .handler("burst", vec![], |_args, _ctx| Ok(Reply::text(200, "ok")))
            .build()
            .unwrap(),
    );

    let statuses: Vec<u16> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let router = Arc::clone(&router);
                scope.spawn(move || router.run(RequestContext::new("GET", "/burst")).status)
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(statuses.iter().filter(|&&s| s == 200).count(), 10);
    assert_eq!(statuses.iter().filter(|&&s| s == 429).count(), 90);
}

#[test]
fn test_onion_order_and_short_circuit() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let layer = |label: &'static str, log: Arc<Mutex<Vec<String>>>| {
        Arc::new(from_fn(move |ctx, _param, next| {
            log.lock().unwrap().push(format!("{}-before", label));
            let reply = next.run(ctx)?;
            log.lock().unwrap().push(format!("{}-after", label));
            Ok(reply)
        }))
    };

    let mut pipeline = MiddlewarePipeline::new();
    pipeline.register("a", layer("A", log.clone()));
    pipeline.register("b", layer("B", log.clone()));
    pipeline.register(
        "stop",
        Arc::new(from_fn(|_ctx, _param, _next| {
            Ok(Reply::text(403, "stopped"))
        })),
    );

    let terminal_log = log.clone();
    let terminal = move |_ctx: &mut RequestContext| {
        terminal_log.lock().unwrap().push("T".to_string());
        Ok::<_, RouterError>(Reply::text(200, "T"))
    };

    let mut ctx = RequestContext::new("GET", "/");
    pipeline
        .execute(&["a".to_string(), "b".to_string()], &mut ctx, &terminal)
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["A-before", "B-before", "T", "B-after", "A-after"]
    );

    log.lock().unwrap().clear();
    let reply = pipeline
        .execute(&["a".to_string(), "stop".to_string(), "b".to_string()], &mut ctx, &terminal)
        .unwrap();
    assert_eq!(reply.status, 403);
    assert_eq!(*log.lock().unwrap(), vec!["A-before", "A-after"]);
}

#[test]
fn test_url_generation() {
    let router = Router::builder()
        .group(
            RouteGroup::new("/users")
                .name_prefix("users.")
                .route(RouteDeclaration::get("/{id}", "users.show").named("show")),
        )
        .build()
        .unwrap();

    assert_eq!(router.url("users.show", [("id", 123)]).unwrap(), "/users/123");
    assert_eq!(
        router.url("users.show", [("id", "5"), ("tab", "posts")]).unwrap(),
        "/users/5?tab=posts"
    );
    assert!(matches!(
        router.url("users.show", Vec::<(&str, &str)>::new()),
        Err(NamedRouteError::MissingParameter { .. })
    ));
}

#[test]
fn test_config_driven_router() {
    let config = common::sample_config();
    let router = Router::builder().configure(&config).build().unwrap();

    assert_eq!(router.table().len(), 5);
    assert_eq!(router.url("users.show", [("id", 9)]).unwrap(), "/users/9");
    assert!(matches!(
        router.url("users.show", [("id", "nine")]),
        Err(NamedRouteError::ConstraintViolation { .. })
    ));
}
