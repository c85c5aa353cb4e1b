//! This module contains the flow tests for this crate.
//! Other than that contains FakeApi, an in-memory ordering api answering like the real one.
//!
use std::{
    collections::HashMap,
    sync::{Mutex, Once},
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::{rngs::StdRng, SeedableRng};
use serde_json::{json, Value};

use crate::prelude::*;

/// In-memory ordering api. Every request is recorded.
pub struct FakeApi {
    /// status and body of `GET /stores`
    pub stores: (u16, Value),
    /// status and body of `GET /stores/{id}/menus`, by store id (missing store: 200 and `[]`)
    pub menus: HashMap<String, (u16, Value)>,
    /// status of `POST /orders`
    pub order_status: u16,
    /// total charged by the server, None charges the right one
    pub charged: Option<f64>,
    /// status, body and duration of `GET /orders/my`
    pub my_orders: (u16, Value, u64),
    /// status and body of the login
    pub login: (u16, Value),
    /// every request received, in order
    pub requests: Vec<ApiRequest>,
}

impl Default for FakeApi {
    fn default() -> Self {
        FakeApi {
            stores: (200, json!({ "result": [] })),
            menus: HashMap::new(),
            order_status: 201,
            charged: None,
            my_orders: (200, json!({ "content": [] }), 30),
            login: (200, json!({ "result": { "accessToken": "token-1" } })),
            requests: Vec::new(),
        }
    }
}

impl FakeApi {
    /// one approved store `s1` with a single menu `m1` at `price`
    pub fn with_menu(price: f64) -> Self {
        let mut api = FakeApi {
            stores: (
                200,
                json!({ "result": [{ "id": "s1", "name": "Bunsik", "status": "APPROVED" }] }),
            ),
            ..Default::default()
        };
        api.menus.insert(
            "s1".into(),
            (200, json!({ "result": [{ "id": "m1", "price": price }] })),
        );
        api
    }

    fn price_of(&self, store_id: &str, menu_id: &str) -> f64 {
        self.menus
            .get(store_id)
            .and_then(|(_, body)| decode_list::<MenuItem>("", &body.to_string()).ok())
            .and_then(|menus| {
                menus
                    .into_iter()
                    .find(|m| m.identifier() == Some(menu_id))
            })
            .map(|m| m.unit_price())
            .unwrap_or(0.0)
    }

    /// paths of the received requests, in order
    pub fn paths(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.path.clone()).collect()
    }

    /// every order posted
    pub fn posted_orders(&self) -> Vec<OrderRequest> {
        self.requests
            .iter()
            .filter(|r| r.method == Method::Post && r.path.ends_with("/orders"))
            .filter_map(|r| r.body.clone())
            .map(|b| serde_json::from_value(b).unwrap())
            .collect()
    }
}

fn reply(status: u16, body: &Value, elapsed_ms: u64) -> Exchange {
    Exchange {
        status,
        body: body.to_string(),
        elapsed_ms,
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&mut self, request: ApiRequest) -> Result<Exchange, DynError> {
        self.requests.push(request.clone());
        let path = request.path.split('?').next().unwrap_or_default().to_string();
        let segments: Vec<&str> = path.trim_start_matches("/api/").split('/').collect();

        let exchange = match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "login"]) => reply(self.login.0, &self.login.1, 5),
            (Method::Get, ["stores"]) => reply(self.stores.0, &self.stores.1, 12),
            (Method::Get, ["stores", id, "menus"]) => match self.menus.get(*id) {
                Some((status, body)) => reply(*status, body, 8),
                None => reply(200, &json!([]), 8),
            },
            (Method::Get, ["orders", "my"]) => {
                reply(self.my_orders.0, &self.my_orders.1, self.my_orders.2)
            }
            (Method::Post, ["orders"]) => {
                let order: OrderRequest =
                    serde_json::from_value(request.body.clone().ok_or("missing body")?)?;
                if self.order_status != 200 && self.order_status != 201 {
                    reply(self.order_status, &json!({ "message": "sold out" }), 90)
                } else {
                    let line = &order.order_items[0];
                    let total = self.charged.unwrap_or_else(|| {
                        self.price_of(&order.store_id, &line.menu_id) * f64::from(line.quantity)
                    });
                    reply(
                        self.order_status,
                        &json!({ "result": { "orderId": "o-1", "totalPrice": total } }),
                        40,
                    )
                }
            }
            _ => reply(404, &json!({}), 1),
        };
        Ok(exchange)
    }
}

/// keeps every log line emitted by the crate, shared by all the tests of the process
struct CapturedLog;

static CAPTURED: Mutex<Vec<String>> = Mutex::new(Vec::new());
static CAPTURE: Once = Once::new();

impl log::Log for CapturedLog {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }
    fn log(&self, record: &log::Record) {
        let line = format!("{} {}", record.level(), record.args());
        CAPTURED.lock().unwrap_or_else(|e| e.into_inner()).push(line);
    }
    fn flush(&self) {}
}

fn capture_log() {
    static LOGGER: CapturedLog = CapturedLog;
    CAPTURE.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
}

fn logged(line: &str) -> bool {
    CAPTURED
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .any(|l| l == line)
}

/// a transport that can't send anything
struct BrokenTransport;

#[async_trait]
impl Transport for BrokenTransport {
    async fn send(&mut self, _request: ApiRequest) -> Result<Exchange, DynError> {
        Err("connection pool closed".into())
    }
}

fn ctx<'a>(endpoints: &'a Endpoints, metrics: &'a Metrics) -> FlowContext<'a> {
    FlowContext {
        endpoints,
        metrics,
        think_time: std::time::Duration::ZERO,
        store_page_size: 50,
        note: "smoke test order",
    }
}

fn store(id: &str, status: &str) -> Store {
    Store {
        id: Some(id.into()),
        status: Some(status.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn order_at_expected_price_passes() {
    let mut api = FakeApi::with_menu(10.0);
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let menu = MenuItem {
        id: Some("m1".into()),
        price: Some(10.0),
        ..Default::default()
    };

    let outcome = place_order(&mut api, &ctx(&endpoints, &metrics), "s1", &menu, 2)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome.expected_total, 20.0);
    assert_eq!(outcome.reported_total, 20.0);
    assert!(outcome.integrity_ok);
    assert_eq!(outcome.order.identifier(), Some("o-1"));
    assert_eq!(metrics.price_integrity_errors.counts(), (0, 1));
    assert_eq!(metrics.order_create_errors.counts(), (0, 1));
    assert_eq!(metrics.order_create_duration.summary().max(), 40.0);

    let posted = api.posted_orders();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].store_id, "s1");
    assert_eq!(posted[0].order_items[0].quantity, 2);
    assert_eq!(posted[0].request, "smoke test order");
    assert!(NaiveDateTime::parse_from_str(&posted[0].pickup_time, "%Y-%m-%dT%H:%M:%S").is_ok());
}

#[tokio::test]
async fn order_at_wrong_price_is_flagged() {
    capture_log();
    let mut api = FakeApi {
        charged: Some(18.0),
        ..FakeApi::with_menu(10.0)
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let menu = MenuItem {
        id: Some("m1".into()),
        price: Some(10.0),
        ..Default::default()
    };

    let outcome = place_order(&mut api, &ctx(&endpoints, &metrics), "s1", &menu, 2)
        .await
        .unwrap()
        .unwrap();

    assert!(!outcome.integrity_ok);
    assert_eq!(outcome.reported_total, 18.0);
    // a mismatch does not make the order fail
    assert_eq!(metrics.order_create_errors.counts(), (0, 1));
    assert_eq!(metrics.price_integrity_errors.counts(), (1, 1));
    assert!(logged("ERROR [PRICE MISMATCH] expected=20, actual=18"));
}

#[tokio::test]
async fn free_menu_can_not_be_compared() {
    let mut api = FakeApi {
        charged: Some(3000.0),
        ..FakeApi::with_menu(0.0)
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(1),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(outcome.integrity_ok);
    assert_eq!(metrics.price_integrity_errors.counts(), (0, 1));
}

#[tokio::test]
async fn no_store_anywhere_means_no_order() {
    let mut api = FakeApi::default();
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(1),
    )
    .await
    .unwrap();

    assert_eq!(outcome, None);
    assert_eq!(api.paths(), vec!["/api/stores?page=0&size=50".to_string()]);
    assert!(api.posted_orders().is_empty());
    // an empty listing says nothing about store approval
    assert_eq!(metrics.store_status_errors.counts(), (0, 0));
    assert_eq!(metrics.order_create_errors.counts(), (0, 0));
}

#[tokio::test]
async fn listing_without_approved_store_is_a_status_error() {
    let mut api = FakeApi {
        stores: (
            200,
            json!({ "result": [
                { "id": "s1", "status": "PENDING" },
                { "id": "s2", "storeStatus": "REJECTED" }
            ] }),
        ),
        ..Default::default()
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(2),
    )
    .await
    .unwrap();

    assert_eq!(outcome, None);
    assert!(api.posted_orders().is_empty());
    assert_eq!(metrics.store_status_errors.counts(), (1, 1));

    api.stores.1 = json!([{ "id": "s1", "status": "APPROVED" }]);
    api.menus
        .insert("s1".into(), (200, json!([{ "id": "m1", "price": 1000.0 }])));
    verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(2),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(metrics.store_status_errors.counts(), (1, 2));
}

#[tokio::test]
async fn cached_stores_skip_the_listing() {
    let mut api = FakeApi::with_menu(5000.0);
    api.stores = (500, json!({}));
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let cached = vec![store("s1", APPROVED)];

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &cached,
        &mut StdRng::seed_from_u64(3),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome.store_id, "s1");
    assert!(outcome.integrity_ok);
    assert_eq!(outcome.expected_total, 5000.0 * outcome.quantity as f64);
    assert!(!api.paths().iter().any(|p| p.contains("/stores?")));
    assert_eq!(metrics.store_list_duration.summary().count(), 0);
}

#[tokio::test]
async fn only_approved_stores_are_selected() {
    let cached = vec![
        store("pending", "PENDING"),
        store("s1", APPROVED),
        store("closed", "REJECTED"),
    ];
    let listing = json!([
        { "id": "pending", "status": "PENDING" },
        { "storeId": "s1", "storeStatus": "APPROVED" },
        { "id": "s2", "status": "APPROVED" },
        { "id": "closed", "status": "REJECTED" },
        { "status": "APPROVED" }
    ]);
    let endpoints = Endpoints::default();
    for seed in 0..40 {
        let metrics = Metrics::default();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut api = FakeApi::default();
        let picked = pick_store(&mut api, &ctx(&endpoints, &metrics), &cached, &mut rng)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.identifier(), Some("s1"));

        api.stores = (200, listing.clone());
        let picked = pick_store(&mut api, &ctx(&endpoints, &metrics), &[], &mut rng)
            .await
            .unwrap()
            .unwrap();
        assert!(picked.is_approved());
        assert!(matches!(picked.identifier(), Some("s1") | Some("s2")));
    }
}

#[tokio::test]
async fn failed_store_listing_aborts() {
    let mut api = FakeApi {
        stores: (503, json!({ "message": "unavailable" })),
        ..Default::default()
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(1),
    )
    .await
    .unwrap();

    assert_eq!(outcome, None);
    assert_eq!(metrics.store_list_duration.summary().count(), 1);
    // the status of the stores was never seen
    assert_eq!(metrics.store_status_errors.counts(), (0, 0));
}

#[tokio::test]
async fn failed_or_empty_menu_aborts() {
    let endpoints = Endpoints::default();
    let cached = vec![store("s1", APPROVED)];
    for menus in [(500, json!({})), (200, json!({ "result": [] }))] {
        let mut api = FakeApi::default();
        api.menus.insert("s1".into(), menus);
        let metrics = Metrics::default();

        let outcome = verify_order(
            &mut api,
            &ctx(&endpoints, &metrics),
            &cached,
            &mut StdRng::seed_from_u64(1),
        )
        .await
        .unwrap();

        assert_eq!(outcome, None);
        assert!(api.posted_orders().is_empty());
        assert_eq!(metrics.menu_list_duration.summary().count(), 1);
    }
}

#[tokio::test]
async fn rejected_order_is_an_error_sample() {
    let mut api = FakeApi {
        order_status: 409,
        ..FakeApi::with_menu(10.0)
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(9),
    )
    .await
    .unwrap();

    assert_eq!(outcome, None);
    assert_eq!(metrics.order_create_errors.counts(), (1, 1));
    assert_eq!(metrics.order_create_duration.summary().count(), 1);
    assert_eq!(metrics.price_integrity_errors.counts(), (0, 0));
}

#[tokio::test]
async fn ok_status_also_counts_as_created() {
    let mut api = FakeApi {
        order_status: 200,
        ..FakeApi::with_menu(7.5)
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let outcome = verify_order(
        &mut api,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(2),
    )
    .await
    .unwrap();

    assert!(outcome.is_some_and(|o| o.integrity_ok));
    assert_eq!(metrics.order_create_errors.counts(), (0, 1));
}

#[tokio::test]
async fn transport_failure_is_an_error() {
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let err = verify_order(
        &mut BrokenTransport,
        &ctx(&endpoints, &metrics),
        &[],
        &mut StdRng::seed_from_u64(1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, FlowError::Transport(_)));
}

#[tokio::test]
async fn browse_walks_every_page() {
    let mut api = FakeApi::with_menu(2500.0);
    api.my_orders = (200, json!({ "result": { "content": [{ "id": "o-0" }] } }), 30);
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let cached = vec![store("s1", APPROVED)];

    let report = browse(
        &mut api,
        &ctx(&endpoints, &metrics),
        &cached,
        &mut StdRng::seed_from_u64(4),
    )
    .await
    .unwrap();

    assert_eq!(report.stores_listed, Some(1));
    assert!(report.order.is_some());
    assert_eq!(report.menus_listed, Some(1));
    assert_eq!(report.my_orders_listed, Some(1));
    assert_eq!(
        api.paths().last().map(String::as_str),
        Some("/api/orders/my?page=0&size=5&sortBy=createdAt&direction=DESC")
    );
    assert_eq!(metrics.order_list_errors.counts(), (0, 1));
    assert_eq!(metrics.menu_list_duration.summary().count(), 2);
    assert_eq!(metrics.store_status_errors.counts(), (0, 1));
}

#[tokio::test]
async fn browse_orders_from_a_live_listing() {
    let mut api = FakeApi::with_menu(2500.0);
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());
    let cached = vec![store("s1", APPROVED)];

    browse(
        &mut api,
        &ctx(&endpoints, &metrics),
        &cached,
        &mut StdRng::seed_from_u64(9),
    )
    .await
    .unwrap();

    assert_eq!(
        api.paths(),
        vec![
            "/api/stores?page=0&size=10",
            "/api/stores?page=0&size=50",
            "/api/stores/s1/menus",
            "/api/orders",
            "/api/stores/s1/menus",
            "/api/orders/my?page=0&size=5&sortBy=createdAt&direction=DESC",
        ]
    );
    assert_eq!(metrics.store_list_duration.summary().count(), 2);
}

#[tokio::test]
async fn slow_order_listing_counts_as_error() {
    let mut api = FakeApi {
        my_orders: (200, json!([]), 800),
        ..Default::default()
    };
    let (endpoints, metrics) = (Endpoints::default(), Metrics::default());

    let listed = list_my_orders(
        &mut api,
        &ctx(&endpoints, &metrics),
        &MyOrdersQuery::default(),
    )
    .await
    .unwrap();

    assert_eq!(listed, Some(vec![]));
    assert_eq!(metrics.order_list_errors.counts(), (1, 1));
    assert_eq!(metrics.order_list_duration.summary().max(), 800.0);
}

#[test]
fn my_orders_query_encoding() {
    let q = MyOrdersQuery {
        store_id: Some("s1".into()),
        status: Some("PENDING".into()),
        ..Default::default()
    };
    assert_eq!(
        q.encode(),
        "storeId=s1&status=PENDING&page=0&size=10&sortBy=createdAt&direction=DESC"
    );
}

#[tokio::test]
async fn login_reads_wrapped_or_bare_token() {
    let settings = Settings::default();
    for body in [
        json!({ "result": { "accessToken": "token-1" } }),
        json!({ "accessToken": "token-1", "refreshToken": "r" }),
    ] {
        let mut api = FakeApi {
            login: (200, body),
            ..Default::default()
        };
        let session = login(&mut api, &settings).await.unwrap();
        assert_eq!(session.access_token, "token-1");
        let sent = api.requests[0].body.clone().unwrap();
        assert_eq!(sent, json!({ "username": "customer", "password": "customer" }));
    }
}

#[tokio::test]
async fn login_failures_are_fatal() {
    let settings = Settings::default();

    let mut api = FakeApi {
        login: (401, json!({ "message": "bad credentials" })),
        ..Default::default()
    };
    let err = login(&mut api, &settings).await.unwrap_err();
    assert!(matches!(err, SetupError::LoginFailed { status: 401, .. }));

    let mut api = FakeApi {
        login: (200, json!({ "result": { "accessToken": "" } })),
        ..Default::default()
    };
    let err = login(&mut api, &settings).await.unwrap_err();
    assert!(matches!(err, SetupError::MissingToken));
}

#[tokio::test]
async fn prefetch_keeps_approved_stores() {
    let settings = Settings::default();
    let metrics = Metrics::default();
    let mut api = FakeApi {
        stores: (
            200,
            json!({ "content": [
                { "id": "s1", "status": "APPROVED" },
                { "id": "s2", "status": "PENDING" }
            ] }),
        ),
        ..Default::default()
    };
    let stores = prefetch_stores(&mut api, &settings, &metrics).await.unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].identifier(), Some("s1"));

    api.stores = (500, json!({}));
    let err = prefetch_stores(&mut api, &settings, &metrics)
        .await
        .unwrap_err();
    assert!(matches!(err, SetupError::StoreFetch(500)));
}

#[test]
fn http_transport_keeps_the_session() {
    let mut api = HttpTransport::new("http://localhost:8080/");
    assert!(api.session().is_none());
    api.authenticate(Session {
        access_token: "t".into(),
    });
    assert_eq!(api.session().map(|s| s.access_token.as_str()), Some("t"));
}

#[tokio::test]
async fn unreachable_server_answers_with_status_zero() {
    let unreachable = "http://127.0.0.1:9";
    let endpoints = Endpoints::default();
    let metrics = Metrics::default();

    let mut api = HttpTransport::new(unreachable);
    let res = api
        .send(ApiRequest::get(endpoints.stores(0, 50), "GET /stores"))
        .await
        .unwrap();
    assert_eq!(res.status, 0);
    assert!(!res.body.is_empty());

    let menu = MenuItem {
        id: Some("m1".into()),
        price: Some(10.0),
        ..Default::default()
    };
    let outcome = place_order(&mut api, &ctx(&endpoints, &metrics), "s1", &menu, 1)
        .await
        .unwrap();
    assert_eq!(outcome, None);
    assert_eq!(metrics.order_create_errors.counts(), (1, 1));

    let settings = Settings {
        base_url: unreachable.into(),
        ..Default::default()
    };
    let err = setup(&settings, &metrics).await.unwrap_err();
    assert!(matches!(err, SetupError::LoginFailed { status: 0, .. }));
}
