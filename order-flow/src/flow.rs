//! The user flows: store and menu selection, order placement with price verification,
//! and the customer browse flow.
//!
//! A flow never retries. A non-success status aborts the current iteration, the flow
//! logs it and returns `Ok(None)`; `Err` is reserved for requests that could not be sent
//! or bodies that could not be understood.
use std::time::Duration;

use log::{error, info, warn};
use rand::{seq::SliceRandom, Rng};

use crate::{
    error::FlowError,
    metrics::Metrics,
    model::{approved_stores, decode_item, decode_list, MenuItem, OrderResult, Store},
    order::{expected_total, price_integrity_ok, random_quantity, single_item_order},
    transport::{query_string, ApiRequest, Endpoints, Transport},
};

/// What a flow needs besides the transport
#[derive(Debug, Clone, Copy)]
pub struct FlowContext<'a> {
    /// api paths
    pub endpoints: &'a Endpoints,
    /// where observations are recorded
    pub metrics: &'a Metrics,
    /// pause between choosing and ordering
    pub think_time: Duration,
    /// stores requested on a live fallback
    pub store_page_size: u32,
    /// free text attached to every order
    pub note: &'a str,
}

/// An order that was accepted by the server, and how its price compared
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    /// store that received the order
    pub store_id: String,
    /// ordered menu
    pub menu_id: String,
    /// ordered quantity
    pub quantity: u32,
    /// unit price times quantity
    pub expected_total: f64,
    /// what the server charged (0 when not reported)
    pub reported_total: f64,
    /// did the two totals agree?
    pub integrity_ok: bool,
    /// decoded server answer
    pub order: OrderResult,
}

/// A list request either got its items, or was answered with another status than 200
#[derive(Debug, Clone, PartialEq)]
pub enum Listed<T> {
    /// decoded items
    Items(T),
    /// the status received instead
    Status(u16),
}

impl<T> Listed<T> {
    /// the items, if any
    pub fn items(self) -> Option<T> {
        match self {
            Listed::Items(items) => Some(items),
            Listed::Status(_) => None,
        }
    }
}

/// `GET /stores`, every store of the page (approved or not)
pub async fn fetch_stores<T: Transport>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    page: u32,
    size: u32,
) -> Result<Listed<Vec<Store>>, FlowError> {
    let name = "GET /stores";
    let res = api
        .send(ApiRequest::get(ctx.endpoints.stores(page, size), name))
        .await?;
    ctx.metrics.store_list_duration.add(res.elapsed_ms as f64);
    if res.status != 200 {
        warn!("Store list fetch failed: {}", res.status);
        return Ok(Listed::Status(res.status));
    }
    Ok(Listed::Items(decode_list(name, &res.body)?))
}

/// pick a random approved store: from `cached` when it has any, from a live listing otherwise.
/// A live listing with stores records whether any of them is approved.
pub async fn pick_store<T, R>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    cached: &[Store],
    rng: &mut R,
) -> Result<Option<Store>, FlowError>
where
    T: Transport,
    R: Rng + Send,
{
    let cached: Vec<&Store> = cached
        .iter()
        .filter(|s| s.is_approved() && s.identifier().is_some())
        .collect();
    if let Some(store) = cached.choose(rng) {
        return Ok(Some((*store).clone()));
    }

    let Some(stores) = fetch_stores(api, ctx, 0, ctx.store_page_size).await?.items() else {
        return Ok(None);
    };
    if stores.is_empty() {
        warn!("No stores available");
        return Ok(None);
    }
    let open = approved_stores(stores);
    ctx.metrics.store_status_errors.add(open.is_empty());
    if open.is_empty() {
        warn!("No APPROVED stores found.");
    }
    Ok(open.choose(rng).cloned())
}

/// `GET /stores/{id}/menus`, then a random menu of the store
pub async fn pick_menu<T, R>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    store_id: &str,
    rng: &mut R,
) -> Result<Option<MenuItem>, FlowError>
where
    T: Transport,
    R: Rng + Send,
{
    let name = "GET /menus";
    let res = api
        .send(ApiRequest::get(ctx.endpoints.menus(store_id), name))
        .await?;
    ctx.metrics.menu_list_duration.add(res.elapsed_ms as f64);
    if res.status != 200 {
        warn!("Menu list fetch failed for store {store_id}: {}", res.status);
        return Ok(None);
    }
    let menus: Vec<MenuItem> = decode_list(name, &res.body)?;
    let menus: Vec<MenuItem> = menus
        .into_iter()
        .filter(|m| m.identifier().is_some())
        .collect();
    if menus.is_empty() {
        warn!("No menus for store {store_id}");
    }
    Ok(menus.choose(rng).cloned())
}

/// `POST /orders` for `quantity` times `menu`, then compare the server total with the expected one
pub async fn place_order<T: Transport>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    store_id: &str,
    menu: &MenuItem,
    quantity: u32,
) -> Result<Option<OrderOutcome>, FlowError> {
    let name = "POST /orders";
    let menu_id = menu.identifier().unwrap_or_default();
    let payload = single_item_order(store_id, menu_id, quantity, ctx.note.to_string());
    let res = api
        .send(ApiRequest::post(ctx.endpoints.orders(), name, &payload)?)
        .await?;

    let success = res.status == 200 || res.status == 201;
    ctx.metrics.order_create_duration.add(res.elapsed_ms as f64);
    ctx.metrics.order_create_errors.add(!success);
    if !success {
        error!("[Order FAIL] {} - {}", res.status, res.body_excerpt());
        return Ok(None);
    }

    let order: OrderResult = decode_item(name, &res.body)?;
    let expected = expected_total(menu.unit_price(), quantity);
    let reported = order.reported_total();
    let integrity_ok = price_integrity_ok(expected, reported);
    if !integrity_ok {
        error!("[PRICE MISMATCH] expected={expected}, actual={reported}");
    }
    ctx.metrics.price_integrity_errors.add(!integrity_ok);

    info!(
        "[Order OK] id={}, store={store_id}, menu={menu_id}, qty={quantity}",
        order.identifier().unwrap_or("?")
    );
    Ok(Some(OrderOutcome {
        store_id: store_id.to_string(),
        menu_id: menu_id.to_string(),
        quantity,
        expected_total: expected,
        reported_total: reported,
        integrity_ok,
        order,
    }))
}

/// The order verification flow: choose a store and a menu, order a random quantity,
/// and check that the server charged unit price times quantity.
///
/// `cached` are the approved stores loaded at setup, when empty the stores are listed live.
/// Returns `None` when the iteration was aborted (nothing to order from, or a failed request).
pub async fn verify_order<T, R>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    cached: &[Store],
    rng: &mut R,
) -> Result<Option<OrderOutcome>, FlowError>
where
    T: Transport,
    R: Rng + Send,
{
    let Some(store) = pick_store(api, ctx, cached, rng).await? else {
        return Ok(None);
    };
    // pick_store only returns addressable stores
    let store_id = store.identifier().unwrap_or_default().to_string();

    let Some(menu) = pick_menu(api, ctx, &store_id, rng).await? else {
        return Ok(None);
    };
    let quantity = random_quantity(rng);

    if !ctx.think_time.is_zero() {
        tokio::time::sleep(ctx.think_time).await;
    }

    place_order(api, ctx, &store_id, &menu, quantity).await
}

/// Filters of `GET /orders/my`
#[derive(Debug, Clone, PartialEq)]
pub struct MyOrdersQuery {
    /// only orders of this store
    pub store_id: Option<String>,
    /// only orders of this day (`YYYY-MM-DD`)
    pub date: Option<String>,
    /// only orders in this status
    pub status: Option<String>,
    /// page index
    pub page: u32,
    /// page size
    pub size: u32,
    /// sort field
    pub sort_by: String,
    /// ASC or DESC
    pub direction: String,
}

impl Default for MyOrdersQuery {
    fn default() -> Self {
        MyOrdersQuery {
            store_id: None,
            date: None,
            status: None,
            page: 0,
            size: 10,
            sort_by: "createdAt".to_string(),
            direction: "DESC".to_string(),
        }
    }
}

impl MyOrdersQuery {
    /// encoded query string
    pub fn encode(&self) -> String {
        query_string(&[
            ("storeId", self.store_id.clone()),
            ("date", self.date.clone()),
            ("status", self.status.clone()),
            ("page", Some(self.page.to_string())),
            ("size", Some(self.size.to_string())),
            ("sortBy", Some(self.sort_by.clone())),
            ("direction", Some(self.direction.clone())),
        ])
    }
}

/// listing own orders slower than this counts as an error
pub const ORDER_LIST_BUDGET_MS: u64 = 500;

/// `GET /orders/my`. Succeeds on 200 answered within the budget.
pub async fn list_my_orders<T: Transport>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    query: &MyOrdersQuery,
) -> Result<Option<Vec<serde_json::Value>>, FlowError> {
    let name = "GET /orders/my";
    let res = api
        .send(ApiRequest::get(ctx.endpoints.my_orders(&query.encode()), name))
        .await?;
    let success = res.status == 200 && res.elapsed_ms < ORDER_LIST_BUDGET_MS;
    ctx.metrics.order_list_duration.add(res.elapsed_ms as f64);
    ctx.metrics.order_list_errors.add(!success);
    if res.status != 200 {
        warn!("My orders fetch failed: {}", res.status);
        return Ok(None);
    }
    Ok(Some(decode_list(name, &res.body)?))
}

/// What one browse iteration went through
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrowseReport {
    /// stores seen on the first page
    pub stores_listed: Option<usize>,
    /// the order, when one was placed
    pub order: Option<OrderOutcome>,
    /// menus of the browsed store
    pub menus_listed: Option<usize>,
    /// own orders seen
    pub my_orders_listed: Option<usize>,
}

/// The customer browse flow: list stores, place a verified order on a store picked from a
/// live listing, look at the menus of a random cached store, then list own orders.
pub async fn browse<T, R>(
    api: &mut T,
    ctx: &FlowContext<'_>,
    cached: &[Store],
    rng: &mut R,
) -> Result<BrowseReport, FlowError>
where
    T: Transport,
    R: Rng + Send,
{
    let mut report = BrowseReport {
        stores_listed: fetch_stores(api, ctx, 0, 10)
            .await?
            .items()
            .map(|s| s.len()),
        ..Default::default()
    };

    // the order step lists the stores live, the cache only serves the menu browsing
    report.order = verify_order(api, ctx, &[], rng).await?;

    let browsed = cached
        .choose(rng)
        .and_then(|s| s.identifier())
        .map(str::to_string);
    if let Some(store_id) = browsed {
        let name = "GET /menus";
        let res = api
            .send(ApiRequest::get(ctx.endpoints.menus(&store_id), name))
            .await?;
        ctx.metrics.menu_list_duration.add(res.elapsed_ms as f64);
        if res.status == 200 {
            let menus: Vec<MenuItem> = decode_list(name, &res.body)?;
            report.menus_listed = Some(menus.len());
        } else {
            warn!("Menu list fetch failed for store {store_id}: {}", res.status);
        }
    }

    let query = MyOrdersQuery {
        size: 5,
        ..Default::default()
    };
    report.my_orders_listed = list_my_orders(api, ctx, &query).await?.map(|o| o.len());
    Ok(report)
}
