//! Entities exchanged with the ordering api.
//!
//! The api is not consistent about field names (`id` or `storeId`, `status` or `storeStatus`...)
//! and about how lists are enveloped, so every entity keeps both spellings and exposes
//! an accessor that picks the first one present.
use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// status of a store open for ordering
pub const APPROVED: &str = "APPROVED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A store, as returned by the store listing
pub struct Store {
    /// identifier
    pub id: Option<String>,
    /// identifier, older spelling
    pub store_id: Option<String>,
    /// display name
    pub name: Option<String>,
    /// approval status
    pub status: Option<String>,
    /// approval status, older spelling
    pub store_status: Option<String>,
}

impl Store {
    /// identifier of the store, whatever field carries it
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.store_id.as_deref())
    }
    /// approval status of the store, whatever field carries it
    pub fn approval(&self) -> Option<&str> {
        self.status.as_deref().or(self.store_status.as_deref())
    }
    /// is it open for ordering?
    pub fn is_approved(&self) -> bool {
        self.approval() == Some(APPROVED)
    }
    /// name used in logs and notes, falls back to the id
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.identifier())
            .unwrap_or("<unnamed>")
    }
}

/// keeps only the stores that can receive orders (and that we can address)
pub fn approved_stores(stores: Vec<Store>) -> Vec<Store> {
    stores
        .into_iter()
        .filter(|s| s.is_approved() && s.identifier().is_some())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A menu item of a store
pub struct MenuItem {
    /// identifier
    pub id: Option<String>,
    /// identifier, older spelling
    pub menu_id: Option<String>,
    /// display name
    pub name: Option<String>,
    /// unit price
    pub price: Option<f64>,
}

impl MenuItem {
    /// identifier of the menu, whatever field carries it
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.menu_id.as_deref())
    }
    /// unit price, a missing price counts as 0
    pub fn unit_price(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One line of an order
pub struct OrderLine {
    /// ordered menu
    pub menu_id: String,
    /// how many, always >= 1
    pub quantity: u32,
    /// chosen options, the load test never picks any
    pub options: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Body of `POST /orders`
pub struct OrderRequest {
    /// store receiving the order
    pub store_id: String,
    /// ordered lines
    pub order_items: Vec<OrderLine>,
    /// local time, without offset
    pub pickup_time: String,
    /// does the customer want disposables?
    pub need_disposables: bool,
    /// free text note
    pub request: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// What the server answers after an order creation
pub struct OrderResult {
    /// identifier
    pub id: Option<String>,
    /// identifier, older spelling
    pub order_id: Option<String>,
    /// total price
    pub total_price: Option<f64>,
    /// total price, older spelling
    pub total_amount: Option<f64>,
}

impl OrderResult {
    /// identifier of the order, whatever field carries it
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.order_id.as_deref())
    }
    /// total reported by the server, 0 when absent
    pub fn reported_total(&self) -> f64 {
        self.total_price.or(self.total_amount).unwrap_or(0.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
/// a list, or a spring page containing the list
enum Listing<T> {
    Items(Vec<T>),
    Page { content: Vec<T> },
}

#[derive(Deserialize)]
#[serde(untagged)]
/// every list envelope the api has been seen answering with
enum ListBody<T> {
    Wrapped { result: Listing<T> },
    Page { content: Vec<T> },
    Bare(Vec<T>),
}

#[derive(Deserialize)]
#[serde(untagged)]
/// a single object, optionally under `result`
enum ItemBody<T> {
    Wrapped { result: T },
    Bare(T),
}

/// decode a list body in any of the known envelopes
pub fn decode_list<T>(endpoint: &str, body: &str) -> Result<Vec<T>, FlowError>
where
    T: for<'de> Deserialize<'de>,
{
    let parsed: ListBody<T> = serde_json::from_str(body).map_err(|source| FlowError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })?;
    Ok(match parsed {
        ListBody::Wrapped {
            result: Listing::Items(items),
        } => items,
        ListBody::Wrapped {
            result: Listing::Page { content },
        } => content,
        ListBody::Page { content } => content,
        ListBody::Bare(items) => items,
    })
}

/// decode a single object, unwrapping `result` when present
pub fn decode_item<T>(endpoint: &str, body: &str) -> Result<T, FlowError>
where
    T: for<'de> Deserialize<'de>,
{
    let parsed: ItemBody<T> = serde_json::from_str(body).map_err(|source| FlowError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })?;
    Ok(match parsed {
        ItemBody::Wrapped { result } => result,
        ItemBody::Bare(item) => item,
    })
}
