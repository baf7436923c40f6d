//! Request descriptors for the business calls the consoles issue.
//!
//! Every function returns a [`RequestDescriptor`] to be run through
//! [`SessionClient::execute`](crate::client::SessionClient::execute) under the
//! appropriate role.

use serde::{Deserialize, Serialize};

use crate::error::SessionResult;
use crate::request::{CheckoutIntent, RequestDescriptor};

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Pickup,
    InHouse,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
}

/// Checkout payload for `POST /orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_area_id: Option<i64>,
}

/// Pricing context for `POST /cart/get-cart`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuery {
    pub order_type: OrderType,
    pub payment_method: PaymentMethod,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_area_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderIdBody {
    order_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartBody {
    product_id: i64,
    shop_id: i64,
    quantity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveFromCartBody {
    product_id: i64,
    quantity: u32,
}

#[derive(Serialize)]
struct ToggleBody {
    value: bool,
}

// Orders

pub fn shop_orders() -> SessionResult<RequestDescriptor> {
    RequestDescriptor::get("/orders/shop")
}

pub fn customer_orders() -> SessionResult<RequestDescriptor> {
    RequestDescriptor::get("/orders/customer")
}

/// Advance an order to its next status.
pub fn update_order(order_id: i64) -> SessionResult<RequestDescriptor> {
    RequestDescriptor::post("/orders/update-order")?.with_json(&OrderIdBody { order_id })
}

/// Submit a checkout. Carries the intent's idempotency key, so submitting the
/// same intent twice can create at most one order.
pub fn create_order(
    intent: &CheckoutIntent,
    order: &OrderRequest,
) -> SessionResult<RequestDescriptor> {
    Ok(RequestDescriptor::post("/orders")?
        .with_json(order)?
        .with_idempotency_key(intent.key().clone()))
}

// Shop settings

pub fn shop_settings() -> SessionResult<RequestDescriptor> {
    RequestDescriptor::get("/vendor-shops/shop/settings")
}

pub fn set_online(online: bool) -> SessionResult<RequestDescriptor> {
    toggle("/vendor-shops/shop/set-online", online)
}

pub fn set_delivery(available: bool) -> SessionResult<RequestDescriptor> {
    toggle("/vendor-shops/shop/set-delivery", available)
}

pub fn set_online_payment(available: bool) -> SessionResult<RequestDescriptor> {
    toggle("/vendor-shops/shop/set-online-payment", available)
}

fn toggle(path: &str, value: bool) -> SessionResult<RequestDescriptor> {
    RequestDescriptor::put(path)?.with_json(&ToggleBody { value })
}

// Cart

pub fn get_cart(query: &CartQuery) -> SessionResult<RequestDescriptor> {
    RequestDescriptor::post("/cart/get-cart")?.with_json(query)
}

pub fn add_to_cart(product_id: i64, shop_id: i64, quantity: u32) -> SessionResult<RequestDescriptor> {
    RequestDescriptor::post("/cart/add-to-cart")?.with_json(&AddToCartBody {
        product_id,
        shop_id,
        quantity,
    })
}

pub fn remove_from_cart(product_id: i64, quantity: u32) -> SessionResult<RequestDescriptor> {
    RequestDescriptor::post("/cart/remove-from-cart")?.with_json(&RemoveFromCartBody {
        product_id,
        quantity,
    })
}
