//! Order tickets and the gateway's replies to order submission.

use serde::{Deserialize, Serialize};

use crate::models::contract::InstrumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MKT")]
    Market,
    #[serde(rename = "LMT")]
    Limit,
    #[serde(rename = "STP")]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    #[default]
    Day,
    Gtc,
}

/// One order as posted to `/iserver/account/{account}/orders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub conid: InstrumentId,
    #[serde(rename = "orderType")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub quantity: f64,
    pub tif: TimeInForce,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "auxPrice", skip_serializing_if = "Option::is_none")]
    pub aux_price: Option<f64>,
}

impl OrderTicket {
    pub fn limit(conid: InstrumentId, side: OrderSide, quantity: f64, price: f64) -> Self {
        Self {
            conid,
            order_type: OrderType::Limit,
            side,
            quantity,
            tif: TimeInForce::Day,
            price: Some(price),
            aux_price: None,
        }
    }
}

/// Request body wrapper expected by the orders endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct OrdersRequest<'a> {
    pub orders: &'a [OrderTicket],
}

/// One element of the orders endpoint's reply.
///
/// The gateway either acknowledges the order (`order_id`, `order_status`) or
/// asks for a confirmation (`id`, `message`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderReply {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<Vec<String>>,
}
