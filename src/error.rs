use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::ShopOrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("cart line cannot be attributed to any shop")]
    MissingShopReference,

    #[error("delivery address needs non-empty text and both coordinates")]
    InvalidAddress,

    #[error("rating score must be between 1 and 5")]
    InvalidRatingScore,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("acting user does not own this shop order")]
    NotOwner,

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("shop {0} not found")]
    ShopNotFound(Uuid),

    #[error("item {0} not found")]
    ItemNotFound(Uuid),

    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("order has no shop order for shop {0}")]
    ShopOrderNotFound(Uuid),

    #[error("delivery assignment not found: {0}")]
    AssignmentNotFound(Uuid),

    #[error("item is not part of this order")]
    ItemNotInOrder,

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ShopOrderStatus,
        to: ShopOrderStatus,
    },

    #[error("assignment already claimed")]
    AlreadyAssigned,

    #[error("courier is not in the broadcast list")]
    CourierNotEligible,

    #[error("shop order has no assignment to complete")]
    NoAssignmentToComplete,

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::EmptyCart
            | AppError::MissingShopReference
            | AppError::InvalidAddress
            | AppError::InvalidRatingScore
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,

            AppError::Unauthorized | AppError::NotOwner => StatusCode::FORBIDDEN,

            AppError::UserNotFound(_)
            | AppError::ShopNotFound(_)
            | AppError::ItemNotFound(_)
            | AppError::OrderNotFound(_)
            | AppError::ShopOrderNotFound(_)
            | AppError::AssignmentNotFound(_)
            | AppError::ItemNotInOrder => StatusCode::NOT_FOUND,

            AppError::EmailTaken
            | AppError::InvalidTransition { .. }
            | AppError::AlreadyAssigned
            | AppError::CourierNotEligible
            | AppError::NoAssignmentToComplete => StatusCode::CONFLICT,

            AppError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,

            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
