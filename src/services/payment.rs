use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

/// Result of a successful charge creation.
#[derive(Debug, Clone, Serialize)]
pub struct Charge {
    pub charge_id: String,
    /// Redirect-style providers return a checkout URL.
    pub checkout_url: Option<String>,
    /// Client-side providers return a secret instead.
    pub client_secret: Option<String>,
}

/// Interchangeable online payment provider. Cash-on-delivery orders never
/// touch this interface.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge(
        &self,
        order_id: Uuid,
        amount: f64,
        customer_email: &str,
    ) -> Result<Charge, AppError>;

    /// Checks the provider's callback payload. `false` means the provider
    /// rejected the payment, not that the call failed.
    async fn verify(&self, payload: &Value) -> Result<bool, AppError>;

    async fn cancel(&self, charge_id: &str) -> Result<(), AppError>;
}

/// In-memory gateway for tests and local runs.
#[derive(Default)]
pub struct InMemoryPaymentGateway {
    charges: DashMap<String, (Uuid, f64)>,
    fail_on_charge: AtomicBool,
    decline_verify: AtomicBool,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_charge(&self, fail: bool) {
        self.fail_on_charge.store(fail, Ordering::SeqCst);
    }

    pub fn set_decline_verify(&self, decline: bool) {
        self.decline_verify.store(decline, Ordering::SeqCst);
    }

    pub fn charge_count(&self) -> usize {
        self.charges.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_charge(
        &self,
        order_id: Uuid,
        amount: f64,
        _customer_email: &str,
    ) -> Result<Charge, AppError> {
        if self.fail_on_charge.load(Ordering::SeqCst) {
            return Err(AppError::PaymentFailed("charge declined".to_string()));
        }

        let charge_id = format!("ch_{}", Uuid::new_v4().simple());
        self.charges.insert(charge_id.clone(), (order_id, amount));

        Ok(Charge {
            checkout_url: Some(format!("https://pay.local/checkout/{charge_id}")),
            client_secret: None,
            charge_id,
        })
    }

    async fn verify(&self, _payload: &Value) -> Result<bool, AppError> {
        Ok(!self.decline_verify.load(Ordering::SeqCst))
    }

    async fn cancel(&self, charge_id: &str) -> Result<(), AppError> {
        self.charges.remove(charge_id);
        Ok(())
    }
}
