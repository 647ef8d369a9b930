//! # Pasarela de pago
//!
//! El núcleo de reservas solo conoce el trait [`PaymentGateway`]: crear una sesión de
//! pago alojada y consultar después su estado. [`stripe::StripeGateway`] es la
//! implementación de producción.

pub mod stripe;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::db::PaymentProvider;

/// Datos para abrir una sesión de pago.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Importe en unidades mínimas de la moneda (céntimos).
    pub amount_cents: i64,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    pub booking_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Estado de una sesión según la pasarela, que es la fuente de verdad del importe.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub payment_status: String,
    pub amount_total_cents: Option<i64>,
    pub payment_intent_id: Option<String>,
    pub booking_id: Option<String>,
}

impl SessionStatus {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Pasarela de pago inaccesible: {0}")]
    Unreachable(String),

    #[error("La pasarela rechazó la petición (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Respuesta inesperada de la pasarela: {0}")]
    UnexpectedResponse(String),

    #[error("Pasarela de pago sin configurar")]
    NotConfigured,

    #[error("Identificador de sesión inválido: '{0}'")]
    InvalidSessionId(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;

    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError>;
}

/// Convierte un importe a céntimos, redondeando a 2 decimales (mitad hacia fuera).
/// `None` si no cabe en un `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Identificador de sesión de Checkout: `cs_` seguido de letras, dígitos o `_`.
pub fn is_checkout_session_id(session_id: &str) -> bool {
    session_id
        .strip_prefix("cs_")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

#[cfg(test)]
pub mod fake {
    //! Pasarela en memoria para los tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct FakeState {
        sessions: HashMap<String, (CheckoutRequest, SessionStatus)>,
        next_id: u32,
        unreachable: bool,
        status_calls: u32,
    }

    #[derive(Debug, Default)]
    pub struct FakeGateway {
        state: Mutex<FakeState>,
    }

    impl FakeGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_unreachable(&self, unreachable: bool) {
            self.state.lock().unwrap().unreachable = unreachable;
        }

        /// Marca la sesión como pagada por `amount_cents`.
        pub fn complete(&self, session_id: &str, amount_cents: i64) {
            let mut state = self.state.lock().unwrap();
            if let Some((_, status)) = state.sessions.get_mut(session_id) {
                status.payment_status = "paid".to_string();
                status.amount_total_cents = Some(amount_cents);
                status.payment_intent_id = Some(format!("pi_{}", session_id));
            }
        }

        /// Borra el `booking_id` de los metadatos de la sesión.
        pub fn strip_metadata(&self, session_id: &str) {
            let mut state = self.state.lock().unwrap();
            if let Some((_, status)) = state.sessions.get_mut(session_id) {
                status.booking_id = None;
            }
        }

        pub fn request(&self, session_id: &str) -> Option<CheckoutRequest> {
            let state = self.state.lock().unwrap();
            state.sessions.get(session_id).map(|(request, _)| request.clone())
        }

        pub fn status_calls(&self) -> u32 {
            self.state.lock().unwrap().status_calls
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        fn provider(&self) -> PaymentProvider {
            PaymentProvider::Stripe
        }

        async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
            let mut state = self.state.lock().unwrap();
            if state.unreachable {
                return Err(PaymentError::Unreachable("connection refused".to_string()));
            }
            state.next_id += 1;
            let id = format!("cs_test_{:04}", state.next_id);
            let status = SessionStatus {
                payment_status: "unpaid".to_string(),
                amount_total_cents: Some(request.amount_cents),
                payment_intent_id: None,
                booking_id: Some(request.booking_id.clone()),
            };
            state.sessions.insert(id.clone(), (request.clone(), status));
            Ok(CheckoutSession {
                url: format!("https://checkout.test/pay/{}", id),
                id,
            })
        }

        async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
            let mut state = self.state.lock().unwrap();
            state.status_calls += 1;
            if state.unreachable {
                return Err(PaymentError::Unreachable("connection refused".to_string()));
            }
            state
                .sessions
                .get(session_id)
                .map(|(_, status)| status.clone())
                .ok_or_else(|| PaymentError::Rejected {
                    status: 404,
                    message: format!("No such checkout.session: {}", session_id),
                })
        }
    }
}
