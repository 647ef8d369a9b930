//! Stripe Checkout sobre `reqwest`.
//!
//! Las peticiones tienen un timeout acotado (`PAYMENT_TIMEOUT_SECS`); un timeout o un
//! fallo de conexión se reporta como [`PaymentError::Unreachable`], distinto de un
//! pago rechazado o pendiente.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{is_checkout_session_id, CheckoutRequest, CheckoutSession, PaymentError, PaymentGateway, SessionStatus};
use crate::config::PaymentConfig;
use crate::db::PaymentProvider;

#[derive(Debug, Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::UnexpectedResponse(format!("cliente HTTP: {}", e)))?;

        Ok(StripeGateway {
            client,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            currency: config.currency.clone(),
        })
    }

    fn ensure_configured(&self) -> Result<(), PaymentError> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        Ok(())
    }

    /// Parámetros `application/x-www-form-urlencoded` de una sesión de pago único.
    fn checkout_form(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("line_items[0][price_data][currency]".to_string(), self.currency.clone()),
            ("line_items[0][price_data][unit_amount]".to_string(), request.amount_cents.to_string()),
            ("line_items[0][price_data][product_data][name]".to_string(), request.description.clone()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.booking_id.clone()),
            ("metadata[booking_id]".to_string(), request.booking_id.clone()),
        ]
    }

    async fn read_session(response: reqwest::Response) -> Result<StripeSession, PaymentError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.to_string());
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<StripeSession>()
            .await
            .map_err(|e| PaymentError::UnexpectedResponse(e.to_string()))
    }
}

fn transport_error(error: reqwest::Error) -> PaymentError {
    if error.is_decode() {
        PaymentError::UnexpectedResponse(error.to_string())
    } else {
        PaymentError::Unreachable(error.to_string())
    }
}

impl From<StripeSession> for SessionStatus {
    fn from(session: StripeSession) -> Self {
        SessionStatus {
            payment_status: session.payment_status.unwrap_or_else(|| "unpaid".to_string()),
            amount_total_cents: session.amount_total,
            payment_intent_id: session.payment_intent,
            booking_id: session.metadata.get("booking_id").cloned(),
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&self.checkout_form(request))
            .send()
            .await
            .map_err(transport_error)?;

        let session = Self::read_session(response).await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::UnexpectedResponse("sesión sin URL de pago".to_string()))?;

        tracing::debug!(session_id = %session.id, booking_id = %request.booking_id, "Sesión de Stripe creada");
        Ok(CheckoutSession { id: session.id, url })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionStatus, PaymentError> {
        self.ensure_configured()?;
        // El id va en la ruta de la URL
        if !is_checkout_session_id(session_id) {
            return Err(PaymentError::InvalidSessionId(session_id.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(transport_error)?;

        Ok(Self::read_session(response).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(secret_key: &str, api_base: &str) -> PaymentConfig {
        PaymentConfig {
            secret_key: secret_key.to_string(),
            api_base: api_base.to_string(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            amount_cents: 40000,
            description: "Reserva de hotel (2 habitaciones)".to_string(),
            success_url: "http://localhost:5173/success?session_id={CHECKOUT_SESSION_ID}&booking_id=abc".to_string(),
            cancel_url: "http://localhost:5173/cancel".to_string(),
            booking_id: "abc".to_string(),
        }
    }

    #[test]
    fn checkout_form_carries_amount_and_booking() {
        let gateway = StripeGateway::new(&config("sk_test", "https://api.stripe.com")).unwrap();
        let form: HashMap<String, String> = gateway.checkout_form(&request()).into_iter().collect();

        assert_eq!(form["mode"], "payment");
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "40000");
        assert_eq!(form["line_items[0][price_data][currency]"], "usd");
        assert_eq!(form["metadata[booking_id]"], "abc");
        assert!(form["success_url"].contains("{CHECKOUT_SESSION_ID}"));
    }

    #[test]
    fn session_json_maps_to_status() {
        let json = r#"{
            "id": "cs_test_1",
            "object": "checkout.session",
            "url": null,
            "payment_status": "paid",
            "amount_total": 40000,
            "payment_intent": "pi_123",
            "metadata": { "booking_id": "abc" }
        }"#;
        let session: StripeSession = serde_json::from_str(json).unwrap();
        let status = SessionStatus::from(session);

        assert!(status.is_paid());
        assert_eq!(status.amount_total_cents, Some(40000));
        assert_eq!(status.payment_intent_id.as_deref(), Some("pi_123"));
        assert_eq!(status.booking_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_calling_out() {
        let gateway = StripeGateway::new(&config("", "https://api.stripe.com")).unwrap();
        let err = gateway.get_session("cs_test_1").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotConfigured));
    }

    #[tokio::test]
    async fn malformed_session_ids_never_reach_the_url() {
        // Un servidor inexistente: si se llegara a llamar fallaría como Unreachable
        let gateway = StripeGateway::new(&config("sk_test", "http://127.0.0.1:9")).unwrap();
        let err = gateway.get_session("cs_test/../../v1/charges").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSessionId(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_unreachable() {
        // Nada escucha en el puerto 9 (discard) de localhost
        let gateway = StripeGateway::new(&config("sk_test", "http://127.0.0.1:9")).unwrap();
        let err = gateway.create_checkout_session(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Unreachable(_)));
    }
}
