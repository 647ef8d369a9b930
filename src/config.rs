//! Configuración de la aplicación a partir de variables de entorno (`.env` incluido).
//!
//! La conexión a MongoDB (`MONGODB_URI`, `MONGODB_DATABASE`) la lee directamente
//! [`MongoRepo::init`](crate::db::MongoRepo::init).

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    /// URL pública del frontend; base de las URLs de retorno del pago.
    pub client_url: String,
    pub static_dir: String,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub secret_key: String,
    pub api_base: String,
    pub currency: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let timeout_secs = lookup("PAYMENT_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(10);

        AppConfig {
            bind_address: var("BIND_ADDRESS", "0.0.0.0:8080"),
            client_url: var("CLIENT_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            static_dir: var("STATIC_DIR", "./static"),
            payment: PaymentConfig {
                secret_key: var("STRIPE_SECRET_KEY", ""),
                api_base: var("STRIPE_API_BASE", "https://api.stripe.com")
                    .trim_end_matches('/')
                    .to_string(),
                currency: var("PAYMENT_CURRENCY", "usd").to_lowercase(),
                timeout: Duration::from_secs(timeout_secs),
            },
        }
    }
}
