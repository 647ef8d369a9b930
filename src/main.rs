//! # Hotel Reservation Server
//!
//! API REST de un hotel construida con Rust, Actix Web y MongoDB.
//!
//! ## Características principales
//!
//! - **Búsqueda de disponibilidad**: tipos de habitación libres por fechas y capacidad
//! - **Reservas con pago**: asignación de habitaciones físicas y sesión de pago en Stripe
//! - **Cancelación y consultas**: reservas propias, detalle y listado para el personal
//! - **Inventario**: tipos, estados y habitaciones (administración)
//! - **Limpieza**: tareas del personal de housekeeping
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`):
//!
//! ```env
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=hotel_reservation
//! BIND_ADDRESS=0.0.0.0:8080
//! CLIENT_URL=http://localhost:5173
//! STRIPE_SECRET_KEY=sk_test_...
//! RUST_LOG=hotel_reservation=debug,mongodb=info
//! ```
//!
//! ## Arquitectura
//!
//! ```text
//! Frontend (SPA)
//!     ↓ HTTP/JSON
//! API REST (Actix Web) ── Stripe Checkout (reqwest)
//!     ↓ BookingStore
//! MongoDB Database
//! ```

use std::path::Path;
use std::sync::Arc;

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::EnvFilter;

mod api;
mod booking;
mod config;
mod db;
mod payment;

use booking::{BookingService, ReturnUrls};
use config::AppConfig;
use db::{BookingStore, MongoRepo};
use payment::stripe::StripeGateway;
use payment::PaymentGateway;

/// Función principal que inicia el servidor web
///
/// 1. Carga variables de entorno desde `.env`
/// 2. Configura el sistema de logging con tracing
/// 3. Establece conexión con MongoDB y crea índices
/// 4. Construye la pasarela de pago y el servicio de reservas
/// 5. Levanta el servidor HTTP con la API bajo `/api` y el frontend en `/`
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Configurar sistema de logging con tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hotel_reservation=debug,mongodb=info,actix_web=info")),
        )
        .init();

    tracing::info!("Iniciando Hotel Reservation Server con MongoDB...");

    let config = AppConfig::from_env();

    // Inicializar conexión a MongoDB
    let mongo_repo = match MongoRepo::init().await {
        Ok(repo) => {
            // Intentar crear índices para optimizar consultas
            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Advertencia creando índices: {}", e);
            }
            repo
        }
        Err(e) => {
            tracing::error!("Error conectando a MongoDB: {}", e);
            return Err(std::io::Error::other(format!("Error de MongoDB: {}", e)));
        }
    };

    if config.payment.secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY no definida: las reservas fallarán al abrir el pago");
    }

    let gateway: Arc<dyn PaymentGateway> = match StripeGateway::new(&config.payment) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            tracing::error!("Error creando la pasarela de pago: {}", e);
            return Err(std::io::Error::other(format!("Error de pasarela: {}", e)));
        }
    };

    let store: Arc<dyn BookingStore> = Arc::new(mongo_repo.clone());
    let booking_service = web::Data::new(BookingService::new(
        store,
        gateway,
        ReturnUrls::new(&config.client_url),
    ));
    let mongo_repo = web::Data::new(mongo_repo);

    let static_dir = config.static_dir.clone();
    let serve_frontend = Path::new(&static_dir).is_dir();
    if !serve_frontend {
        tracing::warn!(static_dir = %static_dir, "Directorio del frontend no encontrado; solo se sirve la API");
    }

    tracing::info!("Servidor iniciando en {}", config.bind_address);

    // Crear y configurar el servidor HTTP
    HttpServer::new(move || {
        let app = App::new()
            .app_data(mongo_repo.clone())
            .app_data(booking_service.clone())
            .wrap(Logger::default())
            .configure(api::init_routes);

        if serve_frontend {
            app.service(Files::new("/", &static_dir).index_file("index.html"))
        } else {
            app
        }
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
