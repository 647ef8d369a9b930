//! # Módulo API
//!
//! Rutas y controladores de la API REST, todas bajo `/api`.
//!
//! ## Módulos principales
//!
//! - [`bookings`] - Búsqueda, reserva, verificación de pago, cancelación y consultas
//! - [`rooms`] - Inventario: tipos, estados y habitaciones (administración)
//! - [`housekeeping`] - Tareas de limpieza del personal
//! - [`users`] - Perfil del usuario autenticado
//! - [`auth`] - Resolución del token Bearer
//! - [`errors`] - Manejo de errores de la aplicación

pub mod auth;
pub mod bookings;
pub mod errors;
pub mod housekeeping;
pub mod middleware;
pub mod rooms;
pub mod users;

// Re-exportar tipos comunes para facilitar su uso
pub use errors::{AppError, AppResult};

use actix_web::web;

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/api/bookings/*` - Ver [`bookings::routes`]
/// - `/api/admin/*` - Ver [`rooms::routes`]
/// - `/api/housekeeping/*` - Ver [`housekeeping::routes`]
/// - `/api/users/profile` - Ver [`users::routes`]
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .configure(bookings::routes)
            .configure(rooms::routes)
            .configure(housekeeping::routes)
            .configure(users::routes),
    );
}
