//! # Núcleo de reservas
//!
//! - [`availability`] - Solapamiento de fechas, búsqueda por tipo y estado efectivo
//! - [`planner`] - Asignación de habitaciones físicas a un carrito
//! - [`locks`] - Cerrojos por tipo de habitación entre lectura y escritura del libro
//! - [`service`] - Orquestación: reserva, pago, cancelación y consultas

pub mod availability;
pub mod locks;
pub mod planner;
pub mod service;

pub use availability::SearchCriteria;
pub use planner::BookingLine;
pub use service::{BookingService, ReturnUrls, VerifyOutcome};
