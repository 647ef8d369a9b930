//! # API de Reservas de hotel
//!
//! Rutas del huésped (buscar, reservar, verificar el pago, cancelar) y consultas para
//! personal y administración. Toda la lógica vive en [`BookingService`]; aquí solo se
//! validan formatos y se construyen las respuestas.

use actix_web::{get, post, put, web, HttpResponse, Responder};
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::auth::AuthUser;
use super::{AppError, AppResult};
use crate::booking::{BookingLine, BookingService, SearchCriteria, VerifyOutcome};

fn default_one() -> i32 {
    1
}

/// Parámetros de `GET /bookings/search`
#[derive(Deserialize)]
struct SearchQuery {
    /// Fecha de entrada (YYYY-MM-DD)
    from: String,
    /// Fecha de salida (YYYY-MM-DD), excluida
    to: String,
    #[serde(default = "default_one")]
    adults: i32,
    #[serde(default)]
    children: i32,
    #[serde(default = "default_one")]
    rooms_count: i32,
}

/// Una habitación del carrito tal como la envía el cliente
#[derive(Deserialize)]
struct RoomRequest {
    room_type_id: String,
    check_in: String,
    check_out: String,
    #[serde(default = "default_one")]
    adults: i32,
    #[serde(default)]
    children: i32,
}

#[derive(Deserialize)]
struct CreateBookingRequest {
    #[serde(default)]
    rooms_data: Vec<RoomRequest>,
}

#[derive(Deserialize)]
struct VerifyPaymentRequest {
    booking_id: String,
    session_id: String,
}

#[derive(Serialize)]
struct CreatedBookingResponse {
    url: String,
    booking_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
}

#[derive(Serialize)]
struct VerifyPaymentResponse {
    message: &'static str,
    booking_id: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    amount: Option<Decimal>,
    already_verified: bool,
}

/// Valida y parsea una fecha en formato YYYY-MM-DD
fn validate_date(field: &str, date_str: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation_field(field, "Formato de fecha inválido, use YYYY-MM-DD"))
}

fn parse_id(resource: &str, id: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(id.trim())
        .map_err(|_| AppError::Validation(format!("ID de {} inválido", resource)))
}

impl SearchQuery {
    fn into_criteria(self) -> AppResult<SearchCriteria> {
        let from = validate_date("from", &self.from)?;
        let to = validate_date("to", &self.to)?;

        if from >= to {
            return Err(AppError::validation_field("to", "Debe ser posterior a 'from'"));
        }
        if self.adults < 0 || self.children < 0 {
            return Err(AppError::Validation("El número de huéspedes no puede ser negativo".to_string()));
        }

        Ok(SearchCriteria {
            from,
            to,
            adults: self.adults,
            children: self.children,
            rooms_count: self.rooms_count,
        })
    }
}

impl RoomRequest {
    fn into_line(self, index: usize) -> AppResult<BookingLine> {
        Ok(BookingLine {
            room_type_id: ObjectId::parse_str(self.room_type_id.trim()).map_err(|_| {
                AppError::validation_field(&format!("rooms_data[{}].room_type_id", index), "ID inválido")
            })?,
            check_in: validate_date(&format!("rooms_data[{}].check_in", index), &self.check_in)?,
            check_out: validate_date(&format!("rooms_data[{}].check_out", index), &self.check_out)?,
            adults: self.adults,
            children: self.children,
        })
    }
}

/// Tipos de habitación con disponibilidad para las fechas y el grupo
///
/// # Respuesta
/// ```json
/// [
///   {
///     "type_id": "65f1c2...",
///     "type": "Deluxe",
///     "price": 100.0,
///     "description": null,
///     "max_adults": 2,
///     "max_children": 0,
///     "image": null,
///     "available_count": 2
///   }
/// ]
/// ```
#[get("/bookings/search")]
async fn search_rooms(
    service: web::Data<BookingService>,
    query: web::Query<SearchQuery>,
) -> AppResult<impl Responder> {
    let criteria = query.into_inner().into_criteria()?;
    let results = service.search(&criteria).await?;

    tracing::debug!(
        from = %criteria.from,
        to = %criteria.to,
        types = results.len(),
        "Búsqueda de disponibilidad"
    );

    Ok(HttpResponse::Ok().json(results))
}

/// Crea una reserva pendiente y devuelve la URL de pago
///
/// # Respuesta
/// `201 Created`:
/// ```json
/// { "url": "https://checkout.stripe.com/...", "booking_id": "65f1c2...", "total_amount": 400.0 }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Datos inválidos o tipo sin disponibilidad
/// - `401 Unauthorized`: Falta token o es inválido
/// - `404 Not Found`: Tipo de habitación inexistente
/// - `500 Internal Server Error`: Pasarela de pago o base de datos
#[post("/bookings")]
async fn create_booking(
    service: web::Data<BookingService>,
    user: AuthUser,
    data: web::Json<CreateBookingRequest>,
) -> AppResult<impl Responder> {
    let lines = data
        .into_inner()
        .rooms_data
        .into_iter()
        .enumerate()
        .map(|(index, room)| room.into_line(index))
        .collect::<AppResult<Vec<_>>>()?;

    let created = service.create_booking(user.id, lines).await?;

    Ok(HttpResponse::Created().json(CreatedBookingResponse {
        url: created.url,
        booking_id: created.booking_id.to_hex(),
        total_amount: created.total_amount,
    }))
}

/// Confirma la reserva si la pasarela informa la sesión como pagada
///
/// Repetir la llamada no crea otro pago: la respuesta lleva `already_verified: true`.
#[post("/bookings/verify-payment")]
async fn verify_payment(
    service: web::Data<BookingService>,
    user: AuthUser,
    data: web::Json<VerifyPaymentRequest>,
) -> AppResult<impl Responder> {
    let booking_id = parse_id("reserva", &data.booking_id)?;
    let outcome = service.verify_payment(&user, booking_id, &data.session_id).await?;

    let body = match outcome {
        VerifyOutcome::Confirmed { amount } => VerifyPaymentResponse {
            message: "Pago verificado y reserva confirmada",
            booking_id: booking_id.to_hex(),
            amount: Some(amount),
            already_verified: false,
        },
        VerifyOutcome::AlreadyVerified => VerifyPaymentResponse {
            message: "El pago de esta reserva ya estaba verificado",
            booking_id: booking_id.to_hex(),
            amount: None,
            already_verified: true,
        },
    };

    Ok(HttpResponse::Ok().json(body))
}

#[get("/bookings/mybookings")]
async fn my_bookings(service: web::Data<BookingService>, user: AuthUser) -> AppResult<impl Responder> {
    let bookings = service.bookings_for_customer(user.id).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

/// Todas las reservas (personal y administración)
#[get("/bookings/all")]
async fn all_bookings(service: web::Data<BookingService>, user: AuthUser) -> AppResult<impl Responder> {
    let bookings = service.all_bookings(&user).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

#[get("/bookings/{id}")]
async fn get_booking(
    service: web::Data<BookingService>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let booking_id = parse_id("reserva", &path.into_inner())?;
    let view = service.booking_details(&user, booking_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Cancela una reserva propia y libera sus habitaciones
///
/// # Errores
/// - `400 Bad Request`: La reserva ya estaba cancelada
/// - `401 Unauthorized`: La reserva es de otro cliente
/// - `404 Not Found`: Reserva no encontrada
#[put("/bookings/{id}/cancel")]
async fn cancel_booking(
    service: web::Data<BookingService>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let booking_id = parse_id("reserva", &path.into_inner())?;
    let released = service.cancel_booking(&user, booking_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Reserva cancelada correctamente",
        "id": booking_id.to_hex(),
        "released_rooms": released,
    })))
}

/// Las rutas fijas van antes de `/bookings/{id}`
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(search_rooms);
    cfg.service(verify_payment);
    cfg.service(my_bookings);
    cfg.service(all_bookings);
    cfg.service(create_booking);
    cfg.service(get_booking);
    cfg.service(cancel_booking);
}
