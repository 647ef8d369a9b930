//! # Servicio de reservas
//!
//! Orquesta el flujo completo de una reserva:
//!
//! 1. Valida las líneas del carrito y carga los tipos pedidos
//! 2. Toma los cerrojos de esos tipos y asigna habitaciones físicas
//! 3. Guarda la reserva (pending/pending) y sus habitaciones como una unidad
//! 4. Abre la sesión de pago en la pasarela y devuelve su URL
//!
//! La verificación del pago la dispara el cliente al volver de la pasarela; no hay
//! webhooks. Cancelar libera las habitaciones pero conserva los pagos registrados.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::Serialize;

use super::availability::{
    busy_room_ids, nights_between, search_by_type_and_capacity, SearchCriteria, TypeAvailability,
};
use super::locks::RoomTypeLocks;
use super::planner::{plan_booking, BookingLine, LineInput};
use crate::api::auth::AuthUser;
use crate::api::middleware::ErrorLogExt;
use crate::api::{AppError, AppResult};
use crate::db::{
    Booking, BookingStatus, BookingStore, Payment, PaymentRecordStatus, PaymentStatus, ReservedRoom,
    Room, RoomType,
};
use crate::payment::{
    from_minor_units, is_checkout_session_id, to_minor_units, CheckoutRequest, PaymentError, PaymentGateway,
};

/// URLs a las que la pasarela devuelve al cliente.
#[derive(Debug, Clone)]
pub struct ReturnUrls {
    client_url: String,
}

impl ReturnUrls {
    pub fn new(client_url: &str) -> Self {
        ReturnUrls {
            client_url: client_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{CHECKOUT_SESSION_ID}` lo sustituye la pasarela por el ID de la sesión.
    pub fn success(&self, booking_id: ObjectId) -> String {
        format!(
            "{}/success?session_id={{CHECKOUT_SESSION_ID}}&booking_id={}",
            self.client_url,
            booking_id.to_hex()
        )
    }

    pub fn cancel(&self) -> String {
        format!("{}/cancel", self.client_url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedBooking {
    pub booking_id: ObjectId,
    pub session_id: String,
    pub url: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Esta llamada confirmó la reserva y registró el pago.
    Confirmed { amount: Decimal },
    /// La reserva ya estaba pagada; no se registra otro pago.
    AlreadyVerified,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingSummary {
    pub id: String,
    pub customer_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub created_at: i64,
}

impl From<&Booking> for BookingSummary {
    fn from(booking: &Booking) -> Self {
        BookingSummary {
            id: booking.id.to_hex(),
            customer_id: booking.customer_id.to_hex(),
            total_amount: booking.total_amount,
            payment_status: booking.payment_status,
            booking_status: booking.booking_status,
            created_at: booking.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomTypeSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: Option<String>,
}

impl From<&RoomType> for RoomTypeSummary {
    fn from(room_type: &RoomType) -> Self {
        RoomTypeSummary {
            id: room_type.id.to_hex(),
            name: room_type.name.clone(),
            price: room_type.price,
            image: room_type.image.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReservedRoomView {
    pub id: String,
    pub room_id: String,
    pub room_no: Option<String>,
    pub room_type: Option<RoomTypeSummary>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_per_night: Decimal,
    pub adults_count: i32,
    pub children_count: i32,
}

/// Reserva con sus habitaciones, unidas a habitación y tipo para mostrarlas.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingView {
    pub booking: BookingSummary,
    pub rooms: Vec<ReservedRoomView>,
}

pub struct BookingService {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    locks: RoomTypeLocks,
    return_urls: ReturnUrls,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, gateway: Arc<dyn PaymentGateway>, return_urls: ReturnUrls) -> Self {
        BookingService {
            store,
            gateway,
            locks: RoomTypeLocks::new(),
            return_urls,
        }
    }

    /// Tipos con habitaciones libres para `[from, to)` y capacidad para el grupo.
    pub async fn search(&self, criteria: &SearchCriteria) -> AppResult<Vec<TypeAvailability>> {
        let types = self.store.list_room_types().await?;
        let rooms = self.store.list_rooms().await?;
        let busy = self.store.overlapping_room_ids(criteria.from, criteria.to).await?;

        Ok(search_by_type_and_capacity(&types, &rooms, &busy, criteria))
    }

    /// Crea una reserva pendiente y devuelve la URL de pago.
    ///
    /// Si algún tipo no tiene habitación libre no se guarda nada. Si falla la escritura
    /// de las habitaciones o la pasarela, la reserva se deshace por completo.
    pub async fn create_booking(&self, customer_id: ObjectId, lines: Vec<BookingLine>) -> AppResult<CreatedBooking> {
        validate_lines(&lines)?;

        let mut type_ids: Vec<ObjectId> = lines.iter().map(|l| l.room_type_id).collect();
        type_ids.sort();
        type_ids.dedup();

        let mut room_types: HashMap<ObjectId, RoomType> = HashMap::new();
        let mut rooms_by_type: HashMap<ObjectId, Vec<Room>> = HashMap::new();
        for type_id in &type_ids {
            let room_type = self
                .store
                .find_room_type(*type_id)
                .await?
                .ok_or_else(|| AppError::not_found_id("Tipo de habitación", &type_id.to_hex()))?;
            rooms_by_type.insert(*type_id, self.store.rooms_of_type(*type_id).await?);
            room_types.insert(*type_id, room_type);
        }

        let guard = self.locks.acquire(&type_ids).await;

        // Una sola lectura del libro para la ventana que cubre todas las líneas
        let window_from = lines.iter().map(|l| l.check_in).min();
        let window_to = lines.iter().map(|l| l.check_out).max();
        let (Some(window_from), Some(window_to)) = (window_from, window_to) else {
            return Err(AppError::validation_field("rooms_data", "Debe incluir al menos una habitación"));
        };
        let ledger = self.store.overlapping_reservations(window_from, window_to).await?;

        let inputs = lines.iter().map(|line| LineInput {
            line,
            room_type: &room_types[&line.room_type_id],
            rooms: &rooms_by_type[&line.room_type_id],
            busy: busy_room_ids(&ledger, line.check_in, line.check_out),
        });
        let plan = plan_booking(inputs)?;

        let amount_cents = to_minor_units(plan.total)
            .ok_or_else(|| AppError::Validation("Importe total fuera de rango".to_string()))?;

        let booking = Booking::pending(customer_id, plan.total);
        self.store.insert_booking(&booking).await?;

        let reserved = plan.reserved_rooms(booking.id);
        if let Err(e) = self.store.insert_reserved_rooms(&reserved).await {
            self.rollback(booking.id).await;
            return Err(AppError::persistence("insert_reserved_rooms", &e));
        }
        // Las filas ya están en el libro: otras peticiones las verán como ocupadas
        drop(guard);

        tracing::info!(
            booking_id = %booking.id,
            customer_id = %customer_id,
            rooms = reserved.len(),
            total = %plan.total,
            "Reserva creada, pendiente de pago"
        );

        let request = CheckoutRequest {
            amount_cents,
            description: format!("Reserva de hotel ({} habitaciones)", reserved.len()),
            success_url: self.return_urls.success(booking.id),
            cancel_url: self.return_urls.cancel(),
            booking_id: booking.id.to_hex(),
        };

        match self.gateway.create_checkout_session(&request).await {
            Ok(session) => Ok(CreatedBooking {
                booking_id: booking.id,
                session_id: session.id,
                url: session.url,
                total_amount: plan.total,
            }),
            Err(e) => {
                // El cliente nunca recibió la URL de pago: se liberan las habitaciones
                self.rollback(booking.id).await;
                Err(e.into())
            }
        }
    }

    /// Borra las habitaciones y la reserva. Los fallos aquí solo se registran.
    async fn rollback(&self, booking_id: ObjectId) {
        let rows = self
            .store
            .delete_reserved_rooms(booking_id)
            .await
            .log_error_context("rollback_reserved_rooms");
        let booking = self
            .store
            .delete_booking(booking_id)
            .await
            .log_error_context("rollback_booking");

        tracing::warn!(
            booking_id = %booking_id,
            complete = rows.is_ok() && booking.is_ok(),
            "Reserva deshecha"
        );
    }

    /// Consulta la sesión en la pasarela y confirma la reserva si está pagada.
    ///
    /// Llamar dos veces no crea dos pagos: la segunda devuelve
    /// [`VerifyOutcome::AlreadyVerified`]. Si la reserva se cancela mientras se
    /// verifica, el cobro se registra igualmente y se devuelve `Conflict`.
    pub async fn verify_payment(&self, requester: &AuthUser, booking_id: ObjectId, session_id: &str) -> AppResult<VerifyOutcome> {
        if session_id.trim().is_empty() {
            return Err(AppError::validation_field("session_id", "es requerido"));
        }
        if !is_checkout_session_id(session_id) {
            return Err(AppError::validation_field("session_id", "formato de sesión inválido"));
        }

        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found_id("Reserva", &booking_id.to_hex()))?;

        if booking.customer_id != requester.id {
            return Err(AppError::unauthorized_operation("verify_payment", "La reserva no pertenece al usuario"));
        }

        if booking.payment_status == PaymentStatus::Paid {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        if booking.booking_status == BookingStatus::Cancelled {
            tracing::warn!(booking_id = %booking_id, session_id = %session_id, "Verificación de pago sobre reserva cancelada");
            return Err(AppError::Validation("La reserva está cancelada".to_string()));
        }

        let session = self.gateway.get_session(session_id).await?;

        // Una sesión sin booking_id en sus metadatos no prueba el pago de esta reserva
        if session.booking_id.as_deref() != Some(booking_id.to_hex().as_str()) {
            tracing::warn!(
                booking_id = %booking_id,
                session_id = %session_id,
                tagged = ?session.booking_id,
                "La sesión de pago no corresponde a la reserva"
            );
            return Err(AppError::Validation("La sesión de pago no corresponde a esta reserva".to_string()));
        }

        if !session.is_paid() {
            return Err(AppError::PaymentIncomplete {
                status: session.payment_status,
            });
        }

        let amount = session
            .amount_total_cents
            .map(from_minor_units)
            .ok_or_else(|| PaymentError::UnexpectedResponse("sesión pagada sin amount_total".to_string()))?;

        if amount != booking.total_amount {
            tracing::warn!(
                booking_id = %booking_id,
                expected = %booking.total_amount,
                charged = %amount,
                "El importe cobrado no coincide con el total de la reserva"
            );
        }

        let payment = Payment {
            id: ObjectId::new(),
            booking_id,
            amount,
            provider: self.gateway.provider(),
            transaction_id: session.payment_intent_id.unwrap_or_else(|| session_id.to_string()),
            status: PaymentRecordStatus::Success,
            created_at: crate::db::MongoRepo::current_timestamp(),
        };

        if !self.store.confirm_paid(booking_id).await? {
            let current = self
                .store
                .find_booking(booking_id)
                .await?
                .ok_or_else(|| AppError::not_found_id("Reserva", &booking_id.to_hex()))?;

            // Otra verificación concurrente confirmó primero
            if current.payment_status == PaymentStatus::Paid {
                return Ok(VerifyOutcome::AlreadyVerified);
            }

            // Se canceló entre la lectura y la confirmación: el cobro ya existe en la
            // pasarela y queda registrado aunque la reserva no se confirme
            tracing::error!(
                booking_id = %booking_id,
                booking_status = %current.booking_status.as_str(),
                transaction_id = %payment.transaction_id,
                amount = %amount,
                "Pago cobrado sobre una reserva que ya no está pendiente"
            );
            self.record_payment(&payment).await?;
            return Err(AppError::Conflict(
                "La reserva se canceló mientras se verificaba el pago; el cobro quedó registrado".to_string(),
            ));
        }

        self.record_payment(&payment).await?;

        tracing::info!(booking_id = %booking_id, amount = %amount, "Pago verificado, reserva confirmada");
        Ok(VerifyOutcome::Confirmed { amount })
    }

    async fn record_payment(&self, payment: &Payment) -> AppResult<()> {
        if let Err(e) = self.store.insert_payment(payment).await {
            tracing::error!(
                booking_id = %payment.booking_id,
                transaction_id = %payment.transaction_id,
                amount = %payment.amount,
                error = %e,
                "Pago cobrado pero no quedó registrado"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Cancela la reserva del propio cliente y libera sus habitaciones.
    ///
    /// No se comprueba la fecha de entrada ni se gestionan reembolsos. Devuelve el
    /// número de habitaciones liberadas.
    pub async fn cancel_booking(&self, requester: &AuthUser, booking_id: ObjectId) -> AppResult<u64> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found_id("Reserva", &booking_id.to_hex()))?;

        if booking.customer_id != requester.id {
            return Err(AppError::unauthorized_operation("cancel_booking", "Solo el titular puede cancelar la reserva"));
        }

        let changed = self.store.mark_cancelled(booking_id).await?;
        // Si ya estaba cancelada se borran filas que hubieran quedado de un intento previo
        let released = self.store.delete_reserved_rooms(booking_id).await?;

        if !changed && released == 0 {
            return Err(AppError::Validation("La reserva ya está cancelada".to_string()));
        }

        tracing::info!(booking_id = %booking_id, released, "Reserva cancelada");
        Ok(released)
    }

    pub async fn bookings_for_customer(&self, customer_id: ObjectId) -> AppResult<Vec<BookingView>> {
        let bookings = self.store.bookings_for_customer(customer_id).await?;
        self.enrich(bookings).await
    }

    /// Detalle de una reserva para su titular o para personal/administración.
    pub async fn booking_details(&self, requester: &AuthUser, booking_id: ObjectId) -> AppResult<BookingView> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found_id("Reserva", &booking_id.to_hex()))?;

        if booking.customer_id != requester.id && !requester.is_elevated() {
            return Err(AppError::unauthorized_operation("booking_details", "La reserva no pertenece al usuario"));
        }

        let mut views = self.enrich(vec![booking]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::internal_trace("Reserva perdida al unir sus habitaciones", None))
    }

    pub async fn all_bookings(&self, requester: &AuthUser) -> AppResult<Vec<BookingView>> {
        requester.require_staff("all_bookings")?;
        let bookings = self.store.all_bookings().await?;
        self.enrich(bookings).await
    }

    async fn enrich(&self, bookings: Vec<Booking>) -> AppResult<Vec<BookingView>> {
        if bookings.is_empty() {
            return Ok(Vec::new());
        }

        let booking_ids: Vec<ObjectId> = bookings.iter().map(|b| b.id).collect();
        let reserved = self.store.reserved_rooms_for_bookings(&booking_ids).await?;

        let room_ids: Vec<ObjectId> = reserved
            .iter()
            .map(|r| r.room_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let rooms: HashMap<ObjectId, Room> = self
            .store
            .rooms_by_ids(&room_ids)
            .await?
            .into_iter()
            .map(|room| (room.id, room))
            .collect();
        let types: HashMap<ObjectId, RoomType> = self
            .store
            .list_room_types()
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut by_booking: HashMap<ObjectId, Vec<ReservedRoomView>> = HashMap::new();
        for row in &reserved {
            by_booking
                .entry(row.booking_id)
                .or_default()
                .push(reserved_room_view(row, &rooms, &types));
        }

        Ok(bookings
            .iter()
            .map(|booking| BookingView {
                booking: BookingSummary::from(booking),
                rooms: by_booking.remove(&booking.id).unwrap_or_default(),
            })
            .collect())
    }
}

fn reserved_room_view(
    row: &ReservedRoom,
    rooms: &HashMap<ObjectId, Room>,
    types: &HashMap<ObjectId, RoomType>,
) -> ReservedRoomView {
    let room = rooms.get(&row.room_id);
    let room_type = room.and_then(|r| types.get(&r.room_type)).map(RoomTypeSummary::from);

    ReservedRoomView {
        id: row.id.to_hex(),
        room_id: row.room_id.to_hex(),
        room_no: room.map(|r| r.room_no.clone()),
        room_type,
        check_in: row.check_in,
        check_out: row.check_out,
        nights: nights_between(row.check_in, row.check_out),
        price_per_night: row.price_per_night,
        adults_count: row.adults_count,
        children_count: row.children_count,
    }
}

fn validate_lines(lines: &[BookingLine]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::validation_field("rooms_data", "Debe incluir al menos una habitación"));
    }

    for (index, line) in lines.iter().enumerate() {
        if line.check_in >= line.check_out {
            return Err(AppError::validation_field(
                &format!("rooms_data[{}].check_out", index),
                "La fecha de salida debe ser posterior a la de entrada",
            ));
        }
        if line.adults < 1 {
            return Err(AppError::validation_field(
                &format!("rooms_data[{}].adults", index),
                "Debe haber al menos un adulto",
            ));
        }
        if line.children < 0 {
            return Err(AppError::validation_field(
                &format!("rooms_data[{}].children", index),
                "No puede ser negativo",
            ));
        }
    }
    Ok(())
}
