//! # Almacén de reservas
//!
//! Contrato de persistencia que usa el núcleo de reservas: lecturas del inventario de
//! habitaciones y lecturas/escrituras del libro de habitaciones reservadas.
//! [`MongoRepo`](super::MongoRepo) lo implementa contra MongoDB.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;

use super::models::{Booking, Payment, ReservedRoom, Room, RoomType};
use crate::api::AppResult;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_room_type(&self, id: ObjectId) -> AppResult<Option<RoomType>>;

    /// Todos los tipos en orden estable (`_id` ascendente).
    async fn list_room_types(&self) -> AppResult<Vec<RoomType>>;

    /// Todas las habitaciones físicas en orden estable (`_id` ascendente).
    async fn list_rooms(&self) -> AppResult<Vec<Room>>;

    async fn rooms_of_type(&self, room_type_id: ObjectId) -> AppResult<Vec<Room>>;

    async fn rooms_by_ids(&self, ids: &[ObjectId]) -> AppResult<Vec<Room>>;

    /// Filas reservadas que se solapan con `[from, to)`.
    async fn overlapping_reservations(&self, from: NaiveDate, to: NaiveDate)
        -> AppResult<Vec<ReservedRoom>>;

    /// IDs de habitaciones con alguna fila reservada que se solapa con `[from, to)`.
    async fn overlapping_room_ids(&self, from: NaiveDate, to: NaiveDate)
        -> AppResult<HashSet<ObjectId>>;

    async fn insert_booking(&self, booking: &Booking) -> AppResult<()>;

    async fn delete_booking(&self, id: ObjectId) -> AppResult<()>;

    async fn insert_reserved_rooms(&self, rooms: &[ReservedRoom]) -> AppResult<()>;

    /// Borra todas las filas de la reserva y devuelve cuántas había.
    async fn delete_reserved_rooms(&self, booking_id: ObjectId) -> AppResult<u64>;

    async fn find_booking(&self, id: ObjectId) -> AppResult<Option<Booking>>;

    /// Reservas del cliente, más recientes primero.
    async fn bookings_for_customer(&self, customer_id: ObjectId) -> AppResult<Vec<Booking>>;

    /// Todas las reservas, más recientes primero.
    async fn all_bookings(&self) -> AppResult<Vec<Booking>>;

    async fn reserved_rooms_for_bookings(&self, booking_ids: &[ObjectId])
        -> AppResult<Vec<ReservedRoom>>;

    /// Pasa la reserva a confirmed/paid solo si sigue pending y no está pagada.
    /// Devuelve `true` si esta llamada fue la que la modificó.
    async fn confirm_paid(&self, id: ObjectId) -> AppResult<bool>;

    /// Marca la reserva como cancelada. Devuelve `false` si ya lo estaba.
    async fn mark_cancelled(&self, id: ObjectId) -> AppResult<bool>;

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()>;
}
