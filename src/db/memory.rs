//! Almacén en memoria para los tests del núcleo de reservas.
//!
//! Cada operación cede el control (`yield_now`) antes de tocar el estado, así dos
//! reservas concurrentes en `tokio::join!` se intercalan igual que contra MongoDB.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;

use super::models::{Booking, BookingStatus, Payment, PaymentStatus, ReservedRoom, Room, RoomType};
use super::store::BookingStore;
use crate::api::{AppError, AppResult};
use crate::booking::availability::{busy_room_ids, ranges_overlap};

#[derive(Debug, Default)]
struct MemoryState {
    room_types: Vec<RoomType>,
    rooms: Vec<Room>,
    bookings: Vec<Booking>,
    reserved_rooms: Vec<ReservedRoom>,
    payments: Vec<Payment>,
    fail_reserved_insert: bool,
    cancel_before_confirm: bool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room_type(&self, room_type: RoomType) -> ObjectId {
        let id = room_type.id;
        self.state.lock().unwrap().room_types.push(room_type);
        id
    }

    pub fn add_room(&self, room: Room) -> ObjectId {
        let id = room.id;
        self.state.lock().unwrap().rooms.push(room);
        id
    }

    pub fn add_reserved_room(&self, reserved: ReservedRoom) {
        self.state.lock().unwrap().reserved_rooms.push(reserved);
    }

    /// Hace fallar el próximo `insert_reserved_rooms`.
    pub fn fail_next_reserved_insert(&self) {
        self.state.lock().unwrap().fail_reserved_insert = true;
    }

    /// El próximo `confirm_paid` encuentra la reserva ya cancelada, como si un
    /// `cancel_booking` se hubiera colado justo antes.
    pub fn cancel_before_next_confirm(&self) {
        self.state.lock().unwrap().cancel_before_confirm = true;
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().unwrap().bookings.clone()
    }

    pub fn reserved_rooms(&self) -> Vec<ReservedRoom> {
        self.state.lock().unwrap().reserved_rooms.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().unwrap().payments.clone()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn find_room_type(&self, id: ObjectId) -> AppResult<Option<RoomType>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.room_types.iter().find(|t| t.id == id).cloned())
    }

    async fn list_room_types(&self) -> AppResult<Vec<RoomType>> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().room_types.clone())
    }

    async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().rooms.clone())
    }

    async fn rooms_of_type(&self, room_type_id: ObjectId) -> AppResult<Vec<Room>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .iter()
            .filter(|r| r.room_type == room_type_id)
            .cloned()
            .collect())
    }

    async fn rooms_by_ids(&self, ids: &[ObjectId]) -> AppResult<Vec<Room>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .rooms
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn overlapping_reservations(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<ReservedRoom>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .reserved_rooms
            .iter()
            .filter(|r| ranges_overlap(r.check_in, r.check_out, from, to))
            .cloned()
            .collect())
    }

    async fn overlapping_room_ids(&self, from: NaiveDate, to: NaiveDate) -> AppResult<HashSet<ObjectId>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(busy_room_ids(&state.reserved_rooms, from, to))
    }

    async fn insert_booking(&self, booking: &Booking) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.state.lock().unwrap().bookings.push(booking.clone());
        Ok(())
    }

    async fn delete_booking(&self, id: ObjectId) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.state.lock().unwrap().bookings.retain(|b| b.id != id);
        Ok(())
    }

    async fn insert_reserved_rooms(&self, rooms: &[ReservedRoom]) -> AppResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_reserved_insert {
            state.fail_reserved_insert = false;
            // Simula un insert_many que alcanzó a escribir la primera fila
            if let Some(first) = rooms.first() {
                state.reserved_rooms.push(first.clone());
            }
            return Err(AppError::Internal("insert_many interrumpido".to_string()));
        }
        state.reserved_rooms.extend_from_slice(rooms);
        Ok(())
    }

    async fn delete_reserved_rooms(&self, booking_id: ObjectId) -> AppResult<u64> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        let before = state.reserved_rooms.len();
        state.reserved_rooms.retain(|r| r.booking_id != booking_id);
        Ok((before - state.reserved_rooms.len()) as u64)
    }

    async fn find_booking(&self, id: ObjectId) -> AppResult<Option<Booking>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn bookings_for_customer(&self, customer_id: ObjectId) -> AppResult<Vec<Booking>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .bookings
            .iter()
            .rev()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn all_bookings(&self) -> AppResult<Vec<Booking>> {
        tokio::task::yield_now().await;
        Ok(self.state.lock().unwrap().bookings.iter().rev().cloned().collect())
    }

    async fn reserved_rooms_for_bookings(&self, booking_ids: &[ObjectId]) -> AppResult<Vec<ReservedRoom>> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .reserved_rooms
            .iter()
            .filter(|r| booking_ids.contains(&r.booking_id))
            .cloned()
            .collect())
    }

    async fn confirm_paid(&self, id: ObjectId) -> AppResult<bool> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.cancel_before_confirm) {
            if let Some(booking) = state.bookings.iter_mut().find(|b| b.id == id) {
                booking.booking_status = BookingStatus::Cancelled;
            }
        }
        match state.bookings.iter_mut().find(|b| b.id == id) {
            Some(booking)
                if booking.booking_status == BookingStatus::Pending
                    && booking.payment_status != PaymentStatus::Paid =>
            {
                booking.booking_status = BookingStatus::Confirmed;
                booking.payment_status = PaymentStatus::Paid;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_cancelled(&self, id: ObjectId) -> AppResult<bool> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        match state.bookings.iter_mut().find(|b| b.id == id) {
            Some(booking) if booking.booking_status != BookingStatus::Cancelled => {
                booking.booking_status = BookingStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_payment(&self, payment: &Payment) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.state.lock().unwrap().payments.push(payment.clone());
        Ok(())
    }
}
