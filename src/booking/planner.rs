//! Asignación de habitaciones físicas a las líneas del carrito.
//!
//! El plan se construye con un `try_fold`: cada línea asignada amplía el conjunto
//! `assigned` del acumulador, de modo que dos líneas del mismo tipo y fechas nunca
//! reciben la misma habitación.

use std::collections::HashSet;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::availability::{find_available_room, nights_between};
use crate::db::{ReservedRoom, Room, RoomType};

/// Línea del carrito ya validada.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingLine {
    pub room_type_id: ObjectId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i32,
    pub children: i32,
}

/// Todo lo que hace falta para asignar una línea: su tipo, las habitaciones de ese
/// tipo y las ocupadas en la base de datos para sus fechas.
#[derive(Debug)]
pub struct LineInput<'a> {
    pub line: &'a BookingLine,
    pub room_type: &'a RoomType,
    pub rooms: &'a [Room],
    pub busy: HashSet<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoom {
    pub room_id: ObjectId,
    pub room_no: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub price_per_night: Decimal,
    pub adults: i32,
    pub children: i32,
}

impl PlannedRoom {
    /// `None` si el importe no cabe en un `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price_per_night.checked_mul(Decimal::from(self.nights))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingPlan {
    pub rooms: Vec<PlannedRoom>,
    pub assigned: HashSet<ObjectId>,
    pub total: Decimal,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("No quedan habitaciones libres del tipo '{room_type_name}' ({room_type_id})")]
    Unavailable {
        room_type_id: ObjectId,
        room_type_name: String,
    },

    #[error("El importe de la reserva para el tipo '{room_type_name}' está fuera de rango")]
    AmountOverflow { room_type_name: String },
}

impl BookingPlan {
    /// Asigna una habitación a la línea o falla si el tipo está completo.
    pub fn assign(mut self, input: LineInput<'_>) -> Result<Self, PlanError> {
        let LineInput { line, room_type, rooms, busy } = input;

        let room = find_available_room(rooms, room_type.id, &busy, &self.assigned).ok_or_else(|| {
            PlanError::Unavailable {
                room_type_id: room_type.id,
                room_type_name: room_type.name.clone(),
            }
        })?;

        let planned = PlannedRoom {
            room_id: room.id,
            room_no: room.room_no.clone(),
            check_in: line.check_in,
            check_out: line.check_out,
            nights: nights_between(line.check_in, line.check_out),
            price_per_night: room_type.price,
            adults: line.adults,
            children: line.children,
        };

        let overflow = || PlanError::AmountOverflow {
            room_type_name: room_type.name.clone(),
        };
        self.total = planned
            .subtotal()
            .and_then(|subtotal| self.total.checked_add(subtotal))
            .ok_or_else(overflow)?;
        self.assigned.insert(room.id);
        self.rooms.push(planned);
        Ok(self)
    }

    /// Filas del libro de reservas para este plan.
    pub fn reserved_rooms(&self, booking_id: ObjectId) -> Vec<ReservedRoom> {
        self.rooms
            .iter()
            .map(|planned| ReservedRoom {
                id: ObjectId::new(),
                booking_id,
                room_id: planned.room_id,
                check_in: planned.check_in,
                check_out: planned.check_out,
                price_per_night: planned.price_per_night,
                adults_count: planned.adults,
                children_count: planned.children,
            })
            .collect()
    }
}

pub fn plan_booking<'a, I>(inputs: I) -> Result<BookingPlan, PlanError>
where
    I: IntoIterator<Item = LineInput<'a>>,
{
    inputs.into_iter().try_fold(BookingPlan::default(), BookingPlan::assign)
}
