//! # Resolución de disponibilidad
//!
//! Funciones puras sobre el inventario y el libro de habitaciones reservadas.
//! Los rangos de fechas son semiabiertos `[entrada, salida)`: una salida el día D y
//! una entrada el mismo día D no entran en conflicto.

use std::collections::HashSet;

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::{ReservedRoom, Room, RoomStatus, RoomType};

/// `[a_from, a_to)` y `[b_from, b_to)` se solapan sii `a_from < b_to && a_to > b_from`.
pub fn ranges_overlap(a_from: NaiveDate, a_to: NaiveDate, b_from: NaiveDate, b_to: NaiveDate) -> bool {
    a_from < b_to && a_to > b_from
}

/// Habitaciones referenciadas por alguna fila reservada que se solapa con `[from, to)`.
pub fn busy_room_ids<'a, I>(reservations: I, from: NaiveDate, to: NaiveDate) -> HashSet<ObjectId>
where
    I: IntoIterator<Item = &'a ReservedRoom>,
{
    reservations
        .into_iter()
        .filter(|r| ranges_overlap(r.check_in, r.check_out, from, to))
        .map(|r| r.room_id)
        .collect()
}

/// Primera habitación del tipo pedido que no está ocupada ni excluida.
///
/// El orden es el de `rooms` (orden de iteración del almacén), así el resultado es
/// determinista para una misma entrada.
pub fn find_available_room<'a>(
    rooms: &'a [Room],
    room_type_id: ObjectId,
    busy: &HashSet<ObjectId>,
    exclude: &HashSet<ObjectId>,
) -> Option<&'a Room> {
    rooms.iter().find(|room| {
        room.room_type == room_type_id && !busy.contains(&room.id) && !exclude.contains(&room.id)
    })
}

/// Noches entre dos fechas, nunca menos de una.
pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days().abs().max(1)
}

/// Parámetros de búsqueda de disponibilidad por tipo.
#[derive(Debug, Clone, Copy)]
pub struct SearchCriteria {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub rooms_count: i32,
}

impl SearchCriteria {
    fn rooms_requested(&self) -> i64 {
        i64::from(self.rooms_count.max(1))
    }
}

/// Tipo de habitación que cumple la búsqueda, con sus plazas libres.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeAvailability {
    pub type_id: String,
    #[serde(rename = "type")]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub description: Option<String>,
    pub max_adults: i32,
    pub max_children: i32,
    pub image: Option<String>,
    pub available_count: usize,
}

/// Tipos con suficientes habitaciones libres y capacidad conjunta para el grupo.
///
/// La capacidad se evalúa sobre todas las habitaciones pedidas del tipo
/// (`max_adults * rooms_count >= adults`), no por habitación, para permitir que un
/// grupo se reparta entre varias habitaciones del mismo tipo.
pub fn search_by_type_and_capacity(
    types: &[RoomType],
    rooms: &[Room],
    busy: &HashSet<ObjectId>,
    criteria: &SearchCriteria,
) -> Vec<TypeAvailability> {
    let requested = criteria.rooms_requested();

    types
        .iter()
        .filter_map(|room_type| {
            let available_count = rooms
                .iter()
                .filter(|room| room.room_type == room_type.id && !busy.contains(&room.id))
                .count();

            let enough_rooms = available_count as i64 >= requested;
            let fits_adults = i64::from(room_type.max_adults) * requested >= i64::from(criteria.adults);
            let fits_children =
                i64::from(room_type.max_children) * requested >= i64::from(criteria.children);

            (enough_rooms && fits_adults && fits_children).then(|| TypeAvailability {
                type_id: room_type.id.to_hex(),
                name: room_type.name.clone(),
                price: room_type.price,
                description: room_type.description.clone(),
                max_adults: room_type.max_adults,
                max_children: room_type.max_children,
                image: room_type.image.clone(),
                available_count,
            })
        })
        .collect()
}

/// Estado que se muestra para una habitación.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EffectiveStatus {
    pub id: Option<String>,
    pub status: String,
    /// `true` cuando el estado es el "Occupied" calculado y no el guardado.
    pub derived: bool,
}

/// Estado persistido de la habitación, salvo que alguna reserva cubra hoy: entonces
/// devuelve el marcador "Occupied". El valor derivado no se persiste nunca.
pub fn effective_status(
    room: &Room,
    statuses: &[RoomStatus],
    occupied_today: &HashSet<ObjectId>,
) -> Option<EffectiveStatus> {
    if occupied_today.contains(&room.id) {
        return Some(EffectiveStatus {
            id: None,
            status: RoomStatus::OCCUPIED.to_string(),
            derived: true,
        });
    }

    let status_id = room.room_status?;
    statuses
        .iter()
        .find(|s| s.id == status_id)
        .map(|s| EffectiveStatus {
            id: Some(s.id.to_hex()),
            status: s.status.clone(),
            derived: false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reserved(room_id: ObjectId, check_in: NaiveDate, check_out: NaiveDate) -> ReservedRoom {
        ReservedRoom {
            id: ObjectId::new(),
            booking_id: ObjectId::new(),
            room_id,
            check_in,
            check_out,
            price_per_night: Decimal::new(100, 0),
            adults_count: 2,
            children_count: 0,
        }
    }

    #[test]
    fn checkout_day_can_be_next_checkin() {
        // Reserva existente [10 ene, 13 ene)
        let (a_from, a_to) = (date(2024, 1, 10), date(2024, 1, 13));

        assert!(!ranges_overlap(a_from, a_to, date(2024, 1, 13), date(2024, 1, 15)));
        assert!(ranges_overlap(a_from, a_to, date(2024, 1, 9), date(2024, 1, 11)));
        assert!(!ranges_overlap(a_from, a_to, date(2024, 1, 8), date(2024, 1, 10)));
        assert!(ranges_overlap(a_from, a_to, date(2024, 1, 11), date(2024, 1, 12)));
    }

    #[test]
    fn busy_ids_only_include_overlapping_rows() {
        let d1 = ObjectId::new();
        let d2 = ObjectId::new();
        let rows = vec![
            reserved(d1, date(2024, 1, 10), date(2024, 1, 13)),
            reserved(d2, date(2024, 1, 13), date(2024, 1, 15)),
        ];

        let busy = busy_room_ids(&rows, date(2024, 1, 11), date(2024, 1, 13));
        assert_eq!(busy, HashSet::from([d1]));
    }

    #[test]
    fn find_available_room_skips_busy_and_excluded() {
        let deluxe = ObjectId::new();
        let suite = ObjectId::new();
        let rooms = vec![
            Room::new("101", deluxe, None),
            Room::new("102", suite, None),
            Room::new("103", deluxe, None),
            Room::new("104", deluxe, None),
        ];
        let busy = HashSet::from([rooms[0].id]);
        let mut exclude = HashSet::new();

        let first = find_available_room(&rooms, deluxe, &busy, &exclude).unwrap();
        assert_eq!(first.room_no, "103");

        exclude.insert(first.id);
        let second = find_available_room(&rooms, deluxe, &busy, &exclude).unwrap();
        assert_eq!(second.room_no, "104");

        exclude.insert(second.id);
        assert!(find_available_room(&rooms, deluxe, &busy, &exclude).is_none());
    }

    #[test]
    fn nights_are_floored_to_one() {
        assert_eq!(nights_between(date(2024, 3, 1), date(2024, 3, 3)), 2);
        assert_eq!(nights_between(date(2024, 3, 1), date(2024, 3, 1)), 1);
        assert_eq!(nights_between(date(2024, 3, 3), date(2024, 3, 1)), 2);
    }

    #[test]
    fn capacity_is_combined_across_requested_rooms() {
        let double = RoomType::new("Double", Decimal::new(80, 0), 2, 0);
        let rooms = vec![
            Room::new("201", double.id, None),
            Room::new("202", double.id, None),
        ];
        let mut criteria = SearchCriteria {
            from: date(2024, 3, 1),
            to: date(2024, 3, 3),
            adults: 3,
            children: 0,
            rooms_count: 2,
        };

        let found = search_by_type_and_capacity(&[double.clone()], &rooms, &HashSet::new(), &criteria);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].available_count, 2);
        assert_eq!(found[0].name, "Double");

        // Una sola habitación no aloja a 3 adultos
        criteria.rooms_count = 1;
        assert!(search_by_type_and_capacity(&[double], &rooms, &HashSet::new(), &criteria).is_empty());
    }

    #[test]
    fn search_excludes_types_without_enough_free_rooms() {
        let deluxe = RoomType::new("Deluxe", Decimal::new(100, 0), 2, 1);
        let suite = RoomType::new("Suite", Decimal::new(250, 0), 4, 2);
        let rooms = vec![
            Room::new("D1", deluxe.id, None),
            Room::new("D2", deluxe.id, None),
            Room::new("S1", suite.id, None),
        ];
        let busy = HashSet::from([rooms[0].id, rooms[1].id]);
        let criteria = SearchCriteria {
            from: date(2024, 3, 1),
            to: date(2024, 3, 3),
            adults: 1,
            children: 0,
            rooms_count: 1,
        };

        let found = search_by_type_and_capacity(&[deluxe, suite.clone()], &rooms, &busy, &criteria);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].type_id, suite.id.to_hex());
        assert_eq!(found[0].price, Decimal::new(250, 0));
    }

    #[test]
    fn children_capacity_is_checked() {
        let adults_only = RoomType::new("Adults only", Decimal::new(90, 0), 2, 0);
        let rooms = vec![Room::new("301", adults_only.id, None)];
        let criteria = SearchCriteria {
            from: date(2024, 3, 1),
            to: date(2024, 3, 2),
            adults: 1,
            children: 1,
            rooms_count: 1,
        };

        assert!(search_by_type_and_capacity(&[adults_only], &rooms, &HashSet::new(), &criteria).is_empty());
    }

    #[test]
    fn occupied_overlay_is_derived() {
        let available = RoomStatus::new(RoomStatus::AVAILABLE);
        let room = Room::new("101", ObjectId::new(), Some(available.id));
        let statuses = vec![available.clone()];

        let persisted = effective_status(&room, &statuses, &HashSet::new()).unwrap();
        assert_eq!(persisted.status, "Available");
        assert_eq!(persisted.id, Some(available.id.to_hex()));
        assert!(!persisted.derived);

        let occupied = effective_status(&room, &statuses, &HashSet::from([room.id])).unwrap();
        assert_eq!(occupied.status, "Occupied");
        assert!(occupied.derived);
        assert!(occupied.id.is_none());

        let unassigned = Room::new("102", ObjectId::new(), None);
        assert!(effective_status(&unassigned, &statuses, &HashSet::new()).is_none());
    }
}
