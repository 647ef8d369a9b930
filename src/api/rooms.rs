//! # API de inventario de habitaciones
//!
//! Gestión de tipos, estados y habitaciones físicas. Todas las rutas requieren rol de
//! administrador.
//!
//! El listado de habitaciones muestra el estado *efectivo*: si alguna reserva cubre
//! el día de hoy la habitación aparece como "Occupied", aunque en la base de datos
//! conserve su estado guardado.

use std::collections::HashSet;

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::{Days, NaiveDate, Utc};
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::auth::AuthUser;
use super::{AppError, AppResult};
use crate::booking::availability::{effective_status, EffectiveStatus};
use crate::booking::service::RoomTypeSummary;
use crate::db::mongodb::collect_all;
use crate::db::{BookingStore, MongoRepo, Room, RoomStatus, RoomType};

fn default_max_adults() -> i32 {
    2
}

#[derive(Deserialize)]
struct CreateRoomType {
    #[serde(rename = "type")]
    name: String,
    price: Decimal,
    #[serde(default = "default_max_adults")]
    max_adults: i32,
    #[serde(default)]
    max_children: i32,
    description: Option<String>,
    image: Option<String>,
}

#[derive(Deserialize, Default)]
struct UpdateRoomType {
    #[serde(rename = "type")]
    name: Option<String>,
    price: Option<Decimal>,
    max_adults: Option<i32>,
    max_children: Option<i32>,
    description: Option<String>,
    image: Option<String>,
}

#[derive(Deserialize)]
struct RoomStatusRequest {
    status: String,
}

#[derive(Deserialize)]
struct CreateRoom {
    room_no: String,
    room_type: String,
    room_status: Option<String>,
}

#[derive(Deserialize, Default)]
struct UpdateRoom {
    room_no: Option<String>,
    room_type: Option<String>,
    room_status: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct RoomTypeResponse {
    id: String,
    #[serde(rename = "type")]
    name: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    max_adults: i32,
    max_children: i32,
    description: Option<String>,
    image: Option<String>,
    created_at: i64,
}

impl From<RoomType> for RoomTypeResponse {
    fn from(room_type: RoomType) -> Self {
        RoomTypeResponse {
            id: room_type.id.to_hex(),
            name: room_type.name,
            price: room_type.price,
            max_adults: room_type.max_adults,
            max_children: room_type.max_children,
            description: room_type.description,
            image: room_type.image,
            created_at: room_type.created_at,
        }
    }
}

#[derive(Serialize)]
struct RoomStatusResponse {
    id: String,
    status: String,
}

impl From<RoomStatus> for RoomStatusResponse {
    fn from(status: RoomStatus) -> Self {
        RoomStatusResponse {
            id: status.id.to_hex(),
            status: status.status,
        }
    }
}

/// Habitación con su tipo resumido y su estado efectivo
#[derive(Serialize, Debug, PartialEq)]
pub struct RoomResponse {
    pub id: String,
    pub room_no: String,
    pub room_type: Option<RoomTypeSummary>,
    pub room_status: Option<EffectiveStatus>,
}

/// Une cada habitación con su tipo y con el estado que corresponde hoy
fn room_responses(
    rooms: Vec<Room>,
    types: &[RoomType],
    statuses: &[RoomStatus],
    occupied_today: &HashSet<ObjectId>,
) -> Vec<RoomResponse> {
    rooms
        .into_iter()
        .map(|room| RoomResponse {
            id: room.id.to_hex(),
            room_type: types.iter().find(|t| t.id == room.room_type).map(RoomTypeSummary::from),
            room_status: effective_status(&room, statuses, occupied_today),
            room_no: room.room_no,
        })
        .collect()
}

/// `[hoy, mañana)` para calcular qué habitaciones están ocupadas ahora
fn today_range() -> AppResult<(NaiveDate, NaiveDate)> {
    let today = Utc::now().date_naive();
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| AppError::Internal("Fecha fuera de rango".to_string()))?;
    Ok((today, tomorrow))
}

fn parse_id(resource: &str, id: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(id.trim())
        .map_err(|_| AppError::Validation(format!("ID de {} inválido", resource)))
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

/// Precio máximo por noche admitido para un tipo de habitación
const MAX_PRICE_PER_NIGHT: i64 = 1_000_000;

fn validate_room_type_fields(price: Option<Decimal>, max_adults: Option<i32>, max_children: Option<i32>) -> AppResult<()> {
    if matches!(price, Some(p) if p < Decimal::ZERO) {
        return Err(AppError::validation_field("price", "No puede ser negativo"));
    }
    if matches!(price, Some(p) if p > Decimal::from(MAX_PRICE_PER_NIGHT)) {
        return Err(AppError::validation_field("price", "Supera el máximo permitido (1000000)"));
    }
    if matches!(max_adults, Some(n) if n < 1) {
        return Err(AppError::validation_field("max_adults", "Debe ser al menos 1"));
    }
    if matches!(max_children, Some(n) if n < 0) {
        return Err(AppError::validation_field("max_children", "No puede ser negativo"));
    }
    Ok(())
}

impl UpdateRoomType {
    /// Documento `$set` con solo los campos presentes
    fn into_set(self) -> AppResult<Document> {
        validate_room_type_fields(self.price, self.max_adults, self.max_children)?;

        let mut set = Document::new();
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::validation_field("type", "No puede estar vacío"));
            }
            set.insert("type", name.trim());
        }
        if let Some(price) = self.price {
            set.insert("price", price.to_string());
        }
        if let Some(max_adults) = self.max_adults {
            set.insert("max_adults", max_adults);
        }
        if let Some(max_children) = self.max_children {
            set.insert("max_children", max_children);
        }
        if let Some(description) = self.description {
            set.insert("description", description);
        }
        if let Some(image) = self.image {
            set.insert("image", image);
        }

        if set.is_empty() {
            return Err(AppError::Validation("No hay campos para actualizar".to_string()));
        }
        Ok(set)
    }
}

async fn ensure_room_type(repo: &MongoRepo, id: ObjectId) -> AppResult<()> {
    repo.find_room_type(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found_id("Tipo de habitación", &id.to_hex()))
}

async fn ensure_room_status(repo: &MongoRepo, id: ObjectId) -> AppResult<()> {
    repo.room_statuses()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("find_room_status", e))?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found_id("Estado de habitación", &id.to_hex()))
}

// --- Tipos de habitación ---

#[post("/admin/room-types")]
async fn create_room_type(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    data: web::Json<CreateRoomType>,
) -> AppResult<impl Responder> {
    user.require_admin("create_room_type")?;
    let data = data.into_inner();

    if data.name.trim().is_empty() {
        return Err(AppError::validation_field("type", "Es requerido"));
    }
    validate_room_type_fields(Some(data.price), Some(data.max_adults), Some(data.max_children))?;

    let mut room_type = RoomType::new(data.name.trim(), data.price, data.max_adults, data.max_children);
    room_type.description = data.description;
    room_type.image = data.image;

    repo.room_types()
        .insert_one(&room_type)
        .await
        .map_err(|e| AppError::database("insert_room_type", e))?;

    tracing::info!(room_type_id = %room_type.id, name = %room_type.name, "Tipo de habitación creado");
    Ok(HttpResponse::Created().json(RoomTypeResponse::from(room_type)))
}

#[get("/admin/room-types")]
async fn get_room_types(repo: web::Data<MongoRepo>, user: AuthUser) -> AppResult<impl Responder> {
    user.require_admin("list_room_types")?;

    let types: Vec<RoomTypeResponse> = repo
        .list_room_types()
        .await?
        .into_iter()
        .map(RoomTypeResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(types))
}

#[put("/admin/room-types/{id}")]
async fn update_room_type(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
    data: web::Json<UpdateRoomType>,
) -> AppResult<impl Responder> {
    user.require_admin("update_room_type")?;
    let id = parse_id("tipo de habitación", &path.into_inner())?;
    let set = data.into_inner().into_set()?;

    let result = repo
        .room_types()
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await
        .map_err(|e| AppError::database("update_room_type", e))?;

    if result.matched_count == 0 {
        return Err(AppError::not_found_id("Tipo de habitación", &id.to_hex()));
    }

    let updated = repo
        .find_room_type(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Tipo de habitación", &id.to_hex()))?;

    Ok(HttpResponse::Ok().json(RoomTypeResponse::from(updated)))
}

/// Un tipo con habitaciones asignadas no se puede borrar
#[delete("/admin/room-types/{id}")]
async fn delete_room_type(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    user.require_admin("delete_room_type")?;
    let id = parse_id("tipo de habitación", &path.into_inner())?;

    let in_use = repo
        .rooms()
        .count_documents(doc! { "room_type": id })
        .await
        .map_err(|e| AppError::database("count_rooms_of_type", e))?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "El tipo tiene {} habitaciones asignadas",
            in_use
        )));
    }

    let result = repo
        .room_types()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("delete_room_type", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::not_found_id("Tipo de habitación", &id.to_hex()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Tipo de habitación eliminado",
        "id": id.to_hex()
    })))
}

// --- Estados de habitación ---

#[post("/admin/room-statuses")]
async fn create_room_status(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    data: web::Json<RoomStatusRequest>,
) -> AppResult<impl Responder> {
    user.require_admin("create_room_status")?;

    let name = data.status.trim();
    if name.is_empty() {
        return Err(AppError::validation_field("status", "Es requerido"));
    }
    // "Occupied" solo existe como estado calculado
    if name.eq_ignore_ascii_case(RoomStatus::OCCUPIED) {
        return Err(AppError::validation_field("status", "'Occupied' se calcula a partir de las reservas"));
    }

    let status = RoomStatus::new(name);
    repo.room_statuses()
        .insert_one(&status)
        .await
        .map_err(|e| AppError::database("insert_room_status", e))?;

    Ok(HttpResponse::Created().json(RoomStatusResponse::from(status)))
}

#[get("/admin/room-statuses")]
async fn get_room_statuses(repo: web::Data<MongoRepo>, user: AuthUser) -> AppResult<impl Responder> {
    user.require_admin("list_room_statuses")?;

    let cursor = repo
        .room_statuses()
        .find(doc! {})
        .sort(doc! { "_id": 1 })
        .await
        .map_err(|e| AppError::database("list_room_statuses", e))?;
    let statuses: Vec<RoomStatusResponse> = collect_all(cursor, "list_room_statuses")
        .await?
        .into_iter()
        .map(RoomStatusResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(statuses))
}

#[put("/admin/room-statuses/{id}")]
async fn update_room_status(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
    data: web::Json<RoomStatusRequest>,
) -> AppResult<impl Responder> {
    user.require_admin("update_room_status")?;
    let id = parse_id("estado", &path.into_inner())?;

    let name = data.status.trim();
    if name.is_empty() {
        return Err(AppError::validation_field("status", "Es requerido"));
    }

    let result = repo
        .room_statuses()
        .update_one(doc! { "_id": id }, doc! { "$set": { "status": name } })
        .await
        .map_err(|e| AppError::database("update_room_status", e))?;

    if result.matched_count == 0 {
        return Err(AppError::not_found_id("Estado de habitación", &id.to_hex()));
    }

    Ok(HttpResponse::Ok().json(RoomStatusResponse {
        id: id.to_hex(),
        status: name.to_string(),
    }))
}

#[delete("/admin/room-statuses/{id}")]
async fn delete_room_status(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    user.require_admin("delete_room_status")?;
    let id = parse_id("estado", &path.into_inner())?;

    let in_use = repo
        .rooms()
        .count_documents(doc! { "room_status": id })
        .await
        .map_err(|e| AppError::database("count_rooms_with_status", e))?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "El estado está asignado a {} habitaciones",
            in_use
        )));
    }

    let result = repo
        .room_statuses()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("delete_room_status", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::not_found_id("Estado de habitación", &id.to_hex()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Estado de habitación eliminado",
        "id": id.to_hex()
    })))
}

// --- Habitaciones físicas ---

#[post("/admin/rooms")]
async fn create_room(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    data: web::Json<CreateRoom>,
) -> AppResult<impl Responder> {
    user.require_admin("create_room")?;

    let room_no = data.room_no.trim();
    if room_no.is_empty() {
        return Err(AppError::validation_field("room_no", "Es requerido"));
    }

    let room_type = parse_id("tipo de habitación", &data.room_type)?;
    ensure_room_type(&repo, room_type).await?;

    let room_status = match data.room_status.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => {
            let id = parse_id("estado", id)?;
            ensure_room_status(&repo, id).await?;
            Some(id)
        }
        _ => None,
    };

    let existing = repo
        .rooms()
        .find_one(doc! { "room_no": room_no })
        .await
        .map_err(|e| AppError::database("find_room_by_number", e))?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!("La habitación '{}' ya existe", room_no)));
    }

    let room = Room::new(room_no, room_type, room_status);
    repo.rooms().insert_one(&room).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::Conflict(format!("La habitación '{}' ya existe", room.room_no))
        } else {
            AppError::database("insert_room", e)
        }
    })?;

    tracing::info!(room_id = %room.id, room_no = %room.room_no, "Habitación creada");
    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": room.id.to_hex(),
        "room_no": room.room_no,
        "room_type": room_type.to_hex(),
        "room_status": room_status.map(|id| id.to_hex()),
    })))
}

/// Habitaciones con su tipo y su estado efectivo de hoy
#[get("/admin/rooms")]
async fn get_rooms(repo: web::Data<MongoRepo>, user: AuthUser) -> AppResult<impl Responder> {
    user.require_admin("list_rooms")?;

    let rooms = repo.list_rooms().await?;
    let types = repo.list_room_types().await?;
    let cursor = repo
        .room_statuses()
        .find(doc! {})
        .await
        .map_err(|e| AppError::database("list_room_statuses", e))?;
    let statuses = collect_all(cursor, "list_room_statuses").await?;

    let (today, tomorrow) = today_range()?;
    let occupied = repo.overlapping_room_ids(today, tomorrow).await?;

    Ok(HttpResponse::Ok().json(room_responses(rooms, &types, &statuses, &occupied)))
}

#[put("/admin/rooms/{id}")]
async fn update_room(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
    data: web::Json<UpdateRoom>,
) -> AppResult<impl Responder> {
    user.require_admin("update_room")?;
    let id = parse_id("habitación", &path.into_inner())?;
    let data = data.into_inner();

    let mut set = Document::new();
    if let Some(room_no) = data.room_no.as_deref().map(str::trim) {
        if room_no.is_empty() {
            return Err(AppError::validation_field("room_no", "No puede estar vacío"));
        }
        let taken = repo
            .rooms()
            .find_one(doc! { "room_no": room_no, "_id": { "$ne": id } })
            .await
            .map_err(|e| AppError::database("find_room_by_number", e))?;
        if taken.is_some() {
            return Err(AppError::Conflict(format!("La habitación '{}' ya existe", room_no)));
        }
        set.insert("room_no", room_no);
    }
    if let Some(room_type) = data.room_type.as_deref() {
        let room_type = parse_id("tipo de habitación", room_type)?;
        ensure_room_type(&repo, room_type).await?;
        set.insert("room_type", room_type);
    }
    if let Some(room_status) = data.room_status.as_deref().map(str::trim) {
        // Cadena vacía: la habitación queda sin estado
        if room_status.is_empty() {
            set.insert("room_status", Bson::Null);
        } else {
            let room_status = parse_id("estado", room_status)?;
            ensure_room_status(&repo, room_status).await?;
            set.insert("room_status", room_status);
        }
    }

    if set.is_empty() {
        return Err(AppError::Validation("No hay campos para actualizar".to_string()));
    }

    let result = repo
        .rooms()
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("El número de habitación ya existe".to_string())
            } else {
                AppError::database("update_room", e)
            }
        })?;

    if result.matched_count == 0 {
        return Err(AppError::not_found_id("Habitación", &id.to_hex()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Habitación actualizada",
        "id": id.to_hex()
    })))
}

/// Una habitación con reservas registradas no se puede borrar
#[delete("/admin/rooms/{id}")]
async fn delete_room(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    user.require_admin("delete_room")?;
    let id = parse_id("habitación", &path.into_inner())?;

    let reserved = repo
        .reserved_rooms()
        .count_documents(doc! { "room_id": id })
        .await
        .map_err(|e| AppError::database("count_room_reservations", e))?;
    if reserved > 0 {
        return Err(AppError::Conflict("La habitación tiene reservas registradas".to_string()));
    }

    let result = repo
        .rooms()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("delete_room", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::not_found_id("Habitación", &id.to_hex()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Habitación eliminada",
        "id": id.to_hex()
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_room_type);
    cfg.service(get_room_types);
    cfg.service(update_room_type);
    cfg.service(delete_room_type);
    cfg.service(create_room_status);
    cfg.service(get_room_statuses);
    cfg.service(update_room_status);
    cfg.service(delete_room_status);
    cfg.service(create_room);
    cfg.service(get_rooms);
    cfg.service(update_room);
    cfg.service(delete_room);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_listing_overlays_occupied_rooms() {
        let deluxe = RoomType::new("Deluxe", Decimal::new(100, 0), 2, 0);
        let cleaning = RoomStatus::new(RoomStatus::CLEANING);
        let d1 = Room::new("D1", deluxe.id, Some(cleaning.id));
        let d2 = Room::new("D2", deluxe.id, Some(cleaning.id));
        let orphan = Room::new("X1", ObjectId::new(), None);
        let occupied = HashSet::from([d2.id]);

        let rooms = room_responses(
            vec![d1, d2, orphan],
            &[deluxe.clone()],
            &[cleaning],
            &occupied,
        );

        assert_eq!(rooms[0].room_status.as_ref().map(|s| s.status.as_str()), Some("Cleaning"));
        assert_eq!(rooms[1].room_status.as_ref().map(|s| s.status.as_str()), Some("Occupied"));
        assert_eq!(rooms[0].room_type, Some(RoomTypeSummary::from(&deluxe)));
        assert!(rooms[2].room_type.is_none());
        assert!(rooms[2].room_status.is_none());
    }

    #[test]
    fn room_type_update_only_sets_present_fields() {
        let update = UpdateRoomType {
            price: Some(Decimal::new(12550, 2)),
            max_children: Some(1),
            ..Default::default()
        };
        let set = update.into_set().unwrap();

        assert_eq!(set.get_str("price").unwrap(), "125.50");
        assert_eq!(set.get_i32("max_children").unwrap(), 1);
        assert!(!set.contains_key("type"));

        assert!(UpdateRoomType::default().into_set().is_err());

        let negative = UpdateRoomType {
            price: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert!(matches!(negative.into_set(), Err(AppError::ValidationWithField { .. })));

        let absurd = UpdateRoomType {
            price: Some(Decimal::MAX),
            ..Default::default()
        };
        match absurd.into_set() {
            Err(AppError::ValidationWithField { field, .. }) => assert_eq!(field, "price"),
            other => panic!("resultado inesperado: {:?}", other),
        }
        assert!(validate_room_type_fields(Some(Decimal::from(MAX_PRICE_PER_NIGHT)), None, None).is_ok());
    }

    #[test]
    fn create_room_type_defaults_capacity() {
        let body: CreateRoomType = serde_json::from_value(serde_json::json!({
            "type": "Suite",
            "price": 250.5
        }))
        .unwrap();

        assert_eq!(body.max_adults, 2);
        assert_eq!(body.max_children, 0);
        assert_eq!(body.price, Decimal::new(2505, 1));
        assert!(validate_room_type_fields(Some(Decimal::ZERO), Some(1), Some(0)).is_ok());
    }

    #[test]
    fn room_type_response_uses_numeric_price() {
        let suite = RoomType::new("Suite", Decimal::new(25050, 2), 4, 2);
        let json = serde_json::to_value(RoomTypeResponse::from(suite)).unwrap();

        assert_eq!(json["type"], "Suite");
        assert_eq!(json["price"], serde_json::json!(250.5));
    }
}
