//! # API de limpieza
//!
//! Tareas del personal: habitaciones pendientes de limpieza y marcado como limpias.
//! Basta con rol de personal o de administrador.

use actix_web::{get, put, web, HttpResponse, Responder};
use mongodb::bson::{doc, oid::ObjectId};
use serde::Serialize;

use super::auth::AuthUser;
use super::{AppError, AppResult};
use crate::db::mongodb::collect_all;
use crate::db::{BookingStore, MongoRepo, Room, RoomStatus, RoomType};

#[derive(Serialize, Debug, PartialEq)]
struct TaskRoomType {
    id: String,
    #[serde(rename = "type")]
    name: String,
}

/// Habitación pendiente de limpieza
#[derive(Serialize, Debug, PartialEq)]
struct CleaningTask {
    id: String,
    room_no: String,
    room_type: Option<TaskRoomType>,
    room_status: String,
}

fn cleaning_tasks(rooms: Vec<Room>, types: &[RoomType], status: &RoomStatus) -> Vec<CleaningTask> {
    rooms
        .into_iter()
        .map(|room| CleaningTask {
            id: room.id.to_hex(),
            room_type: types.iter().find(|t| t.id == room.room_type).map(|t| TaskRoomType {
                id: t.id.to_hex(),
                name: t.name.clone(),
            }),
            room_no: room.room_no,
            room_status: status.status.clone(),
        })
        .collect()
}

async fn find_status(repo: &MongoRepo, name: &str) -> AppResult<Option<RoomStatus>> {
    repo.room_statuses()
        .find_one(doc! { "status": name })
        .await
        .map_err(|e| AppError::database("find_room_status_by_name", e))
}

/// Habitaciones con estado "Cleaning". Lista vacía si ese estado no existe.
#[get("/housekeeping/tasks")]
async fn get_cleaning_tasks(repo: web::Data<MongoRepo>, user: AuthUser) -> AppResult<impl Responder> {
    user.require_staff("list_cleaning_tasks")?;

    let Some(cleaning) = find_status(&repo, RoomStatus::CLEANING).await? else {
        tracing::debug!("No existe el estado 'Cleaning'; sin tareas");
        return Ok(HttpResponse::Ok().json(Vec::<CleaningTask>::new()));
    };

    let cursor = repo
        .rooms()
        .find(doc! { "room_status": cleaning.id })
        .sort(doc! { "room_no": 1 })
        .await
        .map_err(|e| AppError::database("list_cleaning_rooms", e))?;
    let rooms = collect_all(cursor, "list_cleaning_rooms").await?;
    let types = repo.list_room_types().await?;

    Ok(HttpResponse::Ok().json(cleaning_tasks(rooms, &types, &cleaning)))
}

/// Marca la habitación como limpia (estado "Available")
///
/// # Errores
/// - `404 Not Found`: Habitación no encontrada
/// - `500 Internal Server Error`: No existe el estado "Available"
#[put("/housekeeping/tasks/{id}/complete")]
async fn complete_task(
    repo: web::Data<MongoRepo>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    user.require_staff("complete_cleaning_task")?;
    let room_id = ObjectId::parse_str(path.into_inner().trim())
        .map_err(|_| AppError::Validation("ID de habitación inválido".to_string()))?;

    let available = find_status(&repo, RoomStatus::AVAILABLE)
        .await?
        .ok_or_else(|| AppError::Internal("El estado 'Available' no existe en la base de datos".to_string()))?;

    let result = repo
        .rooms()
        .update_one(doc! { "_id": room_id }, doc! { "$set": { "room_status": available.id } })
        .await
        .map_err(|e| AppError::database("complete_cleaning_task", e))?;

    if result.matched_count == 0 {
        return Err(AppError::not_found_id("Habitación", &room_id.to_hex()));
    }

    tracing::info!(room_id = %room_id, staff_id = %user.id, "Habitación marcada como limpia");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Habitación marcada como disponible",
        "id": room_id.to_hex(),
        "room_status": available.status
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_cleaning_tasks);
    cfg.service(complete_task);
}
