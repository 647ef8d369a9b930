use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::{Client, Collection, Cursor, Database};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::env;

use super::models::{Booking, BookingStatus, Payment, PaymentStatus, ReservedRoom, Room, RoomStatus, RoomType, User};
use super::store::BookingStore;
use crate::api::AppError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init() -> Result<MongoRepo> {
        let mongo_uri = env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let client = Client::with_uri_str(&mongo_uri)
            .await
            .map_err(|e| AppError::Internal(format!("Error conectando a MongoDB: {}", e)))?;

        let database_name = env::var("MONGODB_DATABASE")
            .unwrap_or_else(|_| "hotel_reservation".to_string());

        let database = client.database(&database_name);

        // Test connection
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::Internal(format!("Error validando conexión MongoDB: {}", e)))?;

        tracing::info!(database = %database_name, "Conexión a MongoDB establecida exitosamente");

        Ok(MongoRepo { client, database })
    }

    pub fn users(&self) -> Collection<User> {
        self.database.collection("users")
    }

    pub fn room_types(&self) -> Collection<RoomType> {
        self.database.collection("room_types")
    }

    pub fn room_statuses(&self) -> Collection<RoomStatus> {
        self.database.collection("room_statuses")
    }

    pub fn rooms(&self) -> Collection<Room> {
        self.database.collection("rooms")
    }

    pub fn bookings(&self) -> Collection<Booking> {
        self.database.collection("bookings")
    }

    pub fn reserved_rooms(&self) -> Collection<ReservedRoom> {
        self.database.collection("reserved_rooms")
    }

    pub fn payments(&self) -> Collection<Payment> {
        self.database.collection("payments")
    }

    pub async fn create_indexes(&self) -> Result<()> {
        use mongodb::{options::IndexOptions, IndexModel};

        let user_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "access_token": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build(),
        ];
        self.users()
            .create_indexes(user_indexes)
            .await
            .map_err(|e| AppError::database("create_indexes_users", e))?;

        self.rooms()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "room_no": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(|e| AppError::database("create_indexes_rooms", e))?;

        // El filtro de solapamiento usa room_id + rango de fechas
        let reserved_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "room_id": 1, "check_in": 1, "check_out": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "booking_id": 1 })
                .build(),
        ];
        self.reserved_rooms()
            .create_indexes(reserved_indexes)
            .await
            .map_err(|e| AppError::database("create_indexes_reserved_rooms", e))?;

        self.bookings()
            .create_index(IndexModel::builder().keys(doc! { "customer_id": 1 }).build())
            .await
            .map_err(|e| AppError::database("create_indexes_bookings", e))?;

        self.payments()
            .create_index(IndexModel::builder().keys(doc! { "booking_id": 1 }).build())
            .await
            .map_err(|e| AppError::database("create_indexes_payments", e))?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }

    // Función auxiliar para obtener timestamp actual
    pub fn current_timestamp() -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Fechas como `YYYY-MM-DD`: el orden lexicográfico coincide con el cronológico.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `[check_in, check_out)` se solapa con `[from, to)` sii `check_in < to && check_out > from`.
fn overlap_filter(from: NaiveDate, to: NaiveDate) -> Document {
    doc! {
        "check_in": { "$lt": date_key(to) },
        "check_out": { "$gt": date_key(from) },
    }
}

/// Recorre un cursor y deserializa todos los documentos.
pub async fn collect_all<T>(mut cursor: Cursor<T>, operation: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::database(operation, e))?
    {
        let item = cursor
            .deserialize_current()
            .map_err(|e| AppError::database(operation, e))?;
        results.push(item);
    }
    Ok(results)
}

#[async_trait]
impl BookingStore for MongoRepo {
    async fn find_room_type(&self, id: ObjectId) -> Result<Option<RoomType>> {
        self.room_types()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_room_type", e))
    }

    async fn list_room_types(&self) -> Result<Vec<RoomType>> {
        let cursor = self
            .room_types()
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| AppError::database("list_room_types", e))?;
        collect_all(cursor, "list_room_types").await
    }

    async fn list_rooms(&self) -> Result<Vec<Room>> {
        let cursor = self
            .rooms()
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| AppError::database("list_rooms", e))?;
        collect_all(cursor, "list_rooms").await
    }

    async fn rooms_of_type(&self, room_type_id: ObjectId) -> Result<Vec<Room>> {
        let cursor = self
            .rooms()
            .find(doc! { "room_type": room_type_id })
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| AppError::database("list_rooms_of_type", e))?;
        collect_all(cursor, "list_rooms_of_type").await
    }

    async fn rooms_by_ids(&self, ids: &[ObjectId]) -> Result<Vec<Room>> {
        let cursor = self
            .rooms()
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await
            .map_err(|e| AppError::database("find_rooms_by_ids", e))?;
        collect_all(cursor, "find_rooms_by_ids").await
    }

    async fn overlapping_reservations(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ReservedRoom>> {
        let cursor = self
            .reserved_rooms()
            .find(overlap_filter(from, to))
            .await
            .map_err(|e| AppError::database("overlapping_reservations", e))?;
        collect_all(cursor, "overlapping_reservations").await
    }

    async fn overlapping_room_ids(&self, from: NaiveDate, to: NaiveDate) -> Result<HashSet<ObjectId>> {
        let values = self
            .reserved_rooms()
            .distinct("room_id", overlap_filter(from, to))
            .await
            .map_err(|e| AppError::database("overlapping_room_ids", e))?;

        Ok(values
            .into_iter()
            .filter_map(|value| match value {
                Bson::ObjectId(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings()
            .insert_one(booking)
            .await
            .map_err(|e| AppError::database("insert_booking", e))?;
        Ok(())
    }

    async fn delete_booking(&self, id: ObjectId) -> Result<()> {
        self.bookings()
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("delete_booking", e))?;
        Ok(())
    }

    async fn insert_reserved_rooms(&self, rooms: &[ReservedRoom]) -> Result<()> {
        if rooms.is_empty() {
            return Ok(());
        }
        self.reserved_rooms()
            .insert_many(rooms)
            .await
            .map_err(|e| AppError::database("insert_reserved_rooms", e))?;
        Ok(())
    }

    async fn delete_reserved_rooms(&self, booking_id: ObjectId) -> Result<u64> {
        let result = self
            .reserved_rooms()
            .delete_many(doc! { "booking_id": booking_id })
            .await
            .map_err(|e| AppError::database("delete_reserved_rooms", e))?;
        Ok(result.deleted_count)
    }

    async fn find_booking(&self, id: ObjectId) -> Result<Option<Booking>> {
        self.bookings()
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("find_booking", e))
    }

    async fn bookings_for_customer(&self, customer_id: ObjectId) -> Result<Vec<Booking>> {
        let cursor = self
            .bookings()
            .find(doc! { "customer_id": customer_id })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .map_err(|e| AppError::database("list_customer_bookings", e))?;
        collect_all(cursor, "list_customer_bookings").await
    }

    async fn all_bookings(&self) -> Result<Vec<Booking>> {
        let cursor = self
            .bookings()
            .find(doc! {})
            .sort(doc! { "created_at": -1, "_id": -1 })
            .await
            .map_err(|e| AppError::database("list_all_bookings", e))?;
        collect_all(cursor, "list_all_bookings").await
    }

    async fn reserved_rooms_for_bookings(&self, booking_ids: &[ObjectId]) -> Result<Vec<ReservedRoom>> {
        let cursor = self
            .reserved_rooms()
            .find(doc! { "booking_id": { "$in": booking_ids.to_vec() } })
            .sort(doc! { "_id": 1 })
            .await
            .map_err(|e| AppError::database("list_reserved_rooms", e))?;
        collect_all(cursor, "list_reserved_rooms").await
    }

    async fn confirm_paid(&self, id: ObjectId) -> Result<bool> {
        let result = self
            .bookings()
            .update_one(
                doc! {
                    "_id": id,
                    "booking_status": BookingStatus::Pending.as_str(),
                    "payment_status": { "$ne": PaymentStatus::Paid.as_str() }
                },
                doc! {
                    "$set": {
                        "booking_status": BookingStatus::Confirmed.as_str(),
                        "payment_status": PaymentStatus::Paid.as_str()
                    }
                },
            )
            .await
            .map_err(|e| AppError::database("confirm_booking", e))?;
        Ok(result.modified_count == 1)
    }

    async fn mark_cancelled(&self, id: ObjectId) -> Result<bool> {
        let result = self
            .bookings()
            .update_one(
                doc! { "_id": id, "booking_status": { "$ne": BookingStatus::Cancelled.as_str() } },
                doc! { "$set": { "booking_status": BookingStatus::Cancelled.as_str() } },
            )
            .await
            .map_err(|e| AppError::database("cancel_booking", e))?;
        Ok(result.modified_count == 1)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        self.payments()
            .insert_one(payment)
            .await
            .map_err(|e| AppError::database("insert_payment", e))?;
        Ok(())
    }
}
