//! # Modelos de documentos MongoDB
//!
//! Cada estructura corresponde a una colección. Los identificadores se generan en la
//! aplicación (`ObjectId::new()`) antes de insertar, de modo que un documento siempre
//! tiene `_id` y no hace falta desenvolver `inserted_id`.

use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::mongodb::MongoRepo;

/// Tipo de habitación (Deluxe, Suite, ...). El precio es por noche.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomType {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub name: String,
    pub price: Decimal,
    pub max_adults: i32,
    pub max_children: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub created_at: i64,
}

impl RoomType {
    pub fn new(name: &str, price: Decimal, max_adults: i32, max_children: i32) -> Self {
        RoomType {
            id: ObjectId::new(),
            name: name.to_string(),
            price,
            max_adults,
            max_children,
            description: None,
            image: None,
            created_at: MongoRepo::current_timestamp(),
        }
    }
}

/// Estado persistido de una habitación ("Available", "Cleaning", ...).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomStatus {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub status: String,
    pub created_at: i64,
}

impl RoomStatus {
    pub const AVAILABLE: &'static str = "Available";
    pub const CLEANING: &'static str = "Cleaning";
    /// Estado derivado, nunca se guarda en la base de datos.
    pub const OCCUPIED: &'static str = "Occupied";

    pub fn new(status: &str) -> Self {
        RoomStatus {
            id: ObjectId::new(),
            status: status.to_string(),
            created_at: MongoRepo::current_timestamp(),
        }
    }
}

/// Habitación física.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub room_no: String,
    pub room_type: ObjectId,
    #[serde(default)]
    pub room_status: Option<ObjectId>,
    pub created_at: i64,
}

impl Room {
    pub fn new(room_no: &str, room_type: ObjectId, room_status: Option<ObjectId>) -> Self {
        Room {
            id: ObjectId::new(),
            room_no: room_no.to_string(),
            room_type,
            room_status,
            created_at: MongoRepo::current_timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    CheckedIn,
    CheckedOut,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::CheckedIn => "checked_in",
            BookingStatus::CheckedOut => "checked_out",
        }
    }
}

/// Reserva de un cliente. `total_amount` se calcula una sola vez al crearla.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub customer_id: ObjectId,
    pub total_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub created_at: i64,
}

impl Booking {
    pub fn pending(customer_id: ObjectId, total_amount: Decimal) -> Self {
        Booking {
            id: ObjectId::new(),
            customer_id,
            total_amount,
            payment_status: PaymentStatus::Pending,
            booking_status: BookingStatus::Pending,
            created_at: MongoRepo::current_timestamp(),
        }
    }
}

/// Una habitación física ocupada en `[check_in, check_out)` por una reserva.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReservedRoom {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub booking_id: ObjectId,
    pub room_id: ObjectId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub price_per_night: Decimal,
    pub adults_count: i32,
    pub children_count: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
    Cash,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Success,
    Failed,
}

/// Registro de auditoría de un pago verificado. Nunca se borra.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub booking_id: ObjectId,
    pub amount: Decimal,
    pub provider: PaymentProvider,
    pub transaction_id: String,
    pub status: PaymentRecordStatus,
    pub created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
    Staff,
}

impl Role {
    /// Administradores y personal pueden consultar reservas ajenas.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

/// Usuario del sistema. El alta, el hash de la contraseña y la emisión de
/// `access_token` los gestiona el servicio de autenticación.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub verification_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    pub created_at: i64,
}
