//! # Manejo de errores
//!
//! Un único `AppError` construido con thiserror. Cada variante decide su código HTTP
//! en [`ResponseError::error_response`] y registra su cadena de causas antes de
//! responder (ver [`log_error_chain`]). Los detalles de la base de datos y de la
//! pasarela de pago se registran pero no se devuelven al cliente.

use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use super::middleware::log_error_chain;

use crate::booking::planner::PlanError;
use crate::payment::PaymentError;

/// Tipos de error de la aplicación con contexto
#[derive(Error, Debug)]
pub enum AppError {
    /// Error de base de datos con la operación que falló
    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: mongodb::error::Error,
    },

    /// Error de validación con campo específico
    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField {
        field: String,
        message: String,
    },

    /// Error de validación general
    #[error("Error de validación: {0}")]
    Validation(String),

    /// No quedan habitaciones libres del tipo pedido; la reserva entera se aborta
    #[error("Tipo de habitación '{room_type_id}' sin disponibilidad: {message}")]
    RoomTypeUnavailable {
        room_type_id: String,
        message: String,
    },

    /// La pasarela informa que la sesión no está pagada
    #[error("Pago no completado (estado '{status}')")]
    PaymentIncomplete { status: String },

    /// Error de autorización con contexto
    #[error("No autorizado para operación '{operation}': {reason}")]
    UnauthorizedWithContext {
        operation: String,
        reason: String,
    },

    /// Error de autorización simple
    #[error("No autorizado: {0}")]
    Unauthorized(String),

    /// Error de recurso no encontrado
    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId {
        resource_type: String,
        id: String,
    },

    /// Error de conflicto (p. ej. número de habitación repetido)
    #[error("Conflicto: {0}")]
    Conflict(String),

    /// Fallo de la pasarela de pago (inaccesible o respuesta inesperada)
    #[error("Error de la pasarela de pago: {0}")]
    Gateway(#[from] PaymentError),

    /// Fallo de escritura que obligó a deshacer la reserva
    #[error("Error de persistencia en '{operation}': {message}")]
    Persistence {
        operation: String,
        message: String,
    },

    /// Error interno con código de rastreo
    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace {
        trace_id: String,
        message: String,
    },

    /// Error interno simple
    #[error("Error interno: {0}")]
    Internal(String),
}

// Métodos helper para crear errores con contexto
impl AppError {
    /// Crea un error de base de datos con contexto de operación
    pub fn database(operation: &str, source: mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }

    /// Crea un error de validación con campo específico
    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Crea un error de autorización con contexto
    pub fn unauthorized_operation(operation: &str, reason: &str) -> Self {
        Self::UnauthorizedWithContext {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Crea un error de no encontrado con ID
    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn persistence(operation: &str, cause: &AppError) -> Self {
        Self::Persistence {
            operation: operation.to_string(),
            message: cause.to_string(),
        }
    }

    /// Crea un error interno con trace ID
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            Self::Validation(_)
            | Self::ValidationWithField { .. }
            | Self::RoomTypeUnavailable { .. }
            | Self::PaymentIncomplete { .. }
            | Self::Conflict(_)
            | Self::Gateway(PaymentError::InvalidSessionId(_)) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::UnauthorizedWithContext { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFoundWithId { .. } => StatusCode::NOT_FOUND,
            Self::Database { .. }
            | Self::Gateway(_)
            | Self::Persistence { .. }
            | Self::InternalWithTrace { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        // Log detallado del error antes de responder
        let (error, message) = match self {
            Self::Database { operation, source } => {
                log_error_chain(source, Some(operation.as_str()));
                ("Error de base de datos", "Error interno del servidor".to_string())
            }
            Self::ValidationWithField { field, message } => {
                tracing::warn!(field = %field, message = %message, "Validation error");
                ("Error de validación", format!("Campo '{}': {}", field, message))
            }
            Self::Validation(message) => {
                tracing::warn!(message = %message, "Validation error");
                ("Error de validación", message.clone())
            }
            Self::RoomTypeUnavailable { room_type_id, message } => {
                tracing::info!(room_type_id = %room_type_id, "Room type unavailable");
                ("Sin disponibilidad", message.clone())
            }
            Self::PaymentIncomplete { status } => {
                tracing::info!(payment_status = %status, "Payment not completed");
                ("Pago no completado", format!("El pago no se ha completado (estado: {})", status))
            }
            Self::UnauthorizedWithContext { operation, reason } => {
                tracing::warn!(operation = %operation, reason = %reason, "Unauthorized access attempt");
                ("No autorizado", format!("Operación '{}': {}", operation, reason))
            }
            Self::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "Unauthorized access attempt");
                ("No autorizado", reason.clone())
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(resource_type = %resource_type, id = %id, "Resource not found");
                ("No encontrado", format!("{} con ID '{}' no encontrado", resource_type, id))
            }
            Self::Conflict(message) => {
                tracing::warn!(message = %message, "Conflict");
                ("Conflicto", message.clone())
            }
            Self::Gateway(source) => {
                tracing::error!(error = %source, "Payment gateway error");
                ("Error de la pasarela de pago", "No se pudo completar la operación con la pasarela de pago".to_string())
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(trace_id = %trace_id, message = %message, "Internal error with trace");
                ("Error interno", format!("Error interno (trace: {})", trace_id))
            }
            // Fallback para otros errores internos
            error => {
                log_error_chain(error, None);
                ("Error", "Error interno del servidor".to_string())
            }
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error.to_string(),
            message,
        })
    }
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

// Conversión automática desde mongodb::error::Error
impl From<mongodb::error::Error> for AppError {
    fn from(error: mongodb::error::Error) -> Self {
        Self::Database {
            operation: "database_operation".to_string(),
            source: error,
        }
    }
}

// Conversión desde errores de ObjectId
impl From<mongodb::bson::oid::Error> for AppError {
    fn from(e: mongodb::bson::oid::Error) -> Self {
        Self::validation_field("ObjectId", &e.to_string())
    }
}

impl From<PlanError> for AppError {
    fn from(error: PlanError) -> Self {
        match &error {
            PlanError::Unavailable { room_type_id, .. } => Self::RoomTypeUnavailable {
                room_type_id: room_type_id.to_hex(),
                message: error.to_string(),
            },
            PlanError::AmountOverflow { .. } => Self::Validation(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use actix_web::http::StatusCode;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::PaymentIncomplete { status: "unpaid".into() }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_found_id("Reserva", "1").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Gateway(PaymentError::NotConfigured).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unavailable_type_is_a_bad_request_naming_the_type() {
        let type_id = ObjectId::new();
        let error = AppError::from(PlanError::Unavailable {
            room_type_id: type_id,
            room_type_name: "Deluxe".to_string(),
        });

        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(error.to_string().contains(&type_id.to_hex()));

        let overflow = AppError::from(PlanError::AmountOverflow { room_type_name: "Palace".to_string() });
        assert!(matches!(overflow, AppError::Validation(_)));
        assert_eq!(
            AppError::Gateway(PaymentError::InvalidSessionId("x".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[actix_web::test]
    async fn gateway_details_are_not_leaked() {
        let error = AppError::Gateway(PaymentError::Rejected {
            status: 401,
            message: "Invalid API Key provided: sk_live_****1234".to_string(),
        });
        let body = to_bytes(error.error_response().into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();

        assert!(!body.contains("sk_live"));
        assert!(body.contains("pasarela de pago"));
    }
}
