//! # Autenticación por token
//!
//! La emisión de tokens pertenece al servicio de autenticación. Aquí solo se
//! resuelve `Authorization: Bearer <token>` contra el campo `access_token` de la
//! colección `users`.

use std::future::Future;
use std::pin::Pin;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use mongodb::bson::{doc, oid::ObjectId};

use super::{AppError, AppResult};
use crate::db::{MongoRepo, Role};

/// Usuario autenticado en la petición actual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthUser {
    pub id: ObjectId,
    pub role: Role,
}

impl AuthUser {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn require_admin(&self, operation: &str) -> AppResult<()> {
        if self.role != Role::Admin {
            return Err(AppError::unauthorized_operation(operation, "Requiere rol de administrador"));
        }
        Ok(())
    }

    pub fn require_staff(&self, operation: &str) -> AppResult<()> {
        if !self.is_elevated() {
            return Err(AppError::unauthorized_operation(operation, "Requiere rol de personal"));
        }
        Ok(())
    }
}

/// Extrae el token Bearer del header Authorization
///
/// # Errores
/// - `Unauthorized`: Si falta el header, es inválido o no tiene el formato correcto
fn extract_token(req: &HttpRequest) -> AppResult<String> {
    let auth_header = req
        .headers()
        .get("authorization")
        .ok_or(AppError::Unauthorized("Falta header Authorization".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Header Authorization inválido".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::Unauthorized("Formato de token inválido".to_string())),
    }
}

/// Busca el usuario dueño del token
pub async fn validate_access_token(repo: &MongoRepo, token: &str) -> AppResult<AuthUser> {
    let user = repo
        .users()
        .find_one(doc! { "access_token": token })
        .await
        .map_err(|e| AppError::database("validate_token", e))?;

    match user {
        Some(user) => Ok(AuthUser {
            id: user.id,
            role: user.role,
        }),
        None => Err(AppError::Unauthorized("Token inválido".to_string())),
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = extract_token(req);
        let repo = req.app_data::<web::Data<MongoRepo>>().cloned();

        Box::pin(async move {
            let token = token?;
            let repo = repo.ok_or_else(|| AppError::Internal("MongoRepo no registrado en la aplicación".to_string()))?;
            validate_access_token(repo.get_ref(), &token).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_token_is_extracted() {
        let req = TestRequest::default()
            .insert_header(("authorization", "Bearer abc123"))
            .to_http_request();
        assert_eq!(extract_token(&req).unwrap(), "abc123");
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        let missing = TestRequest::default().to_http_request();
        assert!(matches!(extract_token(&missing), Err(AppError::Unauthorized(_))));

        let basic = TestRequest::default()
            .insert_header(("authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(matches!(extract_token(&basic), Err(AppError::Unauthorized(_))));

        let empty = TestRequest::default()
            .insert_header(("authorization", "Bearer "))
            .to_http_request();
        assert!(matches!(extract_token(&empty), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn role_checks() {
        let guest = AuthUser { id: ObjectId::new(), role: Role::User };
        let staff = AuthUser { id: ObjectId::new(), role: Role::Staff };
        let admin = AuthUser { id: ObjectId::new(), role: Role::Admin };

        assert!(guest.require_staff("tasks").is_err());
        assert!(staff.require_staff("tasks").is_ok());
        assert!(staff.require_admin("rooms").is_err());
        assert!(admin.require_admin("rooms").is_ok());
    }
}
