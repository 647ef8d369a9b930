//! # API de usuarios
//!
//! Perfil del usuario autenticado. La edición del perfil (contraseña, avatar) la
//! gestiona el servicio de autenticación.

use actix_web::{get, web, HttpResponse, Responder};
use mongodb::bson::doc;
use serde::Serialize;

use super::auth::AuthUser;
use super::{AppError, AppResult};
use crate::db::{MongoRepo, Role, User};

/// Perfil público: nunca incluye la contraseña ni el token de acceso
#[derive(Serialize, Debug, PartialEq)]
struct ProfileResponse {
    #[serde(rename = "_id")]
    id: String,
    full_name: String,
    email: String,
    role: Role,
    is_verified: bool,
    created_at: i64,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        ProfileResponse {
            id: user.id.to_hex(),
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Perfil del usuario dueño del token
///
/// # Errores
/// - `401 Unauthorized`: Token ausente o inválido
/// - `404 Not Found`: El usuario se borró después de autenticarse
#[get("/users/profile")]
async fn get_profile(repo: web::Data<MongoRepo>, user: AuthUser) -> AppResult<impl Responder> {
    let profile = repo
        .users()
        .find_one(doc! { "_id": user.id })
        .await
        .map_err(|e| AppError::database("get_user_profile", e))?
        .ok_or_else(|| AppError::not_found_id("Usuario", &user.id.to_hex()))?;

    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_profile);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn profile_hides_credentials() {
        let user = User {
            id: ObjectId::new(),
            full_name: "Ana Pérez".to_string(),
            email: "ana@hotel.test".to_string(),
            password: "$2a$10$hash".to_string(),
            role: Role::Staff,
            is_verified: true,
            verification_token: Some("verify".to_string()),
            access_token: Some("secret-token".to_string()),
            created_at: 1_700_000_000,
        };
        let id = user.id.to_hex();

        let json = serde_json::to_value(ProfileResponse::from(user)).unwrap();

        assert_eq!(json["_id"], id);
        assert_eq!(json["full_name"], "Ana Pérez");
        assert_eq!(json["role"], "staff");
        assert!(json.get("password").is_none());
        assert!(json.get("access_token").is_none());
        assert!(json.get("verification_token").is_none());
    }
}
