//! Cerrojos por tipo de habitación.
//!
//! Entre "leer las reservas que se solapan" y "escribir las nuevas filas" dos
//! peticiones concurrentes podrían ver libre la misma habitación. Mientras una
//! petición asigna habitaciones de un tipo, las demás que piden ese tipo esperan.
//! Válido para un único proceso con una única conexión a MongoDB.

use std::sync::Arc;

use dashmap::DashMap;
use mongodb::bson::oid::ObjectId;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct RoomTypeLocks {
    locks: DashMap<ObjectId, Arc<Mutex<()>>>,
}

/// Cerrojos tomados; se liberan al soltar el valor.
#[derive(Debug)]
pub struct RoomTypeGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RoomTypeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toma los cerrojos de todos los tipos, siempre en orden ascendente de ID
    /// para que dos carritos con los mismos tipos no se bloqueen mutuamente.
    pub async fn acquire(&self, room_type_ids: &[ObjectId]) -> RoomTypeGuard {
        let mut ids = room_type_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut guards = Vec::with_capacity(ids.len());
        for id in ids {
            let lock = self.locks.entry(id).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        RoomTypeGuard { _guards: guards }
    }
}
