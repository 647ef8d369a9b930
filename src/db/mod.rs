pub mod models;
pub mod mongodb;
pub mod store;
#[cfg(test)]
pub mod memory;

pub use models::{
    Booking, BookingStatus, Payment, PaymentProvider, PaymentRecordStatus, PaymentStatus,
    ReservedRoom, Role, Room, RoomStatus, RoomType, User,
};
pub use mongodb::MongoRepo;
pub use store::BookingStore;
