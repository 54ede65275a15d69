pub mod health;
pub use self::health::health;

pub mod home;
pub mod user;
