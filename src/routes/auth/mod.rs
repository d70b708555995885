mod handler;
pub mod model;

pub use handler::{link_phone, login, me, phone_login, register};
