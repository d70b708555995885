pub mod auth;
pub mod category;
pub mod expense;
pub mod group;
pub mod notification;
