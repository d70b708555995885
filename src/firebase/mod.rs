//! Google Firebase integrations: phone sign-in tokens and push delivery.

pub mod messaging;
pub mod phone;

pub use messaging::{FcmGateway, PushGateway, PushNotification, PushReport};
pub use phone::{FirebaseTokenVerifier, PhoneTokenVerifier, VerifiedPhone};
