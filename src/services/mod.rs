//! External collaborator traits and their in-memory implementations.

pub mod geocode;
pub mod images;
pub mod mail;
pub mod payment;

pub use geocode::{Geocoder, InMemoryGeocoder};
pub use images::{ImageStore, InMemoryImageStore};
pub use mail::{InMemoryMailSender, MailSender, OutboundMail};
pub use payment::{Charge, InMemoryPaymentGateway, PaymentGateway};
