// File: ./src/client/mod.rs
pub mod auth;
pub mod core;
pub mod firestore;

pub use crate::client::core::HttpClient;
pub use crate::client::firestore::{CloudBackend, FirestoreClient};
