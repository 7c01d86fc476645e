//! Aidflow REST - hosted backend store
//!
//! Implements the core store traits against a PostgREST-style gateway
//! (`{url}/rest/v1/{table}`), authenticating with the project API key.
//!
//! Status handling:
//! - transport failures, timeouts and 5xx become `StoreError::Unavailable`
//! - unique violations and other 409s become `StoreError::Conflict`
//! - foreign key and check violations become `StoreError::Rejected`, even on 409
//! - 404 becomes `StoreError::NotFound`, any other 4xx `StoreError::Rejected`
//! - bodies that do not match the row types become `StoreError::Decode`
//!
//! Allocation rows decode their `goods` column through
//! [`aidflow_core::goods::deserialize_goods`], so legacy encodings are
//! normalised here and nowhere else.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod query;
pub mod store;

pub use client::RestClient;
pub use error::ConnectError;
pub use query::{Order, Query};
pub use store::RestStore;
