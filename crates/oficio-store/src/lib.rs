//! Typed adapter over the relational store (customers, consents, learned
//! service relations). The store itself is an external collaborator; this
//! crate is the interface plus a thin PostgREST client.

pub mod client;
pub mod consents;
pub mod customers;
pub mod relations;

pub use client::{StoreClient, StoreError};
pub use consents::{ConsentRepo, ConsentResponse};
pub use customers::CustomerRepo;
pub use relations::ServiceRelationRepo;
