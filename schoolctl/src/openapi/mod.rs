//! OpenAPI documentation configuration.
//!
//! [`v1::ApiDoc`] documents the REST API served at `/api/v1/*`. The document is served as JSON at
//! `/api/openapi.json` and rendered by Scalar at `/api/docs`.

pub mod v1;

pub use v1::ApiDoc;
