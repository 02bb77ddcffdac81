// Copyright 2026 Forage Contributors
// SPDX-License-Identifier: Apache-2.0

//! Forage: keyword image-URL harvester for search backends.
//!
//! This library crate exposes the core modules for integration testing.

pub mod cipher;
pub mod error;
pub mod fetch;
pub mod harvest;
pub mod query;
pub mod request;
pub mod session;

pub use error::Error;
pub use harvest::{HarvestConfig, HarvestReport, Harvester};
pub use request::{Backend, FetchMode, ImageKind, ProxyScheme, ProxySpec, SearchRequest};
