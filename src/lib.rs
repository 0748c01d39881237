//! Entity Dossier API Library
//!
//! Looks up businesses across the FCA register, Companies House and D&B,
//! normalizes whatever each source returns into a single dossier, and screens
//! people and entities against watchlists through LexisNexis Bridger.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Aggregation, normalization and screening logic.
//! - `integrations`: Vendor clients.
//! - `aggregator`: Concurrent sub-resource fan-out.
//! - `business_data_client`: D&B Direct+ client.
//! - `circuit_breaker`: Per-vendor circuit breaker.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `http_client`: Shared vendor HTTP plumbing and status classification.
//! - `models`: Keys, search results and the dossier model.
//! - `normalizer`: Vendor payloads to dossier fields.
//! - `regulator_client`: FCA register client.
//! - `registry_client`: Companies House client.
//! - `screening`: Match scoring and risk rules.
//! - `screening_client`: Bridger XG client.
//! - `screening_models`: Screening request and result types.
//! - `selection`: Last-selection-wins tokens.
//! - `source_adapter`: The trait every lookup source implements.

pub mod api;
pub mod core;
pub mod integrations;

pub mod aggregator;
pub mod business_data_client;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod http_client;
pub mod models;
pub mod normalizer;
pub mod regulator_client;
pub mod registry_client;
pub mod screening;
pub mod screening_client;
pub mod screening_models;
pub mod selection;
pub mod source_adapter;
