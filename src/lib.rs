//! Payment Webhook Fraud-Scoring Bridge Library
//!
//! Receives signed payment-event webhooks, normalizes the payload into a
//! canonical transaction record, enriches it with counterparty data from the
//! Identity Provider and submits it to the Scoring Provider for a decision.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Pipeline stages.
//! - `integrations`: External service integrations.
//! - `audit`: Structured audit events.
//! - `config`: Configuration management.
//! - `enrichment`: Country, address and identity enrichment.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP router and health check.
//! - `mapper`: Scoring request mapping.
//! - `models`: Canonical data models.
//! - `normalizer`: Webhook payload normalization.
//! - `scoring_client`: Scoring Provider client.
//! - `scoring_models`: Scoring Provider wire types.
//! - `services`: Identity Provider client.
//! - `signature`: Webhook signature verification.
//! - `webhook_handler`: Payment webhook handler.
//! - `webhook_models`: Webhook payload shapes.
//! - `webhook_service`: Pipeline orchestration.

pub mod api;
pub mod core;
pub mod integrations;

pub mod audit;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod mapper;
pub mod models;
pub mod normalizer;
pub mod scoring_client;
pub mod scoring_models;
pub mod services;
pub mod signature;
pub mod webhook_handler;
pub mod webhook_models;
pub mod webhook_service;
