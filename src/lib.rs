// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity Gate - Bearer Token Identity Layer
//!
//! Issues, validates, refreshes and rotates HMAC-signed bearer tokens and
//! turns them into a request-scoped identity for Axum handlers.
//!
//! ## Modules
//!
//! - `auth` - Token manager, auth pipeline and its Axum adapters
//! - `api` - HTTP API handlers (Axum)
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod state;
