//! Peekachoo admin panel.
//!
//! A password-gated HTTP front end for the Peekachoo game backend's admin API:
//! user search and deletion, payment history, Pokemon catalog and payment syncs.
//!
//! The server side is `auth` (session cookie), `backend` (gateway to the game
//! backend) and `rest` (dashboard-facing routes). The client side is `client`
//! (HTTP client for those routes), `dashboard` (view state) and `sync`
//! (batched Pokemon sync loop).

pub mod auth;
pub mod backend;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod logging;
pub mod models;
pub mod openapi;
// REST API module: Axum handlers for the dashboard, behind the session cookie
pub mod rest;
pub mod sync;
