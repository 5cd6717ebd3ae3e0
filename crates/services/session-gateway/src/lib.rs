//! Session Gateway
//!
//! HTTP service that receives capture uploads (video plus optional IMU and
//! metadata) into per-session directories, reports what each session holds,
//! and serves the `results.json` an external processing pipeline writes
//! into the session directory once it is done.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            session-gateway                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────┐                                                   │
//! │  │  Access Log      │ ← every request (X-Request-ID, latency)          │
//! │  └────────┬─────────┘                                                   │
//! │           ▼                                                             │
//! │  ┌──────────────────┐   ┌──────────────────┐                            │
//! │  │  HTTP API (axum) │──▶│  API Key Check   │ ← POST /sessions/upload   │
//! │  └────────┬─────────┘   └────────┬─────────┘                            │
//! │           │ reads                │ stages + commits                     │
//! │           ▼                      ▼                                      │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Session Store: <root>/<id>/{video.mp4,imu.json,meta.json,       │  │
//! │  │                              results.json}                       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                  ▲                                      │
//! │                                  │ writes results.json                  │
//! │                       external processing pipeline                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod access_log;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod store;
