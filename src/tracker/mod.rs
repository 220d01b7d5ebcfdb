//! Line tracker: garment-line quality and hourly production back-end.
//!
//! ## Overview
//!
//! Quality inspectors post hourly inspection results and line snapshots;
//! production supervisors open a daily header and post achieved quantities
//! hour by hour. The server stores everything in SQLite and derives the
//! dashboards (KPIs, hourly defect table, carry-over targets) on read or save.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  (forms, │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! │  boards) │   JSON   │         │                                        │
//! └──────────┘          │         │ DbHandle::call()                       │
//!                       │         v                                        │
//!                       │  db.rs  (TrackerDb, one SQLite connection)       │
//!                       │         │                                        │
//!                       │         │ compute_hour() on save                 │
//!                       │         v                                        │
//!                       │  production.rs  (carry-over targets, efficiency) │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module           | Responsibility                                        |
//! |------------------|-------------------------------------------------------|
//! | `models`         | Wire/storage types, lenient numbers, hour labels      |
//! | `quality`        | Summary KPIs, hourly defect table, top-three defects  |
//!
//! ## Hourly production save
//!
//! 1. `POST /api/hourly-productions` validates the body and collects every
//!    failure into one `errors` list.
//! 2. Inside a single `DbHandle::call`, `TrackerDb::save_hourly_production`
//!    opens a transaction, loads the header and the user's earlier hours,
//!    runs `production::compute_hour` and upserts the row.
//! 3. The saved row, with its dynamic target and efficiencies, is returned.

pub mod api;
pub mod db;
pub mod models;
pub mod production;
pub mod quality;
pub mod server;
