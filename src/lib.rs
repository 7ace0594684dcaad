//! # Atlas
//!
//! A directory of real-estate agents: a JSON HTTP API over SQLite where
//! users submit agents, leave comments, and suggest corrections, and admins
//! curate the tag vocabulary.
//!
//! New entries are enriched on the way in. If the submitter gave no photo,
//! the [`enrich`] pipeline looks for one on the agent's own website.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │   HTTP   │──▶│  Directory   │──▶│  SQLite  │
//! │  (/api)  │   │    store     │   │          │
//! └──────────┘   └──────┬───────┘   └──────────┘
//!                       │
//!                       ▼
//!                ┌──────────────┐   ┌──────────┐
//!                │  Enrichment  │──▶│ agent    │
//!                │   pipeline   │   │ websites │
//!                └──────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! atlas init                                   # create database, seed tags
//! atlas serve                                  # start HTTP server
//! atlas probe "Jane Smith" --website https://janesmith.example
//! atlas enrich                                 # backfill missing photos
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`enrich`] | Profile image pipeline |
//! | [`agents`] | Agent records |
//! | [`comments`] | Agent reviews |
//! | [`suggestions`] | User-submitted corrections |
//! | [`tags`] | Tag vocabulary |
//! | [`ratings`] | Rating level lookups |
//! | [`geocode`] | Offline place lookup |
//! | [`crm`] | CRM contact push |
//! | [`admin`] | Admin password check |
//! | [`server`] | HTTP API |
//! | [`enrich_cmd`] | `enrich` and `probe` commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod admin;
pub mod agents;
pub mod comments;
pub mod config;
pub mod crm;
pub mod db;
pub mod enrich;
pub mod enrich_cmd;
pub mod error;
pub mod geocode;
pub mod migrate;
pub mod models;
pub mod ratings;
pub mod server;
pub mod suggestions;
pub mod tags;
