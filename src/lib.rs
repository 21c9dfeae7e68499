//! # Contract Desk
//!
//! A local-first contract portfolio tool: import contract records, filter
//! and sample them, and analyze contract documents with an LLM.
//!
//! The pure domain logic (models, categorization, the representative
//! sampler, filters, text preprocessing and LLM reply parsing) lives in the
//! `contract-desk-core` crate. This crate adds persistence, document
//! extraction, the LLM client, the analysis pipeline and the CLI/HTTP
//! surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Documents  │──▶│   Pipeline   │──▶│  SQLite  │
//! │ PDF/DOCX/TXT│   │ Clean+Chunk  │   │contracts │
//! └─────────────┘   │  +LLM calls  │   │ analyses │
//!                   └──────────────┘   └────┬─────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │   CLI    │        │   HTTP   │
//!                 │ (cdesk)  │        │  (axum)  │
//!                 └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cdesk init                         # create database
//! cdesk import contracts.json        # load contract records
//! cdesk sample --size 20             # representative sample
//! cdesk analyze lease.pdf --save     # LLM analysis
//! cdesk serve                        # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite contract store |
//! | [`contracts`] | Import, filtered listing, sampling |
//! | [`stats`] | Portfolio category breakdown |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`llm`] | LLM client (Gemini) with retry |
//! | [`prompts`] | Prompt templates |
//! | [`analyze`] | Document analysis pipeline |
//! | [`reader`] | Registration field extraction |
//! | [`filters_cmd`] | Custom filter management |
//! | [`progress`] | Analysis progress reporting |
//! | [`server`] | HTTP API |

pub mod analyze;
pub mod config;
pub mod contracts;
pub mod db;
pub mod extract;
pub mod filters_cmd;
pub mod llm;
pub mod migrate;
pub mod progress;
pub mod prompts;
pub mod reader;
pub mod server;
pub mod sqlite_store;
pub mod stats;
