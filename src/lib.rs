//! # Wiki Retrieval
//!
//! Keyword retrieval over a locally mirrored git wiki, packaged as tools for
//! a conversational agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │  GitMirror  │◀──│ RetrievalEngine │◀──│ ToolRegistry │
//! │ clone/pull  │   │  sync + scan    │   │ search_wiki  │
//! │ list/read   │   │  format text    │   │ list_wiki_.. │
//! └─────────────┘   └─────────────────┘   └──────┬───────┘
//!                                                │
//!                               ┌────────────────┤
//!                               ▼                ▼
//!                          ┌─────────┐      ┌──────────┐
//!                          │   CLI   │      │   HTTP   │
//!                          │ (wiki)  │      │  tools   │
//!                          └─────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wiki sync                      # clone or fast-forward the mirror
//! wiki list                      # every document in the wiki
//! wiki search lambda timeout     # files mentioning any keyword
//! wiki serve                     # HTTP tool server for agents
//! ```
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use wiki_retrieval::engine::RetrievalEngine;
//! use wiki_retrieval::mirror::{GitMirror, RepoLocation};
//!
//! let location = RepoLocation::new("https://github.com/org/project.wiki.git", "./wiki_data");
//! let engine = RetrievalEngine::new(GitMirror::new(location));
//! println!("{}", engine.search("lambda"));
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Mirror error type |
//! | [`mirror`] | Git-backed document store |
//! | [`engine`] | Keyword search and listing |
//! | [`tools`] | Agent tool trait and registry |
//! | [`server`] | HTTP tool server |

pub mod config;
pub mod engine;
pub mod error;
pub mod mirror;
pub mod server;
pub mod tools;
