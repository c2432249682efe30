// Copyright 2026 beatport-rs contributors
// SPDX-License-Identifier: MIT

//! Authenticated Beatport storefront client.
//!
//! The storefront has no public API, so this crate talks to it the way a
//! browser does: it logs in (or resumes a saved cookie), then issues the same
//! JSON and page requests the web UI issues, pulling structured data out of
//! server-rendered pages where needed.
//!
//! ```no_run
//! # async fn run() -> beatport_client::Result<()> {
//! use beatport_client::{establish, Beatport, ClientConfig};
//!
//! let session = establish(ClientConfig::from_env()?, "user", "secret").await?;
//! let beatport = Beatport::new(session);
//! let ids = beatport.get_cart_item_ids().await?;
//! println!("{} items in carts", ids.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod session;
pub mod types;

pub use client::Beatport;
pub use config::ClientConfig;
pub use error::{Error, LoginFailure, Result};
pub use extract::{extract, extract_as, Markers, TerminatorPolicy};
pub use session::{
    connect, establish, resume, Credentials, Download, Established, HttpSession, ResumeToken,
    SessionPrimitive, Stage,
};
pub use types::{CartSnapshot, Page, TrackPage, TrackReference};
