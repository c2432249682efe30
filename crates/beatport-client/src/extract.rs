//! Embedded-JSON extraction from server-rendered pages.
//!
//! Storefront pages ship their data as JavaScript assignments such as
//! `window.Playables = {...};`. This module carves that JSON out of the raw
//! page text using a start marker and a terminator. It is deliberately
//! strict: the first start marker and the first terminator after it win, and
//! the slice between them must parse as JSON. There is no repair and no retry;
//! callers that need resilience re-issue the request.

use crate::error::{snippet, Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// How much of the terminator belongs to the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorPolicy {
    /// The payload ends right before the terminator.
    Exclude,
    /// The whole terminator is part of the payload.
    Include,
    /// The first `n` bytes of the terminator are part of the payload, e.g.
    /// the `}` of a `};` terminator.
    KeepPrefix(usize),
}

/// Anchors locating one embedded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers<'a> {
    pub start: &'a str,
    pub terminator: &'a str,
    pub policy: TerminatorPolicy,
}

impl<'a> Markers<'a> {
    pub const fn new(start: &'a str, terminator: &'a str, policy: TerminatorPolicy) -> Self {
        Self {
            start,
            terminator,
            policy,
        }
    }

    /// Bytes of the terminator kept in the payload.
    fn kept(&self) -> usize {
        match self.policy {
            TerminatorPolicy::Exclude => 0,
            TerminatorPolicy::Include => self.terminator.len(),
            TerminatorPolicy::KeepPrefix(n) => n.min(self.terminator.len()),
        }
    }
}

/// `window.Playables = {...};` as rendered on track listing pages.
pub const PLAYABLES: Markers<'static> =
    Markers::new("window.Playables = ", ";", TerminatorPolicy::Exclude);

/// `window.Downloads = {...};` on the available-downloads page. The object
/// itself contains `;` inside strings, so the terminator is the closing brace
/// followed by the statement end.
pub const DOWNLOADS: Markers<'static> =
    Markers::new("window.Downloads = ", "};", TerminatorPolicy::KeepPrefix(1));

/// Return the payload slice between the markers without parsing it.
pub fn locate<'t>(text: &'t str, markers: &Markers<'_>) -> Result<&'t str> {
    let begin = text
        .find(markers.start)
        .map(|idx| idx + markers.start.len())
        .ok_or_else(|| not_found(markers.start, text))?;

    let rest = &text[begin..];
    let end_rel = rest
        .find(markers.terminator)
        .ok_or_else(|| not_found(markers.terminator, rest))?;

    let kept = markers.kept();
    // A partial prefix may split a multi-byte char; clamp to the nearest boundary.
    let mut end = end_rel + kept;
    while !rest.is_char_boundary(end) {
        end -= 1;
    }
    Ok(&rest[..end])
}

/// Extract and parse the JSON value embedded between the markers.
pub fn extract(text: &str, markers: &Markers<'_>) -> Result<Value> {
    extract_as(text, markers)
}

/// Extract the embedded payload and deserialize it into `T`.
///
/// A payload that is valid JSON but does not fit `T` is reported as
/// [`Error::MalformedPayload`] as well.
pub fn extract_as<T: DeserializeOwned>(text: &str, markers: &Markers<'_>) -> Result<T> {
    let payload = locate(text, markers)?;
    serde_json::from_str(payload).map_err(|source| {
        tracing::debug!(
            "embedded payload after {:?} failed to parse: {source}",
            markers.start
        );
        Error::MalformedPayload {
            payload: payload.to_string(),
            source,
        }
    })
}

fn not_found(marker: &str, searched: &str) -> Error {
    Error::MarkerNotFound {
        marker: marker.to_string(),
        context: snippet(searched),
    }
}
