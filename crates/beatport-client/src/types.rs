//! Domain types returned by the facade.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub type TrackId = u64;
pub type CartId = u64;
pub type ItemId = u64;
pub type DownloadId = u64;
pub type ArtistId = u64;
pub type LabelId = u64;

/// A 1-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Result<Self> {
        if number == 0 || size == 0 {
            return Err(Error::InvalidPage { number, size });
        }
        Ok(Self { number, size })
    }

    /// The page after this one, same size. `None` past the last page number.
    pub fn next(self) -> Option<Self> {
        Some(Self {
            number: self.number.checked_add(1)?,
            size: self.size,
        })
    }

    /// `page=<n>&per-page=<size>` query fragment.
    pub fn query(&self) -> String {
        format!("page={}&per-page={}", self.number, self.size)
    }
}

/// An artist credit on a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistCredit {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
}

/// Enough about a track to display it and download it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackReference {
    pub id: TrackId,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub mix: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistCredit>,
    #[serde(default, alias = "downloadId")]
    pub download_id: Option<DownloadId>,
}

impl TrackReference {
    /// `Artist A, Artist B - Title (Mix)`.
    pub fn display_name(&self) -> String {
        let artists = self
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut name = if artists.is_empty() {
            self.title.clone()
        } else {
            format!("{artists} - {}", self.title)
        };
        if let Some(mix) = self.mix.as_deref().filter(|m| !m.is_empty()) {
            name.push_str(&format!(" ({mix})"));
        }
        name
    }
}

/// The `window.Playables` object embedded in listing pages.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Playables {
    #[serde(default)]
    pub tracks: Vec<TrackReference>,
}

/// The `window.Downloads` object embedded in the available-downloads page.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AvailableDownloads {
    #[serde(default)]
    pub downloads: Vec<IdOnly>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct IdOnly {
    pub id: u64,
}

/// One page of track references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPage {
    pub page: Page,
    pub tracks: Vec<TrackReference>,
}

impl TrackPage {
    /// Whether this page is empty or short, i.e. no further page exists.
    pub fn is_last(&self) -> bool {
        self.tracks.len() < self.page.size as usize
    }
}

/// Item ids per cart, in the order the carts were listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub carts: Vec<(CartId, Vec<ItemId>)>,
}

impl CartSnapshot {
    pub fn items(&self, cart: CartId) -> Option<&[ItemId]> {
        self.carts
            .iter()
            .find(|(id, _)| *id == cart)
            .map(|(_, items)| items.as_slice())
    }

    /// All item ids, cart by cart, preserving item order within each cart.
    pub fn flatten(self) -> Vec<ItemId> {
        self.carts.into_iter().flat_map(|(_, items)| items).collect()
    }
}
