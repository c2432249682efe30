//! Storefront operations on top of an established session.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::extract::{self, DOWNLOADS, PLAYABLES};
use crate::session::{self, Download, Established, HttpSession, SessionPrimitive, Stage};
use crate::types::{
    ArtistId, AvailableDownloads, CartId, CartSnapshot, DownloadId, ItemId, LabelId, Page,
    Playables, TrackId, TrackPage, TrackReference,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{json, Value};

/// Catalog, cart and download operations for one established session.
pub struct Beatport<P = HttpSession> {
    session: Established<P>,
}

impl<P: SessionPrimitive> Beatport<P> {
    /// Take ownership of an established session.
    pub fn new(session: Established<P>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Established<P> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        self.session.config()
    }

    /// A page of `page_size` items, the configured default size.
    pub fn page(&self, number: u32) -> Result<Page> {
        Page::new(number, self.config().page_size)
    }

    fn http(&self) -> &P {
        self.session.primitive()
    }

    fn uri(&self, path: &str) -> String {
        self.config().uri(path)
    }

    /// Account overview as returned by the storefront.
    ///
    /// The endpoint answers 200 with an error payload once the session has
    /// been invalidated; that is reported as [`Error::LoginFailed`].
    pub async fn get_account_summary(&self) -> Result<Value> {
        let summary = self.http().get_json(&self.config().whoami_uri()).await?;
        if let Some(reason) = session::auth_failure(&summary) {
            tracing::warn!("account summary rejected: {reason}");
            return Err(Error::rejected(Stage::Established, reason));
        }
        Ok(summary)
    }

    /// Tracks listed on the account's "My Beatport" feed.
    pub async fn get_account_track_page(&self, page: Page) -> Result<TrackPage> {
        let uri = self.uri(&format!(
            "/my-beatport?{}&_pjax=%23pjax-inner-wrapper",
            page.query()
        ));
        self.track_page(&uri, page).await
    }

    /// Item ids of every cart on the account, cart by cart.
    pub async fn get_cart_item_ids(&self) -> Result<Vec<ItemId>> {
        Ok(self.get_cart_snapshot().await?.flatten())
    }

    /// Item ids of every cart, fetched concurrently.
    ///
    /// The first failing cart request aborts the whole lookup; requests still
    /// in flight are dropped.
    pub async fn get_cart_snapshot(&self) -> Result<CartSnapshot> {
        let carts_uri = self.uri("/api/cart/cart");
        let listing = self.http().get_json(&carts_uri).await?;
        let cart_ids = ids_of(&listing, "carts", &carts_uri)?;
        if cart_ids.is_empty() {
            return Ok(CartSnapshot::default());
        }

        let limit = cart_ids
            .len()
            .min(self.config().max_concurrent_requests)
            .max(1);
        tracing::debug!("fetching {} carts, {limit} at a time", cart_ids.len());

        let mut fetched: Vec<(usize, CartId, Vec<ItemId>)> =
            stream::iter(cart_ids.into_iter().enumerate())
                .map(|(position, cart_id)| async move {
                    let items = self.cart_items(cart_id).await.map_err(|source| {
                        tracing::warn!("cart {cart_id} lookup failed: {source}");
                        Error::AggregationFailed {
                            cart_id,
                            source: Box::new(source),
                        }
                    })?;
                    Ok::<_, Error>((position, cart_id, items))
                })
                .buffer_unordered(limit)
                .try_collect()
                .await?;

        fetched.sort_by_key(|(position, _, _)| *position);
        Ok(CartSnapshot {
            carts: fetched
                .into_iter()
                .map(|(_, cart_id, items)| (cart_id, items))
                .collect(),
        })
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<ItemId>> {
        let uri = self.uri(&format!("/api/cart/{cart_id}"));
        let cart = self.http().get_json(&uri).await?;
        ids_of(&cart, "items", &uri)
    }

    /// Put a track into a cart.
    pub async fn add_item_to_cart(&self, item_id: ItemId, cart_id: CartId) -> Result<Value> {
        let uri = self.uri(&format!("/api/cart/{cart_id}"));
        self.http().post_json(&uri, &cart_body(item_id)).await
    }

    /// Take a track out of a cart.
    pub async fn remove_item_from_cart(&self, item_id: ItemId, cart_id: CartId) -> Result<Value> {
        let uri = self.uri(&format!("/api/cart/{cart_id}"));
        self.http().delete_json(&uri, &cart_body(item_id)).await
    }

    /// Track details from the embed player endpoint.
    pub async fn get_track(&self, track_id: TrackId) -> Result<Value> {
        let uri = self.config().embed_uri(&format!("/track?id={track_id}"));
        self.http().get_json(&uri).await
    }

    /// The preview clip descriptor of a track.
    pub async fn get_preview_clip(&self, track_id: TrackId) -> Result<Value> {
        let track = self.get_track(track_id).await?;
        track
            .pointer("/results/preview")
            .cloned()
            .ok_or_else(|| {
                Error::missing_field(
                    &self.config().embed_uri(&format!("/track?id={track_id}")),
                    "results.preview",
                )
            })
    }

    /// Download ids of purchased tracks not downloaded yet.
    pub async fn get_available_download_ids(&self, page: Page) -> Result<Vec<DownloadId>> {
        let uri = self.uri(&format!("/downloads/available?{}", page.query()));
        let body = self.http().get_raw(&uri).await?;
        let available: AvailableDownloads = extract::extract_as(&body, &DOWNLOADS)?;
        Ok(available.downloads.into_iter().map(|d| d.id).collect())
    }

    /// Purchased tracks that were already downloaded.
    pub async fn get_downloaded_tracks(&self, page: Page) -> Result<TrackPage> {
        let uri = self.uri(&format!("/downloads/downloaded?{}", page.query()));
        self.track_page(&uri, page).await
    }

    /// Resolve a download id to its signed URL, then stream the file.
    ///
    /// The signed URL expires, so it is resolved anew on every call.
    pub async fn download_by_id(&self, download_id: DownloadId) -> Result<Download> {
        let resolve_uri = self.uri(&format!("/api/downloads/purchase?downloadId={download_id}"));
        let resolved = self.http().get_json(&resolve_uri).await?;
        let url = resolved
            .get("download_url")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_field(&resolve_uri, "download_url"))?;
        url::Url::parse(url).map_err(|source| Error::InvalidUri {
            uri: url.to_string(),
            source,
        })?;

        tracing::debug!("download {download_id} resolved");
        self.http().get_binary(url).await
    }

    /// Tracks credited to an artist.
    pub async fn get_artist_tracks(&self, artist_id: ArtistId, page: Page) -> Result<TrackPage> {
        let uri = self.uri(&format!("/artist/_/{artist_id}/tracks?{}", page.query()));
        self.track_page(&uri, page).await
    }

    /// Tracks released on a label.
    pub async fn get_label_tracks(&self, label_id: LabelId, page: Page) -> Result<TrackPage> {
        let uri = self.uri(&format!("/label/_/{label_id}/tracks?{}", page.query()));
        self.track_page(&uri, page).await
    }

    /// Tracks embedded in any listing page, e.g. a chart or search result.
    pub async fn get_tracks_from_listing_page(&self, uri: &str) -> Result<Vec<TrackReference>> {
        let body = self.http().get_raw(uri).await?;
        let playables: Playables = extract::extract_as(&body, &PLAYABLES)?;
        Ok(playables.tracks)
    }

    async fn track_page(&self, uri: &str, page: Page) -> Result<TrackPage> {
        let tracks = self.get_tracks_from_listing_page(uri).await?;
        Ok(TrackPage { page, tracks })
    }
}

fn cart_body(item_id: ItemId) -> Value {
    json!({ "items": [{ "type": "track", "id": item_id }] })
}

/// Collect `payload[key][*].id` as numbers.
fn ids_of(payload: &Value, key: &str, uri: &str) -> Result<Vec<u64>> {
    let entries = payload
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::missing_field(uri, key))?;
    entries
        .iter()
        .map(|entry| {
            entry
                .get("id")
                .and_then(id_value)
                .ok_or_else(|| Error::missing_field(uri, &format!("{key}[].id")))
        })
        .collect()
}

/// Ids arrive as numbers or numeric strings.
fn id_value(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str()?.parse().ok())
}
