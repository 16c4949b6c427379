//! Points of interest: fetching layer data and extracting display details.
//!
//! Fetches are async but egui's update() is synchronous, so results come
//! back through a channel the UI loop drains every frame. A completed
//! fetch is what the selection logic treats as "source finished loading".

mod details;

pub use details::{format_address, format_opening_hours, osm_links, Link, OsmLinks, PoiDetails};

use crate::config::Bounds;
use crate::geo::{parse_features, MapFeature};
use crate::state::url_state::{slugify, to_fixed};
use crate::state::COORD_PRECISION;
use eframe::egui;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use url::form_urlencoded;

#[cfg(not(target_arch = "wasm32"))]
const SAMPLE_PLACES: &str = include_str!("../../assets/places.geojson");

/// Data delivered for one layer.
#[derive(Debug)]
pub struct SourceResult {
    pub layer: String,
    request: u64,
    pub data: Result<Vec<MapFeature>, String>,
}

/// Channel-based POI list fetcher.
///
/// Only the newest request per layer is delivered; responses to requests
/// that were superseded are dropped in [`PoiFetcher::try_recv`].
pub struct PoiFetcher {
    api_base: String,
    sender: Sender<SourceResult>,
    receiver: Receiver<SourceResult>,
    next_request: u64,
    latest: HashMap<String, u64>,
}

impl PoiFetcher {
    pub fn new(api_base: impl Into<String>) -> Self {
        let (sender, receiver) = channel();
        Self {
            api_base: api_base.into(),
            sender,
            receiver,
            next_request: 0,
            latest: HashMap::new(),
        }
    }

    /// Requests the features of `layer` within `bounds`.
    ///
    /// On WASM this is an HTTP GET against the list endpoint; native builds
    /// serve the embedded sample collection.
    pub fn fetch(&mut self, ctx: &egui::Context, layer: &str, bounds: Bounds) {
        self.next_request += 1;
        let request = self.next_request;
        self.latest.insert(layer.to_string(), request);

        let sender = self.sender.clone();
        let layer = layer.to_string();
        let url = list_url(&self.api_base, &layer, bounds);
        log::debug!("Fetching {} (request {})", url, request);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let data = sample_features(&layer);
            let _ = sender.send(SourceResult {
                layer,
                request,
                data,
            });
            ctx.request_repaint();
        }

        #[cfg(target_arch = "wasm32")]
        {
            let ctx = ctx.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let data = match fetch_text(&url).await {
                    Ok(body) => parse_features(&layer, &body),
                    Err(e) => Err(e),
                };
                let _ = sender.send(SourceResult {
                    layer,
                    request,
                    data,
                });
                ctx.request_repaint();
            });
        }
    }

    /// Non-blocking check for the next current result.
    pub fn try_recv(&self) -> Option<SourceResult> {
        while let Ok(result) = self.receiver.try_recv() {
            if self.latest.get(&result.layer) == Some(&result.request) {
                return Some(result);
            }
            log::debug!(
                "Dropping superseded response for {} (request {})",
                result.layer,
                result.request
            );
        }
        None
    }
}

/// URL of the list endpoint for `layer` within `bounds`.
pub fn list_url(api_base: &str, layer: &str, bounds: Bounds) -> String {
    let bbox = [bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat]
        .map(|v| to_fixed(v, COORD_PRECISION))
        .join(",");
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("bbox", &bbox)
        .append_pair("type", layer)
        .finish();
    format!("{}/api/list?{}", api_base.trim_end_matches('/'), query)
}

/// URL slug for a feature's name, if it has one.
pub fn feature_slug(feature: &MapFeature) -> Option<String> {
    feature
        .name()
        .map(slugify)
        .filter(|slug| !slug.is_empty())
}

#[cfg(not(target_arch = "wasm32"))]
fn sample_features(layer: &str) -> Result<Vec<MapFeature>, String> {
    let features = parse_features(layer, SAMPLE_PLACES)?;
    Ok(features
        .into_iter()
        .filter(|f| f.properties.get("layer").and_then(|l| l.as_str()) == Some(layer))
        .collect())
}

#[cfg(target_arch = "wasm32")]
async fn fetch_text(url: &str) -> Result<String, String> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Request, RequestInit, RequestMode, Response};

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(url, &opts)
        .map_err(|e| format!("request error: {:?}", e))?;
    request
        .headers()
        .set("Accept", "application/geo+json, application/json")
        .map_err(|e| format!("header error: {:?}", e))?;

    let window = web_sys::window().ok_or("no window")?;
    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| format!("fetch error: {:?}", e))?;

    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| "response is not a Response")?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    let text = JsFuture::from(
        resp.text()
            .map_err(|e| format!("text promise error: {:?}", e))?,
    )
    .await
    .map_err(|e| format!("text error: {:?}", e))?;

    text.as_string()
        .ok_or_else(|| "response body is not text".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_url() {
        let url = list_url(
            "https://openmap.lt/",
            "label-amenity",
            Bounds::new(25.2, 54.6, 25.4, 54.75),
        );
        assert_eq!(
            url,
            "https://openmap.lt/api/list?bbox=25.20000%2C54.60000%2C25.40000%2C54.75000&type=label-amenity"
        );
    }

    #[test]
    fn test_sample_features_by_layer() {
        let amenities = sample_features("label-amenity").unwrap();
        assert!(amenities.iter().any(|f| f.id == 42));
        assert!(amenities.iter().all(|f| f.layer == "label-amenity"));

        let addresses = sample_features("label-address").unwrap();
        assert!(addresses.iter().any(|f| f.id == 9001));
        assert!(sample_features("label-unknown").unwrap().is_empty());
    }

    #[test]
    fn test_fetch_delivers_latest_only() {
        let ctx = egui::Context::default();
        let mut fetcher = PoiFetcher::new("");
        let bounds = Bounds::new(20.7, 53.7, 27.05, 56.65);

        fetcher.fetch(&ctx, "label-amenity", bounds);
        fetcher.fetch(&ctx, "label-amenity", bounds);
        fetcher.fetch(&ctx, "label-address", bounds);

        let first = fetcher.try_recv().unwrap();
        assert_eq!(first.layer, "label-amenity");
        assert_eq!(first.request, 2);
        assert!(first.data.is_ok());

        assert_eq!(fetcher.try_recv().map(|r| r.layer).as_deref(), Some("label-address"));
        assert!(fetcher.try_recv().is_none());
    }

    #[test]
    fn test_feature_slug() {
        let features = sample_features("label-amenity").unwrap();
        let castle = features.iter().find(|f| f.id == 318).unwrap();
        assert_eq!(feature_slug(castle).as_deref(), Some("trakų-salos-pilis"));

        let address = &sample_features("label-address").unwrap()[0];
        assert_eq!(feature_slug(address), None);
    }
}
