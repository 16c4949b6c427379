//! Authoritative view state: where the initial state comes from, how
//! changes are published back to the URL and storage, and what an external
//! URL edit means for the running map.

use super::object_id::ObjectIdCodec;
use super::url_state::{
    format_hash_fragment, format_path, format_query_string, parse_hash_fragment,
    parse_query_string, path_segments, read_persisted, write_persisted,
};
use super::view_state::{Camera, MapViewState, ViewChange};
use crate::config::{ConfigError, MapConfig};
use crate::storage::{LocationPort, PersistedSlot};
use url::Url;

/// Which URL wire form the running view publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlMode {
    /// `#<profile>/<zoom>/<lat>/<lon>/<bearing>/<pitch>[/<objectId>]`
    Hash,
    /// `/<profile>/<objectId>[-slug]?z=..&lat=..&lng=..&bearing=..&pitch=..`
    PathQuery,
}

impl UrlMode {
    /// Path-query when the URL already carries a query and a profile path,
    /// hash otherwise.
    pub fn detect(url: &Url) -> Self {
        let has_query = url.query().is_some_and(|q| !q.is_empty());
        if has_query && !path_segments(url.path()).is_empty() {
            UrlMode::PathQuery
        } else {
            UrlMode::Hash
        }
    }
}

/// Where a resolved state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    Query,
    Hash,
    Persisted,
    Default,
}

/// What changed when the URL was edited from outside.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate {
    /// New camera, when any field moved beyond its URL precision.
    pub camera: Option<Camera>,
    pub profile: Option<String>,
    /// `Some(None)` clears the selection.
    pub selection: Option<Option<String>>,
}

impl ExternalUpdate {
    pub fn is_empty(&self) -> bool {
        self.camera.is_none() && self.profile.is_none() && self.selection.is_none()
    }
}

pub struct StateResolver {
    config: MapConfig,
    codec: ObjectIdCodec,
    location: Box<dyn LocationPort>,
    slot: Box<dyn PersistedSlot>,
    mode: UrlMode,
    last_published: Option<MapViewState>,
}

impl StateResolver {
    /// Builds a resolver over the given ports. The URL mode is detected
    /// from the current location.
    pub fn new(
        config: MapConfig,
        location: Box<dyn LocationPort>,
        slot: Box<dyn PersistedSlot>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec = ObjectIdCodec::new(config.layers.clone());
        let mode = location
            .href()
            .ok()
            .and_then(|href| Url::parse(&href).ok())
            .map(|url| UrlMode::detect(&url))
            .unwrap_or(UrlMode::Hash);

        Ok(Self {
            config,
            codec,
            location,
            slot,
            mode,
            last_published: None,
        })
    }

    pub fn with_mode(mut self, mode: UrlMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn codec(&self) -> &ObjectIdCodec {
        &self.codec
    }

    pub fn mode(&self) -> UrlMode {
        self.mode
    }

    /// The configured view: default profile, center and zoom, no rotation,
    /// no selection.
    pub fn default_state(&self) -> MapViewState {
        let profile = self
            .config
            .fallback_profile()
            .map(|p| p.code.clone())
            .unwrap_or_else(|| self.config.default_profile.clone());

        MapViewState {
            map_profile: profile,
            zoom: self.config.clamp_zoom(self.config.default_zoom),
            latitude: self.config.default_latitude,
            longitude: self.config.default_longitude,
            bearing: 0.0,
            pitch: 0.0,
            selected_object_id: None,
        }
    }

    /// Clamps zoom, replaces an unknown profile with the default one and
    /// drops a selection token that does not decode.
    pub fn normalize(&self, mut state: MapViewState) -> MapViewState {
        state.zoom = self.config.clamp_zoom(state.zoom);

        if !self.config.is_known_profile(&state.map_profile) {
            let fallback = self.default_state().map_profile;
            log::warn!(
                "Unknown map profile {:?}, using {:?}",
                state.map_profile,
                fallback
            );
            state.map_profile = fallback;
        }

        if let Some(token) = &state.selected_object_id {
            if self.codec.decode(token).is_none() {
                log::warn!("Dropping undecodable object id {:?}", token);
                state.selected_object_id = None;
            }
        }

        state
    }

    fn current_url(&self) -> Option<Url> {
        let href = match self.location.href() {
            Ok(href) => href,
            Err(e) => {
                log::warn!("Failed to read location: {}", e);
                return None;
            }
        };
        match Url::parse(&href) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Failed to parse location {:?}: {}", href, e);
                None
            }
        }
    }

    /// State carried by the URL alone: the path-query form first, then the
    /// hash fragment.
    fn state_from_url(&self) -> Option<(MapViewState, StateSource)> {
        let url = self.current_url()?;

        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            let segments = path_segments(url.path());
            if let Some(state) = parse_query_string(query, &segments) {
                return Some((state, StateSource::Query));
            }
        }

        if let Some(fragment) = url.fragment().filter(|f| !f.is_empty()) {
            if let Some(state) = parse_hash_fragment(&format!("#{}", fragment)) {
                return Some((state, StateSource::Hash));
            }
        }

        None
    }

    /// Resolves the startup state: query, then hash, then storage, then
    /// the configured default. The first source that parses wins.
    pub fn initial_state(&mut self) -> (MapViewState, StateSource) {
        let (state, source) = self
            .state_from_url()
            .or_else(|| {
                read_persisted(self.slot.as_ref(), &self.config.storage_key)
                    .map(|state| (state, StateSource::Persisted))
            })
            .unwrap_or_else(|| (self.default_state(), StateSource::Default));

        let state = self.normalize(state);
        log::info!("Initial map state from {:?}: {:?}", source, state);
        self.last_published = Some(state.clone());
        (state, source)
    }

    /// The latest full state: re-read from the URL, falling back to what
    /// was last published, then to the default.
    pub fn current_state(&self) -> MapViewState {
        match self.state_from_url() {
            Some((state, _)) => self.normalize(state),
            None => self
                .last_published
                .clone()
                .unwrap_or_else(|| self.default_state()),
        }
    }

    /// Merges `change` into the current state, writes the result to the URL
    /// (without navigating) and to storage, and returns it.
    ///
    /// `slug` names the selected feature in the path form. When it is
    /// `None` and the selection is unchanged, the slug already in the path
    /// is kept.
    pub fn publish(&mut self, change: &ViewChange, slug: Option<&str>) -> MapViewState {
        let next = self.normalize(change.apply_to(&self.current_state()));

        if let Some(mut url) = self.current_url() {
            let original = url.as_str().to_string();
            let slug = slug
                .map(str::to_string)
                .or_else(|| existing_slug(&url, next.selected_object_id.as_deref()));
            self.write_url(&mut url, &next, slug.as_deref());

            if url.as_str() != original {
                match self.location.replace(url.as_str()) {
                    Ok(()) => log::debug!("Published {}", url),
                    Err(e) => log::warn!("Failed to update location: {}", e),
                }
            }
        }

        write_persisted(self.slot.as_ref(), &self.config.storage_key, &next);
        self.last_published = Some(next.clone());
        next
    }

    fn write_url(&self, url: &mut Url, state: &MapViewState, slug: Option<&str>) {
        match self.mode {
            UrlMode::Hash => {
                let fragment = format_hash_fragment(state);
                url.set_query(None);
                url.set_fragment(fragment.strip_prefix('#'));
            }
            UrlMode::PathQuery => {
                let query = format_query_string(state);
                url.set_path(&format_path(state, slug));
                url.set_query(query.strip_prefix('?'));
                url.set_fragment(None);
            }
        }
    }

    /// Compares an externally supplied state with the running one.
    ///
    /// The camera counts as changed only when it differs at URL precision,
    /// so a round trip through the URL never looks like a move.
    pub fn diff_external(
        &self,
        current: &MapViewState,
        incoming: &MapViewState,
    ) -> Option<ExternalUpdate> {
        let camera = incoming.camera();
        let update = ExternalUpdate {
            camera: (!current.camera().same_at_precision(&camera)).then_some(camera),
            profile: (current.map_profile != incoming.map_profile)
                .then(|| incoming.map_profile.clone()),
            selection: (current.selected_object_id != incoming.selected_object_id)
                .then(|| incoming.selected_object_id.clone()),
        };
        (!update.is_empty()).then_some(update)
    }

    /// Handles a URL change made outside the app (address bar edit,
    /// back/forward). Returns what the map should apply, or `None` when the
    /// URL is unparseable or matches `current`.
    pub fn external_change(&mut self, current: &MapViewState) -> Option<ExternalUpdate> {
        let (incoming, source) = self.state_from_url()?;
        let incoming = self.normalize(incoming);
        let update = self.diff_external(current, &incoming)?;

        log::info!("External {:?} change: {:?}", source, update);
        write_persisted(self.slot.as_ref(), &self.config.storage_key, &incoming);
        self.last_published = Some(incoming);
        Some(update)
    }
}

/// Slug of the current path selection, if it belongs to `token`.
fn existing_slug(url: &Url, token: Option<&str>) -> Option<String> {
    let token = token?;
    let segments = path_segments(url.path());
    let (current, slug) = segments.get(1)?.split_once('-')?;
    (current == token && !slug.is_empty()).then(|| slug.to_string())
}
