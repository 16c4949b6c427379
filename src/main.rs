#![warn(clippy::all)]

//! OpenMap - an interactive points-of-interest map with shareable links.
//!
//! The camera, the active map profile and the selected place are mirrored
//! into the URL and local storage, so any view can be bookmarked, shared
//! or restored after a reload.

mod ui;

use eframe::egui;
use openmap::config::{ConfigError, MapConfig, MapProfile};
use openmap::geo::{MapSurface, RenderedMap};
use openmap::poi::{feature_slug, PoiFetcher};
use openmap::state::url_state::{format_hash_fragment, format_path, format_query_string};
use openmap::state::{
    LoadSignals, MapViewState, PendingResolution, Resolution, SelectionState, SelectionTracker,
    StateResolver, UrlMode, ViewChange,
};
use openmap::storage::{LocationPort, PersistedSlot};
use std::cell::RefCell;
use std::rc::Rc;
use ui::UiAction;

#[cfg(target_arch = "wasm32")]
use openmap::storage::LocationChangeListener;

// Native entry point
#[cfg(not(target_arch = "wasm32"))]
fn main() -> eframe::Result<()> {
    env_logger::init();

    // A shared link can be passed as the first argument.
    let href = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost/".to_string());

    let native_options = eframe::NativeOptions::default();

    eframe::run_native(
        "OpenMap",
        native_options,
        Box::new(move |cc| {
            let location = openmap::storage::MemoryLocation::new(href);
            let slot = openmap::storage::MemorySlot::new();
            Ok(Box::new(MapApp::new(cc, Box::new(location), Box::new(slot))?))
        }),
    )
}

// WASM entry point - main is not called on wasm32
#[cfg(target_arch = "wasm32")]
fn main() {}

/// Entry point for the WASM application.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub async fn start() {
    use eframe::wasm_bindgen::JsCast as _;
    use openmap::storage::{BrowserLocation, LocalStorageSlot};

    // Redirect `log` messages to `console.log`:
    eframe::WebLogger::init(log::LevelFilter::Debug).ok();

    let web_options = eframe::WebOptions::default();

    wasm_bindgen_futures::spawn_local(async {
        let document = web_sys::window()
            .expect("No window")
            .document()
            .expect("No document");

        let canvas = document
            .get_element_by_id("app_canvas")
            .expect("Failed to find app_canvas")
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .expect("app_canvas was not a HtmlCanvasElement");

        let start_result = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| {
                    Ok(Box::new(MapApp::new(
                        cc,
                        Box::new(BrowserLocation),
                        Box::new(LocalStorageSlot),
                    )?))
                }),
            )
            .await;

        // Remove the loading text once the app has loaded:
        if let Some(loading_text) = document.get_element_by_id("loading_text") {
            match start_result {
                Ok(_) => {
                    loading_text.remove();
                }
                Err(e) => {
                    loading_text.set_inner_html(
                        "<p>The app has crashed. See the developer console for details.</p>",
                    );
                    panic!("Failed to start eframe: {e:?}");
                }
            }
        }
    });
}

/// Main application state and logic.
pub struct MapApp {
    /// Owns the URL and storage ports
    resolver: StateResolver,

    /// Last state published to (or read from) the URL
    current: MapViewState,

    /// The rendered map, shared with pending selection resolutions
    map: Rc<RefCell<RenderedMap>>,

    /// Selection state machine, shared with pending selection resolutions
    tracker: Rc<RefCell<SelectionTracker>>,

    /// "Source finished loading" notifications
    load_signals: LoadSignals,

    /// Resolution of a selection still waiting for data
    pending: Option<PendingResolution>,

    /// POI list fetches for the layers of the active profile
    fetcher: PoiFetcher,

    /// Index into the active profile's styles
    style_index: usize,

    /// True while the user is dragging/zooming
    interacting: bool,

    /// Picks up address bar edits and back/forward navigation
    #[cfg(target_arch = "wasm32")]
    location_listener: Option<LocationChangeListener>,
}

impl MapApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        location: Box<dyn LocationPort>,
        slot: Box<dyn PersistedSlot>,
    ) -> Result<Self, ConfigError> {
        // Initialize Phosphor icons font
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        let config = MapConfig::default();
        let fetcher = PoiFetcher::new(config.api_base.clone());
        let mut resolver = StateResolver::new(config, location, slot)?;
        let (initial, source) = resolver.initial_state();
        log::info!(
            "Starting at {:?} ({:?} URL mode, from {:?})",
            initial.camera(),
            resolver.mode(),
            source
        );

        let map = Rc::new(RefCell::new(RenderedMap::new(initial.camera())));
        let tracker = Rc::new(RefCell::new(SelectionTracker::new(
            resolver.codec().clone(),
        )));

        #[cfg(target_arch = "wasm32")]
        let location_listener = {
            let ctx = cc.egui_ctx.clone();
            match LocationChangeListener::install(move || ctx.request_repaint()) {
                Ok(listener) => Some(listener),
                Err(e) => {
                    log::warn!("URL changes will not be followed: {}", e);
                    None
                }
            }
        };

        let mut app = Self {
            resolver,
            current: initial.clone(),
            map,
            tracker,
            load_signals: LoadSignals::new(),
            pending: None,
            fetcher,
            style_index: 0,
            interacting: false,
            #[cfg(target_arch = "wasm32")]
            location_listener,
        };

        app.load_profile(&cc.egui_ctx);
        app.start_selection(initial.selected_object_id.as_deref());

        // Write the normalized startup state back.
        app.current = app.resolver.publish(&ViewChange::default(), None);

        Ok(app)
    }

    fn active_profile(&self) -> Option<&MapProfile> {
        self.resolver.config().profile(&self.current.map_profile)
    }

    /// Switches the rendered map to the active profile's layers and
    /// requests their data.
    fn load_profile(&mut self, ctx: &egui::Context) {
        let layers = self
            .active_profile()
            .map(|p| p.interactive_layers.clone())
            .unwrap_or_default();
        log::info!(
            "Loading profile {} with layers {:?}",
            self.current.map_profile,
            layers
        );

        self.style_index = 0;
        self.map.borrow_mut().load_style(&layers);
        self.load_signals.notify();
        self.request_sources(ctx);
    }

    fn request_sources(&mut self, ctx: &egui::Context) {
        let map = self.map.borrow();
        let bounds = map.rendered_bounds();
        for layer in map.layers() {
            self.fetcher.fetch(ctx, &layer.name, bounds);
        }
    }

    /// Starts resolving `token` (or clears the selection when `None`).
    fn start_selection(&mut self, token: Option<&str>) {
        self.tracker.borrow_mut().select(token);

        let resolving = matches!(
            self.tracker.borrow().state(),
            SelectionState::Resolving { .. }
        );
        self.pending = resolving.then(|| {
            PendingResolution::start(
                self.tracker.clone(),
                &mut self.load_signals,
                self.map.clone(),
            )
        });
        self.poll_resolution();
    }

    fn poll_resolution(&mut self) {
        let Some(pending) = &mut self.pending else {
            return;
        };
        let Some(resolution) = pending.poll_once() else {
            return;
        };
        self.pending = None;

        match resolution {
            Resolution::Shown(feature) => {
                let token = self.tracker.borrow().selected_token().map(str::to_string);
                let slug = feature_slug(&feature);
                self.current = self
                    .resolver
                    .publish(&ViewChange::select(token), slug.as_deref());
            }
            Resolution::Cleared => {
                self.current = self.resolver.publish(&ViewChange::select(None), None);
            }
            Resolution::Abandoned | Resolution::SignalsClosed => {}
        }
    }

    fn deselect(&mut self) {
        self.tracker.borrow_mut().deselect();
        self.pending = None;
        self.current = self.resolver.publish(&ViewChange::select(None), None);
    }

    /// Publishes the camera once a user gesture or an animation has ended,
    /// then refreshes the data for the new view.
    fn on_move_end(&mut self, ctx: &egui::Context) {
        let camera = self.map.borrow().camera();
        self.current = self.resolver.publish(&ViewChange::camera(camera), None);
        self.map.borrow_mut().refresh_sources();
        self.request_sources(ctx);
    }

    fn handle_action(&mut self, ctx: &egui::Context, action: UiAction) {
        match action {
            UiAction::SelectProfile(code) => {
                self.tracker.borrow_mut().deselect();
                self.pending = None;
                self.current = self.resolver.publish(&ViewChange::profile(code), None);
                self.load_profile(ctx);
            }
            UiAction::SelectStyle(index) => {
                self.style_index = index;
            }
            UiAction::SelectFeature(feature) => {
                let token = self
                    .resolver
                    .codec()
                    .token_for(&feature.layer, feature.id);
                match token {
                    Some(token) => self.start_selection(Some(&token)),
                    None => log::warn!("Layer {} has no object id code", feature.layer),
                }
            }
            UiAction::Deselect => self.deselect(),
        }
    }

    /// Applies a URL edited from outside the app.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    fn handle_external_change(&mut self, ctx: &egui::Context) {
        let Some(update) = self.resolver.external_change(&self.current) else {
            return;
        };
        self.current = self.resolver.current_state();

        if update.profile.is_some() {
            self.tracker.borrow_mut().deselect();
            self.pending = None;
            self.load_profile(ctx);
        }
        if let Some(camera) = update.camera {
            self.map.borrow_mut().fly_to(camera);
        }
        if update.profile.is_some() || update.selection.is_some() {
            let token = self.current.selected_object_id.clone();
            self.start_selection(token.as_deref());
        }
    }

    /// Link to the current view, as shown in the top bar.
    fn current_link(&self) -> String {
        match self.resolver.mode() {
            UrlMode::Hash => format_hash_fragment(&self.current),
            UrlMode::PathQuery => format!(
                "{}{}",
                format_path(&self.current, None),
                format_query_string(&self.current)
            ),
        }
    }
}

impl eframe::App for MapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        #[cfg(target_arch = "wasm32")]
        {
            let changed = self
                .location_listener
                .as_ref()
                .is_some_and(|l| l.take_pending());
            if changed {
                self.handle_external_change(ctx);
            }
        }

        // Deliver completed source loads
        while let Some(result) = self.fetcher.try_recv() {
            if self
                .map
                .borrow_mut()
                .set_source_data(&result.layer, result.data)
            {
                self.load_signals.notify();
            }
        }
        self.poll_resolution();

        // Advance camera animations
        if self.map.borrow_mut().tick(web_time::Instant::now()) {
            self.on_move_end(ctx);
        }

        let mut actions = Vec::new();
        let link = self.current_link();
        ui::render_top_bar(
            ctx,
            self.resolver.config(),
            &self.current,
            self.style_index,
            &link,
            &mut actions,
        );

        let selection = self.tracker.borrow().state().clone();
        ui::render_detail_panel(ctx, &selection, &mut actions);

        let interactive_layers = self
            .active_profile()
            .map(|p| p.interactive_layers.clone())
            .unwrap_or_default();
        let orto = self
            .active_profile()
            .and_then(|p| p.styles.get(self.style_index))
            .is_some_and(|s| s.name == "Orto");
        let selected = match &selection {
            SelectionState::Shown { feature, .. } => Some(feature),
            _ => None,
        };
        let view = ui::CanvasView {
            config: self.resolver.config(),
            interactive_layers: &interactive_layers,
            selected,
            has_selection: selection != SelectionState::Empty,
            orto,
        };
        let moved = ui::render_canvas(ctx, &mut self.map.borrow_mut(), &view, &mut actions);

        if moved {
            self.interacting = true;
        } else if self.interacting {
            self.interacting = false;
            self.on_move_end(ctx);
        }

        for action in actions {
            self.handle_action(ctx, action);
        }

        if self.map.borrow().is_animating() || self.interacting {
            ctx.request_repaint();
        }
    }
}
