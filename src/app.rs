use crate::auth::AppContext;
use crate::catalog::WineryId;
use crate::cluster::{derive_zoom, ClusterOrPoint};
use crate::filter::WineryFilter;
use crate::location::{request_location, LocationOutcome, LocationProvider, LocationRequest};
use crate::map::{hit_test, marker_hits, MapRenderer, MarkerTarget, Viewport};
use crate::merge::EnrichedWinery;
use crate::session::{MapSession, TapOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long "center on my location" may take
const LOCATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Rows taken by the border and the two bottom bars
const CHROME_ROWS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing a name filter
    Search(String),
}

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub map_renderer: MapRenderer,
    pub session: MapSession,
    pub context: AppContext,
    location: Arc<dyn LocationProvider>,
    locating: Option<LocationRequest>,
    pub mode: InputMode,
    pub selected: Option<WineryId>,
    pub message: Option<String>,
    pub should_quit: bool,
    pub last_mouse: Option<(u16, u16)>,
    dragged: bool,
    pub mouse_pos: Option<(u16, u16)>,
}

impl App {
    /// `width`/`height` are the terminal size in cells
    pub fn new(
        width: usize,
        height: usize,
        session: MapSession,
        context: AppContext,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        let (w, h) = Self::canvas_size(width, height);
        Self {
            viewport: Viewport::home(w, h),
            map_renderer: MapRenderer::new(),
            session,
            context,
            location,
            locating: None,
            mode: InputMode::Normal,
            selected: None,
            message: None,
            should_quit: false,
            last_mouse: None,
            dragged: false,
            mouse_pos: None,
        }
    }

    /// Dot size of the map area inside the border
    fn canvas_size(width: usize, height: usize) -> (usize, usize) {
        (width.saturating_sub(2) * 2, height.saturating_sub(CHROME_ROWS) * 4)
    }

    /// Show the map and start loading status
    pub fn mount(&mut self) {
        self.session.mount(self.viewport.region());
    }

    pub fn unmount(&mut self) {
        self.locating = None;
        self.session.unmount();
        self.context.stop();
    }

    /// Apply background work; true when a redraw is due
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.session.poll(now);
        if let Some(outcome) = self.locating.as_ref().and_then(|request| request.poll(now)) {
            self.locating = None;
            self.apply_location(outcome);
            changed = true;
        }
        changed
    }

    /// Viewport-settled: requery clusters for what is on screen
    pub fn settle(&mut self) {
        self.session.settle(self.viewport.region());
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        let (w, h) = Self::canvas_size(width, height);
        self.viewport.width = w;
        self.viewport.height = h;
        self.settle();
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
        self.settle();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.settle();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.settle();
    }

    /// Terminal cell to map dot, accounting for the border
    fn to_pixel(col: u16, row: u16) -> (i32, i32) {
        (col.saturating_sub(1) as i32 * 2, row.saturating_sub(1) as i32 * 4)
    }

    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = Self::to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
        self.settle();
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = Self::to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
        self.settle();
    }

    pub fn begin_drag(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
        self.dragged = false;
    }

    /// Pan under the pointer. The query waits for the gesture to end.
    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = (last_x as i32 - col as i32) * 2;
            let dy = (last_y as i32 - row as i32) * 4;
            if dx != 0 || dy != 0 {
                self.viewport.pan(dx, dy);
                self.dragged = true;
            }
        }
        self.last_mouse = Some((col, row));
    }

    /// Gesture end: a drag settles the viewport, a plain press is a tap
    pub fn end_drag(&mut self, col: u16, row: u16) {
        let was_drag = self.dragged;
        self.last_mouse = None;
        self.dragged = false;
        if was_drag {
            self.settle();
        } else {
            self.click(col, row);
        }
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    /// Mouse position in map dots, for the cursor marker
    pub fn mouse_pixel_pos(&self) -> Option<(i32, i32)> {
        self.mouse_pos.map(|(col, row)| Self::to_pixel(col, row))
    }

    /// Tap whatever marker sits under a terminal cell
    pub fn click(&mut self, col: u16, row: u16) {
        let Some(frame) = self.session.frame() else {
            return;
        };
        let hits = marker_hits(&self.viewport, &frame.markers);
        let target = hit_test(&hits, col.saturating_sub(1), row.saturating_sub(1)).map(|hit| hit.target.clone());
        match target {
            Some(target) => self.tap(target),
            None => self.selected = None,
        }
    }

    pub fn tap(&mut self, target: MarkerTarget) {
        let outcome = match &target {
            MarkerTarget::Cluster(id) => self.session.tap_cluster(*id),
            MarkerTarget::Winery(id) => self.session.tap_winery(id),
        };
        match outcome {
            Some(TapOutcome::ZoomTo { region, leaves }) => {
                self.viewport.fit(&region);
                self.settle();
                self.message = Some(format!("{} wineries here", leaves.len()));
            }
            Some(TapOutcome::Winery(winery)) => {
                self.message = None;
                self.selected = Some(winery.record.id);
            }
            None => warn!(?target, "tapped marker no longer exists"),
        }
    }

    /// Expand the cluster closest to the middle of the map
    pub fn expand_nearest(&mut self) {
        let Some(frame) = self.session.frame() else {
            return;
        };
        let center = (self.viewport.width as i64 / 2, self.viewport.height as i64 / 2);
        let nearest = frame
            .markers
            .iter()
            .filter_map(|m| match m {
                ClusterOrPoint::Cluster(c) => {
                    let (px, py) = self.viewport.project(c.position.lng, c.position.lat);
                    let d = (px as i64 - center.0).pow(2) + (py as i64 - center.1).pow(2);
                    Some((d, c.id))
                }
                ClusterOrPoint::Point(_) => None,
            })
            .min_by_key(|(d, _)| *d)
            .map(|(_, id)| id);

        match nearest {
            Some(id) => self.tap(MarkerTarget::Cluster(id)),
            None => self.message = Some("No clusters in view".to_string()),
        }
    }

    /// Cycle the selection through single wineries on screen, by name
    pub fn select_next(&mut self) {
        let Some(frame) = self.session.frame() else {
            return;
        };
        let bbox = self.viewport.region().bbox();
        let mut visible: Vec<(&str, &WineryId)> = frame
            .markers
            .iter()
            .filter_map(|m| match m {
                ClusterOrPoint::Point(f) if bbox.contains(f.position) => Some((f.name.as_str(), &f.id)),
                _ => None,
            })
            .collect();
        if visible.is_empty() {
            self.message = Some("No single wineries in view; zoom in".to_string());
            return;
        }
        visible.sort();

        let next = match &self.selected {
            Some(current) => visible
                .iter()
                .position(|(_, id)| *id == current)
                .map_or(0, |i| (i + 1) % visible.len()),
            None => 0,
        };
        self.selected = Some(visible[next].1.clone());
        self.message = None;
    }

    pub fn selected_winery(&self) -> Option<&EnrichedWinery> {
        self.session.winery(self.selected.as_ref()?)
    }

    fn selected_or_hint(&mut self) -> Option<WineryId> {
        if self.selected.is_none() {
            self.message = Some("Select a winery first (Tab or click)".to_string());
        }
        self.selected.clone()
    }

    pub fn toggle_favorite(&mut self) {
        let Some(id) = self.selected_or_hint() else {
            return;
        };
        self.message = Some(match self.session.toggle_favorite(&id) {
            Ok(true) => "Added to favorites".to_string(),
            Ok(false) => "Removed from favorites".to_string(),
            Err(e) => {
                warn!(winery = %id, "favorite failed: {e}");
                format!("Could not update favorite: {e}")
            }
        });
    }

    pub fn toggle_wishlist(&mut self) {
        let Some(id) = self.selected_or_hint() else {
            return;
        };
        self.message = Some(match self.session.toggle_wishlist(&id) {
            Ok(true) => "Added to wishlist".to_string(),
            Ok(false) => "Removed from wishlist".to_string(),
            Err(e) => {
                warn!(winery = %id, "wishlist failed: {e}");
                format!("Could not update wishlist: {e}")
            }
        });
    }

    pub fn record_visit(&mut self) {
        let Some(id) = self.selected_or_hint() else {
            return;
        };
        let today = chrono::Local::now().date_naive();
        self.message = Some(match self.session.record_visit(&id, today) {
            Ok(()) => format!("Visit recorded for {today}"),
            Err(e) => {
                warn!(winery = %id, "visit failed: {e}");
                format!("Could not record visit: {e}")
            }
        });
    }

    pub fn cycle_filter(&mut self) {
        let filter = self.session.filter();
        let next = WineryFilter {
            status: filter.status.next(),
            query: filter.query.clone(),
        };
        self.message = Some(format!("Showing: {}", next.status.label()));
        self.session.set_filter(next);
    }

    pub fn start_search(&mut self) {
        self.mode = InputMode::Search(self.session.filter().query.clone());
    }

    pub fn search_input(&mut self, ch: char) {
        if let InputMode::Search(query) = &mut self.mode {
            query.push(ch);
        }
    }

    pub fn search_backspace(&mut self) {
        if let InputMode::Search(query) = &mut self.mode {
            query.pop();
        }
    }

    pub fn commit_search(&mut self) {
        if let InputMode::Search(query) = std::mem::replace(&mut self.mode, InputMode::Normal) {
            let filter = WineryFilter {
                status: self.session.filter().status,
                query: query.trim().to_string(),
            };
            info!(query = %filter.query, "name filter applied");
            self.session.set_filter(filter);
        }
    }

    pub fn cancel_search(&mut self) {
        self.mode = InputMode::Normal;
    }

    /// Start centering on the device location; `tick` applies the answer
    pub fn locate(&mut self) {
        if self.is_locating() {
            return;
        }
        self.locating = Some(request_location(self.location.clone(), LOCATE_TIMEOUT));
        self.message = Some("Locating...".to_string());
    }

    fn is_locating(&self) -> bool {
        self.locating.is_some()
    }

    /// Denial or timeout leave the map as is
    fn apply_location(&mut self, outcome: LocationOutcome) {
        match outcome {
            LocationOutcome::Located(point) => {
                self.viewport.center_on(point);
                self.settle();
                self.message = Some(format!("Centered on {:.4}, {:.4}", point.lat, point.lng));
            }
            LocationOutcome::Denied => self.message = Some("Location permission denied".to_string()),
            LocationOutcome::Unavailable(reason) => self.message = Some(format!("Location unavailable: {reason}")),
            LocationOutcome::TimedOut => self.message = Some("Location request timed out".to_string()),
        }
    }

    /// Back to the starting view
    pub fn reset(&mut self) {
        self.viewport = Viewport::home(self.viewport.width, self.viewport.height);
        self.selected = None;
        self.message = None;
        self.settle();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Cluster zoom of the current frame
    pub fn zoom_level(&self) -> String {
        match derive_zoom(self.viewport.region().lng_delta) {
            Ok(zoom) => format!("z{zoom}"),
            Err(_) => "z?".to_string(),
        }
    }

    pub fn center_coords(&self) -> String {
        format!(
            "{:.3}°{}, {:.3}°{}",
            self.viewport.center_lat.abs(),
            if self.viewport.center_lat >= 0.0 { "N" } else { "S" },
            self.viewport.center_lon.abs(),
            if self.viewport.center_lon >= 0.0 { "E" } else { "W" }
        )
    }
}
