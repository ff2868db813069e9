//! Map screen state: status loading, merge, index rebuilds, and the
//! viewport recompute cycle.
//!
//! Pipeline order is fixed: catalog → status merge → filter → index →
//! query. A frame only ever comes from the index built from the current
//! enriched set, and nothing is drawn before the first query completes.

use crate::auth::UserSession;
use crate::catalog::{Catalog, WineryId};
use crate::cluster::{span_for_zoom, BoundingBox, ClusterId, ClusterIndex, ClusterOptions, ClusterOrPoint, MapRegion, SpatialFeature};
use crate::error::StatusError;
use crate::filter::WineryFilter;
use crate::merge::{EnrichedWinery, StatusMerge, StatusSnapshot};
use crate::status::{StatusBackend, StatusMap, StatusRequest};
use chrono::NaiveDate;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Padding around the leaves when zooming to a cluster
const FIT_PADDING: f64 = 0.25;

/// Narrowest span a zoom-to-fit may produce, in degrees
const MIN_FIT_DELTA: f64 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSettings {
    pub cluster: ClusterOptions,
    pub leaf_limit: usize,
    pub status_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cluster: ClusterOptions::default(),
            leaf_limit: 100,
            status_timeout: Duration::from_secs(3),
        }
    }
}

/// Identifies one recompute; only the newest may publish a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecomputeTicket(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewState {
    Unmounted,
    Idle(MapRegion),
    Recomputing { region: MapRegion, ticket: RecomputeTicket },
}

/// What the render surface draws
#[derive(Clone, Debug)]
pub struct Frame {
    pub region: MapRegion,
    pub zoom: i32,
    pub markers: Vec<ClusterOrPoint>,
}

/// A cluster query detached from the session, runnable anywhere
pub struct QueryJob {
    ticket: RecomputeTicket,
    region: MapRegion,
    index: Arc<ClusterIndex>,
}

pub struct QueryResult {
    ticket: RecomputeTicket,
    frame: Frame,
}

impl QueryJob {
    /// Query failures degrade to an empty frame
    pub fn run(self) -> QueryResult {
        let (zoom, markers) = match self.region.zoom() {
            Ok(zoom) => match self.index.get_clusters(self.region.bbox(), zoom) {
                Ok(markers) => (zoom, markers),
                Err(e) => {
                    warn!("cluster query failed, drawing nothing: {e}");
                    (zoom, Vec::new())
                }
            },
            Err(e) => {
                warn!("bad viewport, drawing nothing: {e}");
                (0, Vec::new())
            }
        };
        QueryResult {
            ticket: self.ticket,
            frame: Frame {
                region: self.region,
                zoom,
                markers,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TapOutcome {
    /// Region fitting the cluster's leaves, zoomed far enough to split it
    ZoomTo { region: MapRegion, leaves: Vec<SpatialFeature> },
    Winery(EnrichedWinery),
}

/// Where status data stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusState {
    Loading,
    Loaded,
    /// Fetch failed or timed out; flags are defaulted
    Defaulted,
}

struct StatusDelivery {
    seq: u64,
    result: Result<StatusMap, StatusError>,
}

pub struct MapSession {
    catalog: Arc<Catalog>,
    backend: Arc<dyn StatusBackend>,
    user: Option<UserSession>,
    settings: SessionSettings,

    merge: StatusMerge,
    filter: WineryFilter,
    status: Option<StatusSnapshot>,
    status_seq: u64,
    /// Outstanding fetch and when it was issued
    awaiting: Option<(u64, Instant)>,
    tx: Sender<StatusDelivery>,
    rx: Receiver<StatusDelivery>,

    enriched: Option<Arc<[EnrichedWinery]>>,
    visible: Option<Arc<[EnrichedWinery]>>,
    index: Option<Arc<ClusterIndex>>,

    view: ViewState,
    next_ticket: u64,
    frame: Option<Frame>,
}

impl MapSession {
    pub fn new(
        catalog: Arc<Catalog>,
        backend: Arc<dyn StatusBackend>,
        user: Option<UserSession>,
        settings: SessionSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            catalog,
            backend,
            user,
            settings,
            merge: StatusMerge::new(),
            filter: WineryFilter::default(),
            status: None,
            status_seq: 0,
            awaiting: None,
            tx,
            rx,
            enriched: None,
            visible: None,
            index: None,
            view: ViewState::Unmounted,
            next_ticket: 0,
            frame: None,
        }
    }

    /// Start the screen: remember the first region and fetch status.
    /// The first frame appears once status (or its timeout) lands.
    pub fn mount(&mut self, region: MapRegion) {
        info!(wineries = self.catalog.len(), "map mounted");
        self.view = ViewState::Idle(region);
        if self.status.is_some() {
            self.rebuild();
        }
        self.request_status();
    }

    /// Stop the screen. Later status deliveries and query results are dropped.
    pub fn unmount(&mut self) {
        info!("map unmounted");
        self.view = ViewState::Unmounted;
        self.frame = None;
        self.awaiting = None;
    }

    pub fn is_mounted(&self) -> bool {
        !matches!(self.view, ViewState::Unmounted)
    }

    /// Fire a status fetch on the worker pool. Only the newest request's
    /// answer is applied.
    pub fn request_status(&mut self) {
        self.status_seq += 1;
        let seq = self.status_seq;
        self.awaiting = Some((seq, Instant::now()));
        let tx = self.tx.clone();

        let Some(user) = self.user.clone() else {
            let _ = tx.send(StatusDelivery {
                seq,
                result: Err(StatusError::Unauthenticated),
            });
            return;
        };

        let backend = self.backend.clone();
        debug!(seq, "status fetch issued");
        rayon::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| backend.fetch(&user, &StatusRequest::All)))
                .unwrap_or_else(|_| Err(StatusError::Unavailable("status backend panicked".to_string())));
            // Session may be gone
            let _ = tx.send(StatusDelivery { seq, result });
        });
    }

    /// Apply finished fetches and the first-load timeout. Returns whether
    /// the frame may have changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;

        while let Ok(delivery) = self.rx.try_recv() {
            if !self.is_mounted() {
                debug!(seq = delivery.seq, "dropping status delivered after unmount");
                continue;
            }
            if delivery.seq != self.status_seq {
                debug!(seq = delivery.seq, latest = self.status_seq, "dropping stale status");
                continue;
            }
            self.awaiting = None;
            self.status = Some(StatusSnapshot::from_fetch(delivery.result));
            self.rebuild();
            changed = true;
        }

        if let Some((seq, since)) = self.awaiting {
            if self.status.is_none() && self.is_mounted() && now.duration_since(since) >= self.settings.status_timeout {
                warn!(seq, "status fetch timed out, drawing with default flags");
                // Keep awaiting: a late answer for this request still applies
                self.status = Some(StatusSnapshot::Unavailable);
                self.rebuild();
                changed = true;
            }
        }

        changed
    }

    /// Re-run merge → filter → index, then requery the current region.
    /// The index is rebuilt only when the visible set is a new allocation.
    fn rebuild(&mut self) {
        let Some(status) = &self.status else {
            return;
        };

        let enriched = self.merge.merge(&self.catalog, status);
        let visible = self.filter.apply(&enriched);

        let unchanged = matches!(
            (&self.visible, &self.index),
            (Some(prev), Some(_)) if Arc::ptr_eq(prev, &visible)
        );
        if !unchanged {
            let index = ClusterIndex::from_wineries(&visible, self.settings.cluster);
            if !index.excluded().is_empty() {
                warn!(excluded = index.excluded().len(), "wineries missing from the map");
            }
            self.index = Some(Arc::new(index));
        }

        self.enriched = Some(enriched);
        self.visible = Some(visible);

        if let Some(region) = self.current_region() {
            self.settle(region);
        }
    }

    pub fn current_region(&self) -> Option<MapRegion> {
        match self.view {
            ViewState::Unmounted => None,
            ViewState::Idle(region) | ViewState::Recomputing { region, .. } => Some(region),
        }
    }

    /// `Idle → Recomputing`. Any ticket issued earlier becomes stale.
    pub fn begin_recompute(&mut self, region: MapRegion) -> Option<RecomputeTicket> {
        if !self.is_mounted() {
            return None;
        }
        self.next_ticket += 1;
        let ticket = RecomputeTicket(self.next_ticket);
        self.view = ViewState::Recomputing { region, ticket };
        Some(ticket)
    }

    /// Detach the query for `ticket`, if it is still current and an index exists
    pub fn query_job(&self, ticket: RecomputeTicket) -> Option<QueryJob> {
        match self.view {
            ViewState::Recomputing { region, ticket: current } if current == ticket => Some(QueryJob {
                ticket,
                region,
                index: self.index.clone()?,
            }),
            _ => None,
        }
    }

    /// `Recomputing → Idle`. Results for anything but the newest ticket
    /// are discarded.
    pub fn complete(&mut self, result: QueryResult) -> bool {
        match self.view {
            ViewState::Recomputing { ticket, .. } if ticket == result.ticket => {
                self.view = ViewState::Idle(result.frame.region);
                self.frame = Some(result.frame);
                true
            }
            _ => {
                debug!(ticket = result.ticket.0, "discarding stale query result");
                false
            }
        }
    }

    /// Viewport-settled event: recompute synchronously
    pub fn settle(&mut self, region: MapRegion) -> bool {
        let Some(ticket) = self.begin_recompute(region) else {
            return false;
        };
        match self.query_job(ticket) {
            Some(job) => {
                let result = job.run();
                self.complete(result)
            }
            None => {
                // No index yet; the first rebuild will query this region
                self.view = ViewState::Idle(region);
                false
            }
        }
    }

    /// Resolve a tapped marker. Unknown clusters or wineries yield `None`.
    pub fn tap_cluster(&self, id: ClusterId) -> Option<TapOutcome> {
        let index = self.index.as_ref()?;
        let result = index.get_leaves(id, self.settings.leaf_limit, 0).and_then(|leaves| {
            let zoom = index.expansion_zoom(id)?;
            Ok((leaves, zoom))
        });
        let (leaves, expansion_zoom) = match result {
            Ok(found) => found,
            Err(e) => {
                warn!("cluster tap ignored: {e}");
                return None;
            }
        };

        let bbox = BoundingBox::around(leaves.iter().map(|f| f.position))?;
        let mut region = MapRegion::fit(bbox, FIT_PADDING, MIN_FIT_DELTA);
        let split_span = span_for_zoom(expansion_zoom);
        if region.lng_delta > split_span {
            let scale = split_span / region.lng_delta;
            region.lng_delta = split_span;
            region.lat_delta = (region.lat_delta * scale).max(MIN_FIT_DELTA);
        }
        Some(TapOutcome::ZoomTo { region, leaves })
    }

    pub fn tap_winery(&self, id: &WineryId) -> Option<TapOutcome> {
        self.winery(id).cloned().map(TapOutcome::Winery)
    }

    pub fn winery(&self, id: &WineryId) -> Option<&EnrichedWinery> {
        self.enriched.as_ref()?.iter().find(|w| w.id() == id)
    }

    fn user_and_known(&self, id: &WineryId) -> Result<&UserSession, StatusError> {
        if self.catalog.get(id).is_none() {
            return Err(StatusError::UnknownWinery(id.clone()));
        }
        self.user.as_ref().ok_or(StatusError::Unauthenticated)
    }

    pub fn toggle_favorite(&mut self, id: &WineryId) -> Result<bool, StatusError> {
        let user = self.user_and_known(id)?;
        let favorite = !self.winery(id).is_some_and(|w| w.status.is_favorite);
        self.backend.set_favorite(user, id, favorite)?;
        info!(winery = %id, favorite, "favorite toggled");
        self.request_status();
        Ok(favorite)
    }

    pub fn toggle_wishlist(&mut self, id: &WineryId) -> Result<bool, StatusError> {
        let user = self.user_and_known(id)?;
        let current = self.winery(id).map(|w| w.status.clone()).unwrap_or_default();
        let wanted = if current.is_want_to_visit {
            match &current.wishlist_entry {
                Some(entry) => self.backend.remove_from_wishlist(user, entry)?,
                None => self.backend.clear_wishlist(user, id)?,
            }
            false
        } else {
            self.backend.add_to_wishlist(user, id)?;
            true
        };
        info!(winery = %id, wanted, "wishlist toggled");
        self.request_status();
        Ok(wanted)
    }

    pub fn record_visit(&mut self, id: &WineryId, date: NaiveDate) -> Result<(), StatusError> {
        let user = self.user_and_known(id)?;
        self.backend.record_visit(user, id, date)?;
        info!(winery = %id, %date, "visit recorded");
        self.request_status();
        Ok(())
    }

    pub fn set_filter(&mut self, filter: WineryFilter) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.rebuild();
    }

    pub fn filter(&self) -> &WineryFilter {
        &self.filter
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn index(&self) -> Option<&Arc<ClusterIndex>> {
        self.index.as_ref()
    }

    pub fn enriched(&self) -> Option<&Arc<[EnrichedWinery]>> {
        self.enriched.as_ref()
    }

    pub fn status_state(&self) -> StatusState {
        match &self.status {
            None => StatusState::Loading,
            Some(StatusSnapshot::Loaded(_)) => StatusState::Loaded,
            Some(StatusSnapshot::Unavailable) => StatusState::Defaulted,
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.awaiting.is_some()
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WineryRecord;
    use crate::filter::StatusFilter;
    use crate::status::{MemoryStatusStore, StatusFlags, WishlistEntryId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::new(vec![
                WineryRecord::new("a", "Alpha", "", 37.0, -78.0),
                WineryRecord::new("b", "Beta", "", 37.01, -78.01),
                WineryRecord::new("c", "Gamma", "", 40.0, -80.0),
            ])
            .unwrap(),
        )
    }

    fn overview() -> MapRegion {
        MapRegion::new(38.5, -79.0, 5.0, 5.0)
    }

    fn session_with(backend: Arc<dyn StatusBackend>, user: Option<UserSession>) -> MapSession {
        MapSession::new(catalog(), backend, user, SessionSettings::default())
    }

    fn alice() -> Option<UserSession> {
        Some(UserSession::new("alice"))
    }

    /// Poll until a status delivery lands
    fn wait(session: &mut MapSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.is_fetching() && Instant::now() < deadline {
            session.poll(Instant::now());
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!session.is_fetching(), "status never arrived");
    }

    /// Backend that blocks until told to answer
    struct Gate {
        open: std::sync::Mutex<bool>,
        calls: AtomicUsize,
    }

    impl Gate {
        fn new() -> Self {
            Self {
                open: std::sync::Mutex::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn release(&self) {
            *self.open.lock().unwrap() = true;
        }
    }

    impl StatusBackend for Gate {
        fn fetch(&self, _: &UserSession, _: &StatusRequest) -> Result<StatusMap, StatusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !*self.open.lock().unwrap() {
                thread::sleep(Duration::from_millis(1));
            }
            let mut map = StatusMap::new();
            map.insert(WineryId::from("c"), StatusFlags { is_favorite: true, ..Default::default() });
            Ok(map)
        }
        fn set_favorite(&self, _: &UserSession, _: &WineryId, _: bool) -> Result<(), StatusError> {
            Ok(())
        }
        fn add_to_wishlist(&self, _: &UserSession, _: &WineryId) -> Result<WishlistEntryId, StatusError> {
            Ok(WishlistEntryId("w".to_string()))
        }
        fn remove_from_wishlist(&self, _: &UserSession, _: &WishlistEntryId) -> Result<(), StatusError> {
            Ok(())
        }
        fn clear_wishlist(&self, _: &UserSession, _: &WineryId) -> Result<(), StatusError> {
            Ok(())
        }
        fn record_visit(&self, _: &UserSession, _: &WineryId, _: NaiveDate) -> Result<(), StatusError> {
            Ok(())
        }
    }

    #[test]
    fn test_no_frame_before_status_then_initial_query() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        assert!(session.frame().is_none());
        assert_eq!(session.status_state(), StatusState::Loading);

        wait(&mut session);
        let frame = session.frame().expect("initial frame");
        assert_eq!(frame.zoom, 5);
        assert_eq!(frame.markers.iter().map(ClusterOrPoint::point_count).sum::<usize>(), 3);
        assert_eq!(session.status_state(), StatusState::Loaded);
        assert_eq!(session.view(), ViewState::Idle(overview()));
    }

    #[test]
    fn test_offline_backend_still_renders() {
        let store = MemoryStatusStore::new();
        store.set_available(false);
        let mut session = session_with(Arc::new(store), alice());
        session.mount(overview());
        wait(&mut session);

        assert_eq!(session.status_state(), StatusState::Defaulted);
        assert_eq!(session.enriched().unwrap().len(), 3);
        assert!(session.frame().is_some());
    }

    #[test]
    fn test_signed_out_defaults_flags() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), None);
        session.mount(overview());
        wait(&mut session);
        assert_eq!(session.status_state(), StatusState::Defaulted);
        assert!(matches!(
            session.toggle_favorite(&WineryId::from("a")),
            Err(StatusError::Unauthenticated)
        ));
    }

    #[test]
    fn test_timeout_renders_defaults_then_late_answer_applies() {
        let gate = Arc::new(Gate::new());
        let mut session = MapSession::new(
            catalog(),
            gate.clone(),
            alice(),
            SessionSettings {
                status_timeout: Duration::from_millis(10),
                ..SessionSettings::default()
            },
        );
        session.mount(overview());

        let later = Instant::now() + Duration::from_millis(50);
        assert!(session.poll(later));
        assert_eq!(session.status_state(), StatusState::Defaulted);
        assert!(session.frame().is_some());

        gate.release();
        wait(&mut session);
        assert_eq!(session.status_state(), StatusState::Loaded);
        assert!(session.winery(&WineryId::from("c")).unwrap().status.is_favorite);
    }

    #[test]
    fn test_stale_status_delivery_is_dropped() {
        let gate = Arc::new(Gate::new());
        let mut session = session_with(gate.clone(), alice());
        session.mount(overview());
        session.request_status();
        gate.release();

        // Both answers arrive; only the second request's is applied
        let deadline = Instant::now() + Duration::from_secs(5);
        while gate.calls.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        wait(&mut session);
        assert_eq!(session.status_state(), StatusState::Loaded);
    }

    #[test]
    fn test_unmounted_session_ignores_deliveries() {
        let gate = Arc::new(Gate::new());
        let mut session = session_with(gate.clone(), alice());
        session.mount(overview());
        session.unmount();
        gate.release();

        thread::sleep(Duration::from_millis(50));
        assert!(!session.poll(Instant::now()));
        assert!(session.frame().is_none());
        assert_eq!(session.status_state(), StatusState::Loading);
        assert!(session.begin_recompute(overview()).is_none());
    }

    #[test]
    fn test_latest_viewport_wins() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);

        let zoomed = MapRegion::new(37.005, -78.005, 0.02, 0.0105);
        let first = session.begin_recompute(overview()).unwrap();
        let old_job = session.query_job(first).unwrap();
        let second = session.begin_recompute(zoomed).unwrap();
        let new_job = session.query_job(second).unwrap();
        assert!(session.query_job(first).is_none());

        // Newer result lands first, then the stale one must not overwrite it
        assert!(session.complete(new_job.run()));
        assert!(!session.complete(old_job.run()));

        let frame = session.frame().unwrap();
        assert_eq!(frame.region, zoomed);
        assert_eq!(frame.zoom, 14);
        assert_eq!(frame.markers.len(), 2);
        assert!(frame.markers.iter().all(|m| !m.is_cluster()));
    }

    #[test]
    fn test_bad_viewport_yields_empty_frame() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);

        assert!(session.settle(MapRegion::new(38.0, -78.0, 1.0, 0.0)));
        assert!(session.frame().unwrap().markers.is_empty());
        assert!(session.settle(overview()));
        assert!(!session.frame().unwrap().markers.is_empty());
    }

    #[test]
    fn test_index_not_rebuilt_on_pan() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);

        let before = session.index().unwrap().clone();
        session.settle(MapRegion::new(37.0, -78.0, 1.0, 1.0));
        session.settle(MapRegion::new(40.0, -80.0, 0.1, 0.1));
        assert!(Arc::ptr_eq(&before, session.index().unwrap()));
    }

    #[test]
    fn test_tap_cluster_zooms_far_enough_to_split() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);

        let cluster = session
            .frame()
            .unwrap()
            .markers
            .iter()
            .find_map(|m| match m {
                ClusterOrPoint::Cluster(c) => Some(c.id),
                ClusterOrPoint::Point(_) => None,
            })
            .expect("a cluster at zoom 5");

        let Some(TapOutcome::ZoomTo { region, leaves }) = session.tap_cluster(cluster) else {
            panic!("expected zoom-to");
        };
        assert_eq!(leaves.len(), 2);

        session.settle(region);
        let frame = session.frame().unwrap();
        assert!(frame.markers.iter().all(|m| !m.is_cluster()), "{:?}", frame.markers);
        assert_eq!(frame.markers.len(), 2);
    }

    #[test]
    fn test_wishlist_without_entry_id_can_be_cleared() {
        let mut rows = StatusMap::new();
        rows.insert(
            WineryId::from("b"),
            StatusFlags {
                is_want_to_visit: true,
                ..StatusFlags::default()
            },
        );
        let store = MemoryStatusStore::new().with_user("alice", rows);
        let mut session = session_with(Arc::new(store), alice());
        session.mount(overview());
        wait(&mut session);
        let id = WineryId::from("b");
        assert!(session.winery(&id).unwrap().status.is_want_to_visit);

        assert!(!session.toggle_wishlist(&id).unwrap());
        wait(&mut session);
        assert!(!session.winery(&id).unwrap().status.is_want_to_visit);
    }

    #[test]
    fn test_mutations_refresh_status() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);
        let id = WineryId::from("b");

        assert!(session.toggle_favorite(&id).unwrap());
        wait(&mut session);
        assert!(session.winery(&id).unwrap().status.is_favorite);

        assert!(session.toggle_wishlist(&id).unwrap());
        wait(&mut session);
        assert!(session.winery(&id).unwrap().status.is_want_to_visit);

        assert!(!session.toggle_wishlist(&id).unwrap());
        wait(&mut session);
        assert!(!session.winery(&id).unwrap().status.is_want_to_visit);

        let day = NaiveDate::from_ymd_opt(2024, 9, 14).unwrap();
        session.record_visit(&id, day).unwrap();
        wait(&mut session);
        let status = &session.winery(&id).unwrap().status;
        assert!(status.visited);
        assert_eq!(status.last_visit_date, Some(day));

        assert!(matches!(
            session.toggle_favorite(&WineryId::from("nope")),
            Err(StatusError::UnknownWinery(_))
        ));
    }

    #[test]
    fn test_filter_rebuilds_index() {
        let mut session = session_with(Arc::new(MemoryStatusStore::new()), alice());
        session.mount(overview());
        wait(&mut session);

        session.set_filter(WineryFilter {
            status: StatusFilter::All,
            query: "gamma".to_string(),
        });
        assert_eq!(session.index().unwrap().len(), 1);
        let frame = session.frame().unwrap();
        assert_eq!(frame.markers.len(), 1);
        assert!(!frame.markers[0].is_cluster());

        session.set_filter(WineryFilter::default());
        assert_eq!(session.index().unwrap().len(), 3);
    }
}
