use crate::merge::EnrichedWinery;
use std::sync::Arc;

/// Status facet of the winery filter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Visited,
    NotVisited,
    Favorites,
    Wishlist,
}

impl StatusFilter {
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Visited,
            StatusFilter::Visited => StatusFilter::NotVisited,
            StatusFilter::NotVisited => StatusFilter::Favorites,
            StatusFilter::Favorites => StatusFilter::Wishlist,
            StatusFilter::Wishlist => StatusFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Visited => "visited",
            StatusFilter::NotVisited => "not visited",
            StatusFilter::Favorites => "favorites",
            StatusFilter::Wishlist => "wishlist",
        }
    }

    fn accepts(self, winery: &EnrichedWinery) -> bool {
        let s = &winery.status;
        match self {
            StatusFilter::All => true,
            StatusFilter::Visited => s.visited,
            StatusFilter::NotVisited => !s.visited,
            StatusFilter::Favorites => s.is_favorite,
            StatusFilter::Wishlist => s.is_want_to_visit,
        }
    }
}

/// Status + free-text filter applied before indexing
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WineryFilter {
    pub status: StatusFilter,
    pub query: String,
}

impl WineryFilter {
    pub fn is_noop(&self) -> bool {
        self.status == StatusFilter::All && self.query.trim().is_empty()
    }

    pub fn matches(&self, winery: &EnrichedWinery) -> bool {
        if !self.status.accepts(winery) {
            return false;
        }
        let needle = self.query.trim().to_lowercase();
        needle.is_empty()
            || winery.record.name.to_lowercase().contains(&needle)
            || winery.record.address.to_lowercase().contains(&needle)
    }

    /// Hands the input back untouched when nothing would be filtered
    pub fn apply(&self, wineries: &Arc<[EnrichedWinery]>) -> Arc<[EnrichedWinery]> {
        if self.is_noop() {
            return wineries.clone();
        }
        wineries.iter().filter(|w| self.matches(w)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WineryRecord;
    use crate::status::StatusFlags;

    fn winery(name: &str, address: &str, status: StatusFlags) -> EnrichedWinery {
        EnrichedWinery {
            record: WineryRecord::new(name, name, address, 37.0, -78.0),
            status,
        }
    }

    fn sample() -> Arc<[EnrichedWinery]> {
        vec![
            winery("Keswick", "Keswick, VA", StatusFlags { visited: true, visit_count: 1, ..Default::default() }),
            winery("Linden", "Linden, VA", StatusFlags { is_favorite: true, ..Default::default() }),
            winery("Breaux", "Purcellville, VA", StatusFlags { is_want_to_visit: true, ..Default::default() }),
        ]
        .into()
    }

    #[test]
    fn test_noop_filter_shares_input() {
        let input = sample();
        let out = WineryFilter::default().apply(&input);
        assert!(Arc::ptr_eq(&input, &out));
    }

    #[test]
    fn test_status_facets() {
        let input = sample();
        let pick = |status| {
            WineryFilter { status, query: String::new() }
                .apply(&input)
                .iter()
                .map(|w| w.record.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(StatusFilter::Visited), vec!["Keswick"]);
        assert_eq!(pick(StatusFilter::NotVisited), vec!["Linden", "Breaux"]);
        assert_eq!(pick(StatusFilter::Favorites), vec!["Linden"]);
        assert_eq!(pick(StatusFilter::Wishlist), vec!["Breaux"]);
    }

    #[test]
    fn test_query_matches_address_case_insensitively() {
        let filter = WineryFilter {
            status: StatusFilter::All,
            query: "PURCELL".to_string(),
        };
        let out = filter.apply(&sample());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.name, "Breaux");
    }

    #[test]
    fn test_cycle_returns_to_all() {
        let mut f = StatusFilter::All;
        for _ in 0..5 {
            f = f.next();
        }
        assert_eq!(f, StatusFilter::All);
    }
}
