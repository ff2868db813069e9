//! Per-user winery status: canonical flags, the backend seam, and the
//! normalization step applied to whatever rows a backend hands back.

mod store;

pub use store::{JsonStatusStore, MemoryStatusStore};

use crate::auth::UserSession;
use crate::catalog::WineryId;
use crate::error::StatusError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Backend-issued id of a wishlist row, needed to remove it again
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WishlistEntryId(pub String);

impl fmt::Display for WishlistEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical status of one winery for one user
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusFlags {
    pub visited: bool,
    pub visit_count: u32,
    pub last_visit_date: Option<NaiveDate>,
    pub is_favorite: bool,
    pub is_want_to_visit: bool,
    pub wishlist_entry: Option<WishlistEntryId>,
}

pub type StatusMap = HashMap<WineryId, StatusFlags>;

/// Which wineries a fetch should answer for
#[derive(Clone, Debug, PartialEq)]
pub enum StatusRequest {
    All,
    Ids(Vec<WineryId>),
}

impl StatusRequest {
    pub fn wants(&self, id: &WineryId) -> bool {
        match self {
            StatusRequest::All => true,
            StatusRequest::Ids(ids) => ids.contains(id),
        }
    }
}

/// Remote store of per-user status. Implementations may be slow or fail;
/// callers treat any fetch error as "status unknown".
pub trait StatusBackend: Send + Sync {
    fn fetch(&self, user: &UserSession, request: &StatusRequest) -> Result<StatusMap, StatusError>;

    fn set_favorite(&self, user: &UserSession, id: &WineryId, favorite: bool) -> Result<(), StatusError>;

    fn add_to_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<WishlistEntryId, StatusError>;

    fn remove_from_wishlist(&self, user: &UserSession, entry: &WishlistEntryId) -> Result<(), StatusError>;

    /// Drop `id` from the wishlist even when the row carries no entry id.
    /// Clearing a winery that is not wishlisted succeeds.
    fn clear_wishlist(&self, user: &UserSession, id: &WineryId) -> Result<(), StatusError>;

    fn record_visit(&self, user: &UserSession, id: &WineryId, date: NaiveDate) -> Result<(), StatusError>;
}

/// Ids arrive as strings or numbers depending on the backend
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// A status row exactly as a backend may spell it. Field names vary
/// between snake_case and camelCase, so every alias is accepted here and
/// nowhere else.
#[derive(Clone, Debug, Deserialize)]
pub struct RawStatusRow {
    #[serde(alias = "wineryId", alias = "id")]
    winery_id: RawId,
    #[serde(default)]
    visited: Option<bool>,
    #[serde(default, alias = "visitCount")]
    visit_count: Option<u32>,
    #[serde(default, alias = "lastVisitDate")]
    last_visit_date: Option<NaiveDate>,
    #[serde(default, alias = "isFavorite", alias = "favorite")]
    is_favorite: Option<bool>,
    #[serde(default, alias = "isWantToVisit", alias = "want_to_visit", alias = "wantToVisit")]
    is_want_to_visit: Option<bool>,
    #[serde(default, alias = "wishlistId")]
    wishlist_id: Option<RawId>,
}

impl RawStatusRow {
    /// Collapse a raw row into the canonical schema
    pub fn normalize(self) -> (WineryId, StatusFlags) {
        let visit_count = self.visit_count.unwrap_or(0);
        let wishlist_entry = self.wishlist_id.map(|id| WishlistEntryId(id.into_string()));
        let flags = StatusFlags {
            visited: self.visited.unwrap_or(false) || visit_count > 0,
            visit_count,
            last_visit_date: self.last_visit_date,
            is_favorite: self.is_favorite.unwrap_or(false),
            is_want_to_visit: self.is_want_to_visit.unwrap_or(false) || wishlist_entry.is_some(),
            wishlist_entry,
        };
        (WineryId(self.winery_id.into_string()), flags)
    }
}

/// Normalize a batch of rows; later rows for the same id win
pub fn normalize_rows(rows: impl IntoIterator<Item = RawStatusRow>) -> StatusMap {
    rows.into_iter().map(RawStatusRow::normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str) -> Vec<RawStatusRow> {
        let mut bytes = text.as_bytes().to_vec();
        simd_json::from_slice(&mut bytes).unwrap()
    }

    #[test]
    fn test_camel_and_snake_rows_normalize_alike() {
        let rows = decode(
            r#"[
                {"winery_id": "1", "visit_count": 2, "last_visit_date": "2024-05-01", "is_favorite": true},
                {"wineryId": 2, "visitCount": 2, "lastVisitDate": "2024-05-01", "isFavorite": true}
            ]"#,
        );
        let map = normalize_rows(rows);

        let one = &map[&WineryId::from("1")];
        let two = &map[&WineryId::from("2")];
        assert_eq!(one, two);
        assert!(one.visited);
        assert_eq!(one.last_visit_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn test_wishlist_id_implies_want_to_visit() {
        let rows = decode(r#"[{"winery_id": "9", "wishlistId": 44}]"#);
        let map = normalize_rows(rows);
        let flags = &map[&WineryId::from("9")];
        assert!(flags.is_want_to_visit);
        assert_eq!(flags.wishlist_entry, Some(WishlistEntryId("44".to_string())));
        assert!(!flags.visited);
    }

    #[test]
    fn test_missing_fields_default_false() {
        let rows = decode(r#"[{"id": "3"}]"#);
        let map = normalize_rows(rows);
        assert_eq!(map[&WineryId::from("3")], StatusFlags::default());
    }

    #[test]
    fn test_request_wants() {
        let request = StatusRequest::Ids(vec![WineryId::from("a")]);
        assert!(request.wants(&WineryId::from("a")));
        assert!(!request.wants(&WineryId::from("b")));
        assert!(StatusRequest::All.wants(&WineryId::from("b")));
    }
}
