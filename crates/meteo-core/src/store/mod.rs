// # Local Store Implementations
//
// This module provides implementations of the LocalStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileStore, FileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};

use crate::model::FavoriteCity;

/// Upsert into an insertion-ordered favorites table
///
/// Replacing an existing entry keeps its position.
pub(crate) fn upsert_ordered(favorites: &mut Vec<FavoriteCity>, favorite: &FavoriteCity) {
    match favorites.iter_mut().find(|f| f.city_id == favorite.city_id) {
        Some(existing) => *existing = favorite.clone(),
        None => favorites.push(favorite.clone()),
    }
}

/// Remove from an insertion-ordered favorites table
pub(crate) fn remove_ordered(favorites: &mut Vec<FavoriteCity>, city_id: &str) -> bool {
    let before = favorites.len();
    favorites.retain(|f| f.city_id != city_id);
    favorites.len() != before
}
