//! Site (tenant) records.

use serde::{Deserialize, Serialize};

/// Numeric site identifier.
pub type SiteId = i64;

/// Id of the site seeded by the first migration.
pub const MAIN_SITE_ID: SiteId = 1;

/// One tenant partition. Events and categories are scoped to a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub domain: String,
}

impl Site {
    pub fn is_main(&self) -> bool {
        self.id == MAIN_SITE_ID
    }
}
