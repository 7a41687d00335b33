//! Site repository.

use crate::model::site::{Site, SiteId};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SITE_SELECT_SQL: &str = "SELECT id, name, domain FROM sites";

pub trait SiteRepository {
    fn create_site(&self, name: &str, domain: &str) -> RepoResult<Site>;
    fn get_site(&self, id: SiteId) -> RepoResult<Option<Site>>;
    /// All sites ordered by id.
    fn list_sites(&self) -> RepoResult<Vec<Site>>;
}

pub struct SqliteSiteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSiteRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["sites"])?;
        Ok(Self { conn })
    }
}

impl SiteRepository for SqliteSiteRepository<'_> {
    fn create_site(&self, name: &str, domain: &str) -> RepoResult<Site> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidData("site name cannot be empty".to_string()));
        }
        self.conn.execute(
            "INSERT INTO sites (name, domain) VALUES (?1, ?2);",
            params![name, domain.trim()],
        )?;
        Ok(Site {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            domain: domain.trim().to_string(),
        })
    }

    fn get_site(&self, id: SiteId) -> RepoResult<Option<Site>> {
        let site = self
            .conn
            .query_row(
                &format!("{SITE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_site_row,
            )
            .optional()?;
        Ok(site)
    }

    fn list_sites(&self) -> RepoResult<Vec<Site>> {
        let mut stmt = self.conn.prepare(&format!("{SITE_SELECT_SQL} ORDER BY id ASC;"))?;
        let sites = stmt
            .query_map([], parse_site_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sites)
    }
}

fn parse_site_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get("id")?,
        name: row.get("name")?,
        domain: row.get("domain")?,
    })
}
