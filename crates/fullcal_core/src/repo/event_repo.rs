//! Event and category repository.
//!
//! # Invariants
//! - An event may only reference a category of its own site.
//! - Event lists are ordered by title, then id.
//! - Deleting an event deletes its occurrences (foreign-key cascade).

use crate::model::event::{
    validate_category, CategoryId, Event, EventCategory, EventId, NewEvent,
};
use crate::model::site::SiteId;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const EVENT_SELECT_SQL: &str = "SELECT id, site_id, category_id, title, slug, content FROM events";
const CATEGORY_SELECT_SQL: &str = "SELECT id, site_id, name, description FROM event_categories";

pub trait EventRepository {
    fn create_category(
        &self,
        site_id: SiteId,
        name: &str,
        description: &str,
    ) -> RepoResult<EventCategory>;
    /// Returns the site's category named `name`, creating it when missing.
    fn get_or_create_category(&self, site_id: SiteId, name: &str) -> RepoResult<EventCategory>;
    fn get_category(&self, id: CategoryId) -> RepoResult<Option<EventCategory>>;
    fn list_categories(&self, site_id: SiteId) -> RepoResult<Vec<EventCategory>>;
    fn create_event(&self, event: &NewEvent) -> RepoResult<Event>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    /// Events ordered by title; `None` lists every site.
    fn list_events(&self, site_id: Option<SiteId>) -> RepoResult<Vec<Event>>;
    /// Deletes an event together with its occurrences.
    fn delete_event(&self, id: EventId) -> RepoResult<()>;
}

pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["sites", "event_categories", "events"])?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_category(
        &self,
        site_id: SiteId,
        name: &str,
        description: &str,
    ) -> RepoResult<EventCategory> {
        validate_category(name, description)?;
        self.conn.execute(
            "INSERT INTO event_categories (site_id, name, description) VALUES (?1, ?2, ?3);",
            params![site_id, name.trim(), description],
        )?;
        Ok(EventCategory {
            id: self.conn.last_insert_rowid(),
            site_id,
            name: name.trim().to_string(),
            description: description.to_string(),
        })
    }

    fn get_or_create_category(&self, site_id: SiteId, name: &str) -> RepoResult<EventCategory> {
        validate_category(name, "")?;
        self.conn.execute(
            "INSERT INTO event_categories (site_id, name, description)
             VALUES (?1, ?2, '')
             ON CONFLICT (site_id, name) DO NOTHING;",
            params![site_id, name.trim()],
        )?;
        let category = self.conn.query_row(
            &format!("{CATEGORY_SELECT_SQL} WHERE site_id = ?1 AND name = ?2;"),
            params![site_id, name.trim()],
            parse_category_row,
        )?;
        Ok(category)
    }

    fn get_category(&self, id: CategoryId) -> RepoResult<Option<EventCategory>> {
        let category = self
            .conn
            .query_row(
                &format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_category_row,
            )
            .optional()?;
        Ok(category)
    }

    fn list_categories(&self, site_id: SiteId) -> RepoResult<Vec<EventCategory>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CATEGORY_SELECT_SQL} WHERE site_id = ?1 ORDER BY name ASC, id ASC;"
        ))?;
        let categories = stmt
            .query_map([site_id], parse_category_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    fn create_event(&self, event: &NewEvent) -> RepoResult<Event> {
        event.validate()?;

        if let Some(category_id) = event.category_id {
            let category = self.get_category(category_id)?.ok_or(RepoError::NotFound {
                entity: "event category",
                id: category_id,
            })?;
            if category.site_id != event.site_id {
                return Err(RepoError::InvalidData(format!(
                    "event category {category_id} belongs to site {}, not site {}",
                    category.site_id, event.site_id
                )));
            }
        }

        let title = event.title.trim();
        let slug = event.slug();
        self.conn.execute(
            "INSERT INTO events (site_id, category_id, title, slug, content)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                event.site_id,
                event.category_id,
                title,
                slug.as_str(),
                event.content.as_str(),
            ],
        )?;

        Ok(Event {
            id: self.conn.last_insert_rowid(),
            site_id: event.site_id,
            category_id: event.category_id,
            title: title.to_string(),
            slug,
            content: event.content.clone(),
        })
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        let event = self
            .conn
            .query_row(
                &format!("{EVENT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                parse_event_row,
            )
            .optional()?;
        Ok(event)
    }

    fn list_events(&self, site_id: Option<SiteId>) -> RepoResult<Vec<Event>> {
        let mut sql = format!("{EVENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(site_id) = site_id {
            sql.push_str(" AND site_id = ?");
            bind_values.push(Value::Integer(site_id));
        }
        sql.push_str(" ORDER BY title ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(bind_values), parse_event_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    fn delete_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM events WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "event", id });
        }
        info!("event=event_delete module=repo status=ok event_id={id}");
        Ok(())
    }
}

fn parse_event_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        category_id: row.get("category_id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        content: row.get("content")?,
    })
}

fn parse_category_row(row: &Row<'_>) -> rusqlite::Result<EventCategory> {
    Ok(EventCategory {
        id: row.get("id")?,
        site_id: row.get("site_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
    })
}
