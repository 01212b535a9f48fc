use crate::Database;
use crate::models::{ButtonRow, ImageRow, NewPage, PageRow, SectionRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Landing pages --

    /// All pages owned by `user_id` with the given archived flag, most
    /// recently updated first.
    pub fn list_pages(&self, user_id: &str, archived: bool) -> Result<Vec<PageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, url, description, archived, created_at, updated_at
                 FROM landing_pages
                 WHERE user_id = ?1 AND archived = ?2
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, archived], page_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_page(&self, user_id: &str, id: &str) -> Result<Option<PageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, url, description, archived, created_at, updated_at
                 FROM landing_pages
                 WHERE id = ?1 AND user_id = ?2",
            )?;
            let row = stmt.query_row([id, user_id], page_from_row).optional()?;
            Ok(row)
        })
    }

    /// Id of the owner's page with this exact url, if any. Used for the
    /// friendly Conflict check before insert; the UNIQUE(user_id, url)
    /// constraint is the race backstop.
    pub fn page_id_by_url(&self, user_id: &str, url: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM landing_pages WHERE user_id = ?1 AND url = ?2",
                    [user_id, url],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Same as [`page_id_by_url`] but ignoring one page id — used when a
    /// page is updated to a url it may already hold itself.
    pub fn page_id_by_url_excluding(
        &self,
        user_id: &str,
        url: &str,
        exclude_id: &str,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM landing_pages
                     WHERE user_id = ?1 AND url = ?2 AND id != ?3",
                    [user_id, url, exclude_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// All of the owner's urls starting with `prefix`, for duplicate-suffix
    /// probing in a single round trip.
    pub fn urls_with_prefix(&self, user_id: &str, prefix: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT url FROM landing_pages WHERE user_id = ?1 AND url LIKE ?2 || '%'",
            )?;
            let rows = stmt
                .query_map([user_id, prefix], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Insert a page and its whole section tree in one transaction.
    /// Section `ord` is the slice index; child ids are freshly generated.
    pub fn insert_page(&self, page: &NewPage) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO landing_pages (id, user_id, url, description, archived)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![page.id, page.user_id, page.url, page.description, page.archived],
            )?;

            for (ord, section) in page.sections.iter().enumerate() {
                let section_id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO sections (id, landing_page_id, name, intro, title, subtitle, description, ord)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        section_id,
                        page.id,
                        section.name,
                        section.intro,
                        section.title,
                        section.subtitle,
                        section.description,
                        ord as i64,
                    ],
                )?;

                for button in &section.buttons {
                    tx.execute(
                        "INSERT INTO buttons (id, section_id, label, link_type, value)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            section_id,
                            button.label,
                            button.link_type.as_str(),
                            button.value,
                        ],
                    )?;
                }

                for image in &section.images {
                    tx.execute(
                        "INSERT INTO images (id, section_id, url, alt) VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![Uuid::new_v4().to_string(), section_id, image.url, image.alt],
                    )?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Set the archived flag on an owned page. Returns false when no row
    /// matched (missing id or different owner).
    pub fn set_archived(&self, user_id: &str, id: &str, archived: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE landing_pages
                 SET archived = ?1, updated_at = datetime('now')
                 WHERE id = ?2 AND user_id = ?3",
                rusqlite::params![archived, id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Partial update of url and/or description. Returns false when no row
    /// matched.
    pub fn update_page(
        &self,
        user_id: &str,
        id: &str,
        url: Option<&str>,
        description: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE landing_pages
                 SET url = COALESCE(?1, url),
                     description = COALESCE(?2, description),
                     updated_at = datetime('now')
                 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![url, description, id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete an owned page; sections, buttons, and images go with it via
    /// cascade. Returns false when no row matched.
    pub fn delete_page(&self, user_id: &str, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM landing_pages WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Nested content (batch loads, grouped by the caller) --

    /// Sections for a set of page ids, ascending by ord.
    pub fn sections_for_pages(&self, page_ids: &[String]) -> Result<Vec<SectionRow>> {
        if page_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, landing_page_id, name, intro, title, subtitle, description, ord
                 FROM sections WHERE landing_page_id IN ({})
                 ORDER BY ord ASC",
                in_placeholders(page_ids.len()),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(page_ids), |row| {
                    Ok(SectionRow {
                        id: row.get(0)?,
                        landing_page_id: row.get(1)?,
                        name: row.get(2)?,
                        intro: row.get(3)?,
                        title: row.get(4)?,
                        subtitle: row.get(5)?,
                        description: row.get(6)?,
                        ord: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn buttons_for_sections(&self, section_ids: &[String]) -> Result<Vec<ButtonRow>> {
        if section_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, section_id, label, link_type, value
                 FROM buttons WHERE section_id IN ({})",
                in_placeholders(section_ids.len()),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(section_ids), |row| {
                    Ok(ButtonRow {
                        id: row.get(0)?,
                        section_id: row.get(1)?,
                        label: row.get(2)?,
                        link_type: row.get(3)?,
                        value: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn images_for_sections(&self, section_ids: &[String]) -> Result<Vec<ImageRow>> {
        if section_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, section_id, url, alt FROM images WHERE section_id IN ({})",
                in_placeholders(section_ids.len()),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(section_ids), |row| {
                    Ok(ImageRow {
                        id: row.get(0)?,
                        section_id: row.get(1)?,
                        url: row.get(2)?,
                        alt: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn page_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<PageRow, rusqlite::Error> {
    Ok(PageRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        archived: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, is_guest, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                is_guest: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn in_placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
