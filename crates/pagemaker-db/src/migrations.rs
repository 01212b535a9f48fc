use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_guest    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS landing_pages (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            url         TEXT NOT NULL,
            description TEXT NOT NULL,
            archived    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(user_id, url)
        );

        CREATE INDEX IF NOT EXISTS idx_landing_pages_user
            ON landing_pages(user_id, archived, updated_at);

        CREATE TABLE IF NOT EXISTS sections (
            id              TEXT PRIMARY KEY,
            landing_page_id TEXT NOT NULL REFERENCES landing_pages(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            intro           TEXT,
            title           TEXT,
            subtitle        TEXT,
            description     TEXT,
            ord             INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sections_page
            ON sections(landing_page_id, ord);

        CREATE TABLE IF NOT EXISTS buttons (
            id          TEXT PRIMARY KEY,
            section_id  TEXT NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            label       TEXT NOT NULL,
            link_type   TEXT NOT NULL,
            value       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_buttons_section
            ON buttons(section_id);

        CREATE TABLE IF NOT EXISTS images (
            id          TEXT PRIMARY KEY,
            section_id  TEXT NOT NULL REFERENCES sections(id) ON DELETE CASCADE,
            url         TEXT NOT NULL,
            alt         TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_images_section
            ON images(section_id);

        -- Seed the shared guest account. It has no usable password; the
        -- guest endpoint issues its tokens directly.
        INSERT OR IGNORE INTO users (id, username, password, is_guest)
            VALUES ('00000000-0000-0000-0000-000000000001', 'guest', '', 1);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
