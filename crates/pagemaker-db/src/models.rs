//! Database row types — these map directly to SQLite rows.
//! Distinct from the pagemaker-types API models to keep the DB layer
//! independent.

use pagemaker_types::api::LinkType;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub is_guest: bool,
    pub created_at: String,
}

pub struct PageRow {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub description: String,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SectionRow {
    pub id: String,
    pub landing_page_id: String,
    pub name: String,
    pub intro: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub ord: i64,
}

pub struct ButtonRow {
    pub id: String,
    pub section_id: String,
    pub label: String,
    pub link_type: String,
    pub value: String,
}

pub struct ImageRow {
    pub id: String,
    pub section_id: String,
    pub url: String,
    pub alt: Option<String>,
}

/// Input for the nested page insert. Section order is the slice index;
/// child row ids are generated at insert time.
pub struct NewPage {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub description: String,
    pub archived: bool,
    pub sections: Vec<NewSection>,
}

pub struct NewSection {
    pub name: String,
    pub intro: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub buttons: Vec<NewButton>,
    pub images: Vec<NewImage>,
}

pub struct NewButton {
    pub label: String,
    pub link_type: LinkType,
    pub value: String,
}

pub struct NewImage {
    pub url: String,
    pub alt: Option<String>,
}
