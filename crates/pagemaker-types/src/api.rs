use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of sections a single landing page may hold.
pub const MAX_SECTIONS_PER_PAGE: usize = 25;

/// Maximum number of buttons per section.
pub const MAX_BUTTONS_PER_SECTION: usize = 3;

/// Maximum number of images per section.
pub const MAX_IMAGES_PER_SECTION: usize = 8;

// -- JWT Claims --

/// JWT claims shared between the auth endpoints (token issuance) and the
/// request middleware (token validation). Canonical definition lives here
/// in pagemaker-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default)]
    pub is_guest: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Landing pages --

/// Where a section button points: an external URL or an in-page scroll
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Url,
    Scroll,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Url => "url",
            LinkType::Scroll => "scroll",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ButtonInput {
    pub label: String,
    pub link_type: LinkType,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageInput {
    pub url: String,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionInput {
    pub name: String,
    pub intro: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub buttons: Option<Vec<ButtonInput>>,
    pub images: Option<Vec<ImageInput>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePageRequest {
    pub url: String,
    pub description: String,
    pub sections: Option<Vec<SectionInput>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePageRequest {
    pub url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ButtonResponse {
    pub id: Uuid,
    pub label: String,
    pub link_type: LinkType,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SectionResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: i64,
    pub buttons: Vec<ButtonResponse>,
    pub images: Vec<ImageResponse>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub id: Uuid,
    pub url: String,
    pub description: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sections: Vec<SectionResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub filename: String,
    pub content: String,
}
