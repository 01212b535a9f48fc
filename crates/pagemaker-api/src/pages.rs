use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{error, warn};
use url::Url;
use uuid::Uuid;

use pagemaker_db::Database;
use pagemaker_db::models::{NewButton, NewImage, NewPage, NewSection, PageRow};
use pagemaker_types::api::{
    ButtonResponse, Claims, CreatePageRequest, DeleteResponse, ImageResponse, LinkType,
    MAX_BUTTONS_PER_SECTION, MAX_IMAGES_PER_SECTION, MAX_SECTIONS_PER_PAGE, PageResponse,
    SectionResponse, UpdatePageRequest,
};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub archived: bool,
}

pub async fn list_pages(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    // Run blocking DB reads off the async runtime
    let pages = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_pages(&user_id, query.archived)?;
        load_trees(&db.db, rows)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(pages))
}

pub async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    let page = tokio::task::spawn_blocking(move || load_owned_page(&db.db, &user_id, id))
        .await
        .map_err(join_err)??;

    Ok(Json(page))
}

pub async fn create_page(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_create(&req)?;

    let db = state.clone();
    let user_id = claims.sub.to_string();
    let page_id = Uuid::new_v4();

    let page = tokio::task::spawn_blocking(move || {
        if db.db.page_id_by_url(&user_id, &req.url)?.is_some() {
            return Err(ApiError::Conflict(
                "A landing page with this URL already exists",
            ));
        }

        let new_page = NewPage {
            id: page_id.to_string(),
            user_id: user_id.clone(),
            url: req.url,
            description: req.description,
            archived: false,
            sections: req
                .sections
                .unwrap_or_default()
                .into_iter()
                .map(|section| NewSection {
                    name: section.name,
                    intro: section.intro,
                    title: section.title,
                    subtitle: section.subtitle,
                    description: section.description,
                    buttons: section
                        .buttons
                        .unwrap_or_default()
                        .into_iter()
                        .map(|b| NewButton {
                            label: b.label,
                            link_type: b.link_type,
                            value: b.value,
                        })
                        .collect(),
                    images: section
                        .images
                        .unwrap_or_default()
                        .into_iter()
                        .map(|i| NewImage {
                            url: i.url,
                            alt: i.alt,
                        })
                        .collect(),
                })
                .collect(),
        };

        insert_and_reload(&db.db, &user_id, new_page)
    })
    .await
    .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn duplicate_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    let page = tokio::task::spawn_blocking(move || {
        let source = load_owned_page(&db.db, &user_id, id)?;

        // One query for every existing "<url>-N" variant, then pick the
        // lowest free N in memory. The original probed one candidate per
        // round trip with no upper bound.
        let taken = db.db.urls_with_prefix(&user_id, &format!("{}-", source.url))?;
        let new_url = next_available_url(&source.url, &taken);

        let copy = NewPage {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            url: new_url,
            description: source.description,
            archived: source.archived,
            // `sections` is already ascending by order, so slice position
            // reproduces the source order values.
            sections: source
                .sections
                .into_iter()
                .map(|section| NewSection {
                    name: section.name,
                    intro: section.intro,
                    title: section.title,
                    subtitle: section.subtitle,
                    description: section.description,
                    buttons: section
                        .buttons
                        .into_iter()
                        .map(|b| NewButton {
                            label: b.label,
                            link_type: b.link_type,
                            value: b.value,
                        })
                        .collect(),
                    images: section
                        .images
                        .into_iter()
                        .map(|i| NewImage {
                            url: i.url,
                            alt: i.alt,
                        })
                        .collect(),
                })
                .collect(),
        };

        insert_and_reload(&db.db, &user_id, copy)
    })
    .await
    .map_err(join_err)??;

    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn archive_page(
    state: State<AppState>,
    path: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    set_archived(state, path, claims, true).await
}

pub async fn unarchive_page(
    state: State<AppState>,
    path: Path<Uuid>,
    claims: Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    set_archived(state, path, claims, false).await
}

async fn set_archived(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    archived: bool,
) -> Result<Json<PageResponse>, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    let page = tokio::task::spawn_blocking(move || {
        // A zero-row scoped update means missing or not ours; both present
        // as NotFound.
        if !db.db.set_archived(&user_id, &id.to_string(), archived)? {
            return Err(ApiError::NotFound("Landing page not found"));
        }
        load_owned_page(&db.db, &user_id, id)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(url) = &req.url {
        validate_url(url, "Invalid URL format")?;
    }
    if let Some(description) = &req.description {
        if description.is_empty() {
            return Err(ApiError::Validation("Description is required".into()));
        }
    }

    let db = state.clone();
    let user_id = claims.sub.to_string();

    let page = tokio::task::spawn_blocking(move || {
        // If updating URL, check for collisions with the owner's other
        // pages; the page's own current URL is fine.
        if let Some(url) = &req.url {
            let clash = db
                .db
                .page_id_by_url_excluding(&user_id, url, &id.to_string())?;
            if clash.is_some() {
                return Err(ApiError::Conflict(
                    "A landing page with this URL already exists",
                ));
            }
        }

        let updated = db.db.update_page(
            &user_id,
            &id.to_string(),
            req.url.as_deref(),
            req.description.as_deref(),
        )?;
        if !updated {
            return Err(ApiError::NotFound("Landing page not found"));
        }

        load_owned_page(&db.db, &user_id, id)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(page))
}

pub async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    tokio::task::spawn_blocking(move || {
        if !db.db.delete_page(&user_id, &id.to_string())? {
            return Err(ApiError::NotFound("Landing page not found"));
        }
        Ok(())
    })
    .await
    .map_err(join_err)??;

    Ok(Json(DeleteResponse { deleted: true, id }))
}

// -- Validation --

fn validate_url(raw: &str, message: &str) -> Result<(), ApiError> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|_| ApiError::Validation(message.to_string()))
}

fn validate_create(req: &CreatePageRequest) -> Result<(), ApiError> {
    validate_url(&req.url, "Invalid URL format")?;
    if req.description.is_empty() {
        return Err(ApiError::Validation("Description is required".into()));
    }

    let Some(sections) = &req.sections else {
        return Ok(());
    };

    if sections.len() > MAX_SECTIONS_PER_PAGE {
        return Err(ApiError::Validation(format!(
            "Maximum {} sections per landing page",
            MAX_SECTIONS_PER_PAGE
        )));
    }

    for section in sections {
        if section.name.is_empty() {
            return Err(ApiError::Validation("Section name is required".into()));
        }

        if let Some(buttons) = &section.buttons {
            if buttons.len() > MAX_BUTTONS_PER_SECTION {
                return Err(ApiError::Validation(format!(
                    "Maximum {} buttons per section",
                    MAX_BUTTONS_PER_SECTION
                )));
            }
            for button in buttons {
                if button.label.is_empty() {
                    return Err(ApiError::Validation("Button label is required".into()));
                }
                if button.value.is_empty() {
                    return Err(ApiError::Validation("Button value is required".into()));
                }
            }
        }

        if let Some(images) = &section.images {
            if images.len() > MAX_IMAGES_PER_SECTION {
                return Err(ApiError::Validation(format!(
                    "Maximum {} images per section",
                    MAX_IMAGES_PER_SECTION
                )));
            }
            for image in images {
                validate_url(&image.url, "Invalid image URL")?;
            }
        }
    }

    Ok(())
}

/// Lowest unused "<base>-N" with N >= 2, given the owner's existing urls
/// under that prefix. Runs at most `taken.len() + 1` rounds, all in memory.
fn next_available_url(base: &str, taken: &[String]) -> String {
    let taken: std::collections::HashSet<&str> = taken.iter().map(String::as_str).collect();

    let mut suffix = 2u64;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

// -- Tree assembly --

pub(crate) fn join_err(e: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", e);
    ApiError::Internal(anyhow::anyhow!("task join error: {}", e))
}

/// Fetch one owned page with its full section tree, or NotFound.
pub(crate) fn load_owned_page(
    db: &Database,
    user_id: &str,
    id: Uuid,
) -> Result<PageResponse, ApiError> {
    let row = db
        .get_page(user_id, &id.to_string())?
        .ok_or(ApiError::NotFound("Landing page not found"))?;

    let mut pages = load_trees(db, vec![row])?;
    pages
        .pop()
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("page vanished during load")))
}

fn insert_and_reload(db: &Database, user_id: &str, page: NewPage) -> Result<PageResponse, ApiError> {
    let id: Uuid = page.id.parse().map_err(anyhow::Error::from)?;

    if let Err(e) = db.insert_page(&page) {
        // Read-then-write leaves a race window; the UNIQUE(user_id, url)
        // constraint closes it.
        if pagemaker_db::is_unique_violation(&e) {
            return Err(ApiError::Conflict(
                "A landing page with this URL already exists",
            ));
        }
        return Err(e.into());
    }

    load_owned_page(db, user_id, id)
}

/// Assemble nested responses from flat rows: one batch query per child
/// table, grouped in memory.
fn load_trees(db: &Database, rows: Vec<PageRow>) -> Result<Vec<PageResponse>, ApiError> {
    let page_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let section_rows = db.sections_for_pages(&page_ids)?;

    let section_ids: Vec<String> = section_rows.iter().map(|s| s.id.clone()).collect();
    let button_rows = db.buttons_for_sections(&section_ids)?;
    let image_rows = db.images_for_sections(&section_ids)?;

    let mut buttons_by_section: HashMap<String, Vec<ButtonResponse>> = HashMap::new();
    for b in button_rows {
        let link_type = match b.link_type.as_str() {
            "url" => LinkType::Url,
            "scroll" => LinkType::Scroll,
            other => {
                warn!("Corrupt link_type '{}' on button '{}'", other, b.id);
                LinkType::Url
            }
        };
        buttons_by_section
            .entry(b.section_id.clone())
            .or_default()
            .push(ButtonResponse {
                id: parse_uuid(&b.id, "button id"),
                label: b.label,
                link_type,
                value: b.value,
            });
    }

    let mut images_by_section: HashMap<String, Vec<ImageResponse>> = HashMap::new();
    for i in image_rows {
        images_by_section
            .entry(i.section_id.clone())
            .or_default()
            .push(ImageResponse {
                id: parse_uuid(&i.id, "image id"),
                url: i.url,
                alt: i.alt,
            });
    }

    // Section rows arrive ascending by ord, so per-page vectors stay in
    // display order.
    let mut sections_by_page: HashMap<String, Vec<SectionResponse>> = HashMap::new();
    for s in section_rows {
        let buttons = buttons_by_section.remove(&s.id).unwrap_or_default();
        let images = images_by_section.remove(&s.id).unwrap_or_default();
        sections_by_page
            .entry(s.landing_page_id.clone())
            .or_default()
            .push(SectionResponse {
                id: parse_uuid(&s.id, "section id"),
                name: s.name,
                intro: s.intro,
                title: s.title,
                subtitle: s.subtitle,
                description: s.description,
                order: s.ord,
                buttons,
                images,
            });
    }

    let pages = rows
        .into_iter()
        .map(|row| {
            let sections = sections_by_page.remove(&row.id).unwrap_or_default();
            PageResponse {
                id: parse_uuid(&row.id, "page id"),
                url: row.url,
                description: row.description,
                archived: row.archived,
                created_at: parse_timestamp(&row.created_at, &row.id),
                updated_at: parse_timestamp(&row.updated_at, &row.id),
                sections,
            }
        })
        .collect();

    Ok(pages)
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, page_id: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on page '{}': {}", raw, page_id, e);
            chrono::DateTime::default()
        })
}
