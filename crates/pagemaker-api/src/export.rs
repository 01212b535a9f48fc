use axum::{Extension, Json, extract::{Path, State}, response::IntoResponse};
use chrono::{DateTime, Local};
use uuid::Uuid;

use pagemaker_types::api::{Claims, ExportResponse, PageResponse};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::pages::{join_err, load_owned_page};

pub async fn export_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user_id = claims.sub.to_string();

    let page = tokio::task::spawn_blocking(move || load_owned_page(&db.db, &user_id, id))
        .await
        .map_err(join_err)??;

    Ok(Json(ExportResponse {
        filename: format!("landing-page-{}.txt", page.id),
        content: render_export(&page, Local::now()),
    }))
}

/// Render the plain-text export document. Pure function of the page and
/// the generation timestamp, so identical inputs reproduce the document
/// byte for byte.
pub fn render_export(page: &PageResponse, generated_at: DateTime<Local>) -> String {
    let mut out = format!(
        "LANDING PAGE: {}\nDESCRIPTION: {}\n\n",
        page.url, page.description
    );

    for (index, section) in page.sections.iter().enumerate() {
        out.push_str(&format!("=== SECTION {}: {} ===\n", index + 1, section.name));

        if let Some(intro) = &section.intro {
            out.push_str(&format!("Intro: {}\n", intro));
        }
        if let Some(title) = &section.title {
            out.push_str(&format!("Title: {}\n", title));
        }
        if let Some(subtitle) = &section.subtitle {
            out.push_str(&format!("Subtitle: {}\n", subtitle));
        }
        if let Some(description) = &section.description {
            out.push_str(&format!("Description: {}\n", description));
        }

        if !section.buttons.is_empty() {
            let buttons: Vec<String> = section
                .buttons
                .iter()
                .map(|b| format!("{} -> {} ({})", b.label, b.value, b.link_type.as_str()))
                .collect();
            out.push_str(&format!("Buttons: {}\n", buttons.join(", ")));
        }

        if !section.images.is_empty() {
            let urls: Vec<&str> = section.images.iter().map(|i| i.url.as_str()).collect();
            out.push_str(&format!("Images: {}\n", urls.join(", ")));
        }

        out.push('\n');
    }

    out.push_str(&format!(
        "---\nTotal Sections: {}\nGenerated: {}\n",
        page.sections.len(),
        generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p"),
    ));

    out
}
