//! Minimal HTML for the dashboard pages.

use crate::types::{PlayedItem, Track, UserIdentity};

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title} - spotdash</title></head>\
         <body><h2>{title}</h2>{body}</body></html>",
        title = escape(title),
    )
}

pub fn message(title: &str, text: &str) -> String {
    page(title, &format!("<p>{}</p>", escape(text)))
}

pub fn reauthorize(reason: &str) -> String {
    page(
        "Authorization required",
        &format!(
            "<p>{}</p><p><a href=\"/login\">Log in with Spotify</a></p>",
            escape(reason)
        ),
    )
}

pub fn user(user: &UserIdentity) -> String {
    let name = user.display_name.as_deref().unwrap_or(&user.id);
    let country = user.country.as_deref().unwrap_or("unknown");
    page(
        "Logged in",
        &format!(
            "<p>Logged in as <b>{}</b> ({})</p><p>Country: {}</p>",
            escape(name),
            escape(&user.id),
            escape(country)
        ),
    )
}

fn track_list(tracks: &[Track]) -> String {
    let items: String = tracks
        .iter()
        .map(|t| {
            format!(
                "<li>{} - {}</li>",
                escape(&t.name),
                escape(&t.artist_names(", "))
            )
        })
        .collect();
    format!("<ol>{items}</ol>")
}

pub fn recommendations(title: &str, seeds: &[Track], tracks: &[Track]) -> String {
    let mut body = String::new();
    if !seeds.is_empty() {
        body.push_str("<h3>Based on</h3>");
        body.push_str(&track_list(seeds));
    }
    if tracks.is_empty() {
        body.push_str("<p>No recommendations found.</p>");
    } else {
        body.push_str("<h3>Recommended</h3>");
        body.push_str(&track_list(tracks));
    }
    page(title, &body)
}

pub fn history(items: &[PlayedItem], next_cursor: Option<&str>) -> String {
    let rows: String = items
        .iter()
        .map(|item| {
            format!(
                "<li>{} {} - {}</li>",
                item.played_at.format("%Y-%m-%d %H:%M"),
                escape(&item.track.name),
                escape(&item.track.artist_names(", "))
            )
        })
        .collect();

    let mut body = format!("<ul>{rows}</ul>");
    if let Some(cursor) = next_cursor {
        body.push_str(&format!(
            "<p><a href=\"/history?cursor={}\">Older</a></p>",
            urlencoding::encode(cursor)
        ));
    }
    page("Recently played", &body)
}
