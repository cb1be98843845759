//! HTML rendering for every page.

pub mod drift;
pub mod results;
pub mod upload;
pub mod wizard;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use dynamik_common::Window;
use dynamik_experiments::Toast;

pub const NAV_HTML: &str = include_str!("../../templates/nav.html");

/// Wrap `body` in the shared layout.
pub fn page(title: &str, body: &str, scripts: &str) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>dynamik · {}</title>
    <link rel="stylesheet" href="/static/css/main.css">
</head>
<body>
{}
<main class="main-content">
{}
</main>
{}
</body>
</html>"#,
        escape(title),
        NAV_HTML,
        body,
        scripts)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(r#"
    <div class="error-card">
        <h1 class="page-title">{} {}</h1>
        <p class="text-muted">{}</p>
        <a href="/" class="btn">Back to upload</a>
    </div>"#,
        status.as_u16(),
        escape(status.canonical_reason().unwrap_or("Error")),
        escape(message));
    page("Error", &body, "")
}

pub fn toast(toast: &Toast) -> String {
    format!(r#"
    <div class="toast toast-error" role="alert">
        <strong>{}</strong>
        <p>{}</p>
    </div>"#,
        escape(&toast.title),
        escape(&toast.description))
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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

// ── Dates ─────────────────────────────────────────────────────────────────────

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `dd/mm/yyyy`; unparseable values are shown as-is.
pub fn format_date(value: &str) -> String {
    if value.is_empty() {
        return "-".to_string();
    }
    match parse_timestamp(value) {
        Some(dt) => dt.format("%d/%m/%Y").to_string(),
        None => value.to_string(),
    }
}

pub fn format_window(window: &Window) -> String {
    format!("{} - {}", format_date(&window[0]), format_date(&window[1]))
}

/// Rough distance from `value` to now: "5 minutes", "2 days".
pub fn time_ago(value: &str) -> String {
    let Some(then) = parse_timestamp(value) else {
        return "some time".to_string();
    };
    let seconds = (Utc::now().naive_utc() - then).num_seconds().max(0);
    let (amount, unit) = match seconds {
        s if s < 60 => return "less than a minute".to_string(),
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 2_592_000 => (s / 86_400, "day"),
        s => (s / 2_592_000, "month"),
    };
    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}
