//! HTTP request handlers.

use axum::extract::State;
use axum::http::{header, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use super::AppState;
use crate::page::{api_response, status_html, Page};

const STATUS_TEMPLATE: &str = include_str!("templates/status.html");

/// Render the status page from the latest snapshot.
pub async fn handle_index(State(state): State<AppState>) -> Html<String> {
    let page = state.page.read().await;
    Html(render_status_page(&page))
}

/// Serve the latest snapshot as JSON. Only GET and HEAD are allowed.
pub async fn handle_api_status(method: Method, State(state): State<AppState>) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }

    let page = state.page.read().await;
    let response = api_response(&page);

    // Encode to a buffer first so an encoding failure yields a clean 500
    // instead of a truncated body.
    match serde_json::to_vec(&response) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

fn render_status_page(page: &Page) -> String {
    let maintenance_banner = if page.maintenance_message.is_empty() {
        String::new()
    } else {
        format!(
            r#"<div class="banner maintenance">{}</div>"#,
            escape_html(&page.maintenance_message)
        )
    };

    let up_items: String = page
        .sweep
        .up
        .iter()
        .map(|s| {
            format!(
                "<li class=\"service up\"><span>{}</span><span class=\"elapsed\">{} ms</span></li>\n",
                escape_html(&s.name),
                s.response_time.as_millis()
            )
        })
        .collect();

    let degraded_items: String = page
        .sweep
        .degraded
        .iter()
        .map(|(name, info)| {
            format!(
                "<li class=\"service degraded\"><span>{}</span><span class=\"outage\">{} min</span></li>\n",
                escape_html(name),
                info.minutes
            )
        })
        .collect();

    let down_items: String = page
        .sweep
        .down
        .iter()
        .map(|(name, info)| {
            format!(
                "<li class=\"service down\"><span>{}</span><span class=\"outage\">{} min</span></li>\n",
                escape_html(name),
                info.minutes
            )
        })
        .collect();

    let incident_items: String = page
        .past_incidents
        .iter()
        .map(|i| {
            let state = if i.is_ongoing { "ongoing" } else { "resolved" };
            format!(
                "<li class=\"incident {}\"><span>{}</span> <span>{}</span> <span>{}</span></li>\n",
                state,
                escape_html(&i.service_name),
                escape_html(&i.started_at),
                escape_html(i.message.as_deref().unwrap_or("")),
            )
        })
        .collect();

    STATUS_TEMPLATE
        .replace("{{title}}", &escape_html(&page.title))
        .replace("{{status}}", status_html(&page.status))
        .replace("{{maintenance_banner}}", &maintenance_banner)
        .replace("{{up_items}}", &up_items)
        .replace("{{degraded_items}}", &degraded_items)
        .replace("{{down_items}}", &down_items)
        .replace("{{incident_items}}", &incident_items)
        .replace("{{time}}", &escape_html(&page.time))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{ServiceInfo, SweepResult};
    use std::time::Duration;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b a="x">&'"#),
            "&lt;b a=&quot;x&quot;&gt;&amp;&#39;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_render_escapes_service_names() {
        let page = Page {
            title: "Status".to_string(),
            status: "success".to_string(),
            sweep: SweepResult {
                up: vec![ServiceInfo {
                    name: "<script>alert(1)</script>".to_string(),
                    response_time: Duration::from_millis(5),
                }],
                ..Default::default()
            },
            time: "2024-05-01 10:00:00".to_string(),
            maintenance_message: String::new(),
            past_incidents: Vec::new(),
        };

        let html = render_status_page(&page);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("class=\"page success\""));
    }

    #[test]
    fn test_render_unknown_status_falls_back_to_success() {
        let page = Page {
            status: "\"><script>".to_string(),
            ..Default::default()
        };
        let html = render_status_page(&page);
        assert!(html.contains("class=\"page success\""));
    }

    #[test]
    fn test_render_maintenance_banner() {
        let page = Page {
            status: "maintenance".to_string(),
            maintenance_message: "back at noon".to_string(),
            ..Default::default()
        };
        let html = render_status_page(&page);
        assert!(html.contains("back at noon"));
        assert!(html.contains("class=\"page maintenance\""));
    }
}
