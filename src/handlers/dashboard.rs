use axum::response::Html;

static DASHBOARD_HTML: &str = include_str!("../web/dashboard.html");
static INBOUND_CALLS_HTML: &str = include_str!("../web/inbound_calls.html");

pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

pub async fn inbound_calls_page() -> Html<&'static str> {
    Html(INBOUND_CALLS_HTML)
}
