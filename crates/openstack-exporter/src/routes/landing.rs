//! Landing page.

use axum::{extract::State, response::Html, routing::get, Router};

use crate::AppState;

/// Landing page routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(landing))
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>
<head><title>Openstack Exporter</title></head>
<body>
<h1>Openstack Exporter</h1>
<p><a href='{path}'>Metrics</a></p>
</body>
</html>
",
        path = state.config.telemetry_path
    ))
}
