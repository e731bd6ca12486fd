use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use std::sync::Arc;
use tera::Context;

use crate::state::AppState;

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut ctx = Context::new();
    ctx.insert("mail_enabled", &state.notifier.is_enabled());
    render_template("index.html", ctx)
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    reg: String,
}

/// `GET /api/verify?reg=<id>`. Demo page only: nothing is looked up.
pub async fn verify(Query(query): Query<VerifyQuery>) -> impl IntoResponse {
    let mut ctx = Context::new();
    ctx.insert("registration_id", &query.reg);
    render_template("verify.html", ctx)
}

fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera.render(name, &ctx).unwrap_or_else(|e| {
        tracing::error!("Template {} failed: {}", name, e);
        format!("Template error: {}", name)
    });
    Html(rendered)
}
