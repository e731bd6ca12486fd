mod batch;
mod config;
mod error;
mod mail;
mod pdf;
mod roster;
mod routes;
mod state;
mod storage;
mod templates;

use std::sync::Arc;

use crate::mail::{MailTransport, Notifier, SmtpMailer};
use crate::pdf::{CertificateRenderer, FontAsset};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certforge=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    let font = FontAsset::discover(config.font_path.as_deref())?;
    tracing::info!("Using font {}", font.path.display());
    let default_template = pdf::default_template(config.template_path.as_deref())?;

    let transport: Option<Arc<dyn MailTransport>> = match &config.smtp {
        Some(smtp) => {
            tracing::info!("Mail notifications via {}:{}", smtp.host, smtp.port);
            Some(Arc::new(SmtpMailer::from_config(smtp)?))
        }
        None => {
            tracing::info!("SMTP_HOST not set, mail notifications disabled");
            None
        }
    };

    let state = Arc::new(state::AppState {
        config: config.clone(),
        renderer: Arc::new(CertificateRenderer::new(
            Arc::new(font),
            config.verify_base_url.clone(),
        )),
        notifier: Arc::new(Notifier::new(
            transport,
            config.mail_subject.clone(),
            config.mail_body.clone(),
        )),
        default_template: Arc::new(default_template),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Certforge listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
