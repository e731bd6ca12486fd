use crate::config::Config;
use crate::mail::Notifier;
use crate::pdf::RenderCertificate;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub renderer: Arc<dyn RenderCertificate>,
    pub notifier: Arc<Notifier>,
    /// Background used when an upload carries no template.
    pub default_template: Arc<Vec<u8>>,
}
