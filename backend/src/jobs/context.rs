//! Dependencies handed to every job handler

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::documents::DocumentService;
use crate::error::{AppError, AppResult};
use crate::external::{Mailer, Messenger, MoodleClient, SendContext, SheetsClient};
use super::store::{JobStore, PgJobStore};

#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<Config>,
    pub messenger: Arc<dyn Messenger>,
    pub store: Arc<dyn JobStore>,
    pub documents: DocumentService,
    pub moodle: MoodleClient,
    pub mailer: Mailer,
    /// `None` when no service-account key is configured
    pub sheets: Option<SheetsClient>,
}

impl JobContext {
    pub fn new(db: PgPool, config: Arc<Config>, messenger: Arc<dyn Messenger>) -> Self {
        Self::with_store(config, messenger, Arc::new(PgJobStore::new(db)))
    }

    pub fn with_store(
        config: Arc<Config>,
        messenger: Arc<dyn Messenger>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let sheets = match SheetsClient::from_config(&config.sheets) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "Google Sheets disabled");
                None
            }
        };

        Self {
            messenger,
            store,
            documents: DocumentService::new(&config.documents),
            moodle: MoodleClient::new(&config.moodle),
            mailer: Mailer::new(&config.smtp),
            sheets,
            config,
        }
    }

    /// Recipient context for a raw phone number
    pub fn send_context(&self, phone: Option<&str>, owner: &str) -> AppResult<SendContext> {
        phone
            .and_then(|p| SendContext::for_phone(p, &self.config.whatsapp))
            .ok_or_else(|| AppError::Validation {
                field: "telefono".to_string(),
                message: format!("{} has no usable phone number", owner),
                message_es: format!("{} no tiene un teléfono válido", owner),
            })
    }

    pub fn sheets(&self) -> AppResult<&SheetsClient> {
        self.sheets
            .as_ref()
            .ok_or_else(|| AppError::Configuration("Google Sheets is not configured".to_string()))
    }
}
