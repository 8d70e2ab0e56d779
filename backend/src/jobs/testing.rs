//! In-memory doubles for running job handlers without a database or gateway

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::store::JobStore;
use super::JobContext;
use crate::config::Config;
use crate::error::{AppError, AppResult, ExternalError};
use crate::external::whatsapp::GatewayResponse;
use crate::external::{MediaFile, Messenger, SendContext, WhatsAppEndpoint};
use crate::models::{
    Contenedor, Cotizacion, CotizacionProveedor, InspectionMedia, Payment, PedidoCurso,
    StatusSource, MEDIA_SENDED, ROTULADO_SENDED,
};
use crate::services::provider_status::TransitionOutcome;
use shared::ProviderStatus;

/// Config pointing documents at `dir`, with no Sheets key
pub fn test_config(dir: &Path) -> Arc<Config> {
    let dir = dir.to_string_lossy().to_string();
    let value = serde_json::json!({
        "environment": "test",
        "server": { "port": 0, "host": "127.0.0.1" },
        "database": { "url": "postgres://unused", "max_connections": 1, "min_connections": 0 },
        "jwt": { "secret": "test" },
        "whatsapp": {
            "base_url": "http://127.0.0.1:9",
            "from_number": null,
            "sleep": 0,
            "country_code": "51",
            "message_timeout_secs": 1,
            "media_timeout_secs": 1
        },
        "moodle": { "domain": "http://127.0.0.1:9", "token": "t", "student_role_id": 5 },
        "sheets": {
            "spreadsheet_id": "",
            "sheet_name": "Consolidado",
            "sheet_id": 0,
            "credentials_path": format!("{}/missing-key.json", dir)
        },
        "smtp": { "host": "localhost", "username": null, "password": null, "from": "ops@localhost" },
        "documents": {
            "templates_dir": format!("{}/no-templates", dir),
            "scratch_dir": dir.clone(),
            "media_root": dir
        },
        "queue": {
            "workers": 1,
            "poll_interval_ms": 10,
            "default_max_attempts": 3,
            "default_timeout_secs": 5
        },
        "logging": { "json": false }
    });
    Arc::new(serde_json::from_value(value).expect("test config"))
}

/// A message handed to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub endpoint: WhatsAppEndpoint,
    pub phone_number_id: String,
    pub file_name: Option<String>,
}

/// Records every send; rejects them all when `failing`
#[derive(Default)]
pub struct RecordingMessenger {
    pub failing: bool,
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        file_name: Option<&str>,
    ) -> Result<GatewayResponse, ExternalError> {
        if self.failing {
            return Err(ExternalError::invalid("whatsapp", 502, "gateway down"));
        }
        self.sent.lock().unwrap().push(Sent {
            endpoint,
            phone_number_id: ctx.phone_number_id.clone(),
            file_name: file_name.map(str::to_string),
        });
        Ok(GatewayResponse {
            status: Some(true),
            ..Default::default()
        })
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        _message: &str,
    ) -> Result<GatewayResponse, ExternalError> {
        self.record(endpoint, ctx, None)
    }

    async fn send_media(
        &self,
        endpoint: WhatsAppEndpoint,
        ctx: &SendContext,
        file: MediaFile<'_>,
        _caption: Option<&str>,
    ) -> Result<GatewayResponse, ExternalError> {
        self.record(endpoint, ctx, Some(file.file_name))
    }
}

/// A status write as the store received it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionCall {
    pub proveedor_id: i64,
    pub target: ProviderStatus,
    pub force: bool,
}

#[derive(Default)]
pub struct MemoryState {
    pub cotizaciones: HashMap<i64, Cotizacion>,
    pub proveedores: HashMap<i64, CotizacionProveedor>,
    pub payments: Vec<Payment>,
    pub media: Vec<InspectionMedia>,
    pub pedidos: HashMap<i64, PedidoCurso>,
    pub transitions: Vec<TransitionCall>,
}

/// [`super::store::JobStore`] over plain maps, with the same state machine
/// checks as the database-backed status writes
#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn with(
        cotizaciones: Vec<Cotizacion>,
        proveedores: Vec<CotizacionProveedor>,
        media: Vec<InspectionMedia>,
    ) -> Self {
        let state = MemoryState {
            cotizaciones: cotizaciones.into_iter().map(|c| (c.id, c)).collect(),
            proveedores: proveedores.into_iter().map(|p| (p.id, p)).collect(),
            media,
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn proveedor(&self, id: i64) -> CotizacionProveedor {
        self.state.lock().unwrap().proveedores[&id].clone()
    }

    pub fn transitions(&self) -> Vec<TransitionCall> {
        self.state.lock().unwrap().transitions.clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn get_cotizacion(&self, id: i64) -> AppResult<Cotizacion> {
        self.state
            .lock()
            .unwrap()
            .cotizaciones
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Cotizacion {}", id)))
    }

    async fn contenedor_for(&self, _cotizacion: &Cotizacion) -> AppResult<Option<Contenedor>> {
        Ok(None)
    }

    async fn get_contenedor(&self, id: i64) -> AppResult<Contenedor> {
        Err(AppError::NotFound(format!("Contenedor {}", id)))
    }

    async fn list_by_contenedor(&self, _contenedor_id: i64) -> AppResult<Vec<Cotizacion>> {
        Ok(Vec::new())
    }

    async fn get_proveedor(&self, id: i64) -> AppResult<CotizacionProveedor> {
        self.state
            .lock()
            .unwrap()
            .proveedores
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", id)))
    }

    async fn list_proveedores(&self, cotizacion_id: i64) -> AppResult<Vec<CotizacionProveedor>> {
        let mut list: Vec<CotizacionProveedor> = self
            .state
            .lock()
            .unwrap()
            .proveedores
            .values()
            .filter(|p| p.id_cotizacion == cotizacion_id)
            .cloned()
            .collect();
        list.sort_by_key(|p| p.id);
        Ok(list)
    }

    async fn select_proveedores(
        &self,
        cotizacion_id: i64,
        ids: &[i64],
    ) -> AppResult<Vec<CotizacionProveedor>> {
        let all = self.list_proveedores(cotizacion_id).await?;
        if ids.is_empty() {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|p| ids.contains(&p.id)).collect())
    }

    async fn list_payments(&self, cotizacion_id: i64) -> AppResult<Vec<Payment>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .payments
            .iter()
            .filter(|p| p.id_cotizacion == cotizacion_id)
            .cloned()
            .collect())
    }

    async fn list_pending_inspection_media(
        &self,
        proveedor_id: i64,
    ) -> AppResult<Vec<InspectionMedia>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .media
            .iter()
            .filter(|m| m.id_proveedor == proveedor_id && m.is_pending())
            .cloned()
            .collect())
    }

    async fn mark_inspection_media_sent(&self, media_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        for media in state.media.iter_mut().filter(|m| m.id == media_id) {
            media.send_status = Some(MEDIA_SENDED.to_string());
        }
        Ok(())
    }

    async fn mark_rotulado_sent(&self, proveedor_id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.proveedores.get_mut(&proveedor_id) {
            p.send_rotulado_status = Some(ROTULADO_SENDED.to_string());
        }
        Ok(())
    }

    async fn set_estados_proveedor(&self, proveedor_id: i64, value: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.proveedores.get_mut(&proveedor_id) {
            p.estados_proveedor = Some(value.to_string());
        }
        Ok(())
    }

    async fn transition_latest(
        &self,
        proveedor_id: i64,
        target: ProviderStatus,
        _source: StatusSource,
        force: bool,
    ) -> AppResult<TransitionOutcome> {
        let mut state = self.state.lock().unwrap();
        state.transitions.push(TransitionCall {
            proveedor_id,
            target,
            force,
        });

        let proveedor = state
            .proveedores
            .get_mut(&proveedor_id)
            .ok_or_else(|| AppError::NotFound(format!("Proveedor {}", proveedor_id)))?;
        let previous = proveedor.estados;

        if previous == Some(target) {
            return Ok(TransitionOutcome {
                proveedor_id,
                previous,
                current: target,
                version: proveedor.version,
                changed: false,
            });
        }
        if let Some(from) = previous {
            if !force && !from.can_transition_to(target) {
                return Err(AppError::InvalidStateTransition(format!(
                    "Proveedor {}: {} -> {}",
                    proveedor_id, from, target
                )));
            }
        }

        proveedor.estados = Some(target);
        proveedor.version += 1;
        Ok(TransitionOutcome {
            proveedor_id,
            previous,
            current: target,
            version: proveedor.version,
            changed: true,
        })
    }

    async fn get_pedido(&self, id: i64) -> AppResult<PedidoCurso> {
        self.state
            .lock()
            .unwrap()
            .pedidos
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Pedido curso {}", id)))
    }

    async fn save_moodle_credentials(
        &self,
        id: i64,
        moodle_user_id: i64,
        username: &str,
        password: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.pedidos.get_mut(&id) {
            p.moodle_user_id = Some(moodle_user_id);
            p.moodle_username = Some(username.to_string());
            p.moodle_password = Some(password.to_string());
        }
        Ok(())
    }

    async fn mark_enrolled(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.pedidos.get_mut(&id) {
            p.enrolled = true;
        }
        Ok(())
    }
}

/// Job context over the given doubles
pub fn context(
    dir: &Path,
    messenger: Arc<RecordingMessenger>,
    store: Arc<MemoryStore>,
) -> JobContext {
    JobContext::with_store(test_config(dir), messenger, store)
}
