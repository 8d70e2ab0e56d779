//! Job handlers
//!
//! Each handler re-fetches the rows it needs, sends through the gateway and
//! only then records the outcome (status, sent flags). A failed send leaves
//! the stored state untouched, so a retry starts from the same place.

use std::path::Path;

use uuid::Uuid;

use super::context::JobContext;
use crate::documents::sanitize_file_name;
use crate::error::{AppError, AppResult};
use crate::external::moodle::NewMoodleUser;
use crate::external::sheets::{a1_range, GridRange};
use crate::external::{MailAttachment, MediaFile, WhatsAppEndpoint};
use crate::models::{Cotizacion, CotizacionProveedor, StatusSource};
use shared::jobs::Job;
use shared::templates;
use shared::ProviderStatus;

/// Coordination label written once inspection media went out
const ESTADOS_PROVEEDOR_INSPECTION: &str = "INSPECTION";

pub async fn handle(ctx: &JobContext, job: &Job) -> AppResult<()> {
    match job {
        Job::SendWelcome { cotizacion_id } => send_welcome(ctx, *cotizacion_id).await,
        Job::SendDataItem { proveedor_id } => send_data_item(ctx, *proveedor_id).await,
        Job::SendRotulado {
            cotizacion_id,
            proveedor_id,
        } => send_rotulado(ctx, *cotizacion_id, *proveedor_id).await,
        Job::ForceSendRotulado {
            cotizacion_id,
            proveedor_ids,
        } => force_send_rotulado(ctx, *cotizacion_id, proveedor_ids).await,
        Job::SendInspectionMedia { proveedor_id } => send_inspection_media(ctx, *proveedor_id).await,
        Job::SendContract { cotizacion_id } => send_contract(ctx, *cotizacion_id).await,
        Job::SendPaymentReminder { cotizacion_id } => {
            send_payment_reminder(ctx, *cotizacion_id).await
        }
        Job::EnrollCourseStudent { pedido_curso_id } => {
            enroll_course_student(ctx, *pedido_curso_id).await
        }
        Job::SyncContenedorSheet { contenedor_id } => {
            sync_contenedor_sheet(ctx, *contenedor_id).await
        }
    }
}

/// Terminal failure: logged for manual follow-up, nothing is rolled back
pub fn on_failed(job: &Job, job_id: Uuid, attempts: i32, error: &AppError) {
    tracing::error!(
        job_id = %job_id,
        kind = job.kind(),
        subject = %job.subject(),
        attempts,
        error = %error,
        "Job failed permanently"
    );
}

async fn send_welcome(ctx: &JobContext, cotizacion_id: i64) -> AppResult<()> {
    let cotizacion = ctx.store.get_cotizacion(cotizacion_id).await?;
    let contenedor = ctx.store.contenedor_for(&cotizacion).await?;
    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion_id),
    )?;

    let message = templates::welcome_message(&cotizacion, contenedor.as_ref());
    ctx.messenger
        .send_text(WhatsAppEndpoint::WelcomeV2, &send, &message)
        .await?;

    tracing::info!(cotizacion_id, "Welcome message sent");
    Ok(())
}

async fn send_data_item(ctx: &JobContext, proveedor_id: i64) -> AppResult<()> {
    let proveedor = ctx.store.get_proveedor(proveedor_id).await?;
    let cotizacion = ctx.store.get_cotizacion(proveedor.id_cotizacion).await?;
    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion.id),
    )?;

    let message = templates::data_item_message(&cotizacion, &proveedor);
    ctx.messenger
        .send_text(WhatsAppEndpoint::DataItem, &send, &message)
        .await?;

    tracing::info!(proveedor_id, "Supplier data request sent");
    Ok(())
}

/// Record that a supplier's labelling sheet went out.
///
/// The status move goes through the state machine even on a forced resend:
/// a supplier already loaded, or not yet at `R`, keeps its status.
async fn record_rotulado(ctx: &JobContext, proveedor: &CotizacionProveedor) -> AppResult<()> {
    ctx.store.mark_rotulado_sent(proveedor.id).await?;

    match ctx
        .store
        .transition_latest(
            proveedor.id,
            ProviderStatus::Rotulado,
            StatusSource::RotuladoJob,
            false,
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(AppError::InvalidStateTransition(msg)) => {
            tracing::info!(proveedor_id = proveedor.id, %msg, "Rotulado sent, status kept");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn send_rotulado(ctx: &JobContext, cotizacion_id: i64, proveedor_id: i64) -> AppResult<()> {
    let cotizacion = ctx.store.get_cotizacion(cotizacion_id).await?;
    let proveedor = ctx.store.get_proveedor(proveedor_id).await?;
    if proveedor.id_cotizacion != cotizacion_id {
        return Err(AppError::NotFound(format!(
            "Proveedor {} in cotizacion {}",
            proveedor_id, cotizacion_id
        )));
    }
    if proveedor.rotulado_sent() {
        tracing::info!(proveedor_id, "Rotulado already sent, skipping");
        return Ok(());
    }

    let contenedor = ctx.store.contenedor_for(&cotizacion).await?;
    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion_id),
    )?;

    let pdf = ctx
        .documents
        .rotulado_pdf(&cotizacion, &proveedor, contenedor.as_ref())?;
    let file_name = sanitize_file_name(&format!("rotulado-{}.pdf", proveedor.display_code()));
    let caption = templates::rotulado_caption(&cotizacion, &[proveedor.display_code()]);

    ctx.messenger
        .send_media(
            WhatsAppEndpoint::MediaV2,
            &send,
            MediaFile {
                file_name: &file_name,
                content: &pdf,
            },
            Some(&caption),
        )
        .await?;

    record_rotulado(ctx, &proveedor).await?;
    tracing::info!(cotizacion_id, proveedor_id, "Rotulado sent");
    Ok(())
}

/// Resend labelling sheets regardless of what was sent before
async fn force_send_rotulado(
    ctx: &JobContext,
    cotizacion_id: i64,
    proveedor_ids: &[i64],
) -> AppResult<()> {
    let cotizacion = ctx.store.get_cotizacion(cotizacion_id).await?;
    let proveedores = ctx
        .store
        .select_proveedores(cotizacion_id, proveedor_ids)
        .await?;
    let contenedor = ctx.store.contenedor_for(&cotizacion).await?;
    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion_id),
    )?;

    let documents = ctx.documents.clone();
    let (archive_name, zip) = {
        let cotizacion = cotizacion.clone();
        let proveedores = proveedores.clone();
        tokio::task::spawn_blocking(move || {
            documents.rotulado_zip(&cotizacion, &proveedores, contenedor.as_ref())
        })
        .await
        .map_err(|e| AppError::Internal(format!("document task panicked: {}", e)))??
    };

    let codes: Vec<String> = proveedores.iter().map(|p| p.display_code()).collect();
    let caption = templates::rotulado_caption(&cotizacion, &codes);

    ctx.messenger
        .send_media(
            WhatsAppEndpoint::MediaV2,
            &send,
            MediaFile {
                file_name: &archive_name,
                content: &zip,
            },
            Some(&caption),
        )
        .await?;

    for proveedor in &proveedores {
        record_rotulado(ctx, proveedor).await?;
    }

    tracing::info!(
        cotizacion_id,
        proveedores = proveedores.len(),
        "Rotulado bundle sent"
    );
    Ok(())
}

async fn send_inspection_media(ctx: &JobContext, proveedor_id: i64) -> AppResult<()> {
    let proveedor = ctx.store.get_proveedor(proveedor_id).await?;
    let cotizacion = ctx.store.get_cotizacion(proveedor.id_cotizacion).await?;
    let media = ctx
        .store
        .list_pending_inspection_media(proveedor_id)
        .await?;

    if media.is_empty() {
        tracing::info!(proveedor_id, "No pending inspection media");
        return Ok(());
    }

    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion.id),
    )?;
    let root = Path::new(&ctx.config.documents.media_root);
    let total = media.len();
    let mut sent = 0usize;

    for (index, item) in media.iter().enumerate() {
        let path = root.join(item.file_path.trim_start_matches('/'));
        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(media_id = item.id, path = %path.display(), "Inspection file not found, skipped");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let file_name = item.file_name();
        let caption = templates::inspection_caption(&proveedor, index + 1, total);
        ctx.messenger
            .send_media(
                WhatsAppEndpoint::MediaInspectionV2,
                &send,
                MediaFile {
                    file_name: &file_name,
                    content: &content,
                },
                Some(&caption),
            )
            .await?;

        ctx.store.mark_inspection_media_sent(item.id).await?;
        sent += 1;
    }

    if sent == 0 {
        return Err(AppError::NotFound(format!(
            "inspection files for proveedor {}",
            proveedor_id
        )));
    }

    ctx.store
        .set_estados_proveedor(proveedor_id, ESTADOS_PROVEEDOR_INSPECTION)
        .await?;
    match ctx
        .store
        .transition_latest(
            proveedor_id,
            ProviderStatus::Inspection,
            StatusSource::InspectionJob,
            false,
        )
        .await
    {
        Ok(_) => {}
        Err(AppError::InvalidStateTransition(msg)) => {
            tracing::info!(proveedor_id, %msg, "Inspection media sent, status kept");
        }
        Err(e) => return Err(e),
    }

    tracing::info!(proveedor_id, sent, total, "Inspection media sent");
    Ok(())
}

async fn send_contract(ctx: &JobContext, cotizacion_id: i64) -> AppResult<()> {
    let cotizacion = ctx.store.get_cotizacion(cotizacion_id).await?;
    let contenedor = ctx.store.contenedor_for(&cotizacion).await?;
    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion_id),
    )?;

    let pdf = ctx.documents.contrato_pdf(&cotizacion, contenedor.as_ref())?;
    let file_name = sanitize_file_name(&format!("contrato-{}.pdf", cotizacion_id));
    let caption = format!(
        "Hola {}, te enviamos tu contrato de servicio.",
        cotizacion.first_name()
    );

    ctx.messenger
        .send_media(
            WhatsAppEndpoint::MediaV2,
            &send,
            MediaFile {
                file_name: &file_name,
                content: &pdf,
            },
            Some(&caption),
        )
        .await?;

    // The WhatsApp copy is the one that counts; email is a courtesy
    if let Some(correo) = cotizacion.correo.as_deref().filter(|c| !c.trim().is_empty()) {
        if let Err(e) = ctx
            .mailer
            .send(
                correo,
                "Contrato de servicio",
                &caption,
                Some(MailAttachment::pdf(file_name.clone(), pdf)),
            )
            .await
        {
            tracing::warn!(cotizacion_id, error = %e, "Contract email not sent");
        }
    }

    tracing::info!(cotizacion_id, "Contract sent");
    Ok(())
}

async fn send_payment_reminder(ctx: &JobContext, cotizacion_id: i64) -> AppResult<()> {
    let cotizacion = ctx.store.get_cotizacion(cotizacion_id).await?;
    let payments = ctx.store.list_payments(cotizacion_id).await?;
    if !payments.iter().any(|p| p.is_pending()) {
        tracing::info!(cotizacion_id, "No pending payments, reminder skipped");
        return Ok(());
    }

    let send = ctx.send_context(
        cotizacion.telefono.as_deref(),
        &format!("Cotizacion {}", cotizacion_id),
    )?;
    let message = templates::payment_reminder_message(&cotizacion, &payments);
    ctx.messenger
        .send_text(WhatsAppEndpoint::MessageVentas, &send, &message)
        .await?;

    tracing::info!(cotizacion_id, "Payment reminder sent");
    Ok(())
}

fn generate_password() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    // Moodle's default policy wants upper, lower, digit and symbol
    let digit = raw.as_bytes()[12] % 10;
    format!("Fo#{}{}{}", &raw[..4].to_uppercase(), &raw[4..11], digit)
}

async fn enroll_course_student(ctx: &JobContext, pedido_curso_id: i64) -> AppResult<()> {
    let pedido = ctx.store.get_pedido(pedido_curso_id).await?;
    if pedido.enrolled {
        tracing::info!(pedido_curso_id, "Already enrolled, skipping");
        return Ok(());
    }

    let username = pedido
        .moodle_username
        .clone()
        .unwrap_or_else(|| pedido.derived_username());
    let (password, fresh_password) = match pedido.moodle_password.clone() {
        Some(p) if !p.is_empty() => (p, false),
        _ => (generate_password(), true),
    };

    let new_user = NewMoodleUser {
        username: username.clone(),
        password: password.clone(),
        firstname: pedido.nombre.trim().to_string(),
        lastname: pedido
            .apellidos
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| "-".to_string()),
        email: pedido.email.trim().to_lowercase(),
        phone1: pedido.telefono.clone(),
    };

    let (user, created) = ctx.moodle.ensure_user(&new_user).await?;
    if !created && fresh_password {
        ctx.moodle
            .update_user(user.id, &[("password", password.clone())])
            .await?;
    }

    let role_id = ctx.config.moodle.student_role_id;
    ctx.moodle.enrol_user(role_id, user.id, pedido.id_curso).await?;
    // Manual enrolment of an existing participant keeps its old role
    ctx.moodle
        .assign_course_role(role_id, user.id, pedido.id_curso)
        .await?;
    ctx.store
        .save_moodle_credentials(pedido_curso_id, user.id, &user.username, &password)
        .await?;

    let mut pedido = pedido;
    pedido.moodle_username = Some(user.username.clone());
    pedido.moodle_password = Some(password);

    let send = ctx.send_context(
        pedido.telefono.as_deref(),
        &format!("Pedido curso {}", pedido_curso_id),
    )?;
    let message = templates::course_credentials_message(&pedido, &ctx.config.moodle.domain);
    ctx.messenger
        .send_text(WhatsAppEndpoint::MessageCurso, &send, &message)
        .await?;

    ctx.store.mark_enrolled(pedido_curso_id).await?;
    tracing::info!(pedido_curso_id, moodle_user_id = user.id, created, "Student enrolled");
    Ok(())
}

/// Column headers of the container sheet
pub const SHEET_HEADER: [&str; 8] = [
    "Cliente",
    "Teléfono",
    "CBM cotizado",
    "Código",
    "Proveedor",
    "Cajas",
    "CBM China",
    "Estado",
];

/// Columns merged across a client's block of rows
const CLIENT_COLUMNS: i64 = 3;

/// Rows for the container sheet and the client blocks to merge.
///
/// Each quotation takes one row per supplier (at least one). Client
/// columns are filled on the first row of the block only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub rows: Vec<Vec<String>>,
    /// `(first row offset, row count)` per quotation
    pub blocks: Vec<(usize, usize)>,
}

pub fn sheet_layout(groups: &[(Cotizacion, Vec<CotizacionProveedor>)]) -> SheetLayout {
    let mut rows = Vec::new();
    let mut blocks = Vec::with_capacity(groups.len());

    for (cotizacion, proveedores) in groups {
        let start = rows.len();
        let client = vec![
            cotizacion.nombre.trim().to_string(),
            cotizacion.telefono.clone().unwrap_or_default(),
            cotizacion
                .volumen
                .map(|v| v.round_dp(2).to_string())
                .unwrap_or_default(),
        ];
        let blank = vec![String::new(); client.len()];

        if proveedores.is_empty() {
            let mut row = client.clone();
            row.extend(std::iter::repeat(String::new()).take(SHEET_HEADER.len() - 3));
            rows.push(row);
        }

        for (i, proveedor) in proveedores.iter().enumerate() {
            let mut row = if i == 0 { client.clone() } else { blank.clone() };
            row.push(proveedor.display_code());
            row.push(proveedor.supplier.clone().unwrap_or_default());
            row.push(
                proveedor
                    .qty_box_china
                    .map(|q| q.to_string())
                    .unwrap_or_default(),
            );
            row.push(
                proveedor
                    .cbm_total_china
                    .map(|c| c.round_dp(2).to_string())
                    .unwrap_or_default(),
            );
            row.push(
                proveedor
                    .estados
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            );
            rows.push(row);
        }

        blocks.push((start, rows.len() - start));
    }

    SheetLayout { rows, blocks }
}

async fn sync_contenedor_sheet(ctx: &JobContext, contenedor_id: i64) -> AppResult<()> {
    let sheets = ctx.sheets()?;
    ctx.store.get_contenedor(contenedor_id).await?;

    let mut groups = Vec::new();
    for cotizacion in ctx.store.list_by_contenedor(contenedor_id).await? {
        let proveedores = ctx.store.list_proveedores(cotizacion.id).await?;
        groups.push((cotizacion, proveedores));
    }
    let layout = sheet_layout(&groups);

    // Data starts on row 2, under the header
    let previous_rows = sheets
        .get_values(&format!("'{}'!A2:A", sheets.sheet_name().replace('\'', "''")))
        .await?
        .len();
    let data_rows = layout.rows.len().max(previous_rows);

    let existing = sheets.find_merged_ranges().await?;
    let stale: Vec<GridRange> = existing
        .into_iter()
        .filter(|r| r.overlaps_rows(1, 1 + data_rows as i64))
        .collect();
    sheets.unmerge_cells(&stale).await?;

    let header: Vec<String> = SHEET_HEADER.iter().map(|h| h.to_string()).collect();
    sheets
        .update_values(
            &a1_range(sheets.sheet_name(), 0, 1, SHEET_HEADER.len(), 1),
            &[header],
        )
        .await?;

    if data_rows > 0 {
        let mut rows = layout.rows.clone();
        rows.resize(data_rows, vec![String::new(); SHEET_HEADER.len()]);
        sheets
            .update_values(
                &a1_range(sheets.sheet_name(), 0, 2, SHEET_HEADER.len(), data_rows),
                &rows,
            )
            .await?;
    }

    let merges: Vec<GridRange> = layout
        .blocks
        .iter()
        .filter(|(_, count)| *count > 1)
        .map(|(start, count)| GridRange {
            sheet_id: sheets.sheet_id(),
            start_row_index: 1 + *start as i64,
            end_row_index: 1 + (*start + *count) as i64,
            start_column_index: 0,
            end_column_index: CLIENT_COLUMNS,
        })
        .collect();
    sheets.merge_cells(&merges).await?;

    tracing::info!(
        contenedor_id,
        rows = layout.rows.len(),
        merged = merges.len(),
        "Container sheet synchronised"
    );
    Ok(())
}
