//! Client deduplication
//!
//! A cliente is identified by normalised phone, document or email. Unique
//! partial indexes on those columns make concurrent inserts converge: the
//! losing insert does nothing and re-reads the winner.

use std::collections::HashSet;

use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Cliente, ClienteCandidate, ClienteRow, NormalizedCliente, CLIENTE_COLUMNS};
use shared::batch::{BatchDecision, BatchReport};

#[derive(Clone)]
pub struct ClienteService {
    db: PgPool,
    country_code: String,
}

impl ClienteService {
    pub fn new(db: PgPool, country_code: impl Into<String>) -> Self {
        Self {
            db,
            country_code: country_code.into(),
        }
    }

    /// Look up by phone, then document, then email
    pub async fn find_existing(&self, contact: &NormalizedCliente) -> AppResult<Option<Cliente>> {
        let lookups: [(&str, Option<&String>); 3] = [
            ("telefono_normalizado = $1", contact.telefono_normalizado.as_ref()),
            ("documento = $1", contact.documento.as_ref()),
            ("LOWER(correo) = $1", contact.correo.as_ref()),
        ];

        for (condition, value) in lookups {
            let Some(value) = value else { continue };
            let row = sqlx::query_as::<_, ClienteRow>(&format!(
                "SELECT {} FROM clientes WHERE {} ORDER BY id LIMIT 1",
                CLIENTE_COLUMNS, condition
            ))
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

            if let Some(row) = row {
                return Ok(Some(row.into()));
            }
        }

        Ok(None)
    }

    /// Return the matching cliente, creating it when none matches.
    ///
    /// The boolean is true when a row was inserted.
    pub async fn find_or_create_cliente(
        &self,
        candidate: &ClienteCandidate,
    ) -> AppResult<(Cliente, bool)> {
        candidate
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let contact = candidate.normalized(&self.country_code);
        if !contact.has_keys() {
            return Err(AppError::Validation {
                field: "cliente".to_string(),
                message: "Contact has no phone, document or email".to_string(),
                message_es: "El contacto no tiene teléfono, documento ni correo".to_string(),
            });
        }

        if let Some(existing) = self.find_existing(&contact).await? {
            return Ok((existing, false));
        }

        let inserted = sqlx::query_as::<_, ClienteRow>(&format!(
            "INSERT INTO clientes (nombre, documento, correo, telefono, telefono_normalizado, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT DO NOTHING \
             RETURNING {}",
            CLIENTE_COLUMNS
        ))
        .bind(&contact.nombre)
        .bind(&contact.documento)
        .bind(&contact.correo)
        .bind(&contact.telefono)
        .bind(&contact.telefono_normalizado)
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = inserted {
            let cliente: Cliente = row.into();
            tracing::info!(cliente_id = cliente.id, "Cliente created");
            return Ok((cliente, true));
        }

        // Lost an insert race; the winner is visible now
        self.find_existing(&contact)
            .await?
            .map(|c| (c, false))
            .ok_or_else(|| AppError::Conflict {
                resource: "cliente".to_string(),
                message: "Cliente insert conflicted but no match was found".to_string(),
                message_es: "Conflicto al crear el cliente sin coincidencia".to_string(),
            })
    }

    async fn candidates(&self) -> AppResult<Vec<(String, i64, ClienteCandidate)>> {
        let cotizaciones: Vec<(i64, String, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT id, nombre, documento, correo, telefono \
                 FROM contenedor_consolidado_cotizacion WHERE deleted_at IS NULL ORDER BY id",
            )
            .fetch_all(&self.db)
            .await?;

        let pedidos: Vec<(i64, String, Option<String>, Option<String>, String, Option<String>)> =
            sqlx::query_as(
                "SELECT id, nombre, apellidos, documento, email, telefono FROM pedido_curso ORDER BY id",
            )
            .fetch_all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(cotizaciones.len() + pedidos.len());
        for (id, nombre, documento, correo, telefono) in cotizaciones {
            out.push((
                "cotizacion".to_string(),
                id,
                ClienteCandidate {
                    nombre,
                    documento,
                    correo,
                    telefono,
                },
            ));
        }
        for (id, nombre, apellidos, documento, email, telefono) in pedidos {
            let nombre = match apellidos {
                Some(a) if !a.trim().is_empty() => format!("{} {}", nombre.trim(), a.trim()),
                _ => nombre,
            };
            out.push((
                "pedido_curso".to_string(),
                id,
                ClienteCandidate {
                    nombre,
                    documento,
                    correo: Some(email),
                    telefono,
                },
            ));
        }
        Ok(out)
    }

    /// Create clientes for every quotation and course order contact
    pub async fn sync_clientes_from_cotizaciones(&self, dry_run: bool) -> AppResult<BatchReport> {
        let mut report = BatchReport::new(dry_run);
        // Keys a dry-run has already counted as new
        let mut planned: HashSet<String> = HashSet::new();

        for (origin, id, candidate) in self.candidates().await? {
            report.scanned += 1;
            let contact = candidate.normalized(&self.country_code);
            if !contact.has_keys() || contact.nombre.is_empty() {
                tracing::warn!(origin = %origin, id, "Contact without usable keys skipped");
                report.skipped += 1;
                continue;
            }

            if dry_run {
                let keys: Vec<String> = [
                    contact.telefono_normalizado.as_ref().map(|v| format!("tel:{}", v)),
                    contact.documento.as_ref().map(|v| format!("doc:{}", v)),
                    contact.correo.as_ref().map(|v| format!("mail:{}", v)),
                ]
                .into_iter()
                .flatten()
                .collect();

                let seen = keys.iter().any(|k| planned.contains(k));
                let existing = match self.find_existing(&contact).await {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(origin = %origin, id, error = %e, "Lookup failed");
                        report.failed += 1;
                        continue;
                    }
                };

                if existing.is_some() || seen {
                    report.skipped += 1;
                } else {
                    planned.extend(keys);
                    report.changed += 1;
                    report.decisions.push(BatchDecision {
                        entity_id: id,
                        from: None,
                        to: contact.nombre.clone(),
                        reason: format!("new cliente from {}", origin),
                    });
                }
                continue;
            }

            match self.find_or_create_cliente(&candidate).await {
                Ok((cliente, true)) => {
                    report.changed += 1;
                    report.decisions.push(BatchDecision {
                        entity_id: id,
                        from: None,
                        to: cliente.nombre,
                        reason: format!("new cliente from {}", origin),
                    });
                }
                Ok((_, false)) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(origin = %origin, id, error = %e, "Cliente sync failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            created = report.changed,
            failed = report.failed,
            dry_run,
            "sync-clientes finished"
        );
        Ok(report)
    }
}
