//! Course orders and their Moodle accounts

use sqlx::PgPool;

use crate::config::Config;
use crate::documents::DocumentService;
use crate::error::{AppError, AppResult};
use crate::external::MoodleClient;
use crate::models::{PedidoCurso, PedidoCursoRow, PEDIDO_CURSO_COLUMNS};

#[derive(Clone)]
pub struct CursoService {
    db: PgPool,
}

impl CursoService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_pedido(&self, id: i64) -> AppResult<PedidoCurso> {
        let row = sqlx::query_as::<_, PedidoCursoRow>(&format!(
            "SELECT {} FROM pedido_curso WHERE id = $1",
            PEDIDO_CURSO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Pedido curso {}", id)))?;

        Ok(row.into())
    }

    /// Store the Moodle account once it exists, before anything is sent
    pub async fn save_moodle_credentials(
        &self,
        id: i64,
        moodle_user_id: i64,
        username: &str,
        password: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE pedido_curso \
             SET moodle_user_id = $2, moodle_username = $3, moodle_password = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(moodle_user_id)
        .bind(username)
        .bind(password)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Certificate PDF for a course order
    pub async fn render_constancia(&self, config: &Config, id: i64) -> AppResult<Vec<u8>> {
        let pedido = self.get_pedido(id).await?;
        constancia_pdf(
            pedido,
            &MoodleClient::new(&config.moodle),
            DocumentService::new(&config.documents),
        )
        .await
    }

    pub async fn mark_enrolled(&self, id: i64) -> AppResult<()> {
        sqlx::query("UPDATE pedido_curso SET enrolled = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/// Render the certificate with the course name Moodle reports
pub async fn constancia_pdf(
    pedido: PedidoCurso,
    moodle: &MoodleClient,
    documents: DocumentService,
) -> AppResult<Vec<u8>> {
    let curso = moodle.course_name(pedido.id_curso).await;
    tokio::task::spawn_blocking(move || documents.constancia_pdf(&pedido, &curso))
        .await
        .map_err(|e| AppError::Internal(format!("document task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentsConfig, MoodleConfig};
    use chrono::Utc;
    use wiremock::matchers::query_param;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pedido() -> PedidoCurso {
        PedidoCurso {
            id: 4,
            nombre: "Ana".to_string(),
            apellidos: Some("Quispe".to_string()),
            email: "ana@example.com".to_string(),
            telefono: Some("987654321".to_string()),
            documento: Some("45678912".to_string()),
            id_curso: 3,
            moodle_user_id: Some(42),
            moodle_username: Some("45678912".to_string()),
            moodle_password: None,
            enrolled: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_constancia_looks_up_course_and_renders() {
        let mock_server = MockServer::start().await;
        Mock::given(query_param("wsfunction", "core_course_get_courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 3, "fullname": "Importación desde China", "shortname": "IMP"}
            ])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let documents = DocumentService::new(&DocumentsConfig {
            templates_dir: dir.path().join("none").to_string_lossy().to_string(),
            scratch_dir: dir.path().to_string_lossy().to_string(),
            media_root: dir.path().to_string_lossy().to_string(),
        });
        let moodle = MoodleClient::new(&MoodleConfig {
            domain: mock_server.uri(),
            token: "tok".to_string(),
            student_role_id: 5,
        });

        let pdf = constancia_pdf(pedido(), &moodle, documents).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
