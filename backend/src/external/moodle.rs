//! Moodle REST client
//!
//! Moodle web services take form-encoded parameters with PHP-style nested
//! array keys (`users[0][username]=...`) and answer JSON. Errors come back
//! as HTTP 200 with an `exception` object, so every body is inspected.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::MoodleConfig;
use crate::error::ExternalError;

const SERVICE: &str = "moodle";

/// Form parameters in Moodle's nested array notation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoodleParams(Vec<(String, String)>);

impl MoodleParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain `key=value`
    pub fn push(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// `group[index][field]=value`
    pub fn push_indexed(
        &mut self,
        group: &str,
        index: usize,
        field: &str,
        value: impl ToString,
    ) -> &mut Self {
        self.0
            .push((format!("{}[{}][{}]", group, index, field), value.to_string()));
        self
    }

    /// `group[index]=value`
    pub fn push_list(&mut self, group: &str, index: usize, value: impl ToString) -> &mut Self {
        self.0.push((format!("{}[{}]", group, index), value.to_string()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// User to create in Moodle
#[derive(Debug, Clone, Serialize)]
pub struct NewMoodleUser {
    pub username: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub phone1: Option<String>,
}

/// User as returned by Moodle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoodleUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedUser {
    id: i64,
    username: String,
}

/// Course as returned by Moodle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoodleCourse {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    #[serde(default)]
    pub categoryid: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatedCourse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct MoodleException {
    exception: String,
    #[serde(default)]
    errorcode: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Moodle REST client
#[derive(Clone)]
pub struct MoodleClient {
    domain: String,
    token: String,
    http_client: Client,
}

impl MoodleClient {
    pub fn new(config: &MoodleConfig) -> Self {
        Self {
            domain: config.domain.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client: Client::new(),
        }
    }

    /// Call a web service function and return the raw JSON body
    pub async fn call_raw(
        &self,
        function: &str,
        params: &MoodleParams,
    ) -> Result<serde_json::Value, ExternalError> {
        let url = format!("{}/webservice/rest/server.php", self.domain);

        let response = self
            .http_client
            .post(&url)
            .query(&[
                ("wstoken", self.token.as_str()),
                ("wsfunction", function),
                ("moodlewsrestformat", "json"),
            ])
            .form(params.pairs())
            .send()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExternalError::network(SERVICE, e))?;

        if !status.is_success() {
            return Err(ExternalError::invalid(SERVICE, status.as_u16(), text));
        }

        let value: serde_json::Value = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|_| ExternalError::invalid(SERVICE, status.as_u16(), text.clone()))?
        };

        if let Ok(exception) = serde_json::from_value::<MoodleException>(value.clone()) {
            tracing::warn!(
                function,
                exception = %exception.exception,
                errorcode = ?exception.errorcode,
                "Moodle returned an exception"
            );
            return Err(ExternalError::invalid(
                SERVICE,
                status.as_u16(),
                exception.message.unwrap_or(exception.exception),
            ));
        }

        Ok(value)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        params: &MoodleParams,
    ) -> Result<T, ExternalError> {
        let value = self.call_raw(function, params).await?;
        serde_json::from_value(value.clone())
            .map_err(|_| ExternalError::invalid(SERVICE, 200, value.to_string()))
    }

    /// `core_user_create_users` for a single user
    pub async fn create_user(&self, user: &NewMoodleUser) -> Result<MoodleUser, ExternalError> {
        let mut params = MoodleParams::new();
        params
            .push_indexed("users", 0, "username", &user.username)
            .push_indexed("users", 0, "password", &user.password)
            .push_indexed("users", 0, "firstname", &user.firstname)
            .push_indexed("users", 0, "lastname", &user.lastname)
            .push_indexed("users", 0, "email", &user.email)
            .push_indexed("users", 0, "auth", "manual");
        if let Some(phone) = &user.phone1 {
            params.push_indexed("users", 0, "phone1", phone);
        }

        let created: Vec<CreatedUser> = self.call("core_user_create_users", &params).await?;
        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| ExternalError::invalid(SERVICE, 200, "empty create_users response"))?;

        Ok(MoodleUser {
            id: created.id,
            username: created.username,
            email: Some(user.email.clone()),
            fullname: Some(format!("{} {}", user.firstname, user.lastname)),
        })
    }

    /// `core_user_update_users`: set arbitrary fields on one user
    pub async fn update_user(
        &self,
        user_id: i64,
        fields: &[(&str, String)],
    ) -> Result<(), ExternalError> {
        let mut params = MoodleParams::new();
        params.push_indexed("users", 0, "id", user_id);
        for (field, value) in fields {
            params.push_indexed("users", 0, field, value);
        }
        self.call_raw("core_user_update_users", &params).await?;
        Ok(())
    }

    /// `core_user_get_users_by_field`
    pub async fn get_user_by_field(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Option<MoodleUser>, ExternalError> {
        let mut params = MoodleParams::new();
        params.push("field", field).push_list("values", 0, value);

        let users: Vec<MoodleUser> = self.call("core_user_get_users_by_field", &params).await?;
        Ok(users.into_iter().next())
    }

    /// `core_role_assign_roles` in the course context.
    ///
    /// The context is addressed by level and instance so no context id
    /// lookup is needed.
    pub async fn assign_course_role(
        &self,
        role_id: i64,
        user_id: i64,
        course_id: i64,
    ) -> Result<(), ExternalError> {
        let mut params = MoodleParams::new();
        params
            .push_indexed("assignments", 0, "roleid", role_id)
            .push_indexed("assignments", 0, "userid", user_id)
            .push_indexed("assignments", 0, "contextlevel", "course")
            .push_indexed("assignments", 0, "instanceid", course_id);
        self.call_raw("core_role_assign_roles", &params).await?;
        Ok(())
    }

    /// `enrol_manual_enrol_users`
    pub async fn enrol_user(
        &self,
        role_id: i64,
        user_id: i64,
        course_id: i64,
    ) -> Result<(), ExternalError> {
        let mut params = MoodleParams::new();
        params
            .push_indexed("enrolments", 0, "roleid", role_id)
            .push_indexed("enrolments", 0, "userid", user_id)
            .push_indexed("enrolments", 0, "courseid", course_id);
        self.call_raw("enrol_manual_enrol_users", &params).await?;
        Ok(())
    }

    /// `core_course_create_courses` for a single course, returns its id
    pub async fn create_course(
        &self,
        fullname: &str,
        shortname: &str,
        category_id: i64,
    ) -> Result<i64, ExternalError> {
        let mut params = MoodleParams::new();
        params
            .push_indexed("courses", 0, "fullname", fullname)
            .push_indexed("courses", 0, "shortname", shortname)
            .push_indexed("courses", 0, "categoryid", category_id);

        let created: Vec<CreatedCourse> = self.call("core_course_create_courses", &params).await?;
        created
            .into_iter()
            .next()
            .map(|c| c.id)
            .ok_or_else(|| ExternalError::invalid(SERVICE, 200, "empty create_courses response"))
    }

    /// `core_course_get_courses`; empty `ids` lists every course
    pub async fn get_courses(&self, ids: &[i64]) -> Result<Vec<MoodleCourse>, ExternalError> {
        let mut params = MoodleParams::new();
        for (i, id) in ids.iter().enumerate() {
            params.push_list("options[ids]", i, id);
        }
        self.call("core_course_get_courses", &params).await
    }

    /// Course full name for certificates, `Curso {id}` when Moodle can't say
    pub async fn course_name(&self, course_id: i64) -> String {
        match self.get_courses(&[course_id]).await {
            Ok(courses) => courses
                .into_iter()
                .find(|c| c.id == course_id)
                .map(|c| c.fullname)
                .unwrap_or_else(|| format!("Curso {}", course_id)),
            Err(e) => {
                tracing::warn!(course_id, error = %e, "Course lookup failed");
                format!("Curso {}", course_id)
            }
        }
    }

    /// Find a user by username, creating it when absent
    pub async fn ensure_user(&self, user: &NewMoodleUser) -> Result<(MoodleUser, bool), ExternalError> {
        if let Some(existing) = self.get_user_by_field("username", &user.username).await? {
            return Ok((existing, false));
        }
        if let Some(existing) = self.get_user_by_field("email", &user.email).await? {
            return Ok((existing, false));
        }
        Ok((self.create_user(user).await?, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(domain: String) -> MoodleClient {
        MoodleClient::new(&MoodleConfig {
            domain,
            token: "tok".to_string(),
            student_role_id: 5,
        })
    }

    #[test]
    fn test_nested_array_keys() {
        let mut params = MoodleParams::new();
        params
            .push_indexed("users", 0, "username", "ana")
            .push_list("values", 0, "ana@example.com")
            .push("field", "email");

        assert_eq!(
            params.pairs(),
            &[
                ("users[0][username]".to_string(), "ana".to_string()),
                ("values[0]".to_string(), "ana@example.com".to_string()),
                ("field".to_string(), "email".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_user_sends_form_and_parses_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webservice/rest/server.php"))
            .and(query_param("wstoken", "tok"))
            .and(query_param("wsfunction", "core_user_create_users"))
            .and(body_string_contains("users%5B0%5D%5Busername%5D=ana"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"id": 42, "username": "ana"}])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let user = client(mock_server.uri())
            .create_user(&NewMoodleUser {
                username: "ana".to_string(),
                password: "Secret#1".to_string(),
                firstname: "Ana".to_string(),
                lastname: "Quispe".to_string(),
                email: "ana@example.com".to_string(),
                phone1: None,
            })
            .await
            .unwrap();

        assert_eq!(user.id, 42);
    }

    #[tokio::test]
    async fn test_exception_body_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/webservice/rest/server.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "exception": "invalid_parameter_exception",
                "errorcode": "invalidparameter",
                "message": "Invalid parameter value detected"
            })))
            .mount(&mock_server)
            .await;

        let err = client(mock_server.uri())
            .enrol_user(5, 42, 3)
            .await
            .unwrap_err();

        match err {
            ExternalError::InvalidResponse { body, .. } => {
                assert_eq!(body, "Invalid parameter value detected")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enrol_accepts_null_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "enrol_manual_enrol_users"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&mock_server)
            .await;

        tokio_test::assert_ok!(client(mock_server.uri()).enrol_user(5, 42, 3).await);
    }

    #[tokio::test]
    async fn test_course_role_addresses_context_by_level() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "core_role_assign_roles"))
            .and(body_string_contains("assignments%5B0%5D%5Bcontextlevel%5D=course"))
            .and(body_string_contains("assignments%5B0%5D%5Binstanceid%5D=3"))
            .and(body_string_contains("assignments%5B0%5D%5Broleid%5D=5"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .expect(1)
            .mount(&mock_server)
            .await;

        tokio_test::assert_ok!(
            client(mock_server.uri())
                .assign_course_role(5, 42, 3)
                .await
        );
    }

    #[tokio::test]
    async fn test_create_course_returns_new_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "core_course_create_courses"))
            .and(body_string_contains("courses%5B0%5D%5Bshortname%5D=IMP-2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"id": 17, "shortname": "IMP-2"}])),
            )
            .mount(&mock_server)
            .await;

        let id = client(mock_server.uri())
            .create_course("Importación II", "IMP-2", 1)
            .await
            .unwrap();
        assert_eq!(id, 17);
    }

    #[tokio::test]
    async fn test_create_course_empty_reply_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "core_course_create_courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let err = client(mock_server.uri())
            .create_course("Importación II", "IMP-2", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExternalError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_get_user_by_field_empty_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "core_user_get_users_by_field"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        let found = client(mock_server.uri())
            .get_user_by_field("username", "nadie")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_course_name_falls_back_when_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(query_param("wsfunction", "core_course_get_courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 3, "fullname": "Importación desde China", "shortname": "IMP"}
            ])))
            .mount(&mock_server)
            .await;

        let moodle = client(mock_server.uri());
        assert_eq!(moodle.course_name(3).await, "Importación desde China");
        assert_eq!(moodle.course_name(9).await, "Curso 9");
    }
}
