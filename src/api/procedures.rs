//! Typed bindings for the MantisConnect remote procedures.
//!
//! Each method issues exactly one call through [`Transport::invoke`] using the
//! procedure name and positional argument order of the published contract,
//! then decodes the result into the matching record type.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::auth::Credentials;
use super::error::{ApiError, Result};
use super::transport::{Args, Transport};
use super::types::{
    AccountData, CustomFieldDefinition, IssueData, IssueNote, LoginResult, ObjectRef, Project,
    ProjectVersion, StoredFilter,
};

/// Typed facade over a [`Transport`].
#[derive(Debug)]
pub(crate) struct MantisConnect<T> {
    transport: T,
}

impl<T: Transport> MantisConnect<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self { transport }
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// Invoke a procedure with the credentials prepended to `args`.
    async fn call(
        &self,
        procedure: &'static str,
        credentials: &Credentials,
        args: Args,
    ) -> Result<Value> {
        let mut all = Vec::with_capacity(args.len() + 2);
        all.push(("username", json!(credentials.username())));
        all.push(("password", json!(credentials.secret())));
        all.extend(args);
        self.transport.invoke(procedure, all).await
    }

    pub(crate) async fn mc_version(&self) -> Result<String> {
        let value = self.transport.invoke("mc_version", Vec::new()).await?;
        decode_string(value)
    }

    pub(crate) async fn mc_login(&self, credentials: &Credentials) -> Result<LoginResult> {
        decode(self.call("mc_login", credentials, Vec::new()).await?)
    }

    pub(crate) async fn mc_project_get_categories(
        &self,
        credentials: &Credentials,
        project_id: u64,
    ) -> Result<Vec<String>> {
        let value = self
            .call(
                "mc_project_get_categories",
                credentials,
                vec![("project_id", json!(project_id))],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_project_get_versions(
        &self,
        credentials: &Credentials,
        project_id: u64,
    ) -> Result<Vec<ProjectVersion>> {
        let value = self
            .call(
                "mc_project_get_versions",
                credentials,
                vec![("project_id", json!(project_id))],
            )
            .await?;
        decode_list(value)
    }

    /// Returns `None` when the service does not answer with a sequence.
    pub(crate) async fn mc_filter_get(
        &self,
        credentials: &Credentials,
        project_id: u64,
    ) -> Result<Option<Vec<StoredFilter>>> {
        let value = self
            .call(
                "mc_filter_get",
                credentials,
                vec![("project_id", json!(project_id))],
            )
            .await?;
        match value {
            Value::Array(_) => decode(value).map(Some),
            _ => Ok(None),
        }
    }

    pub(crate) async fn mc_filter_get_issues(
        &self,
        credentials: &Credentials,
        project_id: u64,
        filter_id: u64,
        page_number: u32,
        per_page: u32,
    ) -> Result<Vec<IssueData>> {
        let value = self
            .call(
                "mc_filter_get_issues",
                credentials,
                vec![
                    ("project_id", json!(project_id)),
                    ("filter_id", json!(filter_id)),
                    ("page_number", json!(page_number)),
                    ("per_page", json!(per_page)),
                ],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_config_get_string(
        &self,
        credentials: &Credentials,
        config_var: &str,
    ) -> Result<String> {
        let value = self
            .call(
                "mc_config_get_string",
                credentials,
                vec![("config_var", json!(config_var))],
            )
            .await?;
        decode_string(value)
    }

    async fn enumeration(
        &self,
        procedure: &'static str,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        decode_list(self.call(procedure, credentials, Vec::new()).await?)
    }

    pub(crate) async fn mc_enum_status(&self, credentials: &Credentials) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_status", credentials).await
    }

    pub(crate) async fn mc_enum_resolutions(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_resolutions", credentials).await
    }

    pub(crate) async fn mc_enum_access_levels(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_access_levels", credentials).await
    }

    pub(crate) async fn mc_enum_priorities(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_priorities", credentials).await
    }

    pub(crate) async fn mc_enum_severities(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_severities", credentials).await
    }

    pub(crate) async fn mc_enum_etas(&self, credentials: &Credentials) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_etas", credentials).await
    }

    pub(crate) async fn mc_enum_project_status(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_project_status", credentials).await
    }

    pub(crate) async fn mc_enum_project_view_states(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_project_view_states", credentials)
            .await
    }

    pub(crate) async fn mc_enum_projections(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_projections", credentials).await
    }

    pub(crate) async fn mc_enum_reproducibilities(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_reproducibilities", credentials)
            .await
    }

    pub(crate) async fn mc_enum_view_states(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<ObjectRef>> {
        self.enumeration("mc_enum_view_states", credentials).await
    }

    pub(crate) async fn mc_project_get_users(
        &self,
        credentials: &Credentials,
        project_id: u64,
        access: u64,
    ) -> Result<Vec<AccountData>> {
        let value = self
            .call(
                "mc_project_get_users",
                credentials,
                vec![("project_id", json!(project_id)), ("access", json!(access))],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_projects_get_user_accessible(
        &self,
        credentials: &Credentials,
    ) -> Result<Vec<Project>> {
        let value = self
            .call("mc_projects_get_user_accessible", credentials, Vec::new())
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_project_get_id_from_name(
        &self,
        credentials: &Credentials,
        project_name: &str,
    ) -> Result<u64> {
        let value = self
            .call(
                "mc_project_get_id_from_name",
                credentials,
                vec![("project_name", json!(project_name))],
            )
            .await?;
        decode_id(value)
    }

    pub(crate) async fn mc_project_get_issues_for_user(
        &self,
        credentials: &Credentials,
        project_id: u64,
        filter_type: &str,
        target_user: &AccountData,
        page_number: u32,
        per_page: u32,
    ) -> Result<Vec<IssueData>> {
        let value = self
            .call(
                "mc_project_get_issues_for_user",
                credentials,
                vec![
                    ("project_id", json!(project_id)),
                    ("filter_type", json!(filter_type)),
                    ("target_user", encode(target_user)?),
                    ("page_number", json!(page_number)),
                    ("per_page", json!(per_page)),
                ],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_project_get_issues(
        &self,
        credentials: &Credentials,
        project_id: u64,
        page_number: u32,
        per_page: u32,
    ) -> Result<Vec<IssueData>> {
        let value = self
            .call(
                "mc_project_get_issues",
                credentials,
                vec![
                    ("project_id", json!(project_id)),
                    ("page_number", json!(page_number)),
                    ("per_page", json!(per_page)),
                ],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_issue_add(
        &self,
        credentials: &Credentials,
        issue: &IssueData,
    ) -> Result<u64> {
        let value = self
            .call("mc_issue_add", credentials, vec![("issue", encode(issue)?)])
            .await?;
        decode_id(value)
    }

    pub(crate) async fn mc_issue_get(
        &self,
        credentials: &Credentials,
        issue_id: u64,
    ) -> Result<IssueData> {
        let value = self
            .call(
                "mc_issue_get",
                credentials,
                vec![("issue_id", json!(issue_id))],
            )
            .await?;
        decode(value)
    }

    pub(crate) async fn mc_issue_update(
        &self,
        credentials: &Credentials,
        issue_id: u64,
        issue: &IssueData,
    ) -> Result<bool> {
        let value = self
            .call(
                "mc_issue_update",
                credentials,
                vec![("issueId", json!(issue_id)), ("issue", encode(issue)?)],
            )
            .await?;
        decode_bool(value)
    }

    pub(crate) async fn mc_issue_delete(
        &self,
        credentials: &Credentials,
        issue_id: u64,
    ) -> Result<bool> {
        let value = self
            .call(
                "mc_issue_delete",
                credentials,
                vec![("issue_id", json!(issue_id))],
            )
            .await?;
        decode_bool(value)
    }

    pub(crate) async fn mc_project_get_custom_fields(
        &self,
        credentials: &Credentials,
        project_id: u64,
    ) -> Result<Vec<CustomFieldDefinition>> {
        let value = self
            .call(
                "mc_project_get_custom_fields",
                credentials,
                vec![("project_id", json!(project_id))],
            )
            .await?;
        decode_list(value)
    }

    pub(crate) async fn mc_issue_note_add(
        &self,
        credentials: &Credentials,
        issue_id: u64,
        note: &IssueNote,
    ) -> Result<u64> {
        let value = self
            .call(
                "mc_issue_note_add",
                credentials,
                vec![("issue_id", json!(issue_id)), ("note", encode(note)?)],
            )
            .await?;
        decode_id(value)
    }

    pub(crate) async fn mc_issue_attachment_add(
        &self,
        credentials: &Credentials,
        issue_id: u64,
        name: &str,
        file_type: &str,
        content: &[u8],
    ) -> Result<u64> {
        let value = self
            .call(
                "mc_issue_attachment_add",
                credentials,
                vec![
                    ("issue_id", json!(issue_id)),
                    ("name", json!(name)),
                    ("file_type", json!(file_type)),
                    ("content", json!(BASE64.encode(content))),
                ],
            )
            .await?;
        decode_id(value)
    }

    pub(crate) async fn mc_issue_note_update(
        &self,
        credentials: &Credentials,
        note: &IssueNote,
    ) -> Result<bool> {
        let value = self
            .call(
                "mc_issue_note_update",
                credentials,
                vec![("note", encode(note)?)],
            )
            .await?;
        decode_bool(value)
    }

    pub(crate) async fn mc_issue_note_delete(
        &self,
        credentials: &Credentials,
        issue_note_id: u64,
    ) -> Result<bool> {
        let value = self
            .call(
                "mc_issue_note_delete",
                credentials,
                vec![("issue_note_id", json!(issue_note_id))],
            )
            .await?;
        decode_bool(value)
    }

    pub(crate) async fn mc_issue_attachment_get(
        &self,
        credentials: &Credentials,
        issue_attachment_id: u64,
    ) -> Result<Vec<u8>> {
        let value = self
            .call(
                "mc_issue_attachment_get",
                credentials,
                vec![("issue_attachment_id", json!(issue_attachment_id))],
            )
            .await?;
        let encoded = decode_string(value)?;
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact)
            .map_err(|e| ApiError::InvalidResponse(format!("attachment content: {}", e)))
    }

    pub(crate) async fn mc_user_pref_get_pref(
        &self,
        credentials: &Credentials,
        project_id: u64,
        pref_name: &str,
    ) -> Result<String> {
        let value = self
            .call(
                "mc_user_pref_get_pref",
                credentials,
                vec![
                    ("project_id", json!(project_id)),
                    ("pref_name", json!(pref_name)),
                ],
            )
            .await?;
        decode_string(value)
    }
}

fn encode<S: Serialize>(value: &S) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request: {}", e)))
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R> {
    Ok(serde_json::from_value(value)?)
}

/// Decode a sequence; an empty or missing result is an empty sequence and a
/// lone record is a sequence of one.
fn decode_list<R: DeserializeOwned>(value: Value) -> Result<Vec<R>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) if s.is_empty() => Ok(Vec::new()),
        Value::Array(_) => decode(value),
        // Repeated named children, e.g. `<category>` entries.
        Value::Object(ref fields) if fields.len() == 1 => match fields.values().next() {
            Some(inner @ Value::Array(_)) => decode(inner.clone()),
            Some(inner) => decode(value.clone())
                .or_else(|_| decode(inner.clone()))
                .map(|item| vec![item]),
            None => Ok(Vec::new()),
        },
        single => decode(single).map(|item| vec![item]),
    }
}

fn decode_string(value: Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ApiError::InvalidResponse(format!(
            "expected text, got {}",
            other
        ))),
    }
}

fn decode_id(value: Value) -> Result<u64> {
    let id = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    id.ok_or_else(|| ApiError::InvalidResponse(format!("expected id, got {}", value)))
}

fn decode_bool(value: Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_u64() != Some(0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            _ => Err(ApiError::InvalidResponse(format!(
                "expected boolean, got '{}'",
                s
            ))),
        },
        other => Err(ApiError::InvalidResponse(format!(
            "expected boolean, got {}",
            other
        ))),
    }
}
