//! MantisConnect request and response types.
//!
//! These types model the records exchanged with the MantisConnect SOAP API.
//! Well-known fields are typed and optional; anything else the service sends
//! is kept verbatim in the flattened `extra` map so nothing is lost when a
//! record is read, modified and written back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A reference to an enumeration value or named object (`ObjectRef`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// The object id.
    #[serde(
        default,
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    /// The object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ObjectRef {
    /// Reference an object by id.
    pub fn id(id: u64) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    /// Reference an object by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.id) {
            (Some(name), _) => write!(f, "{}", name),
            (None, Some(id)) => write!(f, "#{}", id),
            (None, None) => write!(f, "-"),
        }
    }
}

/// A user account (`AccountData`).
///
/// Also used to describe a target user, in which case only the fields that
/// identify the user (id, name or email) are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    /// The user id.
    #[serde(
        default,
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    /// The login name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    /// The email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccountData {
    /// Identify a user by login name.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Identify a user by id.
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }
}

/// Raw result of `mc_login`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResult {
    pub account_data: AccountData,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub access_level: Option<u64>,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// The authenticated user, as returned by [`crate::MantisClient::authenticate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// The login name.
    pub name: String,
    /// The user id.
    pub id: u64,
    /// The display name, empty when not set.
    pub real_name: String,
    /// The email address.
    pub email: String,
    /// The global access level.
    pub access_level: u64,
    /// The user's time zone preference.
    pub timezone: String,
}

impl LoginResult {
    pub(crate) fn into_user_info(self) -> UserInfo {
        let account = self.account_data;
        UserInfo {
            name: account.name.unwrap_or_default(),
            id: account.id.unwrap_or_default(),
            real_name: account.real_name.unwrap_or_default(),
            email: account.email.unwrap_or_default(),
            access_level: self.access_level.unwrap_or_default(),
            timezone: self.timezone.unwrap_or_default(),
        }
    }
}

/// A project and its subprojects (`ProjectData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// The project id.
    #[serde(deserialize_with = "lenient::required_u64")]
    pub id: u64,
    /// The project name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// The project status (development, release, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectRef>,
    /// Whether the project is enabled.
    #[serde(
        default,
        deserialize_with = "lenient::opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub enabled: Option<bool>,
    /// Public or private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,
    /// Minimum access level required to view the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_min: Option<ObjectRef>,
    /// Upload path for attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// The project description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Nested subprojects; empty when the service omits them.
    #[serde(default, deserialize_with = "lenient::vec")]
    pub subprojects: Vec<Project>,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A project version (`ProjectVersionData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectVersion {
    /// The version id.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub id: Option<u64>,
    /// The version name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// The owning project id.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub project_id: Option<u64>,
    /// The release date.
    #[serde(default)]
    pub date_order: Option<String>,
    /// The version description.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the version is released.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub released: Option<bool>,
    /// Whether the version is obsolete.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub obsolete: Option<bool>,
}

/// A filter stored on the server (`FilterData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFilter {
    /// The filter id.
    #[serde(deserialize_with = "lenient::required_u64")]
    pub id: u64,
    /// The user that owns the filter.
    #[serde(default)]
    pub owner: Option<AccountData>,
    /// The project the filter belongs to.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub project_id: Option<u64>,
    /// Whether the filter is shared.
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub is_public: Option<bool>,
    /// The filter name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// The serialized filter criteria.
    #[serde(default)]
    pub filter_string: Option<String>,
    /// The filter URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// A custom field definition (`CustomFieldDefinitionData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldDefinition {
    /// The field id and name.
    pub field: ObjectRef,
    /// The field type code.
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_u64")]
    pub field_type: Option<u64>,
    /// `|` separated list of allowed values.
    #[serde(default)]
    pub possible_values: Option<String>,
    /// The default value.
    #[serde(default)]
    pub default_value: Option<String>,
    /// Validation regular expression.
    #[serde(default)]
    pub valid_regexp: Option<String>,
    /// Any other attribute reported by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A custom field value attached to an issue (`CustomFieldValueForIssueData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    /// The field id and name.
    pub field: ObjectRef,
    /// The field value.
    #[serde(default)]
    pub value: Option<String>,
}

/// An issue note (`IssueNoteData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueNote {
    /// The note id.
    #[serde(
        default,
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    /// The note author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<AccountData>,
    /// The note text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Public or private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,
    /// Submission timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_submitted: Option<String>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// Any other attribute reported by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attachment metadata (`AttachmentData`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// The attachment id.
    #[serde(deserialize_with = "lenient::required_u64")]
    pub id: u64,
    /// The file name.
    #[serde(default, deserialize_with = "lenient::string")]
    pub filename: String,
    /// The file size in bytes.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub size: Option<u64>,
    /// The MIME type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Upload timestamp.
    #[serde(default)]
    pub date_submitted: Option<String>,
    /// Direct download URL.
    #[serde(default)]
    pub download_url: Option<String>,
    /// The uploader.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub user_id: Option<u64>,
    /// Any other attribute reported by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attachment metadata together with the file content.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentContent {
    /// The attachment metadata.
    pub attachment: Attachment,
    /// The decoded file content.
    pub content: Vec<u8>,
}

/// An issue (`IssueData`).
///
/// Used both for reading issues and as the payload of `mc_issue_add` and
/// `mc_issue_update`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueData {
    /// The issue id.
    #[serde(
        default,
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,
    /// The project the issue belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ObjectRef>,
    /// The category name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The one line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// The description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Public or private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_state: Option<ObjectRef>,
    /// The priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<ObjectRef>,
    /// The severity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ObjectRef>,
    /// The workflow status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectRef>,
    /// The resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ObjectRef>,
    /// The reporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporter: Option<AccountData>,
    /// The assignee.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<AccountData>,
    /// Submission timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_submitted: Option<String>,
    /// Last update timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// Custom field values; empty when the service omits them.
    #[serde(
        default,
        deserialize_with = "lenient::vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub custom_fields: Vec<CustomFieldValue>,
    /// Notes; empty when the service omits them.
    #[serde(
        default,
        deserialize_with = "lenient::vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub notes: Vec<IssueNote>,
    /// Attachments; empty when the service omits them.
    #[serde(
        default,
        deserialize_with = "lenient::vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attachments: Vec<Attachment>,
    /// Any other attribute reported by the service.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IssueData {
    /// Create a new issue payload for the given project.
    pub fn new(project: ObjectRef, category: &str, summary: &str, description: &str) -> Self {
        Self {
            project: Some(project),
            category: Some(category.to_string()),
            summary: Some(summary.to_string()),
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    /// Find a note by id.
    pub fn note(&self, note_id: u64) -> Option<&IssueNote> {
        self.notes.iter().find(|note| note.id == Some(note_id))
    }

    /// Find an attachment by id.
    pub fn attachment(&self, attachment_id: u64) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.id == attachment_id)
    }
}

impl fmt::Display for IssueData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{:07}: {}", id, self.summary.as_deref().unwrap_or("")),
            None => write!(f, "{}", self.summary.as_deref().unwrap_or("")),
        }
    }
}

/// Deserializers tolerant of the loose typing of SOAP responses.
///
/// Numbers and booleans may arrive typed or as plain text, empty elements
/// decode to null and single-element sequences may arrive unwrapped.
mod lenient {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Number(n) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("expected unsigned integer, got {}", n))),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected unsigned integer, got '{}'", s))),
            other => Err(D::Error::custom(format!(
                "expected unsigned integer, got {}",
                other
            ))),
        }
    }

    pub fn required_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        opt_u64(deserializer)?.ok_or_else(|| D::Error::custom("missing integer value"))
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("expected string, got {}", other))),
        }
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::Number(n) => Ok(Some(n.as_u64() != Some(0))),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(D::Error::custom(format!("expected boolean, got '{}'", s))),
            },
            other => Err(D::Error::custom(format!("expected boolean, got {}", other))),
        }
    }

    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Vec::new()),
            Value::String(s) if s.is_empty() => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
                .collect(),
            single => serde_json::from_value(single)
                .map(|item| vec![item])
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_issue_defaults_collections() {
        let issue: IssueData = serde_json::from_value(json!({
            "id": 42,
            "summary": "Crash on save"
        }))
        .unwrap();

        assert_eq!(issue.id, Some(42));
        assert!(issue.custom_fields.is_empty());
        assert!(issue.notes.is_empty());
        assert!(issue.attachments.is_empty());
    }

    #[test]
    fn test_parse_issue_keeps_unknown_fields() {
        let issue: IssueData = serde_json::from_value(json!({
            "id": "7",
            "summary": "Typo",
            "os_build": "22H2",
            "tags": [{"id": 1, "name": "ui"}]
        }))
        .unwrap();

        assert_eq!(issue.id, Some(7));
        assert_eq!(issue.extra.get("os_build"), Some(&json!("22H2")));
        assert!(issue.extra.contains_key("tags"));
    }

    #[test]
    fn test_parse_issue_with_notes_and_attachments() {
        let issue: IssueData = serde_json::from_value(json!({
            "id": 1,
            "notes": [
                {"id": 10, "text": "first", "reporter": {"id": 2, "name": "alice"}},
                {"id": 11, "text": "second"}
            ],
            "attachments": {"id": 5, "filename": "log.txt", "size": "120"}
        }))
        .unwrap();

        assert_eq!(issue.note(11).and_then(|n| n.text.as_deref()), Some("second"));
        assert!(issue.note(12).is_none());
        let attachment = issue.attachment(5).unwrap();
        assert_eq!(attachment.filename, "log.txt");
        assert_eq!(attachment.size, Some(120));
    }

    #[test]
    fn test_serialize_issue_skips_unset_fields() {
        let issue = IssueData::new(ObjectRef::named("Website"), "General", "Summary", "Body");
        let value = serde_json::to_value(&issue).unwrap();

        assert_eq!(
            value,
            json!({
                "project": {"name": "Website"},
                "category": "General",
                "summary": "Summary",
                "description": "Body"
            })
        );
    }

    #[test]
    fn test_login_result_into_user_info() {
        let result: LoginResult = serde_json::from_value(json!({
            "account_data": {"id": 3, "name": "bob", "email": "bob@example.com"},
            "access_level": 55,
            "timezone": "Europe/Paris"
        }))
        .unwrap();

        let user = result.into_user_info();
        assert_eq!(user.name, "bob");
        assert_eq!(user.id, 3);
        assert_eq!(user.real_name, "");
        assert_eq!(user.access_level, 55);
        assert_eq!(user.timezone, "Europe/Paris");
    }

    #[test]
    fn test_project_without_subprojects() {
        let project: Project = serde_json::from_value(json!({
            "id": 1,
            "name": "Main",
            "enabled": "true",
            "subprojects": null
        }))
        .unwrap();

        assert_eq!(project.enabled, Some(true));
        assert!(project.subprojects.is_empty());
    }

    #[test]
    fn test_account_data_serializes_only_identifiers() {
        assert_eq!(
            serde_json::to_value(AccountData::by_id(0)).unwrap(),
            json!({"id": 0})
        );
        assert_eq!(
            serde_json::to_value(AccountData::by_name("alice")).unwrap(),
            json!({"name": "alice"})
        );
    }

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::named("high").to_string(), "high");
        assert_eq!(ObjectRef::id(30).to_string(), "#30");
        assert_eq!(ObjectRef::default().to_string(), "-");
    }

    #[test]
    fn test_issue_display() {
        let issue = IssueData {
            id: Some(12),
            summary: Some("Broken link".to_string()),
            ..IssueData::default()
        };
        assert_eq!(issue.to_string(), "0000012: Broken link");
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let result = serde_json::from_value::<Attachment>(json!({"id": "abc"}));
        assert!(result.is_err());
    }
}
