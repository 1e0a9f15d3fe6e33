//! MantisBT client implementation.
//!
//! This module provides [`MantisClient`], the session object through which
//! every MantisConnect operation is performed. It keeps the configured
//! credentials, the account name the service actually authenticated, and
//! two values fetched at most once per session: the MantisBT version and the
//! list of accessible projects.
//!
//! Operations are sequential request/response calls. No retry is attempted
//! and faults reported by the service are returned unchanged, except where a
//! method documents otherwise.

use std::fmt;
use std::path::Path;

use tracing::{debug, error, info, instrument, warn};

use super::auth::Credentials;
use super::endpoint::{resolve_endpoint, Endpoint};
use super::error::{ApiError, Result};
use super::filters::{identity_labels, standard_filters, Filter, FilterId, LabelResolver, UserRelation};
use super::procedures::MantisConnect;
use super::projects::find_project;
use super::timezone::{ProcessTimeZone, TimeZoneSink, DEFAULT_TIME_ZONE};
use super::transport::{SoapTransport, Transport};
use super::types::{
    AccountData, AttachmentContent, CustomFieldDefinition, IssueData, IssueNote, ObjectRef,
    Project, ProjectVersion, StoredFilter, UserInfo,
};
use super::version::{is_at_least, MIN_USER_FILTERS_VERSION};
use crate::config::{ClientSettings, Profile, ValidationMode, DEFAULT_USER_AGENT};

/// Project id meaning "all projects".
const ALL_PROJECTS: u64 = 0;

/// Project id used for preference lookups.
///
/// MantisBT answers preference queries incorrectly for `ALL_PROJECTS` but
/// correctly for any other id, even one with no matching project.
const PREFERENCE_PROJECT_ID: u64 = 1;

/// A session with a MantisBT instance.
pub struct MantisClient<T: Transport = SoapTransport> {
    /// Typed procedure calls over the transport.
    connect: MantisConnect<T>,
    /// The resolved endpoint.
    endpoint: Endpoint,
    /// The configured credentials.
    credentials: Credentials,
    /// Page size for issue listings.
    issues_per_page: u32,
    /// The MantisBT version, once fetched.
    mantis_version: Option<String>,
    /// The accessible projects, once fetched.
    projects: Option<Vec<Project>>,
    /// The account name returned by the last successful login.
    effective_username: Option<String>,
    /// Resolves built-in filter labels.
    labels: LabelResolver,
    /// Receives the zone chosen by `set_time_zone`.
    time_zone: Box<dyn TimeZoneSink>,
}

impl MantisClient<SoapTransport> {
    /// Create a client with explicit credentials and default settings.
    ///
    /// Does NOT contact the service; connectivity problems surface on the
    /// first call.
    ///
    /// # Arguments
    ///
    /// * `url` - The instance address, instance root or SOAP endpoint
    /// * `username` - The login name, empty for anonymous access
    /// * `secret` - The password or API token
    pub fn new(url: &str, username: &str, secret: &str) -> Result<Self> {
        Self::build(url, Credentials::new(username, secret), &ClientSettings::default())
    }

    /// Create a client with explicit credentials and settings.
    ///
    /// With [`ValidationMode::Strict`] the service contract is fetched and checked before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Connectivity` in strict mode when the service cannot
    /// be reached.
    pub async fn connect(
        url: &str,
        credentials: Credentials,
        settings: &ClientSettings,
    ) -> Result<Self> {
        let client = Self::build(url, credentials, settings)?;

        if settings.validation == ValidationMode::Strict {
            client.validate().await?;
        }

        info!(instance = %client.endpoint.instance_url, "Mantis client created");
        Ok(client)
    }

    /// Create a client from a profile, reading the secret from the OS keyring.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The secret cannot be retrieved from the keyring
    /// - The HTTP client cannot be built
    /// - Validation fails in strict mode
    #[instrument(skip(profile, settings), fields(profile_name = %profile.name))]
    pub async fn from_profile(profile: &Profile, settings: &ClientSettings) -> Result<Self> {
        let credentials = Credentials::from_keyring(&profile.name, &profile.username)?;
        Self::connect(&profile.url, credentials, settings).await
    }

    fn build(url: &str, credentials: Credentials, settings: &ClientSettings) -> Result<Self> {
        let endpoint = resolve_endpoint(url);
        let user_agent = if settings.user_agent.is_empty() {
            DEFAULT_USER_AGENT
        } else {
            settings.user_agent.as_str()
        };
        let transport = SoapTransport::new(endpoint.clone(), user_agent)?;

        Ok(MantisClient::with_transport(transport, endpoint, credentials)
            .with_issues_per_page(settings.issues_per_page))
    }
}

impl<T: Transport> MantisClient<T> {
    /// Create a client over an arbitrary transport.
    pub fn with_transport(transport: T, endpoint: Endpoint, credentials: Credentials) -> Self {
        Self {
            connect: MantisConnect::new(transport),
            endpoint,
            credentials,
            issues_per_page: crate::config::DEFAULT_ISSUES_PER_PAGE,
            mantis_version: None,
            projects: None,
            effective_username: None,
            labels: identity_labels(),
            time_zone: Box::new(ProcessTimeZone),
        }
    }

    /// Set the page size used by [`MantisClient::get_issues`].
    pub fn with_issues_per_page(mut self, issues_per_page: u32) -> Self {
        self.issues_per_page = issues_per_page.max(1);
        self
    }

    /// Set the resolver used for built-in filter labels.
    pub fn with_label_resolver(mut self, labels: LabelResolver) -> Self {
        self.labels = labels;
        self
    }

    /// Set the sink receiving the zone chosen by [`MantisClient::set_time_zone`].
    pub fn with_time_zone_sink(mut self, sink: Box<dyn TimeZoneSink>) -> Self {
        self.time_zone = sink;
        self
    }

    /// The instance root URL.
    pub fn instance_url(&self) -> &str {
        &self.endpoint.instance_url
    }

    /// The SOAP endpoint URL.
    pub fn soap_url(&self) -> &str {
        &self.endpoint.soap_url
    }

    /// The configured username.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// The account name authenticated by the service, if known.
    pub fn effective_username(&self) -> Option<&str> {
        self.effective_username.as_deref()
    }

    /// The page size used for issue listings.
    pub fn issues_per_page(&self) -> u32 {
        self.issues_per_page
    }

    /// The transport used by this session.
    pub fn transport(&self) -> &T {
        self.connect.transport()
    }

    /// Check that the service contract can be fetched.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Connectivity` if the web service cannot be reached
    /// or does not list any remote procedure.
    pub async fn validate(&self) -> Result<()> {
        self.connect.transport().validate().await.map_err(|e| {
            error!(endpoint = %self.endpoint.soap_url, error = %e, "Validation failed");
            match e {
                ApiError::Connectivity(_) => e,
                other => ApiError::Connectivity(other.to_string()),
            }
        })
    }

    /// The raw payload of the last response.
    pub fn last_response(&self) -> Option<String> {
        self.connect.transport().last_response()
    }

    /// The raw payload of the last request.
    pub fn last_request(&self) -> Option<String> {
        self.connect.transport().last_request()
    }

    /// The last response repeated twice, separated by a newline.
    ///
    /// Kept for callers that depend on the historical diagnostics format;
    /// use [`MantisClient::last_response`] otherwise.
    pub fn legacy_response(&self) -> String {
        let response = self.last_response().unwrap_or_default();
        format!("{}\n{}", response, response)
    }

    /// Get the MantisBT version, fetching it on first use.
    #[instrument(skip(self))]
    pub async fn get_mantis_version(&mut self) -> Result<String> {
        if let Some(version) = &self.mantis_version {
            return Ok(version.clone());
        }

        let version = self.connect.mc_version().await?;
        debug!(version = %version, "Fetched MantisBT version");
        self.mantis_version = Some(version.clone());
        Ok(version)
    }

    /// Whether the instance supports per-user issue queries.
    async fn supports_user_queries(&mut self) -> Result<bool> {
        let version = self.get_mantis_version().await?;
        Ok(is_at_least(&version, MIN_USER_FILTERS_VERSION))
    }

    /// Authenticate the configured user.
    ///
    /// On success the returned account name becomes the effective username.
    ///
    /// # Errors
    ///
    /// Returns the service fault unchanged; the failure is logged with the
    /// instance URL, version and username.
    #[instrument(skip(self))]
    pub async fn authenticate(&mut self) -> Result<UserInfo> {
        let version = self.get_mantis_version().await?;

        match self.connect.mc_login(&self.credentials).await {
            Ok(result) => {
                let user = result.into_user_info();
                self.effective_username = Some(user.name.clone());
                info!(user = %user.name, "Authenticated");
                Ok(user)
            }
            Err(e) => {
                error!(
                    instance = %self.endpoint.instance_url,
                    version = %version,
                    username = %self.credentials.username(),
                    error = %e,
                    "mantis-client-login-failure"
                );
                Err(e)
            }
        }
    }

    /// Check whether the instance allows anonymous access.
    ///
    /// Never fails: any error means no.
    #[instrument(skip(self))]
    pub async fn check_anonymous_access(&self) -> bool {
        match self.connect.mc_login(&Credentials::anonymous()).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Anonymous access rejected");
                false
            }
        }
    }

    /// Override the effective username, for callers that log in out of band.
    pub fn set_effective_username(&mut self, username: &str) {
        self.effective_username = Some(username.to_string());
    }

    /// Whether the session runs under an account other than the configured one.
    pub fn is_anonymous_access(&self) -> bool {
        match self.effective_username.as_deref() {
            Some(effective) => !effective.is_empty() && effective != self.credentials.username(),
            None => false,
        }
    }

    /// Get the accessible projects, fetching them on first use.
    #[instrument(skip(self))]
    pub async fn get_projects(&mut self) -> Result<&[Project]> {
        if self.projects.is_none() {
            let projects = self
                .connect
                .mc_projects_get_user_accessible(&self.credentials)
                .await?;
            debug!(count = projects.len(), "Fetched accessible projects");
            self.projects = Some(projects);
        }

        Ok(self.projects.as_deref().unwrap_or_default())
    }

    /// Find an accessible project, including subprojects, by id.
    pub async fn get_project_by_id(&mut self, project_id: u64) -> Result<Option<&Project>> {
        let projects = self.get_projects().await?;
        Ok(find_project(projects, project_id))
    }

    /// Get the id of a project by name; 0 when there is no such project.
    #[instrument(skip(self))]
    pub async fn get_project_id_by_name(&self, project_name: &str) -> Result<u64> {
        self.connect
            .mc_project_get_id_from_name(&self.credentials, project_name)
            .await
    }

    /// Get the category names of a project.
    #[instrument(skip(self))]
    pub async fn get_categories(&self, project_id: u64) -> Result<Vec<String>> {
        self.connect
            .mc_project_get_categories(&self.credentials, project_id)
            .await
    }

    /// Get the versions of a project.
    #[instrument(skip(self))]
    pub async fn get_versions(&self, project_id: u64) -> Result<Vec<ProjectVersion>> {
        self.connect
            .mc_project_get_versions(&self.credentials, project_id)
            .await
    }

    /// Get the users of a project with at least the given access level.
    #[instrument(skip(self))]
    pub async fn get_project_users(&self, project_id: u64, access: u64) -> Result<Vec<AccountData>> {
        self.connect
            .mc_project_get_users(&self.credentials, project_id, access)
            .await
    }

    /// Get the custom field definitions of a project.
    #[instrument(skip(self))]
    pub async fn get_custom_field_definitions(
        &self,
        project_id: u64,
    ) -> Result<Vec<CustomFieldDefinition>> {
        self.connect
            .mc_project_get_custom_fields(&self.credentials, project_id)
            .await
    }

    /// Get the built-in filters available to this session.
    pub async fn get_standard_filters(&mut self) -> Result<Vec<Filter>> {
        let anonymous = self.is_anonymous_access();
        let supported = self.supports_user_queries().await?;
        Ok(standard_filters(supported, anonymous, &self.labels))
    }

    /// Get the filters stored on the server for a project.
    ///
    /// An unexpected, non-sequence answer yields an empty list.
    #[instrument(skip(self))]
    pub async fn get_custom_filters(&self, project_id: u64) -> Result<Vec<StoredFilter>> {
        let filters = self
            .connect
            .mc_filter_get(&self.credentials, project_id)
            .await?;

        Ok(filters.unwrap_or_else(|| {
            debug!("Filter list was not a sequence");
            Vec::new()
        }))
    }

    /// Get a configuration value of the instance.
    ///
    /// Best effort: failures are logged and yield `None`.
    #[instrument(skip(self))]
    pub async fn get_config_string(&self, config_var: &str) -> Option<String> {
        match self
            .connect
            .mc_config_get_string(&self.credentials, config_var)
            .await
        {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(config_var, error = %e, "Config lookup failed");
                None
            }
        }
    }

    /// Get the status enumeration.
    pub async fn get_enum_status(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_status(&self.credentials).await
    }

    /// Get the resolution enumeration.
    pub async fn get_enum_resolutions(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_resolutions(&self.credentials).await
    }

    /// Get the access level enumeration.
    pub async fn get_enum_access_levels(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_access_levels(&self.credentials).await
    }

    /// Get the priority enumeration.
    pub async fn get_enum_priorities(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_priorities(&self.credentials).await
    }

    /// Get the severity enumeration.
    pub async fn get_enum_severities(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_severities(&self.credentials).await
    }

    /// Get the ETA enumeration.
    pub async fn get_enum_etas(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_etas(&self.credentials).await
    }

    /// Get the project status enumeration.
    pub async fn get_enum_project_status(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_project_status(&self.credentials).await
    }

    /// Get the project view state enumeration.
    pub async fn get_enum_project_view_states(&self) -> Result<Vec<ObjectRef>> {
        self.connect
            .mc_enum_project_view_states(&self.credentials)
            .await
    }

    /// Get the projection enumeration.
    pub async fn get_enum_projections(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_projections(&self.credentials).await
    }

    /// Get the reproducibility enumeration.
    pub async fn get_enum_reproducibilities(&self) -> Result<Vec<ObjectRef>> {
        self.connect
            .mc_enum_reproducibilities(&self.credentials)
            .await
    }

    /// Get the view state enumeration.
    pub async fn get_enum_view_states(&self) -> Result<Vec<ObjectRef>> {
        self.connect.mc_enum_view_states(&self.credentials).await
    }

    /// Check whether a user exists.
    ///
    /// Looks up one issue reported by `user` across all projects; any
    /// fault is taken to mean the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unsupported` before any lookup on instances older
    /// than 1.2.16.
    #[instrument(skip(self))]
    pub async fn user_exists(&mut self, user: &AccountData) -> Result<bool> {
        if !self.supports_user_queries().await? {
            return Err(ApiError::Unsupported {
                operation: "userExists",
                required: "1.2.16",
            });
        }

        let lookup = self
            .connect
            .mc_project_get_issues_for_user(
                &self.credentials,
                ALL_PROJECTS,
                UserRelation::ReportedByMe.filter_type(),
                user,
                1,
                1,
            )
            .await;

        match lookup {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(error = %e, "User lookup failed");
                Ok(false)
            }
        }
    }

    /// List a page of issues of a project.
    ///
    /// A stored filter id selects that filter. A built-in user filter uses a
    /// per-user query when the instance supports it. Anything else lists all
    /// issues of the project.
    ///
    /// # Arguments
    ///
    /// * `project_id` - The project to list
    /// * `page` - The 1-based page number
    /// * `filter` - The filter to apply
    #[instrument(skip(self, filter), fields(filter = %filter))]
    pub async fn get_issues(
        &mut self,
        project_id: u64,
        page: u32,
        filter: &FilterId,
    ) -> Result<Vec<IssueData>> {
        let per_page = self.issues_per_page;

        if let FilterId::Stored(filter_id) = filter {
            return self
                .connect
                .mc_filter_get_issues(&self.credentials, project_id, *filter_id, page, per_page)
                .await;
        }

        if let Some(relation) = filter.user_relation() {
            if self.supports_user_queries().await? {
                let target = match relation {
                    UserRelation::Unassigned => AccountData::by_id(0),
                    _ => AccountData {
                        name: self.effective_username.clone(),
                        ..AccountData::default()
                    },
                };

                return self
                    .connect
                    .mc_project_get_issues_for_user(
                        &self.credentials,
                        project_id,
                        relation.filter_type(),
                        &target,
                        page,
                        per_page,
                    )
                    .await;
            }
            debug!("Per-user queries not supported, listing all issues");
        }

        self.connect
            .mc_project_get_issues(&self.credentials, project_id, page, per_page)
            .await
    }

    /// Create an issue and return its id.
    #[instrument(skip(self, issue))]
    pub async fn add_issue(&self, issue: &IssueData) -> Result<u64> {
        let issue_id = self.connect.mc_issue_add(&self.credentials, issue).await?;
        info!(issue_id, "Issue created");
        Ok(issue_id)
    }

    /// Get an issue by id.
    ///
    /// Custom fields, notes and attachments are always present, empty when
    /// the service omits them.
    #[instrument(skip(self))]
    pub async fn get_issue(&self, issue_id: u64) -> Result<IssueData> {
        self.connect.mc_issue_get(&self.credentials, issue_id).await
    }

    /// Update an issue.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::OperationFailed` if the service reports failure.
    #[instrument(skip(self, issue))]
    pub async fn update_issue(&self, issue_id: u64, issue: &IssueData) -> Result<()> {
        let updated = self
            .connect
            .mc_issue_update(&self.credentials, issue_id, issue)
            .await?;
        ensure(updated, || format!("Unable to update issue {}.", issue_id))
    }

    /// Delete an issue.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::OperationFailed` if the service reports failure.
    #[instrument(skip(self))]
    pub async fn delete_issue(&self, issue_id: u64) -> Result<()> {
        let deleted = self.connect.mc_issue_delete(&self.credentials, issue_id).await?;
        ensure(deleted, || format!("Unable to delete issue {}.", issue_id))
    }

    /// Add a note to an issue and return the note id.
    ///
    /// The view state is only sent when given.
    #[instrument(skip(self, text))]
    pub async fn add_note(
        &self,
        issue_id: u64,
        text: &str,
        view_state: Option<ObjectRef>,
    ) -> Result<u64> {
        let note = IssueNote {
            text: Some(text.to_string()),
            view_state,
            ..IssueNote::default()
        };
        self.connect
            .mc_issue_note_add(&self.credentials, issue_id, &note)
            .await
    }

    /// Replace the text of a note.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::OperationFailed` if the service reports failure.
    #[instrument(skip(self, text))]
    pub async fn update_note(&self, note_id: u64, text: &str) -> Result<()> {
        let note = IssueNote {
            id: Some(note_id),
            text: Some(text.to_string()),
            ..IssueNote::default()
        };
        let updated = self
            .connect
            .mc_issue_note_update(&self.credentials, &note)
            .await?;
        ensure(updated, || "Unable to update issue note.".to_string())
    }

    /// Delete a note.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::OperationFailed` if the service reports failure.
    #[instrument(skip(self))]
    pub async fn delete_note(&self, note_id: u64) -> Result<()> {
        let deleted = self
            .connect
            .mc_issue_note_delete(&self.credentials, note_id)
            .await?;
        ensure(deleted, || format!("Unable to delete issue note {}.", note_id))
    }

    /// Get a note of an issue, or `None` if the issue has no such note.
    #[instrument(skip(self))]
    pub async fn get_note(&self, issue_id: u64, note_id: u64) -> Result<Option<IssueNote>> {
        let issue = self.get_issue(issue_id).await?;
        Ok(issue.note(note_id).cloned())
    }

    /// Upload a file as an attachment of an issue and return its id.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Io` without contacting the service if the file
    /// cannot be read.
    #[instrument(skip(self, path))]
    pub async fn add_attachment(
        &self,
        issue_id: u64,
        name: &str,
        mime_type: &str,
        path: impl AsRef<Path> + Send,
    ) -> Result<u64> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = content.len(), "Uploading attachment");

        self.connect
            .mc_issue_attachment_add(&self.credentials, issue_id, name, mime_type, &content)
            .await
    }

    /// Get an attachment of an issue with its content, or `None` if the issue
    /// has no such attachment.
    #[instrument(skip(self))]
    pub async fn get_issue_attachment(
        &self,
        issue_id: u64,
        attachment_id: u64,
    ) -> Result<Option<AttachmentContent>> {
        let issue = self.get_issue(issue_id).await?;
        let Some(attachment) = issue.attachment(attachment_id).cloned() else {
            return Ok(None);
        };

        let content = self
            .connect
            .mc_issue_attachment_get(&self.credentials, attachment_id)
            .await?;

        Ok(Some(AttachmentContent {
            attachment,
            content,
        }))
    }

    /// Get the id of the user's default project.
    pub async fn get_default_project(&self) -> Result<u64> {
        let value = self.get_user_preference("default_project").await?;
        value.trim().parse::<u64>().map_err(|_| {
            ApiError::InvalidResponse(format!("default_project is not an id: '{}'", value))
        })
    }

    /// Get the user's language.
    pub async fn get_user_language(&self) -> Result<String> {
        self.get_user_preference("language").await
    }

    /// Apply the user's time zone.
    ///
    /// Uses the `timezone` preference, else the instance `default_timezone`,
    /// and falls back to `America/Los_Angeles` if the sink rejects the zone.
    /// Returns the zone applied. With the default sink this changes the time
    /// zone of the whole process.
    #[instrument(skip(self))]
    pub async fn set_time_zone(&self) -> Result<String> {
        let mut zone = self.get_user_preference("timezone").await?;

        if zone.trim().is_empty() {
            zone = self
                .get_config_string("default_timezone")
                .await
                .unwrap_or_default();
        }

        if self.time_zone.apply(&zone) {
            return Ok(zone);
        }

        warn!(zone = %zone, fallback = DEFAULT_TIME_ZONE, "Unsupported time zone");
        self.time_zone.apply(DEFAULT_TIME_ZONE);
        Ok(DEFAULT_TIME_ZONE.to_string())
    }

    async fn get_user_preference(&self, preference: &str) -> Result<String> {
        self.connect
            .mc_user_pref_get_pref(&self.credentials, PREFERENCE_PROJECT_ID, preference)
            .await
    }
}

impl<T: Transport> fmt::Debug for MantisClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MantisClient")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("issues_per_page", &self.issues_per_page)
            .field("mantis_version", &self.mantis_version)
            .field("effective_username", &self.effective_username)
            .finish_non_exhaustive()
    }
}

/// Turn a boolean result into `OperationFailed` when false.
fn ensure(success: bool, message: impl FnOnce() -> String) -> Result<()> {
    if success {
        Ok(())
    } else {
        Err(ApiError::OperationFailed(message()))
    }
}
