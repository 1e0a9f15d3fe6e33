//! MantisBT API client and types.
//!
//! This module provides the interface for communicating with the MantisConnect
//! SOAP web service of a MantisBT instance.

pub mod auth;
mod client;
pub mod endpoint;
mod error;
pub mod filters;
mod procedures;
mod projects;
mod soap;
pub mod timezone;
pub mod transport;
mod types;
pub mod version;

#[cfg(test)]
mod fake;

pub use auth::Credentials;
pub use client::MantisClient;
pub use endpoint::{resolve_endpoint, Endpoint};
pub use error::{ApiError, Result};
pub use filters::{Filter, FilterId, LabelResolver, UserRelation};
pub use projects::find_project;
pub use timezone::{ProcessTimeZone, TimeZoneSink};
pub use transport::{SoapTransport, Transport};
pub use types::{
    AccountData, Attachment, AttachmentContent, CustomFieldDefinition, CustomFieldValue,
    IssueData, IssueNote, ObjectRef, Project, ProjectVersion, StoredFilter, UserInfo,
};
