//! mantis-client - A typed async client for the MantisBT SOAP API
//!
//! This crate talks to the MantisConnect web service of a MantisBT instance
//! and exposes its remote procedures as typed methods on [`MantisClient`].
//!
//! ```no_run
//! use mantis_client::{FilterId, MantisClient};
//!
//! # async fn run() -> mantis_client::Result<()> {
//! let mut client = MantisClient::new("https://bugs.example.com", "alice", "token")?;
//! let user = client.authenticate().await?;
//! let issues = client.get_issues(1, 1, &FilterId::AssignedToMe).await?;
//! println!("{} has {} assigned issues", user.name, issues.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod logging;

pub use api::{
    ApiError, Credentials, Filter, FilterId, IssueData, IssueNote, MantisClient, ObjectRef,
    Project, Result, UserInfo,
};
pub use config::{ClientSettings, Config, Profile, ValidationMode};
