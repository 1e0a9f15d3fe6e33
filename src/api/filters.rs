//! Issue list filters.
//!
//! Callers select issues either through a filter stored on the server
//! (numeric id) or through one of the built-in filters synthesized by the
//! client. Built-in filters other than `all` rely on per-user issue queries
//! and are only offered by MantisBT 1.2.16 and later.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Resolves a label key (e.g. `all_issues`) to display text.
pub type LabelResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A label resolver that returns the key unchanged.
pub fn identity_labels() -> LabelResolver {
    Arc::new(|key: &str| key.to_string())
}

/// Identifies the set of issues to list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterId {
    /// All issues of the project.
    #[default]
    All,
    /// Issues assigned to the authenticated user.
    AssignedToMe,
    /// Issues without a handler.
    Unassigned,
    /// Issues reported by the authenticated user.
    ReportedByMe,
    /// Issues monitored by the authenticated user.
    MonitoredByMe,
    /// A filter stored on the server.
    Stored(u64),
    /// Anything else; lists all issues.
    Other(String),
}

impl FilterId {
    /// The per-user relation queried for this filter, if it is a user filter.
    pub fn user_relation(&self) -> Option<UserRelation> {
        match self {
            FilterId::AssignedToMe => Some(UserRelation::AssignedToMe),
            FilterId::Unassigned => Some(UserRelation::Unassigned),
            FilterId::ReportedByMe => Some(UserRelation::ReportedByMe),
            FilterId::MonitoredByMe => Some(UserRelation::MonitoredByMe),
            _ => None,
        }
    }

    /// Label key used to look up the display name of a built-in filter.
    fn label_key(&self) -> Option<&'static str> {
        match self {
            FilterId::All => Some("all_issues"),
            FilterId::AssignedToMe => Some("assigned_to_me"),
            FilterId::Unassigned => Some("unassigned"),
            FilterId::ReportedByMe => Some("reported_by_me"),
            FilterId::MonitoredByMe => Some("monitored_by_me"),
            FilterId::Stored(_) | FilterId::Other(_) => None,
        }
    }
}

/// Parses a filter id.
///
/// Numeric text selects a stored filter, truncated to an integer (`"5.0"` and
/// `"5e0"` both select filter 5); values below 1 mean all issues and negative
/// numbers are kept as [`FilterId::Other`]. Keywords select built-in filters.
impl FromStr for FilterId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u64>() {
            return Ok(FilterId::from(id));
        }

        if let Ok(number) = s.parse::<f64>() {
            if number.is_finite() && number >= 0.0 && number < u64::MAX as f64 {
                return Ok(FilterId::from(number.trunc() as u64));
            }
        }

        Ok(match s {
            "all" => FilterId::All,
            "assigned_to_me" => FilterId::AssignedToMe,
            "unassigned" => FilterId::Unassigned,
            "reported_by_me" => FilterId::ReportedByMe,
            "monitored_by_me" => FilterId::MonitoredByMe,
            other => FilterId::Other(other.to_string()),
        })
    }
}

impl From<&str> for FilterId {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

impl From<u64> for FilterId {
    fn from(id: u64) -> Self {
        if id == 0 {
            FilterId::All
        } else {
            FilterId::Stored(id)
        }
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterId::All => write!(f, "all"),
            FilterId::AssignedToMe => write!(f, "assigned_to_me"),
            FilterId::Unassigned => write!(f, "unassigned"),
            FilterId::ReportedByMe => write!(f, "reported_by_me"),
            FilterId::MonitoredByMe => write!(f, "monitored_by_me"),
            FilterId::Stored(id) => write!(f, "{}", id),
            FilterId::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Relation between an issue and a user, as understood by
/// `mc_project_get_issues_for_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRelation {
    /// Handler is the current user.
    AssignedToMe,
    /// No handler.
    Unassigned,
    /// Reporter is the current user.
    ReportedByMe,
    /// Current user monitors the issue.
    MonitoredByMe,
}

impl UserRelation {
    /// The `filter_type` argument sent to the service.
    pub fn filter_type(self) -> &'static str {
        match self {
            UserRelation::AssignedToMe | UserRelation::Unassigned => "assigned",
            UserRelation::ReportedByMe => "reported",
            UserRelation::MonitoredByMe => "monitored",
        }
    }
}

/// A filter offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// The filter id.
    pub id: FilterId,
    /// The display name.
    pub name: String,
}

impl Filter {
    fn built_in(id: FilterId, labels: &LabelResolver) -> Self {
        let name = id.label_key().map(|key| labels(key)).unwrap_or_default();
        Self { id, name }
    }
}

/// Build the list of built-in filters.
///
/// `all` is always present. With per-user queries available, `unassigned`
/// is added, and for authenticated users `assigned_to_me`, `reported_by_me`
/// and `monitored_by_me` too. The order is fixed.
pub fn standard_filters(
    user_queries_supported: bool,
    anonymous: bool,
    labels: &LabelResolver,
) -> Vec<Filter> {
    let mut filters = vec![Filter::built_in(FilterId::All, labels)];

    if user_queries_supported {
        if !anonymous {
            filters.push(Filter::built_in(FilterId::AssignedToMe, labels));
        }

        filters.push(Filter::built_in(FilterId::Unassigned, labels));

        if !anonymous {
            filters.push(Filter::built_in(FilterId::ReportedByMe, labels));
            filters.push(Filter::built_in(FilterId::MonitoredByMe, labels));
        }
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(filters: &[Filter]) -> Vec<String> {
        filters.iter().map(|f| f.id.to_string()).collect()
    }

    #[test]
    fn test_parse_numeric_filter() {
        assert_eq!(FilterId::from("5"), FilterId::Stored(5));
        assert_eq!(FilterId::from(" 12 "), FilterId::Stored(12));
        assert_eq!(FilterId::from("0"), FilterId::All);
        assert_eq!(FilterId::from(7u64), FilterId::Stored(7));
    }

    #[test]
    fn test_parse_keyword_filters() {
        assert_eq!(FilterId::from("assigned_to_me"), FilterId::AssignedToMe);
        assert_eq!(FilterId::from("unassigned"), FilterId::Unassigned);
        assert_eq!(FilterId::from("reported_by_me"), FilterId::ReportedByMe);
        assert_eq!(FilterId::from("monitored_by_me"), FilterId::MonitoredByMe);
        assert_eq!(FilterId::from("all"), FilterId::All);
    }

    #[test]
    fn test_parse_fractional_numeric_filter() {
        assert_eq!(FilterId::from("5.0"), FilterId::Stored(5));
        assert_eq!(FilterId::from("7.9"), FilterId::Stored(7));
        assert_eq!(FilterId::from("2e1"), FilterId::Stored(20));
        assert_eq!(FilterId::from("0.5"), FilterId::All);
        assert_eq!(FilterId::from("inf"), FilterId::Other("inf".to_string()));
        assert_eq!(FilterId::from("-2.5"), FilterId::Other("-2.5".to_string()));
    }

    #[test]
    fn test_parse_unknown_filters() {
        assert_eq!(FilterId::from("-3"), FilterId::Other("-3".to_string()));
        assert_eq!(
            FilterId::from("starred"),
            FilterId::Other("starred".to_string())
        );
    }

    #[test]
    fn test_user_relation_filter_types() {
        assert_eq!(UserRelation::AssignedToMe.filter_type(), "assigned");
        assert_eq!(UserRelation::Unassigned.filter_type(), "assigned");
        assert_eq!(UserRelation::ReportedByMe.filter_type(), "reported");
        assert_eq!(UserRelation::MonitoredByMe.filter_type(), "monitored");
        assert!(FilterId::Stored(3).user_relation().is_none());
    }

    #[test]
    fn test_standard_filters_authenticated() {
        let filters = standard_filters(true, false, &identity_labels());
        assert_eq!(
            ids(&filters),
            vec![
                "all",
                "assigned_to_me",
                "unassigned",
                "reported_by_me",
                "monitored_by_me"
            ]
        );
        assert_eq!(filters[0].name, "all_issues");
    }

    #[test]
    fn test_standard_filters_anonymous() {
        let filters = standard_filters(true, true, &identity_labels());
        assert_eq!(ids(&filters), vec!["all", "unassigned"]);
    }

    #[test]
    fn test_standard_filters_old_version() {
        assert_eq!(ids(&standard_filters(false, false, &identity_labels())), vec!["all"]);
        assert_eq!(ids(&standard_filters(false, true, &identity_labels())), vec!["all"]);
    }

    #[test]
    fn test_standard_filters_use_label_resolver() {
        let labels: LabelResolver = Arc::new(|key: &str| format!("[{}]", key));
        let filters = standard_filters(true, false, &labels);
        assert_eq!(filters[0].name, "[all_issues]");
        assert_eq!(filters[4].name, "[monitored_by_me]");
    }
}
