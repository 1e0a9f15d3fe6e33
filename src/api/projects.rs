//! Lookup in the project tree.

use super::types::Project;

/// Find a project by id, depth-first, returning the first match.
///
/// Subprojects of a node are searched right after the node itself, before
/// its siblings.
pub fn find_project(projects: &[Project], project_id: u64) -> Option<&Project> {
    for project in projects {
        if project.id == project_id {
            return Some(project);
        }

        if !project.subprojects.is_empty() {
            if let Some(found) = find_project(&project.subprojects, project_id) {
                return Some(found);
            }
        }
    }

    None
}
