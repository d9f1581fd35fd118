use serde::{Deserialize, Serialize};

/// Link between a local course and the remote section mirroring it
///
/// One row exists per (course, user); recording the same pair again
/// overwrites the section id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSectionMapping {
    /// Host-application course identifier
    pub course_id: String,
    /// Remote section id
    pub section_id: String,
    /// Host-application user identity
    pub user_id: String,
}
