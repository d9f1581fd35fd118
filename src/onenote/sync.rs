//! One-way hierarchy reconciliation
//!
//! [`HierarchySync`] makes sure a designated notebook exists for the user and
//! that every course the user is enrolled in has a section of the same name
//! inside it, recording each course → section link in a [`MappingStore`].
//! It never deletes remote items or stale mappings.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::onenote::client::ResourceClient;
use crate::onenote::types::{ListTarget, RemoteItem};
use crate::session::Session;
use crate::storage::{CourseSectionMapping, MappingStore};

/// A host-application course a user is enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Host-application course id.
    pub id: String,
    /// Full course name, used verbatim as the section name.
    pub name: String,
}

impl Course {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Source of a user's current course enrollments.
pub trait CourseDirectory: Send + Sync {
    /// Courses `user_id` is enrolled in, in the order sections should be
    /// created.
    fn enrolled_courses(&self, user_id: &str) -> Result<Vec<Course>>;
}

/// A fixed enrollment list shared by every user.
#[derive(Debug, Default)]
pub struct StaticCourseDirectory {
    courses: Mutex<Vec<Course>>,
}

impl StaticCourseDirectory {
    pub fn new(courses: Vec<Course>) -> Self {
        Self {
            courses: Mutex::new(courses),
        }
    }

    /// Replaces the enrollment list.
    pub fn set_courses(&self, courses: Vec<Course>) {
        if let Ok(mut guard) = self.courses.lock() {
            *guard = courses;
        }
    }
}

impl CourseDirectory for StaticCourseDirectory {
    fn enrolled_courses(&self, _user_id: &str) -> Result<Vec<Course>> {
        let guard = self
            .courses
            .lock()
            .map_err(|_| anyhow::anyhow!("course directory lock poisoned"))?;
        Ok(guard.clone())
    }
}

/// Outcome of one reconciliation round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Id of the designated notebook, when it exists or was created.
    pub notebook_id: Option<String>,
    /// Whether the notebook was created in this round.
    pub notebook_created: bool,
    /// Number of sections created in this round.
    pub sections_created: usize,
    /// Number of mappings written in this round.
    pub mappings_recorded: usize,
}

/// Mirrors the user's courses as sections of one notebook.
pub struct HierarchySync {
    notebook_name: String,
    courses: Arc<dyn CourseDirectory>,
    mappings: Arc<dyn MappingStore>,
}

impl HierarchySync {
    /// Creates a sync targeting the notebook called `notebook_name`.
    pub fn new(
        notebook_name: impl Into<String>,
        courses: Arc<dyn CourseDirectory>,
        mappings: Arc<dyn MappingStore>,
    ) -> Self {
        Self {
            notebook_name: notebook_name.into(),
            courses,
            mappings,
        }
    }

    /// Name of the designated notebook.
    pub fn notebook_name(&self) -> &str {
        &self.notebook_name
    }

    /// Reconciles the remote hierarchy given the user's current notebooks.
    ///
    /// When the designated notebook is missing it is created together with
    /// one section per course.  Otherwise its sections are listed and only
    /// the sections whose name matches no course exactly are created.  A
    /// mapping is written for every course that ends up with a section.
    ///
    /// Failed creations are logged and skipped; the next round retries them.
    ///
    /// # Errors
    ///
    /// Returns course directory and mapping store failures, and transport
    /// failures while listing the notebook's sections.
    pub async fn reconcile(
        &self,
        client: &ResourceClient,
        session: &Session,
        notebooks: &[RemoteItem],
    ) -> Result<SyncReport> {
        let courses = self.courses.enrolled_courses(session.user_id())?;
        let mut report = SyncReport::default();

        let existing = notebooks.iter().find(|nb| nb.name == self.notebook_name);

        let (notebook_id, notebook_path, mut sections) = match existing {
            Some(notebook) => {
                let target = ListTarget::Sections {
                    notebook_id: notebook.id.clone(),
                };
                match client.fetch_items(session, &target, &notebook.path).await? {
                    Ok(sections) => (notebook.id.clone(), notebook.path.clone(), sections),
                    Err(failure) => {
                        tracing::warn!(%failure, "Could not list sections, skipping sync");
                        report.notebook_id = Some(notebook.id.clone());
                        return Ok(report);
                    }
                }
            }
            None => match self.create_notebook(client, session).await {
                Some(id) => {
                    report.notebook_created = true;
                    let path = format!("/{}", urlencoding::encode(&id));
                    (id, path, Vec::new())
                }
                None => return Ok(report),
            },
        };
        report.notebook_id = Some(notebook_id.clone());

        for course in &courses {
            let section_id = match sections.iter().find(|s| s.name == course.name) {
                Some(section) => section.id.clone(),
                None => match self
                    .create_section(client, session, &notebook_id, &notebook_path, course)
                    .await
                {
                    Some(section) => {
                        report.sections_created += 1;
                        let id = section.id.clone();
                        sections.push(section);
                        id
                    }
                    None => continue,
                },
            };

            self.mappings.upsert_mapping(&CourseSectionMapping {
                course_id: course.id.clone(),
                section_id,
                user_id: session.user_id().to_string(),
            })?;
            report.mappings_recorded += 1;
        }

        Ok(report)
    }

    async fn create_notebook(&self, client: &ResourceClient, session: &Session) -> Option<String> {
        match client.create_notebook(session, &self.notebook_name).await {
            Ok(Ok(id)) => {
                tracing::info!(notebook = %self.notebook_name, "Created notebook");
                Some(id)
            }
            Ok(Err(failure)) => {
                tracing::warn!(notebook = %self.notebook_name, %failure, "Notebook creation failed");
                None
            }
            Err(e) => {
                tracing::warn!(notebook = %self.notebook_name, "Notebook creation failed: {e:#}");
                None
            }
        }
    }

    async fn create_section(
        &self,
        client: &ResourceClient,
        session: &Session,
        notebook_id: &str,
        notebook_path: &str,
        course: &Course,
    ) -> Option<RemoteItem> {
        match client.create_section(session, notebook_id, &course.name).await {
            Ok(Ok(id)) => {
                tracing::info!(course = %course.id, section = %course.name, "Created section");
                Some(RemoteItem::created_section(
                    id,
                    course.name.clone(),
                    notebook_path,
                ))
            }
            Ok(Err(failure)) => {
                tracing::warn!(course = %course.id, %failure, "Section creation failed");
                None
            }
            Err(e) => {
                tracing::warn!(course = %course.id, "Section creation failed: {e:#}");
                None
            }
        }
    }
}
