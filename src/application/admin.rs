use serde::Serialize;
use std::sync::Arc;

use super::AppResult;
use crate::domain::*;
use crate::ports::{CategoryRepository, ProfileRepository, ProjectQuery, ProjectRepository};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "lowercase")]
pub enum MigrationOutcome {
    Migrated,
    Skipped,
    Errored(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub outcomes: Vec<(ProjectId, MigrationOutcome)>,
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl MigrationReport {
    fn record(&mut self, id: ProjectId, outcome: MigrationOutcome) {
        self.total += 1;
        match &outcome {
            MigrationOutcome::Migrated => self.migrated += 1,
            MigrationOutcome::Skipped => self.skipped += 1,
            MigrationOutcome::Errored(_) => self.errored += 1,
        }
        self.outcomes.push((id, outcome));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PurgeReport {
    pub projects_deleted: usize,
    pub categories_deleted: usize,
    pub profile_deleted: bool,
    pub failures: Vec<String>,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One-off maintenance operations. Both run row by row with no rollback.
pub struct AdminService {
    projects: Arc<dyn ProjectRepository>,
    categories: Arc<dyn CategoryRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl AdminService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        categories: Arc<dyn CategoryRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            projects,
            categories,
            profiles,
        }
    }

    /// Rewrite every legacy free-text notes column as a one-entry list.
    pub async fn migrate_project_notes(&self) -> AppResult<MigrationReport> {
        let rows = self.projects.list_projects(&ProjectQuery::default()).await?;
        tracing::info!("Checking {} projects for legacy notes", rows.len());

        let mut report = MigrationReport::default();
        for project in rows {
            let StoredNotes::LegacyNote(_) = &project.comments else {
                report.record(project.id, MigrationOutcome::Skipped);
                continue;
            };

            let notes = project.notes();
            match self
                .projects
                .update_project(&project.id, &ProjectUpdate::comments(notes))
                .await
            {
                Ok(_) => {
                    tracing::debug!("Migrated notes for project {}", project.id);
                    report.record(project.id, MigrationOutcome::Migrated);
                }
                Err(e) => {
                    tracing::warn!("Failed to migrate notes for project {}: {}", project.id, e);
                    report.record(project.id, MigrationOutcome::Errored(e.to_string()));
                }
            }
        }

        tracing::info!(
            "Notes migration finished: {} migrated, {} skipped, {} errored",
            report.migrated,
            report.skipped,
            report.errored
        );
        Ok(report)
    }

    /// Delete everything the user owns: projects, then custom categories,
    /// then the profile row.
    pub async fn purge_user_data(&self, owner: &UserId) -> AppResult<PurgeReport> {
        let mut report = PurgeReport::default();

        let projects = self.projects.list_projects(&ProjectQuery::owned_by(owner)).await?;
        for project in projects.iter().filter(|p| &p.user_id == owner) {
            match self.projects.delete_project(&project.id).await {
                Ok(()) => report.projects_deleted += 1,
                Err(e) => report.failures.push(format!("project {}: {}", project.id, e)),
            }
        }

        match self.categories.list_categories(owner).await {
            Ok(categories) => {
                for category in categories {
                    match self.categories.delete_category(owner, &category.id).await {
                        Ok(()) => report.categories_deleted += 1,
                        Err(e) => report.failures.push(format!("category {}: {}", category.id, e)),
                    }
                }
            }
            Err(e) => report.failures.push(format!("categories: {e}")),
        }

        match self.profiles.delete_profile(owner).await {
            Ok(()) => report.profile_deleted = true,
            Err(e) => report.failures.push(format!("profile: {e}")),
        }

        if report.is_complete() {
            tracing::info!("Purged all data for {}", owner);
        } else {
            tracing::warn!("Purge for {} left {} failures", owner, report.failures.len());
        }
        Ok(report)
    }
}
