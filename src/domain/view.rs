//! Derived project views.
//!
//! Pure functions over an in-memory project list. The dashboard uses a
//! single-category, single-tag filter and always floats `started` projects to
//! the top; the browse view adds text search, multi-select filters and a
//! configurable multi-tag match.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::category::ALL_CATEGORIES;
use super::error::DomainError;
use super::project::{Project, ProjectStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(value.to_string())
        }
    }

    pub fn matches(&self, project: &Project) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => project.category.as_deref() == Some(category.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CategoryFilter::All => ALL_CATEGORIES,
            CategoryFilter::Only(category) => category,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub category: CategoryFilter,
    pub tag: Option<String>,
    pub show_archived: bool,
}

/// How a multi-tag selection is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseFilter {
    pub search: String,
    pub statuses: Vec<ProjectStatus>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub tag_match: TagMatch,
    pub show_archived: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    #[default]
    CreatedAt,
    Status,
    Priority,
    Category,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Name,
        SortKey::CreatedAt,
        SortKey::Status,
        SortKey::Priority,
        SortKey::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::CreatedAt => "created_at",
            SortKey::Status => "status",
            SortKey::Priority => "priority",
            SortKey::Category => "category",
        }
    }

    pub fn next(&self) -> Self {
        let index = Self::ALL.iter().position(|k| k == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "created_at" | "created" | "date" => Ok(SortKey::CreatedAt),
            "status" => Ok(SortKey::Status),
            "priority" => Ok(SortKey::Priority),
            "category" => Ok(SortKey::Category),
            _ => Err(DomainError::InvalidSortKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Asc)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }
}

/// Abandoned projects stay hidden unless archives are shown.
pub fn is_visible(project: &Project, show_archived: bool) -> bool {
    show_archived || !project.is_archived()
}

/// Case-insensitive substring match on name and description.
pub fn matches_search(project: &Project, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    project.name.to_lowercase().contains(&query)
        || project
            .description
            .as_deref()
            .map(|d| d.to_lowercase().contains(&query))
            .unwrap_or(false)
}

/// Inclusion-list match; an empty selection matches everything.
pub fn matches_statuses(project: &Project, statuses: &[ProjectStatus]) -> bool {
    statuses.is_empty() || statuses.contains(&project.status)
}

pub fn matches_categories(project: &Project, categories: &[String]) -> bool {
    categories.is_empty()
        || project
            .category
            .as_ref()
            .map(|c| categories.contains(c))
            .unwrap_or(false)
}

/// Passes when the project carries at least one selected tag.
pub fn matches_any_tag(project: &Project, tags: &[String]) -> bool {
    tags.is_empty() || tags.iter().any(|tag| project.has_tag(tag))
}

/// Passes when the project carries every selected tag.
pub fn matches_all_tags(project: &Project, tags: &[String]) -> bool {
    tags.iter().all(|tag| project.has_tag(tag))
}

pub fn matches_dashboard(project: &Project, filter: &DashboardFilter) -> bool {
    is_visible(project, filter.show_archived)
        && filter.category.matches(project)
        && filter
            .tag
            .as_deref()
            .map(|tag| project.has_tag(tag))
            .unwrap_or(true)
}

pub fn matches_browse(project: &Project, filter: &BrowseFilter) -> bool {
    let tags_match = match filter.tag_match {
        TagMatch::Any => matches_any_tag(project, &filter.tags),
        TagMatch::All => matches_all_tags(project, &filter.tags),
    };

    is_visible(project, filter.show_archived)
        && matches_search(project, &filter.search)
        && matches_statuses(project, &filter.statuses)
        && matches_categories(project, &filter.categories)
        && tags_match
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// Missing values come first.
fn compare_optional<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: FnOnce(T, T) -> Ordering,
{
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp(a, b),
    }
}

/// Order two projects by `spec`. Descending is the exact reverse of
/// ascending, so missing values end up last.
pub fn compare_projects(a: &Project, b: &Project, spec: SortSpec) -> Ordering {
    let ascending = match spec.key {
        SortKey::Name => compare_text(&a.name, &b.name),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Status => a.status.rank().cmp(&b.status.rank()),
        SortKey::Priority => compare_optional(a.priority, b.priority, |a, b| a.rank().cmp(&b.rank())),
        SortKey::Category => {
            compare_optional(a.category.as_deref(), b.category.as_deref(), compare_text)
        }
    };

    match spec.order {
        SortOrder::Asc => ascending,
        SortOrder::Desc => ascending.reverse(),
    }
}

pub fn sort_projects(projects: &mut [&Project], spec: SortSpec) {
    projects.sort_by(|a, b| compare_projects(a, b, spec));
}

/// Dashboard order: `started` first, then `sort` if given, then newest first.
pub fn compare_dashboard(a: &Project, b: &Project, sort: Option<SortSpec>) -> Ordering {
    let a_started = a.status == ProjectStatus::Started;
    let b_started = b.status == ProjectStatus::Started;

    b_started
        .cmp(&a_started)
        .then_with(|| {
            sort.map(|spec| compare_projects(a, b, spec))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| b.created_at.cmp(&a.created_at))
}

pub fn dashboard_view<'a>(
    projects: &'a [Project],
    filter: &DashboardFilter,
    sort: Option<SortSpec>,
) -> Vec<&'a Project> {
    let mut view: Vec<&Project> = projects
        .iter()
        .filter(|p| matches_dashboard(p, filter))
        .collect();
    view.sort_by(|a, b| compare_dashboard(a, b, sort));
    view
}

pub fn browse_view<'a>(
    projects: &'a [Project],
    filter: &BrowseFilter,
    sort: SortSpec,
) -> Vec<&'a Project> {
    let mut view: Vec<&Project> = projects
        .iter()
        .filter(|p| matches_browse(p, filter))
        .collect();
    sort_projects(&mut view, sort);
    view
}

/// Every distinct tag across `projects`, sorted case-insensitively.
pub fn available_tags(projects: &[Project]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in projects.iter().flat_map(|p| p.tags.iter()) {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }
    tags.sort_by(|a, b| compare_text(a, b));
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, ProjectId, StoredNotes, UserId};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn project(id: &str, name: &str, status: ProjectStatus, created: i64) -> Project {
        Project {
            id: ProjectId(id.into()),
            user_id: UserId("owner".into()),
            name: name.into(),
            description: None,
            status,
            priority: None,
            category: None,
            tags: Vec::new(),
            link: None,
            comments: StoredNotes::Empty,
            share_token: None,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    fn ids(view: &[&Project]) -> Vec<String> {
        view.iter().map(|p| p.id.0.clone()).collect()
    }

    fn one_of_each_status() -> Vec<Project> {
        vec![
            project("c", "Concept", ProjectStatus::Concept, 1),
            project("s", "Started", ProjectStatus::Started, 2),
            project("d", "Done", ProjectStatus::Completed, 3),
            project("a", "Abandoned", ProjectStatus::Abandoned, 4),
        ]
    }

    #[test]
    fn test_archive_visibility() {
        let projects = one_of_each_status();

        let hidden = dashboard_view(&projects, &DashboardFilter::default(), None);
        let mut hidden_ids = ids(&hidden);
        hidden_ids.sort();
        assert_eq!(hidden_ids, vec!["c", "d", "s"]);

        let filter = DashboardFilter {
            show_archived: true,
            ..Default::default()
        };
        assert_eq!(dashboard_view(&projects, &filter, None).len(), 4);
    }

    #[test]
    fn test_sort_created_at_descending() {
        let projects = vec![
            project("t1", "a", ProjectStatus::Concept, 1),
            project("t3", "b", ProjectStatus::Concept, 3),
            project("t2", "c", ProjectStatus::Concept, 2),
        ];
        let view = browse_view(
            &projects,
            &BrowseFilter::default(),
            SortSpec::new(SortKey::CreatedAt, SortOrder::Desc),
        );
        assert_eq!(ids(&view), vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn test_sort_name_is_case_insensitive() {
        let projects = vec![
            project("b", "banana", ProjectStatus::Concept, 1),
            project("a", "Apple", ProjectStatus::Concept, 2),
            project("c", "cherry", ProjectStatus::Concept, 3),
        ];
        let view = browse_view(
            &projects,
            &BrowseFilter::default(),
            SortSpec::new(SortKey::Name, SortOrder::Asc),
        );
        assert_eq!(ids(&view), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_values_first_ascending_last_descending() {
        let mut with = project("with", "x", ProjectStatus::Concept, 1);
        with.priority = Some(Priority::Low);
        with.category = Some("web".into());
        let without = project("without", "y", ProjectStatus::Concept, 2);
        let projects = vec![with, without];

        for key in [SortKey::Priority, SortKey::Category] {
            let asc = browse_view(&projects, &BrowseFilter::default(), SortSpec::new(key, SortOrder::Asc));
            assert_eq!(ids(&asc), vec!["without", "with"], "{key} asc");
            let desc = browse_view(&projects, &BrowseFilter::default(), SortSpec::new(key, SortOrder::Desc));
            assert_eq!(ids(&desc), vec!["with", "without"], "{key} desc");
        }
    }

    #[test]
    fn test_sort_by_status_and_priority_rank() {
        let mut high = project("high", "h", ProjectStatus::Completed, 1);
        high.priority = Some(Priority::High);
        let mut low = project("low", "l", ProjectStatus::Concept, 2);
        low.priority = Some(Priority::Low);
        let mut medium = project("medium", "m", ProjectStatus::Started, 3);
        medium.priority = Some(Priority::Medium);
        let projects = vec![high, low, medium];

        let by_priority = browse_view(
            &projects,
            &BrowseFilter::default(),
            SortSpec::new(SortKey::Priority, SortOrder::Desc),
        );
        assert_eq!(ids(&by_priority), vec!["high", "medium", "low"]);

        let by_status = browse_view(
            &projects,
            &BrowseFilter::default(),
            SortSpec::new(SortKey::Status, SortOrder::Asc),
        );
        assert_eq!(ids(&by_status), vec!["low", "medium", "high"]);
    }

    #[test]
    fn test_dashboard_puts_started_first() {
        let projects = vec![
            project("A", "A", ProjectStatus::Concept, 10),
            project("B", "B", ProjectStatus::Started, 5),
        ];
        let view = dashboard_view(&projects, &DashboardFilter::default(), None);
        assert_eq!(ids(&view), vec!["B", "A"]);

        let by_name = dashboard_view(
            &projects,
            &DashboardFilter::default(),
            Some(SortSpec::new(SortKey::Name, SortOrder::Asc)),
        );
        assert_eq!(ids(&by_name), vec!["B", "A"]);
    }

    #[test]
    fn test_dashboard_falls_back_to_newest_first() {
        let projects = vec![
            project("old", "x", ProjectStatus::Concept, 1),
            project("new", "x", ProjectStatus::Completed, 9),
            project("mid", "x", ProjectStatus::Concept, 5),
        ];
        let view = dashboard_view(&projects, &DashboardFilter::default(), None);
        assert_eq!(ids(&view), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_dashboard_category_and_tag_filters() {
        let mut web = project("web", "w", ProjectStatus::Concept, 1);
        web.category = Some("web".into());
        web.tags = vec!["rust".into()];
        let mut game = project("game", "g", ProjectStatus::Concept, 2);
        game.category = Some("game".into());
        game.tags = vec!["rust".into(), "bevy".into()];
        let projects = vec![web, game];

        let filter = DashboardFilter {
            category: CategoryFilter::parse("web"),
            ..Default::default()
        };
        assert_eq!(ids(&dashboard_view(&projects, &filter, None)), vec!["web"]);

        let filter = DashboardFilter {
            category: CategoryFilter::parse(ALL_CATEGORIES),
            tag: Some("bevy".into()),
            show_archived: false,
        };
        assert_eq!(ids(&dashboard_view(&projects, &filter, None)), vec!["game"]);
    }

    #[test]
    fn test_search_matches_name_and_description() {
        let mut p = project("p", "Task Force", ProjectStatus::Concept, 1);
        p.description = Some("Tracks SIDE projects".into());
        assert!(matches_search(&p, "force"));
        assert!(matches_search(&p, "side"));
        assert!(matches_search(&p, "  "));
        assert!(!matches_search(&p, "monitor"));
    }

    #[test]
    fn test_multiselect_empty_means_all() {
        let mut p = project("p", "x", ProjectStatus::Completed, 1);
        p.category = Some("web".into());
        assert!(matches_statuses(&p, &[]));
        assert!(matches_statuses(&p, &[ProjectStatus::Completed, ProjectStatus::Started]));
        assert!(!matches_statuses(&p, &[ProjectStatus::Started]));
        assert!(matches_categories(&p, &[]));
        assert!(!matches_categories(&p, &["game".to_string()]));
    }

    #[test]
    fn test_any_versus_all_tag_semantics() {
        let mut p = project("p", "x", ProjectStatus::Concept, 1);
        p.tags = vec!["rust".into(), "cli".into()];
        let selection = vec!["rust".to_string(), "web".to_string()];

        assert!(matches_any_tag(&p, &selection));
        assert!(!matches_all_tags(&p, &selection));
        assert!(matches_all_tags(&p, &["rust".to_string(), "cli".to_string()]));
        assert!(matches_any_tag(&p, &[]));
        assert!(matches_all_tags(&p, &[]));

        let projects = vec![p];
        let mut filter = BrowseFilter {
            tags: selection,
            ..Default::default()
        };
        assert_eq!(browse_view(&projects, &filter, SortSpec::default()).len(), 1);
        filter.tag_match = TagMatch::All;
        assert!(browse_view(&projects, &filter, SortSpec::default()).is_empty());
    }

    #[test]
    fn test_available_tags_sorted_case_insensitively() {
        let mut a = project("a", "a", ProjectStatus::Concept, 1);
        a.tags = vec!["zeta".into(), "Alpha".into()];
        let mut b = project("b", "b", ProjectStatus::Concept, 2);
        b.tags = vec!["beta".into(), "zeta".into()];
        assert_eq!(available_tags(&[a, b]), vec!["Alpha", "beta", "zeta"]);
    }
}
