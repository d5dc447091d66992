use color_eyre::Result;
use std::sync::Arc;

use super::{
    event::{AppEvent, EventHandler},
    widgets::SearchBar,
};
use crate::application::StateManager;
use crate::domain::{
    available_tags, dashboard_view, matches_search, Category, CategoryFilter, DashboardFilter,
    NoteEntry, Priority, Project, ProjectStatus, SortKey, SortOrder, SortSpec,
};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
};

#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Main,
    Help,
    NoteInput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusedPane {
    Search,
    ProjectList,
    Details,
    Notes,
}

impl FocusedPane {
    const ORDER: [FocusedPane; 4] = [
        FocusedPane::Search,
        FocusedPane::ProjectList,
        FocusedPane::Details,
        FocusedPane::Notes,
    ];

    fn next(self) -> Self {
        let index = Self::ORDER.iter().position(|p| *p == self).unwrap_or(0);
        Self::ORDER[(index + 1) % Self::ORDER.len()]
    }

    fn previous(self) -> Self {
        let index = Self::ORDER.iter().position(|p| *p == self).unwrap_or(0);
        Self::ORDER[(index + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Dashboard projects narrowed by the free-text search.
pub fn visible_projects(
    projects: &[Project],
    filter: &DashboardFilter,
    sort: Option<SortSpec>,
    query: &str,
) -> Vec<Project> {
    dashboard_view(projects, filter, sort)
        .into_iter()
        .filter(|p| matches_search(p, query))
        .cloned()
        .collect()
}

/// Step through `options` with a leading "nothing selected" slot.
fn cycle_option(options: &[String], current: Option<&str>) -> Option<String> {
    let next_index = match current {
        None => 0,
        Some(value) => match options.iter().position(|o| o == value) {
            Some(i) => i + 1,
            None => 0,
        },
    };
    options.get(next_index).cloned()
}

fn next_sort(sort: Option<SortSpec>) -> Option<SortSpec> {
    match sort {
        None => Some(SortSpec::new(SortKey::ALL[0], SortOrder::Asc)),
        Some(spec) if spec.key == SortKey::ALL[SortKey::ALL.len() - 1] => None,
        Some(spec) => Some(SortSpec::new(spec.key.next(), spec.order)),
    }
}

pub struct App {
    state_manager: Arc<StateManager>,

    mode: AppMode,
    focused_pane: FocusedPane,

    search_bar: SearchBar,
    note_input: SearchBar,

    // Everything the user owns; the table shows `visible`.
    projects: Vec<Project>,
    visible: Vec<Project>,
    project_list_state: TableState,

    categories: Vec<Category>,
    filter: DashboardFilter,
    sort: Option<SortSpec>,

    selected_note: usize,
    details_scroll: u16,

    is_loading: bool,
    error_message: Option<String>,
    status_message: Option<String>,
}

impl App {
    pub fn new(state_manager: Arc<StateManager>, show_archived: bool, default_sort: SortSpec) -> Self {
        let mut app = Self {
            state_manager,
            mode: AppMode::Main,
            focused_pane: FocusedPane::ProjectList,
            search_bar: SearchBar::new("Search", "Type / to search projects..."),
            note_input: SearchBar::new("New note", "Type a note, Enter to save, Esc to cancel"),
            projects: Vec::new(),
            visible: Vec::new(),
            project_list_state: TableState::default(),
            categories: Vec::new(),
            filter: DashboardFilter {
                show_archived,
                ..Default::default()
            },
            sort: Some(default_sort),
            selected_note: 0,
            details_scroll: 0,
            is_loading: false,
            error_message: None,
            status_message: None,
        };
        app.project_list_state.select(Some(0));
        app
    }

    pub async fn initialize(&mut self) -> Result<()> {
        if self.state_manager.start().await?.is_none() {
            return Err(color_eyre::eyre::eyre!(
                "Not signed in. Run `tfm login` first."
            ));
        }
        self.categories = self.state_manager.cached_categories().await;
        self.load_projects(true).await;
        Ok(())
    }

    async fn load_projects(&mut self, use_cache: bool) {
        self.is_loading = true;
        self.error_message = None;

        match self.state_manager.projects(use_cache).await {
            Ok(projects) => {
                self.projects = projects;
                self.update_visible();
            }
            Err(e) => {
                tracing::error!("Failed to load projects: {}", e);
                self.error_message = Some(format!("Failed to load projects: {e}"));
            }
        }

        if let Ok(categories) = self.state_manager.categories().await {
            self.categories = categories;
        }

        self.is_loading = false;
    }

    fn update_visible(&mut self) {
        let selected_id = self.selected_project().map(|p| p.id.clone());
        self.visible = visible_projects(&self.projects, &self.filter, self.sort, self.search_bar.query());

        let index = selected_id
            .and_then(|id| self.visible.iter().position(|p| p.id == id))
            .unwrap_or(0);
        if self.visible.is_empty() {
            self.project_list_state.select(None);
        } else {
            self.project_list_state.select(Some(index.min(self.visible.len() - 1)));
        }
    }

    fn selected_project(&self) -> Option<&Project> {
        self.project_list_state
            .selected()
            .and_then(|i| self.visible.get(i))
    }

    fn selected_notes(&self) -> Vec<NoteEntry> {
        self.selected_project().map(|p| p.notes()).unwrap_or_default()
    }

    /// Put a fresh copy of `project` in both lists.
    fn replace_project(&mut self, project: Project) {
        if let Some(existing) = self.projects.iter_mut().find(|p| p.id == project.id) {
            *existing = project;
        }
        self.update_visible();
    }

    fn select_next(&mut self) {
        match self.focused_pane {
            FocusedPane::ProjectList => {
                if self.visible.is_empty() {
                    return;
                }
                let i = match self.project_list_state.selected() {
                    Some(i) if i + 1 < self.visible.len() => i + 1,
                    Some(i) => i,
                    None => 0,
                };
                self.select_index(i);
            }
            FocusedPane::Details => self.details_scroll = self.details_scroll.saturating_add(1),
            FocusedPane::Notes => {
                let count = self.selected_notes().len();
                if self.selected_note + 1 < count {
                    self.selected_note += 1;
                }
            }
            FocusedPane::Search => {}
        }
    }

    fn select_previous(&mut self) {
        match self.focused_pane {
            FocusedPane::ProjectList => {
                let i = self.project_list_state.selected().unwrap_or(0).saturating_sub(1);
                self.select_index(i);
            }
            FocusedPane::Details => self.details_scroll = self.details_scroll.saturating_sub(1),
            FocusedPane::Notes => self.selected_note = self.selected_note.saturating_sub(1),
            FocusedPane::Search => {}
        }
    }

    fn select_index(&mut self, index: usize) {
        if self.visible.is_empty() {
            return;
        }
        let index = index.min(self.visible.len() - 1);
        if self.project_list_state.selected() != Some(index) {
            self.selected_note = 0;
            self.details_scroll = 0;
        }
        self.project_list_state.select(Some(index));
    }

    fn focus(&mut self, pane: FocusedPane) {
        self.focused_pane = pane;
        self.search_bar.set_focused(pane == FocusedPane::Search);
    }

    /// Returns `true` when the app should exit.
    pub async fn handle_event(&mut self, event: AppEvent) -> Result<bool> {
        if event == AppEvent::Quit {
            return Ok(true);
        }

        match self.mode {
            AppMode::Help => {
                // Any key closes help.
                self.mode = AppMode::Main;
                return Ok(false);
            }
            AppMode::NoteInput => {
                self.handle_note_input(event).await;
                return Ok(false);
            }
            AppMode::Main => {}
        }

        if self.focused_pane == FocusedPane::Search {
            return self.handle_search_input(event);
        }

        match event {
            AppEvent::ShowHelp => self.mode = AppMode::Help,
            AppEvent::FocusSearch => self.focus(FocusedPane::Search),
            AppEvent::Tab => self.focus(self.focused_pane.next()),
            AppEvent::BackTab => self.focus(self.focused_pane.previous()),
            AppEvent::NextItem => self.select_next(),
            AppEvent::PreviousItem => self.select_previous(),
            AppEvent::PageDown => {
                for _ in 0..10 {
                    self.select_next();
                }
            }
            AppEvent::PageUp => {
                for _ in 0..10 {
                    self.select_previous();
                }
            }
            AppEvent::CloseModal => {
                self.error_message = None;
                self.status_message = None;
            }
            AppEvent::Enter if self.focused_pane == FocusedPane::ProjectList => {
                self.focus(FocusedPane::Details);
            }
            AppEvent::Character(c) => return self.handle_command(c).await,
            _ => {}
        }

        Ok(false)
    }

    fn handle_search_input(&mut self, event: AppEvent) -> Result<bool> {
        match event {
            AppEvent::Character(c) => {
                self.search_bar.insert_char(c);
                self.update_visible();
            }
            AppEvent::FocusSearch => {
                self.search_bar.insert_char('/');
                self.update_visible();
            }
            AppEvent::Backspace => {
                self.search_bar.delete_char();
                self.update_visible();
            }
            AppEvent::Delete => {
                self.search_bar.delete_forward();
                self.update_visible();
            }
            AppEvent::CloseModal => {
                self.search_bar.clear();
                self.update_visible();
                self.focus(FocusedPane::ProjectList);
            }
            AppEvent::Enter | AppEvent::Tab | AppEvent::NextItem => {
                self.focus(FocusedPane::ProjectList)
            }
            AppEvent::BackTab => self.focus(FocusedPane::Notes),
            _ => {}
        }
        Ok(false)
    }

    async fn handle_note_input(&mut self, event: AppEvent) {
        match event {
            AppEvent::Character(c) => self.note_input.insert_char(c),
            AppEvent::FocusSearch => self.note_input.insert_char('/'),
            AppEvent::Backspace => self.note_input.delete_char(),
            AppEvent::Delete => self.note_input.delete_forward(),
            AppEvent::CloseModal => {
                self.note_input.clear();
                self.mode = AppMode::Main;
            }
            AppEvent::Enter => {
                let text = self.note_input.take();
                self.mode = AppMode::Main;
                self.add_note(&text).await;
            }
            _ => {}
        }
    }

    async fn handle_command(&mut self, c: char) -> Result<bool> {
        match c {
            'q' => return Ok(true),
            '?' => self.mode = AppMode::Help,
            'j' => self.select_next(),
            'k' => self.select_previous(),
            'g' => match self.focused_pane {
                FocusedPane::Details => self.details_scroll = 0,
                FocusedPane::Notes => self.selected_note = 0,
                _ => self.select_index(0),
            },
            'G' => match self.focused_pane {
                FocusedPane::Notes => {
                    self.selected_note = self.selected_notes().len().saturating_sub(1)
                }
                FocusedPane::Details => {}
                _ => self.select_index(self.visible.len().saturating_sub(1)),
            },
            'r' => {
                self.load_projects(false).await;
                self.status_message = Some("Refreshed".into());
            }
            's' => self.cycle_status().await,
            'c' => {
                let ids: Vec<String> = self.categories.iter().map(|c| c.id.0.clone()).collect();
                let current = match &self.filter.category {
                    CategoryFilter::All => None,
                    CategoryFilter::Only(id) => Some(id.as_str()),
                };
                self.filter.category = match cycle_option(&ids, current) {
                    Some(id) => CategoryFilter::Only(id),
                    None => CategoryFilter::All,
                };
                self.update_visible();
            }
            't' => {
                let tags = available_tags(&self.projects);
                self.filter.tag = cycle_option(&tags, self.filter.tag.as_deref());
                self.update_visible();
            }
            'a' => {
                self.filter.show_archived = !self.filter.show_archived;
                self.update_visible();
            }
            'o' => {
                self.sort = next_sort(self.sort);
                self.update_visible();
            }
            'O' => {
                if let Some(spec) = self.sort.as_mut() {
                    spec.order = spec.order.toggled();
                    self.update_visible();
                }
            }
            'n' => {
                if self.selected_project().is_some() {
                    self.note_input.clear();
                    self.note_input.set_focused(true);
                    self.mode = AppMode::NoteInput;
                }
            }
            'x' if self.focused_pane == FocusedPane::Notes => self.delete_selected_note().await,
            _ => {}
        }
        Ok(false)
    }

    async fn cycle_status(&mut self) {
        let Some(project) = self.selected_project() else {
            return;
        };
        let id = project.id.clone();
        let next = project.status.next();

        match self.state_manager.set_status(&id, next).await {
            Ok(updated) => {
                self.status_message = Some(format!("{} is now {}", updated.name, next.label()));
                self.replace_project(updated);
            }
            Err(e) => self.error_message = Some(format!("Failed to update status: {e}")),
        }
    }

    async fn add_note(&mut self, text: &str) {
        let Some(id) = self.selected_project().map(|p| p.id.clone()) else {
            return;
        };

        match self.state_manager.add_note(&id, text).await {
            Ok(updated) => {
                self.selected_note = updated.notes().len().saturating_sub(1);
                self.status_message = Some("Note added".into());
                self.replace_project(updated);
            }
            Err(e) => self.error_message = Some(format!("Failed to add note: {e}")),
        }
    }

    async fn delete_selected_note(&mut self) {
        let Some(id) = self.selected_project().map(|p| p.id.clone()) else {
            return;
        };
        let Some(note) = self.selected_notes().get(self.selected_note).cloned() else {
            return;
        };

        match self.state_manager.delete_note(&id, &note.id).await {
            Ok(updated) => {
                self.selected_note = self.selected_note.saturating_sub(1);
                self.status_message = Some("Note deleted".into());
                self.replace_project(updated);
            }
            Err(e) => self.error_message = Some(format!("Failed to delete note: {e}")),
        }
    }

    fn category_for(&self, id: Option<&str>) -> Option<&Category> {
        id.and_then(|id| self.categories.iter().find(|c| c.id.0 == id))
    }

    fn border_style(&self, pane: FocusedPane) -> Style {
        if self.focused_pane == pane {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Gray)
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar
                Constraint::Length(1), // Active filters
                Constraint::Min(0),    // Projects | details
                Constraint::Length(1), // Status bar
            ])
            .split(frame.area());

        if self.mode == AppMode::NoteInput {
            self.note_input.render(frame, main_chunks[0]);
        } else {
            self.search_bar.render(frame, main_chunks[0]);
        }
        self.render_filter_line(frame, main_chunks[1]);

        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(main_chunks[2]);

        self.render_project_list(frame, content_chunks[0]);

        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(content_chunks[1]);

        self.render_details(frame, right_chunks[0]);
        self.render_notes(frame, right_chunks[1]);
        self.render_status_bar(frame, main_chunks[3]);

        if self.mode == AppMode::Help {
            self.render_help(frame);
        }
    }

    fn render_filter_line(&self, frame: &mut Frame, area: Rect) {
        let sort = match self.sort {
            Some(spec) => format!("{} {}", spec.key, if spec.order.is_ascending() { "asc" } else { "desc" }),
            None => "newest".to_string(),
        };
        let text = format!(
            " category: {} | tag: {} | archived: {} | sort: {}",
            self.filter.category.as_str(),
            self.filter.tag.as_deref().unwrap_or("any"),
            if self.filter.show_archived { "shown" } else { "hidden" },
            sort
        );
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::Cyan)),
            area,
        );
    }

    fn render_project_list(&mut self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(format!("Projects ({})", self.visible.len()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(self.border_style(FocusedPane::ProjectList));

        if self.is_loading {
            let paragraph = Paragraph::new("Loading projects...")
                .block(block)
                .style(Style::default().fg(Color::Gray));
            frame.render_widget(paragraph, area);
            return;
        }

        if self.visible.is_empty() {
            let message = if self.search_bar.query().is_empty() {
                "No projects found"
            } else {
                "No projects match your search"
            };
            let paragraph = Paragraph::new(message)
                .block(block)
                .style(Style::default().fg(Color::Gray));
            frame.render_widget(paragraph, area);
            return;
        }

        let rows: Vec<Row> = self
            .visible
            .iter()
            .map(|project| {
                let color = self
                    .category_for(project.category.as_deref())
                    .and_then(|c| hex_to_rgb(&c.color))
                    .map(|(r, g, b)| Color::Rgb(r, g, b))
                    .unwrap_or(Color::Gray);
                let name = vec![
                    Span::styled("● ", Style::default().fg(color)),
                    Span::raw(project.name.clone()),
                ];
                Row::new(vec![
                    Cell::from(Line::from(name)),
                    Cell::from(project.status.label()).style(status_style(project.status)),
                ])
            })
            .collect();

        let table = Table::new(rows, &[Constraint::Min(20), Constraint::Length(12)])
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("");

        frame.render_stateful_widget(table, area, &mut self.project_list_state);
    }

    fn render_details(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Details")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(self.border_style(FocusedPane::Details));

        let Some(project) = self.selected_project() else {
            let paragraph = Paragraph::new("No project selected")
                .block(block)
                .style(Style::default().fg(Color::Gray))
                .alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        };

        let label = Style::default().fg(Color::DarkGray);
        let category = match self.category_for(project.category.as_deref()) {
            Some(c) => c.label.clone(),
            None => project.category.clone().unwrap_or_else(|| "-".into()),
        };
        let mut lines = vec![
            Line::from(Span::styled(
                project.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Status:   ", label),
                Span::styled(project.status.label(), status_style(project.status)),
            ]),
            Line::from(vec![
                Span::styled("Priority: ", label),
                Span::styled(
                    project.priority.map(|p| p.as_str()).unwrap_or("-"),
                    priority_style(project.priority),
                ),
            ]),
            Line::from(vec![Span::styled("Category: ", label), Span::raw(category)]),
            Line::from(vec![
                Span::styled("Tags:     ", label),
                Span::raw(if project.tags.is_empty() {
                    "-".to_string()
                } else {
                    project.tags.join(", ")
                }),
            ]),
            Line::from(vec![
                Span::styled("Created:  ", label),
                Span::raw(project.created_at.format("%Y-%m-%d").to_string()),
            ]),
        ];
        if let Some(link) = &project.link {
            lines.push(Line::from(vec![
                Span::styled("Link:     ", label),
                Span::styled(link.clone(), Style::default().fg(Color::Blue)),
            ]));
        }
        if project.is_shared() {
            lines.push(Line::from(Span::styled(
                "Shared by link",
                Style::default().fg(Color::Magenta),
            )));
        }
        if let Some(description) = &project.description {
            lines.push(Line::from(""));
            lines.extend(description.lines().map(|l| Line::from(l.to_string())));
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((self.details_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_notes(&self, frame: &mut Frame, area: Rect) {
        let notes = self.selected_notes();
        let block = Block::default()
            .title(format!("Notes ({})", notes.len()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(self.border_style(FocusedPane::Notes));

        if notes.is_empty() {
            let paragraph = Paragraph::new("No notes yet. Press n to add one.")
                .block(block)
                .style(Style::default().fg(Color::Gray));
            frame.render_widget(paragraph, area);
            return;
        }

        let highlight = self.focused_pane == FocusedPane::Notes;
        let mut lines = Vec::new();
        for (i, note) in notes.iter().enumerate() {
            let marker = if highlight && i == self.selected_note { "> " } else { "  " };
            lines.push(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(
                    note.date.format("%Y-%m-%d %H:%M").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            for text_line in note.text.lines() {
                lines.push(Line::from(format!("  {text_line}")));
            }
        }

        let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        if let Some(error) = &self.error_message {
            frame.render_widget(
                Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red)),
                area,
            );
            return;
        }
        if let Some(status) = &self.status_message {
            frame.render_widget(
                Paragraph::new(status.as_str()).style(Style::default().fg(Color::Green)),
                area,
            );
            return;
        }

        let help_text = match (&self.mode, self.focused_pane) {
            (AppMode::NoteInput, _) => "Enter: save note | Esc: cancel",
            (_, FocusedPane::Search) => "Enter/Tab: go to projects | Esc: clear search",
            (_, FocusedPane::Notes) => "j/k: select note | n: add | x: delete | Tab: next pane | ?: help",
            _ => "j/k: navigate | s: status | c/t: filter | o/O: sort | n: note | /: search | q: quit | ?: help",
        };
        frame.render_widget(
            Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray)),
            area,
        );
    }

    fn render_help(&self, frame: &mut Frame) {
        let popup_area = Self::centered_rect(60, 70, frame.area());
        frame.render_widget(ratatui::widgets::Clear, popup_area);

        let help_text = [
            "Task Force Monitor",
            "",
            "Navigation:",
            "  j/k or Up/Down  - Move in the focused pane",
            "  g/G             - First/last item",
            "  Tab/Shift+Tab   - Switch panes",
            "  Ctrl+d/Ctrl+u   - Page down/up",
            "",
            "Projects:",
            "  s               - Advance status",
            "  c               - Cycle category filter",
            "  t               - Cycle tag filter",
            "  a               - Show/hide abandoned projects",
            "  o / O           - Cycle sort key / flip order",
            "  r               - Reload from the backend",
            "",
            "Notes:",
            "  n               - Add a note",
            "  x               - Delete selected note (notes pane)",
            "",
            "General:",
            "  /               - Search",
            "  ?               - Show this help",
            "  q / Ctrl+C      - Quit",
            "",
            "Press any key to close this help",
        ]
        .join("\n");

        let paragraph = Paragraph::new(help_text)
            .block(Block::default().title("Help").borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

fn status_style(status: ProjectStatus) -> Style {
    let color = match status {
        ProjectStatus::Concept => Color::Blue,
        ProjectStatus::Started => Color::Yellow,
        ProjectStatus::Completed => Color::Green,
        ProjectStatus::Abandoned => Color::DarkGray,
    };
    Style::default().fg(color)
}

fn priority_style(priority: Option<Priority>) -> Style {
    match priority {
        Some(Priority::High) => Style::default().fg(Color::Red),
        Some(Priority::Medium) => Style::default().fg(Color::Yellow),
        Some(Priority::Low) => Style::default().fg(Color::Green),
        None => Style::default().fg(Color::DarkGray),
    }
}

/// Parse a `#rrggbb` category color.
fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

pub async fn run_tui(mut app: App) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut app, &mut terminal).await;

    app.state_manager.shutdown();
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;

    result
}

async fn run_loop<B: Backend>(app: &mut App, terminal: &mut Terminal<B>) -> Result<()> {
    app.initialize().await?;
    let mut event_handler = EventHandler::new();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        if let Some(event) = event_handler.next_event().await? {
            if app.handle_event(event).await? {
                break;
            }
        }

        if event_handler.should_quit() {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, StoredNotes, UserId};
    use chrono::{Duration, TimeZone, Utc};

    fn project(name: &str, status: ProjectStatus, offset: i64) -> Project {
        let created_at = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap() + Duration::hours(offset);
        Project {
            id: ProjectId(name.to_lowercase()),
            user_id: UserId("u1".into()),
            name: name.into(),
            description: None,
            status,
            priority: None,
            category: None,
            tags: vec![],
            link: None,
            comments: StoredNotes::Empty,
            share_token: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_visible_projects_applies_dashboard_and_search() {
        let projects = vec![
            project("Alpha", ProjectStatus::Concept, 0),
            project("Beta", ProjectStatus::Started, 1),
            project("Gamma", ProjectStatus::Abandoned, 2),
            project("Alphabet", ProjectStatus::Completed, 3),
        ];

        let all = visible_projects(&projects, &DashboardFilter::default(), None, "");
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Alphabet", "Alpha"]);

        let searched = visible_projects(&projects, &DashboardFilter::default(), None, "alpha");
        let names: Vec<_> = searched.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alphabet", "Alpha"]);
    }

    #[test]
    fn test_cycle_option_wraps_to_none() {
        let options = vec!["a".to_string(), "b".to_string()];
        assert_eq!(cycle_option(&options, None), Some("a".into()));
        assert_eq!(cycle_option(&options, Some("a")), Some("b".into()));
        assert_eq!(cycle_option(&options, Some("b")), None);
        assert_eq!(cycle_option(&options, Some("gone")), Some("a".into()));
        assert_eq!(cycle_option(&[], None), None);
    }

    #[test]
    fn test_sort_cycle_visits_every_key_then_default() {
        let mut sort = None;
        let mut seen = Vec::new();
        for _ in 0..SortKey::ALL.len() {
            sort = next_sort(sort);
            seen.push(sort.map(|s| s.key));
        }
        assert_eq!(seen, SortKey::ALL.iter().copied().map(Some).collect::<Vec<_>>());
        assert_eq!(next_sort(sort), None);
    }

    #[test]
    fn test_pane_cycle() {
        assert_eq!(FocusedPane::Notes.next(), FocusedPane::Search);
        assert_eq!(FocusedPane::Search.previous(), FocusedPane::Notes);
        assert_eq!(FocusedPane::ProjectList.next(), FocusedPane::Details);
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#3b82f6"), Some((0x3b, 0x82, 0xf6)));
        assert_eq!(hex_to_rgb("3b82f6"), Some((0x3b, 0x82, 0xf6)));
        assert_eq!(hex_to_rgb("#fff"), None);
        assert_eq!(hex_to_rgb("#zzzzzz"), None);
    }
}
