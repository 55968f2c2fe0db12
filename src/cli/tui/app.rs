//! TUI application state and logic.

use std::path::PathBuf;

use chrono::Utc;

use crate::context::AppContext;
use crate::core::{ExportFormat, ScanJob, ScanTracker, TrackerError};

/// Current view being displayed.
#[derive(Debug, Clone)]
pub enum View {
    /// Domain input and the tracked scans, newest first.
    Dashboard {
        /// Selected index in the job list
        selected: usize,
    },
    /// Every scan the service knows about, fetched on demand.
    AllScans {
        selected: usize,
    },
    /// Single scan with its full result.
    Detail {
        job_id: String,
        /// Scroll offset for long results
        scroll: u16,
    },
}

impl Default for View {
    fn default() -> Self {
        View::Dashboard { selected: 0 }
    }
}

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Select,
    Back,
    Refresh,
    ShowAll,
    Export,
    Edit,
    Input(char),
    DeleteChar,
    Submit,
}

/// Main TUI application state.
pub struct TuiApp {
    tracker: ScanTracker,
    export_dir: PathBuf,
    pub service: String,
    pub view: View,
    pub input: String,
    pub editing: bool,
    pub jobs: Vec<ScanJob>,
    pub running: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

impl TuiApp {
    pub fn new(ctx: &AppContext, export_dir: PathBuf) -> Self {
        Self {
            tracker: ctx.tracker(),
            export_dir,
            service: ctx.service_label(),
            view: View::default(),
            input: String::new(),
            editing: true,
            jobs: Vec::new(),
            running: true,
            error: None,
            notice: None,
        }
    }

    /// Load the service's scan list and start polling.
    pub async fn init(&mut self) {
        if let Err(e) = self.tracker.refresh().await {
            self.error = Some(e.to_string());
        }
        self.tracker.start();
        self.sync().await;
    }

    /// Pull the latest job list from the tracker.
    pub async fn sync(&mut self) {
        self.jobs = self.tracker.snapshot().await;
        self.clamp_selection();
    }

    pub async fn shutdown(&mut self) {
        self.tracker.shutdown().await;
    }

    pub fn pending_count(&self) -> usize {
        self.jobs.iter().filter(|job| !job.is_terminal()).count()
    }

    pub fn selected_job(&self) -> Option<&ScanJob> {
        match &self.view {
            View::Dashboard { selected } | View::AllScans { selected } => self.jobs.get(*selected),
            View::Detail { job_id, .. } => self.jobs.iter().find(|job| &job.id == job_id),
        }
    }

    /// Handle an action and update state accordingly.
    pub async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Edit => {
                self.view = View::Dashboard { selected: 0 };
                self.editing = true;
            }
            Action::Input(c) => self.input.push(c),
            Action::DeleteChar => {
                self.input.pop();
            }
            Action::Submit => self.submit().await,
            Action::Refresh => self.refresh().await,
            Action::ShowAll => {
                self.refresh().await;
                self.editing = false;
                self.view = View::AllScans { selected: 0 };
            }
            Action::Export => self.export().await,
            Action::Back => self.back(),
            Action::Up => self.navigate_up(),
            Action::Down => self.navigate_down(),
            Action::Select => self.select_item(),
        }
    }

    async fn submit(&mut self) {
        self.error = None;
        self.notice = None;
        if self.input.trim().is_empty() {
            return;
        }

        let domain = std::mem::take(&mut self.input);
        match self.tracker.submit(&domain).await {
            Ok(job) => {
                self.notice = Some(format!("Scan started for {}", job.domain));
                self.view = View::Dashboard { selected: 0 };
            }
            Err(e @ TrackerError::Validation(_)) => self.error = Some(e.to_string()),
            Err(e) => {
                // Keep the text so the user can retry.
                self.input = domain;
                self.error = Some(format!("Something went wrong. Please try again. ({})", e));
            }
        }
        self.sync().await;
    }

    async fn refresh(&mut self) {
        self.error = None;
        match self.tracker.refresh().await {
            Ok(count) => self.notice = Some(format!("Loaded {} scans", count)),
            Err(e) => self.error = Some(e.to_string()),
        }
        self.sync().await;
    }

    async fn export(&mut self) {
        self.error = None;
        let format = ExportFormat::Csv;
        let file_name = format!(
            "scans-{}.{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            format.extension()
        );
        let path = self.export_dir.join(file_name);

        match self.tracker.export_to_file(&path, format).await {
            Ok(rows) => {
                self.notice = Some(format!("Exported {} scans to {}", rows, path.display()))
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn back(&mut self) {
        match &self.view {
            View::Dashboard { selected } => {
                let selected = *selected;
                self.editing = !self.editing;
                self.view = View::Dashboard { selected };
            }
            View::AllScans { .. } | View::Detail { .. } => {
                self.view = View::Dashboard { selected: 0 };
            }
        }
    }

    fn navigate_up(&mut self) {
        match &mut self.view {
            View::Dashboard { selected } | View::AllScans { selected } => {
                *selected = selected.saturating_sub(1);
            }
            View::Detail { scroll, .. } => *scroll = scroll.saturating_sub(1),
        }
    }

    fn navigate_down(&mut self) {
        let len = self.jobs.len();
        match &mut self.view {
            View::Dashboard { selected } | View::AllScans { selected } => {
                if *selected + 1 < len {
                    *selected += 1;
                }
            }
            View::Detail { scroll, .. } => *scroll = scroll.saturating_add(1),
        }
    }

    fn select_item(&mut self) {
        if let Some(job) = self.selected_job() {
            let job_id = job.id.clone();
            self.editing = false;
            self.view = View::Detail { job_id, scroll: 0 };
        }
    }

    fn clamp_selection(&mut self) {
        let last = self.jobs.len().saturating_sub(1);
        if let View::Dashboard { selected } | View::AllScans { selected } = &mut self.view {
            *selected = (*selected).min(last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SimulatedBackend;
    use crate::config::AppConfig;
    use std::sync::Arc;

    fn app() -> TuiApp {
        let ctx = AppContext::with_backend(
            AppConfig::default(),
            Arc::new(SimulatedBackend::new()),
        );
        TuiApp::new(&ctx, std::env::temp_dir())
    }

    async fn type_text(app: &mut TuiApp, text: &str) {
        for c in text.chars() {
            app.handle_action(Action::Input(c)).await;
        }
    }

    #[tokio::test]
    async fn invalid_domain_shows_error_and_clears_input() {
        let mut app = app();
        type_text(&mut app, "invalid_domain").await;
        app.handle_action(Action::Submit).await;

        assert!(app.error.as_deref().unwrap().contains("Invalid domain format"));
        assert!(app.input.is_empty());
        assert!(app.jobs.is_empty());
    }

    #[tokio::test]
    async fn valid_domain_is_tracked() {
        let mut app = app();
        type_text(&mut app, "example.com").await;
        app.handle_action(Action::Submit).await;

        assert!(app.error.is_none());
        assert!(app.input.is_empty());
        assert_eq!(app.jobs.len(), 1);
        assert_eq!(app.pending_count(), 1);
        assert_eq!(app.jobs[0].domain, "example.com");
    }

    #[tokio::test]
    async fn select_opens_detail_and_back_returns() {
        let mut app = app();
        type_text(&mut app, "example.com").await;
        app.handle_action(Action::Submit).await;

        app.handle_action(Action::Select).await;
        assert!(matches!(app.view, View::Detail { .. }));
        assert_eq!(app.selected_job().unwrap().domain, "example.com");

        app.handle_action(Action::Back).await;
        assert!(matches!(app.view, View::Dashboard { selected: 0 }));
    }
}
