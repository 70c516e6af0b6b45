use chrono::Utc;
use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{
    event::{AppEvent, EventHandler},
    md,
    thread_view::{self, Entry},
    widgets::ComposerInput,
};
use crate::adapters::prompt::AssumeYes;
use crate::application::{AppResult, CommentService, CommentThread, Composer};
use crate::domain::{Article, ArticleId, CommentId, CommentTree};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Browse,
    Compose,
    ConfirmDelete(CommentId),
    Help,
}

pub struct App {
    thread: Arc<CommentThread>,
    service: Arc<CommentService>,
    mode: AppMode,

    // Article header
    article: Option<Article>,
    article_excerpt: Vec<Line<'static>>,

    // Snapshot of the thread taken after every event
    tree: CommentTree,
    composer: Composer,
    error_message: Option<String>,

    selected: usize,
    scroll_offset: u16,
    input: ComposerInput,

    // Network work runs in the background; the draw loop never waits on it
    tasks: Vec<JoinHandle<()>>,
    pending_submit: Option<JoinHandle<bool>>,
    pending_article: Option<JoinHandle<Option<Article>>>,
}

impl App {
    pub fn new(thread: Arc<CommentThread>, service: Arc<CommentService>) -> Self {
        Self {
            thread,
            service,
            mode: AppMode::Browse,
            article: None,
            article_excerpt: Vec::new(),
            tree: CommentTree::default(),
            composer: Composer::default(),
            error_message: None,
            selected: 0,
            scroll_offset: 0,
            input: ComposerInput::new(),
            tasks: Vec::new(),
            pending_submit: None,
            pending_article: None,
        }
    }

    pub async fn initialize(&mut self) -> Result<()> {
        if let Some(article) = fetch_article(&self.service, self.thread.article(), true).await {
            self.set_article(article);
        }
        // A failed first load is shown in the status bar, not fatal.
        log_outcome("initial load", self.thread.refresh().await);
        self.sync().await;
        Ok(())
    }

    fn set_article(&mut self, article: Article) {
        let body = md::html_to_markdown(&article.content);
        self.article_excerpt = md::excerpt_lines(&body, 2);
        self.article = Some(article);
    }

    /// Run a thread operation without holding up rendering. Its outcome
    /// lands in the thread's state and error slot.
    fn spawn_action<F, Fut>(&mut self, action: &'static str, run: F)
    where
        F: FnOnce(Arc<CommentThread>) -> Fut,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let work = run(self.thread.clone());
        let task = tokio::spawn(async move { log_outcome(action, work.await) });
        self.tasks.push(task);
    }

    /// Fold finished background work into the app. With `wait`, block until
    /// all of it is done.
    async fn collect_background(&mut self, wait: bool) {
        if wait {
            for task in self.tasks.drain(..) {
                if let Err(e) = task.await {
                    tracing::warn!("Background task failed: {}", e);
                }
            }
        } else {
            self.tasks.retain(|task| !task.is_finished());
        }

        if self.pending_submit.as_ref().is_some_and(|h| wait || h.is_finished()) {
            if let Some(handle) = self.pending_submit.take() {
                let posted = matches!(handle.await, Ok(true));
                if posted && self.mode == AppMode::Compose {
                    self.input.clear();
                    self.leave_compose();
                }
            }
        }

        if self.pending_article.as_ref().is_some_and(|h| wait || h.is_finished()) {
            if let Some(handle) = self.pending_article.take() {
                if let Ok(Some(article)) = handle.await {
                    self.set_article(article);
                }
            }
        }
    }

    /// Pull the thread's current state into the app for rendering.
    pub async fn sync(&mut self) {
        self.collect_background(false).await;
        self.tree = self.thread.tree().await;
        self.composer = self.thread.composer().await;
        self.error_message = self.thread.error().await;

        let count = self.entries().len();
        if count == 0 {
            self.selected = 0;
        } else if self.selected >= count {
            self.selected = count - 1;
        }
    }

    fn entries(&self) -> Vec<Entry> {
        thread_view::visible_entries(&self.tree, &self.thread)
    }

    fn selected_id(&self) -> Option<CommentId> {
        self.entries().get(self.selected).map(|e| e.id)
    }

    pub async fn handle_event(&mut self, event: AppEvent) -> Result<bool> {
        if event == AppEvent::Quit {
            return Ok(true);
        }
        if event == AppEvent::Tick {
            self.sync().await;
            return Ok(false);
        }

        let quit = match self.mode {
            AppMode::Browse => self.handle_browse(event).await,
            AppMode::Compose => {
                self.handle_compose(event).await;
                false
            }
            AppMode::ConfirmDelete(id) => {
                self.handle_confirm(id, event).await;
                false
            }
            AppMode::Help => {
                self.mode = AppMode::Browse;
                false
            }
        };

        self.sync().await;
        Ok(quit)
    }

    async fn handle_browse(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Character('q') => return true,
            AppEvent::Up | AppEvent::Character('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            AppEvent::Down | AppEvent::Character('j') => {
                if self.selected + 1 < self.entries().len() {
                    self.selected += 1;
                }
            }
            AppEvent::Character('l') => {
                if let Some(id) = self.selected_id() {
                    self.spawn_action("like", move |thread| async move {
                        thread.toggle_like(id).await
                    });
                }
            }
            AppEvent::Character('r') => {
                if let Some(id) = self.selected_id() {
                    self.thread.start_reply(id).await;
                    self.enter_compose();
                }
            }
            AppEvent::Character('c') => {
                self.thread.cancel_reply().await;
                self.enter_compose();
            }
            AppEvent::Character('e') => {
                if let Some(id) = self.selected_id() {
                    if self.thread.start_edit(id).await.is_ok() {
                        let text = self.thread.composer().await.text;
                        self.input.set_text(&text);
                        self.enter_compose();
                    }
                }
            }
            AppEvent::Character('d') => {
                if let Some(id) = self.selected_id() {
                    let allowed = self
                        .thread
                        .actions_for(id)
                        .await
                        .is_some_and(|a| a.can_delete);
                    if allowed {
                        self.mode = AppMode::ConfirmDelete(id);
                    }
                }
            }
            AppEvent::Character('t') => {
                if let Some(id) = self.selected_id() {
                    if self.thread.shows_collapse_control(id).await {
                        self.thread.toggle_collapsed(id);
                    }
                }
            }
            AppEvent::Character('R') => {
                self.spawn_action("refresh", |thread| async move { thread.refresh().await });
                if self.pending_article.is_none() {
                    let service = self.service.clone();
                    let article = self.thread.article();
                    self.pending_article = Some(tokio::spawn(async move {
                        fetch_article(&service, article, false).await
                    }));
                }
            }
            AppEvent::Character('?') => self.mode = AppMode::Help,
            AppEvent::Escape => self.thread.dismiss_error().await,
            _ => {}
        }
        false
    }

    fn enter_compose(&mut self) {
        self.mode = AppMode::Compose;
        self.input.set_focused(true);
    }

    fn leave_compose(&mut self) {
        self.mode = AppMode::Browse;
        self.input.set_focused(false);
    }

    async fn handle_compose(&mut self, event: AppEvent) {
        match event {
            AppEvent::Character(c) => self.input.insert_char(c),
            AppEvent::Backspace => self.input.delete_char(),
            AppEvent::Enter if self.pending_submit.is_none() => {
                self.thread.set_text(self.input.text()).await;
                let thread = self.thread.clone();
                self.pending_submit =
                    Some(tokio::spawn(async move { thread.submit().await.is_ok() }));
            }
            AppEvent::Escape => {
                self.thread.clear_composer().await;
                self.input.clear();
                self.leave_compose();
            }
            _ => {}
        }
    }

    async fn handle_confirm(&mut self, id: CommentId, event: AppEvent) {
        match event {
            AppEvent::Character('y') | AppEvent::Character('Y') => {
                // the modal was the confirmation prompt
                self.spawn_action("delete", move |thread| async move {
                    thread.delete_comment(id, &AssumeYes).await.map(|_| ())
                });
                self.mode = AppMode::Browse;
            }
            AppEvent::Character('n') | AppEvent::Escape => self.mode = AppMode::Browse,
            _ => {}
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // Article header
                Constraint::Min(0),    // Thread
                Constraint::Length(3), // Composer
                Constraint::Length(1), // Status bar
            ])
            .split(frame.area());

        self.render_article(frame, chunks[0]);
        self.render_thread(frame, chunks[1]);
        self.input
            .render(frame, chunks[2], self.composer.reply_to, self.composer.editing);
        self.render_status_bar(frame, chunks[3]);

        match self.mode {
            AppMode::ConfirmDelete(id) => self.render_confirm(frame, id),
            AppMode::Help => self.render_help(frame),
            _ => {}
        }
    }

    fn render_article(&self, frame: &mut Frame, area: Rect) {
        let (title, mut lines) = match &self.article {
            Some(article) => (
                article.title.clone(),
                vec![Line::from(vec![
                    Span::styled(format!("by {}", article.author), Style::default().fg(Color::Blue)),
                    Span::styled(
                        format!(
                            " • {} • {} views • {} likes",
                            article.created_at.format("%Y-%m-%d"),
                            article.views_count,
                            article.likes_count
                        ),
                        Style::default().fg(Color::Gray),
                    ),
                ])],
            ),
            None => (
                self.thread
                    .article()
                    .map(|id| format!("Article #{id}"))
                    .unwrap_or_else(|| "No article selected".to_string()),
                Vec::new(),
            ),
        };
        lines.extend(self.article_excerpt.iter().cloned());

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_thread(&mut self, frame: &mut Frame, area: Rect) {
        let selected = self.selected_id();
        let rendered = thread_view::render_thread(&self.tree, &self.thread, selected, Utc::now());

        // keep the selected comment's header on screen
        let height = area.height.saturating_sub(2);
        if let Some(line) = selected.and_then(|id| rendered.offset_of(id)) {
            let line = line as u16;
            if line < self.scroll_offset {
                self.scroll_offset = line;
            } else if height > 0 && line >= self.scroll_offset + height {
                self.scroll_offset = line + 1 - height;
            }
        } else {
            self.scroll_offset = 0;
        }

        let mut title = format!("Comments ({})", self.tree.len());
        if self.thread.is_loading() {
            title.push_str(" loading…");
        }
        if self.thread.is_submitting() {
            title.push_str(" posting…");
        }

        let paragraph = Paragraph::new(rendered.lines)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Green)),
            )
            .scroll((self.scroll_offset, 0));
        frame.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let paragraph = match &self.error_message {
            Some(message) => Paragraph::new(format!("{message} (Esc to dismiss)"))
                .style(Style::default().fg(Color::Red)),
            None => {
                let help_text = match self.mode {
                    AppMode::Compose => "Enter: post | Esc: cancel",
                    AppMode::ConfirmDelete(_) => "y: delete | n: keep",
                    _ => "j/k: move | l: like | r: reply | c: comment | e: edit | d: delete | t: collapse | R: refresh | q: quit | ?: help",
                };
                Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray))
            }
        };
        frame.render_widget(paragraph, area);
    }

    fn render_confirm(&self, frame: &mut Frame, id: CommentId) {
        let area = Self::centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);

        let paragraph = Paragraph::new(format!(
            "Are you sure you want to delete comment #{id}?\n\ny: delete    n: keep"
        ))
        .block(
            Block::default()
                .title("Delete comment")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let popup_area = Self::centered_rect(60, 70, frame.area());
        frame.render_widget(Clear, popup_area);

        let help_text = [
            "Comments Help",
            "",
            "Navigation:",
            "  j/k or ↑/↓     - Move between comments",
            "  t              - Collapse/expand a thread with more than two replies",
            "  R              - Refetch comments and article",
            "",
            "Actions:",
            "  c              - Write a new comment",
            "  r              - Reply to the selected comment",
            "  l              - Like/unlike (top-level comments, logged in)",
            "  e              - Edit your comment (posts a new comment)",
            "  d              - Delete your comment (staff: any comment)",
            "",
            "General:",
            "  Esc            - Dismiss error / cancel",
            "  q              - Quit",
            "  Ctrl+C         - Force quit application",
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

async fn fetch_article(
    service: &CommentService,
    id: Option<ArticleId>,
    use_cache: bool,
) -> Option<Article> {
    let id = id?;
    match service.get_article(id, use_cache).await {
        Ok(article) => Some(article),
        Err(e) => {
            tracing::warn!("Failed to load article {}: {}", id, e);
            None
        }
    }
}

/// Failures are already in the thread's error slot; just leave a trace.
fn log_outcome(action: &str, outcome: AppResult<()>) {
    if let Err(e) = outcome {
        tracing::debug!("{} failed: {}", action, e);
    }
}

pub async fn run_tui(mut app: App) -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut app, &mut terminal).await;

    // Restore the terminal even when the loop failed
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;

    result
}

async fn run_loop<B: ratatui::backend::Backend>(
    app: &mut App,
    terminal: &mut Terminal<B>,
) -> Result<()> {
    app.initialize().await?;
    let mut event_handler = EventHandler::new();

    loop {
        terminal.draw(|frame| app.render(frame))?;

        let event = event_handler.next_event().await?;
        if app.handle_event(event).await? || event_handler.should_quit() {
            break;
        }
    }

    Ok(())
}
