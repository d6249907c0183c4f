//! ratatui-based UI.

use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use audit_application::{
    AnalysisJob, CollaboratorError, DocumentDraft, PlaybackController, ReviewError, ReviewSession,
    SectionPhase,
};
use audit_core::{Document, DocumentId, SectionKey, SectionTopic, Settings, Theme, markup};
use audit_engine::{Completion, Dispatcher};
use audit_storage::{
    KeyValueStore, PersistError, SnapshotGateway, export_to_file, import_from_file,
};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, Paragraph, Tabs, Wrap,
};
use unicode_width::UnicodeWidthStr;

const NOTICE_TTL: Duration = Duration::from_secs(6);
const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

const DATA_MENU_EXPORT: usize = 0;
const DATA_MENU_IMPORT: usize = 1;
const DATA_MENU_RESET: usize = 2;
const DATA_MENU_ITEM_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiExit {
    Quit,
    Reset,
}

pub struct UiOutcome {
    pub session: ReviewSession,
    pub settings: Settings,
    pub exit: UiExit,
}

/// Everything a UI run needs. The gateway is borrowed so the caller keeps the store.
pub struct UiContext<'a, S> {
    pub session: ReviewSession,
    pub settings: Settings,
    pub gateway: &'a SnapshotGateway<S>,
    pub dispatcher: Dispatcher,
    pub playback: PlaybackController,
    pub export_dir: PathBuf,
}

pub struct Ui<'a, S> {
    session: ReviewSession,
    settings: Settings,
    gateway: &'a SnapshotGateway<S>,
    dispatcher: Dispatcher,
    playback: PlaybackController,
    playing_key: Option<SectionKey>,
    export_dir: PathBuf,
    screen: Screen,
    library: LibraryPanel,
    document: DocumentPanel,
    form: DocumentFormPanel,
    input: InputPanel,
    data_panel: DataPanel,
    notice: Option<Notice>,
    saved_revision: u64,
    started: Instant,
}

impl<'a, S: KeyValueStore> Ui<'a, S> {
    pub fn new(ctx: UiContext<'a, S>) -> Self {
        let mut settings = ctx.settings;
        settings.normalize();
        let saved_revision = ctx.session.revision();
        Self {
            session: ctx.session,
            settings,
            gateway: ctx.gateway,
            dispatcher: ctx.dispatcher,
            playback: ctx.playback,
            playing_key: None,
            export_dir: ctx.export_dir,
            screen: Screen::Library,
            library: LibraryPanel::default(),
            document: DocumentPanel::default(),
            form: DocumentFormPanel::default(),
            input: InputPanel::default(),
            data_panel: DataPanel::default(),
            notice: None,
            saved_revision,
            started: Instant::now(),
        }
    }

    pub fn run(mut self) -> anyhow::Result<UiOutcome> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        let exit = match (result, restore_result) {
            (Ok(Ok(exit)), Ok(())) => exit,
            (Ok(Ok(_)), Err(err)) => return Err(err),
            (Ok(Err(err)), _) => return Err(err),
            (Err(panic), Ok(())) => return Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => {
                return Err(anyhow::anyhow!(
                    "{}\n(additionally failed to restore terminal: {err})",
                    panic_to_string(panic)
                ));
            }
        };

        if let Err(err) = self.playback.stop() {
            tracing::warn!(error = %err, "failed to stop playback on exit");
        }
        Ok(UiOutcome {
            session: std::mem::take(&mut self.session),
            settings: self.settings.clone(),
            exit,
        })
    }

    fn accent_color(&self) -> Color {
        match self.settings.theme {
            Theme::Light => Color::Blue,
            Theme::Dark => Color::Yellow,
        }
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<UiExit> {
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;

        loop {
            if self.pump_completions() {
                needs_redraw = true;
            }
            self.persist_if_changed();
            if self.expire_notice() {
                needs_redraw = true;
            }
            if self.session.review().loading_count() > 0 || self.playback.is_playing() {
                needs_redraw = true;
            }

            if needs_redraw {
                terminal.draw(|frame| self.draw(frame.area(), frame))?;
                needs_redraw = false;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }

                    needs_redraw = true;

                    let exit = if self.data_panel.confirm_reset {
                        self.handle_reset_confirm_key(key)?
                    } else if self.input.open {
                        self.handle_input_key(key)?
                    } else if self.form.open {
                        self.handle_form_key(key)?
                    } else if self.data_panel.open {
                        self.handle_data_panel_key(key)?
                    } else if self.screen == Screen::Document {
                        self.handle_document_key(key)?
                    } else {
                        self.handle_library_key(key)?
                    };

                    if let Some(exit) = exit {
                        self.persist_if_changed();
                        return Ok(exit);
                    }
                }
                _ => {}
            }
        }
    }

    /// Applies finished background work. Returns true when anything arrived.
    fn pump_completions(&mut self) -> bool {
        let completions = self.dispatcher.drain();
        if completions.is_empty() {
            return false;
        }
        for completion in completions {
            match completion {
                Completion::Analysis { ticket, result } => {
                    match self.session.complete_analysis(&ticket, result) {
                        Ok(job) => self.dispatcher.submit_speech(job),
                        Err(ReviewError::Analysis(CollaboratorError::MissingCredentials)) => {
                            self.set_error(CollaboratorError::MissingCredentials.to_string());
                        }
                        Err(_) => self.set_error("Erreur d'analyse."),
                    }
                }
                Completion::Speech { ticket, audio } => {
                    if self.session.selected_id() != Some(&ticket.key.document) {
                        tracing::debug!(
                            doc = %ticket.key.document,
                            "dropping speech for a document no longer open"
                        );
                        continue;
                    }
                    if let Some(buffer) = self.session.complete_speech(&ticket, audio) {
                        match self.playback.play(Some(&buffer)) {
                            Ok(true) => self.playing_key = Some(ticket.key),
                            Ok(false) => {}
                            Err(err) => self.set_error(format!("Lecture audio impossible : {err}")),
                        }
                    }
                }
            }
        }
        true
    }

    fn persist_if_changed(&mut self) {
        let revision = self.session.revision();
        if revision == self.saved_revision {
            return;
        }
        self.saved_revision = revision;
        if let Err(err) = self.gateway.save(&self.session.snapshot()) {
            tracing::error!(error = %err, "failed to persist snapshot");
            self.set_error(format!("Sauvegarde impossible : {err}"));
        }
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::new(text.into(), false));
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice::new(text.into(), true));
    }

    fn expire_notice(&mut self) -> bool {
        if self
            .notice
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() >= NOTICE_TTL)
        {
            self.notice = None;
            return true;
        }
        false
    }

    fn submit_analysis(&mut self, request: Result<AnalysisJob, ReviewError>) {
        match request {
            Ok(job) => {
                tracing::debug!(
                    doc = %job.ticket.key.document,
                    topic = %job.ticket.key.topic,
                    "analysis submitted"
                );
                self.dispatcher.submit_analysis(job);
            }
            Err(ReviewError::InFlight(_)) => {}
            Err(err) => self.set_error(err.to_string()),
        }
    }

    fn stop_playback(&mut self) {
        self.playing_key = None;
        if let Err(err) = self.playback.stop() {
            tracing::warn!(error = %err, "failed to stop playback");
        }
    }

    fn open_document(&mut self, id: &DocumentId) {
        if self.session.select(id) {
            self.document = DocumentPanel::default();
            self.screen = Screen::Document;
        }
    }

    fn leave_document(&mut self) {
        self.stop_playback();
        self.session.leave_document();
        self.screen = Screen::Library;
    }

    fn focused_key(&self) -> Option<SectionKey> {
        self.session.section_key(self.document.focus)
    }

    fn handle_library_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        let entry_count = self.session.list_documents().len() + 1;
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Ok(Some(UiExit::Quit)),
            KeyCode::Up | KeyCode::Char('k') => {
                self.library.selected = self.library.selected.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.library.selected = (self.library.selected + 1).min(entry_count - 1);
                Ok(None)
            }
            KeyCode::Enter => {
                let selected = self
                    .session
                    .list_documents()
                    .get(self.library.selected)
                    .map(|d| d.id.clone());
                match selected {
                    Some(id) => self.open_document(&id),
                    None => self.form.open(),
                }
                Ok(None)
            }
            KeyCode::Char('n') => {
                self.form.open();
                Ok(None)
            }
            KeyCode::Char('d') => {
                self.data_panel.open = true;
                self.data_panel.selected = 0;
                Ok(None)
            }
            KeyCode::Char('t') => {
                self.settings.cycle_theme();
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_document_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        let topic = self.document.focus;
        match key.code {
            KeyCode::Esc | KeyCode::Backspace => {
                self.leave_document();
                Ok(None)
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.document.tab = self.document.tab.toggle();
                Ok(None)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                match self.document.tab {
                    DocTab::Audit => {
                        self.document.focus = topic.prev();
                        self.document.scroll = 0;
                    }
                    DocTab::Reference => {
                        self.document.reference_scroll =
                            self.document.reference_scroll.saturating_sub(1);
                    }
                }
                Ok(None)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                match self.document.tab {
                    DocTab::Audit => {
                        self.document.focus = topic.next();
                        self.document.scroll = 0;
                    }
                    DocTab::Reference => {
                        self.document.reference_scroll =
                            self.document.reference_scroll.saturating_add(1);
                    }
                }
                Ok(None)
            }
            KeyCode::PageUp => {
                let scroll = self.document.active_scroll();
                *scroll = scroll.saturating_sub(5);
                Ok(None)
            }
            KeyCode::PageDown => {
                let scroll = self.document.active_scroll();
                *scroll = scroll.saturating_add(5);
                Ok(None)
            }
            _ if self.document.tab == DocTab::Reference => Ok(None),
            KeyCode::Enter | KeyCode::Char('a') | KeyCode::Char('r') => {
                let request = self.session.request_analysis(topic, None);
                self.submit_analysis(request);
                Ok(None)
            }
            KeyCode::Char('p') => {
                let prompt = self
                    .session
                    .selected_document()
                    .and_then(|d| d.preset(topic))
                    .map(|p| p.prompt.clone());
                match prompt {
                    Some(prompt) => {
                        let request = self.session.request_analysis(topic, Some(&prompt));
                        self.submit_analysis(request);
                    }
                    None => self.set_info("Aucune analyse prédéfinie pour cette section."),
                }
                Ok(None)
            }
            KeyCode::Char('f') => {
                self.input.open_for(InputPurpose::FollowUp(topic), String::new());
                Ok(None)
            }
            KeyCode::Char('e') => {
                let current = self.session.note(topic).to_string();
                self.input.open_for(InputPurpose::Note(topic), current);
                Ok(None)
            }
            KeyCode::Char('x') => {
                let key = self.focused_key();
                if key.is_some() && key == self.playing_key {
                    self.stop_playback();
                }
                self.session.close(topic);
                self.document.scroll = 0;
                Ok(None)
            }
            KeyCode::Char('v') => {
                let Some(key) = self.focused_key() else {
                    return Ok(None);
                };
                let buffer = self.session.review().audio(&key).cloned();
                match self.playback.replay(buffer.as_ref()) {
                    Ok(true) => self.playing_key = Some(key),
                    Ok(false) => self.set_info("Aucun audio disponible pour cette section."),
                    Err(err) => self.set_error(format!("Lecture audio impossible : {err}")),
                }
                Ok(None)
            }
            KeyCode::Char('s') => {
                self.stop_playback();
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('u') => {
                    self.edit_input(String::clear);
                    return Ok(None);
                }
                KeyCode::Char('n') if self.input.purpose.is_multiline() => {
                    self.edit_input(|input| input.push('\n'));
                    return Ok(None);
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => {
                self.input.close();
                Ok(None)
            }
            KeyCode::Enter => {
                self.submit_input();
                Ok(None)
            }
            KeyCode::Backspace => {
                self.edit_input(|input| {
                    input.pop();
                });
                Ok(None)
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.edit_input(|input| input.push(ch));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Notes are written through on every edit; other inputs wait for Enter.
    fn edit_input(&mut self, edit: impl FnOnce(&mut String)) {
        edit(&mut self.input.input);
        if let InputPurpose::Note(topic) = self.input.purpose {
            let text = self.input.input.clone();
            if let Err(err) = self.session.set_note(topic, text) {
                self.input.error = Some(err.to_string());
            }
        }
    }

    fn submit_input(&mut self) {
        match self.input.purpose {
            InputPurpose::Note(_) => self.input.close(),
            InputPurpose::FollowUp(topic) => {
                let question = self.input.input.clone();
                match self.session.ask_follow_up(topic, &question) {
                    Ok(job) => {
                        self.input.close();
                        self.submit_analysis(Ok(job));
                    }
                    Err(ReviewError::EmptyQuestion) => {
                        self.input.error = Some("La question est vide.".to_string());
                    }
                    Err(ReviewError::InFlight(_)) => {
                        self.input.error = Some("Une analyse est déjà en cours.".to_string());
                    }
                    Err(err) => self.input.error = Some(err.to_string()),
                }
            }
            InputPurpose::ImportPath => {
                let raw = self.input.input.trim().to_string();
                if raw.is_empty() {
                    self.input.error = Some("Chemin requis.".to_string());
                    return;
                }
                match import_from_file(Path::new(&raw)) {
                    Ok(snapshot) => {
                        let summary = self.session.merge_import(snapshot);
                        tracing::info!(
                            path = %raw,
                            documents = summary.documents,
                            "import applied"
                        );
                        if self.session.selected_id().is_none() {
                            self.screen = Screen::Library;
                        }
                        self.input.close();
                        self.data_panel.open = false;
                        self.set_info("Importation réussie !");
                    }
                    Err(err) => {
                        tracing::warn!(path = %raw, error = %err, "import rejected");
                        self.input.error = Some(import_error_message(&err));
                    }
                }
            }
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => {
                    self.submit_form();
                    return Ok(None);
                }
                KeyCode::Char('u') => {
                    self.form.field_mut().clear();
                    return Ok(None);
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => {
                self.form = DocumentFormPanel::default();
                Ok(None)
            }
            KeyCode::Tab => {
                self.form.field = self.form.field.next();
                Ok(None)
            }
            KeyCode::BackTab => {
                self.form.field = self.form.field.prev();
                Ok(None)
            }
            KeyCode::Enter => {
                if self.form.field == FormField::Text {
                    self.form.text.push('\n');
                } else {
                    self.form.field = self.form.field.next();
                }
                Ok(None)
            }
            KeyCode::Backspace => {
                self.form.field_mut().pop();
                Ok(None)
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.form.field_mut().push(ch);
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn submit_form(&mut self) {
        let draft = self.form.draft();
        match self.session.create_document(draft) {
            Ok(id) => {
                self.form = DocumentFormPanel::default();
                self.open_document(&id);
                self.library.selected = self
                    .session
                    .list_documents()
                    .iter()
                    .position(|d| d.id == id)
                    .unwrap_or(0);
            }
            Err(ReviewError::MissingTitle) => {
                self.form.error = Some("Le titre est requis.".to_string());
                self.form.field = FormField::Title;
            }
            Err(ReviewError::MissingText) => {
                self.form.error = Some("Le texte du document est requis.".to_string());
                self.form.field = FormField::Text;
            }
            Err(err) => self.form.error = Some(err.to_string()),
        }
    }

    fn handle_data_panel_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Esc => {
                self.data_panel.open = false;
                Ok(None)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.data_panel.selected = self.data_panel.selected.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.data_panel.selected =
                    (self.data_panel.selected + 1).min(DATA_MENU_ITEM_COUNT - 1);
                Ok(None)
            }
            KeyCode::Enter => {
                match self.data_panel.selected {
                    DATA_MENU_EXPORT => self.export_backup(),
                    DATA_MENU_IMPORT => {
                        self.input.open_for(InputPurpose::ImportPath, String::new());
                    }
                    DATA_MENU_RESET => self.data_panel.confirm_reset = true,
                    _ => {}
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn handle_reset_confirm_key(&mut self, key: KeyEvent) -> anyhow::Result<Option<UiExit>> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('o') | KeyCode::Char('Y') | KeyCode::Char('O') => {
                self.data_panel = DataPanel::default();
                self.stop_playback();
                Ok(Some(UiExit::Reset))
            }
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.data_panel.confirm_reset = false;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn export_backup(&mut self) {
        let date = chrono::Local::now().date_naive();
        match export_to_file(&self.session.export_snapshot(), &self.export_dir, date) {
            Ok(path) => {
                self.data_panel.open = false;
                self.set_info(format!("Sauvegarde exportée : {}", path.display()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "export failed");
                self.set_error(format!("Export impossible : {err}"));
            }
        }
    }

    fn draw(&self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(area);

        let title = Paragraph::new(Text::from(self.header_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, layout[0]);

        match self.screen {
            Screen::Library => self.draw_library(layout[1], frame),
            Screen::Document => self.draw_document(layout[1], frame),
        }

        frame.render_widget(self.notice_line(), layout[2]);

        let footer = Paragraph::new(Text::from(self.footer_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, layout[3]);

        if self.form.open {
            self.draw_form(area, frame);
        }
        if self.data_panel.open {
            self.draw_data_panel(area, frame);
        }
        if self.input.open {
            self.draw_input(area, frame);
        }
    }

    fn header_lines(&self) -> Vec<Line<'static>> {
        match self.session.selected_document() {
            Some(doc) if self.screen == Screen::Document => vec![
                Line::from(Span::styled(
                    doc.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::raw(doc.subtitle.clone()),
            ],
            _ => vec![Line::from(vec![
                Span::styled("Audit Expert", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" · bibliothèque"),
            ])],
        }
    }

    fn notice_line(&self) -> Paragraph<'static> {
        let Some(notice) = &self.notice else {
            let loading = self.session.review().loading_count();
            if loading > 0 {
                return Paragraph::new(Line::from(Span::styled(
                    format!("{} {loading} analyse(s) en cours", self.spinner()),
                    Style::default().fg(self.accent_color()),
                )));
            }
            return Paragraph::new(Line::raw(""));
        };
        let style = if notice.is_error {
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Green)
        };
        Paragraph::new(Line::from(Span::styled(notice.text.clone(), style)))
            .alignment(Alignment::Center)
    }

    fn spinner(&self) -> &'static str {
        let idx = (self.started.elapsed().as_millis() / 250) as usize % SPINNER.len();
        SPINNER[idx]
    }

    fn footer_lines(&self) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        if self.input.open {
            let close_label = if self.input.purpose.is_multiline() {
                " fermer  "
            } else {
                " annuler  "
            };
            let mut spans = vec![
                Span::styled("Esc", bold),
                Span::raw(close_label),
                Span::styled("Enter", bold),
                Span::raw(" valider  "),
                Span::styled("Ctrl+u", bold),
                Span::raw(" effacer"),
            ];
            if self.input.purpose.is_multiline() {
                spans.push(Span::raw("  "));
                spans.push(Span::styled("Ctrl+n", bold));
                spans.push(Span::raw(" nouvelle ligne"));
            }
            return vec![Line::from(spans)];
        }

        if self.form.open {
            return vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" annuler  "),
                Span::styled("Tab", bold),
                Span::raw(" champ suivant  "),
                Span::styled("Ctrl+s", bold),
                Span::raw(" créer"),
            ])];
        }

        if self.data_panel.open {
            return vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" fermer  "),
                Span::styled("↑/↓", bold),
                Span::raw(" choisir  "),
                Span::styled("Enter", bold),
                Span::raw(" lancer"),
            ])];
        }

        match self.screen {
            Screen::Library => vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" quitter  "),
                Span::styled("Enter", bold),
                Span::raw(" ouvrir  "),
                Span::styled("n", bold),
                Span::raw(" nouveau  "),
                Span::styled("d", bold),
                Span::raw(" données  "),
                Span::styled("t", bold),
                Span::raw(" thème"),
            ])],
            Screen::Document if self.document.tab == DocTab::Reference => vec![Line::from(vec![
                Span::styled("Esc", bold),
                Span::raw(" retour  "),
                Span::styled("Tab", bold),
                Span::raw(" audit  "),
                Span::styled("↑/↓ PgUp/PgDn", bold),
                Span::raw(" défiler"),
            ])],
            Screen::Document => vec![
                Line::from(vec![
                    Span::styled("Esc", bold),
                    Span::raw(" retour  "),
                    Span::styled("Tab", bold),
                    Span::raw(" référence  "),
                    Span::styled("↑/↓", bold),
                    Span::raw(" section  "),
                    Span::styled("a", bold),
                    Span::raw(" analyser  "),
                    Span::styled("p", bold),
                    Span::raw(" prédéfinie  "),
                    Span::styled("r", bold),
                    Span::raw(" régénérer"),
                ]),
                Line::from(vec![
                    Span::styled("f", bold),
                    Span::raw(" question  "),
                    Span::styled("e", bold),
                    Span::raw(" note  "),
                    Span::styled("x", bold),
                    Span::raw(" fermer  "),
                    Span::styled("v", bold),
                    Span::raw(" réécouter  "),
                    Span::styled("s", bold),
                    Span::raw(" stop"),
                ]),
            ],
        }
    }

    fn draw_library(&self, area: Rect, frame: &mut ratatui::Frame) {
        let body_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let documents = self.session.list_documents();
        let max_title_width = body_layout[0].width.saturating_sub(6) as usize;
        let mut items: Vec<ListItem> = documents
            .iter()
            .map(|doc| {
                let marker = if self.session.is_custom(&doc.id) { "✎ " } else { "  " };
                let title = format!("{marker}{}", doc.title);
                let mut lines: Vec<Line> = wrap_text(&title, max_title_width.max(8))
                    .into_iter()
                    .map(Line::raw)
                    .collect();
                lines.push(Line::from(Span::styled(
                    format!("  {}", doc.subtitle),
                    Style::default().fg(Color::Gray),
                )));
                ListItem::new(Text::from(lines))
            })
            .collect();
        items.push(ListItem::new(Line::from(Span::styled(
            "+ Nouveau document",
            Style::default().add_modifier(Modifier::ITALIC),
        ))));

        let highlight_style = Style::default()
            .fg(Color::Black)
            .bg(self.accent_color())
            .add_modifier(Modifier::BOLD);

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Documents"))
            .highlight_style(highlight_style)
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);

        let mut state = ListState::default();
        state.select(Some(self.library.selected.min(documents.len())));
        frame.render_stateful_widget(list, body_layout[0], &mut state);

        let details = match documents.get(self.library.selected) {
            Some(doc) => self.document_details(doc),
            None => vec![
                Line::raw("Soumettez votre propre texte pour un audit."),
                Line::raw(""),
                Line::raw("Le texte complet alimente les trois sections d'analyse."),
            ],
        };
        let details = Paragraph::new(Text::from(details))
            .block(Block::default().borders(Borders::ALL).title("Détails"))
            .wrap(Wrap { trim: true });
        frame.render_widget(details, body_layout[1]);
    }

    fn document_details(&self, doc: &Document) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let responses = self
            .session
            .review()
            .responses()
            .get(&doc.id)
            .map(|m| m.len())
            .unwrap_or(0);
        let notes = SectionTopic::ALL
            .iter()
            .filter(|topic| {
                !self
                    .session
                    .notes()
                    .get(&SectionKey::new(doc.id.clone(), **topic))
                    .trim()
                    .is_empty()
            })
            .count();
        let kind = if self.session.is_custom(&doc.id) {
            "personnalisé"
        } else {
            "intégré"
        };

        let mut lines = vec![
            Line::from(Span::styled(doc.title.clone(), bold)),
            Line::raw(doc.subtitle.clone()),
            Line::raw(""),
            Line::from(vec![Span::styled("Type : ", bold), Span::raw(kind)]),
            Line::from(vec![
                Span::styled("Analyses : ", bold),
                Span::raw(format!("{responses}/3")),
            ]),
            Line::from(vec![
                Span::styled("Notes : ", bold),
                Span::raw(format!("{notes}/3")),
            ]),
            Line::raw(""),
        ];
        for topic in SectionTopic::ALL {
            lines.push(Line::raw(format!("· {}", doc.section(topic).title)));
        }
        lines
    }

    fn draw_document(&self, area: Rect, frame: &mut ratatui::Frame) {
        let Some(doc) = self.session.selected_document() else {
            frame.render_widget(Paragraph::new("Aucun document ouvert."), area);
            return;
        };

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(area);

        let tabs = Tabs::new(vec!["Audit", "Référence"])
            .select(self.document.tab.index())
            .highlight_style(
                Style::default()
                    .fg(self.accent_color())
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, layout[0]);

        match self.document.tab {
            DocTab::Audit => self.draw_audit(doc, layout[1], frame),
            DocTab::Reference => {
                let reference = Paragraph::new(Text::from(markup_lines(
                    &doc.full_reference,
                    self.strong_style(),
                )))
                .block(Block::default().borders(Borders::ALL).title("Document de référence"))
                .wrap(Wrap { trim: false })
                .scroll((self.document.reference_scroll, 0));
                frame.render_widget(reference, layout[1]);
            }
        }
    }

    fn strong_style(&self) -> Style {
        Style::default()
            .fg(self.accent_color())
            .add_modifier(Modifier::BOLD)
    }

    fn draw_audit(&self, doc: &Document, area: Rect, frame: &mut ratatui::Frame) {
        let constraints = SectionTopic::ALL.map(|topic| {
            if topic == self.document.focus {
                Constraint::Percentage(60)
            } else {
                Constraint::Percentage(20)
            }
        });
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for topic in SectionTopic::ALL {
            let focused = topic == self.document.focus;
            let key = SectionKey::new(doc.id.clone(), topic);
            let section = doc.section(topic);

            let border_style = if focused {
                Style::default().fg(self.accent_color())
            } else {
                Style::default()
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled(
                    format!(" {} ", section.title),
                    Style::default().add_modifier(Modifier::BOLD),
                ));

            let scroll = if focused { self.document.scroll } else { 0 };
            let body = Paragraph::new(Text::from(self.section_lines(doc, &key)))
                .block(block)
                .wrap(Wrap { trim: false })
                .scroll((scroll, 0));
            frame.render_widget(body, rows[topic.index()]);
        }
    }

    fn section_lines(&self, doc: &Document, key: &SectionKey) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let section = doc.section(key.topic);
        let mut lines = markup_lines(&section.display_content, self.strong_style());
        lines.push(Line::raw(""));

        let review = self.session.review();
        let mut heading = vec![Span::styled("Analyse IA", bold)];
        if review.audio(key).is_some() {
            let label = if self.playing_key.as_ref() == Some(key) && self.playback.is_playing() {
                "  ♪ lecture"
            } else {
                "  ♪ audio prêt"
            };
            heading.push(Span::styled(label, Style::default().fg(Color::Cyan)));
        }
        lines.push(Line::from(heading));

        match review.phase(key) {
            SectionPhase::Loading => {
                lines.push(Line::from(Span::styled(
                    format!("{} Analyse en cours…", self.spinner()),
                    Style::default().fg(self.accent_color()),
                )));
                if let Some(previous) = review.response(key) {
                    lines.push(Line::raw(""));
                    lines.extend(markup_lines(previous, self.strong_style()));
                }
            }
            SectionPhase::Answered => {
                if let Some(text) = review.response(key) {
                    lines.extend(markup_lines(text, self.strong_style()));
                }
            }
            SectionPhase::Idle => {
                let mut hint = "Appuyez sur a pour lancer l'analyse experte.".to_string();
                if let Some(preset) = doc.preset(key.topic) {
                    hint.push_str(&format!(" p : {}", preset.label));
                }
                lines.push(Line::from(Span::styled(
                    hint,
                    Style::default().fg(Color::Gray),
                )));
            }
        }

        lines.push(Line::raw(""));
        let note = self.session.notes().get(key);
        let note_style = Style::default().add_modifier(Modifier::ITALIC);
        if note.trim().is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Note : ", bold),
                Span::styled("(vide)", note_style.fg(Color::Gray)),
            ]));
        } else {
            let mut note_lines = note.lines();
            lines.push(Line::from(vec![
                Span::styled("Note : ", bold),
                Span::styled(note_lines.next().unwrap_or_default().to_string(), note_style),
            ]));
            for line in note_lines {
                lines.push(Line::from(Span::styled(format!("       {line}"), note_style)));
            }
        }
        lines
    }

    fn draw_form(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(80, 80, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Nouveau document",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(inner);

        for (idx, field) in FormField::ALL.iter().enumerate() {
            let active = self.form.field == *field;
            let border_style = if active {
                Style::default().fg(self.accent_color())
            } else {
                Style::default()
            };
            let mut value = self.form.value(*field).to_string();
            if active {
                value.push('▏');
            }
            let widget = Paragraph::new(value)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(border_style)
                        .title(field.label()),
                )
                .wrap(Wrap { trim: false });
            frame.render_widget(widget, sections[idx]);
        }

        if let Some(err) = &self.form.error {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    err.clone(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ))),
                sections[3],
            );
        }
    }

    fn draw_data_panel(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(55, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            "Données",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(inner);

        let items = vec![
            ListItem::new(Line::raw("Exporter une sauvegarde JSON")),
            ListItem::new(Line::raw("Importer un fichier JSON")),
            ListItem::new(Line::from(Span::styled(
                "Réinitialiser toutes les données",
                Style::default().fg(Color::Red),
            ))),
        ];
        let highlight_style = Style::default()
            .fg(Color::Black)
            .bg(self.accent_color())
            .add_modifier(Modifier::BOLD);
        let list = List::new(items)
            .highlight_style(highlight_style)
            .highlight_symbol("> ")
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(self.data_panel.selected.min(DATA_MENU_ITEM_COUNT - 1)));
        frame.render_stateful_widget(list, sections[0], &mut state);

        let info = if self.data_panel.confirm_reset {
            vec![Line::from(Span::styled(
                "Effacer documents, analyses et notes ? (o/n)",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ))]
        } else {
            vec![Line::from(vec![
                Span::styled("Export : ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(self.export_dir.display().to_string()),
            ])]
        };
        frame.render_widget(
            Paragraph::new(Text::from(info)).wrap(Wrap { trim: true }),
            sections[1],
        );
    }

    fn draw_input(&self, area: Rect, frame: &mut ratatui::Frame) {
        let popup_area = centered_rect(70, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            self.input.purpose.title(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        frame.render_widget(block.clone(), popup_area);

        let inner = block.inner(popup_area);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let mut value = self.input.input.clone();
        value.push('▏');
        frame.render_widget(
            Paragraph::new(value).wrap(Wrap { trim: false }),
            sections[0],
        );

        if let Some(err) = &self.input.error {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    err.clone(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ))),
                sections[1],
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Library,
    Document,
}

#[derive(Debug, Default)]
struct LibraryPanel {
    selected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum DocTab {
    #[default]
    Audit,
    Reference,
}

impl DocTab {
    fn toggle(self) -> Self {
        match self {
            DocTab::Audit => DocTab::Reference,
            DocTab::Reference => DocTab::Audit,
        }
    }

    fn index(self) -> usize {
        match self {
            DocTab::Audit => 0,
            DocTab::Reference => 1,
        }
    }
}

#[derive(Debug)]
struct DocumentPanel {
    tab: DocTab,
    focus: SectionTopic,
    scroll: u16,
    reference_scroll: u16,
}

impl Default for DocumentPanel {
    fn default() -> Self {
        Self {
            tab: DocTab::Audit,
            focus: SectionTopic::Forces,
            scroll: 0,
            reference_scroll: 0,
        }
    }
}

impl DocumentPanel {
    fn active_scroll(&mut self) -> &mut u16 {
        match self.tab {
            DocTab::Audit => &mut self.scroll,
            DocTab::Reference => &mut self.reference_scroll,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum FormField {
    #[default]
    Title,
    Subtitle,
    Text,
}

impl FormField {
    const ALL: [FormField; 3] = [FormField::Title, FormField::Subtitle, FormField::Text];

    fn next(self) -> Self {
        match self {
            FormField::Title => FormField::Subtitle,
            FormField::Subtitle => FormField::Text,
            FormField::Text => FormField::Title,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Title => FormField::Text,
            FormField::Subtitle => FormField::Title,
            FormField::Text => FormField::Subtitle,
        }
    }

    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Titre",
            FormField::Subtitle => "Sous-titre (optionnel)",
            FormField::Text => "Texte complet",
        }
    }
}

#[derive(Debug, Default)]
struct DocumentFormPanel {
    open: bool,
    field: FormField,
    title: String,
    subtitle: String,
    text: String,
    error: Option<String>,
}

impl DocumentFormPanel {
    fn open(&mut self) {
        *self = Self {
            open: true,
            ..Self::default()
        };
    }

    fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Title => &self.title,
            FormField::Subtitle => &self.subtitle,
            FormField::Text => &self.text,
        }
    }

    fn field_mut(&mut self) -> &mut String {
        self.error = None;
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Subtitle => &mut self.subtitle,
            FormField::Text => &mut self.text,
        }
    }

    fn draft(&self) -> DocumentDraft {
        DocumentDraft {
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            full_text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputPurpose {
    Note(SectionTopic),
    FollowUp(SectionTopic),
    ImportPath,
}

impl InputPurpose {
    fn title(self) -> String {
        match self {
            InputPurpose::Note(topic) => format!("Note · {topic}"),
            InputPurpose::FollowUp(topic) => format!("Question de suivi · {topic}"),
            InputPurpose::ImportPath => "Importer un fichier JSON".to_string(),
        }
    }

    fn is_multiline(self) -> bool {
        matches!(self, InputPurpose::Note(_))
    }
}

#[derive(Debug)]
struct InputPanel {
    open: bool,
    purpose: InputPurpose,
    input: String,
    error: Option<String>,
}

impl Default for InputPanel {
    fn default() -> Self {
        Self {
            open: false,
            purpose: InputPurpose::ImportPath,
            input: String::new(),
            error: None,
        }
    }
}

impl InputPanel {
    fn open_for(&mut self, purpose: InputPurpose, initial: String) {
        self.open = true;
        self.purpose = purpose;
        self.input = initial;
        self.error = None;
    }

    fn close(&mut self) {
        self.open = false;
        self.input.clear();
        self.error = None;
    }
}

#[derive(Debug, Default)]
struct DataPanel {
    open: bool,
    selected: usize,
    confirm_reset: bool,
}

#[derive(Debug)]
struct Notice {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

impl Notice {
    fn new(text: String, is_error: bool) -> Self {
        Self {
            text,
            is_error,
            shown_at: Instant::now(),
        }
    }
}

fn import_error_message(err: &PersistError) -> String {
    match err {
        PersistError::Parse(_) => "Format JSON invalide.".to_string(),
        other => other.to_string(),
    }
}

/// Styled lines for untrusted response markup. Paragraphs are separated by a blank line.
fn markup_lines(text: &str, strong_style: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (idx, paragraph) in markup::render_markup(text).into_iter().enumerate() {
        if idx > 0 {
            lines.push(Line::raw(""));
        }
        let mut current: Vec<Span<'static>> = Vec::new();
        for span in paragraph {
            let style = if span.strong {
                strong_style
            } else {
                Style::default()
            };
            let mut parts = span.text.split('\n');
            if let Some(first) = parts.next()
                && !first.is_empty()
            {
                current.push(Span::styled(first.to_string(), style));
            }
            for part in parts {
                lines.push(Line::from(std::mem::take(&mut current)));
                if !part.is_empty() {
                    current.push(Span::styled(part.to_string(), style));
                }
            }
        }
        lines.push(Line::from(current));
    }
    lines
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
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

fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0usize;

    for word in text.split_whitespace() {
        let word_width = UnicodeWidthStr::width(word);
        let sep_width = if current.is_empty() { 0 } else { 1 };

        if current_width + sep_width + word_width <= max_width {
            if !current.is_empty() {
                current.push(' ');
                current_width += 1;
            }
            current.push_str(word);
            current_width += word_width;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }

        if word_width <= max_width {
            current.push_str(word);
            current_width = word_width;
            continue;
        }

        let mut chunk = String::new();
        let mut chunk_width = 0usize;
        for ch in word.chars() {
            let mut buf = [0u8; 4];
            let w = UnicodeWidthStr::width(&*ch.encode_utf8(&mut buf));
            if chunk_width + w > max_width && !chunk.is_empty() {
                lines.push(std::mem::take(&mut chunk));
                chunk_width = 0;
            }
            chunk.push(ch);
            chunk_width += w;
        }
        if !chunk.is_empty() {
            current_width = chunk_width;
            current = chunk;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        vec![String::new()]
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use audit_application::{AnalysisRequest, TextCollaborator};
    use audit_engine::MutedSpeech;
    use audit_storage::{MemoryStore, SLOT_KEY};

    use super::*;

    struct Unused;

    impl TextCollaborator for Unused {
        fn analyze(&self, _request: &AnalysisRequest) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::MissingCredentials)
        }
    }

    fn ui_on_sphinx(gateway: &SnapshotGateway<MemoryStore>) -> Ui<'_, MemoryStore> {
        let mut session = ReviewSession::new();
        assert!(session.select(&DocumentId::new("sphinx")));
        let mut ui = Ui::new(UiContext {
            session,
            settings: Settings::default(),
            gateway,
            dispatcher: Dispatcher::new(Arc::new(Unused), Arc::new(MutedSpeech)),
            playback: PlaybackController::silent(),
            export_dir: PathBuf::from("."),
        });
        ui.screen = Screen::Document;
        ui
    }

    fn press(ui: &mut Ui<'_, MemoryStore>, code: KeyCode) {
        ui.handle_input_key(KeyEvent::new(code, KeyModifiers::NONE))
            .expect("input key handled");
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn markup_lines_separate_paragraphs() {
        let strong = Style::default().add_modifier(Modifier::BOLD);
        let lines = markup_lines("Un <strong>point</strong> clé.\n\nSecond", strong);
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["Un point clé.", "", "Second"]);
        assert_eq!(lines[0].spans[1].style, strong);
        assert_eq!(lines[0].spans[0].style, Style::default());
    }

    #[test]
    fn markup_lines_split_single_newlines() {
        let lines = markup_lines("ligne une\nligne deux", Style::default());
        let texts: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["ligne une", "ligne deux"]);
    }

    #[test]
    fn markup_lines_drop_unknown_tags() {
        let lines = markup_lines("<script>alert</script> texte", Style::default());
        assert_eq!(line_text(&lines[0]), "alert texte");
    }

    #[test]
    fn wrap_text_respects_width() {
        assert_eq!(
            wrap_text("Audit stratégique du cabinet", 12),
            vec!["Audit", "stratégique", "du cabinet"]
        );
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn wrap_text_splits_long_words() {
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn form_fields_cycle_both_ways() {
        for field in FormField::ALL {
            assert_eq!(field.next().prev(), field);
        }
    }

    #[test]
    fn form_draft_carries_every_field() {
        let mut form = DocumentFormPanel::default();
        form.open();
        form.field_mut().push_str("Projet");
        form.field = FormField::Text;
        form.field_mut().push_str("Corps");
        let draft = form.draft();
        assert_eq!(draft.title, "Projet");
        assert_eq!(draft.subtitle, "");
        assert_eq!(draft.full_text, "Corps");
    }

    #[test]
    fn parse_failures_read_as_invalid_json() {
        let err = audit_storage::parse_snapshot("{").unwrap_err();
        assert_eq!(import_error_message(&err), "Format JSON invalide.");
    }

    #[test]
    fn note_keystrokes_are_saved_before_enter() -> anyhow::Result<()> {
        let gateway = SnapshotGateway::new(MemoryStore::new());
        let mut ui = ui_on_sphinx(&gateway);
        ui.input.open_for(InputPurpose::Note(SectionTopic::Faiblesses), String::new());

        press(&mut ui, KeyCode::Char('R'));
        assert_eq!(ui.session.note(SectionTopic::Faiblesses), "R");
        press(&mut ui, KeyCode::Char('x'));
        press(&mut ui, KeyCode::Backspace);
        press(&mut ui, KeyCode::Char('é'));
        ui.persist_if_changed();
        let slot = gateway.store().read(SLOT_KEY)?.unwrap_or_default();
        assert!(slot.contains("\"sphinx-faiblesses\":\"Ré\""));

        press(&mut ui, KeyCode::Esc);
        assert!(!ui.input.open);
        assert_eq!(ui.session.note(SectionTopic::Faiblesses), "Ré");
        Ok(())
    }

    #[test]
    fn clearing_a_note_is_saved_too() {
        let gateway = SnapshotGateway::new(MemoryStore::new());
        let mut ui = ui_on_sphinx(&gateway);
        ui.input.open_for(InputPurpose::Note(SectionTopic::Forces), String::new());
        press(&mut ui, KeyCode::Char('a'));
        ui.handle_input_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL))
            .expect("input key handled");
        assert_eq!(ui.session.note(SectionTopic::Forces), "");
    }

    #[test]
    fn follow_up_text_waits_for_enter() {
        let gateway = SnapshotGateway::new(MemoryStore::new());
        let mut ui = ui_on_sphinx(&gateway);
        let before = ui.session.revision();
        ui.input.open_for(InputPurpose::FollowUp(SectionTopic::Forces), String::new());
        press(&mut ui, KeyCode::Char('?'));
        assert_eq!(ui.session.revision(), before);
        assert_eq!(ui.input.input, "?");
    }

    #[test]
    fn only_notes_accept_newlines() {
        assert!(InputPurpose::Note(SectionTopic::Forces).is_multiline());
        assert!(!InputPurpose::FollowUp(SectionTopic::Forces).is_multiline());
        assert!(!InputPurpose::ImportPath.is_multiline());
    }
}
