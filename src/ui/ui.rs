use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::backend::error::{FetchError, ResolveError};
use crate::backend::pagination::Pagination;
use crate::backend::resolver::CharacterImage;
use crate::backend::rickmorty::{CharacterRecord, EpisodePage, EpisodeRecord};

const TITLE: &str = "Rick & Morty";
const BLURB: &str = "Rick is a mentally-unbalanced but scientifically-gifted old man who has \
recently reconnected with his family. He spends most of his time involving his young grandson \
Morty in dangerous, outlandish adventures throughout space and alternate universes.";

/// Terminal rows taken by one character row on the detail screen.
pub const CHARACTER_ROW_HEIGHT: u16 = 4;
const PORTRAIT_WIDTH: u16 = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum View {
    #[default]
    EpisodeList,
    EpisodeDetail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Pending,
    Loaded(CharacterRecord),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Missing,
    Loaded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CharacterRow {
    pub reference: String,
    pub state: RowState,
    pub image: ImageState,
}

impl CharacterRow {
    fn image_ref(&self) -> Option<&str> {
        match &self.state {
            RowState::Loaded(record) => Some(record.image_ref.as_str()),
            _ => None,
        }
    }
}

/// The open episode plus one row per character reference, in reference order.
#[derive(Debug)]
pub struct EpisodeDetail {
    pub episode: EpisodeRecord,
    pub rows: Vec<CharacterRow>,
    pub selected: usize,
    pub offset: usize,
    pub visible: Range<usize>,
    pending_records: HashSet<String>,
    pending_images: HashSet<String>,
}

impl EpisodeDetail {
    fn new(episode: EpisodeRecord) -> Self {
        let rows = episode
            .character_refs
            .iter()
            .map(|reference| CharacterRow {
                reference: reference.clone(),
                state: RowState::Pending,
                image: ImageState::Missing,
            })
            .collect();

        Self {
            episode,
            rows,
            selected: 0,
            offset: 0,
            visible: 0..0,
            pending_records: HashSet::new(),
            pending_images: HashSet::new(),
        }
    }

    /// Scrolls so the selection stays on screen and records which rows are
    /// visible. Called on every draw.
    pub fn update_viewport(&mut self, rows_fit: usize) {
        let rows_fit = rows_fit.max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + rows_fit {
            self.offset = self.selected + 1 - rows_fit;
        }
        let end = (self.offset + rows_fit).min(self.rows.len());
        self.visible = self.offset.min(end)..end;
    }

    fn rows_for_reference(&self, reference: &str) -> Vec<usize> {
        self.episode
            .character_refs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.as_str() == reference)
            .map(|(i, _)| i)
            .collect()
    }

    fn rows_for_image(&self, image_ref: &str) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.image_ref() == Some(image_ref))
            .map(|(i, _)| i)
            .collect()
    }
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub pagination: Pagination,
    pub list_state: ListState,
    pub list_last_visible: Option<usize>,
    pub page_failed: bool,
    pub detail: Option<EpisodeDetail>,
    pub status: Option<String>,
    pub picker: Option<Picker>,
    pub image_states: HashMap<String, StatefulProtocol>,
}

impl App {
    pub fn new(picker: Option<Picker>) -> Self {
        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::EpisodeList,
            pagination: Pagination::new(),
            list_state: ListState::default(),
            list_last_visible: None,
            page_failed: false,
            detail: None,
            status: None,
            picker,
            image_states: HashMap::new(),
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn episodes(&self) -> &[EpisodeRecord] {
        self.pagination.episodes()
    }

    /// Claims the next page if the last loaded row is on screen. A failed
    /// load is not retried until the user asks for it.
    pub fn next_page_due(&mut self) -> Option<u32> {
        if self.page_failed || self.view != View::EpisodeList {
            return None;
        }
        let last_visible = self.list_last_visible?;
        if self.pagination.should_load_more(last_visible) {
            self.pagination.request_next()
        } else {
            None
        }
    }

    pub fn retry_page(&mut self) -> Option<u32> {
        self.page_failed = false;
        self.status = None;
        self.pagination.request_next()
    }

    pub fn apply_page(&mut self, page: u32, result: Result<EpisodePage, FetchError>) {
        match result {
            Ok(fetched) => {
                if self.pagination.apply(page, fetched) {
                    self.page_failed = false;
                    if self.list_state.selected().is_none() && !self.episodes().is_empty() {
                        self.list_state.select(Some(0));
                    }
                }
            }
            Err(e) => {
                log::warn!("episode page {page} failed: {e}");
                self.pagination.fail(page);
                self.page_failed = true;
                self.status = Some(format!("Could not load page {page}: {e} (r to retry)"));
            }
        }
        self.set_ready();
    }

    pub fn select_next_episode(&mut self) {
        let len = self.episodes().len();
        if len == 0 {
            return;
        }
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some((selected + 1).min(len - 1)));
    }

    pub fn select_prev_episode(&mut self) {
        let selected = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(selected.saturating_sub(1)));
    }

    /// Switches to the detail screen and returns every distinct character
    /// reference of the episode, in order, for resolution.
    pub fn open_selected_episode(&mut self) -> Option<(u32, Vec<String>)> {
        let selected = self.list_state.selected()?;
        let episode = self.episodes().get(selected).cloned()?;

        let mut detail = EpisodeDetail::new(episode);
        let mut references = Vec::new();
        for reference in &detail.episode.character_refs {
            if detail.pending_records.insert(reference.clone()) {
                references.push(reference.clone());
            }
        }

        let episode_id = detail.episode.id;
        self.detail = Some(detail);
        self.view = View::EpisodeDetail;
        self.status = None;
        Some((episode_id, references))
    }

    pub fn go_back(&mut self) {
        self.view = View::EpisodeList;
        self.detail = None;
        self.image_states.clear();
    }

    pub fn select_next_character(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            if detail.selected + 1 < detail.rows.len() {
                detail.selected += 1;
            }
        }
    }

    pub fn select_prev_character(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            detail.selected = detail.selected.saturating_sub(1);
        }
    }

    /// Applies a finished character lookup. Returns false, changing nothing
    /// on screen, when the episode is no longer open or none of the
    /// reference's rows are visible.
    pub fn apply_character(
        &mut self,
        episode_id: u32,
        reference: &str,
        result: Result<CharacterRecord, ResolveError>,
    ) -> bool {
        let Some(detail) = self.detail.as_mut().filter(|d| d.episode.id == episode_id) else {
            log::debug!("dropping {reference}: episode {episode_id} is no longer open");
            return false;
        };

        detail.pending_records.remove(reference);
        let rows = detail.rows_for_reference(reference);
        if !rows.iter().any(|i| detail.visible.contains(i)) {
            log::debug!("dropping {reference}: row not visible");
            return false;
        }

        let state = match result {
            Ok(record) => RowState::Loaded(record),
            Err(e) => {
                log::warn!("could not resolve {reference}: {e}");
                RowState::Failed(e.to_string())
            }
        };
        for i in rows {
            detail.rows[i].state = state.clone();
        }
        true
    }

    /// Same contract as [`App::apply_character`], for portraits.
    pub fn apply_image(
        &mut self,
        episode_id: u32,
        image_ref: &str,
        result: Result<CharacterImage, ResolveError>,
    ) -> bool {
        let Some(detail) = self.detail.as_mut().filter(|d| d.episode.id == episode_id) else {
            return false;
        };

        detail.pending_images.remove(image_ref);
        let rows = detail.rows_for_image(image_ref);
        if !rows.iter().any(|i| detail.visible.contains(i)) {
            return false;
        }

        let image_state = match result {
            Ok(image) => {
                if let Some(ref picker) = self.picker {
                    let protocol = picker.new_resize_protocol((*image).clone());
                    self.image_states.insert(image_ref.to_string(), protocol);
                }
                ImageState::Loaded
            }
            Err(e) => {
                log::warn!("could not load image {image_ref}: {e}");
                ImageState::Failed
            }
        };
        for i in rows {
            detail.rows[i].image = image_state;
        }
        true
    }

    /// Visible rows with no record yet and no lookup in flight. These are
    /// marked in flight before returning.
    pub fn records_to_request(&mut self) -> Option<(u32, Vec<String>)> {
        let detail = self.detail.as_mut()?;
        let mut wanted = Vec::new();
        for i in detail.visible.clone() {
            let row = &detail.rows[i];
            if row.state == RowState::Pending
                && detail.pending_records.insert(row.reference.clone())
            {
                wanted.push(row.reference.clone());
            }
        }
        Some((detail.episode.id, wanted))
    }

    /// Visible rows with a record but no portrait yet.
    pub fn images_to_request(&mut self) -> Option<(u32, Vec<String>)> {
        let detail = self.detail.as_mut()?;
        let mut wanted = Vec::new();
        for i in detail.visible.clone() {
            let row = &detail.rows[i];
            if row.image != ImageState::Missing {
                continue;
            }
            let Some(image_ref) = row.image_ref().map(str::to_string) else {
                continue;
            };
            if self.image_states.contains_key(&image_ref) {
                detail.rows[i].image = ImageState::Loaded;
                continue;
            }
            if detail.pending_images.insert(image_ref.clone()) {
                wanted.push(image_ref);
            }
        }
        Some((detail.episode.id, wanted))
    }
}

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => draw_loading_screen(f, app),
        AppState::Ready => match app.view {
            View::EpisodeList => draw_episode_list(f, app),
            View::EpisodeDetail => draw_episode_detail(f, app),
        },
    }
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(TITLE)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let spinner = spinner_frames[(millis / 100) as usize % spinner_frames.len()];

    let loading_text = Line::from(vec![
        Span::styled(
            format!(" {} ", spinner),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Loading...",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    let loading_paragraph = Paragraph::new(loading_text).alignment(Alignment::Center);
    f.render_widget(loading_paragraph, center_layout[1]);

    let message = Paragraph::new(&*app.loading_message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_episode_list(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // title + blurb
            Constraint::Min(5),    // episodes
            Constraint::Length(3), // footer
        ])
        .split(area);

    let header = Paragraph::new(BLURB)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Gray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(TITLE)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    f.render_widget(header, root[0]);

    let episodes = app.pagination.episodes();
    let items: Vec<ListItem> = episodes
        .iter()
        .map(|episode| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<8}", episode.episode_code),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::styled(episode.name.clone(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  {}", episode.air_date),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let title = match (app.pagination.in_flight(), app.pagination.total_pages()) {
        (Some(page), _) => format!("Episodes (loading page {page}...)"),
        (None, Some(total)) => format!(
            "Episodes (page {}/{})",
            app.pagination.current_page(),
            total
        ),
        (None, None) => "Episodes".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Yellow));
    let inner_height = block.inner(root[1]).height as usize;

    if items.is_empty() {
        let empty = Paragraph::new("No episodes loaded")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, root[1]);
        app.list_last_visible = None;
    } else {
        let count = items.len();
        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, root[1], &mut app.list_state);

        let last = (app.list_state.offset() + inner_height).min(count);
        app.list_last_visible = last.checked_sub(1);
    }

    draw_footer(
        f,
        root[2],
        &[("↑/↓", "select"), ("Enter", "cast"), ("r", "retry"), ("q", "quit")],
        app.status.as_deref(),
    );
}

fn draw_episode_detail(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let App {
        detail,
        image_states,
        status,
        ..
    } = app;
    let Some(detail) = detail.as_mut() else {
        return;
    };

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // episode header
            Constraint::Min(CHARACTER_ROW_HEIGHT),
            Constraint::Length(3), // footer
        ])
        .split(area);

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            detail.episode.name.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            detail.episode.air_date.clone(),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(detail.episode.episode_code.clone())
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, root[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Characters ({})", detail.rows.len()))
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(root[1]);
    f.render_widget(block, root[1]);

    detail.update_viewport((inner.height / CHARACTER_ROW_HEIGHT) as usize);

    for (slot, i) in detail.visible.clone().enumerate() {
        let row_area = Rect::new(
            inner.x,
            inner.y + slot as u16 * CHARACTER_ROW_HEIGHT,
            inner.width,
            CHARACTER_ROW_HEIGHT,
        );
        let row = &detail.rows[i];
        let image_state = match row.image_ref() {
            Some(image_ref) => image_states.get_mut(image_ref),
            None => None,
        };
        draw_character_row(f, row_area, row, i == detail.selected, image_state);
    }

    draw_footer(
        f,
        root[2],
        &[("↑/↓", "scroll"), ("o", "open in browser"), ("Esc", "back"), ("q", "quit")],
        status.as_deref(),
    );
}

fn draw_character_row(
    f: &mut Frame,
    area: Rect,
    row: &CharacterRow,
    selected: bool,
    image_state: Option<&mut StatefulProtocol>,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(PORTRAIT_WIDTH), Constraint::Min(10)])
        .split(area);

    match (row.image, image_state) {
        (ImageState::Loaded, Some(state)) => {
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            f.render_stateful_widget(image_widget, columns[0], state);
        }
        (ImageState::Failed, _) => {
            let placeholder = Paragraph::new("✕")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Red));
            f.render_widget(placeholder, columns[0]);
        }
        _ => {
            let placeholder = Paragraph::new("…")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(placeholder, columns[0]);
        }
    }

    let name_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let width = columns[1].width.saturating_sub(1) as usize;

    let lines = match &row.state {
        RowState::Pending => vec![Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))],
        RowState::Loaded(record) => vec![
            Line::from(Span::styled(truncate_text(&record.name, width), name_style)),
            Line::from(Span::styled(
                truncate_text(&record.species, width),
                Style::default().fg(Color::Gray),
            )),
        ],
        RowState::Failed(reason) => vec![
            Line::from(Span::styled(
                "Unavailable",
                Style::default().fg(Color::Red),
            )),
            Line::from(Span::styled(
                truncate_text(reason, width),
                Style::default().fg(Color::DarkGray),
            )),
        ],
    };
    f.render_widget(Paragraph::new(lines), columns[1]);
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

fn draw_footer(f: &mut Frame, area: Rect, keys: &[(&str, &str)], status: Option<&str>) {
    let line = match status {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => {
            let mut spans = Vec::new();
            for (key, action) in keys {
                spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
                spans.push(Span::raw(format!(": {action}  ")));
            }
            Line::from(spans)
        }
    };

    let p = Paragraph::new(line)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}
