use crate::api::{ApiError, Client};
use crate::config;
use crate::model::{
    format_form_date, parse_color, parse_form_date, parse_form_time, DaySpan, Event, EventPayload,
    MonthData, MonthGrid, Subevent, ViewState, YearData, YearMonth, MOODS,
};
use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::Duration;

pub fn run(client: Client) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(client);
    app.refresh_month();
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    api: Client,
    today: NaiveDate,
    state: ViewState,
    cursor_day: u32,
    month: Option<MonthData>,
    year_data: Option<YearData>,
    year_cursor: usize,
    diary: Vec<Event>,
    diary_offset: usize,
    sidebar: Option<DayPanel>,
    focus: Focus,
    view: ViewMode,
    mode: Mode,
    status: String,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ViewMode {
    Month,
    Year,
    Diary,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Month => "Month",
            ViewMode::Year => "Year",
            ViewMode::Diary => "Diary",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    Grid,
    Sidebar,
}

enum Mode {
    Normal,
    Entry { action: EntryAction, form: EntryForm },
    ConfirmDeleteEvent { id: i64, name: String },
    ConfirmDeleteSubevent { id: i64, name: String },
    MoodPicker { day: u32, selected: usize },
    Login(LoginForm),
}

#[derive(Clone, Copy)]
enum EntryAction {
    CreateEvent,
    EditEvent(i64),
    CreateSubevent(i64),
    EditSubevent(i64),
}

impl EntryAction {
    fn is_subevent(&self) -> bool {
        matches!(
            self,
            EntryAction::CreateSubevent(_) | EntryAction::EditSubevent(_)
        )
    }

    fn title(&self) -> &'static str {
        match self {
            EntryAction::CreateEvent => "New Event",
            EntryAction::EditEvent(_) => "Edit Event",
            EntryAction::CreateSubevent(_) => "Add Subevent",
            EntryAction::EditSubevent(_) => "Edit Subevent",
        }
    }
}

/// The sidebar rows flatten each event followed by its subevents so a single
/// cursor walks both levels.
#[derive(Copy, Clone)]
enum RowKind {
    Event(usize),
    Sub(usize, usize),
}

struct DayPanel {
    day: u32,
    events: Vec<Event>,
    rows: Vec<RowKind>,
    selected: usize,
    offset: usize,
    error: Option<String>,
}

impl DayPanel {
    fn new(day: u32, events: Vec<Event>) -> Self {
        let mut rows = Vec::new();
        for (i, event) in events.iter().enumerate() {
            rows.push(RowKind::Event(i));
            for (j, _) in event.subevents.iter().enumerate() {
                rows.push(RowKind::Sub(i, j));
            }
        }
        DayPanel {
            day,
            events,
            rows,
            selected: 0,
            offset: 0,
            error: None,
        }
    }

    fn failed(day: u32, message: impl Into<String>) -> Self {
        DayPanel {
            day,
            events: Vec::new(),
            rows: Vec::new(),
            selected: 0,
            offset: 0,
            error: Some(message.into()),
        }
    }

    fn selected_row(&self) -> Option<RowKind> {
        self.rows.get(self.selected).copied()
    }

    fn selected_event(&self) -> Option<&Event> {
        match self.selected_row()? {
            RowKind::Event(i) | RowKind::Sub(i, _) => self.events.get(i),
        }
    }

    fn clamp(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
            self.offset = 0;
        } else {
            self.selected = self.selected.min(self.rows.len() - 1);
        }
    }
}

struct EntryForm {
    name: FieldValue,
    start_date: FieldValue,
    start_time: FieldValue,
    end_date: FieldValue,
    end_time: FieldValue,
    location: FieldValue,
    with_who: FieldValue,
    notes: FieldValue,
    field: EntryField,
    subevent: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum EntryField {
    Name,
    StartDate,
    StartTime,
    EndDate,
    EndTime,
    Location,
    WithWho,
    Notes,
}

impl EntryForm {
    fn for_day(date: NaiveDate, subevent: bool) -> Self {
        let formatted = format_form_date(date);
        EntryForm {
            name: FieldValue::new(""),
            start_date: FieldValue::new(&formatted),
            start_time: FieldValue::new(""),
            end_date: FieldValue::new(&formatted),
            end_time: FieldValue::new(""),
            location: FieldValue::new(""),
            with_who: FieldValue::new(""),
            notes: FieldValue::new(""),
            field: EntryField::Name,
            subevent,
        }
    }

    fn from_event(event: &Event) -> Self {
        let end = event.end_time.unwrap_or(event.start_time);
        EntryForm {
            name: FieldValue::new(&event.name),
            start_date: FieldValue::new(&format_form_date(event.start_time.date())),
            start_time: FieldValue::new(&event.start_time.format("%H:%M").to_string()),
            end_date: FieldValue::new(&format_form_date(end.date())),
            end_time: FieldValue::new(
                &event
                    .end_time
                    .map(|e| e.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ),
            location: FieldValue::new(event.location.as_deref().unwrap_or_default()),
            with_who: FieldValue::new(event.with_who.as_deref().unwrap_or_default()),
            notes: FieldValue::new(event.notes.as_deref().unwrap_or_default()),
            field: EntryField::Name,
            subevent: false,
        }
    }

    fn from_subevent(sub: &Subevent) -> Self {
        let end = sub.end_time.unwrap_or(sub.start_time);
        EntryForm {
            name: FieldValue::new(&sub.name),
            start_date: FieldValue::new(&format_form_date(sub.start_time.date())),
            start_time: FieldValue::new(&sub.start_time.format("%H:%M").to_string()),
            end_date: FieldValue::new(&format_form_date(end.date())),
            end_time: FieldValue::new(
                &sub.end_time
                    .map(|e| e.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ),
            location: FieldValue::new(sub.location.as_deref().unwrap_or_default()),
            with_who: FieldValue::new(""),
            notes: FieldValue::new(sub.notes.as_deref().unwrap_or_default()),
            field: EntryField::Name,
            subevent: true,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            EntryField::Name => EntryField::StartDate,
            EntryField::StartDate => EntryField::StartTime,
            EntryField::StartTime => EntryField::EndDate,
            EntryField::EndDate => EntryField::EndTime,
            EntryField::EndTime => EntryField::Location,
            EntryField::Location => {
                if self.subevent {
                    EntryField::Notes
                } else {
                    EntryField::WithWho
                }
            }
            EntryField::WithWho => EntryField::Notes,
            EntryField::Notes => EntryField::Name,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            EntryField::Name => EntryField::Notes,
            EntryField::StartDate => EntryField::Name,
            EntryField::StartTime => EntryField::StartDate,
            EntryField::EndDate => EntryField::StartTime,
            EntryField::EndTime => EntryField::EndDate,
            EntryField::Location => EntryField::EndTime,
            EntryField::WithWho => EntryField::Location,
            EntryField::Notes => {
                if self.subevent {
                    EntryField::Location
                } else {
                    EntryField::WithWho
                }
            }
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            EntryField::Name => &mut self.name,
            EntryField::StartDate => &mut self.start_date,
            EntryField::StartTime => &mut self.start_time,
            EntryField::EndDate => &mut self.end_date,
            EntryField::EndTime => &mut self.end_time,
            EntryField::Location => &mut self.location,
            EntryField::WithWho => &mut self.with_who,
            EntryField::Notes => &mut self.notes,
        }
    }

    /// Name and start date are required; dates are DD-MM-YYYY and times
    /// HH:MM. An empty end date falls back to the start date.
    fn to_payload(&self) -> Result<EventPayload> {
        let name = self.name.value.trim();
        if name.is_empty() {
            return Err(anyhow!("name is required"));
        }
        let start_date = self.start_date.value.trim();
        if start_date.is_empty() {
            return Err(anyhow!("start date is required"));
        }
        if parse_form_date(start_date).is_none() {
            return Err(anyhow!("invalid start date (use DD-MM-YYYY): {}", start_date));
        }
        let end_date = {
            let raw = self.end_date.value.trim();
            if raw.is_empty() {
                start_date.to_string()
            } else {
                if parse_form_date(raw).is_none() {
                    return Err(anyhow!("invalid end date (use DD-MM-YYYY): {}", raw));
                }
                raw.to_string()
            }
        };
        let start_time = opt_time(&self.start_time)?;
        let end_time = opt_time(&self.end_time)?;

        Ok(EventPayload {
            name: name.to_string(),
            start_date: start_date.to_string(),
            start_time,
            end_date,
            end_time,
            location: opt_text(&self.location),
            with_who: if self.subevent {
                None
            } else {
                opt_text(&self.with_who)
            },
            notes: opt_text(&self.notes),
        })
    }
}

fn opt_text(field: &FieldValue) -> Option<String> {
    let trimmed = field.value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn opt_time(field: &FieldValue) -> Result<Option<String>> {
    let trimmed = field.value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if parse_form_time(trimmed).is_none() {
        return Err(anyhow!("invalid time (use HH:MM): {}", trimmed));
    }
    Ok(Some(trimmed.to_string()))
}

struct LoginForm {
    username: FieldValue,
    password: FieldValue,
    on_password: bool,
}

impl LoginForm {
    fn new() -> Self {
        LoginForm {
            username: FieldValue::new(""),
            password: FieldValue::new(""),
            on_password: false,
        }
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        if self.on_password {
            &mut self.password
        } else {
            &mut self.username
        }
    }
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    fn masked(&self, active: bool) -> String {
        let mut text: String = "*".repeat(self.value.chars().count());
        if active {
            text.push('▌');
        }
        text
    }
}

impl App {
    fn new(api: Client) -> Self {
        let today = Local::now().date_naive();
        let authed = api.cookie().is_some();
        App {
            api,
            today,
            state: ViewState::of(today),
            cursor_day: today.day(),
            month: None,
            year_data: None,
            year_cursor: today.month() as usize - 1,
            diary: Vec::new(),
            diary_offset: 0,
            sidebar: None,
            focus: Focus::Grid,
            view: ViewMode::Month,
            mode: Mode::Normal,
            status: if authed {
                "Session restored".into()
            } else {
                "Browsing as guest (press L to log in)".into()
            },
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let TermEvent::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Entry { .. } => self.handle_entry_key(key),
            Mode::ConfirmDeleteEvent { .. } | Mode::ConfirmDeleteSubevent { .. } => {
                self.handle_confirm_key(key)
            }
            Mode::MoodPicker { .. } => self.handle_mood_key(key),
            Mode::Login(_) => self.handle_login_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => {
                self.set_view(ViewMode::Month);
                return Ok(false);
            }
            KeyCode::Char('2') => {
                self.set_view(ViewMode::Year);
                return Ok(false);
            }
            KeyCode::Char('3') => {
                self.set_view(ViewMode::Diary);
                return Ok(false);
            }
            KeyCode::Char('j') => {
                self.state.prev_year();
                self.refresh_view();
                return Ok(false);
            }
            KeyCode::Char('k') => {
                self.state.next_year();
                self.refresh_view();
                return Ok(false);
            }
            KeyCode::Char('t') => {
                self.state = ViewState::of(self.today);
                self.cursor_day = self.today.day();
                self.year_cursor = self.today.month() as usize - 1;
                self.refresh_view();
                return Ok(false);
            }
            KeyCode::Char('r') => {
                self.refresh_view();
                return Ok(false);
            }
            KeyCode::Char('L') => {
                self.mode = Mode::Login(LoginForm::new());
                self.status = "Log in (Tab switches field, Enter submits, Esc cancels)".into();
                return Ok(false);
            }
            KeyCode::Char('O') => {
                self.logout();
                return Ok(false);
            }
            _ => {}
        }

        match self.view {
            ViewMode::Month => self.handle_month_key(key),
            ViewMode::Year => self.handle_year_key(key),
            ViewMode::Diary => self.handle_diary_key(key),
        }
    }

    fn handle_month_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('h') => {
                self.state.prev_month();
                self.refresh_month();
                return Ok(false);
            }
            KeyCode::Char('l') => {
                self.state.next_month();
                self.refresh_month();
                return Ok(false);
            }
            KeyCode::Char('m') => {
                let selected = self
                    .month
                    .as_ref()
                    .and_then(|m| m.mood_colors.get(&self.cursor_day))
                    .and_then(|color| MOODS.iter().position(|mood| mood.color == color))
                    .unwrap_or(0);
                self.mode = Mode::MoodPicker {
                    day: self.cursor_day,
                    selected,
                };
                self.status =
                    "Pick a mood (←/→ choose, Enter set, x clear, Esc cancel)".into();
                return Ok(false);
            }
            _ => {}
        }

        match self.focus {
            Focus::Grid => self.handle_grid_key(key),
            Focus::Sidebar => self.handle_sidebar_key(key),
        }
    }

    fn handle_grid_key(&mut self, key: KeyEvent) -> Result<bool> {
        let days = self.state.days_in_month();
        match key.code {
            KeyCode::Left => {
                if self.cursor_day > 1 {
                    self.cursor_day -= 1;
                }
            }
            KeyCode::Right => {
                if self.cursor_day < days {
                    self.cursor_day += 1;
                }
            }
            KeyCode::Up => {
                if self.cursor_day > 7 {
                    self.cursor_day -= 7;
                }
            }
            KeyCode::Down => {
                if self.cursor_day + 7 <= days {
                    self.cursor_day += 7;
                }
            }
            KeyCode::Enter => self.open_sidebar(self.cursor_day),
            KeyCode::Tab => {
                if self.sidebar.is_some() {
                    self.focus = Focus::Sidebar;
                }
            }
            KeyCode::Char('n') => self.open_event_form(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Esc | KeyCode::Tab => {
                self.focus = Focus::Grid;
                return Ok(false);
            }
            KeyCode::Up => {
                if let Some(panel) = self.sidebar.as_mut() {
                    if panel.selected > 0 {
                        panel.selected -= 1;
                    }
                }
                return Ok(false);
            }
            KeyCode::Down => {
                if let Some(panel) = self.sidebar.as_mut() {
                    if panel.selected + 1 < panel.rows.len() {
                        panel.selected += 1;
                    }
                }
                return Ok(false);
            }
            KeyCode::Char('n') => {
                self.open_event_form();
                return Ok(false);
            }
            _ => {}
        }

        enum Act {
            EditEvent(Box<Event>),
            EditSub(i64),
            DeleteEvent(i64, String),
            DeleteSub(i64, String),
            AddSub(i64, NaiveDate),
            NoSelection,
            Nothing,
        }

        let act = {
            let Some(panel) = self.sidebar.as_ref() else {
                return Ok(false);
            };
            match (key.code, panel.selected_row()) {
                (KeyCode::Char('e'), Some(RowKind::Event(i))) => panel
                    .events
                    .get(i)
                    .map(|event| Act::EditEvent(Box::new(event.clone())))
                    .unwrap_or(Act::Nothing),
                (KeyCode::Char('e'), Some(RowKind::Sub(i, j))) => panel
                    .events
                    .get(i)
                    .and_then(|event| event.subevents.get(j))
                    .map(|sub| Act::EditSub(sub.id))
                    .unwrap_or(Act::Nothing),
                (KeyCode::Char('d'), Some(RowKind::Event(i))) => panel
                    .events
                    .get(i)
                    .map(|event| Act::DeleteEvent(event.id, event.name.clone()))
                    .unwrap_or(Act::Nothing),
                (KeyCode::Char('d'), Some(RowKind::Sub(i, j))) => panel
                    .events
                    .get(i)
                    .and_then(|event| event.subevents.get(j))
                    .map(|sub| Act::DeleteSub(sub.id, sub.name.clone()))
                    .unwrap_or(Act::Nothing),
                (KeyCode::Char('s'), Some(_)) => panel
                    .selected_event()
                    .map(|event| Act::AddSub(event.id, event.start_time.date()))
                    .unwrap_or(Act::Nothing),
                (KeyCode::Char('e') | KeyCode::Char('d') | KeyCode::Char('s'), None) => {
                    Act::NoSelection
                }
                _ => Act::Nothing,
            }
        };

        match act {
            Act::EditEvent(event) => {
                let form = EntryForm::from_event(&event);
                self.mode = Mode::Entry {
                    action: EntryAction::EditEvent(event.id),
                    form,
                };
                self.status = form_hint();
            }
            Act::EditSub(sub_id) => self.open_subevent_edit(sub_id),
            Act::DeleteEvent(id, name) => {
                self.status = format!("Delete \"{}\"? (y to confirm, n/Esc to cancel)", name);
                self.mode = Mode::ConfirmDeleteEvent { id, name };
            }
            Act::DeleteSub(id, name) => {
                self.status = format!(
                    "Delete subevent \"{}\"? (y to confirm, n/Esc to cancel)",
                    name
                );
                self.mode = Mode::ConfirmDeleteSubevent { id, name };
            }
            Act::AddSub(event_id, date) => {
                self.mode = Mode::Entry {
                    action: EntryAction::CreateSubevent(event_id),
                    form: EntryForm::for_day(date, true),
                };
                self.status = form_hint();
            }
            Act::NoSelection => self.status = "No event selected".into(),
            Act::Nothing => {}
        }
        Ok(false)
    }

    fn handle_year_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                if self.year_cursor > 0 {
                    self.year_cursor -= 1;
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.year_cursor < 11 {
                    self.year_cursor += 1;
                }
            }
            KeyCode::Up => {
                if self.year_cursor >= 4 {
                    self.year_cursor -= 4;
                }
            }
            KeyCode::Down => {
                if self.year_cursor + 4 < 12 {
                    self.year_cursor += 4;
                }
            }
            KeyCode::Enter => {
                self.state.month = self.year_cursor as u32 + 1;
                self.set_view(ViewMode::Month);
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_diary_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('h') => {
                self.state.prev_month();
                self.refresh_diary();
            }
            KeyCode::Char('l') => {
                self.state.next_month();
                self.refresh_diary();
            }
            KeyCode::Up => {
                self.diary_offset = self.diary_offset.saturating_sub(1);
            }
            KeyCode::Down => {
                self.diary_offset += 1;
            }
            KeyCode::PageUp => {
                self.diary_offset = self.diary_offset.saturating_sub(10);
            }
            KeyCode::PageDown => {
                self.diary_offset += 10;
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_entry_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut close_form = false;
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        if let Mode::Entry { action, form } = &mut mode {
            let action = *action;
            close_form = self.process_entry_key(action, form, key)?;
        }
        // A submit that hit an expired session swaps in the login dialog;
        // only restore the form when it stays open.
        if !close_form {
            self.mode = mode;
        }
        Ok(false)
    }

    fn process_entry_key(
        &mut self,
        action: EntryAction,
        form: &mut EntryForm,
        key: KeyEvent,
    ) -> Result<bool> {
        let mut close_form = false;
        match key.code {
            KeyCode::Esc => {
                close_form = true;
                self.status = "Canceled".into();
            }
            KeyCode::Tab => form.next_field(),
            KeyCode::BackTab => form.prev_field(),
            KeyCode::Left => form.active_field_mut().move_left(),
            KeyCode::Right => form.active_field_mut().move_right(),
            KeyCode::Enter => {
                let control = key.modifiers.contains(KeyModifiers::CONTROL);
                if form.field == EntryField::Notes && !control {
                    form.active_field_mut().insert_char('\n');
                } else {
                    close_form = self.try_submit_entry(action, form);
                }
            }
            KeyCode::Backspace => form.active_field_mut().backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
            }
            _ => {}
        }
        Ok(close_form)
    }

    fn try_submit_entry(&mut self, action: EntryAction, form: &EntryForm) -> bool {
        let payload = match form.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                self.status = format!("Could not save: {}", err);
                return false;
            }
        };
        let result = match action {
            EntryAction::CreateEvent => self.api.create_event(&payload),
            EntryAction::EditEvent(id) => self.api.update_event(id, &payload),
            EntryAction::CreateSubevent(event_id) => self.api.create_subevent(event_id, &payload),
            EntryAction::EditSubevent(id) => self.api.update_subevent(id, &payload),
        };
        match result {
            Ok(()) => {
                self.status = match action {
                    EntryAction::CreateEvent => "Event created".into(),
                    EntryAction::EditEvent(_) => "Event updated".into(),
                    EntryAction::CreateSubevent(_) => "Subevent added".into(),
                    EntryAction::EditSubevent(_) => "Subevent updated".into(),
                };
                if action.is_subevent() {
                    self.refresh_sidebar();
                } else {
                    self.refresh_sidebar();
                    self.refresh_month_summary();
                }
                true
            }
            Err(ApiError::Unauthorized) => {
                self.require_login();
                true
            }
            Err(err) => {
                self.status = format!("Could not save: {}", err);
                false
            }
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => match mode {
                Mode::ConfirmDeleteEvent { id, name } => {
                    match self.api.delete_event(id) {
                        Ok(()) => {
                            self.status = format!("Deleted \"{}\"", name);
                            self.refresh_sidebar();
                            self.refresh_month_summary();
                        }
                        Err(ApiError::Unauthorized) => self.require_login(),
                        Err(err) => self.status = format!("Delete failed: {}", err),
                    }
                }
                Mode::ConfirmDeleteSubevent { id, name } => {
                    match self.api.delete_subevent(id) {
                        Ok(()) => {
                            self.status = format!("Deleted subevent \"{}\"", name);
                            self.refresh_sidebar();
                        }
                        Err(ApiError::Unauthorized) => self.require_login(),
                        Err(err) => self.status = format!("Delete failed: {}", err),
                    }
                }
                _ => {}
            },
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
            }
            _ => {
                self.mode = mode;
            }
        }
        Ok(false)
    }

    fn handle_mood_key(&mut self, key: KeyEvent) -> Result<bool> {
        let (day, selected) = match &self.mode {
            Mode::MoodPicker { day, selected } => (*day, *selected),
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Mood unchanged".into();
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.mode = Mode::MoodPicker {
                    day,
                    selected: selected.saturating_sub(1),
                };
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.mode = Mode::MoodPicker {
                    day,
                    selected: (selected + 1).min(MOODS.len() - 1),
                };
            }
            KeyCode::Enter => {
                let mood = MOODS[selected.min(MOODS.len() - 1)];
                self.mode = Mode::Normal;
                self.submit_mood(day, Some(mood.color));
            }
            KeyCode::Char('x') | KeyCode::Backspace => {
                self.mode = Mode::Normal;
                self.submit_mood(day, None);
            }
            _ => {}
        }
        Ok(false)
    }

    fn submit_mood(&mut self, day: u32, color: Option<&str>) {
        match self
            .api
            .set_mood(self.state.year, self.state.month, day, color)
        {
            Ok(()) => {
                self.status = match color {
                    Some(_) => format!("Mood set for day {}", day),
                    None => format!("Mood cleared for day {}", day),
                };
                self.refresh_month_summary();
            }
            Err(ApiError::Unauthorized) => self.require_login(),
            Err(err) => self.status = format!("Could not update mood: {}", err),
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut submit = false;
        let mut close = false;
        if let Mode::Login(form) = &mut self.mode {
            match key.code {
                KeyCode::Esc => close = true,
                KeyCode::Tab | KeyCode::BackTab => form.on_password = !form.on_password,
                KeyCode::Left => form.active_field_mut().move_left(),
                KeyCode::Right => form.active_field_mut().move_right(),
                KeyCode::Backspace => form.active_field_mut().backspace(),
                KeyCode::Enter => submit = true,
                KeyCode::Char(c) => {
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                    {
                        form.active_field_mut().insert_char(c);
                    }
                }
                _ => {}
            }
        }
        if close {
            self.mode = Mode::Normal;
            self.status = "Login canceled".into();
            return Ok(false);
        }
        if submit {
            self.submit_login();
        }
        Ok(false)
    }

    fn submit_login(&mut self) {
        let (username, password) = match &self.mode {
            Mode::Login(form) => (form.username.value.clone(), form.password.value.clone()),
            _ => return,
        };
        let username = username.trim().to_string();
        if username.is_empty() {
            self.status = "Username is required".into();
            return;
        }
        match self.api.login(&username, &password) {
            Ok(()) => {
                if let Some(cookie) = self.api.cookie() {
                    let session = config::Session {
                        cookie: cookie.to_string(),
                    };
                    if let Ok(path) = config::session_path() {
                        if let Err(err) = config::save_session(&path, &session) {
                            self.status = format!("Logged in (session not saved: {})", err);
                            self.mode = Mode::Normal;
                            self.refresh_view();
                            return;
                        }
                    }
                }
                self.status = format!("Logged in as {}", username);
                self.mode = Mode::Normal;
                self.refresh_view();
            }
            Err(err) => {
                self.status = format!("Login failed: {}", err);
            }
        }
    }

    fn logout(&mut self) {
        if let Err(err) = self.api.logout() {
            self.status = format!("Logout failed: {}", err);
            return;
        }
        if let Ok(path) = config::session_path() {
            let _ = config::clear_session(&path);
        }
        self.sidebar = None;
        self.status = "Logged out".into();
        self.refresh_view();
    }

    fn require_login(&mut self) {
        self.mode = Mode::Login(LoginForm::new());
        self.status = "Authentication required — log in to continue".into();
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
        }
        self.refresh_view();
    }

    /// Navigation always re-fetches; the previous payload is discarded.
    fn refresh_view(&mut self) {
        match self.view {
            ViewMode::Month => self.refresh_month(),
            ViewMode::Year => self.refresh_year(),
            ViewMode::Diary => self.refresh_diary(),
        }
    }

    fn refresh_month(&mut self) {
        self.clamp_cursor();
        self.sidebar = None;
        self.focus = Focus::Grid;
        match self.api.get_month(self.state.year, self.state.month) {
            Ok(data) => {
                self.month = Some(data);
            }
            Err(err) => {
                self.month = None;
                self.report(err, "loading month");
            }
        }
    }

    /// Month summary refresh that leaves the open sidebar alone; used after
    /// mutations so the day indicators update without losing the open day.
    fn refresh_month_summary(&mut self) {
        match self.api.get_month(self.state.year, self.state.month) {
            Ok(data) => self.month = Some(data),
            Err(err) => self.report(err, "loading month"),
        }
    }

    fn refresh_year(&mut self) {
        match self.api.get_year(self.state.year) {
            Ok(data) => self.year_data = Some(data),
            Err(err) => {
                self.year_data = None;
                self.report(err, "loading year");
            }
        }
    }

    fn refresh_diary(&mut self) {
        self.diary_offset = 0;
        match self.api.month_events(self.state.year, self.state.month) {
            Ok(events) => self.diary = events,
            Err(err) => {
                self.diary = Vec::new();
                self.report(err, "loading diary");
            }
        }
    }

    fn open_sidebar(&mut self, day: u32) {
        match self.api.day_events(self.state.year, self.state.month, day) {
            Ok(events) => {
                self.sidebar = Some(DayPanel::new(day, events));
                self.focus = Focus::Sidebar;
                self.status = format!("Day {} opened", day);
            }
            Err(ApiError::Unauthorized) => self.require_login(),
            Err(err) => {
                self.sidebar = Some(DayPanel::failed(day, "Error loading events"));
                self.focus = Focus::Grid;
                self.status = format!("Error fetching events: {}", err);
            }
        }
    }

    fn refresh_sidebar(&mut self) {
        let Some(day) = self.sidebar.as_ref().map(|p| p.day) else {
            return;
        };
        let selected = self.sidebar.as_ref().map(|p| p.selected).unwrap_or(0);
        match self.api.day_events(self.state.year, self.state.month, day) {
            Ok(events) => {
                let mut panel = DayPanel::new(day, events);
                panel.selected = selected;
                panel.clamp();
                self.sidebar = Some(panel);
            }
            Err(ApiError::Unauthorized) => self.require_login(),
            Err(err) => {
                self.sidebar = Some(DayPanel::failed(day, "Error loading events"));
                self.status = format!("Error fetching events: {}", err);
            }
        }
    }

    fn open_event_form(&mut self) {
        let day = self
            .sidebar
            .as_ref()
            .map(|p| p.day)
            .unwrap_or(self.cursor_day);
        let Some(date) = self.state.date(day) else {
            self.status = "No day selected".into();
            return;
        };
        self.mode = Mode::Entry {
            action: EntryAction::CreateEvent,
            form: EntryForm::for_day(date, false),
        };
        self.status = form_hint();
    }

    fn open_subevent_edit(&mut self, sub_id: i64) {
        match self.api.get_subevent(sub_id) {
            Ok(sub) => {
                let form = EntryForm::from_subevent(&sub);
                self.mode = Mode::Entry {
                    action: EntryAction::EditSubevent(sub.id),
                    form,
                };
                self.status = form_hint();
            }
            Err(ApiError::Unauthorized) => self.require_login(),
            Err(err) => self.status = format!("Error loading subevent details: {}", err),
        }
    }

    fn report(&mut self, err: ApiError, doing: &str) {
        match err {
            ApiError::Unauthorized => self.require_login(),
            err => self.status = format!("Error {}: {}", doing, err),
        }
    }

    fn clamp_cursor(&mut self) {
        let days = self.state.days_in_month();
        if self.cursor_day < 1 {
            self.cursor_day = 1;
        }
        if self.cursor_day > days {
            self.cursor_day = days;
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Month => self.draw_month_view(f, layout[1]),
            ViewMode::Year => self.draw_year_view(f, layout[1]),
            ViewMode::Diary => self.draw_diary_view(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match &mode {
            Mode::Entry { action, form } => self.draw_entry_form(f, action.title(), form),
            Mode::ConfirmDeleteEvent { name, .. } => self.draw_confirm(f, name, false),
            Mode::ConfirmDeleteSubevent { name, .. } => self.draw_confirm(f, name, true),
            Mode::MoodPicker { day, selected } => self.draw_mood_picker(f, *day, *selected),
            Mode::Login(form) => self.draw_login(f, form),
            Mode::Normal => {}
        }
        self.mode = mode;
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let label = self
            .month
            .as_ref()
            .map(|m| m.month_label.clone())
            .unwrap_or_else(|| self.state.label());
        let auth = if self.api.cookie().is_some() {
            Span::styled("signed in", Style::default().fg(Color::Green))
        } else {
            Span::styled("guest", Style::default().fg(Color::DarkGray))
        };
        let title = Line::from(vec![
            Span::styled(
                "dayglow ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            auth,
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_month_view(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
            .split(area);
        self.draw_month_grid(f, chunks[0]);
        self.draw_sidebar(f, chunks[1]);
    }

    fn draw_month_grid(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Grid;
        let block = Block::default()
            .title(Span::styled(
                "Calendar",
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));

        let Some(month) = self.month.as_ref() else {
            let msg = Paragraph::new("No month data (press r to retry)")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(msg, area);
            return;
        };

        let mut lines = Vec::new();
        let headings = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        let header_spans: Vec<Span<'static>> = headings
            .iter()
            .map(|h| Span::styled(format!("{:^7}", h), Style::default().fg(Color::Gray)))
            .collect();
        lines.push(Line::from(header_spans));

        for week in month_cells(&month.calendar_data).chunks(7) {
            let mut spans: Vec<Span<'static>> = Vec::new();
            for cell in week {
                spans.push(self.month_cell_span(month, *cell));
            }
            lines.push(Line::from(spans));
            lines.push(Line::from(""));
        }

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn month_cell_span(&self, month: &MonthData, cell: GridCell) -> Span<'static> {
        match cell {
            GridCell::Adjacent(day) => Span::styled(
                format!("{:^7}", day),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::DIM),
            ),
            GridCell::Current(day) => {
                let has_events = month.days_with_events.contains(&day);
                let has_marker = month.days_with_marker.contains(&day);
                let indicator = match (has_events, has_marker) {
                    (true, true) => "•◦",
                    (true, false) => "• ",
                    (false, true) => "◦ ",
                    (false, false) => "  ",
                };
                let text = format!(" {:>2}{} ", day, indicator);
                let date = self.state.date(day);
                let is_past = date.map(|d| d < self.today).unwrap_or(false);
                let is_today = date.map(|d| d == self.today).unwrap_or(false);

                let mut style = Style::default().fg(if is_past {
                    Color::DarkGray
                } else {
                    Color::White
                });
                if let Some((r, g, b)) = month
                    .mood_colors
                    .get(&day)
                    .and_then(|color| parse_color(color))
                {
                    style = style.bg(Color::Rgb(r, g, b)).fg(Color::Black);
                }
                if is_today {
                    style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                }
                if day == self.cursor_day {
                    style = style
                        .bg(if self.focus == Focus::Grid {
                            Color::Cyan
                        } else {
                            Color::Blue
                        })
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD);
                }
                Span::styled(text, style)
            }
        }
    }

    fn draw_sidebar(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Sidebar;
        let border_style = Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        });

        let Some(panel) = self.sidebar.as_mut() else {
            let block = Block::default()
                .title("Day")
                .borders(Borders::ALL)
                .border_style(border_style);
            let msg = Paragraph::new("Press Enter on a day to see its events")
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block);
            f.render_widget(msg, area);
            return;
        };

        let date_label = self
            .state
            .date(panel.day)
            .map(|d| d.format("%-d %B").to_string())
            .unwrap_or_else(|| format!("Day {}", panel.day));
        let block = Block::default()
            .title(Span::styled(
                date_label,
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(border_style);

        if let Some(error) = &panel.error {
            let msg = Paragraph::new(error.clone())
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::LightRed))
                .block(block);
            f.render_widget(msg, area);
            return;
        }

        if panel.rows.is_empty() {
            let msg = Paragraph::new("No events scheduled")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray))
                .block(block);
            f.render_widget(msg, area);
            return;
        }

        let items: Vec<ListItem<'static>> = panel
            .rows
            .iter()
            .map(|row| match row {
                RowKind::Event(i) => event_item(&panel.events[*i]),
                RowKind::Sub(i, j) => subevent_item(&panel.events[*i].subevents[*j]),
            })
            .collect();

        let mut list_state = ListState::default();
        let viewport = area.height.saturating_sub(2) as usize;
        panel.offset = adjust_offset(panel.selected, panel.offset, viewport, 1, panel.rows.len());
        *list_state.offset_mut() = panel.offset;
        if focused {
            list_state.select(Some(panel.selected));
        }

        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_year_view(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(year) = self.year_data.as_ref() else {
            let msg = Paragraph::new("No year data (press r to retry)")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Year"));
            f.render_widget(msg, area);
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(33),
                Constraint::Percentage(33),
                Constraint::Percentage(34),
            ])
            .split(area);

        for (row_idx, row_area) in rows.iter().enumerate() {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(25),
                    Constraint::Percentage(25),
                    Constraint::Percentage(25),
                    Constraint::Percentage(25),
                ])
                .split(*row_area);
            for (col_idx, col_area) in cols.iter().enumerate() {
                let month_idx = row_idx * 4 + col_idx;
                if let Some(month) = year.months.get(month_idx) {
                    self.draw_mini_month(f, *col_area, month, month_idx == self.year_cursor);
                }
            }
        }
    }

    fn draw_mini_month(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        month: &YearMonth,
        selected: bool,
    ) {
        let name = NaiveDate::from_ymd_opt(self.state.year, month.month, 1)
            .map(|d| d.format("%B").to_string())
            .unwrap_or_else(|| format!("Month {}", month.month));

        let mut lines = Vec::new();
        for week in month_cells(&month.calendar_data).chunks(7) {
            let mut spans: Vec<Span<'static>> = Vec::new();
            for cell in week {
                match cell {
                    GridCell::Adjacent(_) => spans.push(Span::raw("   ")),
                    GridCell::Current(day) => {
                        let mut style = Style::default().fg(Color::Gray);
                        if let Some((r, g, b)) = month
                            .mood_colors
                            .get(day)
                            .and_then(|color| parse_color(color))
                        {
                            style = style.bg(Color::Rgb(r, g, b)).fg(Color::Black);
                        }
                        if month.days_with_events.contains(day) {
                            style = style.add_modifier(Modifier::BOLD);
                        }
                        let is_today = self.state.year == self.today.year()
                            && month.month == self.today.month()
                            && *day == self.today.day();
                        if is_today {
                            style = style.add_modifier(Modifier::UNDERLINED);
                        }
                        spans.push(Span::styled(format!("{:>2} ", day), style));
                    }
                }
            }
            lines.push(Line::from(spans));
        }

        let block = Block::default()
            .title(Span::styled(
                name,
                Style::default()
                    .fg(if selected { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if selected {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_diary_view(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(Span::styled(
                format!("Diary — {}", self.state.label()),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let mut lines: Vec<Line<'static>> = Vec::new();
        for day in 1..=self.state.days_in_month() {
            let Some(date) = self.state.date(day) else {
                continue;
            };
            let entries: Vec<(&Event, DaySpan)> = self
                .diary
                .iter()
                .filter_map(|event| event.span_for_day(date).map(|span| (event, span)))
                .collect();
            if entries.is_empty() {
                continue;
            }
            lines.push(Line::from(Span::styled(
                date.format("%-d %B, %A").to_string(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            for (event, span) in entries {
                let mut spans = vec![
                    Span::raw("  "),
                    Span::styled(
                        format!("{:<16}", span.display()),
                        Style::default().fg(Color::LightYellow),
                    ),
                    Span::styled(
                        event.name.clone(),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    ),
                ];
                if let Some(location) = &event.location {
                    spans.push(Span::styled(
                        format!("  @ {}", location),
                        Style::default().fg(Color::LightMagenta),
                    ));
                }
                if let Some(with_who) = &event.with_who {
                    spans.push(Span::styled(
                        format!("  with {}", with_who),
                        Style::default().fg(Color::LightGreen),
                    ));
                }
                lines.push(Line::from(spans));
            }
            lines.push(Line::from(""));
        }

        if lines.is_empty() {
            lines.push(Line::from("No events this month"));
        }

        let paragraph = Paragraph::new(lines)
            .scroll((self.diary_offset as u16, 0))
            .wrap(Wrap { trim: false })
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("1", Style::default().fg(Color::LightCyan)),
            Span::raw(" month  "),
            Span::styled("2", Style::default().fg(Color::LightCyan)),
            Span::raw(" year  "),
            Span::styled("3", Style::default().fg(Color::LightCyan)),
            Span::raw(" diary  "),
            Span::styled("h/l", Style::default().fg(Color::LightCyan)),
            Span::raw(" month  "),
            Span::styled("j/k", Style::default().fg(Color::LightCyan)),
            Span::raw(" year  "),
        ];
        match self.view {
            ViewMode::Month => {
                if self.focus == Focus::Sidebar {
                    spans.extend([
                        Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                        Span::raw(" browse  "),
                        Span::styled("n", Style::default().fg(Color::LightMagenta)),
                        Span::raw(" new  "),
                        Span::styled("e", Style::default().fg(Color::LightYellow)),
                        Span::raw(" edit  "),
                        Span::styled("d", Style::default().fg(Color::LightRed)),
                        Span::raw(" delete  "),
                        Span::styled("s", Style::default().fg(Color::LightGreen)),
                        Span::raw(" subevent  "),
                        Span::styled("Esc", Style::default().fg(Color::LightCyan)),
                        Span::raw(" grid  "),
                    ]);
                } else {
                    spans.extend([
                        Span::styled("←↑↓→", Style::default().fg(Color::LightCyan)),
                        Span::raw(" day  "),
                        Span::styled("Enter", Style::default().fg(Color::LightYellow)),
                        Span::raw(" open day  "),
                        Span::styled("n", Style::default().fg(Color::LightMagenta)),
                        Span::raw(" new  "),
                        Span::styled("m", Style::default().fg(Color::LightGreen)),
                        Span::raw(" mood  "),
                    ]);
                }
            }
            ViewMode::Year => spans.extend([
                Span::styled("←↑↓→", Style::default().fg(Color::LightCyan)),
                Span::raw(" pick month  "),
                Span::styled("Enter", Style::default().fg(Color::LightYellow)),
                Span::raw(" open month  "),
            ]),
            ViewMode::Diary => spans.extend([
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" scroll  "),
            ]),
        }
        spans.extend([
            Span::styled("L", Style::default().fg(Color::LightGreen)),
            Span::raw(" login  "),
            Span::styled("O", Style::default().fg(Color::LightRed)),
            Span::raw(" logout  "),
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_entry_form(&self, f: &mut ratatui::Frame<'_>, title: &str, form: &EntryForm) {
        let area = centered_rect(70, 70, f.size());
        let mut fields = Vec::new();
        fields.extend(field_lines("Name", &form.name, form.field == EntryField::Name));
        fields.extend(field_lines(
            "Start date (DD-MM-YYYY)",
            &form.start_date,
            form.field == EntryField::StartDate,
        ));
        fields.extend(field_lines(
            "Start time (HH:MM)",
            &form.start_time,
            form.field == EntryField::StartTime,
        ));
        fields.extend(field_lines(
            "End date (DD-MM-YYYY)",
            &form.end_date,
            form.field == EntryField::EndDate,
        ));
        fields.extend(field_lines(
            "End time (HH:MM)",
            &form.end_time,
            form.field == EntryField::EndTime,
        ));
        fields.extend(field_lines(
            "Where",
            &form.location,
            form.field == EntryField::Location,
        ));
        if !form.subevent {
            fields.extend(field_lines(
                "With who",
                &form.with_who,
                form.field == EntryField::WithWho,
            ));
        }
        fields.extend(field_lines(
            "Notes",
            &form.notes,
            form.field == EntryField::Notes,
        ));
        fields.push(Line::from(Span::styled(
            "Enter to save • Esc to cancel • Tab/Shift-Tab to move • Enter adds newline in Notes (Ctrl+Enter saves)",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(fields)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, name: &str, subevent: bool) {
        let area = centered_rect(50, 30, f.size());
        let what = if subevent { "subevent" } else { "event" };
        let body = vec![
            Line::from(Span::styled(
                format!("Delete {} \"{}\"?", what, name),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_mood_picker(&self, f: &mut ratatui::Frame<'_>, day: u32, selected: usize) {
        let area = centered_rect(60, 25, f.size());
        let mut swatches: Vec<Span<'static>> = Vec::new();
        for (idx, mood) in MOODS.iter().enumerate() {
            let mut style = Style::default().fg(Color::Black);
            if let Some((r, g, b)) = parse_color(mood.color) {
                style = style.bg(Color::Rgb(r, g, b));
            }
            if idx == selected {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            let marker = if idx == selected { ">" } else { " " };
            swatches.push(Span::raw(marker.to_string()));
            swatches.push(Span::styled(format!(" {} ", mood.name), style));
        }
        let body = vec![
            Line::from(swatches),
            Line::from(""),
            Line::from(Span::styled(
                "←/→ choose • Enter set • x clear • Esc cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    format!("Mood for day {}", day),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_login(&self, f: &mut ratatui::Frame<'_>, form: &LoginForm) {
        let area = centered_rect(50, 30, f.size());
        let label_style = Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD | Modifier::DIM);
        let mut lines = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("Username: ", label_style),
            Span::styled(
                if form.on_password {
                    form.username.value.clone()
                } else {
                    form.username.with_caret()
                },
                Style::default().fg(if form.on_password {
                    Color::White
                } else {
                    Color::Cyan
                }),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Password: ", label_style),
            Span::styled(
                form.password.masked(form.on_password),
                Style::default().fg(if form.on_password {
                    Color::Cyan
                } else {
                    Color::White
                }),
            ),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter to log in • Tab to switch field • Esc to cancel",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "Log in",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

#[derive(Copy, Clone)]
enum GridCell {
    Adjacent(u32),
    Current(u32),
}

/// Flattens the backend's 42-cell grid (trailing previous month, current
/// month, leading next month) into week-sized rows.
fn month_cells(grid: &MonthGrid) -> Vec<GridCell> {
    let mut cells = Vec::with_capacity(42);
    cells.extend(grid.prev_days.iter().map(|d| GridCell::Adjacent(*d)));
    cells.extend(grid.current_days.iter().map(|d| GridCell::Current(*d)));
    cells.extend(grid.next_days.iter().map(|d| GridCell::Adjacent(*d)));
    cells
}

fn form_hint() -> String {
    "Tab/Shift-Tab move, Enter save, Esc cancel".into()
}

fn event_item(event: &Event) -> ListItem<'static> {
    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        event.display_time(),
        Style::default().fg(Color::LightYellow),
    )));
    lines.push(Line::from(Span::styled(
        event.name.clone(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )));
    let mut details: Vec<Span<'static>> = Vec::new();
    if let Some(with_who) = &event.with_who {
        details.push(Span::styled(
            format!("with {}", with_who),
            Style::default().fg(Color::LightGreen),
        ));
    }
    if let Some(location) = &event.location {
        if !details.is_empty() {
            details.push(Span::raw("  "));
        }
        details.push(Span::styled(
            format!("@ {}", location),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if !details.is_empty() {
        lines.push(Line::from(details));
    }
    if let Some(notes) = &event.notes {
        lines.push(Line::from(Span::styled(
            notes.clone(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )));
    }
    lines.push(Line::from(""));
    ListItem::new(lines)
}

fn subevent_item(sub: &Subevent) -> ListItem<'static> {
    let mut spans = vec![
        Span::raw("    "),
        Span::styled(sub.display_time(), Style::default().fg(Color::LightYellow)),
        Span::raw("  "),
        Span::styled(sub.name.clone(), Style::default().fg(Color::White)),
    ];
    if let Some(location) = &sub.location {
        spans.push(Span::styled(
            format!("  @ {}", location),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    ListItem::new(Line::from(spans)).style(Style::default().fg(Color::Gray))
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let prefix = format!("{}: ", label);
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    let segments: Vec<&str> = if text.is_empty() {
        vec![""]
    } else {
        text.split('\n').collect()
    };
    segments
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let mut spans = Vec::new();
            spans.push(Span::styled(
                if idx == 0 {
                    prefix.clone()
                } else {
                    spacer.clone()
                },
                label_style,
            ));
            spans.push(Span::styled((*line).to_string(), value_style));
            Line::from(spans)
        })
        .collect()
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(value: &str) -> FieldValue {
        FieldValue::new(value)
    }

    fn base_form() -> EntryForm {
        EntryForm::for_day(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), false)
    }

    #[test]
    fn form_prefills_both_dates_with_the_open_day() {
        let form = base_form();
        assert_eq!(form.start_date.value, "05-03-2025");
        assert_eq!(form.end_date.value, "05-03-2025");
    }

    #[test]
    fn payload_requires_name_and_start_date() {
        let mut form = base_form();
        assert!(form.to_payload().is_err());

        form.name = filled("standup");
        form.start_date = filled("");
        assert!(form.to_payload().is_err());

        form.start_date = filled("05-03-2025");
        let payload = form.to_payload().unwrap();
        assert_eq!(payload.name, "standup");
        assert_eq!(payload.start_date, "05-03-2025");
        assert!(payload.start_time.is_none());
    }

    #[test]
    fn payload_rejects_malformed_dates_and_times() {
        let mut form = base_form();
        form.name = filled("standup");
        form.start_date = filled("2025-03-05");
        assert!(form.to_payload().is_err());

        form.start_date = filled("05-03-2025");
        form.start_time = filled("9am");
        assert!(form.to_payload().is_err());

        form.start_time = filled("09:00");
        assert!(form.to_payload().is_ok());
    }

    #[test]
    fn payload_defaults_empty_end_date_to_start_date() {
        let mut form = base_form();
        form.name = filled("standup");
        form.end_date = filled("");
        let payload = form.to_payload().unwrap();
        assert_eq!(payload.end_date, "05-03-2025");
    }

    #[test]
    fn subevent_payload_never_carries_with_who() {
        let mut form = EntryForm::for_day(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), true);
        form.name = filled("warmup");
        form.with_who = filled("someone");
        let payload = form.to_payload().unwrap();
        assert!(payload.with_who.is_none());
    }

    #[test]
    fn subevent_form_skips_with_who_when_cycling() {
        let mut form = EntryForm::for_day(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(), true);
        form.field = EntryField::Location;
        form.next_field();
        assert_eq!(form.field, EntryField::Notes);
        form.prev_field();
        assert_eq!(form.field, EntryField::Location);
    }

    #[test]
    fn month_cells_preserve_grid_order() {
        let grid = MonthGrid {
            prev_days: vec![27, 28],
            current_days: (1..=30).collect(),
            next_days: vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
        };
        let cells = month_cells(&grid);
        assert_eq!(cells.len(), 42);
        assert!(matches!(cells[0], GridCell::Adjacent(27)));
        assert!(matches!(cells[2], GridCell::Current(1)));
        assert!(matches!(cells[31], GridCell::Current(30)));
        assert!(matches!(cells[32], GridCell::Adjacent(1)));
    }

    #[test]
    fn day_panel_rows_flatten_events_and_subevents() {
        let json = r#"[{
            "id": 3,
            "name": "dinner",
            "start_time": "2025-03-05 19:00",
            "end_time": "2025-03-05 21:30",
            "where": null,
            "with_who": null,
            "notes": null,
            "subevents": [
                {"id": 9, "event_id": 3, "name": "dessert", "start_time": "2025-03-05 21:00",
                 "end_time": null, "where": null, "notes": null},
                {"id": 10, "event_id": 3, "name": "coffee", "start_time": "2025-03-05 21:15",
                 "end_time": null, "where": null, "notes": null}
            ]
        }]"#;
        let events: Vec<Event> = serde_json::from_str(json).unwrap();
        let panel = DayPanel::new(5, events);
        assert_eq!(panel.rows.len(), 3);
        assert!(matches!(panel.rows[0], RowKind::Event(0)));
        assert!(matches!(panel.rows[1], RowKind::Sub(0, 0)));
        assert!(matches!(panel.rows[2], RowKind::Sub(0, 1)));
        assert_eq!(panel.selected_event().map(|e| e.id), Some(3));
    }

    #[test]
    fn field_value_editing() {
        let mut field = FieldValue::new("ab");
        field.insert_char('c');
        assert_eq!(field.value, "abc");
        field.move_left();
        field.backspace();
        assert_eq!(field.value, "ac");
        field.move_right();
        field.insert_char('!');
        assert_eq!(field.value, "ac!");
    }

    #[test]
    fn masked_password_hides_characters() {
        let field = FieldValue::new("hunter2");
        assert_eq!(field.masked(false), "*******");
        assert_eq!(field.masked(true), "*******▌");
    }
}
