use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;
use tile_scorekeeper::{Command, InputMode, MenuItem, MenuOption, Reply, SessionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Operator,
    Bot,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct ChatLine {
    pub speaker: Speaker,
    pub text: String,
}

pub struct App {
    pub manager: SessionManager,
    pub transcript: Vec<ChatLine>,
    pub options: Vec<MenuOption>,
    pub option_state: ListState,
    pub input: String,
}

impl App {
    pub fn new(manager: SessionManager) -> Self {
        let mut app = Self {
            manager,
            transcript: Vec::new(),
            options: Vec::new(),
            option_state: ListState::default(),
            input: String::new(),
        };

        // The welcome reply can't fail: it touches no storage
        if let Ok(reply) = app.manager.handle(Command::StartSession) {
            app.show(reply);
        }
        app
    }

    fn show(&mut self, reply: Reply) {
        let speaker = if reply.rejected {
            Speaker::Rejected
        } else {
            Speaker::Bot
        };
        self.transcript.push(ChatLine {
            speaker,
            text: reply.text,
        });

        // A reply without options keeps the previous ones available
        if !reply.options.is_empty() {
            self.options = reply.options;
            self.option_state.select(Some(0));
        }
    }

    /// Send the typed text; slash commands map to menu commands
    pub fn submit_input(&mut self) -> tile_scorekeeper::Result<()> {
        let text = std::mem::take(&mut self.input);
        if text.trim().is_empty() {
            return self.press_selected();
        }

        self.transcript.push(ChatLine {
            speaker: Speaker::Operator,
            text: text.clone(),
        });

        let reply = match text.trim() {
            "/start" => self.manager.handle(Command::StartSession)?,
            "/players" => self.manager.handle(Command::SelectMenu(MenuItem::ManagePlayers))?,
            "/new" => self.manager.handle(Command::SelectMenu(MenuItem::NewGame))?,
            "/report" => self.manager.handle(Command::SelectMenu(MenuItem::Report))?,
            _ => self.manager.handle_text(&text)?,
        };

        self.show(reply);
        Ok(())
    }

    pub fn press_selected(&mut self) -> tile_scorekeeper::Result<()> {
        let Some(option) = self
            .option_state
            .selected()
            .and_then(|i| self.options.get(i))
            .cloned()
        else {
            return Ok(());
        };

        self.transcript.push(ChatLine {
            speaker: Speaker::Operator,
            text: format!("[{}]", option.label),
        });

        let reply = self.manager.handle_callback(&option.data)?;
        self.show(reply);
        Ok(())
    }

    pub fn next_option(&mut self) {
        let len = self.options.len();
        if len == 0 {
            return;
        }
        let i = match self.option_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.option_state.select(Some(i));
    }

    pub fn previous_option(&mut self) {
        let len = self.options.len();
        if len == 0 {
            return;
        }
        let i = match self.option_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.option_state.select(Some(i));
    }

    fn handle_key(&mut self, key: KeyEvent) -> tile_scorekeeper::Result<bool> {
        match key.code {
            KeyCode::Esc => return Ok(false),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(false),
            // Score blocks span several lines
            KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.push('\n')
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => self.input.push('\n'),
            KeyCode::Enter => self.submit_input()?,
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Down | KeyCode::Tab => self.next_option(),
            KeyCode::Up | KeyCode::BackTab => self.previous_option(),
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        Ok(true)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key)? {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Chat + side panels
            Constraint::Length(5), // Input
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[1]);

    render_transcript(f, body[0], app);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(body[1]);

    render_players(f, side[0], app);
    render_options(f, side[1], app);

    render_input(f, chunks[2], app);
    render_status_bar(f, chunks[3]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let (round, round_color) = if app.manager.session().is_open() {
        ("Round open", Color::Green)
    } else {
        ("No open round", Color::DarkGray)
    };

    let mut spans = vec![
        Span::styled(
            format!(" Tile Scorekeeper v{} ", tile_scorekeeper::VERSION),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" │ "),
        Span::styled(round, Style::default().fg(round_color)),
        Span::raw(" │ "),
        Span::raw(format!("{} rounds played", app.manager.history().len())),
    ];

    if app.manager.input_mode() == InputMode::AwaitingPlayerName {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled("Waiting for a name", Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_transcript(f: &mut Frame, area: Rect, app: &App) {
    let mut lines: Vec<Line> = Vec::new();

    for chat in &app.transcript {
        let (prefix, style) = match chat.speaker {
            Speaker::Operator => ("you ", Style::default().fg(Color::Cyan)),
            Speaker::Bot => ("bot ", Style::default().fg(Color::White)),
            Speaker::Rejected => ("bot ", Style::default().fg(Color::Red)),
        };

        for (i, text) in chat.text.lines().enumerate() {
            let label = if i == 0 { prefix } else { "    " };
            lines.push(Line::from(vec![
                Span::styled(label, Style::default().fg(Color::DarkGray)),
                Span::styled(text.to_string(), style),
            ]));
        }
        lines.push(Line::from(""));
    }

    // Keep the newest messages in view
    let visible = area.height.saturating_sub(2) as usize;
    let skip = lines.len().saturating_sub(visible);
    let lines: Vec<Line> = lines.into_iter().skip(skip).collect();

    let transcript = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Chat "),
    );
    f.render_widget(transcript, area);
}

fn render_players(f: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = app
        .manager
        .players()
        .iter()
        .map(|name| {
            let initial = tile_scorekeeper::initial_of(name).unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>2} ", initial), Style::default().fg(Color::Yellow)),
                Span::raw(name.clone()),
            ]))
        })
        .collect();

    let players = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Players ({}) ", app.manager.players().len())),
    );
    f.render_widget(players, area);
}

fn render_options(f: &mut Frame, area: Rect, app: &mut App) {
    let items: Vec<ListItem> = app
        .options
        .iter()
        .map(|option| ListItem::new(option.label.clone()))
        .collect();

    let options = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Options "))
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(options, area, &mut app.option_state);
}

fn render_input(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = app.input.split('\n').map(|l| Line::from(l.to_string())).collect();
    let input = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Message "),
    );
    f.render_widget(input, area);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let status_spans = vec![
        Span::styled(" Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Send / press option | "),
        Span::styled("Ctrl+N", Style::default().fg(Color::Yellow)),
        Span::raw(" New line | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Options | "),
        Span::styled("/start /players /new /report", Style::default().fg(Color::Yellow)),
        Span::raw(" | "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(Line::from(status_spans))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(status_bar, area);
}
