mod export;
mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::engine::EnhancementEngine;
use crate::gateway::{DesktopGateway, HostGateway};
use crate::model::{EnhancedArtifact, JobEvent, JobRequest, OutputFormat};
use crate::orchestrator::{self, UiCommand};
use crate::session::Session;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{push_wrapped_status_kv, UiState};
use std::path::PathBuf;
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Outcome of a native dialog, delivered back to the UI thread.
enum DialogResult {
    Input(Option<PathBuf>),
    Output(Option<PathBuf>),
}

/// Opens dialogs on the runtime so the UI thread keeps drawing.
struct DialogLauncher {
    gateway: DesktopGateway,
    runtime: tokio::runtime::Handle,
    tx: std::sync::mpsc::Sender<DialogResult>,
    open: bool,
}

impl DialogLauncher {
    fn pick_input(&mut self) {
        if self.open {
            return;
        }
        self.open = true;
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(DialogResult::Input(gateway.pick_input_file().await));
        });
    }

    fn pick_output(&mut self, default_name: String, format: OutputFormat) {
        if self.open {
            return;
        }
        self.open = true;
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let picked = gateway.pick_output_location(&default_name, format).await;
            let _ = tx.send(DialogResult::Output(picked));
        });
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    // Unbounded channels avoid backpressure between the engine and the draw loop.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<JobEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let engine = Arc::new(
        EnhancementEngine::new(
            DesktopGateway::with_events(event_tx.clone()),
            cfg.layout.clone(),
            cfg.max_buffer_bytes,
        )
        .with_events(event_tx.clone()),
    );

    let mut session = Session::new(cfg.settings.clone(), cfg.layout.default_results_dir());
    let mut state_info = String::new();
    if let Some(input) = cfg.input.as_deref() {
        if let Err(e) = session.select_file(input) {
            state_info = format!("{e:#}");
        }
    }
    if let Some(out) = cfg.output.clone() {
        session.set_output_path(out);
    }
    let activate = cfg.layout.activate_script();
    if !activate.exists() {
        state_info = format!("Activate script not found at {}", activate.display());
    }

    let mut state = UiState::new(session);
    state.info = state_info;
    state.export_json = cfg.export_json.clone();

    let (dialog_tx, dialog_rx) = std::sync::mpsc::channel();
    let dialogs = DialogLauncher {
        gateway: DesktopGateway::new(),
        runtime: tokio::runtime::Handle::current(),
        tx: dialog_tx,
        open: false,
    };

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle =
        std::thread::spawn(move || run_threaded(state, dialogs, dialog_rx, event_rx, cmd_tx));

    let res = orchestrator::run_controller(engine, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut dialogs: DialogLauncher,
    dialog_rx: std::sync::mpsc::Receiver<DialogResult>,
    mut event_rx: UnboundedReceiver<JobEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }
        while let Ok(picked) = dialog_rx.try_recv() {
            dialogs.open = false;
            apply_dialog(&mut state, picked);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.input_editing {
                    handle_input_edit(&mut state, k.code);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('o')) if state.tab == 0 => {
                        state.info = "Opening file picker…".into();
                        dialogs.pick_input();
                    }
                    (_, KeyCode::Char('i')) if state.tab == 0 => {
                        state.input_editing = true;
                        state.input_buffer.clear();
                    }
                    (_, KeyCode::Char('s')) if state.tab == 0 => {
                        state.info = "Opening save dialog…".into();
                        dialogs.pick_output(
                            state.session.default_output_name(),
                            state.session.settings.output_format,
                        );
                    }
                    (_, KeyCode::Char('u')) if state.tab == 0 => {
                        let s = &mut state.session.settings;
                        s.upscaling = s.upscaling.next();
                    }
                    (_, KeyCode::Char('n')) if state.tab == 0 => {
                        let s = &mut state.session.settings;
                        s.noise_reduction = s.noise_reduction.next();
                    }
                    (_, KeyCode::Char('f')) if state.tab == 0 => {
                        state.session.settings.cycle_frame_rate();
                    }
                    (_, KeyCode::Char('m')) if state.tab == 0 => {
                        let s = &mut state.session.settings;
                        s.output_format = s.output_format.next();
                    }
                    (_, KeyCode::Char('+')) | (_, KeyCode::Char('=')) if state.tab == 0 => {
                        state.session.settings.adjust_sharpening(5);
                    }
                    (_, KeyCode::Char('-')) if state.tab == 0 => {
                        state.session.settings.adjust_sharpening(-5);
                    }
                    (_, KeyCode::Enter) if state.tab == 0 => {
                        start_enhancement(&mut state, &cmd_tx);
                    }
                    (_, KeyCode::Tab) => {
                        let new_tab = (state.tab + 1) % 3;
                        state.tab = new_tab;
                        if new_tab == 1 {
                            state.history_selected = 0;
                            state.history_scroll_offset = 0;
                        }
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 2;
                    }
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => {
                        if state.tab == 1 && state.history_selected > 0 {
                            state.history_selected -= 1;
                            if state.history_selected < state.history_scroll_offset {
                                state.history_scroll_offset = state.history_selected;
                            }
                        }
                    }
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => {
                        if state.tab == 1
                            && state.history_selected
                                < state.session.history.len().saturating_sub(1)
                        {
                            state.history_selected += 1;
                        }
                    }
                    (_, KeyCode::Char('v')) if state.tab == 1 => {
                        if let Some(entry) = state.selected_entry() {
                            let path = entry.enhanced_path.display().to_string();
                            state.info = format!("Enhanced video: {path} (press 'y' to copy path)");
                            state.last_exported_path = Some(path);
                        }
                    }
                    (_, KeyCode::Char('e')) if state.tab == 1 => {
                        if let Some(entry) = state.selected_entry() {
                            match export::export_entry_json(entry) {
                                Ok(p) => {
                                    state.last_exported_path = Some(p.to_string_lossy().to_string());
                                    state.info = format!(
                                        "Exported JSON: {} (press 'y' to copy path)",
                                        p.display()
                                    );
                                }
                                Err(e) => {
                                    state.info = format!("JSON export failed: {e:#}");
                                }
                            }
                        }
                    }
                    (_, KeyCode::Char('y')) if state.tab == 1 => {
                        if let Some(ref path) = state.last_exported_path {
                            match export::copy_to_clipboard(path) {
                                Ok(_) => {
                                    state.info = format!("✓ Copied to clipboard: {}", path);
                                }
                                Err(e) => {
                                    state.info = format!("Clipboard copy failed: {e:#}");
                                }
                            }
                        } else {
                            state.info = "No path to copy. View or export an entry first (v/e)".into();
                        }
                    }
                    (_, KeyCode::Char('d')) if state.tab == 1 => {
                        if let Some(id) = state.selected_entry().map(|e| e.id) {
                            state.session.history.remove(id);
                            state.clamp_history_selection();
                            state.info = "Deleted".into();
                        }
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn handle_input_edit(state: &mut UiState, code: KeyCode) {
    match code {
        KeyCode::Esc => {
            state.input_editing = false;
            state.input_buffer.clear();
        }
        KeyCode::Enter => {
            state.input_editing = false;
            let typed = std::mem::take(&mut state.input_buffer);
            let typed = typed.trim();
            if !typed.is_empty() {
                select_input(state, PathBuf::from(typed));
            }
        }
        KeyCode::Backspace => {
            state.input_buffer.pop();
        }
        KeyCode::Char(c) => state.input_buffer.push(c),
        _ => {}
    }
}

fn select_input(state: &mut UiState, path: PathBuf) {
    state.info = match state.session.select_file(&path) {
        Ok(file) => format!("Selected {}", file.name),
        Err(e) => format!("{e:#}"),
    };
}

fn apply_dialog(state: &mut UiState, picked: DialogResult) {
    match picked {
        DialogResult::Input(Some(path)) => select_input(state, path),
        DialogResult::Output(Some(path)) => {
            state.info = format!("Output: {}", path.display());
            state.session.set_output_path(path);
        }
        DialogResult::Input(None) | DialogResult::Output(None) => {
            state.info = "No file selected".into();
        }
    }
}

fn start_enhancement(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    if state.running {
        state.info = "An enhancement is already running".into();
        return;
    }
    match state.session.job_request() {
        Ok(request) => {
            let _ = cmd_tx.send(UiCommand::Enhance(Box::new(request)));
            state.running = true;
            state.phase = None;
            state.status = "Starting…".into();
            state.job_start = Some(Instant::now());
            state.output_tail.clear();
        }
        Err(e) => {
            state.info = format!("{e:#}");
        }
    }
}

fn apply_event(state: &mut UiState, ev: JobEvent) {
    match ev {
        JobEvent::PhaseStarted { phase } => {
            state.phase = Some(phase);
            state.status = phase.label().to_string();
        }
        JobEvent::OutputLine { line, .. } => state.push_output(line),
        JobEvent::Info(info) => {
            state.info = info.to_message();
        }
        JobEvent::JobCompleted { request, artifact } => {
            handle_job_completed(state, &request, &artifact);
        }
        JobEvent::JobFailed {
            message, output, ..
        } => {
            state.running = false;
            state.phase = None;
            state.status = "Enhancement failed".into();
            state.info = format!("Error: {message}");
            if let Some(output) = output {
                for line in output.lines() {
                    state.push_output(line.to_string());
                }
            }
        }
    }
}

fn handle_job_completed(state: &mut UiState, request: &JobRequest, artifact: &EnhancedArtifact) {
    let processed = orchestrator::process_job_completion(
        &mut state.session,
        request,
        artifact,
        state.export_json.as_deref(),
    );
    state.running = false;
    state.status = "Video enhanced successfully!".into();
    state.info = format!("Saved: {}", processed.entry.enhanced_path.display());
    if !processed.export_messages.is_empty() {
        state.info = processed.export_messages.join("; ");
    }
    if state.tab == 1 {
        state.history_selected = 0;
        state.history_scroll_offset = 0;
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Dashboard"),
        Line::from(format!("History ({})", state.session.history.len())),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("video-enhancer"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_dashboard(chunks[1], f, state),
        1 => draw_history(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f, &state.log_dir),
    }
}

fn draw_dashboard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let content = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(8),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(4),
            ]
            .as_ref(),
        )
        .split(area);

    let top_row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(content[0]);

    // Input / output box
    let mut file_lines: Vec<Line<'static>> = Vec::new();
    match &state.session.current_file {
        Some(file) => {
            push_wrapped_status_kv(&mut file_lines, "File", &file.name, top_row[0].width);
            push_wrapped_status_kv(&mut file_lines, "Type", &file.mime_type, top_row[0].width);
        }
        None => file_lines.push(Line::from(vec![
            Span::styled("File: ", Style::default().fg(Color::Gray)),
            Span::raw("none (press "),
            Span::styled("o", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("i", Style::default().fg(Color::Magenta)),
            Span::raw(")"),
        ])),
    }
    let save_as = state
        .session
        .output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| state.session.default_output_name());
    push_wrapped_status_kv(&mut file_lines, "Save as", &save_as, top_row[0].width);
    push_wrapped_status_kv(
        &mut file_lines,
        "Output dir",
        &state.session.output_dir().display().to_string(),
        top_row[0].width,
    );
    if state.input_editing {
        file_lines.push(Line::from(vec![
            Span::styled("Path: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}▏", state.input_buffer)),
        ]));
    }
    f.render_widget(
        Paragraph::new(file_lines).block(Block::default().borders(Borders::ALL).title("Video")),
        top_row[0],
    );

    // Settings box
    let s = &state.session.settings;
    let setting = |label: &'static str, k: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
            Span::styled(value, Style::default().fg(Color::Green)),
            Span::raw("  ["),
            Span::styled(k, Style::default().fg(Color::Magenta)),
            Span::raw("]"),
        ])
    };
    let settings_lines = vec![
        setting("Upscaling", "u", s.upscaling.to_string()),
        setting("Sharpening", "+/-", s.sharpening.to_string()),
        setting("Noise reduction", "n", s.noise_reduction.to_string()),
        setting("Frame rate", "f", s.frame_rate.clone()),
        setting("Format", "m", s.output_format.to_string()),
    ];
    f.render_widget(
        Paragraph::new(settings_lines)
            .block(Block::default().borders(Borders::ALL).title("Settings")),
        top_row[1],
    );

    // Progress
    let elapsed = state
        .job_start
        .filter(|_| state.running)
        .map(|t| format!(" ({}s)", t.elapsed().as_secs()))
        .unwrap_or_default();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(if state.running {
            Color::Cyan
        } else {
            Color::Green
        }))
        .percent(state.percent())
        .label(format!("{}{}", state.status, elapsed));
    f.render_widget(gauge, content[1]);

    // Tool output tail
    let visible = content[2].height.saturating_sub(2) as usize;
    let start = state.output_tail.len().saturating_sub(visible);
    let tail: Vec<Line> = state.output_tail[start..]
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    f.render_widget(
        Paragraph::new(tail).block(Block::default().borders(Borders::ALL).title("Tool output")),
        content[2],
    );

    let status = vec![
        Line::from(vec![
            Span::styled("Info: ", Style::default().fg(Color::Gray)),
            Span::raw(&state.info),
        ]),
        Line::from(if state.running {
            "Keys: q quit (stops job) | tab switch | ? help"
        } else {
            "Keys: enter enhance | o open | i type path | s save as | q quit | ? help"
        }),
    ];
    f.render_widget(
        Paragraph::new(status)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status")),
        content[3],
    );
}

fn draw_history(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines: Vec<Line<'static>> = Vec::new();

    // Subtract header lines and borders
    let max_items = (area.height as usize).saturating_sub(5).max(1);
    let entries = state.session.history.entries();
    let total_count = entries.len();
    let current_pos = if total_count > 0 {
        state.history_selected + 1
    } else {
        0
    };

    lines.push(Line::from(vec![
        Span::raw(format!("History ({}/{}) - ", current_pos, total_count)),
        Span::styled("↑/↓/j/k", Style::default().fg(Color::Magenta)),
        Span::raw(": navigate, "),
        Span::styled("v", Style::default().fg(Color::Magenta)),
        Span::raw(": view, "),
        Span::styled("d", Style::default().fg(Color::Magenta)),
        Span::raw(": delete, "),
        Span::styled("e", Style::default().fg(Color::Magenta)),
        Span::raw(": export JSON"),
    ]));
    if !state.info.is_empty() {
        push_wrapped_status_kv(&mut lines, "Info", &state.info, area.width);
    }
    lines.push(Line::from(""));

    // Keep the selected item visible
    let scroll_offset = {
        let mut offset = state
            .history_scroll_offset
            .min(total_count.saturating_sub(1));
        if state.history_selected < offset {
            offset = state.history_selected;
        } else if state.history_selected >= offset + max_items {
            offset = state.history_selected.saturating_sub(max_items - 1);
        }
        offset
    };

    for (display_idx, e) in entries.iter().skip(scroll_offset).take(max_items).enumerate() {
        let history_idx = scroll_offset + display_idx;
        let is_selected = history_idx == state.history_selected;

        let style = if is_selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let colored = |c: Color| if is_selected { style } else { Style::default().fg(c) };

        // "2024-05-01T10:00:00+02:00" -> "2024-05-01 10:00:00"
        let timestamp: String = e.timestamp.chars().take(19).collect::<String>().replace('T', " ");

        lines.push(Line::from(vec![
            Span::styled(format!("{:>2}. ", history_idx + 1), colored(Color::Gray)),
            Span::styled(if is_selected { "> " } else { "  " }, style),
            Span::styled(timestamp, colored(Color::Gray)),
            Span::raw("  "),
            Span::styled(e.original_name.clone(), colored(Color::Green)),
            Span::raw("  "),
            Span::styled(
                format!("{} / sharp {} / {}", e.settings.upscaling, e.settings.sharpening, e.settings.output_format),
                colored(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled(
                humantime::format_duration(Duration::from_secs(e.elapsed.as_secs())).to_string(),
                colored(Color::Blue),
            ),
        ]));
    }

    if entries.is_empty() {
        lines.push(Line::from("No enhancements yet this session."));
    }

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("History"));
    f.render_widget(p, area);
}
