use crate::model::{HistoryEntry, JobPhase};
use crate::session::Session;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use std::path::PathBuf;
use std::time::Instant;

/// Lines of tool output kept for the dashboard tail.
const OUTPUT_TAIL_MAX: usize = 500;

pub struct UiState {
    pub tab: usize,
    pub session: Session,
    pub running: bool,
    pub phase: Option<JobPhase>,
    pub status: String,
    pub info: String,
    pub job_start: Option<Instant>,

    pub output_tail: Vec<String>,

    // Typed input path (`i`)
    pub input_editing: bool,
    pub input_buffer: String,

    pub history_selected: usize, // Index of selected history item (0 = most recent)
    pub history_scroll_offset: usize,
    pub last_exported_path: Option<String>,
    pub export_json: Option<PathBuf>,
    pub log_dir: PathBuf,
}

impl UiState {
    pub fn new(session: Session) -> Self {
        Self {
            tab: 0,
            session,
            running: false,
            phase: None,
            status: "Ready".into(),
            info: String::new(),
            job_start: None,
            output_tail: Vec::new(),
            input_editing: false,
            input_buffer: String::new(),
            history_selected: 0,
            history_scroll_offset: 0,
            last_exported_path: None,
            export_json: None,
            log_dir: crate::logging::log_dir(),
        }
    }

    pub fn percent(&self) -> u16 {
        self.phase.map(JobPhase::percent).unwrap_or(0)
    }

    pub fn push_output(&mut self, line: String) {
        self.output_tail.push(line);
        if self.output_tail.len() > OUTPUT_TAIL_MAX {
            let _ = self
                .output_tail
                .drain(0..(self.output_tail.len() - OUTPUT_TAIL_MAX));
        }
    }

    pub fn selected_entry(&self) -> Option<&HistoryEntry> {
        self.session.history.entries().get(self.history_selected)
    }

    /// Keep the selection and scroll offset inside the current history.
    pub fn clamp_history_selection(&mut self) {
        let len = self.session.history.len();
        if len == 0 {
            self.history_selected = 0;
            self.history_scroll_offset = 0;
            return;
        }
        if self.history_selected >= len {
            self.history_selected = len - 1;
        }
        if self.history_scroll_offset > self.history_selected {
            self.history_scroll_offset = self.history_selected;
        }
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = remaining.len().min(line_width as usize);
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}
