use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::path::Path;

fn key(k: &'static str, pad: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(pad),
        Span::raw(desc),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame, log_dir: &Path) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit (stops a running enhancement)"),
        ]),
        key("o", "           ", "Pick input video"),
        key("i", "           ", "Type input path (Enter to confirm, Esc to cancel)"),
        key("s", "           ", "Choose save location"),
        key("u", "           ", "Cycle upscaling (2x, 4x, 1.5x)"),
        key("n", "           ", "Cycle noise reduction"),
        key("f", "           ", "Cycle frame rate"),
        key("m", "           ", "Cycle output format"),
        key("+/-", "         ", "Sharpening up/down"),
        key("enter", "       ", "Enhance video"),
        key("tab", "         ", "Switch tabs"),
        key("?", "           ", "Show this help"),
        Line::from(""),
        Line::from("History tab:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("j/k", Style::default().fg(Color::Magenta)),
            Span::raw("  Navigate"),
        ]),
        key("v", "           ", "View enhanced video path"),
        key("e", "           ", "Export selected as JSON"),
        key("y", "           ", "Copy viewed/exported path to clipboard"),
        key("d", "           ", "Delete selected"),
        Line::from(""),
        Line::from("Logs:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                log_dir.display().to_string(),
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
