use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, Widget, Wrap},
    Frame,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use unicode_width::UnicodeWidthStr;

use keyflow::session::CharState;
use keyflow::store::StatRecord;

use crate::{App, Screen};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

pub fn draw(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.screen {
            Screen::Login | Screen::Register => render_auth(self, area, buf),
            Screen::Typing => render_typing(self, area, buf),
            Screen::History => render_history(self, area, buf),
        }
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let green_bold_style = Style::default().patch(bold()).fg(Color::Green);
    let red_bold_style = Style::default().patch(bold()).fg(Color::Red);
    let dim_bold_style = Style::default().patch(bold()).add_modifier(Modifier::DIM);
    let underlined_dim_bold_style = Style::default()
        .patch(dim_bold_style)
        .add_modifier(Modifier::UNDERLINED);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let passage = app.session.passage_str();
    if passage.is_empty() {
        let message = if app.loading {
            "Loading text..."
        } else {
            "Press → to load a text"
        };
        let placeholder = Paragraph::new(Span::styled(
            message,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        placeholder.render(area, buf);
        return;
    }

    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let mut passage_occupied_lines =
        ((passage.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;
    if passage.width() <= max_chars_per_line as usize {
        passage_occupied_lines = 1;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints(
            [
                Constraint::Length(
                    ((area.height as f64 - passage_occupied_lines as f64) / 2.0) as u16,
                ),
                Constraint::Length(passage_occupied_lines),
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(1),
            ]
            .as_ref(),
        )
        .split(area);

    let typed = app.session.typed();
    let spans = app
        .session
        .char_states()
        .iter()
        .zip(app.session.passage().iter())
        .enumerate()
        .map(|(idx, (state, expected))| match state {
            CharState::Correct => Span::styled(expected.to_string(), green_bold_style),
            CharState::Incorrect => Span::styled(
                match typed.get(idx).copied() {
                    Some(' ') => "·".to_owned(),
                    Some(c) => c.to_string(),
                    None => expected.to_string(),
                },
                red_bold_style,
            ),
            CharState::Cursor => Span::styled(expected.to_string(), underlined_dim_bold_style),
            CharState::Untyped => Span::styled(expected.to_string(), dim_bold_style),
        })
        .collect::<Vec<Span>>();

    let widget = Paragraph::new(Line::from(spans))
        .alignment(if passage_occupied_lines == 1 {
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true });
    widget.render(chunks[1], buf);

    let metrics = app.session.metrics();
    let stats = Paragraph::new(Span::styled(
        format!("{} wpm   {}% acc", metrics.wpm, metrics.accuracy),
        bold(),
    ))
    .alignment(Alignment::Center);
    stats.render(chunks[2], buf);

    if let Some(notice) = app.notifier.current() {
        let banner = Paragraph::new(Span::styled(
            notice,
            Style::default().fg(Color::Cyan).patch(italic_style),
        ))
        .alignment(Alignment::Center);
        banner.render(chunks[3], buf);
    }

    let legend = Paragraph::new(Span::styled(
        "(←) restart / (→) new text / (tab) history / (esc)ape",
        italic_style,
    ));
    legend.render(chunks[4], buf);
}

fn render_auth(app: &App, area: Rect, buf: &mut Buffer) {
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);
    let focused_style = Style::default().patch(bold()).fg(Color::Green);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Min(1),
                Constraint::Length(1), // title
                Constraint::Length(1),
                Constraint::Length(1), // username
                Constraint::Length(1), // password
                Constraint::Length(1),
                Constraint::Length(1), // notice
                Constraint::Min(1),
                Constraint::Length(1), // legend
            ]
            .as_ref(),
        )
        .split(area);

    let title = match app.screen {
        Screen::Register => "Create an account",
        _ => "Log in to track your progress",
    };
    Paragraph::new(Span::styled(title, bold()))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    let masked: String = "*".repeat(app.form.password.chars().count());
    let username_line = format!("username: {}", app.form.username);
    let password_line = format!("password: {}", masked);

    Paragraph::new(Span::styled(
        username_line,
        if app.form.focus_password {
            Style::default()
        } else {
            focused_style
        },
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    Paragraph::new(Span::styled(
        password_line,
        if app.form.focus_password {
            focused_style
        } else {
            Style::default()
        },
    ))
    .alignment(Alignment::Center)
    .render(chunks[4], buf);

    if let Some(notice) = app.notifier.current() {
        Paragraph::new(Span::styled(notice, Style::default().fg(Color::Cyan)))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }

    let legend = match app.screen {
        Screen::Register => "(enter) create / (tab) switch field / (ctrl-r) log in / (esc)ape",
        _ => "(enter) log in / (tab) switch field / (ctrl-r) register / (esc)ape",
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[8], buf);
}

fn relative_time(record: &StatRecord, now_ms: i64) -> String {
    let age_ms = (now_ms - record.timestamp_ms).max(0) as u64;
    HumanTime::from(std::time::Duration::from_millis(age_ms))
        .to_text_en(Accuracy::Rough, Tense::Past)
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints(
            [
                Constraint::Length(1), // title
                Constraint::Length(1),
                Constraint::Min(3),    // table
                Constraint::Length(1), // notice
                Constraint::Length(1), // legend
            ]
            .as_ref(),
        )
        .split(area);

    let title = match &app.identity {
        Some(identity) => format!("Recent sessions for {}", identity.username),
        None => "Recent sessions".to_string(),
    };
    Paragraph::new(Span::styled(title, bold())).render(chunks[0], buf);

    if app.recent.is_empty() {
        Paragraph::new(Span::styled("No sessions recorded yet.", italic_style))
            .render(chunks[2], buf);
    } else {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let rows = app.recent.iter().map(|r| {
            Row::new(vec![
                Cell::from(relative_time(r, now_ms)),
                Cell::from(format!("{}", r.wpm)),
                Cell::from(format!("{}%", r.accuracy)),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Min(20),
                Constraint::Length(6),
                Constraint::Length(6),
            ],
        )
        .header(Row::new(vec!["when", "wpm", "acc"]).style(bold()));
        Widget::render(table, chunks[2], buf);
    }

    if let Some(notice) = app.notifier.current() {
        Paragraph::new(Span::styled(notice, Style::default().fg(Color::Cyan)))
            .render(chunks[3], buf);
    }

    let legend = if app.identity.is_some() {
        "(tab) back / (e)xport csv / l(o)gout / (esc)ape"
    } else {
        "(tab) back / (esc)ape"
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[4], buf);
}
