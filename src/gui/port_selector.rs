use std::io::stdout;

use crate::{gui::error::SelectorError, transport::Endpoint};

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

/// Leaves raw mode and the alternate screen however the selector exits.
struct TerminalRestore;

impl Drop for TerminalRestore {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }
}

/// Shows the endpoints in a list and lets the user pick one with the arrow
/// keys. Returns `None` if the user quits or there is nothing to pick.
pub fn port_selector(
    mut endpoints: Vec<Endpoint>,
    backend: &str,
) -> Result<Option<Endpoint>, SelectorError> {
    let n_ports = endpoints.len();
    if n_ports == 0 {
        return Ok(None);
    }

    enable_raw_mode()?;
    let _restore = TerminalRestore;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut cursor = 0;
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let mut selected_port = None;
    loop {
        let title = Title::from(
            Span::from(format!(" Select {} output ", backend))
                .magenta()
                .bold(),
        );
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Send ".into(),
            "<Enter>".magenta().bold(),
            " Quit ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let names = endpoints.iter().map(|e| e.to_string());
        let list = List::new(names)
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;
        if event::poll(std::time::Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Down => {
                            cursor = (cursor + 1) % n_ports;
                        }
                        KeyCode::Up => {
                            cursor = (cursor + n_ports - 1) % n_ports;
                        }
                        KeyCode::Enter => {
                            selected_port = Some(cursor);
                            break;
                        }
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(selected_port.map(|i| endpoints.swap_remove(i)))
}
