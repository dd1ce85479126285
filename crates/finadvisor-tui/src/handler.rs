use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use finadvisor_core::profile::INVESTMENT_OPTIONS;
use finadvisor_core::Transition;
use tracing::{info, warn};

use crate::app::{App, EditTarget, InputMode, ProfileField, Screen};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            if app.advisor.is_busy() || app.chat_loading {
                app.tick_animation();
            }
        }
        AppEvent::Submitted { ticket, outcome } => {
            if let Err(e) = app.advisor.finish(ticket, outcome) {
                warn!("Job submission failed: {}", e);
                app.advisor_error = Some(e.to_string());
            }
        }
        AppEvent::Job(snapshot) => match app.advisor.apply(snapshot) {
            Transition::Completed => {
                app.status_message = Some("Analysis complete. Press r to save the report".to_string());
            }
            // The reason is shown from the job phase
            Transition::Failed(reason) => warn!("Job failed: {}", reason),
            Transition::Progress { .. } | Transition::Stale => {}
        },
        AppEvent::ChatReply(reply) => app.receive_chat_reply(reply),
        AppEvent::ReportDownloaded { job_id, outcome } => {
            let saved = outcome
                .map_err(anyhow::Error::from)
                .and_then(|text| save_report(&std::env::current_dir()?, &job_id, &text));
            app.status_message = Some(match saved {
                Ok(path) => {
                    info!("Report for job {} saved to {:?}", job_id, path);
                    format!("Report saved to {}", path.display())
                }
                Err(e) => {
                    warn!("Report download for job {} failed: {}", job_id, e);
                    format!("Report download failed: {}", e)
                }
            });
        }
    }
    Ok(())
}

/// Write a downloaded report as `final_report_{job_id}.txt` inside `dir`.
pub fn save_report(dir: &Path, job_id: &str, text: &str) -> Result<PathBuf> {
    let path = dir.join(format!("final_report_{}.txt", job_id));
    fs::write(&path, text)?;
    Ok(path)
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            app.screen = app.screen.next();
            return;
        }
        KeyCode::BackTab => {
            app.screen = app.screen.previous();
            return;
        }
        KeyCode::Char('1') => {
            app.screen = Screen::Profile;
            return;
        }
        KeyCode::Char('2') => {
            app.screen = Screen::Advisor;
            return;
        }
        KeyCode::Char('3') => {
            app.screen = Screen::Chat;
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Profile => handle_profile_normal(app, key),
        Screen::Advisor => handle_advisor_normal(app, key),
        Screen::Chat => handle_chat_normal(app, key),
    }
}

fn handle_profile_normal(app: &mut App, key: KeyEvent) {
    let Some(field) = app.selected_field() else {
        return;
    };

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next_field(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous_field(),

        KeyCode::Enter if field.is_text() => app.start_editing(EditTarget::Profile(field)),
        KeyCode::Enter | KeyCode::Char(' ') => activate_field(app, field),

        // Cycle risk tolerance
        KeyCode::Char('h') | KeyCode::Left if field == ProfileField::Risk => {
            app.profile.risk_tolerance = app.profile.risk_tolerance.previous();
        }
        KeyCode::Char('l') | KeyCode::Right if field == ProfileField::Risk => {
            app.profile.risk_tolerance = app.profile.risk_tolerance.next();
        }

        // Remove the most recent goal
        KeyCode::Char('x') => {
            let last = app.profile.life_goals.len().checked_sub(1);
            if let Some(goal) = last.and_then(|i| app.profile.remove_goal(i)) {
                app.status_message = Some(format!("Removed goal '{}'", goal.name));
            }
        }
        _ => {}
    }
}

fn activate_field(app: &mut App, field: ProfileField) {
    match field {
        ProfileField::AddGoal => {
            app.status_message = Some(match app.add_goal_from_draft() {
                Ok(()) => "Goal added".to_string(),
                Err(e) => e.to_string(),
            });
        }
        ProfileField::Risk => {
            app.profile.risk_tolerance = app.profile.risk_tolerance.next();
        }
        ProfileField::Preference(i) => {
            app.profile.toggle_preference(INVESTMENT_OPTIONS[i]);
        }
        ProfileField::Submit => app.submit_profile(),
        _ => {}
    }
}

fn handle_advisor_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('e') => app.start_editing(EditTarget::AdvisorData),
        KeyCode::Char('i') | KeyCode::Char('/') => app.start_editing(EditTarget::AdvisorQuery),
        KeyCode::Enter => app.submit_job(),
        KeyCode::Char('c') => {
            if app.advisor.cancel() {
                app.status_message = Some("Stopped waiting for the current job".to_string());
            }
        }
        KeyCode::Char('r') => app.download_report(),

        KeyCode::Char('j') | KeyCode::Down => {
            app.advisor_follow = false;
            app.advisor_scroll = app.advisor_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.advisor_follow = false;
            app.advisor_scroll = app.advisor_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => {
            app.advisor_follow = false;
            app.advisor_scroll = 0;
        }
        KeyCode::Char('G') => app.advisor_follow = true,
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.start_editing(EditTarget::ChatInput),

        KeyCode::Char('j') | KeyCode::Down => {
            app.chat_follow = false;
            app.chat_scroll = app.chat_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.chat_follow = false;
            app.chat_scroll = app.chat_scroll.saturating_sub(1);
        }
        KeyCode::Char('G') => app.chat_follow = true,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.stop_editing(),
        KeyCode::Enter => commit_input(app),

        KeyCode::Char(c) => {
            let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_idx, c);
            app.input_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_idx);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input.chars().count() {
                let byte_idx = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_idx);
            }
        }
        KeyCode::Left => app.input_cursor = app.input_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input.chars().count());
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        _ => {}
    }
}

fn commit_input(app: &mut App) {
    let Some(target) = app.edit_target else {
        app.stop_editing();
        return;
    };
    let input = std::mem::take(&mut app.input);

    match target {
        EditTarget::Profile(field) => {
            app.stop_editing();
            if let Err(e) = app.commit_profile_field(field, &input) {
                app.status_message = Some(e.to_string());
            } else {
                app.select_next_field();
            }
        }
        EditTarget::AdvisorData => {
            app.stop_editing();
            app.advisor_data = input;
        }
        EditTarget::AdvisorQuery => {
            app.stop_editing();
            app.advisor_query = input;
            app.submit_job();
        }
        // Stay in the input so the conversation can continue
        EditTarget::ChatInput => {
            app.input_cursor = 0;
            app.send_chat(&input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finadvisor_core::error::TransportError;
    use finadvisor_core::{Config, SummaryStore};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = Config {
            provider: Some("ollama".to_string()),
            ..Config::new()
        };
        App::new(&config, SummaryStore::in_memory(), tx)
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))).unwrap();
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_tab_cycles_screens() {
        let mut app = test_app();
        assert_eq!(app.screen, Screen::Profile);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.screen, Screen::Advisor);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.screen, Screen::Chat);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.screen, Screen::Advisor);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_while_editing() {
        let mut app = test_app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input_mode, InputMode::Editing);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        handle_event(&mut app, AppEvent::Key(ctrl_c)).unwrap();
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_edit_salary_through_keys() {
        let mut app = test_app();

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input, "0");
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "50000");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.profile.monthly_salary, 50000.0);
        assert_eq!(app.selected_field(), Some(ProfileField::Expense(0)));
    }

    #[tokio::test]
    async fn test_invalid_number_is_reported() {
        let mut app = test_app();

        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "k");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.profile.monthly_salary, 0.0);
        assert_eq!(
            app.status_message.as_deref(),
            Some("'0k' is not a valid number for monthly salary")
        );
        assert_eq!(app.selected_field(), Some(ProfileField::Salary));
    }

    #[tokio::test]
    async fn test_escape_discards_edit() {
        let mut app = test_app();
        app.screen = Screen::Advisor;
        app.advisor_query = "Original".to_string();

        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, " changed");
        press(&mut app, KeyCode::Esc);

        assert_eq!(app.advisor_query, "Original");
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_unicode_input_editing() {
        let mut app = test_app();
        app.screen = Screen::Chat;
        press(&mut app, KeyCode::Char('i'));

        type_text(&mut app, "₹500");
        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Delete);
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.input, "50");
        assert_eq!(app.input_cursor, 1);
    }

    #[tokio::test]
    async fn test_risk_and_preferences_toggle() {
        let mut app = test_app();
        let risk = app.profile_fields.iter().position(|f| *f == ProfileField::Risk).unwrap();
        app.profile_state.select(Some(risk));

        press(&mut app, KeyCode::Right);
        assert_eq!(app.profile.risk_tolerance.as_str(), "High");

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.profile.has_preference("Stocks"));
        press(&mut app, KeyCode::Enter);
        assert!(!app.profile.has_preference("Stocks"));
    }

    #[tokio::test]
    async fn test_failed_submission_shows_error() {
        let mut app = test_app();
        let submission = app.advisor.prepare("data", "query").unwrap();

        handle_event(
            &mut app,
            AppEvent::Submitted {
                ticket: submission.ticket,
                outcome: Err(TransportError::EmptyResponse("job submission".into())),
            },
        )
        .unwrap();

        assert_eq!(
            app.advisor_error.as_deref(),
            Some("Failed to execute query: Empty response from job submission")
        );
        assert!(!app.advisor.is_busy());
    }

    #[tokio::test]
    async fn test_cancel_key_stops_waiting_once() {
        let mut app = test_app();
        app.screen = Screen::Advisor;
        app.advisor.prepare("data", "query").unwrap();
        assert!(app.advisor.is_busy());

        press(&mut app, KeyCode::Char('c'));
        assert!(!app.advisor.is_busy());
        assert_eq!(
            app.status_message.as_deref(),
            Some("Stopped waiting for the current job")
        );

        app.status_message = None;
        press(&mut app, KeyCode::Char('c'));
        assert!(app.status_message.is_none());
    }

    #[tokio::test]
    async fn test_report_without_completed_job() {
        let mut app = test_app();
        app.screen = Screen::Advisor;

        press(&mut app, KeyCode::Char('r'));

        assert_eq!(
            app.status_message.as_deref(),
            Some("No completed job to download")
        );
    }

    #[test]
    fn test_save_report_names_file_after_job() {
        let dir = TempDir::new().unwrap();

        let path = save_report(dir.path(), "job-7", "Final report").unwrap();

        assert_eq!(path, dir.path().join("final_report_job-7.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), "Final report");
    }
}
