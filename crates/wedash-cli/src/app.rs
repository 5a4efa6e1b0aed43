use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use wedash_core::{
    Action, DashboardCommand, DashboardEvent, Filter, FollowMode, LogBuffer, SharedRegistry,
};

use crate::config::Columns;

const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
}

/// What the event loop should do after a key press.
#[derive(Debug)]
pub enum Input {
    Ignored,
    Command(DashboardCommand),
    Quit,
}

/// View state of the terminal UI. Live service fields are only ever read.
pub struct App {
    pub registry: SharedRegistry,
    pub log: Arc<LogBuffer>,
    pub columns: Columns,
    pub mode: InputMode,
    pub search: String,
    pub notice: Option<String>,
}

impl App {
    pub fn new(registry: SharedRegistry, log: Arc<LogBuffer>, columns: Columns) -> Self {
        Self {
            registry,
            log,
            columns,
            mode: InputMode::Normal,
            search: String::new(),
            notice: None,
        }
    }

    /// Command announcing the current selection, if there is one.
    pub fn select_current(&self) -> Option<DashboardCommand> {
        self.registry
            .read()
            .selected_ref()
            .map(|target| DashboardCommand::Select { target })
    }

    pub fn apply_event(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Notice(message) => self.notice = Some(message),
            DashboardEvent::ActionFinished {
                action,
                service,
                code,
            } => {
                self.notice = Some(match code {
                    Some(code) => format!("{action} of {service} exited with {code}"),
                    None => format!("{action} of {service} failed"),
                });
            }
            DashboardEvent::Rediscovered { services } => {
                self.notice = Some(format!("Found {services} services"));
            }
            DashboardEvent::ServiceUpdated { .. } => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Input {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Input::Quit,
                KeyCode::Char('r') => Input::Command(DashboardCommand::Rediscover),
                _ => Input::Ignored,
            };
        }

        match self.mode {
            InputMode::Normal => self.normal_key(key.code),
            InputMode::Search => self.search_key(key.code),
        }
    }

    fn normal_key(&mut self, code: KeyCode) -> Input {
        match code {
            KeyCode::Char('q') => Input::Quit,
            KeyCode::Up => self.move_selection(|row, _| row.saturating_sub(1)),
            KeyCode::Down => self.move_selection(|row, _| row + 1),
            KeyCode::PageUp => self.move_selection(|row, _| row.saturating_sub(PAGE)),
            KeyCode::PageDown => self.move_selection(|row, _| row + PAGE),
            KeyCode::Home => self.move_selection(|_, _| 0),
            KeyCode::End => self.move_selection(|_, len| len.saturating_sub(1)),
            KeyCode::Enter | KeyCode::Char('f') => self.follow(FollowMode::Default),
            KeyCode::Char('j') => self.follow(FollowMode::Journal),
            KeyCode::Char('l') => self.run(Action::LastLogs),
            KeyCode::Char('u') => self.run(Action::Up),
            KeyCode::Char('d') => self.run(Action::Down),
            KeyCode::Char('r') => self.run(Action::Restart),
            KeyCode::Char('/') => {
                self.mode = InputMode::Search;
                Input::Ignored
            }
            KeyCode::Tab => {
                let next = self.registry.read().filter().next();
                self.view_changed(|registry| registry.set_filter(next))
            }
            KeyCode::Char('1') => self.view_changed(|registry| registry.set_filter(Filter::All)),
            KeyCode::Char('2') => self.view_changed(|registry| registry.set_filter(Filter::Active)),
            KeyCode::Char('3') => self.view_changed(|registry| registry.set_filter(Filter::Failed)),
            _ => Input::Ignored,
        }
    }

    fn search_key(&mut self, code: KeyCode) -> Input {
        match code {
            KeyCode::Esc | KeyCode::Enter => {
                self.mode = InputMode::Normal;
                Input::Ignored
            }
            KeyCode::Backspace => {
                self.search.pop();
                self.apply_search()
            }
            KeyCode::Char(c) => {
                self.search.push(c);
                self.apply_search()
            }
            _ => Input::Ignored,
        }
    }

    fn apply_search(&mut self) -> Input {
        let search = self.search.clone();
        self.view_changed(|registry| registry.set_search(&search))
    }

    fn move_selection(&mut self, to: impl FnOnce(usize, usize) -> usize) -> Input {
        self.view_changed(|registry| {
            let row = registry.selected_row().unwrap_or_default();
            let len = registry.rows().len();
            registry.select_row(to(row, len));
        })
    }

    /// Apply a view change and announce the selection if it moved.
    fn view_changed(&mut self, change: impl FnOnce(&mut wedash_core::Registry)) -> Input {
        let mut registry = self.registry.write();
        let before = registry.selected_ref();
        change(&mut registry);
        let after = registry.selected_ref();

        match after {
            Some(target) if after != before => Input::Command(DashboardCommand::Select { target }),
            _ => Input::Ignored,
        }
    }

    fn follow(&self, mode: FollowMode) -> Input {
        self.registry
            .read()
            .selected_ref()
            .map_or(Input::Ignored, |target| {
                Input::Command(DashboardCommand::Follow { target, mode })
            })
    }

    fn run(&self, action: Action) -> Input {
        self.registry
            .read()
            .selected_ref()
            .map_or(Input::Ignored, |target| {
                Input::Command(DashboardCommand::Run { target, action })
            })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use wedash_core::Registry;
    use wedash_types::{ActivityState, Service};

    use super::*;

    fn app() -> App {
        let mut api = Service::new("api", "api.service", PathBuf::from("/srv/api"));
        api.state = ActivityState::Active;
        let mut worker = Service::new("worker", "worker.service", PathBuf::from("/srv/worker"));
        worker.state = ActivityState::Failed;
        let cron = Service::new("cron", "cron.service", PathBuf::from("/srv/cron"));

        App::new(
            Registry::new(vec![api, worker, cron]).shared(),
            Arc::new(LogBuffer::default()),
            Columns::Minimal,
        )
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn selected_name(app: &App) -> Option<String> {
        app.registry.read().selected().map(|s| s.name.clone())
    }

    #[test]
    fn test_navigation_selects() {
        let mut app = app();

        let Input::Command(DashboardCommand::Select { target }) = app.handle_key(key(KeyCode::Down))
        else {
            panic!("selection did not move");
        };
        assert_eq!(target.index, 1);
        assert_eq!(selected_name(&app).as_deref(), Some("worker"));

        assert!(matches!(
            app.handle_key(key(KeyCode::End)),
            Input::Command(DashboardCommand::Select { .. })
        ));
        assert!(matches!(app.handle_key(key(KeyCode::Down)), Input::Ignored));
        assert!(matches!(
            app.handle_key(key(KeyCode::Home)),
            Input::Command(DashboardCommand::Select { .. })
        ));
        assert_eq!(selected_name(&app).as_deref(), Some("api"));
    }

    #[test]
    fn test_filter_keys() {
        let mut app = app();

        assert!(matches!(
            app.handle_key(key(KeyCode::Char('3'))),
            Input::Command(DashboardCommand::Select { .. })
        ));
        assert_eq!(app.registry.read().rows(), &[1]);

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.registry.read().filter(), Filter::All);
    }

    #[test]
    fn test_search_mode() {
        let mut app = app();
        app.handle_key(key(KeyCode::Char('/')));
        assert_eq!(app.mode, InputMode::Search);

        for c in "cro".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        assert_eq!(app.registry.read().rows(), &[2]);

        // `q` is text while searching.
        app.handle_key(key(KeyCode::Char('q')));
        assert_eq!(app.search, "croq");
        assert!(app.registry.read().rows().is_empty());

        app.handle_key(key(KeyCode::Backspace));
        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.mode, InputMode::Normal);
        assert_eq!(selected_name(&app).as_deref(), Some("cron"));
    }

    #[test]
    fn test_action_keys() {
        let mut app = app();

        assert!(matches!(
            app.handle_key(key(KeyCode::Char('r'))),
            Input::Command(DashboardCommand::Run {
                action: Action::Restart,
                ..
            })
        ));
        assert!(matches!(
            app.handle_key(key(KeyCode::Char('j'))),
            Input::Command(DashboardCommand::Follow {
                mode: FollowMode::Journal,
                ..
            })
        ));
        assert!(matches!(
            app.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL)),
            Input::Command(DashboardCommand::Rediscover)
        ));
        assert!(matches!(app.handle_key(key(KeyCode::Char('q'))), Input::Quit));
    }

    #[test]
    fn test_notices() {
        let mut app = app();
        app.apply_event(DashboardEvent::ActionFinished {
            action: Action::Up,
            service: "api".to_owned(),
            code: Some(2),
        });
        assert_eq!(app.notice.as_deref(), Some("up of api exited with 2"));
    }
}
