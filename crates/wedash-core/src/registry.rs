use std::{sync::Arc, time::SystemTime};

use parking_lot::RwLock;
use wedash_types::{ActivityState, Service};

use crate::status::Probe;

pub type SharedRegistry = Arc<RwLock<Registry>>;

/// Index of a service, pinned to the registry generation it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRef {
    pub index: usize,
    pub generation: u64,
}

/// Which services the table shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Failed,
}

impl Filter {
    #[must_use]
    pub fn matches(self, service: &Service) -> bool {
        match self {
            Self::All => true,
            Self::Active => service.state == ActivityState::Active,
            Self::Failed => service.state == ActivityState::Failed,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Active => "Active",
            Self::Failed => "Failed",
        }
    }

    /// Cycle order used by the tab key.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Active,
            Self::Active => Self::Failed,
            Self::Failed => Self::All,
        }
    }
}

/// Discovered services plus the filtered, searchable view over them.
///
/// `generation` changes whenever the service list is replaced, so a probe
/// started against an older list can tell that its index no longer applies.
#[derive(Debug, Default)]
pub struct Registry {
    services: Vec<Service>,
    generation: u64,
    filter: Filter,
    search: String,
    rows: Vec<usize>,
    selected: Option<usize>,
}

impl Registry {
    #[must_use]
    pub fn new(services: Vec<Service>) -> Self {
        let mut registry = Self {
            services,
            ..Self::default()
        };
        registry.rebuild_rows();
        registry
    }

    #[must_use]
    pub fn shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Service> {
        self.services.get(index)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Visible rows as indices into `services`.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    #[must_use]
    pub fn row_service(&self, row: usize) -> Option<&Service> {
        self.rows.get(row).and_then(|index| self.services.get(*index))
    }

    /// Visible row of the service at `index`, if it passes the current view.
    #[must_use]
    pub fn row_of(&self, index: usize) -> Option<usize> {
        self.rows.iter().position(|i| *i == index)
    }

    /// Swap in a freshly discovered list, keeping the selection on the same
    /// directory when it is still present.
    pub fn replace(&mut self, services: Vec<Service>) {
        let selected_dir = self.selected().map(|service| service.dir.clone());
        self.services = services;
        self.generation += 1;
        self.selected = None;
        self.rebuild_rows();

        if let Some(dir) = selected_dir {
            if let Some(row) = self
                .rows
                .iter()
                .position(|index| self.services[*index].dir == dir)
            {
                self.selected = Some(row);
            }
        }
        if self.selected.is_none() && !self.rows.is_empty() {
            self.selected = Some(0);
        }
    }

    pub fn set_filter(&mut self, filter: Filter) {
        if self.filter != filter {
            self.filter = filter;
            self.rebuild_rows();
        }
    }

    /// Case-insensitive substring match over name, unit and project.
    pub fn set_search(&mut self, search: &str) {
        if self.search != search {
            search.clone_into(&mut self.search);
            self.rebuild_rows();
        }
    }

    /// Index into `services` of the selected row.
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|row| self.rows.get(row).copied())
    }

    #[must_use]
    pub fn selected_row(&self) -> Option<usize> {
        self.selected
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Service> {
        self.selected_index().and_then(|index| self.services.get(index))
    }

    #[must_use]
    pub fn selected_ref(&self) -> Option<ServiceRef> {
        self.selected_index().map(|index| ServiceRef {
            index,
            generation: self.generation,
        })
    }

    /// The service behind `target`, unless the list was replaced since.
    #[must_use]
    pub fn resolve(&self, target: ServiceRef) -> Option<&Service> {
        if target.generation == self.generation {
            self.services.get(target.index)
        } else {
            None
        }
    }

    /// Clamp `row` into the visible range and select it.
    pub fn select_row(&mut self, row: usize) {
        self.selected = if self.rows.is_empty() {
            None
        } else {
            Some(row.min(self.rows.len() - 1))
        };
    }

    /// Record a probe result. Returns whether anything visible changed.
    pub fn apply_probe(&mut self, index: usize, probe: Probe, now: SystemTime) -> bool {
        let Some(service) = self.services.get_mut(index) else {
            return false;
        };
        if service.state == probe.state && service.pid == probe.pid {
            return false;
        }
        service.state = probe.state;
        service.pid = probe.pid;
        service.updated_at = Some(now);

        if self.filter != Filter::All {
            self.rebuild_rows();
        }
        true
    }

    fn rebuild_rows(&mut self) {
        let selected_index = self.selected_index();
        let needle = self.search.to_lowercase();

        self.rows = self
            .services
            .iter()
            .enumerate()
            .filter(|(_, service)| self.filter.matches(service))
            .filter(|(_, service)| needle.is_empty() || matches_search(service, &needle))
            .map(|(index, _)| index)
            .collect();

        self.selected = selected_index
            .and_then(|index| self.row_of(index))
            .or(if self.rows.is_empty() { None } else { Some(0) });
    }
}

fn matches_search(service: &Service, needle: &str) -> bool {
    service.name.to_lowercase().contains(needle)
        || service.unit.to_lowercase().contains(needle)
        || service
            .project
            .as_deref()
            .is_some_and(|project| project.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use super::*;

    fn service(name: &str, state: ActivityState) -> Service {
        let mut service =
            Service::new(name, format!("{name}.service"), PathBuf::from("/srv").join(name));
        service.state = state;
        service
    }

    fn registry() -> Registry {
        Registry::new(vec![
            service("api", ActivityState::Active),
            service("worker", ActivityState::Failed),
            service("cron", ActivityState::Inactive),
        ])
    }

    #[test]
    fn test_filter_and_search() {
        let mut registry = registry();
        assert_eq!(registry.rows(), &[0, 1, 2]);
        assert_eq!(registry.selected().map(|s| s.name.as_str()), Some("api"));

        registry.set_filter(Filter::Failed);
        assert_eq!(registry.rows(), &[1]);
        assert_eq!(registry.selected().map(|s| s.name.as_str()), Some("worker"));

        registry.set_filter(Filter::All);
        registry.set_search("CRON");
        assert_eq!(registry.rows(), &[2]);

        registry.set_search("nothing matches");
        assert!(registry.rows().is_empty());
        assert_eq!(registry.selected(), None);
    }

    #[test]
    fn test_selection_follows_service() {
        let mut registry = registry();
        registry.select_row(2);
        registry.set_search("o");
        assert_eq!(registry.rows(), &[1, 2]);
        assert_eq!(registry.selected().map(|s| s.name.as_str()), Some("cron"));

        registry.select_row(99);
        assert_eq!(registry.selected_row(), Some(1));
    }

    #[test]
    fn test_apply_probe() {
        let mut registry = registry();
        registry.set_filter(Filter::Active);
        assert_eq!(registry.rows(), &[0]);

        let now = SystemTime::now();
        let changed = registry.apply_probe(
            2,
            Probe {
                state: ActivityState::Active,
                pid: Some(7),
            },
            now,
        );
        assert!(changed);
        assert_eq!(registry.rows(), &[0, 2]);
        assert_eq!(registry.get(2).and_then(|s| s.visible_pid()), Some(7));
        assert_eq!(registry.get(2).and_then(|s| s.updated_at), Some(now));

        let same = registry.apply_probe(
            2,
            Probe {
                state: ActivityState::Active,
                pid: Some(7),
            },
            now + Duration::from_secs(10),
        );
        assert!(!same);
        assert_eq!(registry.get(2).and_then(|s| s.updated_at), Some(now));
        assert!(!registry.apply_probe(42, Probe::default(), now));
    }

    #[test]
    fn test_replace_bumps_generation() {
        let mut registry = registry();
        registry.select_row(1);
        let before = registry.generation();
        let target = registry.selected_ref().unwrap();
        assert_eq!(registry.resolve(target).map(|s| s.name.as_str()), Some("worker"));

        registry.replace(vec![
            service("worker", ActivityState::Unknown),
            service("new", ActivityState::Unknown),
        ]);

        let stale = ServiceRef {
            index: 0,
            generation: before,
        };
        assert!(registry.resolve(stale).is_none());
        assert_eq!(registry.generation(), before + 1);
        assert_eq!(registry.selected().map(|s| s.name.as_str()), Some("worker"));
        assert_eq!(registry.selected_row(), Some(0));
    }
}
