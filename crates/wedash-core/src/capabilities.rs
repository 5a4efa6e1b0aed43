use wedash_types::Service;

/// Answers whether a service's build script defines a target.
pub trait Capabilities: Send + Sync {
    fn has_target(&self, service: &Service, target: &str) -> bool;
}

/// Reads targets straight from the service's Makefile.
#[derive(Debug, Default, Clone, Copy)]
pub struct MakefileTargets;

impl Capabilities for MakefileTargets {
    fn has_target(&self, service: &Service, target: &str) -> bool {
        match std::fs::read_to_string(&service.build_script) {
            Ok(text) => makefile_targets(&text).any(|t| t == target),
            Err(err) => {
                tracing::debug!(
                    "Cannot read build script {}: {err}",
                    service.build_script.display()
                );
                false
            }
        }
    }
}

/// Explicit rule targets of a Makefile, in order of appearance.
pub fn makefile_targets(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .filter(|line| !line.starts_with(char::is_whitespace) && !line.starts_with('#'))
        .filter_map(|line| {
            let (head, rest) = line.split_once(':')?;
            // `x := y`, `x ::= y` and `x ?= a:b` are assignments, not rules.
            if head.contains('=') || rest.starts_with('=') || rest.starts_with(":=") {
                return None;
            }
            Some(head)
        })
        .flat_map(str::split_whitespace)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const MAKEFILE: &str = "\
SHELL := /bin/bash
IMAGE ?= registry.local:5000/api
.PHONY: up down logs

# restart: commented out
up: build
\tdocker compose up -d

down stop:
\tdocker compose down
build::
\techo ok
\trestart: indented lines are recipes
";

    #[test]
    fn test_makefile_targets() {
        let targets: Vec<_> = makefile_targets(MAKEFILE).collect();
        assert_eq!(targets, vec![".PHONY", "up", "down", "stop", "build"]);
    }

    #[test]
    fn test_has_target() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Makefile"), MAKEFILE).unwrap();
        let service = Service::new("api", "api.service", tmp.path().to_path_buf());

        assert!(MakefileTargets.has_target(&service, "up"));
        assert!(MakefileTargets.has_target(&service, "down"));
        assert!(!MakefileTargets.has_target(&service, "restart"));
    }

    #[test]
    fn test_missing_build_script() {
        let service = Service::new("ghost", "ghost.service", PathBuf::from("/nonexistent/ghost"));
        assert!(!MakefileTargets.has_target(&service, "up"));
    }
}
