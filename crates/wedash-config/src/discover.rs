use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use wedash_types::Service;

use crate::load_from_path;

/// File names recognised as a service build script, in lookup order.
pub const BUILD_SCRIPTS: [&str; 3] = ["Makefile", "makefile", "GNUmakefile"];
/// Optional per-service overrides.
pub const SIDECAR_FILE: &str = "wedash.toml";

const DEFAULT_LOG_FILE: &str = "run.log";
const SKIPPED_DIRS: [&str; 2] = ["target", "node_modules"];

/// Scan `roots` for services, descending at most `max_depth` levels below each root.
///
/// Directories are visited depth-first in name order, so the result is stable
/// between scans. Unreadable directories and invalid sidecar files are logged
/// and skipped.
pub fn discover<P: AsRef<Path>>(roots: &[P], max_depth: usize) -> Vec<Service> {
    let mut seen = HashSet::new();
    let mut services = Vec::new();

    for root in roots {
        let root = root.as_ref();
        let root = match root.canonicalize() {
            Ok(root) => root,
            Err(err) => {
                tracing::warn!("Skipping root {}: {err}", root.display());
                continue;
            }
        };

        let mut stack = vec![(root.clone(), 0usize)];
        while let Some((dir, depth)) = stack.pop() {
            if !seen.insert(dir.clone()) {
                continue;
            }

            if let Some(service) = service_at(&root, &dir) {
                tracing::debug!("Discovered service {:?} in {}", service.name, dir.display());
                services.push(service);
            }

            if depth >= max_depth {
                continue;
            }

            match subdirectories(&dir) {
                Ok(children) => {
                    stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
                }
                Err(err) => tracing::warn!("Cannot read {}: {err}", dir.display()),
            }
        }
    }

    tracing::info!("Discovered {} services", services.len());
    services
}

fn subdirectories(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Symlinks are not followed.
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref()) {
            continue;
        }
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

fn service_at(root: &Path, dir: &Path) -> Option<Service> {
    let build_script = BUILD_SCRIPTS
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())?;

    let name = dir
        .file_name()
        .map_or_else(|| "root".to_owned(), |n| n.to_string_lossy().into_owned());

    let mut service = Service::new(name.clone(), format!("{name}.service"), dir.to_path_buf());
    service.build_script = build_script;
    service.project = dir
        .parent()
        .filter(|parent| *parent != root && dir != root)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned());

    let log_file = dir.join(DEFAULT_LOG_FILE);
    if log_file.is_file() {
        service.log_file = Some(log_file);
    }

    let sidecar = dir.join(SIDECAR_FILE);
    if sidecar.is_file() {
        match load_from_path(&sidecar) {
            Ok(file) => file.apply(&mut service),
            Err(err) => tracing::warn!("Ignoring {}: {err}", sidecar.display()),
        }
    }

    Some(service)
}
