//! Commands behind each dashboard action.
//!
//! Build-script actions run `make` in the service directory. Logs come from
//! the service's log file when it has one and from the user journal otherwise.

use wedash_types::Service;

use crate::process_manager::CommandSpec;

pub const UP: &str = "up";
pub const DOWN: &str = "down";
pub const RESTART: &str = "restart";

/// Lines of backlog shown when a log file starts being followed.
const FOLLOW_BACKLOG: usize = 50;

/// `make -f <build script> <target>` in the service directory.
#[must_use]
pub fn make(service: &Service, target: &str) -> CommandSpec {
    CommandSpec::new([
        "make".to_owned(),
        "-f".to_owned(),
        service.build_script.display().to_string(),
        target.to_owned(),
    ])
    .cwd(&service.dir)
}

#[must_use]
pub fn up(service: &Service) -> CommandSpec {
    make(service, UP)
}

#[must_use]
pub fn down(service: &Service) -> CommandSpec {
    make(service, DOWN)
}

#[must_use]
pub fn restart(service: &Service) -> CommandSpec {
    make(service, RESTART)
}

#[must_use]
pub fn follow(service: &Service) -> CommandSpec {
    match &service.log_file {
        Some(path) => CommandSpec::new([
            "tail".to_owned(),
            "-n".to_owned(),
            FOLLOW_BACKLOG.to_string(),
            "-F".to_owned(),
            path.display().to_string(),
        ])
        .cwd(&service.dir),
        None => journal_follow(service),
    }
}

/// Follow the unit's journal, whatever log source the service has.
#[must_use]
pub fn journal_follow(service: &Service) -> CommandSpec {
    CommandSpec::new(["journalctl", "--user", "-f", "-u", service.unit.as_str()]).cwd(&service.dir)
}

#[must_use]
pub fn last_logs(service: &Service, lines: usize) -> CommandSpec {
    let lines = lines.to_string();
    let spec = match &service.log_file {
        Some(path) => CommandSpec::new([
            "tail".to_owned(),
            "-n".to_owned(),
            lines,
            path.display().to_string(),
        ]),
        None => CommandSpec::new([
            "journalctl",
            "--user",
            "--no-pager",
            "-n",
            lines.as_str(),
            "-u",
            service.unit.as_str(),
        ]),
    };
    spec.cwd(&service.dir)
}
