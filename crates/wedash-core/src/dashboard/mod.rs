mod background;
mod commands;
mod main;

pub use commands::{Action, DashboardCommand, DashboardEvent};
pub use main::{Dashboard, DashboardOptions};
