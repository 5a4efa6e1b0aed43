#[cfg(test)]
mod mock;
#[cfg(unix)]
mod unix;

#[cfg(test)]
pub(crate) use mock::{MockEvent, MockProcessManager, Script};
#[cfg(unix)]
pub use unix::UnixProcessManager;
