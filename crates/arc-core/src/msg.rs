//! Console output tiers
//!
//! `info` and `detail` are progress output and go quiet while a command batch
//! runs; `message` always prints. Warnings and errors are never suppressed.

use colored::Colorize;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Set the quiet toggle, returning the previous value
pub fn set_quiet(quiet: bool) -> bool {
    QUIET.swap(quiet, Ordering::Relaxed)
}

/// Restores the previous quiet state when dropped
pub struct QuietGuard {
    previous: bool,
}

impl QuietGuard {
    pub fn new() -> Self {
        Self {
            previous: set_quiet(true),
        }
    }
}

impl Default for QuietGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        set_quiet(self.previous);
    }
}

pub fn info(text: impl Display) {
    if !is_quiet() {
        println!("{}", format!("Info: {}", text).bold());
    }
}

pub fn detail(text: impl Display) {
    if !is_quiet() {
        println!("  Detail: {}", text);
    }
}

pub fn message(text: impl Display) {
    println!("{}", text);
}

pub fn warn(text: impl Display) {
    println!("{}", format!("Warn: {}", text).yellow());
}

pub fn error(text: impl Display) {
    eprintln!("{}", format!("Error: {}", text).red());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_quiet_guard_restores_state() {
        set_quiet(false);
        {
            let _guard = QuietGuard::new();
            assert!(is_quiet());
            {
                let _inner = QuietGuard::new();
                assert!(is_quiet());
            }
            assert!(is_quiet());
        }
        assert!(!is_quiet());
    }
}
