//! Integration Test: Core Boundaries
//!
//! The Conductor is driven from a UI frame loop, so nothing in the core may
//! block a thread, and it stays usable from any surface, so it may not pull
//! in terminal crates.

use std::fs;

use architectural_enforcement::{find_patterns, workspace_root, Violation};

fn report(kind: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("Found {} {kind} violation(s)", violations.len());
}

#[test]
fn test_no_blocking_calls_in_core() {
    let violations = find_patterns(
        "conductor/core/src",
        &[
            "std::thread::sleep",
            "thread::sleep(",
            "reqwest::blocking",
            "block_on(",
            "blocking_recv(",
            "blocking_send(",
        ],
    );
    report("blocking call", &violations);
}

#[test]
fn test_core_has_no_terminal_dependencies() {
    let violations = find_patterns("conductor/core/src", &["ratatui", "crossterm"]);
    report("terminal import", &violations);

    let manifest = fs::read_to_string(workspace_root().join("conductor/core/Cargo.toml"))
        .expect("core manifest");
    for krate in ["ratatui", "crossterm"] {
        assert!(
            !manifest.contains(krate),
            "conductor/core must not depend on {krate}"
        );
    }
}

#[test]
fn test_surface_does_not_reach_the_network() {
    let violations = find_patterns("tui/src", &["reqwest", "HttpBackend::new("]);
    report("network access from the surface", &violations);
}

#[test]
fn test_backend_settings_come_from_config() {
    let violations = find_patterns("conductor/core/src/backend", &["\"DUET_"]);
    report("settings read outside the config layer", &violations);
}
