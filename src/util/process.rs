// src/util/process.rs
use anyhow::{bail, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Executable names of the Anki desktop app on this platform.
fn anki_process_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["anki.exe"]
    } else if cfg!(target_os = "macos") {
        &["Anki", "anki"] // macOS can show as either
    } else {
        &["anki"]
    }
}

/// PID of a running Anki desktop process, if any.
pub fn running_anki_pid() -> Option<Pid> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    anki_process_names().iter().find_map(|name| {
        system
            .processes_by_exact_name(name.as_ref())
            .next()
            .map(|p| p.pid())
    })
}

/// Refuse direct collection access while Anki is running.
///
/// Anki holds the collection open; a second writer corrupts the database.
/// Notes can still be submitted through the remote service meanwhile.
pub fn check_anki_not_running() -> Result<()> {
    if let Some(pid) = running_anki_pid() {
        bail!(
            "Anki is currently running (PID: {}).\n\n\
             Close Anki before writing to the collection directly, or submit\n\
             through the remote service while Anki is open.",
            pid
        );
    }
    Ok(())
}
