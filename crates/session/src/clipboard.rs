//! Clipboard export of the assembled payload.
//!
//! A system backend is detected once at session start. When none exists, or
//! a write to it fails, the payload goes to a session-owned in-memory store.
//! Copying never fails from the caller's point of view.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use timegap_core::error::Error;
use tracing::{debug, warn};

/// A place a payload can be copied to.
pub trait ClipboardBackend: Send + Sync {
    fn name(&self) -> &str;

    fn write(&self, text: &str) -> Result<(), Error>;
}

/// The platform clipboard, reached through its command-line helper.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// The first helper for this platform found on `PATH`.
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        let dirs: Vec<_> = std::env::split_paths(&path).collect();
        let on_path = |program: &str| dirs.iter().any(|d| d.join(program).is_file());

        candidates()
            .into_iter()
            .find(|(program, _)| on_path(program))
            .map(|(program, args)| Self::new(program, args))
    }
}

const NO_ARGS: &[&str] = &[];

#[cfg(target_os = "macos")]
fn candidates() -> Vec<(&'static str, &'static [&'static str])> {
    vec![("pbcopy", NO_ARGS)]
}

#[cfg(target_os = "windows")]
fn candidates() -> Vec<(&'static str, &'static [&'static str])> {
    vec![("clip.exe", NO_ARGS)]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn candidates() -> Vec<(&'static str, &'static [&'static str])> {
    let mut out: Vec<(&'static str, &'static [&'static str])> = Vec::new();
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        out.push(("wl-copy", NO_ARGS));
    }
    if std::env::var_os("DISPLAY").is_some() {
        out.push(("xclip", &["-selection", "clipboard"]));
        out.push(("xsel", &["--clipboard", "--input"]));
    }
    out
}

impl ClipboardBackend for CommandClipboard {
    fn name(&self) -> &str {
        &self.program
    }

    fn write(&self, text: &str) -> Result<(), Error> {
        let unavailable = |e: std::io::Error| {
            Error::ClipboardUnavailable(format!("{}: {e}", self.program))
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(unavailable)?;

        // stdin is dropped before the wait so the helper sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };

        let status = child.wait().map_err(unavailable)?;
        written.map_err(unavailable)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::ClipboardUnavailable(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

/// In-session store; lives exactly as long as the adapter.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn read(&self) -> Option<String> {
        self.contents
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&self, text: &str) -> Result<(), Error> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::Internal("clipboard store poisoned".into()))?;
        *guard = Some(text.to_string());
        Ok(())
    }
}

/// What a copy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub backend: String,
    pub chars: usize,
}

/// Copy entry point for the control loop.
pub struct ClipboardAdapter {
    system: Option<Box<dyn ClipboardBackend>>,
    memory: MemoryClipboard,
}

impl ClipboardAdapter {
    /// Detect the system clipboard; fall back to memory when absent.
    pub fn detect() -> Self {
        let system = CommandClipboard::detect();
        match &system {
            Some(backend) => debug!(backend = %backend.name(), "System clipboard available"),
            None => debug!("No system clipboard, using in-memory store"),
        }
        Self {
            system: system.map(|b| Box::new(b) as Box<dyn ClipboardBackend>),
            memory: MemoryClipboard::default(),
        }
    }

    pub fn memory_only() -> Self {
        Self {
            system: None,
            memory: MemoryClipboard::default(),
        }
    }

    pub fn with_backend(backend: Box<dyn ClipboardBackend>) -> Self {
        Self {
            system: Some(backend),
            memory: MemoryClipboard::default(),
        }
    }

    /// Name of the backend copies go to first.
    pub fn backend_name(&self) -> &str {
        self.system
            .as_ref()
            .map(|b| b.name())
            .unwrap_or_else(|| self.memory.name())
    }

    /// Copy `text`. The in-memory store always keeps a copy for read-back.
    pub fn copy(&self, text: &str) -> CopyReport {
        let chars = text.chars().count();
        if let Err(e) = self.memory.write(text) {
            warn!(error = %e, "In-memory clipboard write failed");
        }

        if let Some(system) = &self.system {
            match system.write(text) {
                Ok(()) => {
                    return CopyReport {
                        backend: system.name().to_string(),
                        chars,
                    };
                }
                Err(e) => warn!(error = %e, "System clipboard failed, kept payload in memory"),
            }
        }

        CopyReport {
            backend: self.memory.name().to_string(),
            chars,
        }
    }

    /// The last copied payload, byte-for-byte.
    pub fn read_back(&self) -> Option<String> {
        self.memory.read()
    }
}
