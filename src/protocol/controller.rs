use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

const SOURCE_PREFIX: &str = "source:";

/// Outbound half of the control protocol: lines written back to the
/// controller on standard output.
#[derive(Clone)]
pub struct ControllerLink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl ControllerLink {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Asks the controller to fetch and stream `source` (e.g. a magnet link).
    pub fn request_source(&self, source: &str) {
        self.send_line(&format!("{}{}", SOURCE_PREFIX, source));
    }

    fn send_line(&self, line: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writeln!(writer, "{}", line).and_then(|_| writer.flush());
        match result {
            Ok(()) => log::debug!("Sent to controller: {}", line),
            Err(e) => log::warn!("Failed to send '{}' to controller: {}", line, e),
        }
    }
}

impl std::fmt::Debug for ControllerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerLink").finish_non_exhaustive()
    }
}
