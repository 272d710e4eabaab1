use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Puts text on the system clipboard through the terminal (OSC 52), which
/// also works over SSH.
pub(crate) struct CopyToClipboard<'a>(pub &'a str);

impl crossterm::Command for CopyToClipboard<'_> {
    fn write_ansi(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(f, "\x1b]52;c;{}\x07", STANDARD.encode(self.0))
    }

    #[cfg(windows)]
    fn execute_winapi(&self) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "clipboard access needs a terminal with ANSI support",
        ))
    }
}
