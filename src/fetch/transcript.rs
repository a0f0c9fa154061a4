//! Extracting a running configuration from a raw shell transcript.
//!
//! The transcript contains whatever the device printed: login banner, the
//! echoed commands, the configuration, the trailing prompt. Extraction is
//! anchored on the "Building configuration" / "Current configuration" line
//! and the first following line that is exactly `end`.

use std::sync::LazyLock;

use regex::Regex;

/// A lone `end` line followed eventually by a prompt at end of output.
static TRANSCRIPT_COMPLETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\nend\s*\n.*[#>]\s*$").expect("transcript pattern is valid")
});

/// Whether the accumulated output contains a full configuration dump
/// followed by the device prompt.
pub fn is_transcript_complete(output: &str) -> bool {
    TRANSCRIPT_COMPLETE.is_match(output)
}

/// Extract the configuration body from a raw transcript.
///
/// Works on bytes so banners and descriptions in legacy encodings come through
/// untouched. Carriage returns are stripped. Returns nothing when the start
/// anchor never appears; a missing `end` keeps everything from the anchor.
pub fn clean_running_config(raw: &[u8]) -> Vec<u8> {
    let mut config: Vec<Vec<u8>> = Vec::new();
    let mut capturing = false;

    for line in raw.split(|&b| b == b'\n') {
        let line: Vec<u8> = line.iter().copied().filter(|&b| b != b'\r').collect();

        if !capturing
            && (line.starts_with(b"Current configuration")
                || line.starts_with(b"Building configuration"))
        {
            capturing = true;
        }

        if capturing {
            let done = line.trim_ascii() == b"end";
            config.push(line);
            if done {
                break;
            }
        }
    }

    config.join(&b'\n')
}
