//! Member count of the tracer's file-access archive

use super::ParseOutcome;
use std::io::Read;
use tar::Archive;

/// Number of entries in a tar archive, 0 with a warning if it can't be read
///
/// Entries are walked as they stream past, so the archive is never held in
/// memory as a whole.
pub fn count_entries<R: Read>(reader: R) -> ParseOutcome<usize> {
    let mut archive = Archive::new(reader);
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(e) => return ParseOutcome::degraded(0, format!("Unreadable archive: {}", e)),
    };

    let mut count = 0;
    for entry in entries {
        if let Err(e) = entry {
            return ParseOutcome::degraded(0, format!("Corrupt archive entry: {}", e));
        }
        count += 1;
    }
    ParseOutcome::clean(count)
}
