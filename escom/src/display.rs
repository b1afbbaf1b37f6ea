//! Text helpers for showing device output on the console.

/// Turn buffered device bytes into printable text.
///
/// Invalid sequences become `U+FFFD`. A multi-byte character split across
/// two reads stays in `buffer` until the rest arrives.
pub fn drain_utf8_lossy(buffer: &mut Vec<u8>) -> String {
    let mut text = String::with_capacity(buffer.len());
    let mut consumed = 0;

    for chunk in buffer.utf8_chunks() {
        text.push_str(chunk.valid());
        consumed += chunk.valid().len();

        let invalid = chunk.invalid();
        if invalid.is_empty() {
            continue;
        }
        let at_end = consumed + invalid.len() == buffer.len();
        let truncated = std::str::from_utf8(invalid).is_err_and(|e| e.error_len().is_none());
        if at_end && truncated {
            break;
        }
        text.push(char::REPLACEMENT_CHARACTER);
        consumed += invalid.len();
    }

    buffer.drain(..consumed);
    text
}

/// Map CR and CR LF to LF and drop control characters other than tab.
/// BEL disappears too; errors are reported separately.
pub fn clean_device_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .filter_map(|ch| match ch {
            '\r' => Some('\n'),
            '\n' | '\t' => Some(ch),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}
