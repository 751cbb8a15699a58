use bytes::Bytes;
use std::path::Path;

// -----------------------------------------------------------------------------
// ----- Frame -----------------------------------------------------------------

/// One extracted (label, payload) unit.
///
/// Constructed only after a boundary, a fully parsed header, and exactly
/// `declared_len` payload bytes have been consumed from the stream; handed
/// to the sink and dropped, never retained across frames.
#[derive(Clone, Debug)]
pub struct Frame {
    pub label: String,
    pub payload: Bytes,
}

// -----------------------------------------------------------------------------
// ----- Label sanitization ----------------------------------------------------

/// Turn a stream-supplied label into a name that cannot escape the output
/// directory.
///
/// Path separators and control characters become `_`, leading dots are
/// stripped (kills `.` / `..` and hidden-file tricks), and a label with no
/// extension gets `default_ext`. Interior spaces survive; the device labels
/// frames as `"<counter> <fw> <l> <r> <b> <pwm>.jpg"`.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_label(raw: &str, default_ext: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').trim();
    if cleaned.is_empty() {
        return None;
    }

    let mut name = cleaned.to_string();
    if Path::new(&name).extension().is_none() {
        name.push('.');
        name.push_str(default_ext);
    }

    Some(name)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
