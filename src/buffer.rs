//! Bounded accumulator for modem output.
//!
//! The buffer is a sliding window over the bytes received during one
//! dispatcher call. When it is full the oldest byte is dropped so the most
//! recent output, where a pending pattern can still complete, is always
//! retained. [`ResponseBuffer::overflowed`] reports whether that happened.

use heapless::Vec;

#[derive(Debug, Clone)]
pub struct ResponseBuffer<const N: usize> {
    data: Vec<u8, N>,
    overflowed: bool,
}

impl<const N: usize> Default for ResponseBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ResponseBuffer<N> {
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            overflowed: false,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Logical length, never more than [`Self::capacity`].
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `true` if bytes were discarded since the last [`Self::clear`].
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.overflowed = false;
    }

    /// Append one byte, evicting the oldest one if the window is full.
    pub fn push(&mut self, byte: u8) {
        if self.data.is_full() {
            if N == 0 {
                self.overflowed = true;
                return;
            }
            self.data.remove(0);
            self.overflowed = true;
        }
        // Cannot fail, a slot was freed above.
        let _ = self.data.push(byte);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Text view of the buffer. Non UTF-8 content yields `None`.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.data).ok()
    }

    pub fn ends_with(&self, pattern: &[u8]) -> bool {
        !pattern.is_empty() && self.data.ends_with(pattern)
    }

    pub fn contains(&self, pattern: &[u8]) -> bool {
        find(&self.data, pattern).is_some()
    }

    /// Text following the first occurrence of `label`.
    pub fn after(&self, label: &str) -> Option<&str> {
        let s = self.as_str()?;
        s.find(label).map(|i| &s[i + label.len()..])
    }

    /// Drop `n` bytes from the end, used to strip a matched terminator.
    pub fn truncate_end(&mut self, n: usize) {
        let len = self.data.len().saturating_sub(n);
        self.data.truncate(len);
    }
}

/// Byte substring search.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Rest of the line following the first `label` in `s`.
pub fn line_after<'a>(s: &'a str, label: &str) -> Option<&'a str> {
    let start = s.find(label)? + label.len();
    s[start..].split(|c| c == '\r' || c == '\n').next()
}

/// Split `s` on any of `delimiters`, skipping empty tokens.
pub fn tokens<'a>(s: &'a str, delimiters: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    s.split(move |c: char| delimiters.contains(c))
        .filter(|t| !t.is_empty())
}

/// Copy of `s` cut to the capacity of the string.
pub fn truncated<const L: usize>(s: &str) -> heapless::String<L> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// First token of `s` that parses as `T`.
pub fn first_number<T: core::str::FromStr>(s: &str, delimiters: &str) -> Option<T> {
    tokens(s, delimiters).find_map(|t| t.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_within_capacity() {
        let mut buf = ResponseBuffer::<8>::new();
        for b in b"OK\r\n" {
            buf.push(*b);
        }
        assert_eq!(buf.len(), 4);
        assert!(!buf.overflowed());
        assert!(buf.ends_with(b"\r\n"));
        assert_eq!(buf.as_str(), Some("OK\r\n"));
    }

    #[test]
    fn overflow_keeps_most_recent_bytes() {
        let mut buf = ResponseBuffer::<4>::new();
        for b in b"abcdefOK" {
            buf.push(*b);
        }
        assert_eq!(buf.len(), 4);
        assert!(buf.overflowed());
        assert_eq!(buf.as_bytes(), b"efOK");
        assert!(buf.ends_with(b"OK"));

        buf.clear();
        assert!(buf.is_empty());
        assert!(!buf.overflowed());
    }

    #[test]
    fn after_label() {
        let mut buf = ResponseBuffer::<32>::new();
        for b in b"\r\n#FTPFSIZE: 1200\r\n" {
            buf.push(*b);
        }
        assert_eq!(buf.after("#FTPFSIZE: "), Some("1200\r\n"));
        assert_eq!(buf.after("missing"), None);
    }

    #[test]
    fn strtok_like_tokens() {
        let t: heapless::Vec<&str, 8> = tokens("#SS: 1,2,10.0.0.1,3000\r\n", " ,\r\n").collect();
        assert_eq!(t.as_slice(), &["#SS:", "1", "2", "10.0.0.1", "3000"]);
        assert_eq!(first_number::<u16>(" 555\r\n", " \r\n"), Some(555));
        assert_eq!(first_number::<u16>(" \r\n", " \r\n"), None);
    }

    #[test]
    fn rest_of_line() {
        let s = "\r\n#SS: 1,0\r\n#SS: 2,4\r\n\r\nOK";
        assert_eq!(line_after(s, "#SS: "), Some("1,0"));
        assert_eq!(line_after(s, "#SS: 2,"), Some("4"));
        assert_eq!(line_after(s, "OK"), Some(""));
        assert_eq!(line_after(s, "#SI: "), None);
    }

    #[test]
    fn find_substring() {
        assert_eq!(find(b"xx+CREG: 0,1", b"+CREG: 0,"), Some(2));
        assert_eq!(find(b"abc", b""), None);
        assert_eq!(find(b"ab", b"abc"), None);
    }
}
