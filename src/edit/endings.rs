/// Line separator style of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    /// CRLF if it appears anywhere in `content`.
    pub fn detect(content: &str) -> Self {
        if content.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    /// Rewrite every separator in `content` to this style.
    pub fn apply(self, content: &str) -> String {
        let normalized = normalize(content);
        match self {
            LineEnding::Lf => normalized,
            LineEnding::CrLf => normalized.replace('\n', "\r\n"),
        }
    }
}

/// Convert CRLF separators to LF. A lone CR is content, not a separator.
pub fn normalize(content: &str) -> String {
    content.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_any_crlf() {
        assert_eq!(LineEnding::detect("a\nb\r\nc"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\nb\n"), LineEnding::Lf);
    }

    #[test]
    fn test_apply_is_uniform() {
        assert_eq!(LineEnding::CrLf.apply("a\r\nb\nc\n"), "a\r\nb\r\nc\r\n");
        assert_eq!(LineEnding::Lf.apply("a\r\nb\r\n"), "a\nb\n");
    }

    #[test]
    fn test_lone_cr_is_kept() {
        assert_eq!(normalize("z\rtail\r\n"), "z\rtail\n");
        assert_eq!(LineEnding::Lf.apply("x\ny\nz\rtail\n"), "x\ny\nz\rtail\n");
        assert_eq!(LineEnding::CrLf.apply("a\rb\n"), "a\rb\r\n");
    }
}
