use super::DEFAULT_SEPARATOR;
use crate::errors::MetricError;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;

/// A hierarchical metric path such as `Custom Metrics|Extension Starter|Node1|Requests`.
///
/// Segments never contain the separator: constructing a path from a segment that does is an
/// error rather than an implicit escape, so a rendered path can always be split back into the
/// segments it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricPath {
    segments: Vec<String>,
    separator: char,
}

impl MetricPath {
    /// Builds a path with the default `|` separator
    ///
    /// # Examples
    ///
    /// ```
    /// use extension_monitor::MetricPath;
    ///
    /// let path = MetricPath::new(vec!["App", "Node1", "Requests"]).unwrap();
    /// assert_eq!("App|Node1|Requests", path.to_string());
    /// ```
    pub fn new<I, S>(segments: I) -> Result<MetricPath, MetricError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MetricPath::with_separator(DEFAULT_SEPARATOR, segments)
    }

    pub fn with_separator<I, S>(separator: char, segments: I) -> Result<MetricPath, MetricError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(MetricError::EmptyPath);
        }

        for (i, segment) in segments.iter().enumerate() {
            validate_segment(i, segment, separator)?;
        }

        Ok(MetricPath {
            segments,
            separator,
        })
    }

    /// Splits a rendered path back into its segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use extension_monitor::MetricPath;
    ///
    /// let path = MetricPath::parse("App|Node1|Requests", '|').unwrap();
    /// assert_eq!(&["App", "Node1", "Requests"], path.segments());
    /// assert!(MetricPath::parse("App||Requests", '|').is_err());
    /// ```
    pub fn parse(s: &str, separator: char) -> Result<MetricPath, MetricError> {
        if s.is_empty() {
            return Err(MetricError::EmptyPath);
        }

        MetricPath::with_separator(separator, s.split(separator))
    }

    /// Returns a new path with `segment` appended
    pub fn child<S: Into<String>>(&self, segment: S) -> Result<MetricPath, MetricError> {
        let segment = segment.into();
        validate_segment(self.segments.len(), &segment, self.separator)?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(MetricPath {
            segments,
            separator: self.separator,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// The final segment. Paths are never empty.
    pub fn leaf(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn render(&self) -> String {
        let mut buf = [0u8; 4];
        let sep: &str = self.separator.encode_utf8(&mut buf);
        self.segments.join(sep)
    }
}

impl fmt::Display for MetricPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", self.separator)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Returns whether `s` contains the separator. Separators are nearly always ASCII, where a
/// `memchr` scan beats a char-by-char search.
pub(crate) fn contains_separator(s: &str, separator: char) -> bool {
    if separator.is_ascii() {
        memchr::memchr(separator as u8, s.as_bytes()).is_some()
    } else {
        s.contains(separator)
    }
}

fn validate_segment(pos: usize, segment: &str, separator: char) -> Result<(), MetricError> {
    if segment.is_empty() {
        Err(MetricError::EmptySegment(pos))
    } else if contains_separator(segment, separator) {
        Err(MetricError::ReservedCharacter {
            value: segment.to_owned(),
            separator,
        })
    } else {
        Ok(())
    }
}

/// A single configured character replacement, e.g.
///
/// ```text
/// <Replacement>
///     Replace ","
///     ReplaceWith "#"
/// </Replacement>
/// ```
#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
pub struct Replacement {
    pub replace: String,
    pub replace_with: String,
}

/// Ordered replacement rules applied to raw names (from remote systems) before they become path
/// segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacements {
    rules: Vec<Replacement>,
    separator: char,
}

impl Replacements {
    /// No rules at all: names containing the separator are rejected by `apply`
    pub fn none(separator: char) -> Replacements {
        Replacements {
            rules: Vec::new(),
            separator,
        }
    }

    /// The separator, commas, and colons are all replaced with `#`
    pub fn defaults(separator: char) -> Replacements {
        let rules = [separator, ',', ':']
            .iter()
            .map(|c| Replacement {
                replace: c.to_string(),
                replace_with: String::from("#"),
            })
            .collect();

        Replacements { rules, separator }
    }

    /// Rules are validated by the configuration loader; a replacement that reintroduces the
    /// separator is still caught by `apply`.
    pub fn new(separator: char, rules: Vec<Replacement>) -> Replacements {
        Replacements { rules, separator }
    }

    pub fn rules(&self) -> &[Replacement] {
        &self.rules
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    /// Runs every rule over `raw`, only allocating when a rule matches. Fails when the result
    /// still contains the separator.
    ///
    /// # Examples
    ///
    /// ```
    /// use extension_monitor::Replacements;
    ///
    /// let rules = Replacements::defaults('|');
    /// assert_eq!("Pipe#", rules.apply("Pipe|").unwrap());
    /// assert_eq!("Question?Mark", rules.apply("Question?Mark").unwrap());
    /// ```
    pub fn apply<'a>(&self, raw: &'a str) -> Result<Cow<'a, str>, MetricError> {
        let mut out = Cow::Borrowed(raw);
        for rule in &self.rules {
            if !rule.replace.is_empty() && out.contains(rule.replace.as_str()) {
                out = Cow::Owned(out.replace(rule.replace.as_str(), &rule.replace_with));
            }
        }

        if contains_separator(&out, self.separator) {
            return Err(MetricError::ReservedCharacter {
                value: raw.to_owned(),
                separator: self.separator,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_parse_round_trip() {
        let path = MetricPath::new(vec!["App", "Node1", "Requests"]).unwrap();
        let rendered = path.render();
        assert_eq!(rendered, "App|Node1|Requests");
        assert_eq!(path.to_string(), rendered);

        let parsed = MetricPath::parse(&rendered, '|').unwrap();
        assert_eq!(parsed.segments(), &["App", "Node1", "Requests"]);
        assert_eq!(parsed, path);
    }

    #[test]
    fn test_round_trip_custom_separator() {
        let path = MetricPath::with_separator('/', vec!["App", "Node|1", "Requests"]).unwrap();
        assert_eq!(path.render(), "App/Node|1/Requests");
        assert_eq!(MetricPath::parse(&path.render(), '/').unwrap(), path);
    }

    #[test]
    fn test_non_ascii_separator() {
        let path = MetricPath::with_separator('»', vec!["a", "b"]).unwrap();
        assert_eq!(path.render(), "a»b");
        assert!(MetricPath::with_separator('»', vec!["a»"]).is_err());
    }

    #[test]
    fn test_reject_separator_in_segment() {
        let err = MetricPath::new(vec!["App", "Pipe|"]).unwrap_err();
        assert_eq!(
            err,
            MetricError::ReservedCharacter {
                value: String::from("Pipe|"),
                separator: '|',
            }
        );
    }

    #[test]
    fn test_reject_empty() {
        assert_eq!(
            MetricPath::new(Vec::<String>::new()).unwrap_err(),
            MetricError::EmptyPath
        );
        assert_eq!(
            MetricPath::new(vec!["a", ""]).unwrap_err(),
            MetricError::EmptySegment(1)
        );
        assert_eq!(MetricPath::parse("", '|').unwrap_err(), MetricError::EmptyPath);
        assert_eq!(
            MetricPath::parse("a|b|", '|').unwrap_err(),
            MetricError::EmptySegment(2)
        );
    }

    #[test]
    fn test_child() {
        let prefix = MetricPath::parse("Custom Metrics|Extension Starter", '|').unwrap();
        let child = prefix.child("Heart Beat").unwrap();
        assert_eq!(child.len(), 3);
        assert_eq!(child.leaf(), "Heart Beat");
        assert!(prefix.child("a|b").is_err());
        assert!(prefix.child("").is_err());
    }

    #[test]
    fn test_default_replacements() {
        let rules = Replacements::defaults('|');
        assert_eq!(rules.apply("Pipe|").unwrap(), "Pipe#");
        assert_eq!(rules.apply("Comma,").unwrap(), "Comma#");
        assert_eq!(rules.apply(":Colon").unwrap(), "#Colon");
        assert_eq!(rules.apply("Memory \u{dc}sed").unwrap(), "Memory \u{dc}sed");
    }

    #[test]
    fn test_replacements_borrow_when_untouched() {
        let rules = Replacements::defaults('|');
        match rules.apply("Requests").unwrap() {
            Cow::Borrowed(s) => assert_eq!(s, "Requests"),
            Cow::Owned(_) => panic!("expected no allocation"),
        }
    }

    #[test]
    fn test_no_rules_rejects_separator() {
        let rules = Replacements::none('|');
        assert!(rules.apply("Pipe|").is_err());
        assert_eq!(rules.apply("Comma,").unwrap(), "Comma,");
    }

    #[test]
    fn test_rule_reintroducing_separator() {
        let rules = Replacements::new(
            '|',
            vec![Replacement {
                replace: String::from("/"),
                replace_with: String::from("|"),
            }],
        );
        assert!(rules.apply("a/b").is_err());
    }
}
