//
// cross_file/glob.rs
//
// Glob patterns for `@require` and `@export`, compiled to anchored regexes
//

use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("unclosed character class in '{0}'")]
    UnclosedClass(String),
    #[error("unclosed alternation in '{0}'")]
    UnclosedAlternation(String),
    #[error("invalid glob '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled glob matched against `/`-separated relative paths.
///
/// `*` and `?` stay within one path segment, `**/` spans any number of
/// directories, `[...]` is a character class (`[!...]` negated) and
/// `{a,b}` is an alternation.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, GlobError> {
        let source = translate(pattern)?;
        let regex = Regex::new(&source).map_err(|source| GlobError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern can match below its first path segment.
    pub fn is_recursive(&self) -> bool {
        self.pattern.contains("**")
    }

    /// Number of path segments a match has, when that is fixed.
    pub fn segment_count(&self) -> Option<usize> {
        if self.is_recursive() {
            None
        } else {
            Some(self.pattern.split('/').count())
        }
    }
}

pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Split a pattern into its literal directory prefix and the glob remainder.
///
/// `lib/../util/*.m` → (`lib/../util`, `*.m`). A pattern without glob
/// characters is returned whole as the prefix.
pub fn split_literal_prefix(pattern: &str) -> (&str, &str) {
    if !is_glob(pattern) {
        return (pattern, "");
    }
    let mut prefix_end = 0;
    for (i, segment) in segment_offsets(pattern) {
        if is_glob(segment) {
            break;
        }
        prefix_end = i + segment.len();
    }
    let prefix = &pattern[..prefix_end];
    let rest = pattern[prefix_end..].trim_start_matches('/');
    (prefix, rest)
}

fn segment_offsets(pattern: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    pattern.split('/').map(move |segment| {
        let start = offset;
        offset += segment.len() + 1;
        (start, segment)
    })
}

fn translate(pattern: &str) -> Result<String, GlobError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut alternation_depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    i += 1;
                    if chars.get(i + 1) == Some(&'/') {
                        i += 1;
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut j = i + 1;
                let negated = matches!(chars.get(j), Some('!') | Some('^'));
                if negated {
                    j += 1;
                }
                let class_start = j;
                // a leading ']' is a literal member
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(GlobError::UnclosedClass(pattern.to_string()));
                }
                out.push('[');
                if negated {
                    out.push('^');
                }
                for &member in &chars[class_start..j] {
                    if matches!(member, '\\' | '[' | ']' | '&' | '~' | '^') {
                        out.push('\\');
                    }
                    out.push(member);
                }
                out.push(']');
                i = j;
            }
            '{' => {
                alternation_depth += 1;
                out.push_str("(?:");
            }
            '}' if alternation_depth > 0 => {
                alternation_depth -= 1;
                out.push(')');
            }
            ',' if alternation_depth > 0 => out.push('|'),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if alternation_depth > 0 {
        return Err(GlobError::UnclosedAlternation(pattern.to_string()));
    }
    out.push('$');
    Ok(out)
}
