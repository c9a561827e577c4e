//! Filesystem wildcard expansion for `*` and `?`.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters that make a word a wildcard pattern.
pub const WILDCARD_CHARS: [char; 2] = ['*', '?'];

pub fn is_pattern(word: &str) -> bool {
    word.contains(WILDCARD_CHARS)
}

/// Translates one path component into an anchored regex.
fn component_regex(component: &str) -> Result<Regex> {
    let mut re = String::with_capacity(component.len() + 8);
    re.push('^');
    let mut literal = [0u8; 4];
    for ch in component.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            _ => re.push_str(&regex::escape(ch.encode_utf8(&mut literal))),
        }
    }
    re.push('$');
    Regex::new(&re).with_context(|| format!("bad pattern {component}"))
}

/// Returns the entries matching `pattern`, sorted.
///
/// Only the last path component may contain wildcards; the directory part
/// is taken literally and resolved against `cwd` when relative. Hidden
/// entries match only if the pattern component starts with `.`.
pub fn expand(pattern: &str, cwd: &Path) -> Result<Vec<String>> {
    let (dir_part, component) = match pattern.rfind('/') {
        Some(pos) => (&pattern[..=pos], &pattern[pos + 1..]),
        None => ("", pattern),
    };
    let dir: PathBuf = if dir_part.is_empty() {
        cwd.to_path_buf()
    } else {
        cwd.join(dir_part)
    };

    let re = component_regex(component)?;
    let show_hidden = component.starts_with('.');

    let mut matches = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("can't read {}", dir.display()))? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') && !show_hidden {
            continue;
        }
        if re.is_match(name) {
            matches.push(format!("{dir_part}{name}"));
        }
    }
    matches.sort();
    Ok(matches)
}

/// Expands `pattern` and prints the matches on one line.
///
/// Unreadable directories are reported like an empty match.
pub fn print_matches(pattern: &str, cwd: &Path, out: &mut dyn Write) -> io::Result<()> {
    match expand(pattern, cwd) {
        Ok(matches) if !matches.is_empty() => writeln!(out, "{}", matches.join(" ")),
        Ok(_) => writeln!(out, "psh: no matches found: {pattern}"),
        Err(e) => {
            debug!(pattern, error = %e, "wildcard expansion failed");
            writeln!(out, "psh: no matches found: {pattern}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.rs", "ab.md", ".hidden.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("x.txt"), "").unwrap();
        dir
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern("*.txt"));
        assert!(is_pattern("a?"));
        assert!(!is_pattern("plain"));
    }

    #[test]
    fn test_star_matches_relative_to_cwd() {
        let dir = fixture();
        assert_eq!(expand("*.txt", dir.path()).unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        let dir = fixture();
        assert_eq!(expand("?.rs", dir.path()).unwrap(), vec!["c.rs"]);
        assert_eq!(expand("a?.md", dir.path()).unwrap(), vec!["ab.md"]);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let dir = fixture();
        fs::write(dir.path().join("a+b.log"), "").unwrap();
        assert_eq!(expand("a+*.log", dir.path()).unwrap(), vec!["a+b.log"]);
        assert!(expand("a.*", dir.path()).unwrap().iter().all(|m| m.starts_with("a.")));
    }

    #[test]
    fn test_hidden_files_need_leading_dot() {
        let dir = fixture();
        assert_eq!(expand(".*.txt", dir.path()).unwrap(), vec![".hidden.txt"]);
        assert!(!expand("*", dir.path()).unwrap().contains(&".hidden.txt".to_string()));
    }

    #[test]
    fn test_directory_prefix_is_kept() {
        let dir = fixture();
        assert_eq!(expand("sub/*.txt", dir.path()).unwrap(), vec!["sub/x.txt"]);

        let absolute = format!("{}/*.rs", dir.path().display());
        assert_eq!(
            expand(&absolute, Path::new("/")).unwrap(),
            vec![format!("{}/c.rs", dir.path().display())]
        );
    }

    #[test]
    fn test_print_matches() {
        let dir = fixture();
        let printed = |pattern: &str| {
            let mut out = Vec::<u8>::new();
            print_matches(pattern, dir.path(), &mut out).unwrap();
            String::from_utf8(out).unwrap()
        };
        assert_eq!(printed("*.txt"), "a.txt b.txt\n");
        assert_eq!(printed("*.zip"), "psh: no matches found: *.zip\n");
        assert_eq!(printed("missing/*"), "psh: no matches found: missing/*\n");
    }
}
