pub const DELIMITER: char = '/';

/// Maps logical paths onto storage keys under a fixed prefix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathPrefixer {
    prefix: String,
}

impl PathPrefixer {
    pub fn new(prefix: &str) -> Self {
        let prefix = collapse_delimiters(prefix.trim_matches(DELIMITER));

        let prefix = if prefix.is_empty() {
            prefix
        } else {
            format!("{}{}", prefix, DELIMITER)
        };

        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn apply_prefix(&self, path: &str) -> String {
        let path = collapse_delimiters(path.trim_start_matches(DELIMITER));

        format!("{}{}", self.prefix, path)
    }

    /// Strips the prefix from a storage key. `None` means the key lives
    /// outside this adapter's namespace.
    pub fn remove_prefix(&self, key: &str) -> Option<String> {
        key.strip_prefix(self.prefix.as_str()).map(|path| path.to_string())
    }

    /// Storage key of a directory marker: the prefixed path with exactly one
    /// trailing delimiter.
    pub fn directory_key(&self, dirname: &str) -> String {
        let key = self.apply_prefix(dirname);

        format!("{}{}", key.trim_end_matches(DELIMITER), DELIMITER)
    }
}

pub fn dirname(path: &str) -> String {
    let path = path.trim_end_matches(DELIMITER);

    match path.rfind(DELIMITER) {
        Some(pos) => path[..pos].to_string(),
        None => "".to_string(),
    }
}

pub fn is_directory_key(key: &str) -> bool {
    key.ends_with(DELIMITER)
}

fn collapse_delimiters(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut previous = None;

    for c in path.chars() {
        if c == DELIMITER && previous == Some(DELIMITER) {
            continue;
        }

        collapsed.push(c);
        previous = Some(c);
    }

    collapsed
}
