//! Course and course-run key parsing.
//!
//! Supported forms:
//! - `course-v1:{org}+{course}+{run}` (run key)
//! - `{org}/{course}/{run}` (legacy run key)
//! - `{org}+{course}` (course key)

use crate::error::CourseKeyError;

const V1_PREFIX: &str = "course-v1:";

/// Parsed course or run key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    /// `None` for course-level keys
    pub run: Option<String>,
}

impl CourseKey {
    pub fn parse(raw: &str) -> Result<Self, CourseKeyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CourseKeyError::Empty);
        }

        let parts: Vec<&str> = if let Some(rest) = raw.strip_prefix(V1_PREFIX) {
            let parts: Vec<&str> = rest.split('+').collect();
            if parts.len() != 3 {
                return Err(CourseKeyError::Malformed(raw.to_string()));
            }
            parts
        } else if raw.contains('/') {
            let parts: Vec<&str> = raw.split('/').collect();
            if parts.len() != 3 {
                return Err(CourseKeyError::Malformed(raw.to_string()));
            }
            parts
        } else {
            let parts: Vec<&str> = raw.split('+').collect();
            if parts.len() != 2 {
                return Err(CourseKeyError::Malformed(raw.to_string()));
            }
            parts
        };

        if parts.iter().any(|part| !is_valid_part(part)) {
            return Err(CourseKeyError::Malformed(raw.to_string()));
        }

        Ok(Self {
            org: parts[0].to_string(),
            course: parts[1].to_string(),
            run: parts.get(2).map(|run| run.to_string()),
        })
    }

    pub fn is_run(&self) -> bool {
        self.run.is_some()
    }
}

impl std::str::FromStr for CourseKey {
    type Err = CourseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CourseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.run {
            Some(run) => write!(f, "{V1_PREFIX}{}+{}+{}", self.org, self.course, run),
            None => write!(f, "{}+{}", self.org, self.course),
        }
    }
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}
