use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use std::fmt;
use std::str::FromStr;

/// Colon-separated category path, e.g. `expenses:food:groceries`.
///
/// Import formats address categories by path; the store addresses them by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryPath {
    parts: Vec<String>,
}

impl Serialize for CategoryPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CategoryPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CategoryPath::from_str(&s).map_err(DeError::custom)
    }
}

impl FromStr for CategoryPath {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            parts: if s.is_empty() {
                Vec::new()
            } else {
                s.split(':').map(|p| p.to_string()).collect()
            },
        })
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(":"))
    }
}

impl CategoryPath {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.as_str())
    }

    /// Last segment, the category's own title.
    pub fn leaf(&self) -> Option<&str> {
        self.parts.last().map(|p| p.as_str())
    }

    /// Path without the last segment; `None` for top-level paths.
    pub fn parent(&self) -> Option<CategoryPath> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(Self {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, title: &str) -> CategoryPath {
        let mut parts = self.parts.clone();
        parts.push(title.to_string());
        Self { parts }
    }

    pub fn starts_with(&self, other: &CategoryPath) -> bool {
        if other.parts.len() > self.parts.len() {
            return false;
        }
        self.parts.iter().zip(&other.parts).all(|(a, b)| a == b)
    }
}

impl From<&str> for CategoryPath {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or(Self { parts: Vec::new() })
    }
}
