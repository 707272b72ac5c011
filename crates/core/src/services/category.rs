//! Gallery categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use showroom_common::AppError;

/// A gallery category. The set is closed; each category owns one directory
/// under the gallery root named exactly like the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Menswear gallery.
    Male,
    /// Womenswear gallery.
    Female,
}

impl Category {
    /// Every category, in manifest order.
    pub const ALL: [Self; 2] = [Self::Male, Self::Female];

    /// Directory and manifest key for this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            _ => Err(AppError::Validation(
                "Invalid category. Must be Male or Female.".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_sensitive() {
        assert_eq!("Male".parse::<Category>().unwrap(), Category::Male);
        assert_eq!("Female".parse::<Category>().unwrap(), Category::Female);
        assert!("male".parse::<Category>().is_err());
        assert!("Kids".parse::<Category>().is_err());
        assert!("../Male".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_uses_directory_names() {
        assert_eq!(serde_json::to_string(&Category::Female).unwrap(), "\"Female\"");
    }
}
