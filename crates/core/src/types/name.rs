//! Length-bounded display names.
//!
//! Usernames, household names and shopping list item names are all free text
//! with a character-count window. Input is trimmed before it is measured.

use thiserror::Error;

/// Errors that can occur when parsing a bounded name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Nothing left after trimming.
    #[error("{field} is required")]
    Empty {
        /// Human-readable field name.
        field: &'static str,
    },
    /// Shorter than the minimum.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Human-readable field name.
        field: &'static str,
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than the maximum.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Human-readable field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

macro_rules! define_bounded_name {
    ($(#[$meta:meta])* $name:ident, $field:literal, $min:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Minimum length in characters.
            pub const MIN_LENGTH: usize = $min;
            /// Maximum length in characters.
            pub const MAX_LENGTH: usize = $max;

            /// Parse a value, trimming surrounding whitespace first.
            ///
            /// # Errors
            ///
            /// Returns [`NameError`] if the trimmed input is empty or outside
            /// the allowed length window.
            pub fn parse(s: &str) -> Result<Self, NameError> {
                let s = s.trim();
                let len = s.chars().count();
                if len == 0 {
                    return Err(NameError::Empty { field: $field });
                }
                if len < Self::MIN_LENGTH {
                    return Err(NameError::TooShort {
                        field: $field,
                        min: Self::MIN_LENGTH,
                    });
                }
                if len > Self::MAX_LENGTH {
                    return Err(NameError::TooLong {
                        field: $field,
                        max: Self::MAX_LENGTH,
                    });
                }
                Ok(Self(s.to_owned()))
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the name and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self::parse(&s)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_bounded_name!(
    /// A unique account username (2-60 characters).
    Username,
    "Username",
    2,
    60
);

define_bounded_name!(
    /// A unique household name (2-60 characters).
    HouseholdName,
    "Household name",
    2,
    60
);

define_bounded_name!(
    /// The name of a shopping list item (1-200 characters).
    ///
    /// Item names are deliberately not unique: the same item may be listed
    /// several times for recurring purchases.
    ItemName,
    "Item name",
    1,
    200
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_bounds() {
        assert!(Username::parse("ab").is_ok());
        assert!(Username::parse(&"a".repeat(60)).is_ok());
        assert_eq!(
            Username::parse("a"),
            Err(NameError::TooShort {
                field: "Username",
                min: 2
            })
        );
        assert!(matches!(
            Username::parse(&"a".repeat(61)),
            Err(NameError::TooLong { max: 60, .. })
        ));
    }

    #[test]
    fn test_parse_trims() {
        let name = HouseholdName::parse("  Seigaku Dorm  ").unwrap();
        assert_eq!(name.as_str(), "Seigaku Dorm");
        assert!(matches!(
            HouseholdName::parse("    "),
            Err(NameError::Empty { .. })
        ));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 60 two-byte characters are still 60 characters
        assert!(Username::parse(&"é".repeat(60)).is_ok());
    }

    #[test]
    fn test_item_name_bounds() {
        assert!(ItemName::parse("x").is_ok());
        assert!(ItemName::parse(&"x".repeat(200)).is_ok());
        assert!(ItemName::parse(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_error_message_names_field() {
        let err = ItemName::parse("").unwrap_err();
        assert_eq!(err.to_string(), "Item name is required");
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Username>("\"x\"").is_err());
        let name: Username = serde_json::from_str("\"abacus\"").unwrap();
        assert_eq!(name.as_str(), "abacus");
    }
}
