use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A validated, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Create and validate an email address.
    ///
    /// Surrounding whitespace is removed and the address is lowercased so that
    /// "Foo@Bar.com" and "foo@bar.com" refer to the same account.
    ///
    /// # Errors
    ///
    /// This function will return an error if `raw_email` is not a valid email address.
    pub fn new(raw_email: &str) -> Result<Self, Error> {
        let email = raw_email.trim().to_lowercase();

        let is_valid = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !email.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if is_valid {
            Ok(Self(email))
        } else {
            Err(Error::InvalidEmail(raw_email.to_owned()))
        }
    }

    /// Create a new `Email` without any validation.
    ///
    /// The caller should ensure that `raw_email` is a correctly formatted email address,
    /// e.g. because it was read back from the database.
    pub fn new_unchecked(raw_email: &str) -> Self {
        Self(raw_email.to_owned())
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
