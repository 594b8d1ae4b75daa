// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::error;

/// Whether a session should survive past the process that created it.
///
/// Persisted on its own, independently of the session, as the string `"true"`
/// or `"false"`. An absent preference is treated the same as `"true"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct RememberPreference(bool);

impl RememberPreference {
    pub(crate) const fn new(remember: bool) -> Self {
        Self(remember)
    }

    /// Whether a session found at startup must be discarded.
    pub(crate) const fn forces_sign_out(preference: Option<Self>) -> bool {
        matches!(preference, Some(Self(false)))
    }
}

impl From<RememberPreference> for String {
    fn from(value: RememberPreference) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for RememberPreference {
    type Error = error::Conversion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "true" => Ok(Self(true)),
            "false" => Ok(Self(false)),
            _ => Err(error::Conversion::Preference(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_test::{assert_de_tokens_error, assert_tokens, Token};

    use super::*;

    #[test]
    fn stored_as_string() {
        assert_tokens(&RememberPreference::new(true), &[Token::Str("true")]);
        assert_tokens(&RememberPreference::new(false), &[Token::Str("false")]);
    }

    #[test]
    fn rejects_other_strings() {
        assert_de_tokens_error::<RememberPreference>(
            &[Token::Str("yes")],
            r#"stored preference "yes" is neither "true" nor "false""#,
        );
    }

    #[test]
    fn only_explicit_false_forces_sign_out() {
        assert!(!RememberPreference::forces_sign_out(None));
        assert!(!RememberPreference::forces_sign_out(Some(
            RememberPreference::new(true)
        )));
        assert!(RememberPreference::forces_sign_out(Some(
            RememberPreference::new(false)
        )));
    }
}
