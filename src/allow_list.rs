// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

/// The email addresses permitted to use the application, regardless of what
/// the backend will authenticate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Returns the normalized address if it is a member of the list.
    ///
    /// Membership is case-insensitive and ignores surrounding whitespace. A
    /// missing or blank address is never a member.
    pub(crate) fn admit(&self, email: Option<&str>) -> Option<String> {
        let normalized = email.map(normalize).filter(|email| !email.is_empty())?;
        self.0.contains(&normalized).then_some(normalized)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|email| normalize(email.as_ref()))
                .filter(|email| !email.is_empty())
                .collect(),
        )
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}
