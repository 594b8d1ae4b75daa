// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{backend::Backend, error::Result, preference::RememberPreference, storage::Storage};

use super::{failed, Context};

/// Sign out and forget the stored session.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        context.gate.sign_out().await.map_err(failed("sign out"))?;
        println!("Signed out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::fake::Fake,
        command::{tests::signed_in, Command as _},
        error::Error,
        gate::GateState,
    };

    #[tokio::test]
    async fn sign_out_ends_the_session() -> Result<()> {
        let (fake, mut context) = signed_in(Fake::new()).await;

        Command {}.execute(&mut context).await?;

        assert_eq!(context.gate.state(), GateState::LoggedOut);
        assert!(fake.current_session().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_sign_out_still_signs_out_locally() {
        let (_, mut context) = signed_in(Fake::new().with_failing_sign_out()).await;

        let result = Command {}.execute(&mut context).await;

        assert!(matches!(result, Err(Error::Command)));
        assert_eq!(context.gate.state(), GateState::LoggedOut);
    }
}
