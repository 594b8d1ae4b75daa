// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::{error, warn};

use crate::{
    backend::Backend,
    error::{Error, Password, Result},
    password::RequestBuilder,
    preference::RememberPreference,
    storage::Storage,
};

use super::Context;

const MAX_ATTEMPTS: usize = 3;

/// Sign in with your email address and password.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    email: String,

    /// Do not keep the session once this command finishes.
    #[arg(long)]
    no_remember: bool,
}

/// Asks for a password and signs in, asking again while the backend rejects
/// the credentials.
pub(crate) async fn sign_in<B: Backend, S: Storage<RememberPreference>>(
    context: &mut Context<B, S>,
    email: &str,
    remember: bool,
) -> Result<String> {
    let mut request = RequestBuilder::new(email);
    for _ in 0..MAX_ATTEMPTS {
        let Some(password) = context.prompt.prompt(request.into_request()).await? else {
            return Err(Password::NoPrompt.into());
        };

        match context.gate.sign_in(email, &password, remember).await {
            Err(Error::AuthRejected(message)) => {
                warn!("Sign-in rejected: {}", message);
                request = RequestBuilder::new(email).with_error(&message);
            }
            result => return result,
        }
    }

    error!("Could not sign in after {} attempts", MAX_ATTEMPTS);
    Err(Error::Command)
}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let email = sign_in(context, &self.email, !self.no_remember).await?;
        println!("Signed in as {email}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        allow_list::AllowList,
        backend::fake::Fake,
        gate::{AccessGate, Denial, GateState},
        password::tests::Scripted,
        storage::Memory,
    };

    type Shown = Arc<Mutex<Vec<Option<String>>>>;

    async fn context(
        answers: &[Option<&'static str>],
    ) -> (Context<Fake, Memory<RememberPreference>>, Shown) {
        let fake = Arc::new(
            Fake::new()
                .with_account("a@allowed.com", "hunter2")
                .with_account("b@elsewhere.com", "hunter2"),
        );
        let allow_list: AllowList = ["a@allowed.com"].into_iter().collect();
        let gate = AccessGate::new(Arc::clone(&fake), allow_list, Memory::new());
        let prompt = Scripted::new(answers);
        let shown = Arc::clone(&prompt.errors);
        let mut context = Context::new(gate, Some(fake), Box::new(prompt));
        let _ = context.gate.initialize().await;
        (context, shown)
    }

    #[tokio::test]
    async fn rejected_password_is_asked_for_again() -> Result<()> {
        let (mut context, shown) = context(&[Some("wrong"), Some("hunter2")]).await;

        let email = sign_in(&mut context, "a@allowed.com", true).await?;

        assert_eq!(email, "a@allowed.com");
        assert_eq!(
            *shown.lock().expect("shown"),
            vec![None, Some("Invalid login credentials".to_owned())]
        );
        assert_eq!(
            context.gate.state(),
            GateState::Authenticated("a@allowed.com".to_owned())
        );
        Ok(())
    }

    #[tokio::test]
    async fn attempts_are_limited() {
        let (mut context, _) = context(&[Some("wrong"), Some("wrong"), Some("wrong")]).await;

        let result = sign_in(&mut context, "a@allowed.com", true).await;

        assert!(matches!(result, Err(Error::Command)));
        assert_eq!(context.gate.state(), GateState::LoggedOut);
    }

    #[tokio::test]
    async fn no_answer_stops_asking() {
        let (mut context, _) = context(&[None]).await;

        let result = sign_in(&mut context, "a@allowed.com", true).await;

        assert!(matches!(
            result,
            Err(Error::Password(Password::NoPrompt))
        ));
    }

    #[tokio::test]
    async fn address_off_the_list_is_denied() {
        let (mut context, _) = context(&[Some("hunter2")]).await;

        let result = sign_in(&mut context, "b@elsewhere.com", true).await;

        assert!(matches!(
            result,
            Err(Error::AccessDenied(Denial::InviteOnly))
        ));
        assert_eq!(
            context.gate.state(),
            GateState::Denied(Denial::InviteOnly)
        );
    }
}
