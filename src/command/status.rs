// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use tokio::signal;

use crate::{backend::Backend, error::Result, preference::RememberPreference, storage::Storage};

use super::Context;

/// Show whether you are signed in.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// Keep running and report every change until interrupted.
    #[arg(long, short)]
    follow: bool,
}

#[async_trait(?Send)]
impl super::Command for Command {
    async fn execute<B: Backend, S: Storage<RememberPreference>>(
        self,
        context: &mut Context<B, S>,
    ) -> Result<()> {
        let mut shown = context.gate.process_pending().await;
        println!("{shown}");
        if !self.follow {
            return Ok(());
        }

        let mut states = context.gate.watch();
        let gate = &mut context.gate;
        let interrupted = signal::ctrl_c();
        tokio::pin!(interrupted);
        loop {
            tokio::select! {
                change = gate.receive() => {
                    let Some(change) = change else {
                        break;
                    };
                    let _ = gate.apply(&change).await;
                    let state = states.borrow_and_update().clone();
                    if state != shown {
                        println!("{state}");
                        shown = state;
                    }
                }
                result = &mut interrupted => {
                    result?;
                    break;
                }
            }
        }
        Ok(())
    }
}
