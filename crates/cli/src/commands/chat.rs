//! Chat command handler.
//!
//! Sends one message, or runs an interactive loop on stdin when no message
//! is given. History lives in the workspace database, so a session can be
//! resumed across invocations.

use super::print_json;
use clap::Args;
use insight_agent::{ChatReply, InsightService};
use insight_core::{config::AppConfig, AppError, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ask the agent about stored conversations
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Session identifier
    #[arg(short, long, default_value = "default")]
    pub session: String,

    /// Message to send (starts an interactive session when omitted)
    pub message: Option<String>,

    /// Clear the session's history first
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command for session '{}'", self.session);

        let service = InsightService::from_config(config).await?;

        if self.reset {
            service.reset_session(&self.session).await?;
            if !self.json {
                println!("Session '{}' cleared", self.session);
            }
        }

        match &self.message {
            Some(message) => {
                let reply = service.chat(&self.session, message).await?;
                self.print_reply(&reply)
            }
            None if self.reset => Ok(()),
            None => self.interactive(&service).await,
        }
    }

    async fn interactive(&self, service: &InsightService) -> AppResult<()> {
        println!("Session '{}'. Type /reset to clear history, /exit to quit.", self.session);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            match line {
                "" => continue,
                "/exit" | "/quit" => break,
                "/reset" => {
                    service.reset_session(&self.session).await?;
                    println!("History cleared.");
                }
                message => match service.chat(&self.session, message).await {
                    Ok(reply) => self.print_reply(&reply)?,
                    // the session is unchanged; let the user try again
                    Err(e @ AppError::AgentUnavailable(_)) => eprintln!("{}", e),
                    Err(e) => return Err(e),
                },
            }
        }
        Ok(())
    }

    fn print_reply(&self, reply: &ChatReply) -> AppResult<()> {
        if self.json {
            return print_json(reply);
        }
        println!("{}", reply.answer);
        if reply.forced || reply.degraded {
            tracing::warn!(
                forced = reply.forced,
                degraded = reply.degraded,
                "Answer may be incomplete"
            );
        }
        Ok(())
    }
}
