//! Terminal prompts for credentials not given on the command line.

use std::io::{self, Write};

use anyhow::Result;
use netmon_core::auth::Prompt;

pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn username(&mut self) -> Result<String> {
        print!("Username: ");
        io::stdout().flush()?;

        let mut username = String::new();
        io::stdin().read_line(&mut username)?;
        Ok(username.trim().to_string())
    }

    fn password(&mut self, username: &str) -> Result<String> {
        let password = rpassword::prompt_password(format!("Password for {}: ", username))?;
        Ok(password)
    }
}
