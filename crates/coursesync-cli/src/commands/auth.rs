use clap::Subcommand;
use coursesync_core::credentials::{clear_token, load_token, store_token};
use coursesync_core::CredentialError;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store an LMS access token in the OS keyring
    Login {
        /// Access token generated in the LMS account settings
        #[arg(long)]
        token: String,
    },
    /// Remove the stored token
    Logout,
    /// Check whether a token is stored
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Login { token } => {
            store_token(&token)?;
            println!("token stored");
        }
        AuthAction::Logout => {
            clear_token()?;
            println!("token removed");
        }
        AuthAction::Status => match load_token() {
            Ok(_) => println!("authenticated"),
            Err(CredentialError::NotConfigured) => println!("not authenticated"),
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}
