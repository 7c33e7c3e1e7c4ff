use super::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Token issuing and verification service")]
pub struct Cli {
    /// Settings file, without or with its `.toml` extension.
    #[arg(long)]
    pub settings: Option<String>,
}
