use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "review-crawler")]
#[command(about = "Crawl catalog products and reviews into MongoDB and translate review text")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Crawl the product listing and record prices
    Products,
    /// Crawl reviews for every stored product
    Reviews,
    /// Translate stored reviews that are still untranslated
    Translate {
        /// Maximum number of reviews to translate
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },
    /// Products, then reviews (default)
    Run,
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
