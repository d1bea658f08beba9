mod artifacts;
mod browser;
mod config;
mod fetch;
mod job;
mod pdftext;
mod resolver;
mod server;
mod table;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::table::PageSum;

#[derive(Parser)]
#[command(name = "quiz_solver", about = "Webhook-driven quiz PDF solver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve,
    /// Solve one quiz page and print the answer
    Solve {
        /// Quiz page URL
        url: String,
        /// Actually POST the answer to the discovered submission URL
        #[arg(long)]
        submit: bool,
        /// Email for the submission payload
        #[arg(long, default_value = "dev@localhost")]
        email: String,
        /// Secret for the submission payload
        #[arg(long, default_value = "")]
        secret: String,
    },
    /// Sum the value column of one page of a local PDF
    Sum {
        /// Path to the PDF file
        file: PathBuf,
        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = Arc::new(config::Config::from_env());
            server::serve(config).await
        }
        Commands::Solve {
            url,
            submit,
            email,
            secret,
        } => {
            let config = config::Config::from_env();
            let request = job::QuizRequest { email, secret, url };
            let report = job::solve(&config, &request, !submit).await?;
            match &report.answer {
                Some(answer) => println!("Answer: {}", answer),
                None => println!("No document resolved."),
            }
            match &report.submission_url {
                Some(u) if report.submitted => println!("Submitted to {}", u),
                Some(u) => println!("Submission URL: {} (not posted)", u),
                None => println!("No submission URL found."),
            }
            Ok(())
        }
        Commands::Sum { file, page } => {
            let bytes = std::fs::read(&file)?;
            let text = pdftext::decode(&bytes)?;
            let page_text = pdftext::page(&text, page)
                .ok_or_else(|| anyhow::anyhow!("document has no page {}", page))?;
            match table::sum_value_column(page_text) {
                PageSum::Table(total) => println!("Value column sum: {}", total),
                PageSum::Fallback(total) => {
                    println!("No value column found; all-numbers fallback sum: {}", total)
                }
            }
            Ok(())
        }
    }
}
