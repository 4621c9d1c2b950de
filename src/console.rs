//! Interactive buy session over any line-based reader/writer
//!
//! Pick a symbol, ask its price, request the purchase, then settle the
//! approval prompt with the human.

use crate::agent::{StockAgent, TurnOutcome};
use crate::catalog::{normalize_symbol, PriceCatalog};
use crate::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// How a console session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Finished { answer: String },
    InvalidSymbol(String),
    InvalidQuantity(String),
}

pub struct ConsoleSession<'a, R, W> {
    agent: &'a StockAgent,
    catalog: &'a dyn PriceCatalog,
    thread_id: &'a str,
    reader: R,
    writer: W,
}

impl<'a, R, W> ConsoleSession<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        agent: &'a StockAgent,
        catalog: &'a dyn PriceCatalog,
        thread_id: &'a str,
        reader: R,
        writer: W,
    ) -> Self {
        Self {
            agent,
            catalog,
            thread_id,
            reader,
            writer,
        }
    }

    pub async fn run(&mut self) -> Result<SessionEnd> {
        self.print_catalog().await?;

        let symbol = normalize_symbol(
            &self
                .prompt("\nPlease select a stock symbol (e.g., MSFT): ")
                .await?,
        );
        if !self.catalog.contains(&symbol) {
            self.say("❌ Invalid stock symbol. Exiting.").await?;
            return Ok(SessionEnd::InvalidSymbol(symbol));
        }

        let raw_quantity = self
            .prompt(&format!(
                "Enter quantity of {} stocks to check price for: ",
                symbol
            ))
            .await?;
        let quantity = match raw_quantity.trim().parse::<u64>() {
            Ok(q) if q > 0 => q,
            _ => {
                self.say("❌ Invalid quantity. Exiting.").await?;
                return Ok(SessionEnd::InvalidQuantity(raw_quantity));
            }
        };

        info!(symbol = %symbol, quantity, "Console: starting buy session");

        let question = format!("What is the current price of {} {} stocks?", quantity, symbol);
        let outcome = self.agent.invoke(self.thread_id, &question).await?;
        self.settle(outcome, "🤖 AI Response:").await?;

        let request = format!("Buy {} {} stocks at current price.", quantity, symbol);
        let outcome = self.agent.invoke(self.thread_id, &request).await?;
        let answer = self.settle(outcome, "✅ Final AI Response:").await?;

        Ok(SessionEnd::Finished { answer })
    }

    /// Answer approval prompts until the thread completes, print the answer
    async fn settle(&mut self, mut outcome: TurnOutcome, label: &str) -> Result<String> {
        loop {
            match outcome {
                TurnOutcome::Completed { answer } => {
                    self.say(&format!("\n{} {}", label, answer)).await?;
                    return Ok(answer);
                }
                TurnOutcome::Suspended { approval } => {
                    self.say(&format!("\n🛑 AI needs confirmation: {}", approval.prompt))
                        .await?;
                    let decision = self.prompt("Approve (yes/no): ").await?;
                    outcome = self.agent.resume(self.thread_id, &decision).await?;
                }
            }
        }
    }

    async fn print_catalog(&mut self) -> Result<()> {
        self.say("\n📈 Available stocks:").await?;
        for (symbol, price) in self.catalog.entries() {
            self.say(&format!(" - {} : ${}", symbol, price)).await?;
        }
        Ok(())
    }

    async fn say(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Print a prompt and read one line, line ending stripped
    async fn prompt(&mut self, text: &str) -> Result<String> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        self.reader.read_line(&mut line).await?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
