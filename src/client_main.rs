//! Interactive terminal chat against a running quorum-backend server.

use std::env;
use std::io::{self, BufRead, Write};

use quorum_backend::client::{ChatClient, Conversation};

const SUGGESTED_PROMPTS: [&str; 3] = [
    "What is the purpose of the Elders Quorum?",
    "What is the purpose of the Aaronic Priesthood?",
    "What is the purpose of the Melchizedek Priesthood?",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url =
        env::var("QUORUM_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let client = ChatClient::new(base_url);
    let mut conversation = Conversation::new();

    println!("Ask me something about the handbook. Type 'exit' to quit.");
    println!("Some ideas:");
    for prompt in SUGGESTED_PROMPTS {
        println!("  - {}", prompt);
    }
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        conversation.push_user(question);
        match client.send(&mut conversation).await {
            Ok(answer) => println!("{}\n", answer),
            Err(err) => eprintln!("{}\n", err),
        }
    }

    Ok(())
}
