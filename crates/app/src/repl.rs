use crate::render;
use pdf_chat_core::{
    digest_document, load_documents, ChatSession, ModelChoice, PdfDocument, SessionError,
};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const HELP: &str = "\
Type a question to ask about the processed PDFs.
  /process [PATH ...]   rebuild the index (optionally from new files)
  /model openai|huggingface
                        choose the model used by the next /process
  /clear                clear the chat and forget the index
  /history              show the conversation so far
  /sources              show the chunks behind the last answer
  /files                list the uploaded files
  /help                 show this help
  /quit                 leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Question(String),
    Process(Vec<PathBuf>),
    Model(ModelChoice),
    Clear,
    History,
    Sources,
    Files,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line.to_string());
    };

    let mut words = command.split_whitespace();
    match words.next().unwrap_or_default() {
        "process" => Input::Process(words.map(PathBuf::from).collect()),
        "model" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("openai") => Input::Model(ModelChoice::OpenAi),
            Some("huggingface") | Some("hf") => Input::Model(ModelChoice::HuggingFace),
            _ => Input::Unknown(line.to_string()),
        },
        "clear" => Input::Clear,
        "history" => Input::History,
        "sources" => Input::Sources,
        "files" => Input::Files,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

/// Interactive chat over one session, mirroring the upload / process / ask / clear page.
pub struct ChatLoop {
    session: ChatSession,
    documents: Vec<PdfDocument>,
    model: ModelChoice,
}

impl ChatLoop {
    pub fn new(session: ChatSession, documents: Vec<PdfDocument>, model: ModelChoice) -> Self {
        Self {
            session,
            documents,
            model,
        }
    }

    pub async fn process(&mut self) {
        if self.documents.is_empty() {
            println!("Upload PDFs first: /process PATH ...");
            return;
        }

        println!("Processing PDFs...");
        match self.session.process(&self.documents, self.model).await {
            Ok(report) => println!("{}", render::process_summary(&report)),
            Err(error) => report_error(&error),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        println!("Chat with your PDFs. /help lists commands.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match parse_input(&line) {
                Input::Empty => {}
                Input::Question(question) => match self.session.ask(&question).await {
                    Ok(history) => println!("{}", render::transcript(history)),
                    Err(error) => report_error(&error),
                },
                Input::Process(paths) => {
                    if !paths.is_empty() {
                        match load_documents(&paths).await {
                            Ok(documents) => self.documents = documents,
                            Err(error) => {
                                println!("error: {error}");
                                continue;
                            }
                        }
                    }
                    self.process().await;
                }
                Input::Model(choice) => {
                    self.model = choice;
                    if self.session.model() == Some(choice) {
                        println!("Model: {choice}");
                    } else {
                        println!("Model set to {choice}; run /process to rebuild the index with it.");
                    }
                }
                Input::Clear => {
                    self.session.clear();
                    println!("Chat cleared. Run /process to start again.");
                }
                Input::History => {
                    let history = self.session.history();
                    if history.is_empty() {
                        println!("no messages yet");
                    } else {
                        println!("{}", render::transcript(history));
                    }
                }
                Input::Sources => println!("{}", render::sources(self.session.sources())),
                Input::Files => {
                    if self.documents.is_empty() {
                        println!("no files uploaded");
                    }
                    for document in &self.documents {
                        println!(
                            "{} ({} bytes, sha256 {})",
                            document.name,
                            document.bytes.len(),
                            &digest_document(document)[..16]
                        );
                    }
                }
                Input::Help => println!("{HELP}"),
                Input::Quit => break,
                Input::Unknown(input) => println!("unknown command: {input} (try /help)"),
            }
        }

        Ok(())
    }
}

fn report_error(error: &SessionError) {
    warn!(%error, "action failed");
    match error {
        SessionError::InvalidState(_) => {
            println!("Process some PDFs before asking questions (/process).")
        }
        SessionError::EmptyQuestion => {}
        other => println!("error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_input("  What is covered?  "),
            Input::Question("What is covered?".to_string())
        );
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn process_takes_optional_paths() {
        assert_eq!(parse_input("/process"), Input::Process(Vec::new()));
        assert_eq!(
            parse_input("/process a.pdf b.pdf"),
            Input::Process(vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")])
        );
    }

    #[test]
    fn model_names_are_case_insensitive() {
        assert_eq!(parse_input("/model OpenAI"), Input::Model(ModelChoice::OpenAi));
        assert_eq!(parse_input("/model hf"), Input::Model(ModelChoice::HuggingFace));
        assert!(matches!(parse_input("/model gpt"), Input::Unknown(_)));
    }

    #[test]
    fn session_commands_are_recognised() {
        assert_eq!(parse_input("/clear"), Input::Clear);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/sources"), Input::Sources);
        assert!(matches!(parse_input("/bogus"), Input::Unknown(_)));
    }
}
