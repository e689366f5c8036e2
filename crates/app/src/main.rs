mod render;
mod repl;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_chat_core::config::{
    HUGGINGFACE_BASE_URL, HUGGINGFACE_LLM_REPO, INSTRUCT_EMBEDDING_MODEL, OPENAI_BASE_URL,
    OPENAI_CHAT_MODEL, OPENAI_EMBEDDING_MODEL,
};
use pdf_chat_core::{
    build_chunks, discover_pdf_files, extract_text, load_documents, ChatSession, LopdfExtractor,
    ModelChoice, PdfDocument, ProviderSettings,
};
use repl::ChatLoop;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version, about = "Chat with your PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    providers: ProviderArgs,
}

#[derive(Args)]
struct ProviderArgs {
    /// OpenAI API key (required for the openai model)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL, global = true)]
    openai_base_url: String,

    /// Chat model used to answer questions
    #[arg(long, env = "OPENAI_CHAT_MODEL", default_value = OPENAI_CHAT_MODEL, global = true)]
    openai_chat_model: String,

    /// Embedding model used to index chunks
    #[arg(long, env = "OPENAI_EMBEDDING_MODEL", default_value = OPENAI_EMBEDDING_MODEL, global = true)]
    openai_embedding_model: String,

    /// HuggingFace token; self-hosted endpoints may not need one
    #[arg(long, env = "HUGGINGFACEHUB_API_TOKEN", hide_env_values = true, global = true)]
    huggingface_api_token: Option<String>,

    /// HuggingFace inference base URL (point at a self-hosted server to run locally)
    #[arg(long, env = "HUGGINGFACE_BASE_URL", default_value = HUGGINGFACE_BASE_URL, global = true)]
    huggingface_base_url: String,

    /// Instruction-tuned embedding model
    #[arg(long, env = "INSTRUCT_EMBEDDING_MODEL", default_value = INSTRUCT_EMBEDDING_MODEL, global = true)]
    instruct_embedding_model: String,

    /// Hosted text generation model
    #[arg(long, env = "HUGGINGFACE_LLM_REPO", default_value = HUGGINGFACE_LLM_REPO, global = true)]
    huggingface_llm_repo: String,

    /// Number of chunks retrieved per question
    #[arg(long, default_value = "4", global = true)]
    top_k: usize,

    /// Timeout for each provider request, in seconds
    #[arg(long, default_value = "120", global = true)]
    timeout_secs: u64,
}

impl ProviderArgs {
    fn settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings {
            top_k: self.top_k,
            request_timeout: Duration::from_secs(self.timeout_secs),
            ..ProviderSettings::default()
        };

        settings.openai.api_key = self.openai_api_key.clone();
        settings.openai.base_url = self.openai_base_url.clone();
        settings.openai.chat_model = self.openai_chat_model.clone();
        settings.openai.embedding_model = self.openai_embedding_model.clone();

        settings.huggingface.api_token = self.huggingface_api_token.clone();
        settings.huggingface.base_url = self.huggingface_base_url.clone();
        settings.huggingface.embedding_model = self.instruct_embedding_model.clone();
        settings.huggingface.llm_repo = self.huggingface_llm_repo.clone();

        settings
    }
}

#[derive(Args)]
struct DocumentArgs {
    /// PDF file to upload; repeat for several files, processed in the given order
    #[arg(long = "pdf", value_name = "PATH")]
    pdfs: Vec<PathBuf>,

    /// Folder searched recursively for PDFs, added after any --pdf files
    #[arg(long)]
    folder: Option<PathBuf>,
}

impl DocumentArgs {
    fn paths(&self) -> Vec<PathBuf> {
        let mut paths = self.pdfs.clone();
        if let Some(folder) = &self.folder {
            paths.extend(discover_pdf_files(folder));
        }
        paths
    }

    async fn load(&self) -> anyhow::Result<Vec<PdfDocument>> {
        let documents = load_documents(&self.paths()).await?;
        for document in &documents {
            info!(document = %document.name, bytes = document.bytes.len(), "uploaded");
        }
        Ok(documents)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "huggingface")]
    HuggingFace,
}

impl From<ModelArg> for ModelChoice {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::OpenAi => ModelChoice::OpenAi,
            ModelArg::HuggingFace => ModelChoice::HuggingFace,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Process PDFs and start an interactive chat.
    Chat {
        #[command(flatten)]
        documents: DocumentArgs,
        /// Model family for embeddings and answers.
        #[arg(long, value_enum, default_value = "openai")]
        model: ModelArg,
    },
    /// Process PDFs, ask one or more questions in order, and print the conversation.
    Ask {
        #[command(flatten)]
        documents: DocumentArgs,
        #[arg(long, value_enum, default_value = "openai")]
        model: ModelArg,
        /// Question to ask; repeat to ask follow-ups.
        #[arg(long = "question", required = true)]
        questions: Vec<String>,
        /// Print the chunks behind the final answer.
        #[arg(long, default_value_t = false)]
        show_sources: bool,
    },
    /// Extract and chunk PDFs without calling any provider.
    Chunks {
        #[command(flatten)]
        documents: DocumentArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = cli.providers.settings();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match cli.command {
        Command::Chat { documents, model } => {
            let documents = documents.load().await?;
            let mut chat = ChatLoop::new(ChatSession::new(settings), documents, model.into());
            chat.process().await;
            chat.run().await?;
        }
        Command::Ask {
            documents,
            model,
            questions,
            show_sources,
        } => {
            let documents = documents.load().await?;
            let mut session = ChatSession::new(settings);

            let report = session.process(&documents, model.into()).await?;
            println!("{}", render::process_summary(&report));

            for question in &questions {
                session.ask(question).await?;
            }
            println!("{}", render::transcript(session.history()));

            if show_sources {
                println!("sources:\n{}", render::sources(session.sources()));
            }
        }
        Command::Chunks { documents } => {
            let documents = documents.load().await?;
            let text = extract_text(&documents, &LopdfExtractor)?;
            let chunks = build_chunks(&text, &settings.chunking)?;

            println!(
                "{} document(s), {} characters, {} chunk(s)",
                documents.len(),
                text.chars().count(),
                chunks.len()
            );
            for chunk in &chunks {
                println!("{}", render::chunk_line(chunk));
            }
        }
    }

    Ok(())
}
