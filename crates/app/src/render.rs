use pdf_chat_core::{ProcessReport, RetrievedChunk, Speaker, TextChunk, Turn};

const INDENT: &str = "      ";

fn label(speaker: Speaker) -> &'static str {
    match speaker {
        Speaker::User => "[You]",
        Speaker::Assistant => "[Bot]",
    }
}

/// One message bubble. Who is speaking follows the position in the history.
pub fn bubble(position: usize, turn: &Turn) -> String {
    let mut lines = turn.message.lines();
    let first = lines.next().unwrap_or_default();
    let mut rendered = format!(
        "{} {} {}",
        turn.at.format("%H:%M:%S"),
        label(Speaker::at(position)),
        first
    );
    for line in lines {
        rendered.push('\n');
        rendered.push_str(INDENT);
        rendered.push_str(line);
    }
    rendered
}

pub fn transcript(history: &[Turn]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(position, turn)| bubble(position, turn))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn process_summary(report: &ProcessReport) -> String {
    format!(
        "PDFs processed successfully: {} document(s), {} characters, {} chunk(s) indexed with {}.",
        report.documents, report.characters, report.chunks, report.model
    )
}

pub fn sources(sources: &[RetrievedChunk]) -> String {
    if sources.is_empty() {
        return "no sources yet".to_string();
    }
    sources
        .iter()
        .map(|source| {
            format!(
                "#{} score={:.4} {}",
                source.chunk.chunk_index,
                source.score,
                preview(&source.chunk.text, 80)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn chunk_line(chunk: &TextChunk) -> String {
    format!(
        "#{} chars={} id={} {}",
        chunk.chunk_index,
        chunk.text.chars().count(),
        &chunk.chunk_id[..12.min(chunk.chunk_id.len())],
        preview(&chunk.text, 60)
    )
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}
