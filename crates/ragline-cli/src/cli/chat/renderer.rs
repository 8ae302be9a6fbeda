//! Terminal rendering for chat output.
//!
//! `ChatRenderer` writes to any `io::Write`. In the interactive loop that is
//! the readline `SharedWriter`, so output lands above the prompt instead of
//! through it. Streaming fragments are written raw as they arrive; the
//! committed message then closes the line and adds a cache footer when the
//! answer came from the backend cache.

use std::io::Write;

use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use ragline_types::chat::{Message, MessageContent, MessageRole};
use ragline_types::notification::{Notification, Severity};
use ragline_types::retrieval::DocumentChunk;

const SNIPPET_CHARS: usize = 80;

pub struct ChatRenderer<W: Write> {
    out: W,
    /// Text written for the in-progress answer, if any.
    streamed: Option<String>,
}

impl<W: Write> ChatRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streamed: None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streamed.is_some()
    }

    /// Print a stored conversation, one block per message.
    pub fn transcript(&mut self, messages: &[Message]) {
        let _ = writeln!(self.out);
        for message in messages {
            let _ = writeln!(self.out, "  {} {}", role_label(message), message_body(message));
            if let Some(footer) = cache_footer(message) {
                let _ = writeln!(self.out, "  {}", style(footer).dim());
            }
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    /// Append one generation fragment, opening the answer line on the first.
    pub fn fragment(&mut self, fragment: &str) {
        if self.streamed.is_none() {
            let _ = write!(self.out, "\n  {} ", style("Assistant >").cyan().bold());
            self.streamed = Some(String::new());
        }
        if let Some(streamed) = self.streamed.as_mut() {
            streamed.push_str(fragment);
        }
        let _ = write!(self.out, "{fragment}");
        let _ = self.out.flush();
    }

    /// Close the answer line for a committed system message.
    ///
    /// If the server's final text differs from what was streamed, the final
    /// text is printed again so the screen matches the stored conversation.
    pub fn committed(&mut self, message: &Message) {
        let text = message_body(message);
        match self.streamed.take() {
            Some(streamed) => {
                let _ = writeln!(self.out);
                if streamed != text {
                    let _ = writeln!(self.out, "  {} {}", style("(final)").dim(), text);
                }
            }
            None => {
                let _ = writeln!(self.out, "\n  {} {}", style("Assistant >").cyan().bold(), text);
            }
        }
        if let Some(footer) = cache_footer(message) {
            let _ = writeln!(self.out, "  {}", style(footer).dim());
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    /// End an answer line that will never be committed.
    pub fn abandon_stream(&mut self) {
        if self.streamed.take().is_some() {
            let _ = writeln!(self.out, " {}", style("[interrupted]").dim());
            let _ = self.out.flush();
        }
    }

    pub fn notice(&mut self, notification: &Notification) {
        self.break_stream_line();
        let _ = writeln!(self.out, "  {}", notice_line(notification));
        let _ = self.out.flush();
    }

    /// A dim one-line status message.
    pub fn status(&mut self, text: &str) {
        self.break_stream_line();
        let _ = writeln!(self.out, "  {}", style(text).dim());
        let _ = self.out.flush();
    }

    pub fn sources(&mut self, chunks: &[DocumentChunk], took: f64) {
        if chunks.is_empty() {
            self.status("No sources for the last answer.");
            return;
        }
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "{}", sources_table(chunks));
        let _ = writeln!(
            self.out,
            "  {}",
            style(format!("{} chunk(s) retrieved in {took:.2}s", chunks.len())).dim()
        );
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    pub fn suggestions(&mut self, suggestions: &[String]) {
        if suggestions.is_empty() {
            self.status("No suggestions.");
            return;
        }
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "  {}", style("Suggestions:").bold());
        for (i, suggestion) in suggestions.iter().enumerate() {
            let _ = writeln!(self.out, "  {} {}", style(format!("{}.", i + 1)).dim(), suggestion);
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }

    /// Write free-form text as-is.
    pub fn raw(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    // A notice arriving mid-answer starts on its own line; the answer
    // continues on the next fragment.
    fn break_stream_line(&mut self) {
        if self.streamed.is_some() {
            let _ = writeln!(self.out);
        }
    }
}

pub fn role_label(message: &Message) -> String {
    match message.role {
        MessageRole::User => format!("{}", style("You >").green().bold()),
        MessageRole::System => format!("{}", style("Assistant >").cyan().bold()),
    }
}

/// Text of a message; document references are summarized.
pub fn message_body(message: &Message) -> String {
    match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Chunks(chunks) => format!("[{} document reference(s)]", chunks.len()),
    }
}

/// "cached answer (distance 0.07)" for cache hits, `None` otherwise.
pub fn cache_footer(message: &Message) -> Option<String> {
    if !message.cached {
        return None;
    }
    Some(match &message.distance {
        Some(distance) => format!("| cached answer (distance {distance})"),
        None => "| cached answer".to_string(),
    })
}

pub fn notice_line(notification: &Notification) -> String {
    match notification.severity {
        Severity::Good => format!("{} {}", style("*").green().bold(), notification.text),
        Severity::Bad => format!("{} {}", style("!").red().bold(), style(&notification.text).red()),
    }
}

pub fn sources_table(chunks: &[DocumentChunk]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("DOCUMENT").fg(Color::Cyan),
            Cell::new("CHUNK").fg(Color::Cyan),
            Cell::new("SCORE").fg(Color::Cyan),
            Cell::new("EXCERPT").fg(Color::Cyan),
        ]);

    for (i, chunk) in chunks.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&chunk.doc_name),
            Cell::new(&chunk.chunk_id),
            Cell::new(format!("{:.3}", chunk.score)),
            Cell::new(snippet(&chunk.text, SNIPPET_CHARS)),
        ]);
    }
    table
}

/// First `max` characters of `text` on one line, with an ellipsis if cut.
pub fn snippet(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn output(renderer: ChatRenderer<Vec<u8>>) -> String {
        console::set_colors_enabled(false);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn chunk(name: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            doc_name: name.to_string(),
            doc_uuid: "u1".to_string(),
            chunk_id: "4".to_string(),
            score: 0.8231,
            text: text.to_string(),
        }
    }

    #[test]
    fn streamed_answer_matching_final_is_not_repeated() {
        console::set_colors_enabled(false);
        let mut r = ChatRenderer::new(Vec::new());
        r.fragment("A vector");
        r.fragment(" database.");
        assert!(r.is_streaming());
        r.committed(&Message::generated("A vector database.", false, None));
        assert!(!r.is_streaming());

        let out = output(r);
        assert!(out.contains("Assistant > A vector database."));
        assert!(!out.contains("(final)"));
        assert!(!out.contains("cached"));
    }

    #[test]
    fn authoritative_text_is_shown_when_it_differs() {
        console::set_colors_enabled(false);
        let mut r = ChatRenderer::new(Vec::new());
        r.fragment("A vector datab");
        r.committed(&Message::generated("A vector database.", true, Some("0.07".into())));

        let out = output(r);
        assert!(out.contains("(final) A vector database."));
        assert!(out.contains("cached answer (distance 0.07)"));
    }

    #[test]
    fn commit_without_fragments_prints_whole_answer() {
        console::set_colors_enabled(false);
        let mut r = ChatRenderer::new(Vec::new());
        r.committed(&Message::generated("From cache.", true, None));
        let out = output(r);
        assert!(out.contains("Assistant > From cache."));
        assert!(out.contains("| cached answer"));
    }

    #[test]
    fn abandoned_stream_is_marked() {
        console::set_colors_enabled(false);
        let mut r = ChatRenderer::new(Vec::new());
        r.abandon_stream();
        r.fragment("partial");
        r.abandon_stream();
        let out = output(r);
        assert_eq!(out.matches("[interrupted]").count(), 1);
    }

    #[test]
    fn notice_lines_carry_severity_marker() {
        console::set_colors_enabled(false);
        let good = Notification::new("Connected to the generation service", Severity::Good, Utc::now());
        let bad = Notification::new("Retrieval failed", Severity::Bad, Utc::now());
        assert_eq!(notice_line(&good), "* Connected to the generation service");
        assert_eq!(notice_line(&bad), "! Retrieval failed");
    }

    #[test]
    fn transcript_summarizes_evidence_messages() {
        console::set_colors_enabled(false);
        let mut r = ChatRenderer::new(Vec::new());
        r.transcript(&[
            Message::system("Welcome!"),
            Message::user("what is rag"),
            Message::evidence(vec![chunk("a.md", "x"), chunk("b.md", "y")]),
        ]);
        let out = output(r);
        assert!(out.contains("Assistant > Welcome!"));
        assert!(out.contains("You > what is rag"));
        assert!(out.contains("[2 document reference(s)]"));
    }

    #[test]
    fn sources_table_lists_every_chunk() {
        let table = sources_table(&[chunk("intro.md", "Vectors are stored"), chunk("faq.md", "Cache hits")]);
        let rendered = table.to_string();
        assert!(rendered.contains("intro.md"));
        assert!(rendered.contains("faq.md"));
        assert!(rendered.contains("0.823"));
    }

    #[test]
    fn snippet_flattens_and_truncates() {
        assert_eq!(snippet("one\ntwo   three", 80), "one two three");
        let long = "x".repeat(100);
        let cut = snippet(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }
}
