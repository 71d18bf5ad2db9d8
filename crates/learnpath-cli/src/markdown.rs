//! Task notes are markdown; the terminal gets plain text.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Render markdown `notes` as indented plain text for a terminal.
pub fn render_notes(notes: &str) -> String {
    let mut renderer = Renderer::default();
    let options = Options::ENABLE_TASKLISTS | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(notes, options) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    out: String,
    /// One entry per open list: `Some(next number)` for ordered lists.
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    heading_start: usize,
    in_code_block: bool,
}

impl Renderer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_lines(&text);
                } else {
                    self.out.push_str(&text);
                }
            }
            Event::Code(code) => {
                self.out.push('`');
                self.out.push_str(&code);
                self.out.push('`');
            }
            Event::Html(html) | Event::InlineHtml(html) => self.out.push_str(&html),
            Event::SoftBreak => self.out.push(' '),
            Event::HardBreak => self.out.push('\n'),
            Event::Rule => {
                self.block_start();
                self.out.push_str("---\n");
            }
            Event::TaskListMarker(checked) => {
                self.out.push_str(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.block_start(),
            Tag::Heading { .. } => {
                self.block_start();
                self.heading_start = self.out.len();
            }
            Tag::CodeBlock(_) => {
                self.block_start();
                self.in_code_block = true;
            }
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.block_start();
                } else {
                    self.ensure_newline();
                }
                self.lists.push(first);
            }
            Tag::Item => {
                self.ensure_newline();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("- "),
                }
            }
            Tag::Link { dest_url, .. } => self.links.push(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Item => self.ensure_newline(),
            TagEnd::Heading(level) => {
                let width = self.out[self.heading_start..].chars().count();
                let underline = match level {
                    HeadingLevel::H1 => Some('='),
                    HeadingLevel::H2 => Some('-'),
                    _ => None,
                };
                if let Some(ch) = underline {
                    self.out.push('\n');
                    self.out.extend(std::iter::repeat_n(ch, width));
                }
                self.ensure_newline();
            }
            TagEnd::CodeBlock => self.in_code_block = false,
            TagEnd::List(_) => {
                self.lists.pop();
                self.ensure_newline();
            }
            TagEnd::Link => {
                match self.links.pop() {
                    Some(url) if !self.out.ends_with(&url) => {
                        self.out.push_str(&format!(" ({url})"));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn code_lines(&mut self, text: &str) {
        let indent = "  ".repeat(self.lists.len());
        for line in text.lines() {
            self.out.push_str(&indent);
            self.out.push_str("    ");
            self.out.push_str(line);
            self.out.push('\n');
        }
    }

    fn ensure_newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    /// Separate top-level blocks by one blank line; list items stay tight.
    fn block_start(&mut self) {
        self.ensure_newline();
        if self.lists.is_empty() && !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}
