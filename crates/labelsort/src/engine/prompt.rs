//! Similarity prompt templates.
//!
//! A template is text with `{placeholder}` fields drawn from a closed set;
//! `{{` and `}}` produce literal braces. Templates are parsed once when the
//! configuration is loaded so an unknown field never reaches a run.

use std::fmt::Write as _;

use super::model::{ExampleMessage, MessageFields};
use crate::error::ConfigError;

const EXAMPLE_SEPARATOR: &str = "-----------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    CategoryName,
    ExampleEmails,
    Sender,
    Subject,
    Date,
    Snippet,
    Body,
    MaxBodyLength,
}

impl Placeholder {
    pub const ALL: [Placeholder; 8] = [
        Placeholder::CategoryName,
        Placeholder::ExampleEmails,
        Placeholder::Sender,
        Placeholder::Subject,
        Placeholder::Date,
        Placeholder::Snippet,
        Placeholder::Body,
        Placeholder::MaxBodyLength,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::CategoryName => "category_name",
            Placeholder::ExampleEmails => "example_emails_formatted_text",
            Placeholder::Sender => "new_email_sender",
            Placeholder::Subject => "new_email_subject",
            Placeholder::Date => "new_email_date",
            Placeholder::Snippet => "new_email_snippet",
            Placeholder::Body => "new_email_body",
            Placeholder::MaxBodyLength => "max_body_length_for_llm",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Placeholder),
}

/// Values substituted into a template for one (candidate, category) pair.
#[derive(Debug, Clone, Copy)]
pub struct PromptFields<'a> {
    pub category_name: &'a str,
    pub examples: &'a [ExampleMessage],
    pub candidate: &'a MessageFields,
    pub max_body_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    text.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(invalid(format!("unclosed '{{' at offset {}", pos)));
                    }
                    let field = Placeholder::from_name(name.trim()).ok_or_else(|| {
                        invalid(format!(
                            "unknown placeholder '{{{}}}' (expected one of: {})",
                            name,
                            Placeholder::ALL.map(Placeholder::name).join(", ")
                        ))
                    })?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' => {
                    return Err(invalid(format!("unmatched '}}' at offset {}", pos)));
                }
                _ => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// Placeholders used by the template, in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(p) => Some(*p),
            Segment::Text(_) => None,
        })
    }

    pub fn render(&self, fields: &PromptFields<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field(p) => match p {
                    Placeholder::CategoryName => out.push_str(fields.category_name),
                    Placeholder::ExampleEmails => {
                        out.push_str(&format_examples(fields.examples, fields.max_body_length))
                    }
                    Placeholder::Sender => out.push_str(&fields.candidate.sender),
                    Placeholder::Subject => out.push_str(&fields.candidate.subject),
                    Placeholder::Date => out.push_str(&fields.candidate.received),
                    Placeholder::Snippet => out.push_str(&fields.candidate.snippet),
                    Placeholder::Body => out.push_str(&fields.candidate.body_excerpt),
                    Placeholder::MaxBodyLength => {
                        let _ = write!(out, "{}", fields.max_body_length);
                    }
                },
            }
        }
        out
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::InvalidTemplate { reason }
}

/// Renders examples as numbered blocks separated by a dashed rule.
pub fn format_examples(examples: &[ExampleMessage], max_body_length: usize) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(i, example)| {
            let f = &example.fields;
            format!(
                "Example {}:\n  Sender: {}\n  Subject: {}\n  Received Date: {}\n  Body Snippet: {}\n  Body (first {} chars): {}\n{}",
                i + 1,
                f.sender,
                f.subject,
                f.received,
                f.snippet,
                max_body_length,
                f.body_excerpt,
                EXAMPLE_SEPARATOR
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;

    fn fields(sender: &str, subject: &str) -> MessageFields {
        MessageFields {
            sender: sender.into(),
            subject: subject.into(),
            received: "2025-07-01 10:52:37 +0200".into(),
            snippet: "snip".into(),
            body_excerpt: "body".into(),
        }
    }

    #[test]
    fn test_default_template_parses() {
        let template = PromptTemplate::parse(DEFAULT_PROMPT_TEMPLATE).unwrap();
        let used: Vec<_> = template.placeholders().collect();
        for p in Placeholder::ALL {
            assert!(used.contains(&p), "default template misses {}", p.name());
        }
    }

    #[test]
    fn test_render_substitutes_every_field() {
        let template = PromptTemplate::parse(
            "[{category_name}] {new_email_sender}|{new_email_subject}|{new_email_date}|{new_email_snippet}|{new_email_body}|{max_body_length_for_llm}",
        )
        .unwrap();
        let candidate = fields("a@b.c", "Hi");
        let rendered = template.render(&PromptFields {
            category_name: "Newsletters",
            examples: &[],
            candidate: &candidate,
            max_body_length: 1000,
        });

        assert_eq!(
            rendered,
            "[Newsletters] a@b.c|Hi|2025-07-01 10:52:37 +0200|snip|body|1000"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::parse("{{\"answer\": \"{category_name}\"}}").unwrap();
        let candidate = fields("", "");
        let rendered = template.render(&PromptFields {
            category_name: "Bills",
            examples: &[],
            candidate: &candidate,
            max_body_length: 10,
        });
        assert_eq!(rendered, "{\"answer\": \"Bills\"}");
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "{new_email_colour}",
            "open {category_name",
            "stray } brace",
            "{category_name:>10}",
        ] {
            assert!(
                matches!(
                    PromptTemplate::parse(bad),
                    Err(ConfigError::InvalidTemplate { .. })
                ),
                "expected rejection of {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_examples_are_numbered_blocks() {
        let examples = vec![
            ExampleMessage {
                id: "e1".into(),
                fields: fields("news@shop.example", "Weekly deals"),
            },
            ExampleMessage {
                id: "e2".into(),
                fields: fields("news@shop.example", "Summer sale"),
            },
        ];
        let text = format_examples(&examples, 500);

        assert!(text.starts_with("Example 1:\n  Sender: news@shop.example\n  Subject: Weekly deals\n"));
        assert!(text.contains("  Body (first 500 chars): body\n-----------------------------\nExample 2:"));
        assert!(text.ends_with(EXAMPLE_SEPARATOR));
        assert_eq!(format_examples(&[], 500), "");
    }
}
