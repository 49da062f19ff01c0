//! Confirmation message rendering.
//!
//! Templates are plain text with `{{.Address}}`, `{{.Code}}` and `{{.Site}}`
//! actions. Anything else between `{{` and `}}` is rejected at parse time.

pub const DEFAULT_TEMPLATE: &str = "Confirmation for {{.Address}}, site {{.Site}}\n\nCode: {{.Code}}\n";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unclosed action at byte {0}")]
    Unclosed(usize),
    #[error("unknown field {0:?}")]
    UnknownField(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Address,
    Code,
    Site,
}

impl Field {
    fn parse(action: &str) -> Result<Self, TemplateError> {
        match action.trim() {
            ".Address" => Ok(Self::Address),
            ".Code" => Ok(Self::Code),
            ".Site" => Ok(Self::Site),
            other => Err(TemplateError::UnknownField(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Text(String),
    Field(Field),
}

/// Values substituted into a template.
#[derive(Clone, Copy, Debug)]
pub struct MessageData<'a> {
    pub address: &'a str,
    pub code: &'a str,
    pub site: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    parts: Vec<Part>,
}

impl MessageTemplate {
    /// Parse a template.
    ///
    /// # Errors
    /// Returns an error on an unterminated `{{` or an unknown field.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or(TemplateError::Unclosed(offset + start))?;
            parts.push(Part::Field(Field::parse(&after[..end])?));

            let consumed = start + 2 + end + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self { parts })
    }

    #[must_use]
    pub fn render(&self, data: &MessageData<'_>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            let value = match part {
                Part::Text(text) => text.as_str(),
                Part::Field(Field::Address) => data.address,
                Part::Field(Field::Code) => data.code,
                Part::Field(Field::Site) => data.site,
            };
            out.push_str(value);
        }
        out
    }
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self { parts: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: MessageData<'static> = MessageData {
        address: "a@x.com",
        code: "123456",
        site: "example.com",
    };

    #[test]
    fn renders_all_placeholders() -> Result<(), TemplateError> {
        let template = MessageTemplate::parse("{{.Address}} {{ .Code }} @ {{.Site}}")?;
        assert_eq!(template.render(&DATA), "a@x.com 123456 @ example.com");
        Ok(())
    }

    #[test]
    fn code_only_template() -> Result<(), TemplateError> {
        let template = MessageTemplate::parse("{{.Code}}")?;
        assert_eq!(template.render(&DATA), "123456");
        Ok(())
    }

    #[test]
    fn plain_text_passes_through() -> Result<(), TemplateError> {
        let template = MessageTemplate::parse("no actions here } {")?;
        assert_eq!(template.render(&DATA), "no actions here } {");
        Ok(())
    }

    #[test]
    fn default_template_mentions_the_code() {
        let body = MessageTemplate::default().render(&DATA);
        assert_eq!(
            body,
            "Confirmation for a@x.com, site example.com\n\nCode: 123456\n"
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert_eq!(
            MessageTemplate::parse("hello {{.User}}"),
            Err(TemplateError::UnknownField(".User".to_string()))
        );
    }

    #[test]
    fn unclosed_action_is_rejected() {
        assert_eq!(
            MessageTemplate::parse("code {{.Code}} and {{.Site"),
            Err(TemplateError::Unclosed(19))
        );
    }
}
