//! Chat commands recognized by the bot.


use tolk_core::languages::LanguageTable;

/// Known bot commands, borrowing from the message text.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// The translate command with its trailing text (code and optional text).
    Translate(&'a str),
    Languages,
    Help,
}

impl<'a> Command<'a> {
    /// Parse a command from message text. Returns `None` for plain messages and
    /// unknown `/` prefixes.
    ///
    /// `translate` is the configured translate token without the slash. A bare
    /// translate command with no arguments parses as [`Command::Help`].
    pub fn parse(text: &'a str, translate: &str) -> Option<Self> {
        let text = text.trim_start();
        let (first, args) = match text.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, rest),
            None => (text, ""),
        };
        // Strip @botname suffix (e.g. "/tr@tolk_bot" → "/tr").
        let cmd = first.split('@').next().unwrap_or(first);
        let name = cmd.strip_prefix('/')?;

        if name == translate {
            if args.trim().is_empty() {
                return Some(Self::Help);
            }
            return Some(Self::Translate(args));
        }
        match name {
            "languages" | "langs" => Some(Self::Languages),
            "help" | "start" => Some(Self::Help),
            _ => None,
        }
    }
}

/// `(command, description)` pairs advertised to chat clients.
pub fn menu(translate: &str) -> Vec<(String, String)> {
    vec![
        (
            translate.to_string(),
            "Translate text or the message you reply to".to_string(),
        ),
        (
            "languages".to_string(),
            "List supported language codes".to_string(),
        ),
        ("help".to_string(), "How to use the bot".to_string()),
    ]
}

/// Usage text for the translate command.
pub fn help_text(translate: &str) -> String {
    format!(
        "Usage:\n\
         /{translate} <code> <text>  translate the text\n\
         /{translate} <code>  as a reply, translate the replied-to message\n\
         /languages  list supported codes\n\n\
         Example: /{translate} es Good morning"
    )
}

/// One line per known language, sorted by code.
pub fn languages_text(languages: &LanguageTable) -> String {
    let entries = languages.sorted_entries();
    if entries.is_empty() {
        return "No languages are configured.".to_string();
    }
    let mut out = format!("Supported languages ({}):\n", entries.len());
    for (code, name) in entries {
        out.push_str(&format!("{code}: {name}\n"));
    }
    out.truncate(out.trim_end().len());
    out
}
