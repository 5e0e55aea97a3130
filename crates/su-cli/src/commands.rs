//! Slash-command parsing. Anything that is not a command is a chat turn.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Clear,
    Agents,
    Use(Option<String>),
    History,
    Reset,
    Style(Option<String>),
    Lang(Option<String>),
    SetLang(Option<String>),
    /// `show` lists tool messages; `show <n>` prints one.
    Show(Option<String>),
}

/// Names offered by completion, in help order.
pub const COMMAND_NAMES: &[&str] = &[
    "/help", "/h", "/exit", "/quit", "/q", "/clear", "/agents", "/use", "/history", "/reset",
    "/style", "/lang", "/set_lang", "show",
];

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let cmd = match head {
            "/help" | "/h" => Self::Help,
            "/exit" | "/quit" | "/q" => Self::Exit,
            "/clear" => Self::Clear,
            "/agents" => Self::Agents,
            "/use" => Self::Use(arg),
            "/history" => Self::History,
            "/reset" => Self::Reset,
            "/style" => Self::Style(arg),
            "/lang" => Self::Lang(arg),
            "/set_lang" => Self::SetLang(arg),
            // Only a bare `show` or `show <number>` is a command, so prose
            // such as "show me the weather" still reaches the agent.
            "show" if arg.as_deref().map_or(true, is_index) => Self::Show(arg),
            _ => return None,
        };
        Some(cmd)
    }
}

fn is_index(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
