use rustyline::completion::{Completer, Pair};
use rustyline::hint::Hinter;
use rustyline::Context;
use rustyline::{Helper, Highlighter, Validator};

use crate::commands::COMMAND_NAMES;
use crate::i18n::LANG_CODES;
use crate::style::STYLE_NAMES;

/// Line-editor helper: completes commands and their arguments and shows
/// the rest of a uniquely matching command as an inline hint.
#[derive(Helper, Validator, Highlighter, Default)]
pub struct ShellHelper {
    agents: Vec<String>,
    tool_count: usize,
}

impl ShellHelper {
    pub fn set_agents(&mut self, agents: Vec<String>) {
        self.agents = agents;
    }

    pub fn set_tool_count(&mut self, count: usize) {
        self.tool_count = count;
    }

    /// Candidates for the word under the cursor and where it starts.
    fn candidates(&self, line: &str) -> (usize, Vec<String>) {
        let Some((head, arg)) = line.split_once(' ') else {
            let names = COMMAND_NAMES
                .iter()
                .filter(|c| line.starts_with('/') || line.starts_with('s'))
                .filter(|c| c.starts_with(line))
                .map(|c| c.to_string())
                .collect();
            return (0, names);
        };

        let start = head.len() + 1;
        let pool: Vec<String> = match head {
            "/use" => self.agents.clone(),
            "/style" => STYLE_NAMES.iter().map(|s| s.to_string()).collect(),
            "/lang" | "/set_lang" => LANG_CODES.iter().map(|s| s.to_string()).collect(),
            "show" => (1..=self.tool_count).map(|n| n.to_string()).collect(),
            _ => Vec::new(),
        };
        let matches = pool.into_iter().filter(|c| c.starts_with(arg)).collect();
        (start, matches)
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, names) = self.candidates(&line[..pos]);
        let pairs = names
            .into_iter()
            .map(|name| Pair {
                display: name.clone(),
                replacement: name,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        if line == "/" {
            return Some("help, agents, use, reset...".into());
        }
        if line == "/use " && !self.agents.is_empty() {
            return Some(format!("<{}>", self.agents.join("|")));
        }
        let (start, names) = self.candidates(line);
        match names.as_slice() {
            [only] if only.len() > line.len() - start => Some(only[line.len() - start..].to_string()),
            _ => None,
        }
    }
}
