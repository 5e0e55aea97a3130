//! Interactive chat shell and single-message mode.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use su_config::{resolve_path, save_config, Config};
use su_core::{
    normalize_decision, AgentLoader, AgentRegistry, ChatModel, PauseToken, ResumeToken,
    SessionLoop, ToolProvisioner, TurnOutcome, TurnReply, TurnRole,
};
use termimad::crossterm::style::Stylize;
use termimad::MadSkin;

use crate::commands::Command;
use crate::completion::ShellHelper;
use crate::i18n::{tr, Lang, Msg, LANG_CODES};
use crate::style::{Style, STYLE_NAMES};

type LineEditor = Editor<ShellHelper, DefaultHistory>;

/// Save terminal attributes for later restoration.
#[cfg(unix)]
fn save_terminal_state() -> Option<nix::sys::termios::Termios> {
    nix::sys::termios::tcgetattr(std::io::stdin()).ok()
}

#[cfg(unix)]
fn restore_terminal_state(saved: &nix::sys::termios::Termios) {
    let _ = nix::sys::termios::tcsetattr(
        std::io::stdin(),
        nix::sys::termios::SetArg::TCSADRAIN,
        saved,
    );
}

/// Drop keystrokes typed while a turn was running.
#[cfg(unix)]
fn flush_pending_input() {
    let _ = nix::sys::termios::tcflush(std::io::stdin(), nix::sys::termios::FlushArg::TCIFLUSH);
}

/// Whether the shell keeps reading input after a command or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    config: Config,
    config_path: PathBuf,
    registry: AgentRegistry,
    loader: AgentLoader,
    session: SessionLoop,
    lang: Lang,
    style: Style,
    skin: MadSkin,
}

impl Shell {
    pub fn new(
        config: Config,
        config_path: PathBuf,
        agents_dir: &Path,
        model: Option<Arc<dyn ChatModel>>,
    ) -> Self {
        let lang = Lang::parse(&config.language).unwrap_or(Lang::En);
        let style = Style::parse(&config.style).unwrap_or(Style::Modern);
        let provisioner = ToolProvisioner::new(config.mcp.clone());
        let mut registry = AgentRegistry::new(agents_dir);
        registry.scan();
        Self {
            loader: AgentLoader::new(provisioner, model),
            config,
            config_path,
            registry,
            session: SessionLoop::new(),
            lang,
            style,
            skin: style.skin(),
        }
    }

    fn t(&self, msg: Msg) -> &'static str {
        tr(self.lang, msg)
    }

    fn active_name(&self) -> Option<&str> {
        self.session.agent().map(|a| a.name.as_str())
    }

    pub fn has_model(&self) -> bool {
        self.loader.has_model()
    }

    pub fn warn_no_model(&self) {
        let path = self.config_path.display().to_string();
        eprintln!("{}", self.t(Msg::NoModel).replace("{path}", &path).yellow());
    }

    /// Load `name` and make it the session's agent. Prints the outcome.
    pub async fn select_agent(&mut self, name: &str) -> bool {
        let Some(desc) = self.registry.get(name) else {
            println!("{}", self.t(Msg::AgentUnknown).replace("{name}", name));
            return false;
        };
        if !desc.valid {
            let reason = desc.error.clone().unwrap_or_default();
            println!(
                "{}",
                self.t(Msg::AgentInvalid)
                    .replace("{name}", name)
                    .replace("{reason}", &reason)
            );
            return false;
        }
        match self.loader.load(&mut self.registry, name).await {
            Some(agent) => {
                self.session.set_agent(agent);
                println!("{}", self.t(Msg::AgentLoaded).replace("{name}", name).dim());
                true
            }
            None => {
                println!("{}", self.t(Msg::AgentLoadFailed).replace("{name}", name).red());
                false
            }
        }
    }

    /// Try `preferred`, then every other valid agent in name order.
    pub async fn select_initial_agent(&mut self, preferred: &str) -> bool {
        if self.registry.get(preferred).is_some() && self.select_agent(preferred).await {
            return true;
        }
        for name in self.registry.valid_names() {
            if name != preferred && self.select_agent(&name).await {
                return true;
            }
        }
        false
    }

    pub async fn run_interactive(mut self) -> Result<()> {
        #[cfg(unix)]
        let saved_term = save_terminal_state();

        let history_path = resolve_path(&self.config.history_file);
        if let Some(parent) = history_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut rl: LineEditor = Editor::new()?;
        rl.set_helper(Some(ShellHelper::default()));
        let _ = rl.load_history(&history_path);
        self.refresh_helper(&mut rl);

        println!("{}", self.style.banner(self.t(Msg::Tagline), env!("CARGO_PKG_VERSION")));
        println!("{}", self.t(Msg::HelpHint).dim());
        println!();

        let result = loop {
            #[cfg(unix)]
            flush_pending_input();

            let prompt = self.style.prompt(self.active_name());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    let flow = match Command::parse(input) {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => self.chat(&mut rl, input).await,
                    };
                    if flow == Flow::Exit {
                        break Ok(());
                    }
                    self.refresh_helper(&mut rl);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break Ok(()),
                Err(err) => {
                    eprintln!("Error: {err}");
                    break Ok(());
                }
            }
        };

        self.loader.shutdown().await;
        let _ = rl.save_history(&history_path);
        #[cfg(unix)]
        if let Some(ref saved) = saved_term {
            restore_terminal_state(saved);
        }
        println!("{}", self.t(Msg::Goodbye));
        result
    }

    /// Send one message and print the answer. A pause is accepted only
    /// when `accept` is set. Returns whether the turn succeeded.
    pub async fn run_single(mut self, message: &str, accept: bool) -> Result<bool> {
        if self.session.agent().is_none() {
            eprintln!("{}", self.t(Msg::NoAgentLoaded));
            self.loader.shutdown().await;
            return Ok(false);
        }

        let mut outcome = tokio::select! {
            outcome = self.session.run_turn(message) => outcome,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("{}", self.t(Msg::InterruptExit));
                self.loader.shutdown().await;
                return Ok(false);
            }
        };

        let ok = loop {
            match outcome {
                TurnOutcome::Completed(reply) => {
                    self.render_reply(&reply);
                    break true;
                }
                TurnOutcome::Failed(error) => {
                    eprintln!("{}", self.t(Msg::TurnFailed).replace("{error}", &error).red());
                    break false;
                }
                TurnOutcome::Paused(token) => {
                    self.show_pause(&token);
                    let decision = if accept {
                        println!("{}", self.t(Msg::PauseAcceptedByFlag).dim());
                        ResumeToken::Accepted
                    } else {
                        println!("{}", self.t(Msg::PauseRejectedByDefault).dim());
                        ResumeToken::Rejected
                    };
                    match self.session.resume(decision).await {
                        Some(next) => outcome = next,
                        None => {
                            println!("{}", self.t(Msg::ResumeUnsupported).yellow());
                            break true;
                        }
                    }
                }
            }
        };

        self.loader.shutdown().await;
        Ok(ok)
    }

    fn refresh_helper(&self, rl: &mut LineEditor) {
        if let Some(helper) = rl.helper_mut() {
            helper.set_agents(self.registry.valid_names());
            helper.set_tool_count(self.session.tool_messages().len());
        }
    }

    async fn chat(&mut self, rl: &mut LineEditor, input: &str) -> Flow {
        if self.session.agent().is_none() {
            println!("{}", self.t(Msg::NoAgentLoaded));
            return Flow::Continue;
        }
        println!("{}", self.t(Msg::Thinking).dim());

        let mut outcome = tokio::select! {
            outcome = self.session.run_turn(input) => outcome,
            _ = tokio::signal::ctrl_c() => {
                println!("{}", self.t(Msg::InterruptExit));
                return Flow::Exit;
            }
        };

        loop {
            match outcome {
                TurnOutcome::Completed(reply) => {
                    self.render_reply(&reply);
                    return Flow::Continue;
                }
                TurnOutcome::Failed(error) => {
                    eprintln!("{}", self.t(Msg::TurnFailed).replace("{error}", &error).red());
                    println!();
                    return Flow::Continue;
                }
                TurnOutcome::Paused(token) => {
                    self.show_pause(&token);
                    let answer = match rl.readline(self.t(Msg::ConfirmPrompt)) {
                        Ok(answer) => answer,
                        Err(ReadlineError::Eof) => {
                            self.session.cancel_pause();
                            return Flow::Exit;
                        }
                        Err(e) => {
                            if !matches!(e, ReadlineError::Interrupted) {
                                tracing::warn!("Confirmation prompt failed: {e}");
                            }
                            self.session.cancel_pause();
                            println!("{}", self.t(Msg::ConfirmAborted).yellow());
                            return Flow::Continue;
                        }
                    };
                    let decision = normalize_decision(&answer);
                    let resumed = tokio::select! {
                        resumed = self.session.resume(decision) => resumed,
                        _ = tokio::signal::ctrl_c() => {
                            println!("{}", self.t(Msg::InterruptExit));
                            return Flow::Exit;
                        }
                    };
                    match resumed {
                        Some(next) => outcome = next,
                        None => {
                            println!("{}", self.t(Msg::ResumeUnsupported).yellow());
                            return Flow::Continue;
                        }
                    }
                }
            }
        }
    }

    fn show_pause(&self, token: &PauseToken) {
        println!();
        println!("{}", format!("⚠ {}", self.t(Msg::ConfirmTitle)).yellow().bold());
        match (token.message(), token.question()) {
            (None, None) => println!("{}", token.payload),
            (message, question) => {
                if let Some(message) = message.filter(|m| !m.is_empty()) {
                    self.skin.print_text(message);
                }
                if let Some(question) = question {
                    println!("{}", question.bold());
                }
            }
        }
    }

    fn render_reply(&self, reply: &TurnReply) {
        println!();
        if reply.content.trim().is_empty() {
            println!("{}", self.t(Msg::EmptyResponse).yellow());
        } else {
            let label = self.style.reply_label(self.active_name().unwrap_or("agent"));
            if !label.is_empty() {
                println!("{label}");
            }
            self.skin.print_text(&reply.content);
        }
        if !reply.tool_messages.is_empty() {
            let hint = self
                .t(Msg::ToolsHint)
                .replace("{count}", &reply.tool_messages.len().to_string());
            println!("{}", hint.dim());
        }
        println!();
    }

    async fn handle_command(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::Help => self.print_help(),
            Command::Exit => return Flow::Exit,
            Command::Clear => clear_screen(),
            Command::Agents => self.print_agents(),
            Command::Use(None) => println!("{}", self.t(Msg::UseUsage)),
            Command::Use(Some(name)) => {
                self.select_agent(&name).await;
            }
            Command::History => self.print_history(),
            Command::Reset => {
                self.session.reset();
                println!("{}", self.t(Msg::ResetDone));
            }
            Command::Style(None) => println!(
                "{}",
                self.t(Msg::StyleCurrent)
                    .replace("{name}", self.style.name())
                    .replace("{list}", &STYLE_NAMES.join(", "))
            ),
            Command::Style(Some(name)) => self.change_style(&name),
            Command::Lang(None) => println!(
                "{}",
                self.t(Msg::LangCurrent)
                    .replace("{code}", self.lang.code())
                    .replace("{list}", &LANG_CODES.join(", "))
            ),
            Command::Lang(Some(code)) => {
                self.change_lang(&code);
            }
            Command::SetLang(None) => println!("{}", self.t(Msg::SetLangUsage)),
            Command::SetLang(Some(code)) => {
                if self.change_lang(&code) {
                    self.config.language = self.lang.code().to_string();
                    self.persist_config();
                }
            }
            Command::Show(index) => self.show_tool_messages(index.as_deref()),
        }
        Flow::Continue
    }

    fn print_help(&self) {
        println!("{}", self.t(Msg::HelpTitle).bold());
        for msg in [
            Msg::HelpHelp,
            Msg::HelpExit,
            Msg::HelpClear,
            Msg::HelpAgents,
            Msg::HelpUse,
            Msg::HelpHistory,
            Msg::HelpReset,
            Msg::HelpStyle,
            Msg::HelpLang,
            Msg::HelpSetLang,
            Msg::HelpShow,
        ] {
            println!("  {}", self.t(msg));
        }
        println!();
    }

    fn print_agents(&self) {
        let dir = self.registry.root().display().to_string();
        if self.registry.is_empty() {
            println!("{}", self.t(Msg::NoAgents).replace("{dir}", &dir));
            return;
        }
        println!("{}", self.t(Msg::AgentsTitle).replace("{dir}", &dir).bold());
        let active = self.active_name();
        for desc in self.registry.all() {
            let marker = if Some(desc.name.as_str()) == active {
                format!(" ({})", self.t(Msg::ActiveMarker)).green().to_string()
            } else if !desc.valid {
                format!(" ({})", self.t(Msg::InvalidMarker)).red().to_string()
            } else {
                String::new()
            };
            let detail = if desc.valid {
                desc.description.clone().unwrap_or_default()
            } else {
                desc.error.clone().unwrap_or_default()
            };
            println!("  {}{marker}  {}", desc.name.as_str().bold(), detail.dim());
        }
        println!();
    }

    fn print_history(&self) {
        let history = self.session.history();
        if history.is_empty() {
            println!("{}", self.t(Msg::HistoryEmpty));
            return;
        }
        for (i, turn) in history.iter().enumerate() {
            let who = match turn.role {
                TurnRole::User => "user".cyan(),
                TurnRole::Assistant => "assistant".green(),
            };
            println!("{:>3}. {who}: {}", i + 1, turn.content);
        }
        println!();
    }

    fn show_tool_messages(&self, index: Option<&str>) {
        let all = self.session.tool_messages();
        if all.is_empty() {
            println!("{}", self.t(Msg::ToolsNone));
            return;
        }
        let Some(index) = index else {
            println!("{}", self.t(Msg::ToolsTitle).bold());
            for (i, msg) in all.iter().enumerate() {
                let preview: String = msg.content.chars().take(60).collect();
                let more = if msg.content.chars().count() > 60 { "…" } else { "" };
                println!(
                    "  {:>3}. [{}] {}{more}",
                    i + 1,
                    msg.name.as_deref().unwrap_or("tool"),
                    preview.replace('\n', " ")
                );
            }
            return;
        };
        match index.parse::<usize>().ok().and_then(|n| self.session.tool_message(n)) {
            Some(msg) => {
                println!("{}", format!("[{}]", msg.name.as_deref().unwrap_or("tool")).dim());
                println!("{}", msg.content);
                println!();
            }
            None => println!(
                "{}",
                self.t(Msg::ToolIndexInvalid)
                    .replace("{n}", index)
                    .replace("{count}", &all.len().to_string())
            ),
        }
    }

    fn change_style(&mut self, name: &str) {
        match Style::parse(name) {
            Some(style) => {
                self.style = style;
                self.skin = style.skin();
                self.config.style = style.name().to_string();
                println!("{}", self.t(Msg::StyleChanged).replace("{name}", style.name()));
                self.persist_config();
            }
            None => println!(
                "{}",
                self.t(Msg::StyleUnknown)
                    .replace("{name}", name)
                    .replace("{list}", &STYLE_NAMES.join(", "))
            ),
        }
    }

    fn change_lang(&mut self, code: &str) -> bool {
        match Lang::parse(code) {
            Some(lang) => {
                self.lang = lang;
                println!("{}", self.t(Msg::LangChanged).replace("{code}", lang.code()));
                true
            }
            None => {
                println!(
                    "{}",
                    self.t(Msg::LangUnknown)
                        .replace("{code}", code)
                        .replace("{list}", &LANG_CODES.join(", "))
                );
                false
            }
        }
    }

    fn persist_config(&self) {
        match save_config(&self.config_path, &self.config) {
            Ok(()) => println!(
                "{}",
                self.t(Msg::ConfigSaved)
                    .replace("{path}", &self.config_path.display().to_string())
                    .dim()
            ),
            Err(e) => tracing::warn!("Failed to save config: {e:#}"),
        }
    }
}

fn clear_screen() {
    use termimad::crossterm::cursor::MoveTo;
    use termimad::crossterm::terminal::{Clear, ClearType};
    use termimad::crossterm::QueueableCommand;

    let mut out = std::io::stdout();
    let _ = out.queue(Clear(ClearType::All)).and_then(|o| o.queue(MoveTo(0, 0)));
    let _ = out.flush();
}
