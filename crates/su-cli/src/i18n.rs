//! Interface strings for the supported languages.
//!
//! Placeholders are written `{name}` and filled in by the caller.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Zh,
}

pub const LANG_CODES: &[&str] = &["en", "zh"];

impl Lang {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "zh" | "cn" | "zh-cn" | "chinese" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Tagline,
    HelpHint,
    HelpTitle,
    HelpHelp,
    HelpExit,
    HelpClear,
    HelpAgents,
    HelpUse,
    HelpHistory,
    HelpReset,
    HelpStyle,
    HelpLang,
    HelpSetLang,
    HelpShow,
    Goodbye,
    AgentsTitle,
    NoAgents,
    ActiveMarker,
    InvalidMarker,
    AgentLoaded,
    AgentUnknown,
    AgentInvalid,
    AgentLoadFailed,
    NoAgentLoaded,
    UseUsage,
    HistoryEmpty,
    ResetDone,
    StyleCurrent,
    StyleChanged,
    StyleUnknown,
    LangCurrent,
    LangChanged,
    LangUnknown,
    ConfigSaved,
    SetLangUsage,
    ToolsNone,
    ToolsTitle,
    ToolsHint,
    ToolIndexInvalid,
    Thinking,
    EmptyResponse,
    TurnFailed,
    ConfirmTitle,
    ConfirmPrompt,
    ConfirmAborted,
    ResumeUnsupported,
    InterruptExit,
    NoModel,
    PauseRejectedByDefault,
    PauseAcceptedByFlag,
}

pub fn tr(lang: Lang, msg: Msg) -> &'static str {
    match lang {
        Lang::En => en(msg),
        Lang::Zh => zh(msg),
    }
}

fn en(msg: Msg) -> &'static str {
    match msg {
        Msg::Tagline => "Agent chat shell",
        Msg::HelpHint => "Type /help for commands, Ctrl-D to quit.",
        Msg::HelpTitle => "Commands:",
        Msg::HelpHelp => "/help, /h            Show this help",
        Msg::HelpExit => "/exit, /quit, /q     Leave the shell",
        Msg::HelpClear => "/clear               Clear the screen",
        Msg::HelpAgents => "/agents              List discovered agents",
        Msg::HelpUse => "/use <name>          Switch to another agent",
        Msg::HelpHistory => "/history             Show the conversation",
        Msg::HelpReset => "/reset               Start a new conversation",
        Msg::HelpStyle => "/style [name]        Show or change the prompt style",
        Msg::HelpLang => "/lang [code]         Show or change the language",
        Msg::HelpSetLang => "/set_lang <code>     Change the language and save it",
        Msg::HelpShow => "show <n>             Print tool message n",
        Msg::Goodbye => "Goodbye!",
        Msg::AgentsTitle => "Agents in {dir}:",
        Msg::NoAgents => "No agents found in {dir}.",
        Msg::ActiveMarker => "active",
        Msg::InvalidMarker => "invalid",
        Msg::AgentLoaded => "Using agent '{name}'.",
        Msg::AgentUnknown => "No agent named '{name}'. Try /agents.",
        Msg::AgentInvalid => "Agent '{name}' is not a valid package: {reason}",
        Msg::AgentLoadFailed => "Could not load agent '{name}'. See the log for details.",
        Msg::NoAgentLoaded => "No agent is loaded. Pick one with /use <name>.",
        Msg::UseUsage => "Usage: /use <name>",
        Msg::HistoryEmpty => "No conversation yet.",
        Msg::ResetDone => "Conversation reset.",
        Msg::StyleCurrent => "Current style: {name} (available: {list})",
        Msg::StyleChanged => "Style set to {name}.",
        Msg::StyleUnknown => "Unknown style '{name}'. Available: {list}",
        Msg::LangCurrent => "Current language: {code} (available: {list})",
        Msg::LangChanged => "Language set to {code}.",
        Msg::LangUnknown => "Unknown language '{code}'. Available: {list}",
        Msg::ConfigSaved => "Saved to {path}.",
        Msg::SetLangUsage => "Usage: /set_lang <code>",
        Msg::ToolsNone => "No tool messages yet.",
        Msg::ToolsTitle => "Tool messages:",
        Msg::ToolsHint => "{count} tool message(s), use `show <n>` to inspect.",
        Msg::ToolIndexInvalid => "No tool message #{n}. There are {count}.",
        Msg::Thinking => "Thinking...",
        Msg::EmptyResponse => "The agent returned an empty response.",
        Msg::TurnFailed => "Something went wrong: {error}",
        Msg::ConfirmTitle => "Confirmation required",
        Msg::ConfirmPrompt => "Your answer (yes/no): ",
        Msg::ConfirmAborted => "Confirmation cancelled, turn aborted.",
        Msg::ResumeUnsupported => "This agent cannot resume after a confirmation (no checkpointed graph). The decision was not applied.",
        Msg::InterruptExit => "Interrupted.",
        Msg::NoModel => "No model configured; chatbot nodes will fail. Set model.provider and model.model in {path}.",
        Msg::PauseRejectedByDefault => "The agent asked for confirmation; rejecting (pass --yes to accept).",
        Msg::PauseAcceptedByFlag => "The agent asked for confirmation; accepting (--yes).",
    }
}

fn zh(msg: Msg) -> &'static str {
    match msg {
        Msg::Tagline => "智能体对话终端",
        Msg::HelpHint => "输入 /help 查看命令，Ctrl-D 退出。",
        Msg::HelpTitle => "命令：",
        Msg::HelpHelp => "/help, /h            显示帮助",
        Msg::HelpExit => "/exit, /quit, /q     退出",
        Msg::HelpClear => "/clear               清屏",
        Msg::HelpAgents => "/agents              列出已发现的智能体",
        Msg::HelpUse => "/use <名称>          切换智能体",
        Msg::HelpHistory => "/history             查看对话记录",
        Msg::HelpReset => "/reset               开始新对话",
        Msg::HelpStyle => "/style [名称]        查看或切换提示符风格",
        Msg::HelpLang => "/lang [代码]         查看或切换语言",
        Msg::HelpSetLang => "/set_lang <代码>     切换语言并保存",
        Msg::HelpShow => "show <n>             查看第 n 条工具消息",
        Msg::Goodbye => "再见！",
        Msg::AgentsTitle => "{dir} 中的智能体：",
        Msg::NoAgents => "{dir} 中没有找到智能体。",
        Msg::ActiveMarker => "当前",
        Msg::InvalidMarker => "无效",
        Msg::AgentLoaded => "正在使用智能体 '{name}'。",
        Msg::AgentUnknown => "没有名为 '{name}' 的智能体，试试 /agents。",
        Msg::AgentInvalid => "智能体 '{name}' 不是有效的包：{reason}",
        Msg::AgentLoadFailed => "无法加载智能体 '{name}'，详情见日志。",
        Msg::NoAgentLoaded => "尚未加载智能体，请用 /use <名称> 选择。",
        Msg::UseUsage => "用法：/use <名称>",
        Msg::HistoryEmpty => "暂无对话。",
        Msg::ResetDone => "对话已重置。",
        Msg::StyleCurrent => "当前风格：{name}（可选：{list}）",
        Msg::StyleChanged => "风格已切换为 {name}。",
        Msg::StyleUnknown => "未知风格 '{name}'。可选：{list}",
        Msg::LangCurrent => "当前语言：{code}（可选：{list}）",
        Msg::LangChanged => "语言已切换为 {code}。",
        Msg::LangUnknown => "未知语言 '{code}'。可选：{list}",
        Msg::ConfigSaved => "已保存到 {path}。",
        Msg::SetLangUsage => "用法：/set_lang <代码>",
        Msg::ToolsNone => "暂无工具消息。",
        Msg::ToolsTitle => "工具消息：",
        Msg::ToolsHint => "共 {count} 条工具消息，输入 `show <n>` 查看。",
        Msg::ToolIndexInvalid => "没有第 {n} 条工具消息，共 {count} 条。",
        Msg::Thinking => "思考中...",
        Msg::EmptyResponse => "智能体返回了空回复。",
        Msg::TurnFailed => "出错了：{error}",
        Msg::ConfirmTitle => "需要确认",
        Msg::ConfirmPrompt => "请回答（是/否）：",
        Msg::ConfirmAborted => "已取消确认，本轮对话中止。",
        Msg::ResumeUnsupported => "该智能体没有带检查点的图，无法在确认后继续，本次决定未生效。",
        Msg::InterruptExit => "已中断。",
        Msg::NoModel => "未配置模型，chatbot 节点将无法运行。请在 {path} 中设置 model.provider 和 model.model。",
        Msg::PauseRejectedByDefault => "智能体请求确认，默认拒绝（使用 --yes 接受）。",
        Msg::PauseAcceptedByFlag => "智能体请求确认，已接受（--yes）。",
    }
}
