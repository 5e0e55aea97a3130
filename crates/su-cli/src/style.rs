//! Banner, prompt and markdown skin for each look.

use termimad::crossterm::style::{Color, Stylize};
use termimad::MadSkin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Modern,
    Minimal,
    Classic,
    Colorful,
}

pub const STYLE_NAMES: &[&str] = &["modern", "minimal", "classic", "colorful"];

const LOGO: &[&str] = &[
    r"  ____          ____ _     ___ ",
    r" / ___| _   _  / ___| |   |_ _|",
    r" \___ \| | | || |   | |    | | ",
    r"  ___) | |_| || |___| |___ | | ",
    r" |____/ \__,_| \____|_____|___|",
];

/// Gradient used by the colorful banner, top to bottom.
const GRADIENT: &[(u8, u8, u8)] = &[
    (255, 95, 109),
    (255, 153, 102),
    (255, 204, 92),
    (120, 220, 140),
    (90, 170, 255),
];

impl Style {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "modern" => Some(Self::Modern),
            "minimal" => Some(Self::Minimal),
            "classic" => Some(Self::Classic),
            "colorful" | "colourful" => Some(Self::Colorful),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Minimal => "minimal",
            Self::Classic => "classic",
            Self::Colorful => "colorful",
        }
    }

    pub fn banner(&self, tagline: &str, version: &str) -> String {
        match self {
            Self::Minimal => format!("su-cli {version}  {tagline}"),
            Self::Classic => {
                let mut out = LOGO.join("\n");
                out.push_str(&format!("\n\n  {tagline}  v{version}"));
                out
            }
            Self::Modern => {
                let mut out: Vec<String> = LOGO
                    .iter()
                    .map(|line| line.with(Color::Cyan).bold().to_string())
                    .collect();
                out.push(String::new());
                out.push(format!("  {}  {}", tagline.bold(), format!("v{version}").dim()));
                out.join("\n")
            }
            Self::Colorful => {
                let mut out: Vec<String> = LOGO
                    .iter()
                    .zip(GRADIENT.iter().cycle())
                    .map(|(line, &(r, g, b))| line.with(Color::Rgb { r, g, b }).bold().to_string())
                    .collect();
                out.push(String::new());
                out.push(format!(
                    "  {}  {}",
                    tagline.with(Color::Magenta).bold(),
                    format!("v{version}").with(Color::Yellow)
                ));
                out.join("\n")
            }
        }
    }

    pub fn prompt(&self, agent: Option<&str>) -> String {
        let agent = agent.unwrap_or("-");
        match self {
            Self::Minimal => "> ".to_string(),
            Self::Classic => format!("[{agent}]$ "),
            Self::Modern => format!("{} {} ", agent.with(Color::Cyan).bold(), "❯".with(Color::Green)),
            Self::Colorful => format!(
                "{}{}{} ",
                "su".with(Color::Magenta).bold(),
                "@".with(Color::Yellow),
                agent.with(Color::Cyan).bold()
            ) + &"» ".with(Color::Green).to_string(),
        }
    }

    /// Prefix printed before each assistant reply.
    pub fn reply_label(&self, agent: &str) -> String {
        match self {
            Self::Minimal => String::new(),
            Self::Classic => format!("{agent}:"),
            Self::Modern => format!("{}", format!("● {agent}").with(Color::Cyan)),
            Self::Colorful => format!("{}", format!("✦ {agent}").with(Color::Magenta).bold()),
        }
    }

    pub fn skin(&self) -> MadSkin {
        match self {
            Self::Minimal | Self::Classic => MadSkin::no_style(),
            Self::Modern => {
                let mut skin = MadSkin::default();
                skin.set_headers_fg(Color::Cyan);
                skin.bold.set_fg(Color::White);
                skin
            }
            Self::Colorful => {
                let mut skin = MadSkin::default();
                skin.set_headers_fg(Color::Magenta);
                skin.bold.set_fg(Color::Yellow);
                skin.italic.set_fg(Color::Cyan);
                skin.inline_code.set_fg(Color::Green);
                skin
            }
        }
    }
}
