use speechrule::{EngineConfig, SpeechSegment, SpeechVerbose};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const MAX_PREVIEW: usize = 60;

pub fn print_run(input: &str, config: &EngineConfig, res: &SpeechVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Speaking: {}", preview(input)), ansi::CYAN)));
    println!(
        "  {} {}  {} {}  {} {}",
        palette.dim("constraint:"),
        palette.paint(&res.details.dynamic, ansi::BLUE),
        palette.dim("│ markup:"),
        palette.paint(config.markup.to_string(), ansi::BLUE),
        palette.dim("│ rules loaded:"),
        palette.paint(res.details.rules_loaded.to_string(), ansi::YELLOW),
    );

    println!("\n{}", palette.paint("━━━ Speech ━━━", ansi::GRAY));
    if res.text.is_empty() {
        println!("{}", palette.dim("  No speech produced"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • The document is empty");
        println!("  • No rule matched and the nodes carry no text");
        println!("\n{}", palette.dim("  Tip: Set SPEECHRULE_LOG=speechrule=trace to see rule candidates"));
    } else {
        println!("  {}", palette.bold(palette.paint(&res.text, ansi::GREEN)));
        print_segments(&res.segments, &palette);
    }

    println!("\n{}", palette.paint("━━━ Fired Rules ━━━", ansi::GRAY));
    print_fired(res, &palette);

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Lookups: {}  │  Cache: {} hit / {} miss  │  Fallbacks: {}",
        palette.paint(format!("{:?}", res.details.total), ansi::GREEN),
        palette.paint(res.details.lookups.to_string(), ansi::CYAN),
        palette.paint(res.details.cache_hits.to_string(), ansi::CYAN),
        palette.dim(res.details.cache_misses.to_string()),
        palette.dim(res.details.fallbacks.to_string()),
    );
    println!();
}

fn print_segments(segments: &[SpeechSegment], palette: &ansi::Palette) {
    for (idx, segment) in segments.iter().enumerate() {
        let body = match segment {
            SpeechSegment::Text { text, context, personality } => {
                let mut line = palette.paint(format!("\"{}\"", text), ansi::GREEN);
                if let Some(context) = context {
                    line.push_str(&format!(" {} {}", palette.dim("context:"), palette.paint(context, ansi::YELLOW)));
                }
                if !personality.is_empty() {
                    line.push_str(&format!(" {}", palette.dim(format!("{:?}", personality))));
                }
                line
            }
            SpeechSegment::Pause { millis } => palette.paint(format!("pause {}ms", millis), ansi::BLUE),
        };
        println!("    {} {}", palette.paint(format!("[{}]", idx), ansi::GRAY), body);
    }
}

fn print_fired(res: &SpeechVerbose, palette: &ansi::Palette) {
    if res.details.fired.is_empty() {
        println!("{}", palette.dim("  No rules fired"));
        return;
    }
    for fired in &res.details.fired {
        println!(
            "  {}{} {} {} {}",
            "  ".repeat(fired.depth),
            palette.paint(&fired.rule, ansi::CYAN),
            palette.dim("on"),
            palette.paint(format!("<{}>", fired.node), ansi::BLUE),
            palette.dim(format!("({})", fired.dynamic)),
        );
    }
}

fn preview(input: &str) -> String {
    let flat = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_PREVIEW {
        flat
    } else {
        format!("{}…", flat.chars().take(MAX_PREVIEW).collect::<String>())
    }
}
