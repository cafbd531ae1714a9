//! Speech output.
//!
//! Evaluation produces a flat list of [`SpeechSegment`]s. Rendering them to a
//! string is a separate, final step controlled by [`Markup`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prosody overrides attached to a segment. `None` means "inherit".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    pub rate: Option<f64>,
    pub pitch: Option<f64>,
    pub volume: Option<f64>,
}

impl Personality {
    pub fn is_empty(&self) -> bool {
        self.rate.is_none() && self.pitch.is_none() && self.volume.is_none()
    }

    /// Fills unset fields from `outer`; values already set on `self` win.
    pub fn inherit(&self, outer: &Personality) -> Personality {
        Personality {
            rate: self.rate.or(outer.rate),
            pitch: self.pitch.or(outer.pitch),
            volume: self.volume.or(outer.volume),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechSegment {
    Text {
        text: String,
        /// Context announced before the text, e.g. a `Row 1` counter.
        context: Option<String>,
        personality: Personality,
    },
    Pause {
        millis: u32,
    },
}

impl SpeechSegment {
    pub fn text(text: impl Into<String>) -> Self {
        SpeechSegment::Text { text: text.into(), context: None, personality: Personality::default() }
    }

    pub fn pause(millis: u32) -> Self {
        SpeechSegment::Pause { millis }
    }

    /// Spoken words of the segment, context included.
    pub fn spoken(&self) -> Option<String> {
        match self {
            SpeechSegment::Text { text, context: Some(context), .. } if !context.is_empty() => {
                Some(format!("{} {}", context, text))
            }
            SpeechSegment::Text { text, .. } => Some(text.clone()),
            SpeechSegment::Pause { .. } => None,
        }
    }
}

/// Output format for [`render`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Markup {
    /// Words joined by single spaces; pauses and prosody dropped.
    #[default]
    None,
    /// Like `None`, but pauses become commas.
    Punctuation,
    /// SSML with `<break>` and `<prosody>` elements.
    Ssml,
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Markup::None => "none",
            Markup::Punctuation => "punctuation",
            Markup::Ssml => "ssml",
        })
    }
}

impl std::str::FromStr for Markup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Markup::None),
            "punctuation" => Ok(Markup::Punctuation),
            "ssml" => Ok(Markup::Ssml),
            other => Err(format!("unknown markup `{}`", other)),
        }
    }
}

pub fn render(segments: &[SpeechSegment], markup: Markup) -> String {
    match markup {
        Markup::None => join_words(segments.iter().filter_map(SpeechSegment::spoken)),
        Markup::Punctuation => render_punctuation(segments),
        Markup::Ssml => render_ssml(segments),
    }
}

fn join_words(words: impl Iterator<Item = String>) -> String {
    words.filter(|w| !w.trim().is_empty()).map(|w| w.trim().to_string()).collect::<Vec<_>>().join(" ")
}

fn render_punctuation(segments: &[SpeechSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment.spoken() {
            Some(words) if !words.trim().is_empty() => {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(words.trim());
            }
            Some(_) => {}
            None => {
                if !out.is_empty() && !out.ends_with(',') {
                    out.push(',');
                }
            }
        }
    }
    out.trim_end_matches(',').to_string()
}

fn render_ssml(segments: &[SpeechSegment]) -> String {
    let mut body = Vec::new();
    for segment in segments {
        match segment {
            SpeechSegment::Pause { millis } => body.push(format!("<break time=\"{}ms\"/>", millis)),
            SpeechSegment::Text { personality, .. } => {
                let Some(words) = segment.spoken().filter(|w| !w.trim().is_empty()) else {
                    continue;
                };
                let words = escape_xml(words.trim());
                if personality.is_empty() {
                    body.push(words);
                } else {
                    body.push(format!("<prosody{}>{}</prosody>", prosody_attributes(personality), words));
                }
            }
        }
    }
    format!("<speak>{}</speak>", body.join(" "))
}

fn prosody_attributes(personality: &Personality) -> String {
    let mut attrs = String::new();
    for (key, value) in [("rate", personality.rate), ("pitch", personality.pitch), ("volume", personality.volume)] {
        if let Some(value) = value {
            // Values are relative offsets; 0 means unchanged.
            let percent = (value * 100.0).round() as i64;
            attrs.push_str(&format!(" {}=\"{:+}%\"", key, percent));
        }
    }
    attrs
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SpeechSegment> {
        vec![
            SpeechSegment::text("StartFraction"),
            SpeechSegment::text("x"),
            SpeechSegment::pause(200),
            SpeechSegment::Text {
                text: "y < 2".into(),
                context: Some("Row 1".into()),
                personality: Personality { rate: Some(-0.2), ..Personality::default() },
            },
            SpeechSegment::text(""),
        ]
    }

    #[test]
    fn plain_rendering_joins_words_and_drops_pauses() {
        assert_eq!(render(&sample(), Markup::None), "StartFraction x Row 1 y < 2");
    }

    #[test]
    fn punctuation_rendering_turns_pauses_into_commas() {
        assert_eq!(render(&sample(), Markup::Punctuation), "StartFraction x, Row 1 y < 2");
        assert_eq!(render(&[SpeechSegment::pause(10), SpeechSegment::text("a")], Markup::Punctuation), "a");
    }

    #[test]
    fn ssml_rendering_escapes_and_wraps_prosody() {
        assert_eq!(
            render(&sample(), Markup::Ssml),
            "<speak>StartFraction x <break time=\"200ms\"/> <prosody rate=\"-20%\">Row 1 y &lt; 2</prosody></speak>"
        );
    }

    #[test]
    fn inner_personality_wins_over_outer() {
        let inner = Personality { pitch: Some(0.5), ..Personality::default() };
        let outer = Personality { pitch: Some(-1.0), volume: Some(0.3), rate: None };
        assert_eq!(inner.inherit(&outer), Personality { pitch: Some(0.5), volume: Some(0.3), rate: None });
    }

    #[test]
    fn markup_parses_case_insensitively() {
        assert_eq!("SSML".parse::<Markup>(), Ok(Markup::Ssml));
        assert!("html".parse::<Markup>().is_err());
    }
}
