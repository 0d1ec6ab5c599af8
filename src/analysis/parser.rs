/*!
 * Screenplay parsing.
 *
 * Turns raw script text into an ordered list of `DialogueLine`s:
 * - Sluglines (`INT.`, `EXT.`, `INT./EXT.`, `I/E`, `EST.`) open a new scene
 * - Upper-case speaker cues followed by text open a dialogue block
 * - Inline `NAME: dialogue` lines are dialogue as well
 * - Everything else is an unattributed stage direction
 *
 * Parsing never fails; unrecognized input becomes stage directions.
 */

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::model::DialogueLine;

/// Scene heading, optionally scene-numbered ("12 INT. HOUSE - DAY 12")
static SLUGLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+[A-Z]?\.?\s+)?(?:INT\./EXT\.?|EXT\./INT\.?|INT\.?/EXT\.?|I/E\.?|INT\.|EXT\.|EST\.|INTERIOR|EXTERIOR)(?:\s|$)")
        .expect("Invalid slugline regex")
});

/// Transition such as "CUT TO:", "FADE IN:", "DISSOLVE TO:"
static TRANSITION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z][A-Z ]*\s(?:TO|IN|OUT)[:.]|FADE (?:IN|OUT)[:.]?|THE END\.?)$")
        .expect("Invalid transition regex")
});

/// Speaker cue: upper-case name with optional extensions like (V.O.) or (CONT'D)
static CUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9'’.\- ]*[A-Z0-9'’.])\s*((?:\([^)]*\)\s*)*)$").expect("Invalid cue regex")
});

/// Inline dialogue: "NAME: text"
static INLINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Z0-9'’.\- ]{0,30}?)\s*(?:\([^)]*\))?\s*:\s*(\S.*)$").expect("Invalid inline dialogue regex")
});

static PARENTHETICAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("Invalid parenthetical regex"));

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Longest name accepted as a speaker cue, in words
const MAX_CUE_WORDS: usize = 4;

/// Normalized key for a speaker cue: extensions removed, lower case,
/// punctuation folded to spaces. "MRS. ROBINSON (V.O.)" becomes "mrs robinson".
pub fn speaker_key(cue: &str) -> String {
    let without_extensions = PARENTHETICAL_PATTERN.replace_all(cue, " ");
    without_extensions
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display form of a speaker cue: extensions removed, whitespace collapsed
pub fn speaker_name(cue: &str) -> String {
    let without_extensions = PARENTHETICAL_PATTERN.replace_all(cue, " ");
    WHITESPACE_PATTERN.replace_all(without_extensions.trim(), " ").to_string()
}

/// Line classification used while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Slugline,
    Transition,
    Cue,
    Inline,
    Text,
}

/// Stateless screenplay parser
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptParser;

impl ScriptParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse script text into dialogue lines
    pub fn parse(&self, text: &str) -> Vec<DialogueLine> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut builder = LineBuilder::default();

        let mut i = 0;
        while i < lines.len() {
            match classify(&lines, i) {
                LineKind::Blank => {
                    i += 1;
                }
                LineKind::Slugline => {
                    builder.start_scene();
                    builder.push(None, lines[i].to_string());
                    i += 1;
                }
                LineKind::Transition => {
                    builder.push(None, lines[i].to_string());
                    i += 1;
                }
                LineKind::Inline => {
                    if let Some(caps) = INLINE_PATTERN.captures(lines[i]) {
                        let text = clean_dialogue(&caps[2]);
                        if !text.is_empty() {
                            builder.push(Some(caps[1].trim()), text);
                        }
                    }
                    i += 1;
                }
                LineKind::Cue => {
                    let cue = lines[i];
                    let mut j = i + 1;
                    let mut block = Vec::new();
                    while j < lines.len() {
                        match classify(&lines, j) {
                            LineKind::Blank | LineKind::Slugline | LineKind::Cue | LineKind::Transition => break,
                            _ => block.push(lines[j]),
                        }
                        j += 1;
                    }
                    let text = clean_dialogue(&block.join(" "));
                    if !text.is_empty() {
                        builder.push(Some(cue), text);
                    }
                    i = j;
                }
                LineKind::Text => {
                    let mut j = i;
                    let mut block = Vec::new();
                    while j < lines.len() {
                        if classify(&lines, j) != LineKind::Text {
                            break;
                        }
                        block.push(lines[j]);
                        j += 1;
                    }
                    let text = WHITESPACE_PATTERN.replace_all(&block.join(" "), " ").to_string();
                    builder.push(None, text);
                    i = j;
                }
            }
        }

        builder.finish()
    }
}

/// Parse with a default parser
pub fn parse(text: &str) -> Vec<DialogueLine> {
    ScriptParser::new().parse(text)
}

fn classify(lines: &[&str], i: usize) -> LineKind {
    let line = lines[i];
    if line.is_empty() {
        return LineKind::Blank;
    }
    if SLUGLINE_PATTERN.is_match(line) {
        return LineKind::Slugline;
    }
    if TRANSITION_PATTERN.is_match(line) {
        return LineKind::Transition;
    }
    let next_is_text = lines.get(i + 1).is_some_and(|next| !next.is_empty());
    if next_is_text && is_cue(line) {
        return LineKind::Cue;
    }
    if is_inline_dialogue(line) {
        return LineKind::Inline;
    }
    LineKind::Text
}

fn is_cue(line: &str) -> bool {
    let Some(caps) = CUE_PATTERN.captures(line) else {
        return false;
    };
    // A cue is a name, not a shouted sentence
    caps[1].split_whitespace().count() <= MAX_CUE_WORDS
}

fn is_inline_dialogue(line: &str) -> bool {
    INLINE_PATTERN
        .captures(line)
        .is_some_and(|caps| caps[1].split_whitespace().count() <= MAX_CUE_WORDS)
}

/// Remove parentheticals and collapse whitespace
fn clean_dialogue(text: &str) -> String {
    let without = PARENTHETICAL_PATTERN.replace_all(text, " ");
    WHITESPACE_PATTERN.replace_all(without.trim(), " ").to_string()
}

#[derive(Debug, Default)]
struct LineBuilder {
    lines: Vec<DialogueLine>,
    scene_index: usize,
    scene_has_lines: bool,
}

impl LineBuilder {
    fn start_scene(&mut self) {
        if self.scene_has_lines {
            self.scene_index += 1;
            self.scene_has_lines = false;
        }
    }

    fn push(&mut self, cue: Option<&str>, text: String) {
        let line_index = self.lines.len();
        self.lines.push(DialogueLine {
            scene_index: self.scene_index,
            speaker: cue.map(speaker_name),
            speaker_key: cue.map(speaker_key).filter(|k| !k.is_empty()),
            text,
            line_index,
        });
        self.scene_has_lines = true;
    }

    fn finish(self) -> Vec<DialogueLine> {
        self.lines
    }
}
