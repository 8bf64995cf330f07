//! Minimal screenplay tagging for the reference rendering.
//!
//! Recognizes scene headings, transitions, character cues, parentheticals,
//! dialogue, and action. Consecutive dialogue lines under one cue merge into a
//! single dialogue block.

use crate::model::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: NodeKind,
    pub text: String,
}

impl Block {
    pub fn new(kind: NodeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn dialogue(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Dialogue, text)
    }
}

const MAX_CUE_CHARS: usize = 40;

pub fn tag_blocks(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut in_dialogue = false;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            in_dialogue = false;
            continue;
        }

        if is_heading(line) {
            in_dialogue = false;
            blocks.push(Block::new(NodeKind::Heading, line));
            continue;
        }

        if in_dialogue {
            if line.starts_with('(') && line.ends_with(')') {
                blocks.push(Block::new(NodeKind::Parenthetical, line));
                continue;
            }
            match blocks.last_mut() {
                Some(last) if last.kind == NodeKind::Dialogue => {
                    last.text.push(' ');
                    last.text.push_str(line);
                }
                _ => blocks.push(Block::dialogue(line)),
            }
            continue;
        }

        if is_upper(line) && line.ends_with("TO:") {
            blocks.push(Block::new(NodeKind::Transition, line));
        } else if is_upper(line) && line.chars().count() <= MAX_CUE_CHARS {
            in_dialogue = true;
            blocks.push(Block::new(NodeKind::Character, line));
        } else {
            blocks.push(Block::new(NodeKind::Action, line));
        }
    }

    blocks
}

fn is_heading(line: &str) -> bool {
    ["INT.", "EXT.", "INT/EXT", "I/E"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

fn is_upper(line: &str) -> bool {
    let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| c.is_uppercase())
}
