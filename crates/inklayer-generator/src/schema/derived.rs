//! Fields computed from the raw body.

use std::sync::LazyLock;

use inklayer_core::{ReadTime, TocItem, slug::slugify};
use regex::Regex;

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid heading regex")
});

/// Collect ATX headings from raw markup, skipping fenced code.
///
/// Anchor ids are not deduplicated: two headings with the same text get the
/// same id.
pub fn table_of_contents(raw: &str, max_depth: u8) -> Vec<TocItem> {
    let mut items = Vec::new();
    let mut fence: Option<(char, usize)> = None;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        if let Some(ch) = marker {
            let run = trimmed.chars().take_while(|c| *c == ch).count();
            if run >= 3 {
                fence = match fence {
                    None => Some((ch, run)),
                    Some((open, len)) if open == ch && run >= len => None,
                    other => other,
                };
                continue;
            }
        }
        if fence.is_some() {
            continue;
        }

        let Some(caps) = ATX_HEADING.captures(line) else {
            continue;
        };
        let level = caps[1].len() as u8;
        if level > max_depth {
            continue;
        }
        let text = caps[2].trim().to_string();
        let id = slugify(&text);
        items.push(TocItem {
            level,
            url: format!("#{id}"),
            text,
            id,
        });
    }

    items
}

/// Estimate reading time from the whitespace-separated word count.
pub fn read_time(text: &str, words_per_minute: u32) -> ReadTime {
    let words = text.split_whitespace().count();
    let minutes = words as f64 / f64::from(words_per_minute.max(1));
    let time = (minutes * 60_000.0).round() as u64;
    let display = minutes.ceil().max(1.0) as u64;

    ReadTime {
        text: format!("{display} min read"),
        minutes,
        time,
        words,
    }
}
