// src/compositor/mod.rs
// Sentence-boundary splitting and <img> splicing. Pure string work, no IO.

use regex::Regex;

pub struct Compositor {
    // A sentence ends at a run of terminator punctuation followed by whitespace.
    boundary: Regex,
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r"[.!?]+\s+").expect("sentence boundary regex"),
        }
    }

    /// Split into sentence-like segments. Each segment keeps its terminator
    /// and trailing whitespace, so rejoining the segments reproduces the
    /// input byte-for-byte.
    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut segments = Vec::new();
        let mut start = 0;
        for boundary in self.boundary.find_iter(text) {
            segments.push(&text[start..boundary.end()]);
            start = boundary.end();
        }
        if start < text.len() {
            segments.push(&text[start..]);
        }
        if segments.is_empty() {
            segments.push(text);
        }
        segments
    }

    /// Insert an image tag immediately after the sentence at `index`.
    /// Out-of-range indices clamp to the last sentence. The input is not
    /// mutated; a new string is returned.
    pub fn insert_image(
        &self,
        text: &str,
        index: usize,
        image_url: &str,
        alt_text: &str,
    ) -> String {
        let segments = self.split_sentences(text);
        let target = index.min(segments.len() - 1);
        let tag = image_tag(image_url, alt_text);

        let mut out = String::with_capacity(text.len() + tag.len());
        for (i, segment) in segments.iter().enumerate() {
            out.push_str(segment);
            if i == target {
                out.push_str(&tag);
            }
        }
        out
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

fn image_tag(url: &str, alt: &str) -> String {
    format!(
        r#"<img src="{}" alt="{}" style="max-width: 100%; display: block; margin: 10px 0;">"#,
        escape_attr(url),
        escape_attr(alt)
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "A cat sat. It was happy. The end.";

    #[test]
    fn splits_and_rejoins_losslessly() {
        let compositor = Compositor::new();
        let segments = compositor.split_sentences(REPLY);
        assert_eq!(segments, vec!["A cat sat. ", "It was happy. ", "The end."]);
        assert_eq!(segments.concat(), REPLY);
    }

    #[test]
    fn text_without_terminator_is_one_segment() {
        let compositor = Compositor::new();
        assert_eq!(compositor.split_sentences("no punctuation here"), vec![
            "no punctuation here"
        ]);
    }

    #[test]
    fn inserts_after_target_sentence() {
        let compositor = Compositor::new();
        let out = compositor.insert_image(REPLY, 1, "http://img/1.png", "a happy cat");
        let expected_prefix = "A cat sat. It was happy. <img src=\"http://img/1.png\"";
        assert!(out.starts_with(expected_prefix), "got: {out}");
        assert!(out.ends_with("The end."));
    }

    #[test]
    fn out_of_range_index_clamps_to_last_sentence() {
        let compositor = Compositor::new();
        let out = compositor.insert_image(REPLY, 99, "http://img/1.png", "alt");
        assert!(out.starts_with(REPLY));
        assert!(out[REPLY.len()..].starts_with("<img "));
    }

    #[test]
    fn input_is_not_mutated_and_sentences_survive() {
        let compositor = Compositor::new();
        let out = compositor.insert_image(REPLY, 0, "http://img/1.png", "alt");
        let start = out.find("<img ").unwrap();
        let end = out.find('>').unwrap() + 1;
        let without_tag = format!("{}{}", &out[..start], &out[end..]);
        assert_eq!(without_tag, REPLY);
    }

    #[test]
    fn empty_text_still_gets_the_tag() {
        let compositor = Compositor::new();
        let out = compositor.insert_image("", 3, "http://img/1.png", "alt");
        assert!(out.starts_with("<img "));
    }

    #[test]
    fn alt_text_is_attribute_escaped() {
        let compositor = Compositor::new();
        let out = compositor.insert_image("Hi.", 0, "http://img/1.png", "says \"hi\" <now>");
        assert!(out.contains("alt=\"says &quot;hi&quot; &lt;now&gt;\""));
    }
}
