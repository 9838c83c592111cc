//! Tag-aware splitting of streamed text into thinking and payload channels
//!
//! The model interleaves free-form narration, delimited by
//! `<thinking>`/`</thinking>` markers, with the structured payload. Fragments
//! arrive at arbitrary boundaries, so a marker's bytes may be split across
//! fragments; the splitter holds back the longest fragment suffix that could
//! still turn into the marker it is scanning for, which bounds the unrouted
//! tail to `marker.len() - 1` bytes.

/// Marker opening the thinking region.
pub const THINKING_OPEN: &str = "<thinking>";
/// Marker closing the thinking region.
pub const THINKING_CLOSE: &str = "</thinking>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    /// No thinking region seen yet; scanning for the open marker.
    #[default]
    BeforeThinking,
    /// Inside the thinking region; scanning for the close marker.
    InThinking,
    /// The first region has closed; all further text is literal payload.
    AfterThinking,
}

/// Incremental splitter routing streamed fragments between the thinking
/// channel and the payload buffer.
///
/// One splitter serves one turn. The thinking channel only ever grows, so a
/// caller relaying it to a UI can treat every update as a prefix-extension of
/// the previous one. Only the first `<thinking>`/`</thinking>` pair delimits
/// a region; a second open marker after the region has closed is literal
/// payload text.
#[derive(Debug, Default)]
pub struct TagSplitter {
    mode: Mode,
    /// Held-back tail that may still complete the marker being scanned for.
    carry: String,
    thinking: String,
    payload: String,
}

/// Finalized channels produced by [`TagSplitter::finish`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutput {
    pub thinking: String,
    pub payload: String,
}

impl TagSplitter {
    /// Create a splitter with both channels empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one streamed fragment.
    ///
    /// Returns `true` when the thinking channel grew, in which case the
    /// caller should re-emit the cumulative [`Self::thinking`] text.
    pub fn push(&mut self, fragment: &str) -> bool {
        let mut text = std::mem::take(&mut self.carry);
        text.push_str(fragment);

        let grew_from = self.thinking.len();
        let mut rest = text.as_str();
        loop {
            match self.mode {
                Mode::AfterThinking => {
                    self.payload.push_str(rest);
                    break;
                }
                Mode::BeforeThinking => {
                    if let Some(at) = rest.find(THINKING_OPEN) {
                        self.payload.push_str(&rest[..at]);
                        rest = &rest[at + THINKING_OPEN.len()..];
                        self.mode = Mode::InThinking;
                    } else {
                        let keep = marker_prefix_len(rest, THINKING_OPEN);
                        let routed = rest.len() - keep;
                        self.payload.push_str(&rest[..routed]);
                        self.carry = rest[routed..].to_string();
                        break;
                    }
                }
                Mode::InThinking => {
                    if let Some(at) = rest.find(THINKING_CLOSE) {
                        self.thinking.push_str(&rest[..at]);
                        rest = &rest[at + THINKING_CLOSE.len()..];
                        self.mode = Mode::AfterThinking;
                    } else {
                        let keep = marker_prefix_len(rest, THINKING_CLOSE);
                        let routed = rest.len() - keep;
                        self.thinking.push_str(&rest[..routed]);
                        self.carry = rest[routed..].to_string();
                        break;
                    }
                }
            }
        }
        self.thinking.len() > grew_from
    }

    /// Cumulative thinking text routed so far
    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    /// Cumulative payload text routed so far
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Flush the held-back tail into the current channel and freeze both.
    ///
    /// A dangling marker prefix at end of stream was never a marker, so it
    /// belongs to whichever channel the splitter was filling.
    pub fn finish(mut self) -> SplitOutput {
        let carry = std::mem::take(&mut self.carry);
        match self.mode {
            Mode::InThinking => self.thinking.push_str(&carry),
            Mode::BeforeThinking | Mode::AfterThinking => self.payload.push_str(&carry),
        }
        SplitOutput {
            thinking: self.thinking,
            payload: self.payload,
        }
    }
}

/// Length of the longest proper suffix of `text` that is a prefix of
/// `marker`. Both markers are ASCII, so a matching suffix always ends on a
/// char boundary even when `text` contains multi-byte characters.
fn marker_prefix_len(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    (1..=max)
        .rev()
        .find(|&len| text.ends_with(&marker[..len]))
        .unwrap_or(0)
}
