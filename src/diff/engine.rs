//! Windowed fuzzy diff engine
//!
//! Aligns two line streams under a bounded window: each round reads one
//! window of left lines and a slightly wider window of right lines, pairs
//! them by similarity within a limited positional distance, and emits the
//! alignment before moving on. Memory stays proportional to
//! `buffer_size + lookup_distance` no matter how large the inputs are; the
//! price is that lines displaced further than the lookup distance are
//! reported as unmatched.

use std::io;

use serde::Deserialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::source::LineSource;

/// Per-invocation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    /// Lines per comparison window.
    pub buffer_size: usize,
    /// Maximum positional offset searched when pairing a left line.
    pub lookup_distance: usize,
    /// Lines at or above this similarity ratio count as matched.
    pub similarity_threshold: f64,
    /// Marker between a left line and its fuzzy counterpart, and on
    /// unmatched lines.
    pub output_separator: String,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            lookup_distance: 10,
            similarity_threshold: 0.33,
            output_separator: "=>".to_string(),
        }
    }
}

/// Normalized similarity of two lines in `[0, 1]`; `1.0` exactly for equal
/// strings.
fn ratio(left: &str, right: &str) -> f64 {
    strsim::normalized_levenshtein(left, right)
}

enum Match {
    Exact,
    Similar(usize),
}

/// Stream both sources through the windowed alignment, writing the result to
/// `sink` as it is produced.
///
/// Output format, one record per line:
/// - `left` — exact match;
/// - `left<sep>right` — fuzzy match;
/// - `left<sep>` — left line with no counterpart;
/// - `<sep>right` — right line with no counterpart.
pub async fn diff_streams<L, R, W>(
    left: &mut L,
    right: &mut R,
    sink: &mut W,
    config: &DiffConfig,
) -> io::Result<()>
where
    L: LineSource,
    R: LineSource,
    W: AsyncWrite + Unpin + Send,
{
    let sep = config.output_separator.as_str();
    let mut tail: Vec<String> = Vec::new();

    loop {
        let left_window = fill_window(left, config.buffer_size).await?;

        let want = (config.buffer_size + config.lookup_distance).saturating_sub(tail.len());
        let mut right_window = fill_window(right, want).await?;
        // lines read ahead of the previous round join this window last
        right_window.append(&mut tail);

        if left_window.is_empty() {
            // Left side exhausted: everything still on the right is unmatched.
            for line in &right_window {
                write_line(sink, &format!("{sep}{line}")).await?;
            }
            while let Some(line) = right.next_line().await? {
                write_line(sink, &format!("{sep}{line}")).await?;
            }
            break;
        }

        let mut used = vec![false; right_window.len()];

        for (idx, left_line) in left_window.iter().enumerate() {
            match probe(left_line, idx, &right_window, &mut used, config) {
                Some(Match::Exact) => write_line(sink, left_line).await?,
                Some(Match::Similar(pos)) => {
                    write_line(sink, &format!("{left_line}{sep}{}", right_window[pos])).await?;
                }
                None => write_line(sink, &format!("{left_line}{sep}")).await?,
            }
        }

        for (pos, line) in right_window.into_iter().enumerate() {
            if used[pos] {
                continue;
            }
            if pos >= config.buffer_size {
                // read ahead of this round's window; defer to the next round
                tail.push(line);
            } else {
                write_line(sink, &format!("{sep}{line}")).await?;
            }
        }
    }

    sink.flush().await
}

async fn fill_window<L: LineSource>(source: &mut L, want: usize) -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    while lines.len() < want {
        match source.next_line().await? {
            Some(line) => lines.push(line),
            None => break,
        }
    }
    Ok(lines)
}

/// Probe right positions at increasing distance from `idx`: the position
/// itself first, then `idx - d` before `idx + d` for each wider distance.
/// The first position whose ratio clears the threshold wins and is marked
/// used. The probe order is a deterministic tie-break; changing it changes
/// the output.
fn probe(
    left: &str,
    idx: usize,
    right: &[String],
    used: &mut [bool],
    config: &DiffConfig,
) -> Option<Match> {
    for distance in 0..config.lookup_distance {
        if distance > 0 {
            if let Some(pos) = idx.checked_sub(distance) {
                if let Some(m) = try_match(left, pos, right, used, config) {
                    return Some(m);
                }
            }
        }
        if let Some(m) = try_match(left, idx + distance, right, used, config) {
            return Some(m);
        }
    }
    None
}

fn try_match(
    left: &str,
    pos: usize,
    right: &[String],
    used: &mut [bool],
    config: &DiffConfig,
) -> Option<Match> {
    if pos >= right.len() || used[pos] {
        return None;
    }
    let score = ratio(left, &right[pos]);
    if score < config.similarity_threshold {
        return None;
    }
    used[pos] = true;
    Some(if score == 1.0 {
        Match::Exact
    } else {
        Match::Similar(pos)
    })
}

async fn write_line<W: AsyncWrite + Unpin>(sink: &mut W, line: &str) -> io::Result<()> {
    sink.write_all(line.as_bytes()).await?;
    sink.write_all(b"\n").await
}
