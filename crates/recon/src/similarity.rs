//! String similarity ratios on a 0–100 scale.
//!
//! All four ratios are built on the same longest-matching-block sequence
//! matcher. `ratio` and `partial_ratio` compare the strings as given. The two
//! token ratios first fold case and replace punctuation with spaces.

use std::collections::{BTreeSet, HashMap};

/// The four scores computed for one (canonical, noisy) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    pub partial: u8,
    pub token_sort: u8,
    pub token_set: u8,
    pub ratio: u8,
}

impl Scores {
    /// Compute every ratio. None of them is skipped, whatever the others score.
    pub fn compute(canonical: &str, noisy: &str) -> Self {
        Self {
            partial: partial_ratio(canonical, noisy),
            token_sort: token_sort_ratio(canonical, noisy),
            token_set: token_set_ratio(canonical, noisy),
            ratio: ratio(canonical, noisy),
        }
    }

    pub fn best(&self) -> u8 {
        self.partial
            .max(self.token_sort)
            .max(self.token_set)
            .max(self.ratio)
    }
}

/// Plain edit similarity over the full strings.
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    to_score(SequenceMatcher::new(&a, &b).ratio())
}

/// Best score of the shorter string against equally long windows of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let blocks = SequenceMatcher::new(shorter, longer).matching_blocks();
    let mut best = 0.0f64;
    for block in blocks {
        let start = block.b.saturating_sub(block.a);
        let end = (start + shorter.len()).min(longer.len());
        let window = &longer[start..end];
        let r = SequenceMatcher::new(shorter, window).ratio();
        if r > 0.995 {
            return 100;
        }
        best = best.max(r);
    }
    to_score(best)
}

/// Sort the tokens of both strings before comparing, so word order stops mattering.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    let a = sorted_tokens(a).join(" ");
    let b = sorted_tokens(b).join(" ");
    ratio(&a, &b)
}

/// Compare the shared tokens against each side's full token set, so one side's
/// extra words do not lower the score.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let pa = full_process(a);
    let pb = full_process(b);
    if pa.is_empty() || pb.is_empty() {
        return 0;
    }

    let ta: BTreeSet<&str> = pa.split_whitespace().collect();
    let tb: BTreeSet<&str> = pb.split_whitespace().collect();

    let sect = join(ta.intersection(&tb));
    let a_only = join(ta.difference(&tb));
    let b_only = join(tb.difference(&ta));

    let combined_a = format!("{sect} {a_only}").trim().to_string();
    let combined_b = format!("{sect} {b_only}").trim().to_string();

    ratio(&sect, &combined_a)
        .max(ratio(&sect, &combined_b))
        .max(ratio(&combined_a, &combined_b))
}

fn join<'a, 'b: 'a>(tokens: impl Iterator<Item = &'a &'b str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn sorted_tokens(s: &str) -> Vec<String> {
    let processed = full_process(s);
    let mut tokens: Vec<String> = processed.split_whitespace().map(str::to_string).collect();
    tokens.sort();
    tokens
}

/// Lowercase, non-word characters to spaces, trimmed.
fn full_process(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect::<String>()
        .trim()
        .to_string()
}

fn to_score(r: f64) -> u8 {
    (r * 100.0).round().clamp(0.0, 100.0) as u8
}

// ---------------------------------------------------------------------------
// Sequence matcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Block {
    a: usize,
    b: usize,
    size: usize,
}

/// Longest-matching-block matcher (Ratcliff/Obershelp), without junk heuristics.
struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        Self { a, b, b2j }
    }

    /// Earliest longest block in `a[alo..ahi]` × `b[blo..bhi]`.
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> Block {
        let mut best = Block { a: alo, b: blo, size: 0 };
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > 0 { j2len.get(&(j - 1)).copied().unwrap_or(0) } else { 0 } + 1;
                    next.insert(j, k);
                    if k > best.size {
                        best = Block { a: i + 1 - k, b: j + 1 - k, size: k };
                    }
                }
            }
            j2len = next;
        }
        best
    }

    fn matching_blocks(&self) -> Vec<Block> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.find_longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            blocks.push(m);
            if alo < m.a && blo < m.b {
                queue.push((alo, m.a, blo, m.b));
            }
            if m.a + m.size < ahi && m.b + m.size < bhi {
                queue.push((m.a + m.size, ahi, m.b + m.size, bhi));
            }
        }
        blocks.sort();

        // Collapse adjacent blocks
        let mut collapsed: Vec<Block> = Vec::with_capacity(blocks.len() + 1);
        for block in blocks {
            match collapsed.last_mut() {
                Some(last) if last.a + last.size == block.a && last.b + last.size == block.b => {
                    last.size += block.size;
                }
                _ => collapsed.push(block),
            }
        }
        collapsed.push(Block { a: self.a.len(), b: self.b.len(), size: 0 });
        collapsed
    }

    fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        let matches: usize = self.matching_blocks().iter().map(|b| b.size).sum();
        2.0 * matches as f64 / total as f64
    }
}
