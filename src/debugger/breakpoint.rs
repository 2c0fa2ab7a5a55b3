use std::collections::BTreeSet;
use std::fmt;

/// The set of 1-based source lines execution should stop at.
///
/// The host replaces the whole set whenever it changes; the controller only
/// ever reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet {
    lines: BTreeSet<u32>,
}

impl BreakpointSet {
    /// Create an empty breakpoint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a breakpoint. Line 0 is not a source line and is ignored.
    pub fn add(&mut self, line: u32) -> bool {
        line > 0 && self.lines.insert(line)
    }

    /// Remove a breakpoint
    pub fn remove(&mut self, line: u32) -> bool {
        self.lines.remove(&line)
    }

    /// Check if execution should break at this line
    pub fn contains(&self, line: u32) -> bool {
        self.lines.contains(&line)
    }

    /// List all breakpoints in ascending line order
    pub fn list(&self) -> Vec<u32> {
        self.lines.iter().copied().collect()
    }

    /// Clear all breakpoints
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Check if there are any breakpoints set
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get count of breakpoints
    pub fn count(&self) -> usize {
        self.lines.len()
    }

    /// Parse a comma- or whitespace-separated list such as `"3, 7 12"`.
    pub fn parse_list(s: &str) -> Result<Self, String> {
        s.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| match token.parse::<u32>() {
                Ok(0) => Err("Line numbers start at 1".to_string()),
                Ok(line) => Ok(line),
                Err(_) => Err(format!("Invalid line number: {}", token)),
            })
            .collect()
    }
}

impl FromIterator<u32> for BreakpointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = BreakpointSet::new();
        for line in iter {
            set.add(line);
        }
        set
    }
}

impl fmt::Display for BreakpointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.lines.iter().map(|l| l.to_string()).collect();
        write!(f, "{{{}}}", lines.join(", "))
    }
}
