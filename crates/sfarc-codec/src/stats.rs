//! Byte frequency statistics

/// Occurrence counts for each of the 256 byte values.
#[derive(Clone, PartialEq, Eq)]
pub struct SymbolStats {
    counts: [u64; 256],
    total: u64,
}

impl SymbolStats {
    pub fn new() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut stats = Self::new();
        stats.update(data);
        stats
    }

    /// Count every byte of `data`.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.counts[byte as usize] += 1;
        }
        self.total += data.len() as u64;
    }

    /// Add the counts of `other`, as if its input had been appended.
    pub fn merge(&mut self, other: &SymbolStats) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
        self.total += other.total;
    }

    pub fn count(&self, symbol: u8) -> u64 {
        self.counts[symbol as usize]
    }

    /// Total number of bytes counted.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of byte values seen at least once.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Present symbols ordered by frequency descending, ties by byte value ascending.
    pub fn sorted_symbols(&self) -> Vec<(u8, u64)> {
        let mut symbols: Vec<(u8, u64)> = (0..=255u8)
            .map(|b| (b, self.counts[b as usize]))
            .filter(|&(_, c)| c > 0)
            .collect();
        symbols.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        symbols
    }
}

impl Default for SymbolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolStats")
            .field("total", &self.total)
            .field("distinct", &self.distinct())
            .finish()
    }
}
