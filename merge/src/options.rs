/// Knobs for a single merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Trust the trust-weighted majority of copies. When `false` ("strict"
    /// mode) a new transaction must appear in every copy, and a new credit
    /// must also be confirmed by the paying wallet.
    pub baseline: bool,
}

impl MergeOptions {
    /// Strict mode, `--no-baseline` on the command line.
    pub fn strict() -> Self {
        Self { baseline: false }
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self { baseline: true }
    }
}
