/// Reduces the source's raw on/off samples to one value per block: a block
/// counts as on if the source was on at any point during it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockObservation {
    /// Whether the running block has seen the source on.
    block_on: bool,
    /// Last known raw state of the source, if any was read yet.
    source_on: Option<bool>,
}

impl BlockObservation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw sample of the source.
    pub fn record(&mut self, source_on: bool) {
        if source_on {
            self.block_on = true;
        }
        self.source_on = Some(source_on);
    }

    /// Close the running block and return its observation.
    ///
    /// The next block starts out on only if the source is still on.
    pub fn finish_block(&mut self) -> bool {
        let observed = self.block_on;
        self.block_on = self.source_on == Some(true);
        observed
    }

    /// Whether the running block has seen the source on so far.
    pub fn block_on(&self) -> bool {
        self.block_on
    }
}
