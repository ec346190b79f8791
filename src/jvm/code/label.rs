use std::fmt;

/// Opaque label marking a position in a routine's code
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SynLabel(usize);

impl SynLabel {
    pub const START: SynLabel = SynLabel(0);

    pub fn next(&self) -> SynLabel {
        SynLabel(self.0 + 1)
    }
}

impl fmt::Debug for SynLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "l{}", self.0)
    }
}

/// Hands out labels that have never been handed out before
///
/// Cloning does not split the generator: the clone produces the same labels as the original.
#[derive(Clone)]
pub struct SynLabelGenerator(SynLabel);

impl SynLabelGenerator {
    pub fn new(start: SynLabel) -> SynLabelGenerator {
        SynLabelGenerator(start)
    }

    pub fn fresh_label(&mut self) -> SynLabel {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl Default for SynLabelGenerator {
    fn default() -> Self {
        SynLabelGenerator::new(SynLabel::START)
    }
}
