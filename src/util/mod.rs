mod ref_id;

pub use ref_id::*;

/// Values that occupy a fixed number of JVM slots
///
/// `long` and `double` take two slots on the operand stack and in the locals, everything else
/// takes one.
pub trait Width {
    fn width(&self) -> usize;
}

/// Total number of slots taken up by a sequence of values
pub fn total_width<'a, W: Width + 'a>(values: impl IntoIterator<Item = &'a W>) -> usize {
    values.into_iter().map(Width::width).sum()
}
