use super::Instruction;

/// Straight-line instructions with no type tracking at all
///
/// The only bookkeeping is the stack effect of each instruction, so that the code can be spliced
/// into a tracked routine.
#[derive(Default, Debug, Clone)]
pub struct RawCode<'g> {
    pub instructions: Vec<Instruction<'g>>,
}

impl<'g> RawCode<'g> {
    pub fn new() -> RawCode<'g> {
        RawCode::default()
    }

    pub fn push(&mut self, instruction: Instruction<'g>) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Net change in stack size (in slots) after running all of the instructions
    pub fn stack_growth(&self) -> isize {
        self.instructions.iter().map(Instruction::stack_effect).sum()
    }

    /// Largest stack size increase (in slots) reached at any point while running the instructions
    pub fn max_stack_growth(&self) -> isize {
        let mut current = 0;
        let mut max = 0;
        for instruction in &self.instructions {
            current += instruction.stack_effect();
            max = max.max(current);
        }
        max
    }
}

impl<'g> From<Vec<Instruction<'g>>> for RawCode<'g> {
    fn from(instructions: Vec<Instruction<'g>>) -> Self {
        RawCode { instructions }
    }
}

impl<'g> FromIterator<Instruction<'g>> for RawCode<'g> {
    fn from_iter<I: IntoIterator<Item = Instruction<'g>>>(iter: I) -> Self {
        RawCode {
            instructions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use Instruction::*;

    #[test]
    fn growth() {
        let code: RawCode = vec![IConst1, LConst0, L2I, IAdd, Pop].into_iter().collect();
        assert_eq!(code.stack_growth(), 0);
        assert_eq!(code.max_stack_growth(), 3);

        let mut shrinking = RawCode::new();
        shrinking.push(Pop).push(Pop2);
        assert_eq!(shrinking.stack_growth(), -3);
        assert_eq!(shrinking.max_stack_growth(), 0);
    }
}
