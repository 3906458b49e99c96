/// Screens of a session in presentation order.
///
/// Block numbers are 0-based here; instruction keys are 1-based
/// (`before_block_1` belongs to `BeforeBlock(0)`).
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    BeforePractice,
    BeforeBlock(usize),
    Block(usize),
    AfterBlock(usize),
    Debrief,
}

impl SessionPhase {
    pub fn next(&self, num_blocks: usize) -> Option<Self> {
        use SessionPhase::*;
        Some(match *self {
            Welcome => BeforePractice,
            BeforePractice if num_blocks == 0 => Debrief,
            BeforePractice => BeforeBlock(0),
            BeforeBlock(i) => Block(i),
            Block(i) => AfterBlock(i),
            AfterBlock(i) if i + 1 < num_blocks => BeforeBlock(i + 1),
            AfterBlock(_) => Debrief,
            Debrief => return None,
        })
    }

    /// Key into the instruction table, `None` for the timed block itself.
    pub fn instruction_key(&self) -> Option<String> {
        use SessionPhase::*;
        match *self {
            Welcome => Some("welcome".to_string()),
            BeforePractice => Some("before_practice".to_string()),
            BeforeBlock(i) => Some(format!("before_block_{}", i + 1)),
            Block(_) => None,
            AfterBlock(i) => Some(format!("after_block_{}", i + 1)),
            Debrief => Some("after_experiment".to_string()),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, SessionPhase::Block(_))
    }

    /// Every phase of a session with `num_blocks` blocks, in order.
    pub fn schedule(num_blocks: usize) -> Vec<SessionPhase> {
        std::iter::successors(Some(SessionPhase::default()), |p| p.next(num_blocks)).collect()
    }
}
